// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod common;

use capfs_client::file::PipelineState;
use capfs_common::error::PosixErrno;
use capfs_common::state::OsdWriteResponse;
use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_async_write_flush() {
    let f = Fixture::new(async_conf(4));
    let handle = f.open(replicated_xlocs(&[0], 8), false);
    assert!(handle.async_writes_enabled());

    handle.write(&creds(), b"0123456789abcdef", 0).await.unwrap();
    handle.write(&creds(), b"ghij", 16).await.unwrap();
    handle.flush().await.unwrap();

    assert_eq!(f.cluster.calls("write"), 3);
    assert_eq!(handle.file_info().write_handler().state(), PipelineState::Idle);
    assert_eq!(
        f.cluster.size_updates().last().unwrap().osd_write_response,
        OsdWriteResponse::new(20, 0)
    );

    let mut buf = vec![0u8; 20];
    assert_eq!(handle.read(&creds(), &mut buf, 0).await.unwrap(), 20);
    assert_eq!(&buf, b"0123456789abcdefghij");
}

#[tokio::test]
async fn test_write_does_not_wait_for_network() {
    let f = Fixture::new(async_conf(4));
    f.cluster.write_delay_ms.store(100, Ordering::SeqCst);
    let handle = f.open(replicated_xlocs(&[0], 4096), false);

    handle.write(&creds(), b"abc", 0).await.unwrap();
    assert_eq!(f.cluster.calls("write"), 0);
    assert_eq!(
        handle.file_info().write_handler().state(),
        PipelineState::Draining
    );

    handle.flush().await.unwrap();
    assert_eq!(f.cluster.calls("write"), 1);
}

#[tokio::test]
async fn test_bounded_write_ahead() {
    let f = Fixture::new(async_conf(1));
    f.cluster.write_delay_ms.store(20, Ordering::SeqCst);
    let handle = f.open(replicated_xlocs(&[0], 4096), false);

    for i in 0..4u64 {
        handle.write(&creds(), b"0123456789", i * 10).await.unwrap();
        assert!(handle.file_info().write_handler().pending() <= 1);
    }
    handle.flush().await.unwrap();
    assert_eq!(f.cluster.calls("write"), 4);
    assert_eq!(f.cluster.file_size(), 40);
}

#[tokio::test]
async fn test_async_writes_keep_submission_order() {
    let f = Fixture::new(async_conf(4));
    f.cluster.first_write_delay_ms.store(50, Ordering::SeqCst);
    let handle = f.open(replicated_xlocs(&[0], 4096), false);

    handle.write(&creds(), b"AAAA", 0).await.unwrap();
    handle.write(&creds(), b"BBBB", 0).await.unwrap();
    handle.flush().await.unwrap();
    assert_eq!(f.cluster.calls("write"), 2);

    let mut buf = vec![0u8; 4];
    assert_eq!(handle.read(&creds(), &mut buf, 0).await.unwrap(), 4);
    assert_eq!(&buf, b"BBBB");
}

#[tokio::test]
async fn test_failed_middle_write_poisons_file() {
    let f = Fixture::new(async_conf(4));
    f.cluster.fail_nth_write.store(2, Ordering::SeqCst);
    let handle = f.open(replicated_xlocs(&[0], 4096), false);

    handle.write(&creds(), b"aaaa", 0).await.unwrap();
    handle.write(&creds(), b"bbbb", 4).await.unwrap();
    handle.write(&creds(), b"cccc", 8).await.unwrap();

    let err = handle.flush().await.unwrap_err();
    assert!(err.is_errno(PosixErrno::EIO));
    // The write queued after the failed one is dropped.
    assert_eq!(f.cluster.calls("write"), 2);
    assert!(f.cluster.size_updates().is_empty());

    let calls = f.cluster.total_calls();
    let mut buf = vec![0u8; 12];
    let err = handle.read(&creds(), &mut buf, 0).await.unwrap_err();
    assert!(err.is_errno(PosixErrno::EIO));
    assert_eq!(f.cluster.total_calls(), calls);
}

#[tokio::test]
async fn test_sync_open_disables_async_writes() {
    let f = Fixture::new(async_conf(4));
    let handle = f.open(replicated_xlocs(&[0], 4096), true);
    assert!(!handle.async_writes_enabled());

    handle.write(&creds(), b"abc", 0).await.unwrap();
    assert_eq!(f.cluster.calls("write"), 1);
}

#[tokio::test]
async fn test_async_failure_poisons_file() {
    let f = Fixture::new(async_conf(4));
    let h1 = f.open(replicated_xlocs(&[0], 4096), false);
    let h2 = f.open(replicated_xlocs(&[0], 4096), false);
    f.cluster.fail_writes.store(true, Ordering::SeqCst);

    // Queued fine, fails in the background.
    h1.write(&creds(), b"lost", 0).await.unwrap();
    h1.file_info().wait_for_pending_async_writes().await;
    assert!(h1.file_info().is_async_writes_failed());
    assert_eq!(f.cluster.calls("write"), 1);

    let calls = f.cluster.total_calls();
    let mut buf = vec![0u8; 4];
    assert!(h1.flush().await.unwrap_err().is_errno(PosixErrno::EIO));
    assert!(h1
        .write(&creds(), b"more", 4)
        .await
        .unwrap_err()
        .is_errno(PosixErrno::EIO));
    assert!(h2
        .read(&creds(), &mut buf, 0)
        .await
        .unwrap_err()
        .is_errno(PosixErrno::EIO));
    assert!(h2
        .truncate(&creds(), 0)
        .await
        .unwrap_err()
        .is_errno(PosixErrno::EIO));
    assert_eq!(f.cluster.total_calls(), calls);

    // A new open gets fresh shared state.
    f.cluster.fail_writes.store(false, Ordering::SeqCst);
    let h3 = f.open(replicated_xlocs(&[0], 4096), false);
    assert!(!Arc::ptr_eq(h1.file_info(), h3.file_info()));
    h3.write(&creds(), b"ok", 0).await.unwrap();
    h3.flush().await.unwrap();

    h1.close().await;
    h2.close().await;
    assert_eq!(f.cluster.total_calls(), calls + 2);
}

#[tokio::test]
async fn test_mark_async_writes_as_failed() {
    let f = Fixture::new(async_conf(4));
    let handle = f.open(replicated_xlocs(&[0], 4096), false);

    handle.mark_async_writes_as_failed();
    let err = handle.write(&creds(), b"x", 0).await.unwrap_err();
    assert!(err.is_errno(PosixErrno::EIO));
    assert_eq!(f.cluster.total_calls(), 0);
}
