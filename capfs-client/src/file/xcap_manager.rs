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

use capfs_common::state::XCap;
use log::debug;
use std::sync::Mutex;
use tokio::sync::watch;

/// Capability of one open file handle.
///
/// Renewals run in the background. The number of renewals in flight is
/// published through a watch channel so callers can wait for them.
pub struct XCapManager {
    xcap: Mutex<XCap>,
    renewals: watch::Sender<usize>,
}

impl XCapManager {
    pub fn new(xcap: XCap) -> Self {
        let (renewals, _) = watch::channel(0);
        Self {
            xcap: Mutex::new(xcap),
            renewals,
        }
    }

    pub fn snapshot(&self) -> XCap {
        self.xcap.lock().unwrap().clone()
    }

    pub fn file_id(&self) -> String {
        self.xcap.lock().unwrap().file_id.clone()
    }

    /// Install `new_xcap` if it expires strictly later than the current one.
    pub fn merge(&self, new_xcap: XCap) -> bool {
        let mut xcap = self.xcap.lock().unwrap();
        if new_xcap.is_newer_than(&xcap) {
            debug!(
                "install xcap of file {}, expire time {} -> {}",
                xcap.file_id, xcap.expire_time_s, new_xcap.expire_time_s
            );
            *xcap = new_xcap;
            true
        } else {
            debug!(
                "ignore xcap of file {} with expire time {}, current {}",
                xcap.file_id, new_xcap.expire_time_s, xcap.expire_time_s
            );
            false
        }
    }

    /// Install the capability returned by a truncate.
    ///
    /// It carries the bumped truncate epoch, so it wins even when its expiry
    /// equals the current one. Only a capability with an older epoch, or
    /// with the same epoch and an older expiry, is ignored.
    pub fn install_truncated(&self, new_xcap: XCap) -> bool {
        let mut xcap = self.xcap.lock().unwrap();
        let install = new_xcap.truncate_epoch > xcap.truncate_epoch
            || (new_xcap.truncate_epoch == xcap.truncate_epoch
                && new_xcap.expire_time_s >= xcap.expire_time_s);
        if install {
            debug!(
                "install truncate xcap of file {}, truncate epoch {} -> {}",
                xcap.file_id, xcap.truncate_epoch, new_xcap.truncate_epoch
            );
            *xcap = new_xcap;
        }
        install
    }

    /// Register a renewal and return the capability to renew.
    pub(crate) fn begin_renewal(&self) -> XCap {
        self.renewals.send_modify(|n| *n += 1);
        self.snapshot()
    }

    pub(crate) fn finish_renewal(&self) {
        self.renewals.send_modify(|n| *n = n.saturating_sub(1));
    }

    pub fn renewals_in_flight(&self) -> usize {
        *self.renewals.borrow()
    }

    pub async fn wait_for_renewals(&self) {
        let mut rx = self.renewals.subscribe();
        // The sender lives in self, the channel can not close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}
