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

#![allow(dead_code)]

use async_trait::async_trait;
use capfs_client::file::{FileHandle, FsContext, OpenFileTable};
use capfs_client::rpc::{MrcServiceClient, OsdServiceClient, StaticUuidResolver};
use capfs_common::conf::ClientConf;
use capfs_common::error::{FsError, PosixErrno};
use capfs_common::state::*;
use capfs_common::FsResult;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FILE_ID: &str = "vol-1:1024";
pub const MRC_UUID: &str = "mrc-1";

pub fn osd_uuid(i: usize) -> String {
    format!("osd-{}", i)
}

pub fn osd_address(i: usize) -> String {
    format!("osd-{}.test:32640", i)
}

#[derive(Default)]
struct StorageState {
    // (server, object number) -> object content
    objects: HashMap<(String, u64), Vec<u8>>,
    file_size: u64,
    truncate_epoch: u32,
    locks: Vec<Lock>,
}

/// In-memory MRC and OSDs that record every call.
#[derive(Default)]
pub struct MockCluster {
    storage: Mutex<StorageState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    servers: Mutex<Vec<(&'static str, String)>>,
    size_updates: Mutex<Vec<UpdateFileSizeRequest>>,

    pub down_servers: Mutex<HashSet<String>>,
    pub fail_writes: AtomicBool,
    pub fail_renew: AtomicBool,
    pub fail_size_updates: AtomicBool,
    pub busy_lock_responses: AtomicU32,
    pub renew_expire_time_s: AtomicU64,
    pub write_delay_ms: AtomicU64,
    // Extra delay of the next write only.
    pub first_write_delay_ms: AtomicU64,
    // 1-based index of the single write that fails, 0 for none.
    pub fail_nth_write: AtomicU32,
    write_seq: AtomicU32,
    // ftruncate bumps the epoch but returns the expiry it was given.
    pub ftruncate_keeps_expiry: AtomicBool,
}

impl MockCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, op: &'static str, server: &str) -> FsResult<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        self.servers
            .lock()
            .unwrap()
            .push((op, server.to_string()));

        if self.down_servers.lock().unwrap().contains(server) {
            return Err(FsError::protocol(format!("connection refused: {}", server)));
        }
        Ok(())
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn servers_of(&self, op: &str) -> Vec<String> {
        self.servers
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn size_updates(&self) -> Vec<UpdateFileSizeRequest> {
        self.size_updates.lock().unwrap().clone()
    }

    pub fn file_size(&self) -> u64 {
        self.storage.lock().unwrap().file_size
    }

    pub fn set_down(&self, server: &str) {
        self.down_servers.lock().unwrap().insert(server.to_string());
    }

    /// A lock held by another client.
    pub fn add_foreign_lock(&self, lock: Lock) {
        self.storage.lock().unwrap().locks.push(lock);
    }

    pub fn server_locks(&self) -> Vec<Lock> {
        self.storage.lock().unwrap().locks.clone()
    }

    fn stripe_size(fc: &FileCredentials) -> u64 {
        fc.xlocs
            .replicas
            .first()
            .map(|r| r.striping_policy.stripe_size)
            .unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl MrcServiceClient for MockCluster {
    async fn renew_capability(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        xcap: XCap,
    ) -> FsResult<XCap> {
        self.record("renew_capability", server)?;
        if self.fail_renew.load(Ordering::SeqCst) {
            return Err(FsError::posix(PosixErrno::EACCES, "renew refused"));
        }

        let expire = match self.renew_expire_time_s.load(Ordering::SeqCst) {
            0 => xcap.expire_time_s + 600,
            v => v,
        };
        Ok(XCap {
            expire_time_s: expire,
            ..xcap
        })
    }

    async fn ftruncate(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        xcap: XCap,
    ) -> FsResult<XCap> {
        self.record("ftruncate", server)?;
        let mut storage = self.storage.lock().unwrap();
        storage.truncate_epoch = storage.truncate_epoch.max(xcap.truncate_epoch) + 1;
        let expire_time_s = if self.ftruncate_keeps_expiry.load(Ordering::SeqCst) {
            xcap.expire_time_s
        } else {
            xcap.expire_time_s + 1
        };
        Ok(XCap {
            truncate_epoch: storage.truncate_epoch,
            expire_time_s,
            ..xcap
        })
    }

    async fn update_file_size(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        req: UpdateFileSizeRequest,
    ) -> FsResult<()> {
        self.record("update_file_size", server)?;
        if self.fail_size_updates.load(Ordering::SeqCst) {
            return Err(FsError::internal("size update rejected"));
        }
        self.size_updates.lock().unwrap().push(req);
        Ok(())
    }
}

#[async_trait]
impl OsdServiceClient for MockCluster {
    async fn read(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        req: ReadRequest,
    ) -> FsResult<ObjectData> {
        self.record("read", server)?;
        let storage = self.storage.lock().unwrap();
        let stripe_size = Self::stripe_size(&req.file_credentials);

        let content = storage
            .objects
            .get(&(server.to_string(), req.object_number))
            .cloned()
            .unwrap_or_default();
        let start = (req.offset as usize).min(content.len());
        let end = ((req.offset + req.length) as usize).min(content.len());
        let data = content[start..end].to_vec();

        // Bytes of the request that lie inside the file.
        let req_start = req.object_number * stripe_size + req.offset;
        let in_file = storage
            .file_size
            .saturating_sub(req_start)
            .min(req.length);
        let zero_padding = in_file.saturating_sub(data.len() as u64) as u32;

        Ok(ObjectData {
            zero_padding,
            ..ObjectData::new(data.into())
        })
    }

    async fn write(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        req: WriteRequest,
    ) -> FsResult<OsdWriteResponse> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst)
            + self.first_write_delay_ms.swap(0, Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.record("write", server)?;
        let seq = self.write_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_writes.load(Ordering::SeqCst)
            || self.fail_nth_write.load(Ordering::SeqCst) == seq
        {
            return Err(FsError::eio("disk failure"));
        }

        let mut storage = self.storage.lock().unwrap();
        let stripe_size = Self::stripe_size(&req.file_credentials);
        let data = req.object_data.data;
        let obj = storage
            .objects
            .entry((server.to_string(), req.object_number))
            .or_default();
        let end = req.offset as usize + data.len();
        if obj.len() < end {
            obj.resize(end, 0);
        }
        obj[req.offset as usize..end].copy_from_slice(&data);

        let write_end = req.object_number * stripe_size + end as u64;
        if write_end > storage.file_size {
            storage.file_size = write_end;
            Ok(OsdWriteResponse::new(write_end, storage.truncate_epoch))
        } else {
            Ok(OsdWriteResponse {
                size_in_bytes: None,
                truncate_epoch: storage.truncate_epoch,
            })
        }
    }

    async fn truncate(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        req: TruncateRequest,
    ) -> FsResult<OsdWriteResponse> {
        self.record("truncate", server)?;
        let mut storage = self.storage.lock().unwrap();
        let stripe_size = Self::stripe_size(&req.file_credentials);
        let new_size = req.new_file_size;

        storage
            .objects
            .retain(|(_, obj), _| obj.saturating_mul(stripe_size) < new_size.max(1));
        for ((_, obj), content) in storage.objects.iter_mut() {
            let keep = (new_size - obj.saturating_mul(stripe_size).min(new_size)) as usize;
            content.truncate(keep);
        }
        storage.file_size = new_size;
        storage.truncate_epoch = req.file_credentials.xcap.truncate_epoch;
        Ok(OsdWriteResponse::new(new_size, storage.truncate_epoch))
    }

    async fn lock_acquire(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        req: LockRequest,
    ) -> FsResult<Lock> {
        self.record("lock_acquire", server)?;
        let busy = self.busy_lock_responses.load(Ordering::SeqCst);
        if busy > 0 {
            self.busy_lock_responses.store(busy - 1, Ordering::SeqCst);
            return Err(FsError::eagain("lock is held by another client"));
        }

        let mut storage = self.storage.lock().unwrap();
        if storage.locks.iter().any(|l| req.lock.conflicts_with(l)) {
            return Err(FsError::eagain("lock is held by another client"));
        }
        storage.locks.retain(|l| !l.same_owner(&req.lock));
        storage.locks.push(req.lock.clone());
        Ok(req.lock)
    }

    async fn lock_check(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        req: LockRequest,
    ) -> FsResult<Lock> {
        self.record("lock_check", server)?;
        let storage = self.storage.lock().unwrap();
        match storage.locks.iter().find(|l| req.lock.conflicts_with(l)) {
            Some(l) => Ok(l.clone()),
            None => Ok(req.lock),
        }
    }

    async fn lock_release(
        &self,
        server: &str,
        _: &Auth,
        _: &UserCredentials,
        req: LockRequest,
    ) -> FsResult<()> {
        self.record("lock_release", server)?;
        let mut storage = self.storage.lock().unwrap();
        storage.locks.retain(|l| !l.same_owner(&req.lock));
        Ok(())
    }
}

pub fn test_conf() -> ClientConf {
    let mut conf = ClientConf {
        client_uuid: "client-test".to_string(),
        max_tries: 3,
        retry_delay_str: "0ms".to_string(),
        lock_retry_delay_str: "1ms".to_string(),
        ..Default::default()
    };
    conf.init().unwrap();
    conf
}

pub fn async_conf(max_write_ahead_requests: usize) -> ClientConf {
    let mut conf = test_conf();
    conf.enable_async_writes = true;
    conf.max_write_ahead_requests = max_write_ahead_requests;
    conf
}

/// One replica per uuid, each on a single OSD.
pub fn replicated_xlocs(osds: &[usize], stripe_size: u64) -> XLocSet {
    let replicas = osds
        .iter()
        .map(|i| Replica::new(vec![osd_uuid(*i)], StripingPolicy::raid0(stripe_size, 1)))
        .collect();
    XLocSet {
        version: 1,
        ..XLocSet::new(replicas)
    }
}

/// A single replica striped over `width` OSDs.
pub fn striped_xlocs(width: usize, stripe_size: u64) -> XLocSet {
    let osds = (0..width).map(osd_uuid).collect();
    XLocSet {
        version: 1,
        ..XLocSet::new(vec![Replica::new(
            osds,
            StripingPolicy::raid0(stripe_size, width as u32),
        )])
    }
}

pub fn xcap(expire_time_s: u64) -> XCap {
    XCap {
        file_id: FILE_ID.to_string(),
        access_mode: 2,
        client_identity: "client-test".to_string(),
        expire_time_s,
        expire_timeout_s: 600,
        ..Default::default()
    }
}

pub fn creds() -> UserCredentials {
    UserCredentials::new("alice", vec!["users".to_string()])
}

pub fn context(conf: ClientConf, cluster: &Arc<MockCluster>) -> Arc<FsContext> {
    let resolver = StaticUuidResolver::new();
    resolver.add(MRC_UUID, "mrc.test:32636");
    for i in 0..8 {
        resolver.add(osd_uuid(i), osd_address(i));
    }

    let context = FsContext::new(
        conf,
        Arc::new(resolver),
        cluster.clone(),
        cluster.clone(),
        vec![MRC_UUID.to_string()],
    )
    .unwrap();
    Arc::new(context)
}

pub struct Fixture {
    pub cluster: Arc<MockCluster>,
    pub table: Arc<OpenFileTable>,
}

impl Fixture {
    pub fn new(conf: ClientConf) -> Self {
        let cluster = MockCluster::new();
        let table = Arc::new(OpenFileTable::new(context(conf, &cluster)));
        Self { cluster, table }
    }

    pub fn open(&self, xlocs: XLocSet, sync_writes: bool) -> Arc<FileHandle> {
        self.table.open("/vol-1/data.bin", xcap(1000), xlocs, sync_writes)
    }
}
