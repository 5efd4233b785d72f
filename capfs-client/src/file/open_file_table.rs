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

use crate::file::{FileHandle, FileInfo, FsContext};
use capfs_common::state::{XCap, XLocSet};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Registry of open files, keyed by file id.
///
/// Handles of the same file share one [`FileInfo`] as long as at least one
/// of them is open and the file is not poisoned by a failed async write.
pub struct OpenFileTable {
    context: Arc<FsContext>,
    files: DashMap<String, Arc<FileInfo>>,
    next_handle_id: AtomicU64,
}

impl OpenFileTable {
    pub fn new(context: Arc<FsContext>) -> Self {
        Self {
            context,
            files: DashMap::new(),
            next_handle_id: AtomicU64::new(1),
        }
    }

    pub fn context(&self) -> &Arc<FsContext> {
        &self.context
    }

    pub fn open(
        &self,
        path: impl Into<String>,
        xcap: XCap,
        xlocs: XLocSet,
        sync_writes: bool,
    ) -> Arc<FileHandle> {
        let path = path.into();
        let file_id = xcap.file_id.clone();
        let id = self.next_handle_id.fetch_add(1, Ordering::SeqCst);
        let async_writes = self.context.conf.async_writes_enabled(sync_writes);

        // The shard stays locked until the handle is registered.
        let handle = match self.files.entry(file_id.clone()) {
            Entry::Occupied(mut e) => {
                let cur = e.get();
                if cur.open_handle_count() == 0 || cur.is_async_writes_failed() {
                    debug!("replace shared state of {}", path);
                    e.insert(self.new_file_info(&file_id, &path, xlocs));
                } else {
                    cur.update_xlocset(xlocs);
                }
                self.new_handle(id, e.get().clone(), xcap, async_writes)
            }

            Entry::Vacant(e) => {
                let file_info = self.new_file_info(&file_id, &path, xlocs);
                e.insert(file_info.clone());
                self.new_handle(id, file_info, xcap, async_writes)
            }
        };

        debug!("open {} handle {}, async writes {}", path, id, async_writes);
        handle
    }

    fn new_file_info(&self, file_id: &str, path: &str, xlocs: XLocSet) -> Arc<FileInfo> {
        Arc::new(FileInfo::new(
            file_id,
            path,
            xlocs,
            self.context.conf.max_write_ahead_requests,
        ))
    }

    fn new_handle(
        &self,
        id: u64,
        file_info: Arc<FileInfo>,
        xcap: XCap,
        async_writes: bool,
    ) -> Arc<FileHandle> {
        let handle = Arc::new(FileHandle::new(
            id,
            self.context.clone(),
            file_info.clone(),
            xcap,
            async_writes,
        ));
        file_info.register_handle(&handle);
        handle
    }

    pub fn get(&self, file_id: &str) -> Option<Arc<FileInfo>> {
        self.files.get(file_id).map(|x| x.value().clone())
    }

    pub fn open_file_count(&self) -> usize {
        self.files.len()
    }

    fn purge_closed(&self) {
        self.files.retain(|_, v| v.open_handle_count() > 0);
    }

    fn snapshot(&self) -> Vec<Arc<FileInfo>> {
        self.purge_closed();
        self.files.iter().map(|x| x.value().clone()).collect()
    }

    pub fn renew_capabilities(&self) {
        for file_info in self.snapshot() {
            for handle in file_info.open_handles() {
                handle.renew_xcap_async();
            }
        }
    }

    pub fn write_back_file_sizes(&self) {
        for file_info in self.snapshot() {
            file_info.write_back_file_size_async();
        }
    }

    /// Drive capability renewal and size write-back with the configured
    /// intervals. The tasks end once the table is dropped.
    pub fn start_periodic_tasks(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let conf = &self.context.conf;
        info!(
            "start periodic tasks, xcap renewal interval {:?}, file size update interval {:?}",
            conf.xcap_renewal_interval, conf.file_size_update_interval
        );

        let renew = Self::spawn_periodic(
            Arc::downgrade(self),
            conf.xcap_renewal_interval,
            |table| table.renew_capabilities(),
        );
        let size = Self::spawn_periodic(
            Arc::downgrade(self),
            conf.file_size_update_interval,
            |table| table.write_back_file_sizes(),
        );
        (renew, size)
    }

    fn spawn_periodic<F>(table: Weak<Self>, period: Duration, f: F) -> JoinHandle<()>
    where
        F: Fn(&OpenFileTable) + Send + 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                match table.upgrade() {
                    Some(table) => f(&table),
                    None => break,
                }
            }
        })
    }
}
