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

use crate::file::{
    AsyncWriteBuffer, AsyncWriteHandler, FileHandle, FsContext, LockCache, LockCheck,
};
use crate::rpc::{ServiceType, UuidIterator};
use capfs_common::error::FsError;
use capfs_common::state::{Lock, OsdWriteResponse, XCap, XLocSet};
use capfs_common::FsResult;
use log::{debug, error, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, OwnedSemaphorePermit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSizeUpdateStatus {
    Clean,
    Dirty,
    DirtyAndAsyncPending,
}

enum SizeFlushStep {
    Done,
    Wait,
    Flush(OsdWriteResponse, XCap),
}

// A write accepted by the pipeline, waiting for the file's write worker.
struct QueuedWrite {
    context: Arc<FsContext>,
    entry: AsyncWriteBuffer,
    permit: OwnedSemaphorePermit,
}

struct FileState {
    xlocs: XLocSet,
    // Largest size confirmed by the OSDs and the capability it was written with.
    osd_write_response: Option<OsdWriteResponse>,
    osd_write_response_xcap: Option<XCap>,
    locks: LockCache,
    handles: HashMap<u64, Weak<FileHandle>>,
}

/// State shared by all open handles of one file.
pub struct FileInfo {
    file_id: String,
    path: String,
    osd_uuid_iterator: UuidIterator,
    write_handler: AsyncWriteHandler,
    // Feeds the worker that sends queued writes in submission order.
    write_queue: Mutex<Option<UnboundedSender<QueuedWrite>>>,
    state: Mutex<FileState>,
    // Only changed while holding `state`.
    size_status: watch::Sender<FileSizeUpdateStatus>,
}

impl FileInfo {
    pub fn new(
        file_id: impl Into<String>,
        path: impl Into<String>,
        xlocs: XLocSet,
        max_write_ahead_requests: usize,
    ) -> Self {
        let osd_uuid_iterator = UuidIterator::new();
        for replica in &xlocs.replicas {
            if let Some(head) = replica.head_osd() {
                osd_uuid_iterator.add_uuid(head);
            }
        }

        let (size_status, _) = watch::channel(FileSizeUpdateStatus::Clean);
        Self {
            file_id: file_id.into(),
            path: path.into(),
            osd_uuid_iterator,
            write_handler: AsyncWriteHandler::new(max_write_ahead_requests),
            write_queue: Mutex::new(None),
            state: Mutex::new(FileState {
                xlocs,
                osd_write_response: None,
                osd_write_response_xcap: None,
                locks: LockCache::new(),
                handles: HashMap::new(),
            }),
            size_status,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn xlocset(&self) -> XLocSet {
        self.state.lock().unwrap().xlocs.clone()
    }

    /// Replace the replica list if `xlocs` is not older than the current one.
    pub fn update_xlocset(&self, xlocs: XLocSet) -> bool {
        let mut state = self.state.lock().unwrap();
        if xlocs.version < state.xlocs.version || xlocs == state.xlocs {
            return false;
        }

        let mut heads = xlocs.replicas.iter().filter_map(|r| r.head_osd());
        if let Some(first) = heads.next() {
            self.osd_uuid_iterator.clear_and_add_uuid(first);
            for uuid in heads {
                self.osd_uuid_iterator.add_uuid(uuid);
            }
        }
        debug!(
            "update xlocset of file {}, version {} -> {}",
            self.path, state.xlocs.version, xlocs.version
        );
        state.xlocs = xlocs;
        true
    }

    pub fn osd_uuid_iterator(&self) -> &UuidIterator {
        &self.osd_uuid_iterator
    }

    pub(crate) fn register_handle(&self, handle: &Arc<FileHandle>) {
        let mut state = self.state.lock().unwrap();
        state.handles.insert(handle.id(), Arc::downgrade(handle));
    }

    /// Forget handle `id` and return the number of handles still open.
    pub fn close_file_handle(&self, id: u64) -> usize {
        let mut state = self.state.lock().unwrap();
        state.handles.remove(&id);
        state.handles.retain(|_, h| h.strong_count() > 0);
        state.handles.len()
    }

    pub fn open_handles(&self) -> Vec<Arc<FileHandle>> {
        let state = self.state.lock().unwrap();
        state.handles.values().filter_map(|h| h.upgrade()).collect()
    }

    pub fn open_handle_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.handles.values().filter(|h| h.strong_count() > 0).count()
    }

    pub fn size_status(&self) -> FileSizeUpdateStatus {
        *self.size_status.borrow()
    }

    pub fn osd_write_response(&self) -> Option<OsdWriteResponse> {
        self.state.lock().unwrap().osd_write_response.clone()
    }

    /// Remember `response` if it is newer than the pending one.
    pub fn try_to_update_osd_write_response(&self, response: OsdWriteResponse, xcap: &XCap) -> bool {
        let mut state = self.state.lock().unwrap();
        let newer = match &state.osd_write_response {
            None => response.size_in_bytes.is_some(),
            Some(cur) => response.is_newer_than(cur),
        };
        if !newer {
            return false;
        }

        state.osd_write_response = Some(response);
        state.osd_write_response_xcap = Some(xcap.clone());
        // An update in flight notices the change when it completes.
        if self.size_status() == FileSizeUpdateStatus::Clean {
            self.size_status.send_replace(FileSizeUpdateStatus::Dirty);
        }
        true
    }

    /// Start writing back a dirty size through one of the open handles.
    pub fn write_back_file_size_async(self: &Arc<Self>) {
        let (response, xcap, handle) = {
            let state = self.state.lock().unwrap();
            if self.size_status() != FileSizeUpdateStatus::Dirty {
                return;
            }
            let handle = match state.handles.values().find_map(|h| h.upgrade()) {
                Some(v) => v,
                None => return,
            };
            match (&state.osd_write_response, &state.osd_write_response_xcap) {
                (Some(r), Some(x)) => {
                    self.size_status
                        .send_replace(FileSizeUpdateStatus::DirtyAndAsyncPending);
                    (r.clone(), x.clone(), handle)
                }
                _ => return,
            }
        };

        let file_info = self.clone();
        tokio::spawn(async move {
            let res = handle
                .write_back_file_size(response.clone(), &xcap, false)
                .await;
            if let Err(e) = &res {
                warn!("async file size update of {} failed: {}", file_info.path, e);
            }

            file_info.finish_async_size_update(&response, res.is_ok());
        });
    }

    fn finish_async_size_update(&self, flushed: &OsdWriteResponse, success: bool) {
        let state = self.state.lock().unwrap();
        if self.size_status() == FileSizeUpdateStatus::DirtyAndAsyncPending {
            let next = if success && state.osd_write_response.as_ref() == Some(flushed) {
                FileSizeUpdateStatus::Clean
            } else {
                FileSizeUpdateStatus::Dirty
            };
            self.size_status.send_replace(next);
        }
    }

    pub async fn wait_for_pending_file_size_updates(&self) {
        let mut rx = self.size_status.subscribe();
        let _ = rx
            .wait_for(|s| *s != FileSizeUpdateStatus::DirtyAndAsyncPending)
            .await;
    }

    fn next_size_flush_step(&self) -> SizeFlushStep {
        let state = self.state.lock().unwrap();
        match self.size_status() {
            FileSizeUpdateStatus::Clean => SizeFlushStep::Done,
            FileSizeUpdateStatus::DirtyAndAsyncPending => SizeFlushStep::Wait,
            FileSizeUpdateStatus::Dirty => {
                match (&state.osd_write_response, &state.osd_write_response_xcap) {
                    (Some(r), Some(x)) => SizeFlushStep::Flush(r.clone(), x.clone()),
                    _ => SizeFlushStep::Done,
                }
            }
        }
    }

    /// Write back a dirty size synchronously through `handle`.
    pub async fn flush_pending_file_size_update(
        &self,
        handle: &FileHandle,
        close_file: bool,
    ) -> FsResult<()> {
        let (response, xcap) = loop {
            self.wait_for_pending_file_size_updates().await;
            match self.next_size_flush_step() {
                SizeFlushStep::Done => return Ok(()),
                SizeFlushStep::Wait => continue,
                SizeFlushStep::Flush(r, x) => break (r, x),
            }
        };

        handle
            .write_back_file_size(response.clone(), &xcap, close_file)
            .await?;
        self.mark_size_clean(&response);
        Ok(())
    }

    fn mark_size_clean(&self, flushed: &OsdWriteResponse) {
        let state = self.state.lock().unwrap();
        if self.size_status() == FileSizeUpdateStatus::Dirty
            && state.osd_write_response.as_ref() == Some(flushed)
        {
            self.size_status.send_replace(FileSizeUpdateStatus::Clean);
        }
    }

    /// Queue a write for background execution. Blocks while the pipeline is full.
    ///
    /// Queued writes of a file reach the OSDs one at a time, in the order
    /// they were queued.
    pub async fn async_write(
        self: &Arc<Self>,
        context: &Arc<FsContext>,
        entry: AsyncWriteBuffer,
    ) -> FsResult<()> {
        let permit = self.write_handler.reserve().await?;
        context.metrics.async_writes_queued.inc();
        context.metrics.pending_async_writes.inc();

        let job = QueuedWrite {
            context: context.clone(),
            entry,
            permit,
        };
        let sender = self.write_sender();
        if let Err(e) = sender.send(job) {
            let job = e.0;
            job.context.metrics.pending_async_writes.dec();
            self.write_handler.complete(false);
            return Err(FsError::internal(format!(
                "write worker of {} is gone",
                self.path
            )));
        }

        Ok(())
    }

    fn write_sender(self: &Arc<Self>) -> UnboundedSender<QueuedWrite> {
        let mut queue = self.write_queue.lock().unwrap();
        match queue.as_ref() {
            Some(sender) if !sender.is_closed() => sender.clone(),
            _ => {
                let (sender, recv) = mpsc::unbounded_channel();
                Self::spawn_write_worker(Arc::downgrade(self), recv);
                *queue = Some(sender.clone());
                sender
            }
        }
    }

    // The worker only holds a weak reference, it exits once the file is dropped.
    fn spawn_write_worker(file_info: Weak<Self>, mut recv: UnboundedReceiver<QueuedWrite>) {
        tokio::spawn(async move {
            while let Some(job) = recv.recv().await {
                let file_info = match file_info.upgrade() {
                    Some(v) => v,
                    None => break,
                };
                file_info.run_queued_write(job).await;
            }
        });
    }

    async fn run_queued_write(&self, job: QueuedWrite) {
        let QueuedWrite {
            context,
            entry,
            permit,
        } = job;

        let res = self.execute_async_write(&context, &entry).await;
        context.metrics.pending_async_writes.dec();

        match res {
            Ok(response) => {
                self.try_to_update_osd_write_response(
                    response,
                    &entry.request.file_credentials.xcap,
                );
                self.write_handler.complete(true);
            }

            Err(e) => {
                error!(
                    "async write of object {} of file {} failed: {}",
                    entry.request.object_number, self.path, e
                );
                context.metrics.async_writes_failed.inc();
                self.write_handler.complete(false);
            }
        }
        // Free the slot only after the write is accounted as finished.
        drop(permit);
    }

    async fn execute_async_write(
        &self,
        context: &FsContext,
        entry: &AsyncWriteBuffer,
    ) -> FsResult<OsdWriteResponse> {
        if self.write_handler.is_failed() {
            return Err(FsError::eio(
                "skip async write, the pipeline already failed",
            ));
        }

        let fixed;
        let iterator = match &entry.osd_uuid {
            Some(uuid) => {
                fixed = UuidIterator::with_uuid(uuid.as_str());
                &fixed
            }
            None => &self.osd_uuid_iterator,
        };

        let osd = &context.osd_client;
        let auth = &context.auth;
        let creds = &context.service_creds;
        let request = &entry.request;
        context.metrics.osd_op("async_write");
        context
            .caller
            .sync_call(ServiceType::Osd, iterator, context.conf.max_tries, move |addr| {
                let req = request.clone();
                async move { osd.write(&addr, auth, creds, req).await }
            })
            .await
    }

    pub async fn wait_for_pending_async_writes(&self) {
        self.write_handler.wait_drained().await
    }

    pub fn is_async_writes_failed(&self) -> bool {
        self.write_handler.is_failed()
    }

    pub fn mark_async_writes_failed(&self) {
        self.write_handler.mark_failed()
    }

    pub fn write_handler(&self) -> &AsyncWriteHandler {
        &self.write_handler
    }

    /// Drain the pipeline, then write back a dirty size.
    pub async fn flush(&self, handle: &FileHandle, close_file: bool) -> FsResult<()> {
        self.wait_for_pending_async_writes().await;
        if self.is_async_writes_failed() {
            return Err(FsError::eio(format!(
                "flush of {} failed, at least one asynchronous write did not succeed",
                self.path
            )));
        }
        self.flush_pending_file_size_update(handle, close_file).await
    }

    pub fn check_lock(&self, lock: &Lock) -> LockCheck {
        self.state.lock().unwrap().locks.check_lock(lock)
    }

    pub fn put_lock(&self, lock: Lock) {
        self.state.lock().unwrap().locks.put_lock(lock);
    }

    pub fn del_lock(&self, client_pid: i32) -> Option<Lock> {
        self.state.lock().unwrap().locks.del_lock(client_pid)
    }

    pub fn has_locks(&self, client_pid: i32) -> bool {
        self.state.lock().unwrap().locks.has_locks(client_pid)
    }

    pub fn cached_lock(&self, client_pid: i32) -> Option<Lock> {
        self.state.lock().unwrap().locks.get(client_pid).cloned()
    }

    pub fn cached_locks(&self) -> Vec<Lock> {
        self.state.lock().unwrap().locks.locks()
    }
}
