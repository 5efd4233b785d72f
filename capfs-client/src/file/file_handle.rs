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

use crate::file::{AsyncWriteBuffer, FileInfo, FsContext, XCapManager};
use crate::rpc::{ServiceType, UuidIterator};
use bytes::Bytes;
use capfs_common::error::{FsError, PosixErrno};
use capfs_common::state::*;
use capfs_common::utils::LocalTime;
use capfs_common::{err_posix, FsResult};
use log::{debug, error, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// One open descriptor of a file.
///
/// Handles of the same file share a [`FileInfo`]. Each handle keeps its own
/// capability, which is renewed in the background.
pub struct FileHandle {
    id: u64,
    context: Arc<FsContext>,
    file_info: Arc<FileInfo>,
    xcap: Arc<XCapManager>,
    async_writes_enabled: bool,
}

impl FileHandle {
    pub(crate) fn new(
        id: u64,
        context: Arc<FsContext>,
        file_info: Arc<FileInfo>,
        xcap: XCap,
        async_writes_enabled: bool,
    ) -> Self {
        Self {
            id,
            context,
            file_info,
            xcap: Arc::new(XCapManager::new(xcap)),
            async_writes_enabled,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        self.file_info.path()
    }

    pub fn file_info(&self) -> &Arc<FileInfo> {
        &self.file_info
    }

    pub fn xcap(&self) -> XCap {
        self.xcap.snapshot()
    }

    pub fn async_writes_enabled(&self) -> bool {
        self.async_writes_enabled
    }

    fn max_tries(&self) -> u32 {
        self.context.conf.max_tries
    }

    fn file_credentials(&self) -> FileCredentials {
        FileCredentials::new(self.xcap.snapshot(), self.file_info.xlocset())
    }

    fn check_async_writes_failed(&self, op: &str) -> FsResult<()> {
        if self.file_info.is_async_writes_failed() {
            error!(
                "{} on {} refused, a previous asynchronous write failed",
                op,
                self.path()
            );
            return err_posix!(
                PosixErrno::EIO,
                "{} on {} refused, a previous asynchronous write failed",
                op,
                self.path()
            );
        }
        Ok(())
    }

    // Striping policy of replica 0 and whether the replica spans several OSDs.
    fn replica_striping(&self, fc: &FileCredentials) -> FsResult<(StripingPolicy, bool)> {
        if fc.xlocs.is_empty() {
            error!("no replica found for file {}", self.path());
            return err_posix!(PosixErrno::EIO, "no replica found for file {}", self.path());
        }
        let replica = fc.xlocs.replica(0)?;
        Ok((replica.striping_policy.clone(), replica.is_striped()))
    }

    fn stripe_target(
        fc: &FileCredentials,
        striped: bool,
        osd_offset: usize,
    ) -> FsResult<Option<String>> {
        if striped {
            Ok(Some(fc.xlocs.osd_uuid(0, osd_offset)?.to_string()))
        } else {
            Ok(None)
        }
    }

    // Striped objects go to their OSD only, everything else fails over
    // between the replicas.
    async fn osd_call<T, F, Fut>(&self, target: Option<&str>, max_tries: u32, call: F) -> FsResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = FsResult<T>>,
    {
        let caller = &self.context.caller;
        match target {
            Some(uuid) => {
                let iterator = UuidIterator::with_uuid(uuid);
                caller
                    .sync_call(ServiceType::Osd, &iterator, max_tries, call)
                    .await
            }

            None => {
                caller
                    .sync_call(
                        ServiceType::Osd,
                        self.file_info.osd_uuid_iterator(),
                        max_tries,
                        call,
                    )
                    .await
            }
        }
    }

    async fn mrc_call<T, F, Fut>(&self, max_tries: u32, call: F) -> FsResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = FsResult<T>>,
    {
        self.context
            .caller
            .sync_call(
                ServiceType::Mrc,
                &self.context.mrc_uuid_iterator,
                max_tries,
                call,
            )
            .await
    }

    /// Read `buf.len()` bytes at `offset`. Returns the number of bytes placed
    /// in `buf`, which is smaller at the end of the file.
    pub async fn read(
        &self,
        creds: &UserCredentials,
        buf: &mut [u8],
        offset: u64,
    ) -> FsResult<usize> {
        self.file_info.wait_for_pending_async_writes().await;
        self.check_async_writes_failed("read")?;

        let fc = self.file_credentials();
        let (policy, striped) = self.replica_striping(&fc)?;
        let translator = self.context.translators.get(policy.policy_type)?;
        let ops = translator.translate_read_request(buf.len(), offset, &policy)?;

        let osd = &self.context.osd_client;
        let auth = &self.context.auth;
        let mut received = 0;
        for op in ops {
            let target = Self::stripe_target(&fc, striped, op.osd_offset)?;
            let req = ReadRequest {
                file_credentials: fc.clone(),
                file_id: fc.xcap.file_id.clone(),
                object_number: op.obj_number,
                object_version: 0,
                offset: op.req_offset,
                length: op.req_size,
            };

            self.context.metrics.osd_op("read");
            let data = self
                .osd_call(target.as_deref(), self.max_tries(), move |addr| {
                    let req = req.clone();
                    async move { osd.read(&addr, auth, creds, req).await }
                })
                .await?;

            let dst = &mut buf[op.buf_start..op.buf_start + op.req_size as usize];
            let n = data.data.len().min(dst.len());
            dst[..n].copy_from_slice(&data.data[..n]);
            // The OSD signals holes and short objects inside the file as padding.
            let padding = (data.zero_padding as usize).min(dst.len() - n);
            dst[n..n + padding].fill(0);
            received += n + padding;
        }

        self.context.metrics.read_bytes.inc_by(received as u64);
        Ok(received)
    }

    /// Write `buf` at `offset`. In asynchronous mode the call returns once
    /// every object write is queued.
    pub async fn write(&self, creds: &UserCredentials, buf: &[u8], offset: u64) -> FsResult<usize> {
        self.check_async_writes_failed("write")?;
        let start = Instant::now();

        let fc = self.file_credentials();
        let (policy, striped) = self.replica_striping(&fc)?;
        let translator = self.context.translators.get(policy.policy_type)?;
        let data = Bytes::copy_from_slice(buf);
        let ops = translator.translate_write_request(&data, offset, &policy)?;

        let osd = &self.context.osd_client;
        let auth = &self.context.auth;
        for op in ops {
            let target = Self::stripe_target(&fc, striped, op.osd_offset)?;
            let request = WriteRequest {
                file_credentials: fc.clone(),
                file_id: fc.xcap.file_id.clone(),
                object_number: op.obj_number,
                object_version: 0,
                offset: op.req_offset,
                lease_timeout: 0,
                object_data: ObjectData::new(op.req_data),
            };

            if self.async_writes_enabled {
                let entry = AsyncWriteBuffer {
                    request,
                    osd_uuid: target,
                };
                self.file_info.async_write(&self.context, entry).await?;
            } else {
                self.context.metrics.osd_op("write");
                let response = self
                    .osd_call(target.as_deref(), self.max_tries(), move |addr| {
                        let req = request.clone();
                        async move { osd.write(&addr, auth, creds, req).await }
                    })
                    .await?;
                self.file_info
                    .try_to_update_osd_write_response(response, &fc.xcap);
            }
        }

        self.context.metrics.write_bytes.inc_by(buf.len() as u64);
        self.context
            .metrics
            .write_latency_us
            .observe(start.elapsed().as_micros() as f64);
        Ok(buf.len())
    }

    pub async fn truncate(&self, creds: &UserCredentials, new_size: u64) -> FsResult<()> {
        self.file_info.wait_for_pending_async_writes().await;
        self.check_async_writes_failed("truncate")?;

        let xcap = self.xcap.snapshot();
        let mrc = &self.context.mrc_client;
        let auth = &self.context.auth;
        self.context.metrics.mrc_op("ftruncate");
        let truncate_xcap = self
            .mrc_call(self.max_tries(), move |addr| {
                let xcap = xcap.clone();
                async move { mrc.ftruncate(&addr, auth, creds, xcap).await }
            })
            .await?;

        self.xcap.install_truncated(truncate_xcap.clone());
        self.truncate_phase_two_and_three(creds, new_size, truncate_xcap)
            .await
    }

    // Truncate the objects with the epoch-bumped capability, then publish
    // the new size to the MRC.
    async fn truncate_phase_two_and_three(
        &self,
        creds: &UserCredentials,
        new_size: u64,
        xcap: XCap,
    ) -> FsResult<()> {
        let fc = FileCredentials::new(xcap, self.file_info.xlocset());
        let (_, striped) = self.replica_striping(&fc)?;
        let target = Self::stripe_target(&fc, striped, 0)?;
        let size_xcap = fc.xcap.clone();
        let req = TruncateRequest {
            file_id: fc.xcap.file_id.clone(),
            file_credentials: fc,
            new_file_size: new_size,
        };

        let osd = &self.context.osd_client;
        let auth = &self.context.auth;
        self.context.metrics.osd_op("truncate");
        let response = self
            .osd_call(target.as_deref(), self.max_tries(), move |addr| {
                let req = req.clone();
                async move { osd.truncate(&addr, auth, creds, req).await }
            })
            .await?;

        if response.size_in_bytes.is_none() {
            return Err(FsError::internal(format!(
                "truncate of {} returned no file size",
                self.path()
            )));
        }

        self.file_info
            .try_to_update_osd_write_response(response, &size_xcap);
        self.file_info
            .flush_pending_file_size_update(self, false)
            .await
    }

    pub async fn flush(&self) -> FsResult<()> {
        self.flush_with(false).await
    }

    pub async fn flush_with(&self, close_file: bool) -> FsResult<()> {
        self.check_async_writes_failed("flush")?;
        self.file_info.flush(self, close_file).await
    }

    /// Flush and deregister the handle. Flush failures are only logged.
    pub async fn close(&self) {
        if let Err(e) = self.flush_with(true).await {
            error!(
                "close of {} (handle {}) failed to flush: {}",
                self.path(),
                self.id,
                e
            );
        }

        let remaining = self.file_info.close_file_handle(self.id);
        debug!(
            "closed handle {} of {}, {} handles left",
            self.id,
            self.path(),
            remaining
        );
    }

    fn new_lock(&self, client_pid: i32, offset: u64, length: u64, exclusive: bool) -> Lock {
        Lock::new(
            self.context.client_uuid(),
            client_pid,
            offset,
            length,
            exclusive,
        )
    }

    async fn remote_lock_acquire(
        &self,
        creds: &UserCredentials,
        request: &LockRequest,
        max_tries: u32,
    ) -> FsResult<Lock> {
        let osd = &self.context.osd_client;
        let auth = &self.context.auth;
        self.context.metrics.osd_op("lock_acquire");
        self.osd_call(None, max_tries, move |addr| {
            let req = request.clone();
            async move { osd.lock_acquire(&addr, auth, creds, req).await }
        })
        .await
    }

    async fn acquire_lock_blocking(
        &self,
        creds: &UserCredentials,
        request: &LockRequest,
    ) -> FsResult<Lock> {
        let max_tries = self.max_tries();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.remote_lock_acquire(creds, request, 1).await {
                Ok(lock) => return Ok(lock),

                Err(e) if e.is_errno(PosixErrno::EAGAIN) && (max_tries == 0 || attempt < max_tries) => {
                    debug!(
                        "lock ({}) of {} is held, attempt {}: {}",
                        request.lock,
                        self.path(),
                        attempt,
                        e
                    );
                    tokio::time::sleep(self.context.conf.lock_retry_delay).await;
                }

                Err(e) => return Err(e),
            }
        }
    }

    /// Acquire an advisory lock for `client_pid`. With `wait_for_lock` the
    /// request is repeated while the lock is held elsewhere.
    pub async fn acquire_lock(
        &self,
        creds: &UserCredentials,
        client_pid: i32,
        offset: u64,
        length: u64,
        exclusive: bool,
        wait_for_lock: bool,
    ) -> FsResult<Lock> {
        let lock = self.new_lock(client_pid, offset, length, exclusive);
        let check = self.file_info.check_lock(&lock);
        if let Some(conflict) = check.conflicting_lock {
            return err_posix!(
                PosixErrno::EAGAIN,
                "lock ({}) of {} conflicts with ({})",
                lock,
                self.path(),
                conflict
            );
        }
        if check.cached_lock_for_pid_equal {
            self.context.metrics.lock_cache_hits.inc();
            return Ok(lock);
        }

        let request = LockRequest {
            file_credentials: self.file_credentials(),
            lock,
        };
        let granted = if wait_for_lock {
            self.acquire_lock_blocking(creds, &request).await?
        } else {
            self.remote_lock_acquire(creds, &request, self.max_tries())
                .await?
        };

        self.file_info.put_lock(granted.clone());
        Ok(granted)
    }

    /// Return the lock that prevents the candidate, or the candidate itself.
    pub async fn check_lock(
        &self,
        creds: &UserCredentials,
        client_pid: i32,
        offset: u64,
        length: u64,
        exclusive: bool,
    ) -> FsResult<Lock> {
        let lock = self.new_lock(client_pid, offset, length, exclusive);
        let check = self.file_info.check_lock(&lock);
        if let Some(conflict) = check.conflicting_lock {
            return Ok(conflict);
        }
        if check.cached_lock_for_pid_equal {
            self.context.metrics.lock_cache_hits.inc();
            return Ok(lock);
        }

        let request = LockRequest {
            file_credentials: self.file_credentials(),
            lock,
        };
        let osd = &self.context.osd_client;
        let auth = &self.context.auth;
        self.context.metrics.osd_op("lock_check");
        self.osd_call(None, self.max_tries(), move |addr| {
            let req = request.clone();
            async move { osd.lock_check(&addr, auth, creds, req).await }
        })
        .await
    }

    pub async fn release_lock(
        &self,
        creds: &UserCredentials,
        client_pid: i32,
        offset: u64,
        length: u64,
        exclusive: bool,
    ) -> FsResult<()> {
        let lock = self.new_lock(client_pid, offset, length, exclusive);
        self.release_cached_lock(creds, lock).await
    }

    async fn release_cached_lock(&self, creds: &UserCredentials, lock: Lock) -> FsResult<()> {
        let client_pid = lock.client_pid;
        if !self.file_info.has_locks(client_pid) {
            debug!(
                "release lock of pid {} on {}: nothing cached",
                client_pid,
                self.path()
            );
            return Ok(());
        }

        let request = LockRequest {
            file_credentials: self.file_credentials(),
            lock,
        };
        let osd = &self.context.osd_client;
        let auth = &self.context.auth;
        self.context.metrics.osd_op("lock_release");
        self.osd_call(None, self.max_tries(), move |addr| {
            let req = request.clone();
            async move { osd.lock_release(&addr, auth, creds, req).await }
        })
        .await?;

        self.file_info.del_lock(client_pid);
        Ok(())
    }

    pub async fn release_lock_of_process(&self, client_pid: i32) -> FsResult<()> {
        match self.file_info.cached_lock(client_pid) {
            Some(lock) => {
                self.release_cached_lock(&self.context.service_creds, lock)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Release every cached lock of the file. All locks are tried, the first
    /// failure is returned.
    pub async fn release_all_locks(&self) -> FsResult<()> {
        let mut first_err = None;
        for lock in self.file_info.cached_locks() {
            let client_pid = lock.client_pid;
            if let Err(e) = self
                .release_cached_lock(&self.context.service_creds, lock)
                .await
            {
                warn!(
                    "release lock of pid {} on {} failed: {}",
                    client_pid,
                    self.path(),
                    e
                );
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Read one byte of object 0 from the replica headed by `osd_uuid`.
    pub async fn ping_replica(&self, creds: &UserCredentials, osd_uuid: &str) -> FsResult<()> {
        let fc = self.file_credentials();
        if fc.xlocs.is_empty() {
            return Err(FsError::UuidIteratorListIsEmpty(format!(
                "xlocset of {} has no replicas",
                self.path()
            )));
        }

        let replica = match fc.xlocs.find_replica_by_head_osd(osd_uuid) {
            Some(v) => v,
            None => {
                return Err(FsError::UuidNotInXLocSet(format!(
                    "{} is not the head osd of a replica of {}, xlocset: {}",
                    osd_uuid,
                    self.path(),
                    fc.xlocs
                )))
            }
        };

        if fc.xlocs.is_read_only() && replica.is_full_replica() {
            debug!(
                "skip ping of {} for {}, full read-only replica",
                osd_uuid,
                self.path()
            );
            return Ok(());
        }

        let req = ReadRequest {
            file_credentials: fc.clone(),
            file_id: fc.xcap.file_id.clone(),
            object_number: 0,
            object_version: 0,
            offset: 0,
            length: 1,
        };
        let osd = &self.context.osd_client;
        let auth = &self.context.auth;
        self.context.metrics.osd_op("ping");
        self.osd_call(Some(osd_uuid), self.max_tries(), move |addr| {
            let req = req.clone();
            async move { osd.read(&addr, auth, creds, req).await }
        })
        .await?;
        Ok(())
    }

    /// Renew the capability in the background.
    pub fn renew_xcap_async(&self) {
        let xcap = self.xcap.begin_renewal();
        debug!(
            "renew xcap of {}, expires in {}s",
            self.path(),
            xcap.expires_in_s(LocalTime::now_s())
        );

        let context = self.context.clone();
        let manager = self.xcap.clone();
        let path = self.path().to_string();
        tokio::spawn(async move {
            let mrc = &context.mrc_client;
            let auth = &context.auth;
            let creds = &context.service_creds;
            context.metrics.mrc_op("renew_xcap");
            let res = context
                .caller
                .sync_call(ServiceType::Mrc, &context.mrc_uuid_iterator, 1, move |addr| {
                    let xcap = xcap.clone();
                    async move { mrc.renew_capability(&addr, auth, creds, xcap).await }
                })
                .await;

            match res {
                Ok(new_xcap) => {
                    manager.merge(new_xcap);
                }
                Err(e) => {
                    context.metrics.xcap_renewal_failures.inc();
                    warn!("renew xcap of {} failed: {}", path, e);
                }
            }
            manager.finish_renewal();
        });
    }

    pub async fn wait_for_async_xcap_renewal_finished(&self) {
        self.xcap.wait_for_renewals().await
    }

    pub fn write_back_file_size_async(&self) {
        self.file_info.write_back_file_size_async()
    }

    pub fn mark_async_writes_as_failed(&self) {
        self.file_info.mark_async_writes_failed()
    }

    /// Send `response` to the MRC with the newer of this handle's capability
    /// and the one the size was produced with.
    pub(crate) async fn write_back_file_size(
        &self,
        response: OsdWriteResponse,
        xcap: &XCap,
        close_file: bool,
    ) -> FsResult<()> {
        let current = self.xcap.snapshot();
        let xcap = if (xcap.truncate_epoch, xcap.expire_time_s)
            > (current.truncate_epoch, current.expire_time_s)
        {
            xcap.clone()
        } else {
            current
        };

        let req = UpdateFileSizeRequest {
            xcap,
            osd_write_response: response,
            close_file,
        };
        let mrc = &self.context.mrc_client;
        let auth = &self.context.auth;
        let creds = &self.context.service_creds;
        self.context.metrics.mrc_op("update_file_size");
        self.mrc_call(self.max_tries(), move |addr| {
            let req = req.clone();
            async move { mrc.update_file_size(&addr, auth, creds, req).await }
        })
        .await?;

        self.context.metrics.file_size_updates.inc();
        Ok(())
    }
}
