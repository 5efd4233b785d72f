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

use capfs_common::error::FsError;
use capfs_common::state::WriteRequest;
use capfs_common::FsResult;
use std::sync::Arc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing in flight.
    Idle,
    /// At least one write in flight.
    Draining,
    /// A write failed. Terminal.
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct PipelineStatus {
    state: PipelineState,
    pending: usize,
}

/// A write queued for background execution.
#[derive(Debug, Clone)]
pub struct AsyncWriteBuffer {
    pub request: WriteRequest,
    /// Target OSD for striped files, None to use the file's replica iterator.
    pub osd_uuid: Option<String>,
}

/// Bookkeeping of the asynchronous writes of one file.
///
/// At most `max_requests` writes are in flight; callers block for a slot.
/// The first failed write latches the pipeline into `Failed` and every later
/// reservation is refused.
pub struct AsyncWriteHandler {
    status: watch::Sender<PipelineStatus>,
    slots: Arc<Semaphore>,
}

impl AsyncWriteHandler {
    pub fn new(max_requests: usize) -> Self {
        let (status, _) = watch::channel(PipelineStatus {
            state: PipelineState::Idle,
            pending: 0,
        });
        Self {
            status,
            slots: Arc::new(Semaphore::new(max_requests.max(1))),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.status.borrow().state
    }

    pub fn pending(&self) -> usize {
        self.status.borrow().pending
    }

    pub fn is_failed(&self) -> bool {
        self.state() == PipelineState::Failed
    }

    fn failed_error() -> FsError {
        FsError::eio("a previous asynchronous write failed, the file handle is unusable")
    }

    /// Wait for a free slot and account a new write in flight.
    pub async fn reserve(&self) -> FsResult<OwnedSemaphorePermit> {
        if self.is_failed() {
            return Err(Self::failed_error());
        }

        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| FsError::internal(e.to_string()))?;

        let mut accepted = false;
        self.status.send_if_modified(|s| {
            if s.state == PipelineState::Failed {
                return false;
            }
            s.pending += 1;
            s.state = PipelineState::Draining;
            accepted = true;
            true
        });

        if accepted {
            Ok(permit)
        } else {
            Err(Self::failed_error())
        }
    }

    /// Account the end of a write reserved with `reserve`.
    pub fn complete(&self, success: bool) {
        self.status.send_modify(|s| {
            s.pending = s.pending.saturating_sub(1);
            if !success {
                s.state = PipelineState::Failed;
            } else if s.pending == 0 && s.state == PipelineState::Draining {
                s.state = PipelineState::Idle;
            }
        });
    }

    pub fn mark_failed(&self) {
        self.status.send_modify(|s| s.state = PipelineState::Failed);
    }

    /// Block until nothing is in flight or the pipeline failed.
    pub async fn wait_drained(&self) {
        let mut rx = self.status.subscribe();
        let _ = rx.wait_for(|s| s.state != PipelineState::Draining).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn drain() {
        let handler = Arc::new(AsyncWriteHandler::new(2));
        assert_eq!(handler.state(), PipelineState::Idle);
        handler.wait_drained().await;

        let p1 = handler.reserve().await.unwrap();
        let p2 = handler.reserve().await.unwrap();
        assert_eq!(handler.state(), PipelineState::Draining);
        assert_eq!(handler.pending(), 2);

        let h = handler.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(p1);
            h.complete(true);
            drop(p2);
            h.complete(true);
        });

        handler.wait_drained().await;
        assert_eq!(handler.state(), PipelineState::Idle);
        assert_eq!(handler.pending(), 0);
    }

    #[tokio::test]
    async fn bounded() {
        let handler = Arc::new(AsyncWriteHandler::new(1));
        let p1 = handler.reserve().await.unwrap();

        let h = handler.clone();
        let waiter = tokio::spawn(async move { h.reserve().await.map(|_| ()) });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(p1);
        handler.complete(true);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failure_latches() {
        let handler = AsyncWriteHandler::new(4);
        let _p1 = handler.reserve().await.unwrap();
        let _p2 = handler.reserve().await.unwrap();

        handler.complete(false);
        assert!(handler.is_failed());
        // Waiters are released even though one write is still in flight.
        handler.wait_drained().await;

        handler.complete(true);
        assert_eq!(handler.state(), PipelineState::Failed);
        assert!(handler.reserve().await.is_err());
    }
}
