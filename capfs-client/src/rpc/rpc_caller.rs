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

use crate::rpc::{UuidIterator, UuidResolver};
use capfs_common::FsResult;
use log::warn;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Mrc,
    Osd,
}

impl Display for ServiceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::Mrc => write!(f, "mrc"),
            ServiceType::Osd => write!(f, "osd"),
        }
    }
}

/// Synchronous call primitive with endpoint failover.
///
/// Each attempt resolves the current uuid of the iterator and invokes the
/// call against its address. Transport failures mark the uuid as failed and
/// the next attempt goes to the next endpoint after `retry_delay`. Any other
/// error is returned at once.
pub struct RpcCaller {
    resolver: Arc<dyn UuidResolver>,
    retry_delay: Duration,
}

impl RpcCaller {
    pub fn new(resolver: Arc<dyn UuidResolver>, retry_delay: Duration) -> Self {
        Self {
            resolver,
            retry_delay,
        }
    }

    /// `max_tries == 0` retries forever.
    pub async fn sync_call<T, F, Fut>(
        &self,
        service: ServiceType,
        iterator: &UuidIterator,
        max_tries: u32,
        mut call: F,
    ) -> FsResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = FsResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let uuid = iterator.get_uuid()?;
            let address = self.resolver.uuid_to_address(&uuid)?;

            let err = match call(address.clone()).await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if !err.should_retry() || (max_tries > 0 && attempt >= max_tries) {
                return Err(err);
            }

            warn!(
                "{} call failed to {}({}), attempt {}/{}: {}",
                service,
                uuid,
                address,
                attempt,
                if max_tries == 0 {
                    "inf".to_string()
                } else {
                    max_tries.to_string()
                },
                err
            );
            iterator.mark_uuid_as_failed(&uuid);
            if !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }
}
