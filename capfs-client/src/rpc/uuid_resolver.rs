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
use capfs_common::FsResult;
use dashmap::DashMap;

/// Maps service uuids to network addresses ("host:port").
pub trait UuidResolver: Send + Sync {
    fn uuid_to_address(&self, uuid: &str) -> FsResult<String>;
}

/// Resolver backed by a fixed table, filled by the caller.
#[derive(Default)]
pub struct StaticUuidResolver {
    table: DashMap<String, String>,
}

impl StaticUuidResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, uuid: impl Into<String>, address: impl Into<String>) {
        self.table.insert(uuid.into(), address.into());
    }

    pub fn remove(&self, uuid: &str) {
        self.table.remove(uuid);
    }
}

impl UuidResolver for StaticUuidResolver {
    fn uuid_to_address(&self, uuid: &str) -> FsResult<String> {
        match self.table.get(uuid) {
            Some(v) => Ok(v.value().clone()),
            None => Err(FsError::AddressNotFound(uuid.to_string())),
        }
    }
}
