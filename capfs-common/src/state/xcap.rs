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

use crate::utils::LocalTime;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Capability issued by the metadata service for one open file.
///
/// Besides the fields the client looks at, the capability is opaque: it is
/// signed by the metadata service and sent back unchanged with every request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XCap {
    // "<volume uuid>:<inode number>"
    pub file_id: String,
    pub access_mode: u32,
    pub client_identity: String,
    // Absolute expiry, seconds since epoch.
    pub expire_time_s: u64,
    pub expire_timeout_s: u32,
    pub replicate_on_close: bool,
    pub server_signature: String,
    pub truncate_epoch: u32,
}

impl XCap {
    /// Inode number part of the global file id.
    pub fn inode_id(&self) -> Option<u64> {
        self.file_id
            .rsplit_once(':')
            .and_then(|(_, id)| id.parse().ok())
    }

    pub fn expires_in_s(&self, now_s: u64) -> i64 {
        self.expire_time_s as i64 - now_s as i64
    }

    pub fn is_expired(&self) -> bool {
        self.expires_in_s(LocalTime::now_s()) <= 0
    }

    /// Whether `self` may replace `current`: only a strictly later expiry wins.
    pub fn is_newer_than(&self, current: &XCap) -> bool {
        self.expire_time_s > current.expire_time_s
    }
}

impl Display for XCap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "file_id = {}, expire_time_s = {}, truncate_epoch = {}",
            self.file_id, self.expire_time_s, self.truncate_epoch
        )
    }
}
