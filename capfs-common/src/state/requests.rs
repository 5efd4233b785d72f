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

use crate::state::{Lock, XCap, XLocSet};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Capability and location set sent with every storage node request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileCredentials {
    pub xcap: XCap,
    pub xlocs: XLocSet,
}

impl FileCredentials {
    pub fn new(xcap: XCap, xlocs: XLocSet) -> Self {
        Self { xcap, xlocs }
    }

    pub fn file_id(&self) -> &str {
        &self.xcap.file_id
    }
}

/// Payload of a read reply or a write request.
/// `zero_padding` tells the reader how many zero bytes follow `data`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectData {
    pub checksum: u32,
    pub invalid_checksum_on_osd: bool,
    pub zero_padding: u32,
    pub data: Bytes,
}

impl ObjectData {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() + self.zero_padding as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub file_credentials: FileCredentials,
    pub file_id: String,
    pub object_number: u64,
    pub object_version: u64,
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub file_credentials: FileCredentials,
    pub file_id: String,
    pub object_number: u64,
    pub object_version: u64,
    pub offset: u64,
    pub lease_timeout: u64,
    pub object_data: ObjectData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncateRequest {
    pub file_credentials: FileCredentials,
    pub file_id: String,
    pub new_file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub file_credentials: FileCredentials,
    pub lock: Lock,
}

/// Size confirmation of a storage node after a write or truncate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OsdWriteResponse {
    // Set only if the operation changed the file size.
    pub size_in_bytes: Option<u64>,
    pub truncate_epoch: u32,
}

impl OsdWriteResponse {
    pub fn new(size_in_bytes: u64, truncate_epoch: u32) -> Self {
        Self {
            size_in_bytes: Some(size_in_bytes),
            truncate_epoch,
        }
    }

    /// A response is newer if it belongs to a later truncate epoch, or to the
    /// same epoch with a larger size.
    pub fn is_newer_than(&self, current: &OsdWriteResponse) -> bool {
        let size = match self.size_in_bytes {
            None => return false,
            Some(v) => v,
        };
        match current.size_in_bytes {
            None => true,
            Some(cur) => (self.truncate_epoch, size) > (current.truncate_epoch, cur),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFileSizeRequest {
    pub xcap: XCap,
    pub osd_write_response: OsdWriteResponse,
    pub close_file: bool,
}
