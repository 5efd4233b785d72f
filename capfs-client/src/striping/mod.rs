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

use bytes::Bytes;
use capfs_common::state::{StripingPolicy, StripingPolicyType};
use capfs_common::FsResult;

mod raid0;
mod stripe_translators;

pub use self::raid0::StripeTranslatorRaid0;
pub use self::stripe_translators::StripeTranslators;

/// One object-level read produced by a translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOperation {
    pub obj_number: u64,
    /// Index of the OSD inside the replica that stores the object.
    pub osd_offset: usize,
    pub req_size: u64,
    /// Offset inside the object.
    pub req_offset: u64,
    /// Where the data of this object starts in the caller's buffer.
    pub buf_start: usize,
}

/// One object-level write produced by a translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOperation {
    pub obj_number: u64,
    pub osd_offset: usize,
    pub req_size: u64,
    pub req_offset: u64,
    pub buf_start: usize,
    pub req_data: Bytes,
}

/// Splits byte ranges of a file into per-object operations.
pub trait StripeTranslator: Send + Sync {
    fn policy_type(&self) -> StripingPolicyType;

    fn translate_read_request(
        &self,
        size: usize,
        offset: u64,
        policy: &StripingPolicy,
    ) -> FsResult<Vec<ReadOperation>>;

    fn translate_write_request(
        &self,
        data: &Bytes,
        offset: u64,
        policy: &StripingPolicy,
    ) -> FsResult<Vec<WriteOperation>>;
}
