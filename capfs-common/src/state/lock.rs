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

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Advisory byte range lock held by one process of one client.
/// A `length` of 0 locks everything from `offset` to the end of the file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lock {
    pub client_pid: i32,
    pub client_uuid: String,
    pub offset: u64,
    pub length: u64,
    pub exclusive: bool,
}

impl Lock {
    pub fn new(
        client_uuid: impl Into<String>,
        client_pid: i32,
        offset: u64,
        length: u64,
        exclusive: bool,
    ) -> Self {
        Self {
            client_pid,
            client_uuid: client_uuid.into(),
            offset,
            length,
            exclusive,
        }
    }

    // Exclusive end, None if the lock reaches to the end of the file.
    pub fn end(&self) -> Option<u64> {
        if self.length == 0 {
            None
        } else {
            Some(self.offset.saturating_add(self.length))
        }
    }

    pub fn overlaps(&self, other: &Lock) -> bool {
        let before_other_end = match other.end() {
            Some(end) => self.offset < end,
            None => true,
        };
        let after_other_start = match self.end() {
            Some(end) => other.offset < end,
            None => true,
        };
        before_other_end && after_other_start
    }

    pub fn same_owner(&self, other: &Lock) -> bool {
        self.client_pid == other.client_pid && self.client_uuid == other.client_uuid
    }

    /// Two locks conflict if they belong to different owners, overlap and at
    /// least one of them is exclusive.
    pub fn conflicts_with(&self, other: &Lock) -> bool {
        !self.same_owner(other) && (self.exclusive || other.exclusive) && self.overlaps(other)
    }
}

impl Display for Lock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pid = {}, client = {}, range = [{}, {}), exclusive = {}",
            self.client_pid,
            self.client_uuid,
            self.offset,
            self.end().map_or("eof".to_string(), |x| x.to_string()),
            self.exclusive
        )
    }
}
