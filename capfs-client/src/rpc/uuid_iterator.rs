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
use log::debug;
use std::sync::Mutex;

// Entries before `current` are the ones that failed since the last wrap.
#[derive(Debug, Default)]
struct IteratorState {
    items: Vec<String>,
    current: usize,
}

/// Ordered list of endpoint uuids with a cursor on the one in use.
///
/// A uuid marked as failed moves the cursor to the next entry. Once every
/// entry failed, the cursor starts over at the first one.
#[derive(Debug, Default)]
pub struct UuidIterator {
    state: Mutex<IteratorState>,
}

impl UuidIterator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uuid(uuid: impl Into<String>) -> Self {
        let iter = Self::new();
        iter.add_uuid(uuid);
        iter
    }

    pub fn with_uuids<I, S>(uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let iter = Self::new();
        for uuid in uuids {
            iter.add_uuid(uuid);
        }
        iter
    }

    /// Append a uuid. Duplicates are ignored.
    pub fn add_uuid(&self, uuid: impl Into<String>) {
        let uuid = uuid.into();
        let mut state = self.state.lock().unwrap();
        if state.items.contains(&uuid) {
            return;
        }
        state.items.push(uuid);
    }

    pub fn clear_and_add_uuid(&self, uuid: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.items.clear();
        state.items.push(uuid.into());
        state.current = 0;
    }

    pub fn get_uuid(&self) -> FsResult<String> {
        let state = self.state.lock().unwrap();
        match state.items.get(state.current) {
            Some(uuid) => Ok(uuid.clone()),
            None => Err(FsError::UuidIteratorListIsEmpty(
                "get_uuid called on an empty uuid iterator".to_string(),
            )),
        }
    }

    /// Mark `uuid` as failed. Only has an effect if it is the current one,
    /// so concurrent callers failing on the same endpoint advance once.
    pub fn mark_uuid_as_failed(&self, uuid: &str) {
        let mut state = self.state.lock().unwrap();
        if state.items.get(state.current).map(|x| x.as_str()) != Some(uuid) {
            return;
        }

        // Past the last entry every uuid failed once, start over.
        state.current += 1;
        if state.current >= state.items.len() {
            state.current = 0;
        }
        debug!(
            "uuid {} marked as failed, next uuid {}",
            uuid, state.items[state.current]
        );
    }

    pub fn size(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn uuids(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.items.clone()
    }
}
