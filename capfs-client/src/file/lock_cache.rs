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

use capfs_common::state::Lock;
use std::collections::HashMap;

/// Outcome of checking a requested lock against the cached ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockCheck {
    pub conflicting_lock: Option<Lock>,
    pub lock_for_pid_cached: bool,
    pub cached_lock_for_pid_equal: bool,
}

/// Locks granted to this client, at most one per process id.
#[derive(Debug, Default)]
pub struct LockCache {
    active_locks: HashMap<i32, Lock>,
}

impl LockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_lock(&self, lock: &Lock) -> LockCheck {
        let mut res = LockCheck::default();

        for (pid, active) in &self.active_locks {
            if *pid == lock.client_pid {
                res.lock_for_pid_cached = true;
                res.cached_lock_for_pid_equal = active == lock;
                continue;
            }

            if res.conflicting_lock.is_none() && lock.conflicts_with(active) {
                res.conflicting_lock = Some(active.clone());
            }
        }

        res
    }

    /// Store `lock`, replacing the one of the same process.
    pub fn put_lock(&mut self, lock: Lock) -> Option<Lock> {
        self.active_locks.insert(lock.client_pid, lock)
    }

    pub fn del_lock(&mut self, client_pid: i32) -> Option<Lock> {
        self.active_locks.remove(&client_pid)
    }

    pub fn has_locks(&self, client_pid: i32) -> bool {
        self.active_locks.contains_key(&client_pid)
    }

    pub fn get(&self, client_pid: i32) -> Option<&Lock> {
        self.active_locks.get(&client_pid)
    }

    pub fn locks(&self) -> Vec<Lock> {
        self.active_locks.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.active_locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_locks.is_empty()
    }
}
