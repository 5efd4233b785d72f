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

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Errno values a storage or naming service can report for a failed call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
#[repr(i32)]
pub enum PosixErrno {
    EPERM = 1,
    ENOENT = 2,
    EINTR = 4,
    EIO = 5,
    EAGAIN = 11,
    EACCES = 13,
    EEXIST = 17,
    EXDEV = 18,
    ENODEV = 19,
    ENOTDIR = 20,
    EISDIR = 21,
    EINVAL = 22,
    EFBIG = 27,
    ENOSPC = 28,
    ENOTEMPTY = 39,
    ENODATA = 61,
}

impl PosixErrno {
    pub fn from_code(code: i32) -> Option<Self> {
        Self::try_from(code).ok()
    }

    pub fn code(self) -> i32 {
        self.into()
    }
}

impl Display for PosixErrno {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_code_conversion() {
        assert_eq!(PosixErrno::EIO.code(), 5);
        assert_eq!(PosixErrno::from_code(11), Some(PosixErrno::EAGAIN));
        assert_eq!(PosixErrno::from_code(12345), None);
        assert_eq!(PosixErrno::EAGAIN.to_string(), "EAGAIN(11)");
    }
}
