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

#![allow(clippy::result_large_err)]

pub mod conf;
pub mod error;
pub mod state;
pub mod utils;

pub type FsResult<T> = Result<T, error::FsError>;

/// Return an `Err` built from a formatted message.
#[macro_export]
macro_rules! err_box {
    ($($arg:tt)*) => {
        Err($crate::error::FsError::common(format!($($arg)*)).into())
    };
}

/// Return an `Err` carrying a POSIX errno and a formatted message.
#[macro_export]
macro_rules! err_posix {
    ($errno:expr, $($arg:tt)*) => {
        Err($crate::error::FsError::posix($errno, format!($($arg)*)).into())
    };
}
