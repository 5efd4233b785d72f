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

mod async_write_handler;
pub use self::async_write_handler::*;

mod file_handle;
pub use self::file_handle::FileHandle;

mod file_info;
pub use self::file_info::{FileInfo, FileSizeUpdateStatus};

mod fs_context;
pub use self::fs_context::FsContext;

mod lock_cache;
pub use self::lock_cache::{LockCache, LockCheck};

mod open_file_table;
pub use self::open_file_table::OpenFileTable;

mod xcap_manager;
pub use self::xcap_manager::XCapManager;
