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

use crate::error::FsError;
use crate::FsResult;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConf {
    // trace, debug, info, warn, error
    pub level: String,

    // Log to stdout when not set.
    pub log_dir: Option<String>,
    pub file_name: String,

    pub display_thread: bool,
    pub display_target: bool,
}

impl LogConf {
    pub fn level(&self) -> FsResult<tracing::Level> {
        tracing::Level::from_str(&self.level)
            .map_err(|_| FsError::config(format!("invalid log level: {}", self.level)))
    }

    pub fn log_level_filter(&self) -> FsResult<log::LevelFilter> {
        log::LevelFilter::from_str(&self.level)
            .map_err(|_| FsError::config(format!("invalid log level: {}", self.level)))
    }
}

impl Default for LogConf {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            file_name: "capfs-client.log".to_string(),
            display_thread: false,
            display_target: true,
        }
    }
}
