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

use crate::conf::LogConf;
use crate::error::FsError;
use crate::FsResult;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_log::LogTracer;

/// Process wide log setup: `log` records are bridged into a `tracing`
/// fmt subscriber writing to stdout or to `<log_dir>/<file_name>`.
pub struct Logger;

impl Logger {
    pub fn init(conf: &LogConf) -> FsResult<()> {
        let level = conf.level()?;

        LogTracer::builder()
            .with_max_level(conf.log_level_filter()?)
            .init()
            .map_err(|e| FsError::common(format!("init log tracer: {}", e)))?;

        let builder = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(conf.display_target)
            .with_thread_names(conf.display_thread);

        let res = match &conf.log_dir {
            Some(dir) if !dir.is_empty() => {
                fs::create_dir_all(dir)?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(Path::new(dir).join(&conf.file_name))?;
                let subscriber = builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .finish();
                tracing::subscriber::set_global_default(subscriber)
            }

            _ => tracing::subscriber::set_global_default(builder.finish()),
        };

        res.map_err(|e| FsError::common(format!("init log subscriber: {}", e)))
    }
}
