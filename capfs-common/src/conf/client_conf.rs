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
use crate::utils::DurationUnit;
use crate::FsResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Client side configuration of the file I/O engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConf {
    // Identifies this client towards the lock authority. Generated when empty.
    pub client_uuid: String,

    // User name sent with background calls (renewal, size write back, async writes).
    pub service_user: String,

    // Attempts of one remote call including endpoint failover, 0 means unbounded.
    // Also bounds the attempts of a blocking lock acquisition.
    pub max_tries: u32,

    #[serde(skip)]
    pub retry_delay: Duration,
    #[serde(alias = "retry_delay")]
    pub retry_delay_str: String,

    // Writes are queued and sent in the background when enabled, unless the
    // file was opened for synchronous writes.
    pub enable_async_writes: bool,

    // Upper bound of queued, not yet acknowledged writes per file.
    pub max_write_ahead_requests: usize,

    #[serde(skip)]
    pub lock_retry_delay: Duration,
    #[serde(alias = "lock_retry_delay")]
    pub lock_retry_delay_str: String,

    #[serde(skip)]
    pub xcap_renewal_interval: Duration,
    #[serde(alias = "xcap_renewal_interval")]
    pub xcap_renewal_interval_str: String,

    #[serde(skip)]
    pub file_size_update_interval: Duration,
    #[serde(alias = "file_size_update_interval")]
    pub file_size_update_interval_str: String,

    pub log: LogConf,
}

impl ClientConf {
    pub fn init(&mut self) -> FsResult<()> {
        self.retry_delay = DurationUnit::from_str(&self.retry_delay_str)?.as_duration();
        self.lock_retry_delay = DurationUnit::from_str(&self.lock_retry_delay_str)?.as_duration();
        self.xcap_renewal_interval =
            DurationUnit::from_str(&self.xcap_renewal_interval_str)?.as_duration();
        self.file_size_update_interval =
            DurationUnit::from_str(&self.file_size_update_interval_str)?.as_duration();

        if self.client_uuid.is_empty() {
            self.client_uuid = uuid::Uuid::new_v4().to_string();
        }

        if self.enable_async_writes && self.max_write_ahead_requests == 0 {
            return Err(FsError::config(
                "max_write_ahead_requests must be positive when async writes are enabled",
            ));
        }

        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> FsResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> FsResult<Self> {
        let mut conf: ClientConf = toml::from_str(content)?;
        conf.init()?;
        Ok(conf)
    }

    pub fn async_writes_enabled(&self, sync_writes: bool) -> bool {
        self.enable_async_writes && self.max_write_ahead_requests > 0 && !sync_writes
    }
}

impl Default for ClientConf {
    fn default() -> Self {
        let mut conf = Self {
            client_uuid: String::new(),
            service_user: "capfs".to_string(),
            max_tries: 40,

            retry_delay: Default::default(),
            retry_delay_str: "15s".to_string(),

            enable_async_writes: false,
            max_write_ahead_requests: 10,

            lock_retry_delay: Default::default(),
            lock_retry_delay_str: "100ms".to_string(),

            xcap_renewal_interval: Default::default(),
            xcap_renewal_interval_str: "60s".to_string(),

            file_size_update_interval: Default::default(),
            file_size_update_interval_str: "60s".to_string(),

            log: LogConf::default(),
        };
        // The default strings always parse.
        let _ = conf.init();
        conf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_conf_is_initialized() {
        let conf = ClientConf::default();
        assert_eq!(conf.retry_delay, Duration::from_secs(15));
        assert_eq!(conf.xcap_renewal_interval, Duration::from_secs(60));
        assert!(!conf.client_uuid.is_empty());
        assert!(!conf.async_writes_enabled(false));
    }

    #[test]
    fn parse_toml() {
        let conf = ClientConf::from_toml(
            r#"
            client_uuid = "client-1"
            max_tries = 3
            retry_delay = "0ms"
            enable_async_writes = true
            max_write_ahead_requests = 4
            xcap_renewal_interval = "30s"

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(conf.client_uuid, "client-1");
        assert_eq!(conf.max_tries, 3);
        assert_eq!(conf.retry_delay, Duration::ZERO);
        assert_eq!(conf.xcap_renewal_interval, Duration::from_secs(30));
        assert_eq!(conf.file_size_update_interval, Duration::from_secs(60));
        assert!(conf.async_writes_enabled(false));
        assert!(!conf.async_writes_enabled(true));
        assert_eq!(conf.log.level().unwrap(), tracing::Level::DEBUG);
    }

    #[test]
    fn reject_invalid_values() {
        assert!(ClientConf::from_toml("retry_delay = \"soon\"").is_err());
        assert!(ClientConf::from_toml(
            "enable_async_writes = true\nmax_write_ahead_requests = 0"
        )
        .is_err());
    }
}
