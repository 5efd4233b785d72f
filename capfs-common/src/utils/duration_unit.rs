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
use std::str::FromStr;
use std::time::Duration;

/// A human readable duration such as `500ms`, `15s`, `10m`, `6h` or `1d`.
/// A bare number is read as milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationUnit {
    mills: u64,
}

impl DurationUnit {
    pub fn new(mills: u64) -> Self {
        Self { mills }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.mills)
    }

    pub fn as_millis(&self) -> u64 {
        self.mills
    }
}

impl FromStr for DurationUnit {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (num, unit) = s.split_at(split);
        if num.is_empty() {
            return Err(FsError::config(format!("invalid duration: '{}'", s)));
        }

        let value: u64 = num
            .parse()
            .map_err(|_| FsError::config(format!("invalid duration: '{}'", s)))?;

        let factor = match unit.trim() {
            "" | "ms" => 1,
            "s" => 1000,
            "m" | "min" => 60 * 1000,
            "h" => 60 * 60 * 1000,
            "d" => 24 * 60 * 60 * 1000,
            other => {
                return Err(FsError::config(format!(
                    "invalid duration unit '{}' in '{}'",
                    other, s
                )))
            }
        };

        Ok(Self::new(value * factor))
    }
}
