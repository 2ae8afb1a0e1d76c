// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration consumed by the [`LogQueueProcessor`](crate::LogQueueProcessor).
//!
//! Every entry point that accepts these values validates them eagerly, so an
//! invalid capacity or directory is reported where it is assigned and never
//! on the first write.

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ensure;

use crate::{Result, error::InvalidArgumentSnafu};

/// Default directory for log files when none is configured.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default capacity of the in-memory message queue.
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 1024;

/// Producer behavior when the message queue is at capacity.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum QueueFullPolicy {
    /// Block the producer until the consumer frees a slot.
    #[default]
    Wait,
    /// Discard the message and count it; the count is reported as a single
    /// line once space is available again.
    DropWrite,
}

/// Time granularity at which output switches to a new file.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RollingInterval {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

/// File log configuration.
///
/// Deserializes with defaults for missing fields:
///
/// ```json
/// {"directory": "logs", "rolling_interval": "hour", "queue_full_policy": "drop_write", "max_queue_length": 1024}
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct FileLogConfig {
    /// Directory holding the log files. Created on demand.
    #[default(_code = "PathBuf::from(DEFAULT_LOG_DIR)")]
    #[builder(into, default = PathBuf::from(DEFAULT_LOG_DIR))]
    pub directory: PathBuf,

    /// Rolling granularity; `None` writes everything to `logs.txt`.
    pub rolling_interval: Option<RollingInterval>,

    /// What producers do when the queue is full.
    #[builder(default)]
    pub queue_full_policy: QueueFullPolicy,

    /// Capacity of the in-memory queue. Must be positive.
    #[default(DEFAULT_MAX_QUEUE_LENGTH)]
    #[builder(default = DEFAULT_MAX_QUEUE_LENGTH)]
    pub max_queue_length: usize,
}

impl FileLogConfig {
    /// Checks every field, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        validate_max_queue_length(self.max_queue_length)?;
        validate_directory(&self.directory)
    }
}

pub(crate) fn validate_max_queue_length(max_queue_length: usize) -> Result<()> {
    ensure!(
        max_queue_length > 0,
        InvalidArgumentSnafu {
            name:   "max_queue_length",
            reason: "must be a positive integer",
        }
    );
    Ok(())
}

pub(crate) fn validate_directory(directory: &Path) -> Result<()> {
    ensure!(
        !directory.as_os_str().is_empty(),
        InvalidArgumentSnafu {
            name:   "directory",
            reason: "must not be empty",
        }
    );
    ensure!(
        !directory.to_string_lossy().contains('\0'),
        InvalidArgumentSnafu {
            name:   "directory",
            reason: format!("{} contains a NUL byte", directory.display()),
        }
    );
    ensure!(
        directory.extension().is_none(),
        InvalidArgumentSnafu {
            name:   "directory",
            reason: format!("{} looks like a file, expected a directory", directory.display()),
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_case::test_case;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = FileLogConfig::default();
        assert_eq!(config.directory, PathBuf::from("logs"));
        assert_eq!(config.rolling_interval, None);
        assert_eq!(config.queue_full_policy, QueueFullPolicy::Wait);
        assert_eq!(config.max_queue_length, DEFAULT_MAX_QUEUE_LENGTH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_matches_default() {
        assert_eq!(FileLogConfig::builder().build(), FileLogConfig::default());

        let config = FileLogConfig::builder()
            .directory("/var/log/app")
            .rolling_interval(RollingInterval::Hour)
            .queue_full_policy(QueueFullPolicy::DropWrite)
            .max_queue_length(16)
            .build();
        assert_eq!(config.directory, PathBuf::from("/var/log/app"));
        assert_eq!(config.rolling_interval, Some(RollingInterval::Hour));
        assert_eq!(config.queue_full_policy, QueueFullPolicy::DropWrite);
        assert_eq!(config.max_queue_length, 16);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: FileLogConfig =
            serde_json::from_str(r#"{"rolling_interval": "minute", "queue_full_policy": "drop_write"}"#)
                .unwrap();
        assert_eq!(config.rolling_interval, Some(RollingInterval::Minute));
        assert_eq!(config.queue_full_policy, QueueFullPolicy::DropWrite);
        assert_eq!(config.max_queue_length, DEFAULT_MAX_QUEUE_LENGTH);
    }

    #[test]
    fn test_deserialize_rejects_unknown_interval() {
        let result = serde_json::from_str::<FileLogConfig>(r#"{"rolling_interval": "week"}"#);
        assert!(result.is_err());
    }

    #[test_case("wait", QueueFullPolicy::Wait ; "wait")]
    #[test_case("drop_write", QueueFullPolicy::DropWrite ; "drop write")]
    #[test_case("DROP_WRITE", QueueFullPolicy::DropWrite ; "case insensitive")]
    fn test_policy_from_str(input: &str, expected: QueueFullPolicy) {
        assert_eq!(QueueFullPolicy::from_str(input).unwrap(), expected);
    }

    #[test]
    fn test_reject_zero_queue_length() {
        let config = FileLogConfig {
            max_queue_length: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_queue_length"));
    }

    #[test_case("" ; "empty")]
    #[test_case("logs/app.txt" ; "file extension")]
    #[test_case("lo\0gs" ; "nul byte")]
    fn test_reject_bad_directory(directory: &str) {
        let config = FileLogConfig {
            directory: PathBuf::from(directory),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("directory"));
    }
}
