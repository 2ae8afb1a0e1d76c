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

//! The active log file and its rolling state.
//!
//! [`RollingFileWriter`] is not synchronized; the processor keeps it behind
//! the writer lock, which is distinct from the queue lock so that disk latency
//! never stalls producers.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDateTime;
use snafu::ResultExt;
use tracing::{debug, info};

use crate::{
    Result, RollingInterval,
    clock::Clock,
    error::{CreateDirectorySnafu, OpenFileSnafu, WriteSnafu},
    period::active_file_path,
};

/// An open log file.
#[derive(Debug)]
struct ActiveFile {
    path:         PathBuf,
    writer:       BufWriter<File>,
    /// Start of the period being written; `None` when rolling is disabled.
    period_start: Option<NaiveDateTime>,
}

impl ActiveFile {
    fn open(directory: &Path, interval: Option<RollingInterval>, now: NaiveDateTime) -> Result<Self> {
        let (path, period_start) = active_file_path(directory, interval, now);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(OpenFileSnafu { path: &path })?;
        debug!(path = ?path, "Opened log file");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            period_start,
        })
    }

    fn close(mut self) -> Result<()> {
        self.writer.flush().context(WriteSnafu { path: &self.path })?;
        debug!(path = ?self.path, "Closed log file");
        Ok(())
    }
}

/// Writes lines to `logs.txt` or to period-named files, rolling when the
/// current period has elapsed.
#[derive(Debug)]
pub struct RollingFileWriter {
    directory: PathBuf,
    interval:  Option<RollingInterval>,
    clock:     Arc<dyn Clock>,
    active:    Option<ActiveFile>,
}

impl RollingFileWriter {
    /// Creates `directory` if needed and opens the file for the current time.
    pub fn open(
        directory: impl Into<PathBuf>,
        interval: Option<RollingInterval>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let directory = directory.into();
        create_directory(&directory)?;
        let active = ActiveFile::open(&directory, interval, clock.now())?;
        Ok(Self {
            directory,
            interval,
            clock,
            active: Some(active),
        })
    }

    /// Writes one line, rolling first if the period has elapsed.
    ///
    /// The line is flushed before returning. Writing after [`close`](Self::close)
    /// reopens the active file.
    pub fn write(&mut self, line: &str) -> Result<()> {
        let now = self.clock.now();
        let roll = match (self.interval, self.active.as_ref()) {
            (Some(interval), Some(ActiveFile {
                period_start: Some(start),
                ..
            })) => interval.should_roll(*start, now),
            _ => false,
        };
        if roll {
            self.roll(now)?;
        }

        let mut active = match self.active.take() {
            Some(active) => active,
            None => ActiveFile::open(&self.directory, self.interval, now)?,
        };
        let result = active
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| active.writer.flush())
            .context(WriteSnafu { path: &active.path });
        self.active = Some(active);
        result
    }

    /// Closes the current file and opens the one for the period containing
    /// `now`.
    fn roll(&mut self, now: NaiveDateTime) -> Result<()> {
        if let Some(active) = self.active.take() {
            active.close()?;
        }
        let active = ActiveFile::open(&self.directory, self.interval, now)?;
        info!(path = ?active.path, "Rolled to new log file");
        self.active = Some(active);
        Ok(())
    }

    /// Closes the current file and switches to a new directory and rolling
    /// interval.
    pub fn reconfigure(
        &mut self,
        directory: impl Into<PathBuf>,
        interval: Option<RollingInterval>,
    ) -> Result<()> {
        self.close()?;
        let directory = directory.into();
        create_directory(&directory)?;
        let active = ActiveFile::open(&directory, interval, self.clock.now())?;
        info!(path = ?active.path, "Log file settings updated");
        self.directory = directory;
        self.interval = interval;
        self.active = Some(active);
        Ok(())
    }

    /// Flushes and closes the current file. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match self.active.take() {
            Some(active) => active.close(),
            None => Ok(()),
        }
    }

    /// Path of the file currently open, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }

    pub fn directory(&self) -> &Path { &self.directory }

    pub fn interval(&self) -> Option<RollingInterval> { self.interval }
}

fn create_directory(directory: &Path) -> Result<()> {
    fs::create_dir_all(directory).context(CreateDirectorySnafu { path: directory })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};
    use tempfile::TempDir;

    use super::*;
    use crate::clock::ManualClock;

    fn manual_clock() -> Arc<ManualClock> {
        let now = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(13, 47, 30)
            .unwrap();
        Arc::new(ManualClock::new(now))
    }

    #[test]
    fn test_fixed_file_appends() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs.txt");
        fs::write(&path, "existing\n").unwrap();

        let mut writer = RollingFileWriter::open(temp_dir.path(), None, manual_clock()).unwrap();
        assert_eq!(writer.current_path(), Some(path.as_path()));
        writer.write("first\n").unwrap();
        writer.write("second\n").unwrap();
        writer.close().unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "existing\nfirst\nsecond\n");
    }

    #[test]
    fn test_creates_nested_directory() {
        let temp_dir = TempDir::new().unwrap();
        let directory = temp_dir.path().join("a").join("b");
        let mut writer = RollingFileWriter::open(&directory, None, manual_clock()).unwrap();
        writer.write("line\n").unwrap();
        assert!(directory.join("logs.txt").exists());
    }

    #[test]
    fn test_directory_creation_failure() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let err = RollingFileWriter::open(blocker.join("logs"), None, manual_clock()).unwrap_err();
        assert!(matches!(err, crate::FileLogError::CreateDirectory { .. }));
        assert!(err.is_io());
    }

    #[test]
    fn test_rolls_at_minute_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let clock = manual_clock();
        let mut writer = RollingFileWriter::open(
            temp_dir.path(),
            Some(RollingInterval::Minute),
            clock.clone(),
        )
        .unwrap();

        writer.write("before-1\n").unwrap();
        clock.advance(TimeDelta::seconds(29));
        writer.write("before-2\n").unwrap();
        clock.advance(TimeDelta::seconds(1));
        writer.write("after-1\n").unwrap();
        writer.write("after-2\n").unwrap();
        writer.close().unwrap();

        let old = temp_dir.path().join("logs-202610181347.txt");
        let new = temp_dir.path().join("logs-202610181348.txt");
        assert_eq!(fs::read_to_string(old).unwrap(), "before-1\nbefore-2\n");
        assert_eq!(fs::read_to_string(new).unwrap(), "after-1\nafter-2\n");
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_reconfigure_switches_directory_and_interval() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let mut writer = RollingFileWriter::open(first.path(), None, manual_clock()).unwrap();
        writer.write("one\n").unwrap();

        writer
            .reconfigure(second.path(), Some(RollingInterval::Day))
            .unwrap();
        writer.write("two\n").unwrap();
        writer.close().unwrap();

        assert_eq!(
            fs::read_to_string(first.path().join("logs.txt")).unwrap(),
            "one\n"
        );
        assert_eq!(
            fs::read_to_string(second.path().join("logs-20261018.txt")).unwrap(),
            "two\n"
        );
        assert_eq!(writer.directory(), second.path());
        assert_eq!(writer.interval(), Some(RollingInterval::Day));
    }

    #[test]
    fn test_close_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = RollingFileWriter::open(temp_dir.path(), None, manual_clock()).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.current_path().is_none());
    }
}
