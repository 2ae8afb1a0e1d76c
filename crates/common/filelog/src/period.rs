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

//! Rolling period arithmetic and log file naming.
//!
//! File names use the true calendar start of the period (`logs-20261018.txt`
//! for a day), while the decision to roll compares against
//! `period_start + approximate_duration`, where months are 30 days and years
//! 365 days.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::RollingInterval;

/// File name used when rolling is disabled.
pub const FIXED_FILE_NAME: &str = "logs.txt";

impl RollingInterval {
    /// Calendar-aligned start of the period containing `now`.
    pub fn period_start(self, now: NaiveDateTime) -> NaiveDateTime {
        let date = now.date();
        match self {
            Self::Year => (date - Days::new(u64::from(date.ordinal0()))).and_time(NaiveTime::MIN),
            Self::Month => (date - Days::new(u64::from(date.day0()))).and_time(NaiveTime::MIN),
            Self::Day => date.and_time(NaiveTime::MIN),
            Self::Hour => date.and_time(NaiveTime::MIN + TimeDelta::hours(i64::from(now.hour()))),
            Self::Minute => date.and_time(
                NaiveTime::MIN
                    + TimeDelta::hours(i64::from(now.hour()))
                    + TimeDelta::minutes(i64::from(now.minute())),
            ),
        }
    }

    /// Length of a period as used by the roll check.
    pub fn approximate_duration(self) -> TimeDelta {
        match self {
            Self::Year => TimeDelta::days(365),
            Self::Month => TimeDelta::days(30),
            Self::Day => TimeDelta::days(1),
            Self::Hour => TimeDelta::hours(1),
            Self::Minute => TimeDelta::minutes(1),
        }
    }

    /// `chrono` format string of the period component in file names.
    pub const fn period_format(self) -> &'static str {
        match self {
            Self::Year => "%Y",
            Self::Month => "%Y%m",
            Self::Day => "%Y%m%d",
            Self::Hour => "%Y%m%d%H",
            Self::Minute => "%Y%m%d%H%M",
        }
    }

    /// Whether a file opened for `period_start` must be replaced at `now`.
    pub fn should_roll(self, period_start: NaiveDateTime, now: NaiveDateTime) -> bool {
        now >= period_start + self.approximate_duration()
    }
}

/// Generates a period file name: `logs-<period>.txt`.
pub fn period_file_name(interval: RollingInterval, period_start: NaiveDateTime) -> String {
    format!("logs-{}.txt", period_start.format(interval.period_format()))
}

/// Resolves the file to write at `now`, returning its path and, when rolling
/// is enabled, the start of its period.
pub fn active_file_path<P: AsRef<Path>>(
    directory: P,
    interval: Option<RollingInterval>,
    now: NaiveDateTime,
) -> (PathBuf, Option<NaiveDateTime>) {
    let directory = directory.as_ref();
    match interval {
        None => (directory.join(FIXED_FILE_NAME), None),
        Some(interval) => {
            let start = interval.period_start(now);
            (directory.join(period_file_name(interval, start)), Some(start))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use strum::IntoEnumIterator;
    use test_case::test_case;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test_case(RollingInterval::Year, at(2026, 1, 1, 0, 0, 0) ; "year")]
    #[test_case(RollingInterval::Month, at(2026, 10, 1, 0, 0, 0) ; "month")]
    #[test_case(RollingInterval::Day, at(2026, 10, 18, 0, 0, 0) ; "day")]
    #[test_case(RollingInterval::Hour, at(2026, 10, 18, 13, 0, 0) ; "hour")]
    #[test_case(RollingInterval::Minute, at(2026, 10, 18, 13, 47, 0) ; "minute")]
    fn test_period_start(interval: RollingInterval, expected: NaiveDateTime) {
        let now = at(2026, 10, 18, 13, 47, 29);
        assert_eq!(interval.period_start(now), expected);
    }

    #[test_case(RollingInterval::Year, "logs-2026.txt" ; "year")]
    #[test_case(RollingInterval::Month, "logs-202603.txt" ; "month")]
    #[test_case(RollingInterval::Day, "logs-20260305.txt" ; "day")]
    #[test_case(RollingInterval::Hour, "logs-2026030507.txt" ; "hour")]
    #[test_case(RollingInterval::Minute, "logs-202603050709.txt" ; "minute")]
    fn test_period_file_name(interval: RollingInterval, expected: &str) {
        let start = interval.period_start(at(2026, 3, 5, 7, 9, 59));
        assert_eq!(period_file_name(interval, start), expected);
    }

    #[test]
    fn test_fixed_file_without_interval() {
        let (path, start) = active_file_path("/logs", None, at(2026, 3, 5, 7, 9, 59));
        assert_eq!(path, PathBuf::from("/logs/logs.txt"));
        assert_eq!(start, None);
    }

    #[test]
    fn test_period_start_is_idempotent() {
        let now = at(2024, 2, 29, 23, 59, 59);
        for interval in RollingInterval::iter() {
            let start = interval.period_start(now);
            assert_eq!(interval.period_start(start), start);
            assert!(!interval.should_roll(start, now));
        }
    }

    #[test]
    fn test_should_roll_at_boundary() {
        let start = at(2026, 10, 18, 13, 47, 0);
        let interval = RollingInterval::Minute;
        assert!(!interval.should_roll(start, at(2026, 10, 18, 13, 47, 59)));
        assert!(interval.should_roll(start, at(2026, 10, 18, 13, 48, 0)));
    }

    #[test]
    fn test_month_roll_uses_thirty_days() {
        let start = RollingInterval::Month.period_start(at(2026, 1, 15, 0, 0, 0));
        assert_eq!(start, at(2026, 1, 1, 0, 0, 0));
        assert!(!RollingInterval::Month.should_roll(start, at(2026, 1, 30, 23, 59, 59)));
        // Rolls on the 31st even though January has not ended.
        assert!(RollingInterval::Month.should_roll(start, at(2026, 1, 31, 0, 0, 0)));
    }
}
