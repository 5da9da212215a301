//! Timestamp arithmetic for activity records.
//!
//! Timestamps are stored in UTC; calendar days are always the process-local day.

use chrono::{DateTime, Days, Local, LocalResult, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

const MINUTE_MS: i64 = 60_000;

/// Whole minutes between `start` and `finish`, rounded half up and clamped at zero.
pub fn duration_minutes(start: DateTime<Utc>, finish: DateTime<Utc>) -> i64 {
    let millis = (finish - start).num_milliseconds().max(0);
    (millis + MINUTE_MS / 2) / MINUTE_MS
}

pub fn elapsed_millis(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - start).num_milliseconds().max(0)
}

pub fn is_running(finished_at: Option<DateTime<Utc>>) -> bool {
    finished_at.is_none()
}

/// True when `finish` is strictly after `start`.
pub fn validate_time_range(start: DateTime<Utc>, finish: DateTime<Utc>) -> bool {
    finish > start
}

/// Calendar-day key of a timestamp in local time.
pub fn day_key(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

/// First instant of a local calendar day.
pub fn date_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);

    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(datetime) => datetime.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // midnight skipped by a DST jump
        LocalResult::None => Local
            .from_local_datetime(&(midnight + TimeDelta::hours(1)))
            .earliest()
            .map(|datetime| datetime.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc()),
    }
}

/// Last millisecond of a local calendar day.
///
/// `[date_start(d), date_end(d)]` covers the same instants as the half-open
/// `[date_start(d), date_start(d + 1))` at millisecond resolution.
pub fn date_end(date: NaiveDate) -> DateTime<Utc> {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    date_start(next) - TimeDelta::milliseconds(1)
}

pub fn start_of_day(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    date_start(day_key(timestamp))
}

pub fn end_of_day(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    date_end(day_key(timestamp))
}

/// Start of the local day `days` calendar days before `now`.
pub fn days_ago(days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = day_key(now);
    let target = today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    date_start(target)
}

pub fn format_duration(minutes: i64) -> String {
    if minutes < 1 {
        return "< 1m".to_string();
    }

    let hours = minutes / 60;
    let mins = minutes % 60;

    if hours == 0 {
        format!("{mins}m")
    } else if mins == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {mins}m")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elapsed {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_time_string(self.hours, self.minutes, self.seconds))
    }
}

pub fn format_elapsed(millis: i64) -> Elapsed {
    let total_seconds = millis.max(0) / 1000;

    Elapsed {
        hours: total_seconds / 3600,
        minutes: (total_seconds % 3600) / 60,
        seconds: total_seconds % 60,
    }
}

pub fn format_time_string(hours: i64, minutes: i64, seconds: i64) -> String {
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now - then;
    let days = diff.num_days();
    let hours = diff.num_hours();
    let minutes = diff.num_minutes();

    if days > 0 {
        return if days == 1 {
            "Yesterday".to_string()
        } else {
            format!("{days} days ago")
        };
    }
    if hours > 0 {
        return if hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{hours} hours ago")
        };
    }
    if minutes > 0 {
        return if minutes == 1 {
            "1 minute ago".to_string()
        } else {
            format!("{minutes} minutes ago")
        };
    }

    "Just now".to_string()
}

/// Percentage of `goal_minutes` reached, capped at 100.
pub fn calculate_progress(current_minutes: i64, goal_minutes: i64) -> u32 {
    if goal_minutes <= 0 {
        return 0;
    }

    let ratio = (current_minutes.max(0) as f64 / goal_minutes as f64) * 100.0;
    ratio.round().min(100.0) as u32
}

#[cfg(test)]
pub(crate) fn local(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
) -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .earliest()
        .expect("valid local time")
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_rounds_to_nearest_minute() {
        let start = local(2026, 3, 10, 9, 0);

        assert_eq!(duration_minutes(start, start + TimeDelta::minutes(90)), 90);
        assert_eq!(duration_minutes(start, start + TimeDelta::seconds(29)), 0);
        assert_eq!(duration_minutes(start, start + TimeDelta::seconds(30)), 1);
        assert_eq!(duration_minutes(start, start + TimeDelta::seconds(89)), 1);
        assert_eq!(duration_minutes(start, start + TimeDelta::seconds(90)), 2);
    }

    #[test]
    fn duration_clamps_reversed_range_to_zero() {
        let start = local(2026, 3, 10, 9, 0);
        assert_eq!(duration_minutes(start, start - TimeDelta::hours(2)), 0);
    }

    #[test]
    fn elapsed_never_negative() {
        let start = local(2026, 3, 10, 9, 0);
        assert_eq!(elapsed_millis(start, start + TimeDelta::seconds(5)), 5_000);
        assert_eq!(elapsed_millis(start, start - TimeDelta::seconds(5)), 0);
    }

    #[test]
    fn running_means_no_finish() {
        assert!(is_running(None));
        assert!(!is_running(Some(local(2026, 3, 10, 9, 0))));
    }

    #[test]
    fn time_range_requires_strict_order() {
        let start = local(2026, 3, 10, 9, 0);
        assert!(validate_time_range(start, start + TimeDelta::minutes(1)));
        assert!(!validate_time_range(start, start));
        assert!(!validate_time_range(start, start - TimeDelta::minutes(1)));
    }

    #[test]
    fn day_boundaries_enclose_timestamp() {
        let timestamp = local(2026, 3, 10, 23, 59);
        let start = start_of_day(timestamp);
        let end = end_of_day(timestamp);

        assert_eq!(start, local(2026, 3, 10, 0, 0));
        assert!(start <= timestamp && timestamp <= end);
        assert_eq!(end + TimeDelta::milliseconds(1), local(2026, 3, 11, 0, 0));
        assert_eq!(day_key(end), day_key(start));
    }

    #[test]
    fn days_ago_uses_calendar_days() {
        let now = local(2026, 3, 10, 15, 30);
        assert_eq!(days_ago(0, now), local(2026, 3, 10, 0, 0));
        assert_eq!(days_ago(30, now), local(2026, 2, 8, 0, 0));
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(0), "< 1m");
        assert_eq!(format_duration(45), "45m");
        assert_eq!(format_duration(120), "2h");
        assert_eq!(format_duration(90), "1h 30m");
    }

    #[test]
    fn formats_elapsed_clock() {
        let elapsed = format_elapsed(3_723_000);
        assert_eq!(
            elapsed,
            Elapsed {
                hours: 1,
                minutes: 2,
                seconds: 3
            }
        );
        assert_eq!(elapsed.to_string(), "01:02:03");
    }

    #[test]
    fn formats_relative_time() {
        let now = local(2026, 3, 10, 12, 0);

        assert_eq!(format_relative_time(now - TimeDelta::seconds(20), now), "Just now");
        assert_eq!(format_relative_time(now - TimeDelta::minutes(1), now), "1 minute ago");
        assert_eq!(format_relative_time(now - TimeDelta::minutes(5), now), "5 minutes ago");
        assert_eq!(format_relative_time(now - TimeDelta::hours(1), now), "1 hour ago");
        assert_eq!(format_relative_time(now - TimeDelta::hours(3), now), "3 hours ago");
        assert_eq!(format_relative_time(now - TimeDelta::hours(30), now), "Yesterday");
        assert_eq!(format_relative_time(now - TimeDelta::days(4), now), "4 days ago");
    }

    #[test]
    fn progress_is_capped() {
        assert_eq!(calculate_progress(240, 480), 50);
        assert_eq!(calculate_progress(600, 480), 100);
        assert_eq!(calculate_progress(10, 0), 0);
        assert_eq!(calculate_progress(1, 3), 33);
    }
}
