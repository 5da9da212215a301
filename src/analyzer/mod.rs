pub mod report;
pub mod streak;

use crate::error::{Result, TrackerError, require_user};
use crate::tracker::time::{calculate_progress, date_end, date_start, day_key, days_ago};
use crate::tracker::{ActivityRepository, ActivityWithTags, ProfileStore, Tag};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

pub const DEFAULT_DAILY_GOAL_MINUTES: i64 = 480;
pub const MAX_DAILY_GOAL_MINUTES: i64 = 1440;
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub total_minutes: i64,
    pub activity_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagBucket {
    pub tag: Tag,
    pub total_minutes: i64,
    pub activity_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsResult {
    pub daily_buckets: Vec<DailyBucket>,
    pub tag_buckets: Vec<TagBucket>,
    pub total_minutes: i64,
    pub total_activities: usize,
    pub average_minutes_per_active_day: i64,
    pub longest_session_minutes: i64,
    pub current_streak_days: u32,
    pub daily_goal_minutes: i64,
}

impl AnalyticsResult {
    pub fn minutes_on(&self, date: NaiveDate) -> i64 {
        self.daily_buckets
            .iter()
            .find(|bucket| bucket.date == date)
            .map(|bucket| bucket.total_minutes)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total_minutes: i64,
    pub activity_count: u32,
    pub goal_minutes: i64,
    pub progress_percent: u32,
}

/// Aggregates finished activities into day and tag buckets, totals and the streak.
///
/// Running records are skipped. A record belongs to the day it started on.
pub fn build_analytics(
    records: &[ActivityWithTags],
    daily_goal_minutes: i64,
    today: NaiveDate,
) -> AnalyticsResult {
    let finished = records
        .iter()
        .filter(|record| !record.activity.is_running())
        .collect::<Vec<_>>();

    let daily_buckets = daily_buckets(&finished);
    let tag_buckets = tag_buckets(&finished);

    let total_minutes = finished.iter().map(|record| minutes_of(record)).sum::<i64>();
    let active_days = daily_buckets.len() as i64;
    let average_minutes_per_active_day = if active_days == 0 {
        0
    } else {
        (total_minutes + active_days / 2) / active_days
    };
    let longest_session_minutes = finished
        .iter()
        .map(|record| minutes_of(record))
        .max()
        .unwrap_or_default();

    let current_streak_days = streak::current_streak(&daily_buckets, today);

    AnalyticsResult {
        daily_buckets,
        tag_buckets,
        total_minutes,
        total_activities: finished.len(),
        average_minutes_per_active_day,
        longest_session_minutes,
        current_streak_days,
        daily_goal_minutes,
    }
}

/// Analytics over the last `days` calendar days up to `now`.
pub fn get_analytics<S>(
    store: &S,
    user_id: &str,
    days: u32,
    now: DateTime<Utc>,
) -> Result<AnalyticsResult>
where
    S: ActivityRepository + ProfileStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    let window_start = days_ago(days, now);
    let records = store.find_finished_in_range(user_id, window_start, now)?;
    let goal = daily_goal(store, user_id)?;

    debug!(user_id, days, records = records.len(), "aggregating analytics");

    Ok(build_analytics(&records, goal, day_key(now)))
}

/// Finished minutes logged on one local calendar day, with goal progress.
pub fn daily_total<S>(store: &S, user_id: &str, date: NaiveDate) -> Result<DailyTotal>
where
    S: ActivityRepository + ProfileStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    let records = store.find_finished_in_range(user_id, date_start(date), date_end(date))?;
    let goal_minutes = daily_goal(store, user_id)?;

    let total_minutes = records.iter().map(minutes_of).sum::<i64>();

    Ok(DailyTotal {
        date,
        total_minutes,
        activity_count: records.len() as u32,
        goal_minutes,
        progress_percent: calculate_progress(total_minutes, goal_minutes),
    })
}

pub fn daily_goal<S>(store: &S, user_id: &str) -> Result<i64>
where
    S: ProfileStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    Ok(store
        .daily_goal(user_id)?
        .unwrap_or(DEFAULT_DAILY_GOAL_MINUTES))
}

pub fn set_daily_goal<S>(store: &S, user_id: &str, minutes: i64) -> Result<()>
where
    S: ProfileStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    if !(0..=MAX_DAILY_GOAL_MINUTES).contains(&minutes) {
        return Err(TrackerError::Validation(format!(
            "Daily goal must be between 0 and {MAX_DAILY_GOAL_MINUTES} minutes"
        )));
    }

    store.set_daily_goal(user_id, minutes)?;
    info!(user_id, minutes, "daily goal updated");

    Ok(())
}

fn daily_buckets(records: &[&ActivityWithTags]) -> Vec<DailyBucket> {
    let buckets = records.iter().fold(BTreeMap::new(), |mut acc, record| {
        let date = day_key(record.activity.started_at);
        let bucket = acc.entry(date).or_insert(DailyBucket {
            date,
            total_minutes: 0,
            activity_count: 0,
        });
        bucket.total_minutes += minutes_of(record);
        bucket.activity_count += 1;
        acc
    });

    buckets.into_values().collect()
}

fn tag_buckets(records: &[&ActivityWithTags]) -> Vec<TagBucket> {
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut buckets: Vec<TagBucket> = Vec::new();

    for record in records {
        let minutes = minutes_of(record);
        for tag in &record.tags {
            let index = *positions.entry(tag.id).or_insert_with(|| {
                buckets.push(TagBucket {
                    tag: tag.clone(),
                    total_minutes: 0,
                    activity_count: 0,
                });
                buckets.len() - 1
            });
            buckets[index].total_minutes += minutes;
            buckets[index].activity_count += 1;
        }
    }

    // stable: ties keep encounter order
    buckets.sort_by(|left, right| right.total_minutes.cmp(&left.total_minutes));
    buckets
}

fn minutes_of(record: &ActivityWithTags) -> i64 {
    record.activity.duration_minutes.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_temp;
    use crate::tracker::guard::{StartRequest, try_finish, try_start};
    use crate::tracker::time::{duration_minutes, local};
    use crate::tracker::{ActivityRecord, TagStore};
    use chrono::TimeDelta;

    fn tag(id: i64, name: &str) -> Tag {
        Tag {
            id,
            user_id: "alice".to_string(),
            name: name.to_string(),
            color: "#3b82f6".to_string(),
        }
    }

    fn record(
        id: i64,
        started_at: DateTime<Utc>,
        finished_at: Option<DateTime<Utc>>,
        tags: Vec<Tag>,
    ) -> ActivityWithTags {
        ActivityWithTags {
            activity: ActivityRecord {
                id,
                user_id: "alice".to_string(),
                description: None,
                started_at,
                finished_at,
                duration_minutes: finished_at.map(|finish| duration_minutes(started_at, finish)),
                tag_ids: tags.iter().map(|tag| tag.id).collect(),
            },
            tags,
        }
    }

    #[test]
    fn two_consecutive_days_end_to_end() {
        let a = tag(1, "A");
        let b = tag(2, "B");
        let day0 = local(2026, 3, 9, 9, 0);
        let day1 = local(2026, 3, 10, 9, 0);
        let records = vec![
            record(1, day0, Some(day0 + TimeDelta::minutes(90)), vec![a.clone()]),
            record(
                2,
                day1,
                Some(day1 + TimeDelta::minutes(45)),
                vec![a.clone(), b.clone()],
            ),
        ];

        let result = build_analytics(&records, 480, day_key(day1));

        assert_eq!(result.total_minutes, 135);
        assert_eq!(result.total_activities, 2);
        assert_eq!(result.daily_buckets.len(), 2);
        assert_eq!(result.daily_buckets[0].date, day_key(day0));
        assert_eq!(result.daily_buckets[0].total_minutes, 90);
        assert_eq!(result.daily_buckets[1].total_minutes, 45);
        assert_eq!(result.tag_buckets[0].tag, a);
        assert_eq!(result.tag_buckets[0].total_minutes, 135);
        assert_eq!(result.tag_buckets[0].activity_count, 2);
        assert_eq!(result.tag_buckets[1].tag, b);
        assert_eq!(result.tag_buckets[1].total_minutes, 45);
        assert_eq!(result.average_minutes_per_active_day, 68);
        assert_eq!(result.longest_session_minutes, 90);
        assert_eq!(result.current_streak_days, 2);
        assert_eq!(result.daily_goal_minutes, 480);
        assert_eq!(result.minutes_on(day_key(day1)), 45);
    }

    #[test]
    fn average_rounds_half_up_over_active_days() {
        let day0 = local(2026, 3, 8, 9, 0);
        let records = [(0, 10), (1, 11), (2, 11)]
            .into_iter()
            .map(|(offset, minutes)| {
                let start = day0 + TimeDelta::days(offset);
                record(offset + 1, start, Some(start + TimeDelta::minutes(minutes)), Vec::new())
            })
            .collect::<Vec<_>>();

        let result = build_analytics(&records, 480, day_key(day0 + TimeDelta::days(2)));
        assert_eq!(result.average_minutes_per_active_day, 11);

        let result = build_analytics(&records[..1], 480, day_key(day0));
        assert_eq!(result.average_minutes_per_active_day, 10);
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let result = build_analytics(&[], 300, day_key(local(2026, 3, 10, 9, 0)));

        assert!(result.daily_buckets.is_empty());
        assert!(result.tag_buckets.is_empty());
        assert_eq!(result.total_minutes, 0);
        assert_eq!(result.average_minutes_per_active_day, 0);
        assert_eq!(result.longest_session_minutes, 0);
        assert_eq!(result.current_streak_days, 0);
        assert_eq!(result.daily_goal_minutes, 300);
    }

    #[test]
    fn record_spanning_midnight_counts_on_start_day() {
        let start = local(2026, 3, 9, 23, 30);
        let records = vec![record(1, start, Some(start + TimeDelta::minutes(60)), Vec::new())];

        let result = build_analytics(&records, 480, day_key(start));

        assert_eq!(result.daily_buckets.len(), 1);
        assert_eq!(result.daily_buckets[0].date, day_key(start));
        assert_eq!(result.daily_buckets[0].total_minutes, 60);
    }

    #[test]
    fn daily_totals_match_record_sum_and_running_is_skipped() {
        let start = local(2026, 3, 8, 10, 0);
        let records = vec![
            record(1, start, Some(start + TimeDelta::minutes(20)), Vec::new()),
            record(2, start + TimeDelta::hours(2), Some(start + TimeDelta::hours(3)), Vec::new()),
            record(
                3,
                start + TimeDelta::days(1),
                Some(start + TimeDelta::days(1) + TimeDelta::minutes(7)),
                Vec::new(),
            ),
            record(4, start + TimeDelta::days(2), None, Vec::new()),
        ];

        let result = build_analytics(&records, 480, day_key(start + TimeDelta::days(2)));
        let bucket_sum = result
            .daily_buckets
            .iter()
            .map(|bucket| bucket.total_minutes)
            .sum::<i64>();

        assert_eq!(result.total_activities, 3);
        assert_eq!(bucket_sum, result.total_minutes);
        assert_eq!(result.total_minutes, 87);
        assert_eq!(result.current_streak_days, 2);
    }

    #[test]
    fn tag_ties_keep_encounter_order() {
        let start = local(2026, 3, 10, 8, 0);
        let records = vec![
            record(1, start, Some(start + TimeDelta::minutes(30)), vec![tag(7, "late")]),
            record(
                2,
                start + TimeDelta::hours(1),
                Some(start + TimeDelta::hours(1) + TimeDelta::minutes(30)),
                vec![tag(3, "early")],
            ),
        ];

        let result = build_analytics(&records, 480, day_key(start));
        let names = result
            .tag_buckets
            .iter()
            .map(|bucket| bucket.tag.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["late", "early"]);
    }

    #[test]
    fn daily_goal_defaults_and_validates_range() {
        let (_dir, database) = open_temp();

        assert_eq!(daily_goal(&database, "alice").expect("goal"), 480);
        assert!(matches!(
            set_daily_goal(&database, "alice", 1441),
            Err(TrackerError::Validation(_))
        ));
        assert!(matches!(
            set_daily_goal(&database, "alice", -1),
            Err(TrackerError::Validation(_))
        ));
        assert_eq!(daily_goal(&database, "alice").expect("goal"), 480);

        set_daily_goal(&database, "alice", 0).expect("zero is a valid goal");
        assert_eq!(daily_goal(&database, "alice").expect("goal"), 0);
        set_daily_goal(&database, "alice", 1440).expect("upper bound");
        assert_eq!(daily_goal(&database, "alice").expect("goal"), 1440);
    }

    #[test]
    fn analytics_and_daily_total_read_from_store() {
        let (_dir, database) = open_temp();
        let focus = database.insert_tag("alice", "Focus", "#ef4444").expect("tag");
        let now = local(2026, 3, 10, 18, 0);
        set_daily_goal(&database, "alice", 120).expect("goal");

        let sessions = [
            (now - TimeDelta::days(40), 50),
            (now - TimeDelta::days(1), 30),
            (now - TimeDelta::hours(3), 60),
        ];
        for (start, minutes) in sessions {
            let request = StartRequest {
                tag_ids: vec![focus.id],
                ..StartRequest::default()
            };
            try_start(&database, "alice", request, start).expect("start");
            try_finish(&database, "alice", start + TimeDelta::minutes(minutes)).expect("finish");
        }

        let result = get_analytics(&database, "alice", 30, now).expect("analytics");
        assert_eq!(result.total_activities, 2);
        assert_eq!(result.total_minutes, 90);
        assert_eq!(result.current_streak_days, 2);
        assert_eq!(result.daily_goal_minutes, 120);
        assert_eq!(result.tag_buckets.len(), 1);
        assert_eq!(result.tag_buckets[0].total_minutes, 90);

        let total = daily_total(&database, "alice", day_key(now)).expect("total");
        assert_eq!(total.total_minutes, 60);
        assert_eq!(total.activity_count, 1);
        assert_eq!(total.progress_percent, 50);
    }
}
