//! Write path for activities: the single-running-activity invariant plus edits.
//!
//! The guard checks for a running record before creating one. That check alone is not
//! atomic; stores are expected to back it with their own uniqueness constraint (the
//! SQLite store does) and report a violation as [`TrackerError::Conflict`].

use crate::error::{Result, TrackerError, require_user};
use crate::tracker::time::{date_end, date_start, days_ago, duration_minutes, validate_time_range};
use crate::tracker::{
    ActivityFilter, ActivityPage, ActivityRecord, ActivityRepository, ActivityWithTags,
    NewActivity, NewTag, Pagination, SortOrder, TagStore, tags,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    pub description: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    /// Tags by name; unknown names become new tags, written only if the start succeeds.
    #[serde(default)]
    pub tag_names: Vec<String>,
}

/// Manual edit of an activity. Absent fields stay unchanged; an empty description clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityPatch {
    pub description: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tag_ids: Option<Vec<i64>>,
    pub tag_names: Option<Vec<String>>,
}

pub fn running<R>(repo: &R, user_id: &str) -> Result<Option<ActivityWithTags>>
where
    R: ActivityRepository + ?Sized,
{
    let user_id = require_user(user_id)?;
    repo.find_running(user_id)
}

/// Starts a new running activity, failing with `Conflict` while another one runs.
pub fn try_start<R>(
    repo: &R,
    user_id: &str,
    request: StartRequest,
    now: DateTime<Utc>,
) -> Result<ActivityRecord>
where
    R: ActivityRepository + TagStore + ?Sized,
{
    let user_id = require_user(user_id)?;

    if let Some(existing) = repo.find_running(user_id)? {
        warn!(
            user_id,
            running_id = existing.activity.id,
            "rejected start while another activity is running"
        );
        return Err(TrackerError::already_running());
    }

    let (tag_ids, new_tags) = resolve_tags(repo, user_id, request.tag_ids, &request.tag_names)?;
    let fields = NewActivity {
        description: normalize_description(request.description),
        started_at: now,
        tag_ids,
        new_tags,
    };

    let record = repo.create_activity(user_id, &fields)?;
    info!(
        user_id,
        activity_id = record.id,
        new_tags = fields.new_tags.len(),
        "activity started"
    );

    Ok(record)
}

/// Finishes the running activity at `now` and persists its duration.
pub fn try_finish<R>(repo: &R, user_id: &str, now: DateTime<Utc>) -> Result<ActivityRecord>
where
    R: ActivityRepository + ?Sized,
{
    let user_id = require_user(user_id)?;
    let mut record = repo
        .find_running(user_id)?
        .ok_or_else(TrackerError::no_running)?
        .activity;

    record.finished_at = Some(now);
    record.duration_minutes = Some(duration_minutes(record.started_at, now));

    let record = repo.update_activity(&record, &[])?;
    info!(
        user_id,
        activity_id = record.id,
        minutes = record.duration_minutes,
        "activity finished"
    );

    Ok(record)
}

/// Discards the running activity without logging it.
pub fn cancel<R>(repo: &R, user_id: &str) -> Result<ActivityRecord>
where
    R: ActivityRepository + ?Sized,
{
    let user_id = require_user(user_id)?;
    let record = repo
        .find_running(user_id)?
        .ok_or_else(TrackerError::no_running)?
        .activity;

    repo.delete_activity(record.id)?;
    info!(user_id, activity_id = record.id, "running activity cancelled");

    Ok(record)
}

/// Applies a manual edit. A finish that is not strictly after the start is rejected
/// before anything is written.
pub fn edit<R>(repo: &R, user_id: &str, id: i64, patch: ActivityPatch) -> Result<ActivityRecord>
where
    R: ActivityRepository + TagStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    let mut record = repo
        .find_activity(user_id, id)?
        .ok_or_else(|| TrackerError::activity_not_found(id))?
        .activity;

    if let Some(description) = patch.description {
        record.description = normalize_description(Some(description));
    }
    if let Some(started_at) = patch.started_at {
        record.started_at = started_at;
    }
    if let Some(finished_at) = patch.finished_at {
        record.finished_at = Some(finished_at);
    }
    let mut new_tags = Vec::new();
    if patch.tag_ids.is_some() || patch.tag_names.is_some() {
        let (tag_ids, missing) = resolve_tags(
            repo,
            user_id,
            patch.tag_ids.unwrap_or_default(),
            &patch.tag_names.unwrap_or_default(),
        )?;
        record.tag_ids = tag_ids;
        new_tags = missing;
    }

    if let Some(finished_at) = record.finished_at {
        if !validate_time_range(record.started_at, finished_at) {
            return Err(TrackerError::Validation(
                "Finish time must be after start time".to_string(),
            ));
        }
        record.duration_minutes = Some(duration_minutes(record.started_at, finished_at));
    }

    let record = repo.update_activity(&record, &new_tags)?;
    info!(user_id, activity_id = record.id, "activity edited");

    Ok(record)
}

pub fn delete<R>(repo: &R, user_id: &str, id: i64) -> Result<()>
where
    R: ActivityRepository + ?Sized,
{
    let user_id = require_user(user_id)?;
    if repo.find_activity(user_id, id)?.is_none() {
        return Err(TrackerError::activity_not_found(id));
    }

    repo.delete_activity(id)?;
    info!(user_id, activity_id = id, "activity deleted");

    Ok(())
}

/// Paged history of finished activities.
pub fn history<R>(
    repo: &R,
    user_id: &str,
    filter: &ActivityFilter,
    pagination: Pagination,
) -> Result<ActivityPage>
where
    R: ActivityRepository + ?Sized,
{
    let user_id = require_user(user_id)?;
    let (records, total) = repo.find_all(user_id, filter, pagination)?;

    Ok(ActivityPage {
        records,
        total,
        page: pagination.page,
        total_pages: pagination.total_pages(total),
    })
}

/// Filter for the finished activities started on one local calendar day.
pub fn day_filter(date: NaiveDate, search: Option<String>, sort: SortOrder) -> ActivityFilter {
    ActivityFilter {
        search,
        started_from: Some(date_start(date)),
        started_until: Some(date_end(date)),
        sort,
    }
}

/// Newest finished activities started within the last `days` calendar days.
pub fn recent<R>(
    repo: &R,
    user_id: &str,
    days: u32,
    limit: u32,
    now: DateTime<Utc>,
) -> Result<Vec<ActivityWithTags>>
where
    R: ActivityRepository + ?Sized,
{
    let filter = ActivityFilter {
        search: None,
        started_from: Some(days_ago(days, now)),
        started_until: Some(now),
        sort: SortOrder::Desc,
    };

    Ok(history(repo, user_id, &filter, Pagination::new(1, limit))?.records)
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Owned tag ids plus the named tags that still have to be created. Nothing is written.
fn resolve_tags<R>(
    repo: &R,
    user_id: &str,
    mut tag_ids: Vec<i64>,
    tag_names: &[String],
) -> Result<(Vec<i64>, Vec<NewTag>)>
where
    R: TagStore + ?Sized,
{
    let plan = tags::plan_tags(repo, user_id, tag_names)?;
    tag_ids.extend(plan.existing);

    Ok((owned_tag_ids(repo, user_id, tag_ids)?, plan.missing))
}

fn owned_tag_ids<R>(repo: &R, user_id: &str, mut tag_ids: Vec<i64>) -> Result<Vec<i64>>
where
    R: TagStore + ?Sized,
{
    tag_ids.sort_unstable();
    tag_ids.dedup();

    for tag_id in &tag_ids {
        if repo.find_tag(user_id, *tag_id)?.is_none() {
            return Err(TrackerError::tag_not_found(*tag_id));
        }
    }

    Ok(tag_ids)
}
