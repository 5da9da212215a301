//! Activity records, tags, and the collaborator traits the tracker core runs against.

pub mod guard;
pub mod tags;
pub mod text;
pub mod time;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logged time span. `finished_at == None` means the activity is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub user_id: String,
    pub description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub tag_ids: Vec<i64>,
}

impl ActivityRecord {
    pub fn is_running(&self) -> bool {
        time::is_running(self.finished_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub color: String,
}

/// An activity together with its resolved tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityWithTags {
    #[serde(flatten)]
    pub activity: ActivityRecord,
    pub tags: Vec<Tag>,
}

/// Fields of a freshly started activity.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub description: Option<String>,
    pub started_at: DateTime<Utc>,
    pub tag_ids: Vec<i64>,
    pub new_tags: Vec<NewTag>,
}

/// A tag that does not exist yet; the store creates it in the same write as the activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// History filter over finished activities. Both bounds are inclusive on `started_at`.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub search: Option<String>,
    pub started_from: Option<DateTime<Utc>>,
    pub started_until: Option<DateTime<Utc>>,
    pub sort: SortOrder,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u32 {
        total.div_ceil(u64::from(self.limit)) as u32
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityPage {
    pub records: Vec<ActivityWithTags>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

/// Activity persistence. "Running" is a query predicate over the store, never cached state.
pub trait ActivityRepository {
    fn find_running(&self, user_id: &str) -> Result<Option<ActivityWithTags>>;

    fn find_activity(&self, user_id: &str, id: i64) -> Result<Option<ActivityWithTags>>;

    /// Inserts the activity and `fields.new_tags` atomically; the returned record lists
    /// every linked tag id.
    fn create_activity(&self, user_id: &str, fields: &NewActivity) -> Result<ActivityRecord>;

    /// Overwrites the mutable fields (description, times, duration, tags) of `record`.
    /// `new_tags` are created and linked in the same write.
    fn update_activity(
        &self,
        record: &ActivityRecord,
        new_tags: &[NewTag],
    ) -> Result<ActivityRecord>;

    fn delete_activity(&self, id: i64) -> Result<()>;

    /// Finished activities whose `started_at` lies in `[start, end]`.
    fn find_finished_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityWithTags>>;

    /// One page of finished activities plus the total match count.
    fn find_all(
        &self,
        user_id: &str,
        filter: &ActivityFilter,
        pagination: Pagination,
    ) -> Result<(Vec<ActivityWithTags>, u64)>;
}

pub trait ProfileStore {
    /// `None` when the user never configured a goal.
    fn daily_goal(&self, user_id: &str) -> Result<Option<i64>>;

    fn set_daily_goal(&self, user_id: &str, minutes: i64) -> Result<()>;
}

pub trait TagStore {
    /// Tags of a user ordered by name.
    fn list_tags(&self, user_id: &str) -> Result<Vec<Tag>>;

    fn find_tag(&self, user_id: &str, id: i64) -> Result<Option<Tag>>;

    /// Case-insensitive lookup.
    fn find_tag_by_name(&self, user_id: &str, name: &str) -> Result<Option<Tag>>;

    fn insert_tag(&self, user_id: &str, name: &str, color: &str) -> Result<Tag>;

    fn update_tag(&self, tag: &Tag) -> Result<Tag>;

    /// Detaches the tag from every activity, then removes it.
    fn delete_tag(&self, id: i64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::Pagination;

    #[test]
    fn pagination_clamps_and_counts_pages() {
        let pagination = Pagination::new(0, 500);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, 100);

        let pagination = Pagination::new(3, 20);
        assert_eq!(pagination.offset(), 40);
        assert_eq!(pagination.total_pages(41), 3);
        assert_eq!(pagination.total_pages(40), 2);
        assert_eq!(pagination.total_pages(0), 0);
    }
}
