pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id          TEXT PRIMARY KEY,
  daily_goal  INTEGER
);
"#;

pub const CREATE_ACTIVITIES: &str = r#"
CREATE TABLE IF NOT EXISTS activities (
  id               INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id          TEXT NOT NULL,
  description      TEXT,
  started_at       INTEGER NOT NULL,
  finished_at      INTEGER,
  duration_minutes INTEGER
);
"#;

pub const CREATE_TAGS: &str = r#"
CREATE TABLE IF NOT EXISTS tags (
  id       INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id  TEXT NOT NULL,
  name     TEXT NOT NULL COLLATE NOCASE,
  color    TEXT NOT NULL,
  UNIQUE (user_id, name)
);
"#;

pub const CREATE_ACTIVITY_TAGS: &str = r#"
CREATE TABLE IF NOT EXISTS activity_tags (
  activity_id  INTEGER NOT NULL REFERENCES activities(id) ON DELETE CASCADE,
  tag_id       INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
  PRIMARY KEY (activity_id, tag_id)
);
"#;

/// At most one unfinished activity per user, enforced by the store itself.
pub const INDEX_ACTIVITIES_RUNNING: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_activities_running ON activities(user_id) WHERE finished_at IS NULL;";

pub const INDEX_ACTIVITIES_USER_STARTED: &str = "CREATE INDEX IF NOT EXISTS idx_activities_user_started ON activities(user_id, started_at);";

pub const INDEX_ACTIVITY_TAGS_TAG: &str =
    "CREATE INDEX IF NOT EXISTS idx_activity_tags_tag ON activity_tags(tag_id);";

pub const SELECT_ACTIVITY_COLUMNS: &str =
    "SELECT id, user_id, description, started_at, finished_at, duration_minutes FROM activities";

pub const SELECT_TAG_COLUMNS: &str = "SELECT id, user_id, name, color FROM tags";

/// Shared WHERE clause of the history listing and its count.
pub const HISTORY_WHERE: &str = "WHERE user_id = ?1
       AND finished_at IS NOT NULL
       AND (?2 IS NULL OR unicode_lower(description) LIKE ?2 ESCAPE '\\')
       AND (?3 IS NULL OR started_at >= ?3)
       AND (?4 IS NULL OR started_at <= ?4)";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_ACTIVITIES,
        CREATE_TAGS,
        CREATE_ACTIVITY_TAGS,
        INDEX_ACTIVITIES_RUNNING,
        INDEX_ACTIVITIES_USER_STARTED,
        INDEX_ACTIVITY_TAGS_TAG,
    ]
}
