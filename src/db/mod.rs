pub mod queries;

use crate::error::{Result, TrackerError};
use crate::tracker::{
    ActivityFilter, ActivityRecord, ActivityRepository, ActivityWithTags, NewActivity, NewTag,
    Pagination, ProfileStore, Tag, TagStore,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use queries::{HISTORY_WHERE, SELECT_ACTIVITY_COLUMNS, SELECT_TAG_COLUMNS};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Row, ffi, params};
use std::fs;
use std::path::Path;

/// SQLite-backed store for activities, tags and user profiles.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;
        register_functions(&conn)?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    fn tags_for_activity(&self, activity_id: i64) -> anyhow::Result<Vec<Tag>> {
        let mut statement = self.conn.prepare(
            "SELECT t.id, t.user_id, t.name, t.color
             FROM tags t
             JOIN activity_tags at ON at.tag_id = t.id
             WHERE at.activity_id = ?1
             ORDER BY t.name ASC",
        )?;

        let tags = statement
            .query_map(params![activity_id], tag_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query activity tags")?;

        Ok(tags)
    }

    fn with_tags(&self, mut activity: ActivityRecord) -> Result<ActivityWithTags> {
        let tags = self.tags_for_activity(activity.id)?;
        activity.tag_ids = tags.iter().map(|tag| tag.id).collect();

        Ok(ActivityWithTags { activity, tags })
    }

    fn activities_with_tags(
        &self,
        rows: Vec<ActivityRecord>,
    ) -> Result<Vec<ActivityWithTags>> {
        rows.into_iter()
            .map(|activity| self.with_tags(activity))
            .collect()
    }
}

impl ActivityRepository for Database {
    fn find_running(&self, user_id: &str) -> Result<Option<ActivityWithTags>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "{SELECT_ACTIVITY_COLUMNS} WHERE user_id = ?1 AND finished_at IS NULL LIMIT 1"
                ),
                params![user_id],
                activity_from_row,
            )
            .optional()
            .context("Failed to query running activity")?;

        row.map(|activity| self.with_tags(activity)).transpose()
    }

    fn find_activity(&self, user_id: &str, id: i64) -> Result<Option<ActivityWithTags>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_ACTIVITY_COLUMNS} WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                activity_from_row,
            )
            .optional()
            .context("Failed to query activity")?;

        row.map(|activity| self.with_tags(activity)).transpose()
    }

    fn create_activity(&self, user_id: &str, fields: &NewActivity) -> Result<ActivityRecord> {
        let transaction = self
            .conn
            .unchecked_transaction()
            .context("Failed to start transaction")?;

        let inserted = transaction.execute(
            "INSERT INTO activities (user_id, description, started_at, finished_at, duration_minutes)
             VALUES (?1, ?2, ?3, NULL, NULL)",
            params![
                user_id,
                fields.description,
                fields.started_at.timestamp_millis()
            ],
        );

        match inserted {
            Err(error) if is_unique_violation(&error) => {
                return Err(TrackerError::already_running());
            }
            other => {
                other.context("Failed to insert activity")?;
            }
        }

        let id = transaction.last_insert_rowid();
        let mut tag_ids = fields.tag_ids.clone();
        tag_ids.extend(insert_new_tags(&transaction, user_id, &fields.new_tags)?);
        replace_tag_links(&transaction, id, &tag_ids)?;
        transaction
            .commit()
            .context("Failed to commit new activity")?;

        Ok(ActivityRecord {
            id,
            user_id: user_id.to_string(),
            description: fields.description.clone(),
            started_at: fields.started_at,
            finished_at: None,
            duration_minutes: None,
            tag_ids,
        })
    }

    fn update_activity(
        &self,
        record: &ActivityRecord,
        new_tags: &[NewTag],
    ) -> Result<ActivityRecord> {
        let transaction = self
            .conn
            .unchecked_transaction()
            .context("Failed to start transaction")?;

        let updated = transaction.execute(
            "UPDATE activities
             SET description = ?2, started_at = ?3, finished_at = ?4, duration_minutes = ?5
             WHERE id = ?1",
            params![
                record.id,
                record.description,
                record.started_at.timestamp_millis(),
                record.finished_at.map(|finished| finished.timestamp_millis()),
                record.duration_minutes
            ],
        );

        let changed = match updated {
            Err(error) if is_unique_violation(&error) => {
                return Err(TrackerError::already_running());
            }
            other => other.context("Failed to update activity")?,
        };
        if changed == 0 {
            return Err(TrackerError::activity_not_found(record.id));
        }

        let mut updated = record.clone();
        updated
            .tag_ids
            .extend(insert_new_tags(&transaction, &record.user_id, new_tags)?);
        replace_tag_links(&transaction, record.id, &updated.tag_ids)?;
        transaction
            .commit()
            .context("Failed to commit activity update")?;

        Ok(updated)
    }

    fn delete_activity(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM activities WHERE id = ?1", params![id])
            .context("Failed to delete activity")?;

        if deleted == 0 {
            return Err(TrackerError::activity_not_found(id));
        }

        Ok(())
    }

    fn find_finished_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityWithTags>> {
        let mut statement = self.conn.prepare(&format!(
            "{SELECT_ACTIVITY_COLUMNS}
             WHERE user_id = ?1 AND finished_at IS NOT NULL AND started_at >= ?2 AND started_at <= ?3
             ORDER BY started_at DESC"
        ))?;

        let rows = statement
            .query_map(
                params![user_id, start.timestamp_millis(), end.timestamp_millis()],
                activity_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query finished activities")?;

        self.activities_with_tags(rows)
    }

    fn find_all(
        &self,
        user_id: &str,
        filter: &ActivityFilter,
        pagination: Pagination,
    ) -> Result<(Vec<ActivityWithTags>, u64)> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(like_pattern);
        let from = filter.started_from.map(|ts| ts.timestamp_millis());
        let until = filter.started_until.map(|ts| ts.timestamp_millis());

        let total: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM activities {HISTORY_WHERE}"),
                params![user_id, pattern, from, until],
                |row| row.get(0),
            )
            .context("Failed to count activities")?;

        let mut statement = self.conn.prepare(&format!(
            "{SELECT_ACTIVITY_COLUMNS} {HISTORY_WHERE}
             ORDER BY started_at {} LIMIT ?5 OFFSET ?6",
            filter.sort.as_sql()
        ))?;

        let rows = statement
            .query_map(
                params![
                    user_id,
                    pattern,
                    from,
                    until,
                    i64::from(pagination.limit),
                    pagination.offset() as i64
                ],
                activity_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list activities")?;

        Ok((self.activities_with_tags(rows)?, total.max(0) as u64))
    }
}

impl ProfileStore for Database {
    fn daily_goal(&self, user_id: &str) -> Result<Option<i64>> {
        let goal = self
            .conn
            .query_row(
                "SELECT daily_goal FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()
            .context("Failed to query daily goal")?;

        Ok(goal.flatten())
    }

    fn set_daily_goal(&self, user_id: &str, minutes: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (id, daily_goal) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET daily_goal = excluded.daily_goal",
                params![user_id, minutes],
            )
            .context("Failed to save daily goal")?;

        Ok(())
    }
}

impl TagStore for Database {
    fn list_tags(&self, user_id: &str) -> Result<Vec<Tag>> {
        let mut statement = self
            .conn
            .prepare(&format!("{SELECT_TAG_COLUMNS} WHERE user_id = ?1 ORDER BY name ASC"))?;

        let tags = statement
            .query_map(params![user_id], tag_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list tags")?;

        Ok(tags)
    }

    fn find_tag(&self, user_id: &str, id: i64) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                &format!("{SELECT_TAG_COLUMNS} WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                tag_from_row,
            )
            .optional()
            .context("Failed to query tag")?;

        Ok(tag)
    }

    fn find_tag_by_name(&self, user_id: &str, name: &str) -> Result<Option<Tag>> {
        // NOCASE only folds ASCII, so compare in Rust
        let wanted = name.trim().to_lowercase();
        let tag = self
            .list_tags(user_id)?
            .into_iter()
            .find(|tag| tag.name.to_lowercase() == wanted);

        Ok(tag)
    }

    fn insert_tag(&self, user_id: &str, name: &str, color: &str) -> Result<Tag> {
        let inserted = self.conn.execute(
            "INSERT INTO tags (user_id, name, color) VALUES (?1, ?2, ?3)",
            params![user_id, name, color],
        );

        match inserted {
            Err(error) if is_unique_violation(&error) => {
                return Err(TrackerError::Conflict("Tag already exists".to_string()));
            }
            other => {
                other.context("Failed to insert tag")?;
            }
        }

        Ok(Tag {
            id: self.conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
        })
    }

    fn update_tag(&self, tag: &Tag) -> Result<Tag> {
        let updated = self.conn.execute(
            "UPDATE tags SET name = ?3, color = ?4 WHERE id = ?1 AND user_id = ?2",
            params![tag.id, tag.user_id, tag.name, tag.color],
        );

        let changed = match updated {
            Err(error) if is_unique_violation(&error) => {
                return Err(TrackerError::Conflict("Tag already exists".to_string()));
            }
            other => other.context("Failed to update tag")?,
        };
        if changed == 0 {
            return Err(TrackerError::tag_not_found(tag.id));
        }

        Ok(tag.clone())
    }

    fn delete_tag(&self, id: i64) -> Result<()> {
        let transaction = self
            .conn
            .unchecked_transaction()
            .context("Failed to start transaction")?;

        transaction
            .execute("DELETE FROM activity_tags WHERE tag_id = ?1", params![id])
            .context("Failed to detach tag from activities")?;
        let deleted = transaction
            .execute("DELETE FROM tags WHERE id = ?1", params![id])
            .context("Failed to delete tag")?;

        if deleted == 0 {
            return Err(TrackerError::tag_not_found(id));
        }

        transaction.commit().context("Failed to commit tag delete")?;
        Ok(())
    }
}

fn register_functions(conn: &Connection) -> anyhow::Result<()> {
    // built-in lower() and LIKE only fold ASCII
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|value| value.to_lowercase()))
        },
    )
    .context("Failed to register unicode_lower")
}

fn insert_new_tags(conn: &Connection, user_id: &str, new_tags: &[NewTag]) -> Result<Vec<i64>> {
    new_tags
        .iter()
        .map(|tag| {
            match conn.execute(
                "INSERT INTO tags (user_id, name, color) VALUES (?1, ?2, ?3)",
                params![user_id, tag.name, tag.color],
            ) {
                Err(error) if is_unique_violation(&error) => {
                    Err(TrackerError::Conflict("Tag already exists".to_string()))
                }
                other => {
                    other.context("Failed to insert tag")?;
                    Ok(conn.last_insert_rowid())
                }
            }
        })
        .collect()
}

fn replace_tag_links(conn: &Connection, activity_id: i64, tag_ids: &[i64]) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM activity_tags WHERE activity_id = ?1",
        params![activity_id],
    )
    .context("Failed to clear activity tags")?;

    tag_ids.iter().try_for_each(|tag_id| {
        conn.execute(
            "INSERT OR IGNORE INTO activity_tags (activity_id, tag_id) VALUES (?1, ?2)",
            params![activity_id, tag_id],
        )
        .context("Failed to link activity tag")
        .map(|_| ())
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    let finished_at = row
        .get::<_, Option<i64>>(4)?
        .map(|millis| millis_to_datetime(4, millis))
        .transpose()?;

    Ok(ActivityRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        description: row.get(2)?,
        started_at: millis_to_datetime(3, row.get(3)?)?,
        finished_at,
        duration_minutes: row.get(5)?,
        tag_ids: Vec::new(),
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
    })
}

fn millis_to_datetime(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
pub(crate) fn open_temp() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("temp dir");
    let database = Database::open(&dir.path().join("db").join("timelog.db")).expect("open db");
    (dir, database)
}
