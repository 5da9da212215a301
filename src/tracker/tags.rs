use crate::error::{Result, TrackerError, require_user};
use crate::tracker::{NewTag, Tag, TagStore};
use rand::seq::SliceRandom;
use tracing::info;

pub const TAG_COLORS: [&str; 16] = [
    "#ef4444", // red
    "#f97316", // orange
    "#f59e0b", // amber
    "#eab308", // yellow
    "#84cc16", // lime
    "#22c55e", // green
    "#14b8a6", // teal
    "#06b6d4", // cyan
    "#0ea5e9", // sky
    "#3b82f6", // blue
    "#6366f1", // indigo
    "#8b5cf6", // violet
    "#a855f7", // purple
    "#d946ef", // fuchsia
    "#ec4899", // pink
    "#64748b", // slate
];

pub fn random_tag_color() -> &'static str {
    TAG_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(TAG_COLORS[0])
}

pub fn is_valid_color(color: &str) -> bool {
    color
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

pub fn list_tags<S>(store: &S, user_id: &str) -> Result<Vec<Tag>>
where
    S: TagStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    store.list_tags(user_id)
}

/// Creates a tag. Names are trimmed and unique per user regardless of case.
pub fn create_tag<S>(store: &S, user_id: &str, name: &str, color: Option<&str>) -> Result<Tag>
where
    S: TagStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    let name = normalize_name(name)?;
    let color = resolve_color(color)?;

    if store.find_tag_by_name(user_id, &name)?.is_some() {
        return Err(TrackerError::Conflict("Tag already exists".to_string()));
    }

    let tag = store.insert_tag(user_id, &name, &color)?;
    info!(user_id, tag_id = tag.id, name = %tag.name, "tag created");

    Ok(tag)
}

pub fn get_or_create_tag<S>(store: &S, user_id: &str, name: &str) -> Result<Tag>
where
    S: TagStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    let name = normalize_name(name)?;

    match store.find_tag_by_name(user_id, &name)? {
        Some(tag) => Ok(tag),
        None => create_tag(store, user_id, &name, None),
    }
}

/// Tag names split into ids of existing tags and tags that still need creating.
#[derive(Debug, Default)]
pub struct TagPlan {
    pub existing: Vec<i64>,
    pub missing: Vec<NewTag>,
}

/// Resolves names the way [`get_or_create_tag`] does, without writing anything.
pub fn plan_tags<S>(store: &S, user_id: &str, names: &[String]) -> Result<TagPlan>
where
    S: TagStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    let mut plan = TagPlan::default();

    for raw in names {
        let name = normalize_name(raw)?;
        match store.find_tag_by_name(user_id, &name)? {
            Some(tag) => plan.existing.push(tag.id),
            None => {
                let wanted = name.to_lowercase();
                let pending = plan
                    .missing
                    .iter()
                    .any(|tag| tag.name.to_lowercase() == wanted);
                if !pending {
                    plan.missing.push(NewTag {
                        name,
                        color: random_tag_color().to_string(),
                    });
                }
            }
        }
    }

    Ok(plan)
}

pub fn update_tag<S>(
    store: &S,
    user_id: &str,
    id: i64,
    name: Option<&str>,
    color: Option<&str>,
) -> Result<Tag>
where
    S: TagStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    let mut tag = store
        .find_tag(user_id, id)?
        .ok_or_else(|| TrackerError::tag_not_found(id))?;

    if let Some(name) = name {
        let name = normalize_name(name)?;
        let clash = store
            .find_tag_by_name(user_id, &name)?
            .is_some_and(|other| other.id != id);
        if clash {
            return Err(TrackerError::Conflict("Tag already exists".to_string()));
        }
        tag.name = name;
    }
    if let Some(color) = color {
        tag.color = resolve_color(Some(color))?;
    }

    store.update_tag(&tag)
}

pub fn delete_tag<S>(store: &S, user_id: &str, id: i64) -> Result<()>
where
    S: TagStore + ?Sized,
{
    let user_id = require_user(user_id)?;
    if store.find_tag(user_id, id)?.is_none() {
        return Err(TrackerError::tag_not_found(id));
    }

    store.delete_tag(id)?;
    info!(user_id, tag_id = id, "tag deleted");

    Ok(())
}

fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::Validation(
            "Tag name cannot be empty".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

fn resolve_color(color: Option<&str>) -> Result<String> {
    match color.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) if is_valid_color(value) => Ok(value.to_lowercase()),
        Some(value) => Err(TrackerError::Validation(format!(
            "Invalid tag color: {value}. Example: #3b82f6"
        ))),
        None => Ok(random_tag_color().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_temp;

    #[test]
    fn create_trims_and_picks_palette_color() {
        let (_dir, database) = open_temp();
        let tag = create_tag(&database, "alice", "  Reading ", None).expect("create");

        assert_eq!(tag.name, "Reading");
        assert!(TAG_COLORS.contains(&tag.color.as_str()));
    }

    #[test]
    fn create_rejects_duplicates_ignoring_case() {
        let (_dir, database) = open_temp();
        create_tag(&database, "alice", "Éclair", Some("#EF4444")).expect("create");

        let duplicate = create_tag(&database, "alice", "éCLAIR", None);
        assert!(matches!(duplicate, Err(TrackerError::Conflict(_))));
    }

    #[test]
    fn create_validates_name_and_color() {
        let (_dir, database) = open_temp();

        assert!(matches!(
            create_tag(&database, "alice", "   ", None),
            Err(TrackerError::Validation(_))
        ));
        assert!(matches!(
            create_tag(&database, "alice", "Work", Some("blue")),
            Err(TrackerError::Validation(_))
        ));
    }

    #[test]
    fn get_or_create_reuses_existing_tag() {
        let (_dir, database) = open_temp();
        let first = get_or_create_tag(&database, "alice", "Gym").expect("create");
        let second = get_or_create_tag(&database, "alice", "gym").expect("reuse");

        assert_eq!(first.id, second.id);
        assert_eq!(list_tags(&database, "alice").expect("list").len(), 1);
    }

    #[test]
    fn plan_splits_known_and_unknown_names_without_writing() {
        let (_dir, database) = open_temp();
        let gym = create_tag(&database, "alice", "Gym", None).expect("create");

        let names = ["gym", " Reading ", "READING"].map(String::from);
        let plan = plan_tags(&database, "alice", &names).expect("plan");

        assert_eq!(plan.existing, vec![gym.id]);
        assert_eq!(plan.missing.len(), 1);
        assert_eq!(plan.missing[0].name, "Reading");
        assert!(TAG_COLORS.contains(&plan.missing[0].color.as_str()));
        assert_eq!(list_tags(&database, "alice").expect("list"), vec![gym]);
    }

    #[test]
    fn rename_checks_other_tags_only() {
        let (_dir, database) = open_temp();
        let work = create_tag(&database, "alice", "Work", None).expect("create");
        create_tag(&database, "alice", "Play", None).expect("create");

        let renamed = update_tag(&database, "alice", work.id, Some("WORK"), Some("#22c55e"))
            .expect("rename own tag");
        assert_eq!(renamed.name, "WORK");
        assert_eq!(renamed.color, "#22c55e");

        let clash = update_tag(&database, "alice", work.id, Some("play"), None);
        assert!(matches!(clash, Err(TrackerError::Conflict(_))));
        assert!(matches!(
            update_tag(&database, "bob", work.id, Some("x"), None),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn delete_requires_ownership() {
        let (_dir, database) = open_temp();
        let tag = create_tag(&database, "alice", "Temp", None).expect("create");

        assert!(matches!(
            delete_tag(&database, "bob", tag.id),
            Err(TrackerError::NotFound(_))
        ));
        delete_tag(&database, "alice", tag.id).expect("delete");
        assert!(list_tags(&database, "alice").expect("list").is_empty());
    }
}
