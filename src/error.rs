use thiserror::Error;

/// Failure kinds surfaced by the tracker core.
///
/// Every precondition violation maps to one specific variant; storage failures are
/// wrapped as-is and never retried.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    pub fn already_running() -> Self {
        Self::Conflict(
            "You already have a running activity. Stop it first before starting a new one."
                .to_string(),
        )
    }

    pub fn no_running() -> Self {
        Self::NotFound("No running activity found".to_string())
    }

    pub fn activity_not_found(id: i64) -> Self {
        Self::NotFound(format!("Activity not found: {id}"))
    }

    pub fn tag_not_found(id: i64) -> Self {
        Self::NotFound(format!("Tag not found: {id}"))
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.into())
    }
}

/// Rejects an empty user identity before any store is touched.
pub fn require_user(user_id: &str) -> Result<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(TrackerError::AuthenticationRequired);
    }

    Ok(trimmed)
}
