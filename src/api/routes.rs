use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use timelog::analyzer::{self, AnalyticsResult, DailyTotal};
use timelog::config::Config;
use timelog::db::Database;
use timelog::error::TrackerError;
use timelog::tracker::guard::{self, ActivityPatch, StartRequest};
use timelog::tracker::time::{elapsed_millis, format_elapsed};
use timelog::tracker::{
    ActivityFilter, ActivityPage, ActivityRecord, ActivityWithTags, Pagination, SortOrder, Tag,
    tags,
};

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/activities", get(activity_history))
        .route("/api/v1/activities/recent", get(activity_recent))
        .route("/api/v1/activities/running", get(activity_running))
        .route("/api/v1/activities/start", post(activity_start))
        .route("/api/v1/activities/finish", post(activity_finish))
        .route("/api/v1/activities/cancel", post(activity_cancel))
        .route(
            "/api/v1/activities/:id",
            patch(activity_edit).delete(activity_delete),
        )
        .route("/api/v1/analytics", get(analytics))
        .route("/api/v1/analytics/daily-total", get(analytics_daily_total))
        .route(
            "/api/v1/settings/daily-goal",
            get(daily_goal_get).put(daily_goal_put),
        )
        .route("/api/v1/tags", get(tag_list).post(tag_create))
        .route("/api/v1/tags/:id", patch(tag_update).delete(tag_delete))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    search: Option<String>,
    date: Option<String>,
    sort: Option<SortOrder>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AnalyticsQuery {
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyGoalPayload {
    minutes: i64,
}

#[derive(Debug, Deserialize)]
struct TagCreatePayload {
    name: String,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagUpdatePayload {
    name: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    user_id: String,
    running: Option<ActivityWithTags>,
    elapsed: Option<String>,
    today: DailyTotal,
}

async fn status(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<StatusPayload>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    let now = Utc::now();

    let running = guard::running(&database, &user_id)?;
    let elapsed = running
        .as_ref()
        .map(|record| format_elapsed(elapsed_millis(record.activity.started_at, now)).to_string());
    let today = analyzer::daily_total(&database, &user_id, Local::now().date_naive())?;

    Ok(Json(StatusPayload {
        user_id,
        running,
        elapsed,
        today,
    }))
}

async fn activity_history(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<ActivityPage>> {
    let user_id = user_from_headers(&headers)?;
    let sort = query.sort.unwrap_or_default();
    let search = query.search.filter(|value| !value.trim().is_empty());

    let filter = match query.date.as_deref().map(parse_date).transpose()? {
        Some(date) => guard::day_filter(date, search, sort),
        None => ActivityFilter {
            search,
            sort,
            ..ActivityFilter::default()
        },
    };
    let pagination = Pagination::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(state.config.page_size),
    );

    let database = open_database(&state)?;
    Ok(Json(guard::history(&database, &user_id, &filter, pagination)?))
}

async fn activity_recent(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ActivityWithTags>>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    let records = guard::recent(
        &database,
        &user_id,
        state.config.recent_days,
        state.config.recent_limit,
        Utc::now(),
    )?;

    Ok(Json(records))
}

async fn activity_running(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<Option<ActivityWithTags>>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;

    Ok(Json(guard::running(&database, &user_id)?))
}

async fn activity_start(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<StartRequest>,
) -> ApiResult<(StatusCode, Json<ActivityRecord>)> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    let record = guard::try_start(&database, &user_id, request, Utc::now())?;

    Ok((StatusCode::CREATED, Json(record)))
}

async fn activity_finish(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<ActivityRecord>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;

    Ok(Json(guard::try_finish(&database, &user_id, Utc::now())?))
}

async fn activity_cancel(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<ActivityRecord>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;

    Ok(Json(guard::cancel(&database, &user_id)?))
}

async fn activity_edit(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(patch): Json<ActivityPatch>,
) -> ApiResult<Json<ActivityRecord>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;

    Ok(Json(guard::edit(&database, &user_id, id, patch)?))
}

async fn activity_delete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    guard::delete(&database, &user_id, id)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn analytics(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<AnalyticsResult>> {
    let user_id = user_from_headers(&headers)?;
    let days = query.days.unwrap_or(state.config.analytics_days).max(1);
    let database = open_database(&state)?;

    Ok(Json(analyzer::get_analytics(
        &database,
        &user_id,
        days,
        Utc::now(),
    )?))
}

async fn analytics_daily_total(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<DailyTotal>> {
    let user_id = user_from_headers(&headers)?;
    let date = query
        .date
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| Local::now().date_naive());
    let database = open_database(&state)?;

    Ok(Json(analyzer::daily_total(&database, &user_id, date)?))
}

async fn daily_goal_get(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    let minutes = analyzer::daily_goal(&database, &user_id)?;

    Ok(Json(json!({ "minutes": minutes })))
}

async fn daily_goal_put(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<DailyGoalPayload>,
) -> ApiResult<Json<Value>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    analyzer::set_daily_goal(&database, &user_id, payload.minutes)?;

    Ok(Json(json!({ "saved": true, "minutes": payload.minutes })))
}

async fn tag_list(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult<Json<Vec<Tag>>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;

    Ok(Json(tags::list_tags(&database, &user_id)?))
}

async fn tag_create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<TagCreatePayload>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    let tag = tags::create_tag(
        &database,
        &user_id,
        &payload.name,
        payload.color.as_deref(),
    )?;

    Ok((StatusCode::CREATED, Json(tag)))
}

async fn tag_update(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<TagUpdatePayload>,
) -> ApiResult<Json<Tag>> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    let tag = tags::update_tag(
        &database,
        &user_id,
        id,
        payload.name.as_deref(),
        payload.color.as_deref(),
    )?;

    Ok(Json(tag))
}

async fn tag_delete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let user_id = user_from_headers(&headers)?;
    let database = open_database(&state)?;
    tags::delete_tag(&database, &user_id, id)?;

    Ok(StatusCode::NO_CONTENT)
}

fn open_database(state: &ApiState) -> ApiResult<Database> {
    Ok(Database::open(&state.config.db_path)?)
}

fn user_from_headers(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .ok_or(ApiError::Unauthorized(
            TrackerError::AuthenticationRequired.to_string(),
        ))
}

fn parse_date(input: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: {input}. Example: 2026-02-18"))
        .map_err(|error| ApiError::BadRequest(error.to_string()))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<TrackerError> for ApiError {
    fn from(value: TrackerError) -> Self {
        match value {
            TrackerError::AuthenticationRequired => {
                Self::Unauthorized(TrackerError::AuthenticationRequired.to_string())
            }
            TrackerError::Conflict(message) => Self::Conflict(message),
            TrackerError::NotFound(message) => Self::NotFound(message),
            TrackerError::Validation(message) => Self::BadRequest(message),
            TrackerError::Storage(error) => Self::Internal(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Internal(error) => {
                tracing::error!(error = %error, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn tracker_errors_map_to_status_codes() {
        let cases = [
            (TrackerError::AuthenticationRequired, StatusCode::UNAUTHORIZED),
            (TrackerError::already_running(), StatusCode::CONFLICT),
            (TrackerError::no_running(), StatusCode::NOT_FOUND),
            (
                TrackerError::Validation("bad range".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                TrackerError::Storage(anyhow::anyhow!("disk gone")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), expected);
        }
    }

    #[test]
    fn user_header_is_required() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            user_from_headers(&headers),
            Err(ApiError::Unauthorized(_))
        ));

        headers.insert(USER_HEADER, HeaderValue::from_static(" alice "));
        assert_eq!(user_from_headers(&headers).expect("user"), "alice");
    }
}
