use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rl_core::{ArticleRecord, HistoryEntry, Job, Reflection};
use rl_storage::{ArticleQuery, RecommendationOutcome};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Accepts a browsing-history export and starts processing it in the background.
pub async fn receive_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let entries: Vec<HistoryEntry> = match serde_json::from_slice::<Value>(&body) {
        Ok(value @ Value::Array(_)) => serde_json::from_value(value)
            .map_err(|e| ApiError::BadRequest(format!("Invalid history entry: {}", e)))?,
        _ => return Err(ApiError::BadRequest("Invalid JSON".to_string())),
    };

    let received = entries.len();
    let (job_id, _) = state.ingest.submit(&user_id, entries).await?;
    info!("➡️ Received {} history entries from {} (Job: {})", received, user_id, job_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "processing_started", "job_id": job_id })),
    ))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    state
        .jobs
        .get(&user_id, &job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ArticleQuery>,
) -> ApiResult<Json<Vec<ArticleRecord>>> {
    Ok(Json(state.articles.search(&user_id, &query).await?))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(article_id): Path<String>,
) -> ApiResult<Json<ArticleRecord>> {
    state
        .articles
        .get(&user_id, &article_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))
}

pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(article_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.articles.delete(&user_id, &article_id).await?;
    info!("🗑️ Deleted article {} (User: {})", article_id, user_id);
    Ok(Json(json!({ "status": "success", "message": "Article deleted successfully" })))
}

const REFLECTION_KEYS: [&str; 7] = [
    "usefulness",
    "impression",
    "specific_impression",
    "why_important",
    "content_type",
    "what_i_got",
    "memo",
];

/// Every key must be present; a null value is stored as an empty string.
fn parse_reflection(body: &[u8]) -> ApiResult<Reflection> {
    let missing = || ApiError::BadRequest("Missing reflection data".to_string());
    let Ok(Value::Object(data)) = serde_json::from_slice::<Value>(body) else {
        return Err(missing());
    };
    if !REFLECTION_KEYS.iter().all(|key| data.contains_key(*key)) {
        return Err(missing());
    }

    let normalized: Map<String, Value> = REFLECTION_KEYS
        .iter()
        .map(|key| {
            let value = match &data[*key] {
                Value::Null => Value::String(String::new()),
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            };
            (key.to_string(), value)
        })
        .collect();
    serde_json::from_value(Value::Object(normalized)).map_err(|_| missing())
}

pub async fn save_reflection(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(article_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let reflection = parse_reflection(&body)?;
    state.articles.save_reflection(&user_id, &article_id, &reflection).await?;
    info!("✅ Saved reflection (User: {}, Article: {})", user_id, article_id);
    Ok(Json(json!({ "status": "success", "message": "Reflection saved successfully" })))
}

pub async fn toggle_read_later(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(article_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let read_later = state.articles.toggle_read_later(&user_id, &article_id).await?;
    Ok(Json(json!({ "status": "success", "readLater": read_later })))
}

pub async fn generate_recommendations(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<RecommendationOutcome>> {
    Ok(Json(state.recommendations.generate(&user_id).await?))
}

pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<ArticleRecord>>> {
    Ok(Json(state.recommendations.recommended_articles(&user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    email: Option<String>,
}

pub async fn create_user_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let email = serde_json::from_slice::<ProfileRequest>(&body)
        .ok()
        .and_then(|req| req.email)
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    if state.profiles.create_if_missing(&user_id, &email).await? {
        info!("✅ Created user profile (User: {})", user_id);
    }
    Ok(Json(json!({ "status": "success" })))
}
