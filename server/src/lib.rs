use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use qpsearch::{
    read_events, Channel, DuplicateQuery, EngineConfig, Error, Exam, Record, RecordId, RecordPatch, SearchEngine,
    SearchOptions,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub exam: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub score: f64,
    pub channels: Vec<Channel>,
    #[serde(flatten)]
    pub record: Record,
}

#[derive(Deserialize)]
pub struct SimilarParams {
    pub course_code: String,
    pub year: Option<i32>,
    pub exam: Option<String>,
    pub semester: Option<String>,
    pub course_name: Option<String>,
}

#[derive(Serialize)]
pub struct RecordList {
    pub count: usize,
    pub records: Vec<Record>,
}

#[derive(Deserialize)]
pub struct IdReq {
    pub id: RecordId,
}

#[derive(Deserialize)]
pub struct EditReq {
    pub id: RecordId,
    #[serde(flatten)]
    pub patch: RecordPatch,
    /// Records superseded by this one; soft deleted after the edit.
    #[serde(default)]
    pub replace: Vec<RecordId>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub admin_token: Option<String>,
}

/// Builds an engine and replays the change feed at `feed`, if any.
pub fn load_engine(feed: Option<&std::path::Path>, config: EngineConfig) -> Result<SearchEngine> {
    let engine = SearchEngine::new(config);
    if let Some(path) = feed {
        let file = File::open(path).with_context(|| format!("opening feed {}", path.display()))?;
        let events = read_events(BufReader::new(file))?;
        engine.load(events);
        engine.check_consistency()?;
    }
    Ok(engine)
}

pub fn build_app(engine: Arc<SearchEngine>, admin_token: Option<String>) -> Router {
    let app_state = AppState { engine, admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/record/:id", get(record_handler))
        .route("/admin/unapproved", get(unapproved_handler))
        .route("/admin/trash", get(trash_handler))
        .route("/admin/similar", get(similar_handler))
        .route("/admin/records", post(upsert_handler))
        .route("/admin/edit", post(edit_handler))
        .route("/admin/delete", post(delete_handler))
        .route("/admin/restore", post(restore_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<SearchResponse> {
    let start = std::time::Instant::now();
    let exam = match params.exam.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(Exam::try_from(raw).map_err(api_error)?),
    };
    // Scoring is CPU-bound and fans out over rayon; keep it off the async workers.
    let engine = Arc::clone(&state.engine);
    let query = params.query.clone();
    let hits = tokio::task::spawn_blocking(move || engine.search_records(&query, &SearchOptions { exam }))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(api_error)?;

    let results: Vec<SearchHit> = hits
        .into_iter()
        .map(|(hit, record)| SearchHit {
            score: hit.score,
            channels: hit.contributions.iter().map(|c| c.channel).collect(),
            record,
        })
        .collect();
    let took_s = start.elapsed().as_secs_f64();
    tracing::debug!(query = %params.query, hits = results.len(), took_s, "search served");
    Ok(Json(SearchResponse { query: params.query, took_s, total_hits: results.len(), results }))
}

pub async fn record_handler(State(state): State<AppState>, Path(id): Path<RecordId>) -> ApiResult<Record> {
    match state.engine.get(id) {
        Some(record) if record.is_searchable() => Ok(Json(record)),
        _ => Err(api_error(Error::UnknownRecord(id))),
    }
}

async fn unapproved_handler(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<RecordList> {
    authorize(&state, &headers)?;
    let records = state.engine.unapproved();
    Ok(Json(RecordList { count: records.len(), records }))
}

async fn trash_handler(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<RecordList> {
    authorize(&state, &headers)?;
    let records = state.engine.soft_deleted();
    Ok(Json(RecordList { count: records.len(), records }))
}

async fn similar_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SimilarParams>,
) -> ApiResult<RecordList> {
    authorize(&state, &headers)?;
    let exam = params.exam.as_deref().map(Exam::try_from).transpose().map_err(api_error)?;
    let query = DuplicateQuery {
        course_code: params.course_code,
        year: params.year,
        exam,
        semester: params.semester,
        course_name: params.course_name,
    };
    let records = state.engine.find_duplicates(&query);
    Ok(Json(RecordList { count: records.len(), records }))
}

async fn upsert_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(record): Json<Record>,
) -> ApiResult<serde_json::Value> {
    authorize(&state, &headers)?;
    let id = record.id;
    let replaced = state.engine.upsert(record).is_some();
    Ok(Json(serde_json::json!({ "id": id, "replaced": replaced })))
}

async fn edit_handler(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<EditReq>) -> ApiResult<Record> {
    authorize(&state, &headers)?;
    let record = state.engine.update(req.id, req.patch).map_err(api_error)?;
    for id in req.replace.into_iter().filter(|&id| id != record.id) {
        state.engine.remove_soft(id);
    }
    Ok(Json(record))
}

async fn delete_handler(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<IdReq>) -> ApiResult<serde_json::Value> {
    authorize(&state, &headers)?;
    if state.engine.remove_soft(req.id) {
        Ok(Json(serde_json::json!({ "id": req.id, "deleted": true })))
    } else {
        Err(api_error(Error::UnknownRecord(req.id)))
    }
}

async fn restore_handler(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<IdReq>) -> ApiResult<Record> {
    authorize(&state, &headers)?;
    state.engine.restore(req.id).map(Json).map_err(api_error)
}

fn api_error(err: Error) -> (StatusCode, String) {
    match err {
        Error::InvalidQuery | Error::InvalidField(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        Error::UnknownRecord(_) => (StatusCode::NOT_FOUND, err.to_string()),
        Error::IndexCorruption(msg) => {
            tracing::error!(%msg, "index corruption, aborting");
            std::process::abort();
        }
        Error::Feed { .. } | Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
