use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, FixedOffset, Local};
use dash_analytics::{DashboardMetrics, MetricsInput, OutcomeCounts, ReportGenerator};
use dash_core::error::DashError;
use dash_core::time::{filter_by_range, previous_period};
use dash_core::types::{Analysis, DateRange, Message, MessagePatch};
use dash_store::store::latest_per_group;
use serde::Deserialize;

/// JSON error body for failed requests.
pub struct ApiError(DashError);

impl From<DashError> for ApiError {
    fn from(err: DashError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DashError::NotFound(_) => StatusCode::NOT_FOUND,
            DashError::Conflict(_) => StatusCode::CONFLICT,
            DashError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Health ──────────────────────────────────────────────────────────────

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ── Conversations ───────────────────────────────────────────────────────

pub fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_message),
        )
        .route("/conversations/unique", get(unique_conversations))
        .route("/conversations/group/{id}", get(conversation_group))
        .route(
            "/conversations/{id}",
            axum::routing::put(update_message).delete(delete_message),
        )
}

async fn list_conversations(State(state): State<AppState>) -> Json<Vec<Message>> {
    let store = state.store.read().await;
    Json(store.list_all().to_vec())
}

async fn unique_conversations(State(state): State<AppState>) -> Json<Vec<Message>> {
    let store = state.store.read().await;
    Json(store.latest_per_group())
}

async fn conversation_group(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<Message>> {
    let store = state.store.read().await;
    Json(store.by_group(&id))
}

async fn create_message(
    State(state): State<AppState>,
    Json(message): Json<Message>,
) -> ApiResult<impl IntoResponse> {
    let mut store = state.store.write().await;
    let created = store.create(message)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<MessagePatch>,
) -> ApiResult<Json<Message>> {
    let mut store = state.store.write().await;
    Ok(Json(store.update(&id, patch)?))
}

async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Message>> {
    let mut store = state.store.write().await;
    Ok(Json(store.delete(&id)?))
}

// ── Analysis ────────────────────────────────────────────────────────────

pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/analysis/{id}", get(get_analysis).put(put_analysis))
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Analysis>> {
    let store = state.store.read().await;
    store
        .get_analysis(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| DashError::NotFound(format!("No analysis for {}", id)).into())
}

#[derive(Debug, Deserialize)]
struct AnalysisBody {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default)]
    transition: Option<String>,
}

async fn put_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnalysisBody>,
) -> ApiResult<Json<Analysis>> {
    let record = Analysis {
        conversation_id: id,
        summary: body.summary,
        analysis: body.analysis,
        transition: body.transition,
    };
    let mut store = state.store.write().await;
    store.put_analysis(record.clone())?;
    Ok(Json(record))
}

// ── Metrics ─────────────────────────────────────────────────────────────

pub fn metrics_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics))
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    /// Window start, epoch milliseconds.
    pub from: Option<i64>,
    /// Window end, epoch milliseconds.
    pub to: Option<i64>,
    #[serde(default)]
    pub compare: bool,
    pub qualified: Option<usize>,
    pub converted: Option<usize>,
}

impl MetricsQuery {
    fn range(&self) -> Result<DateRange, DashError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DashError::InvalidInput(format!(
                    "from ({}) is after to ({})",
                    from, to
                )));
            }
        }
        Ok(DateRange {
            from: self.from,
            to: self.to,
        })
    }

    fn outcomes(&self) -> Option<OutcomeCounts> {
        if self.qualified.is_none() && self.converted.is_none() {
            return None;
        }
        Some(OutcomeCounts {
            qualified: self.qualified.unwrap_or(0),
            converted: self.converted.unwrap_or(0),
        })
    }
}

async fn metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> ApiResult<Json<DashboardMetrics>> {
    let range = query.range()?;
    let now = Local::now().fixed_offset();
    let store = state.store.read().await;
    let metrics = compute_metrics(&state, store.list_all(), &range, &query, now).await;
    Ok(Json(metrics))
}

async fn compute_metrics(
    state: &AppState,
    all: &[Message],
    range: &DateRange,
    query: &MetricsQuery,
    now: DateTime<FixedOffset>,
) -> DashboardMetrics {
    let zone = *now.offset();
    let current = filter_by_range(all, range, &zone);
    let unique = latest_per_group(&current);

    let previous = if query.compare {
        previous_period(range).map(|prev_range| {
            let messages = filter_by_range(all, &prev_range, &zone);
            let unique = latest_per_group(&messages);
            (messages, unique)
        })
    } else {
        None
    };

    let mut input = MetricsInput::new(&current, &unique, now).with_all_messages(all);
    if let Some((messages, unique)) = &previous {
        input = input.compare_with(messages, unique);
    }
    if let Some(outcomes) = query.outcomes() {
        input = input.with_outcomes(outcomes);
    }

    let mut cache = state.metrics_cache.lock().await;
    cache.get_or_compute(&state.aggregator, &input).clone()
}

// ── Export ──────────────────────────────────────────────────────────────

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/export/conversations.csv", get(export_conversations))
        .route("/export/messages.csv", get(export_messages))
        .route("/export/status.csv", get(export_status))
}

fn csv_response(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_conversations(State(state): State<AppState>) -> Response {
    let zone = *Local::now().offset();
    let store = state.store.read().await;
    let unique = store.latest_per_group();
    let body = ReportGenerator::conversations_csv(&unique, store.list_all(), &zone);
    csv_response("conversations.csv", body)
}

async fn export_messages(State(state): State<AppState>) -> Response {
    let store = state.store.read().await;
    csv_response(
        "messages.csv",
        ReportGenerator::messages_csv(store.list_all()),
    )
}

async fn export_status(State(state): State<AppState>) -> Response {
    let zone = *Local::now().offset();
    let store = state.store.read().await;
    let body = ReportGenerator::status_csv(&state.aggregator, store.list_all(), &zone);
    csv_response("status.csv", body)
}
