// src/server/mod.rs
// =============================================================================
// The HTTP side of `link-warden serve`.
//
// Routes:
//   GET  /                          dashboard JSON for both datasets
//   GET  /api/:dataset              raw snapshot
//   GET  /refresh/:dataset          start a manual run (POST works too)
//   GET  /download_csv/:dataset     last full CSV export
//   GET  /download_errors/:dataset  non-OK rows only
//   GET  /progress-stream           Server-Sent Events with run progress
//
// A refresh answers right away: 202 when the run started, 409 when another
// run holds the single-flight guard.
// =============================================================================

mod stream;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

use crate::checker::Severity;
use crate::config;
use crate::error::{RunError, StoreError};
use crate::model::{CheckResult, Dataset, HistorySnapshot, Timestamp};
use crate::run::{Coordinator, Trigger};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

// Error body: {"error": "..."}
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::NoExport(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<RunError> for ApiError {
    fn from(e: RunError) -> Self {
        let status = match e {
            RunError::AlreadyRunning => StatusCode::CONFLICT,
            RunError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

#[derive(Debug, Serialize, Default, PartialEq, Eq)]
pub struct Counts {
    pub ok: usize,
    pub failing: usize,
    pub warning: usize,
    pub total: usize,
}

impl Counts {
    pub fn of(results: &[CheckResult]) -> Self {
        results.iter().fold(Counts::default(), |mut counts, result| {
            match result.status.severity() {
                Severity::Ok => counts.ok += 1,
                Severity::Failing => counts.failing += 1,
                Severity::Warning => counts.warning += 1,
            }
            counts.total += 1;
            counts
        })
    }
}

#[derive(Debug, Serialize)]
struct DatasetView {
    #[serde(with = "crate::model::timestamp::option")]
    last_checked: Option<Timestamp>,
    #[serde(with = "crate::model::timestamp::option")]
    last_auto_refresh: Option<Timestamp>,
    counts: Counts,
    results: Vec<CheckResult>,
}

impl From<HistorySnapshot> for DatasetView {
    fn from(snapshot: HistorySnapshot) -> Self {
        Self {
            last_checked: snapshot.last_checked,
            last_auto_refresh: snapshot.last_auto_refresh,
            counts: Counts::of(&snapshot.results),
            results: snapshot.results,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/:dataset", get(snapshot))
        .route("/refresh/:dataset", get(refresh).post(refresh))
        .route("/download_csv/:dataset", get(download_csv))
        .route("/download_errors/:dataset", get(download_errors))
        .route("/progress-stream", get(progress_stream))
        .with_state(state)
}

pub async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {}", port, e))?;

    log::info!("Dashboard listening on http://0.0.0.0:{}/", port);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

fn parse_dataset(raw: &str) -> Result<Dataset, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Unknown dataset"))
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let store = state.coordinator.store();
    let mut body = serde_json::Map::new();
    for dataset in Dataset::ALL {
        let view = DatasetView::from(store.load(dataset)?);
        let view = serde_json::to_value(view)
            .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        body.insert(dataset.to_string(), view);
    }
    body.insert("is_checking".to_string(), json!(state.coordinator.is_running()));
    Ok(Json(body.into()))
}

async fn snapshot(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Json<HistorySnapshot>, ApiError> {
    let dataset = parse_dataset(&dataset)?;
    Ok(Json(state.coordinator.store().load(dataset)?))
}

async fn refresh(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Response, ApiError> {
    let dataset = parse_dataset(&dataset)?;
    state.coordinator.spawn_run(dataset, Trigger::Manual)?;
    log::info!("[{}] Manual refresh accepted", dataset);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "dataset": dataset, "status": "started" })),
    )
        .into_response())
}

async fn download_csv(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Response, ApiError> {
    let dataset = parse_dataset(&dataset)?;
    let bytes = state.coordinator.store().read_export(dataset)?;
    Ok(attachment(format!("link_history_{}_{}.csv", dataset, file_stamp()), bytes))
}

async fn download_errors(
    State(state): State<AppState>,
    Path(dataset): Path<String>,
) -> Result<Response, ApiError> {
    let dataset = parse_dataset(&dataset)?;
    let bytes = state.coordinator.store().errors_csv(dataset)?;
    Ok(attachment(format!("errors_only_{}_{}.csv", dataset, file_stamp()), bytes))
}

async fn progress_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let progress = state.coordinator.progress();
    let subscription = progress.subscribe();
    log::debug!("Progress stream opened ({} subscribers)", progress.subscriber_count());
    let events = stream::frames(
        subscription,
        config::PROGRESS_IDLE_WINDOW,
        config::PROGRESS_IDLE_CEILING,
    )
    .map(|frame| {
        Ok(match frame {
            stream::Frame::Data(json) => Event::default().data(json),
            stream::Frame::Comment(text) => Event::default().comment(text),
        })
    });
    Sse::new(events)
}

fn attachment(filename: String, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn file_stamp() -> String {
    crate::model::now().format("%Y%m%d_%H%M%S").to_string()
}
