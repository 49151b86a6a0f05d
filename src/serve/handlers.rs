//! HTTP handlers for the dashboard.

use std::sync::{Arc, Mutex as StdMutex};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use clientmap::geocode::{CacheStats, Geocoder};
use clientmap::models::{ClientRecord, Coordinates, DepartmentSelection};
use clientmap::pipeline::{PipelineError, Session};
use clientmap::render::{render_map, render_page, PageContent, RenderOptions};
use clientmap::source::TextSource;

const DEFAULT_DOWNLOAD_NAME: &str = "client_map.html";

/// Application state shared across handlers.
///
/// The session sits behind a mutex so runs are serialized and the caches
/// have a single writer. `last_stats` is refreshed after every run so
/// `/health` never waits on the session.
pub struct AppState<C, B, G> {
    session: Mutex<Session<C, B, G>>,
    last_stats: StdMutex<CacheStats>,
    render: RenderOptions,
    download_name: String,
}

impl<C, B, G> AppState<C, B, G> {
    pub fn new(session: Session<C, B, G>, render: RenderOptions, download_name: &str) -> Self {
        Self {
            session: Mutex::new(session),
            last_stats: StdMutex::new(CacheStats::default()),
            render,
            download_name: sanitize_download_name(download_name),
        }
    }

    fn record_stats(&self, stats: CacheStats) {
        *self
            .last_stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = stats;
    }

    fn stats(&self) -> CacheStats {
        *self
            .last_stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Build the router for a session over any sources and geocoder
pub fn router<C, B, G>(state: Arc<AppState<C, B, G>>) -> Router
where
    C: TextSource + Send + Sync + 'static,
    B: TextSource + Send + Sync + 'static,
    G: Geocoder + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(map_handler::<C, B, G>))
        .route("/health", get(health_handler::<C, B, G>))
        .route("/v1/departments", get(departments_handler::<C, B, G>))
        .route("/v1/clients", get(clients_handler::<C, B, G>))
        .route("/v1/refresh", post(refresh_handler::<C, B, G>))
        .route("/map", get(map_handler::<C, B, G>))
        .route("/map/download", get(download_handler::<C, B, G>))
        .with_state(state)
}

/// File name safe to put in a `Content-Disposition` header
pub fn sanitize_download_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | '\\' | '/' | ';'))
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        DEFAULT_DOWNLOAD_NAME.to_string()
    } else {
        cleaned
    }
}

#[derive(Deserialize)]
pub struct SelectionParams {
    /// Department name, "All Departments", or absent
    department: Option<String>,
}

impl SelectionParams {
    fn selection(&self) -> DepartmentSelection {
        DepartmentSelection::from_param(self.department.as_deref())
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    geocode_cache: CacheStatsResponse,
}

#[derive(Serialize)]
struct CacheStatsResponse {
    hits: usize,
    misses: usize,
    unresolved: usize,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            unresolved: stats.unresolved,
        }
    }
}

#[derive(Serialize)]
pub struct ClientsResponse {
    selection: String,
    count: usize,
    centroid: Coordinates,
    clients: Vec<ClientRecord>,
    unresolved: Vec<String>,
}

/// HTTP status for a halted run
pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::SelectionRequired => StatusCode::OK,
        PipelineError::EmptyFilterResult { .. } | PipelineError::EmptyResolvedSet => {
            StatusCode::NOT_FOUND
        }
        PipelineError::DataUnavailable(_) | PipelineError::BoundaryUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn log_failure(err: &PipelineError) {
    if !err.is_recoverable() {
        error!("Pipeline failed: {}", err);
    }
}

/// Health check endpoint; reports "busy" while a run holds the session
pub async fn health_handler<C, B, G>(
    State(state): State<Arc<AppState<C, B, G>>>,
) -> Json<HealthResponse>
where
    C: TextSource,
    B: TextSource,
    G: Geocoder,
{
    let (status, stats) = match state.session.try_lock() {
        Ok(session) => ("ok", session.cache_stats()),
        Err(_) => ("busy", state.stats()),
    };

    Json(HealthResponse {
        status,
        geocode_cache: stats.into(),
    })
}

/// Selector options
pub async fn departments_handler<C, B, G>(
    State(state): State<Arc<AppState<C, B, G>>>,
) -> Result<Json<Vec<String>>, (StatusCode, String)>
where
    C: TextSource,
    B: TextSource,
    G: Geocoder,
{
    let mut session = state.session.lock().await;

    session.departments().await.map(Json).map_err(|e| {
        log_failure(&e);
        (status_for(&e), e.to_string())
    })
}

/// Enriched table as JSON
pub async fn clients_handler<C, B, G>(
    State(state): State<Arc<AppState<C, B, G>>>,
    Query(params): Query<SelectionParams>,
) -> Result<Json<ClientsResponse>, (StatusCode, String)>
where
    C: TextSource,
    B: TextSource,
    G: Geocoder,
{
    let selection = params.selection();
    let mut session = state.session.lock().await;

    let outcome = session.enrich(&selection).await;
    state.record_stats(session.cache_stats());
    drop(session);

    let set = outcome.map_err(|e| {
        log_failure(&e);
        (status_for(&e), e.to_string())
    })?;

    Ok(Json(ClientsResponse {
        selection: selection.to_string(),
        count: set.records.len(),
        centroid: set.centroid,
        clients: set.records,
        unresolved: set.unresolved,
    }))
}

/// Forget the client table and geocoding results
pub async fn refresh_handler<C, B, G>(
    State(state): State<Arc<AppState<C, B, G>>>,
) -> Json<HealthResponse>
where
    C: TextSource,
    B: TextSource,
    G: Geocoder,
{
    let mut session = state.session.lock().await;
    session.reset();
    let stats = session.cache_stats();
    state.record_stats(stats);
    info!("Session caches cleared");

    Json(HealthResponse {
        status: "ok",
        geocode_cache: stats.into(),
    })
}

/// Dashboard page: selector plus map, or a message explaining why not
pub async fn map_handler<C, B, G>(
    State(state): State<Arc<AppState<C, B, G>>>,
    Query(params): Query<SelectionParams>,
) -> (StatusCode, Html<String>)
where
    C: TextSource,
    B: TextSource,
    G: Geocoder,
{
    let selection = params.selection();
    let mut session = state.session.lock().await;

    let departments = match session.departments().await {
        Ok(d) => d,
        Err(e) => {
            log_failure(&e);
            let page = render_page(
                &[],
                &selection,
                PageContent::Error(e.to_string()),
                &state.render,
            );
            return (status_for(&e), Html(page));
        }
    };

    let outcome = session.run(&selection).await;
    state.record_stats(session.cache_stats());
    drop(session);

    match outcome {
        Ok(view) => (
            StatusCode::OK,
            Html(render_page(
                &departments,
                &selection,
                PageContent::Map(&view),
                &state.render,
            )),
        ),
        Err(e) => {
            log_failure(&e);
            let content = match &e {
                PipelineError::SelectionRequired => {
                    PageContent::Info("Please select a department to display the map.".to_string())
                }
                e if e.is_recoverable() => PageContent::Warning(e.to_string()),
                e => PageContent::Error(e.to_string()),
            };
            (
                status_for(&e),
                Html(render_page(&departments, &selection, content, &state.render)),
            )
        }
    }
}

/// Standalone map as a file download
pub async fn download_handler<C, B, G>(
    State(state): State<Arc<AppState<C, B, G>>>,
    Query(params): Query<SelectionParams>,
) -> Response
where
    C: TextSource,
    B: TextSource,
    G: Geocoder,
{
    let selection = params.selection();
    let mut session = state.session.lock().await;
    let outcome = session.run(&selection).await;
    state.record_stats(session.cache_stats());
    drop(session);

    match outcome {
        Ok(view) => (
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", state.download_name),
                ),
            ],
            render_map(&view, &state.render),
        )
            .into_response(),
        Err(e) => {
            log_failure(&e);
            // Nothing to download until a department is picked
            let status = match &e {
                PipelineError::SelectionRequired => {
                    warn!("Download requested without a department");
                    StatusCode::BAD_REQUEST
                }
                other => status_for(other),
            };
            (status, e.to_string()).into_response()
        }
    }
}
