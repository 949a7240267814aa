//! HTTP front end: `POST /api/query` runs a database query and returns the
//! questions built from every matching page.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::NotionError;
use crate::math::LatexRenderer;
use crate::notion::{normalize_id, NotionClient};
use crate::parser::sections::Classifier;
use crate::parser::{process_pages, Output};
use crate::settings::Settings;

pub struct AppState {
    pub client: NotionClient,
    pub settings: Settings,
    pub renderer: LatexRenderer,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    /// Notion database filter object, passed through unchanged.
    #[serde(default)]
    pub filter: Option<Value>,
    /// Overrides the configured database.
    #[serde(default)]
    pub database_id: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/query", post(query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(addr: &str, state: Arc<AppState>) -> Result<(), std::io::Error> {
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state)).await
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The body is optional: a bare POST queries the configured database unfiltered.
async fn query(
    State(state): State<Arc<AppState>>,
    body: Option<Json<QueryRequest>>,
) -> Result<Json<Output>, (StatusCode, String)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let database_id = request
        .database_id
        .as_deref()
        .or(state.settings.database_id.as_deref())
        .ok_or_else(|| {
            error!("No database id configured");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "No database id configured".to_string(),
            )
        })?;
    let database_id = normalize_id(database_id).map_err(|e| {
        warn!("Rejected database id: {}", e);
        (status_for(&e), e.to_string())
    })?;

    let pages = state
        .client
        .query_database(&database_id, request.filter.as_ref())
        .await
        .map_err(|e| {
            error!("Database query failed: {}", e);
            (status_for(&e), e.to_string())
        })?;

    let classifier = Classifier::new(&state.renderer, state.settings.unlabeled_answer);
    let batch = process_pages(
        &state.client,
        &pages,
        &classifier,
        state.settings.on_page_error,
        &ProgressBar::hidden(),
    )
    .await
    .map_err(|e| {
        error!("{}", e);
        (status_for(&e.source), e.to_string())
    })?;

    Ok(Json(batch.into_output(state.settings.on_page_error)))
}

/// Serve `router` on an ephemeral local port.
#[cfg(test)]
pub(crate) async fn spawn_stub(router: Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Status code reported to the caller for a Notion failure.
pub fn status_for(err: &NotionError) -> StatusCode {
    match err {
        NotionError::MissingToken | NotionError::InvalidHeader(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        NotionError::InvalidId(_) => StatusCode::BAD_REQUEST,
        NotionError::Api { code, .. } if code == "validation_error" => StatusCode::BAD_REQUEST,
        NotionError::Api { status: 404, .. } => StatusCode::NOT_FOUND,
        NotionError::Http(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        NotionError::Api { .. } | NotionError::Http(_) => StatusCode::BAD_GATEWAY,
    }
}
