//! Cache-first asset server.
//!
//! Runs the [`CacheWorker`] lifecycle (install, then activate) and serves
//! every `GET` through its fetch handler: cached entries come straight from
//! SQLite, everything else is fetched from the configured origin and passed
//! through unchanged.
//!
//! # Error Contract
//!
//! A transport failure reaching the origin is the only error this server
//! produces itself:
//!
//! ```json
//! { "error": { "code": "network_error", "message": "network error fetching ..." } }
//! ```
//!
//! Error statuses returned by the origin (404, 500, ...) are forwarded as-is.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the page can call it
//! from a different port during development.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::cache::CacheStorage;
use crate::config::Config;
use crate::db;
use crate::fetcher::{FetchError, HttpFetcher};
use crate::migrate;
use crate::models::StoredResponse;
use crate::worker::{CacheWorker, FetchSource};

/// Response header naming where a response came from (`cache` or `network`).
pub const SOURCE_HEADER: &str = "x-medassist-source";

/// Builds the worker from configuration, migrating the cache database first.
pub async fn build_worker(config: &Config) -> anyhow::Result<CacheWorker> {
    let pool = db::connect(&config.cache).await?;
    migrate::migrate_pool(&pool).await?;
    let fetcher = HttpFetcher::new(&config.cache.origin)?;
    Ok(CacheWorker::new(
        config.cache.manifest(),
        CacheStorage::new(pool),
        Arc::new(fetcher),
    ))
}

/// Installs, activates, and serves until the process is terminated.
///
/// Install failure aborts startup; nothing is served from a partial cache.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let worker = build_worker(config).await?;

    let count = worker.install().await?;
    let deleted = worker.activate().await?;
    println!(
        "Cache '{}' ready: {} assets, {} stale bucket(s) removed",
        worker.manifest().bucket_name(),
        count,
        deleted.len()
    );

    let app = router(Arc::new(worker));

    let bind_addr = &config.server.bind;
    println!("Serving {} on http://{}", config.cache.origin, bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Router with the cache-first handler on every path.
pub fn router(worker: Arc<CacheWorker>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .fallback(get(handle_fetch))
        .layer(cors)
        .with_state(worker)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "network_error".to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /* ============

async fn handle_fetch(
    State(worker): State<Arc<CacheWorker>>,
    uri: Uri,
) -> Result<Response, AppError> {
    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let (response, source) = worker.fetch(&url).await?;
    Ok(to_response(response, source))
}

fn to_response(stored: StoredResponse, source: FetchSource) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let source = match source {
        FetchSource::Cache => "cache",
        FetchSource::Network => "network",
    };

    let mut builder = Response::builder()
        .status(status)
        .header(SOURCE_HEADER, source);
    if let Some(content_type) = stored.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    match builder.body(Body::from(stored.body)) {
        Ok(resp) => resp,
        Err(e) => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "bad_response".to_string(),
            message: e.to_string(),
        }
        .into_response(),
    }
}
