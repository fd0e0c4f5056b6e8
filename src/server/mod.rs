//! HTTP API
//!
//! A thin axum layer over [`TrademarkService`]: handlers parse parameters,
//! call the service and shape JSON.

mod error;
mod handlers;

pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::Instrument;

use crate::config::{DataConfig, InitMode, LoadMode};
use crate::core::trademark::TrademarkService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TrademarkService>,
    pub init_mode: InitMode,
    pub load_mode: LoadMode,
}

impl AppState {
    pub fn new(service: Arc<TrademarkService>, data: &DataConfig) -> Self {
        Self {
            service,
            init_mode: data.init_mode,
            load_mode: data.load_mode,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/search", get(handlers::search))
        .route("/autocomplete", get(handlers::autocomplete))
        .route("/status", get(handlers::status))
        .route("/load-data", post(handlers::load_data))
        .route("/application/:number", get(handlers::get_by_application_number))
        .route("/:pid", get(handlers::get_by_pid))
        .route("/:pid/view", post(handlers::increment_view_count));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api/trademarks", api)
        .layer(middleware::from_fn(process_time))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

/// Serve until the process is interrupted.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Trademark search API listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down");
        })
        .await
}

/// Runs each request in a span and reports its duration in `X-Process-Time`.
async fn process_time(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path()
    );
    let start = Instant::now();
    let mut response = next.run(request).instrument(span).await;
    let elapsed = start.elapsed().as_secs_f64();

    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed)) {
        response.headers_mut().insert("x-process-time", value);
    }
    log::debug!("request handled in {:.4}s", elapsed);
    response
}
