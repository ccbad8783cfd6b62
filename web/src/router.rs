use crate::controller::health_check_controller;
use crate::sse::handler::{sse_handler, RouteHandler};
use axum::http::{HeaderValue, Method};
use axum::{routing::get, Extension, Router};
use log::*;
use service::AppState;
use sse::EventSourceHandler;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Mount `handler` on every path below the configured EventSource prefix
/// (`/es/*path` by default).
pub fn define_routes(app_state: AppState, handler: Arc<dyn EventSourceHandler>) -> Router {
    let prefix = app_state.config.event_source_path();
    Router::new()
        .merge(event_source_routes(&prefix, handler, app_state.clone()))
        .merge(health_routes(app_state))
}

/// A stream route for `handler` under `prefix`, mergeable into a router
/// built by [`define_routes`]. Each route group carries its own CORS layer
/// so merged mounts answer browsers the same way.
pub fn event_source_routes(
    prefix: &str,
    handler: Arc<dyn EventSourceHandler>,
    app_state: AppState,
) -> Router {
    let path = match prefix.trim_end_matches('/') {
        "" => "/*path".to_string(),
        prefix => format!("{prefix}/*path"),
    };
    debug!("Mounting EventSource handler at {path}");

    Router::new()
        .route(&path, get(sse_handler))
        .layer(Extension(RouteHandler(handler)))
        .layer(cors_layer(&app_state))
        .with_state(app_state)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .layer(cors_layer(&app_state))
        .with_state(app_state)
}

fn cors_layer(app_state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = app_state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_credentials(true)
}
