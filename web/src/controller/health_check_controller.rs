use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use service::AppState;

/// GET liveness check, including the number of open push streams.
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(json!({
            "status": "healthy",
            "open_streams": app_state.connections_ref().len(),
        })),
    )
}
