//! HTTP transport for the push server.
//!
//! Owns the sockets and the axum router, and plugs the `sse` connection core
//! into streaming `text/event-stream` responses.

use log::*;
use service::AppState;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

mod controller;
pub mod handlers;
pub mod router;
pub mod sse;

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// On shutdown every open stream is closed so graceful shutdown is not held
/// up by clients that would otherwise stay connected forever.
pub async fn serve<F>(
    listener: TcpListener,
    router: axum::Router,
    app_state: AppState,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Server starting... listening on {}", listener.local_addr()?);

    let connections = app_state.connections.clone();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        info!("Shutting down, closing {} open stream(s)", connections.len());
        connections.close_all();
    })
    .await
}
