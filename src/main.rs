use log::*;
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use web::handlers::{EchoHandler, TickerHandler};
use web::router;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!("Starting up the push server in {} mode", config.runtime_env());

    let app_state = AppState::new(config.clone());

    let echo = Arc::new(EchoHandler::new(config.echo_messages.clone()));
    let ticker = Arc::new(TickerHandler::new(std::time::Duration::from_secs(1), None));
    let app = router::define_routes(app_state.clone(), echo).merge(router::event_source_routes(
        "/ticker",
        ticker,
        app_state.clone(),
    ));

    let listener = match TcpListener::bind(config.bind_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {e}", config.bind_address());
            std::process::exit(1);
        }
    };

    if let Err(e) = web::serve(listener, app, app_state, shutdown_signal()).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}
