use config::Config;
use sse::{ConnectionRegistry, ErrorSink, LogErrorSink};
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state shared by every request handler.
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub connections: Arc<ConnectionRegistry>,
    pub error_sink: Arc<dyn ErrorSink>,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        Self {
            config: app_config,
            connections: Arc::new(ConnectionRegistry::new()),
            error_sink: Arc::new(LogErrorSink),
        }
    }

    /// Replace the server-wide sink that receives failures from handler tasks.
    pub fn with_error_sink(mut self, error_sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = error_sink;
        self
    }

    pub fn connections_ref(&self) -> &ConnectionRegistry {
        self.connections.as_ref()
    }
}
