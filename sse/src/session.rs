//! Lifecycle driver the transport uses to run a connection.
//!
//! The transport accepts a stream request, builds a [`Session`] and later
//! reports the disconnect through it. Every lifecycle callback is delivered as
//! a task on the connection's own lane, never directly from the I/O side.

use crate::connection::{EventSourceConnection, Transport};
use crate::executor::{ErrorSink, HandlerExecutor};
use crate::handler::EventSourceHandler;
use crate::request::HttpRequest;
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Session {
    handler: Arc<dyn EventSourceHandler>,
    connection: EventSourceConnection,
    disconnected: AtomicBool,
}

impl Session {
    /// Bind a new connection to `transport` and schedule `on_open` on its lane.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        handler: Arc<dyn EventSourceHandler>,
        request: HttpRequest,
        transport: Arc<dyn Transport>,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let executor = HandlerExecutor::spawn(format!("sse-{}", request.id()), error_sink);
        let connection = EventSourceConnection::new(Arc::new(request), transport, executor);
        info!(
            "Opened SSE connection {} for {}",
            connection.id(),
            connection.http_request().uri()
        );

        let on_open = handler.clone();
        let conn = connection.clone();
        connection.execute(move || on_open.on_open(&conn));

        Self {
            handler,
            connection,
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> &EventSourceConnection {
        &self.connection
    }

    /// Deliver an inbound message to the handler's `on_message` on the
    /// connection lane.
    ///
    /// The HTTP transport never calls this: an EventSource stream has no
    /// client-to-server direction. It is the entry point for transports that
    /// do, such as a websocket or message-bus bridge.
    pub fn message_received(&self, message: impl Into<String>) {
        let message = message.into();
        let handler = self.handler.clone();
        let conn = self.connection.clone();
        self.connection
            .execute(move || handler.on_message(&conn, &message));
    }

    /// The transport has released the socket, whichever side closed it.
    ///
    /// Sends are suppressed from this point on. `on_close` runs after all
    /// work already queued on the lane, then the lane is retired. Calling
    /// this more than once has no further effect.
    pub fn transport_closed(&self) {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return;
        }
        let connection = &self.connection;
        connection.begin_closing();
        info!("SSE connection {} disconnected", connection.id());

        let handler = self.handler.clone();
        let conn = connection.clone();
        connection.execute(move || handler.on_close(&conn));

        let conn = connection.clone();
        connection.execute(move || {
            conn.mark_closed();
            Ok(())
        });
        connection.handler_executor().retire();
    }
}
