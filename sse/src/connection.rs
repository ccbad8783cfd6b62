use crate::error::BoxError;
use crate::executor::HandlerExecutor;
use crate::frame::Frame;
use crate::request::{DataMap, DataValue, HttpRequest};
use log::*;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the core needs from the layer that owns the socket.
///
/// Both calls must return without waiting on network I/O. Write failures are
/// not reported here; the transport surfaces them as a disconnect instead.
/// A transport writes each frame exactly as [`Frame`]'s `Display` renders it.
pub trait Transport: Send + Sync {
    fn write(&self, frame: Frame);
    fn close(&self);
}

/// `Open -> Closing -> Closed`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Open = 0,
    /// `close()` was called or the peer went away; sends are dropped.
    Closing = 1,
    /// The transport has released the socket.
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

/// One open push channel to one client.
///
/// Cloning yields another reference to the same connection. Handler code
/// should call [`send`](Self::send) from the connection's own lane (every
/// lifecycle callback already runs there) and use [`execute`](Self::execute)
/// to get back onto it from timers or other threads.
///
/// Once the connection has left [`ConnectionState::Open`], `send` is a silent
/// no-op and `close` does nothing.
#[derive(Clone)]
pub struct EventSourceConnection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    request: Arc<HttpRequest>,
    transport: Arc<dyn Transport>,
    executor: HandlerExecutor,
    state: AtomicU8,
}

impl EventSourceConnection {
    pub fn new(
        request: Arc<HttpRequest>,
        transport: Arc<dyn Transport>,
        executor: HandlerExecutor,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: ConnectionId::new(),
                request,
                transport,
                executor,
                state: AtomicU8::new(ConnectionState::Open as u8),
            }),
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.inner.id
    }

    pub fn http_request(&self) -> &HttpRequest {
        &self.inner.request
    }

    /// Encode `message` as one event and hand it to the transport.
    pub fn send(&self, message: impl AsRef<str>) -> &Self {
        if self.is_open() {
            self.inner.transport.write(Frame::new(message.as_ref()));
        } else {
            debug!(
                "Dropping message for connection {} in state {:?}",
                self.inner.id,
                self.state()
            );
        }
        self
    }

    /// Ask the transport to terminate the socket. Idempotent.
    pub fn close(&self) -> &Self {
        if self.begin_closing() {
            info!("Closing SSE connection {}", self.inner.id);
            self.inner.transport.close();
        }
        self
    }

    /// Submit a task to this connection's lane.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.inner.executor.execute(task);
    }

    /// The live data store of the originating request (not a copy).
    pub fn data(&self) -> &DataMap {
        self.inner.request.data()
    }

    pub fn data_value(&self, key: &str) -> Option<DataValue> {
        self.data().get(key)
    }

    /// Typed lookup, `None` if unset or of another type.
    pub fn data_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.data().get_as(key)
    }

    pub fn set_data<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> &Self {
        self.data().insert(key, value);
        self
    }

    pub fn data_keys(&self) -> HashSet<String> {
        self.data().keys()
    }

    pub fn handler_executor(&self) -> &HandlerExecutor {
        &self.inner.executor
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Move `Open -> Closing`. Returns false if the connection had already
    /// left `Open`.
    pub(crate) fn begin_closing(&self) -> bool {
        self.inner
            .state
            .compare_exchange(
                ConnectionState::Open as u8,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_closed(&self) {
        self.inner
            .state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}

impl fmt::Debug for EventSourceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSourceConnection")
            .field("id", &self.inner.id)
            .field("uri", &self.inner.request.uri())
            .field("state", &self.state())
            .finish()
    }
}
