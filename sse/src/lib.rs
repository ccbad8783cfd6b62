//! Server-Sent Events (SSE) connection core.
//!
//! This crate is the part of the push server that sits between the transport
//! (which owns the socket and the originating request) and application
//! handlers (which decide what to push and when). It knows nothing about
//! HTTP servers; the `web` crate plugs it into axum.
//!
//! # Architecture
//!
//! - **Frames**: every outgoing message is encoded as one `data:` record per
//!   line followed by a blank line, so multi-line payloads survive the trip.
//! - **One lane per connection**: each connection owns a [`HandlerExecutor`],
//!   a FIFO queue drained by a single tokio task. Lifecycle callbacks and
//!   explicitly submitted tasks for one connection never overlap, while
//!   different connections run in parallel on the shared runtime.
//! - **Request-owned data**: the key/value store exposed by a connection lives
//!   on the request; the connection only holds a reference.
//! - **Transport-controlled close**: `close()` asks the transport to drop the
//!   socket; the connection only reaches `Closed` once the transport reports
//!   the socket released. Sends after `close()` are silently dropped.
//!
//! # Message Flow
//!
//! 1. The transport accepts a stream request and calls [`Session::open`]
//! 2. `on_open` runs on the new connection's lane and typically sends events
//! 3. Timers or other threads get back onto the lane with
//!    [`EventSourceConnection::execute`]
//! 4. The transport reports the disconnect via [`Session::transport_closed`];
//!    `on_close` runs on the lane and the lane is retired
//!
//! # Example: a handler
//!
//! ```rust
//! use sse::{BoxError, EventSourceConnection, EventSourceHandler};
//!
//! struct Greeter;
//!
//! impl EventSourceHandler for Greeter {
//!     fn on_open(&self, connection: &EventSourceConnection) -> Result<(), BoxError> {
//!         let name = connection.http_request().query_param("name").unwrap_or("there");
//!         connection.send(format!("hello {name}")).send("bye").close();
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - `frame`: wire encoder
//! - `request`: request metadata and the attached data store
//! - `executor`: serialized per-connection lanes and the error sink
//! - `connection`: the connection object, its state machine and the `Transport` seam
//! - `handler`: application callbacks
//! - `session`: lifecycle driver used by the transport
//! - `registry`: live connection registry for broadcast and shutdown

pub mod connection;
pub mod error;
pub mod executor;
pub mod frame;
pub mod handler;
pub mod registry;
pub mod request;
pub mod session;

pub use connection::{ConnectionId, ConnectionState, EventSourceConnection, Transport};
pub use error::{BoxError, Error, ErrorKind};
pub use executor::{ErrorSink, HandlerExecutor, LogErrorSink};
pub use frame::Frame;
pub use handler::EventSourceHandler;
pub use registry::ConnectionRegistry;
pub use request::{DataMap, DataValue, HttpRequest};
pub use session::Session;
