//! SSE HTTP transport for the web layer.
//!
//! This module contains the Axum endpoint and the channel-backed transport
//! that feeds a streaming response body. The connection core (Session,
//! EventSourceConnection, handler trait) lives in the `sse` crate.

pub mod handler;
pub(crate) mod transport;
