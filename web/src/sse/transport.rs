use log::*;
use service::AppState;
use sse::{ConnectionId, Frame, Session, Transport};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

/// Transport that hands frames to the response body through a channel.
///
/// Writes never wait on the network. Closing drops the sender, which ends
/// the body once the frames already queued have been flushed.
pub(crate) struct ChannelTransport {
    sender: Mutex<Option<UnboundedSender<Frame>>>,
}

impl ChannelTransport {
    pub(crate) fn new(sender: UnboundedSender<Frame>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<UnboundedSender<Frame>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for ChannelTransport {
    fn write(&self, frame: Frame) {
        match self.sender().as_ref() {
            Some(sender) => {
                if sender.send(frame).is_err() {
                    debug!("SSE response body already dropped, frame discarded");
                }
            }
            None => debug!("SSE transport closed, frame discarded"),
        }
    }

    fn close(&self) {
        self.sender().take();
    }
}

/// Owned by the response body stream. Dropping it, whether because the
/// client went away or because the body finished after `close()`, reports
/// the disconnect to the core.
pub(crate) struct DisconnectGuard {
    session: Session,
    connection_id: ConnectionId,
    app_state: AppState,
}

impl DisconnectGuard {
    pub(crate) fn new(session: Session, app_state: AppState) -> Self {
        let connection_id = app_state
            .connections
            .register(session.connection().clone());
        Self {
            session,
            connection_id,
            app_state,
        }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        debug!(
            "SSE response stream for connection {} dropped, cleaning up",
            self.connection_id
        );
        self.app_state.connections.unregister(&self.connection_id);
        self.session.transport_closed();
    }
}
