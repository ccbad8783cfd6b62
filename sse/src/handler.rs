use crate::connection::EventSourceConnection;
use crate::error::BoxError;

/// Application callbacks for one kind of push stream.
///
/// Every callback for a given connection runs on that connection's lane, so
/// callbacks never overlap with each other or with tasks submitted through
/// [`EventSourceConnection::execute`]. An `Err` (or a panic) is reported to the
/// server's error sink and does not affect other connections.
pub trait EventSourceHandler: Send + Sync {
    /// The stream is established; typically sends the first events.
    fn on_open(&self, connection: &EventSourceConnection) -> Result<(), BoxError>;

    /// The stream is gone, closed by either side. Sends are already suppressed.
    fn on_close(&self, _connection: &EventSourceConnection) -> Result<(), BoxError> {
        Ok(())
    }

    /// A message addressed to this connection arrived out of band.
    fn on_message(
        &self,
        _connection: &EventSourceConnection,
        _message: &str,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}
