use crate::connection::{ConnectionId, EventSourceConnection};
use dashmap::DashMap;
use log::*;

/// Registry of live connections, used by the transport for server-wide
/// operations such as broadcasting and shutdown.
///
/// Everything the registry does to a connection goes through that
/// connection's lane, so it is ordered with the handler's own work.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, EventSourceConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection - O(1)
    pub fn register(&self, connection: EventSourceConnection) -> ConnectionId {
        let connection_id = connection.id().clone();
        self.connections.insert(connection_id.clone(), connection);
        debug!(
            "Registered SSE connection {} ({} open)",
            connection_id,
            self.connections.len()
        );
        connection_id
    }

    /// Unregister a connection - O(1)
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<EventSourceConnection> {
        let removed = self.connections.remove(connection_id).map(|(_, conn)| conn);
        if removed.is_some() {
            debug!("Unregistered SSE connection {connection_id}");
        }
        removed
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<EventSourceConnection> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send a message to every open connection - O(n)
    pub fn broadcast(&self, message: &str) {
        for entry in self.connections.iter() {
            let conn = entry.value().clone();
            let message = message.to_string();
            entry.value().execute(move || {
                conn.send(&message);
                Ok(())
            });
        }
    }

    /// Close every registered connection after the work already queued on it.
    pub fn close_all(&self) {
        let connections: Vec<_> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        info!("Closing {} SSE connection(s)", connections.len());

        for conn in connections {
            let lane_conn = conn.clone();
            conn.execute(move || {
                lane_conn.close();
                Ok(())
            });
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
