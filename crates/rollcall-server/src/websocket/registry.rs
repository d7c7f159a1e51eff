//! Live connections and fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use rollcall_core::{ConnectionId, Identity, OutboundEvent, UserId};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Every registered connection, indexed by connection id.
///
/// Delivery is best-effort: a connection whose queue is full or whose
/// writer has gone away is skipped and logged, and the others still
/// receive the frame.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn register(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID. Unknown ids are ignored.
    pub async fn unregister(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Send `event` to every writable connection whose identity matches
    /// `predicate`. Returns how many connections accepted the frame.
    pub async fn broadcast<P>(&self, predicate: P, event: &OutboundEvent) -> usize
    where
        P: Fn(&Identity) -> bool,
    {
        let json = match event.to_json() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event = %event.event, error = %e, "failed to serialize event");
                return 0;
            }
        };

        let conns = self.connections.read().await;
        let mut delivered = 0;
        for conn in conns.values() {
            if !predicate(&conn.identity) || !conn.is_open() {
                continue;
            }
            if conn.enqueue(Arc::clone(&json)) {
                delivered += 1;
            } else {
                warn!(conn_id = %conn.id, event = %event.event, "failed to send event to client");
            }
        }
        debug!(event = %event.event, delivered, "fan-out");
        delivered
    }

    /// Send `event` to every connection of one user.
    pub async fn send_to(&self, user_id: &UserId, event: &OutboundEvent) -> usize {
        self.broadcast(|identity| &identity.id == user_id, event).await
    }

    /// Send `event` to every connection.
    pub async fn broadcast_all(&self, event: &OutboundEvent) -> usize {
        self.broadcast(|_| true, event).await
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Look up one connection.
    pub async fn get(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(connection_id).cloned()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
