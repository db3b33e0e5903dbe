//! Connection registry: all live WebSocket connections per user.
//!
//! A user can have zero or many concurrent connections (multiple
//! devices/tabs); each registered connection belongs to exactly one user.
//! The registry is an explicit instance constructed once at startup and
//! handed to every component that pushes — there is no global singleton.

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::ws::protocol::{self, ServerFrame};
use crate::ws::ConnectionSender;

pub type ConnectionId = Uuid;

struct ConnectionHandle {
    id: ConnectionId,
    tx: ConnectionSender,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    by_user: DashMap<String, Vec<ConnectionHandle>>,
    owners: DashMap<ConnectionId, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a live connection to a user. Fails with `AlreadyClosed` if the
    /// channel is no longer open at bind time.
    pub fn register(&self, user_id: &str, tx: ConnectionSender) -> Result<ConnectionId> {
        if tx.is_closed() {
            return Err(CoreError::AlreadyClosed);
        }

        let id = Uuid::now_v7();
        self.owners.insert(id, user_id.to_string());
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .push(ConnectionHandle { id, tx });

        tracing::debug!(
            user_id = %user_id,
            connection_id = %id,
            connections = self.connection_count(user_id),
            "Connection registered"
        );
        Ok(id)
    }

    /// Idempotent removal; a no-op if the connection was already removed.
    pub fn unregister(&self, connection_id: ConnectionId) {
        let Some((_, user_id)) = self.owners.remove(&connection_id) else {
            return;
        };

        if let Some(mut connections) = self.by_user.get_mut(&user_id) {
            connections.retain(|h| h.id != connection_id);
        }
        self.by_user.remove_if(&user_id, |_, v| v.is_empty());

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            "Connection unregistered"
        );
    }

    /// Push a frame to every live connection registered for `user_id`.
    /// Returns the delivered count; 0 is the normal offline case, not an
    /// error. A connection that fails the write is unregistered, and
    /// delivery to the remaining connections continues. The frame is
    /// serialized once, so each target receives it as one whole text frame.
    pub fn send(&self, user_id: &str, frame: &ServerFrame) -> usize {
        let Some(msg) = protocol::encode(frame) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead: Vec<ConnectionId> = Vec::new();

        if let Some(connections) = self.by_user.get(user_id) {
            for handle in connections.iter() {
                if handle.tx.send(msg.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(handle.id);
                }
            }
        }
        // The map read guard is dropped before unregistering to avoid
        // re-entrant locking on the same shard.
        for id in dead {
            tracing::debug!(
                user_id = %user_id,
                connection_id = %id,
                "Dropping unresponsive connection"
            );
            self.unregister(id);
        }

        if delivered == 0 {
            // Delivery miss: the user recovers via backfill on reconnect.
            tracing::debug!(user_id = %user_id, "Live push reached zero connections");
        }
        delivered
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.by_user.get(user_id).map(|v| v.len()).unwrap_or(0)
    }
}
