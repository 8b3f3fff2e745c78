//! Per-room event fan-out.
//!
//! A [`RoomChannel`] holds a non-owning map from connection id to that
//! connection's outbound queue. Every connection has exactly one writer task
//! draining its queue into the WebSocket sink, so a connection observes
//! events in the order they were enqueued. Publishing happens while the
//! room's session lock is held, which extends that ordering to the whole
//! room: one logical writer per room.
//!
//! Delivery is best-effort. A send can only fail when the connection's
//! writer task is gone, so a failed send is treated as an implicit
//! disconnect: the entry is dropped and the caller runs `leave` for the
//! participant.

use std::collections::HashMap;

use scrumdeck_proto::ServerEvent;
use tokio::sync::{RwLock, mpsc};

/// Outbound queue handle for one connection.
pub type OutboundSender = mpsc::UnboundedSender<String>;

struct ConnectionEntry {
    participant: String,
    sender: OutboundSender,
}

/// Fan-out of protocol events to every live connection of one room.
#[derive(Default)]
pub struct RoomChannel {
    connections: RwLock<HashMap<u64, ConnectionEntry>>,
}

impl RoomChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a connection's outbound queue.
    pub async fn join(&self, conn_id: u64, participant: &str, sender: OutboundSender) {
        let entry = ConnectionEntry { participant: participant.to_owned(), sender };
        self.connections.write().await.insert(conn_id, entry);
    }

    /// Detach a connection. Returns the participant it belonged to.
    pub async fn leave(&self, conn_id: u64) -> Option<String> {
        self.connections.write().await.remove(&conn_id).map(|entry| entry.participant)
    }

    /// Whether any live connection belongs to `participant`. A participant
    /// with several tabs open stays a member until the last one closes.
    pub async fn has_participant(&self, participant: &str) -> bool {
        self.connections
            .read()
            .await
            .values()
            .any(|entry| entry.participant == participant)
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Deliver `event` to every live connection, best-effort.
    ///
    /// Connections whose queue is gone are removed; the distinct participant
    /// names of those connections are returned so the caller can run their
    /// `leave` transitions.
    pub async fn publish(&self, event: &ServerEvent) -> Vec<String> {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!("failed to serialize event: {err}");
                return Vec::new();
            },
        };

        let mut dead = Vec::new();
        {
            let connections = self.connections.read().await;
            for (conn_id, entry) in connections.iter() {
                if entry.sender.send(json.clone()).is_err() {
                    dead.push(*conn_id);
                }
            }
        }

        if dead.is_empty() {
            return Vec::new();
        }

        let mut connections = self.connections.write().await;
        let mut departed = Vec::new();
        for conn_id in dead {
            if let Some(entry) = connections.remove(&conn_id) {
                tracing::debug!(conn_id, participant = %entry.participant, "dropping dead connection");
                if !departed.contains(&entry.participant) {
                    departed.push(entry.participant);
                }
            }
        }
        // Only report participants with no surviving connection
        departed
            .into_iter()
            .filter(|name| !connections.values().any(|entry| &entry.participant == name))
            .collect()
    }

    /// Deliver an event to a single connection, best-effort. Used for
    /// request-scoped `error` events, which are never broadcast room-wide.
    pub async fn send_to(&self, conn_id: u64, event: &ServerEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!("failed to serialize event: {err}");
                return;
            },
        };

        let connections = self.connections.read().await;
        if let Some(entry) = connections.get(&conn_id) {
            // Failure means the writer is gone; the read loop's close path
            // will run leave shortly
            let _ = entry.sender.send(json);
        }
    }
}
