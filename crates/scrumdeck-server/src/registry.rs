//! Room registry and per-room serialization.
//!
//! The registry is the single process-wide map from room name to its live
//! [`RoomHandle`]. Rooms are created on first join (seeded from the
//! [`FeatureSource`]) and evicted as soon as the last connection is gone, so
//! an idle process holds no room state.
//!
//! # Locking
//!
//! Correctness hinges on one invariant: at most one in-flight mutation per
//! room. Each handle wraps its [`RoomSession`] in a `tokio::sync::Mutex`,
//! and every mutation — join, vote, reveal, leave, the automatic post-reveal
//! resolution — runs inside that lock, including the broadcast of the
//! resulting events. Different rooms share nothing and proceed in parallel.
//!
//! Lock order is registry map → room session → channel map, always. The map
//! lock is held only for lookup/insert/evict plus the channel attach that
//! pins a handle against eviction.

use std::{collections::HashMap, sync::Arc};

use scrumdeck_core::{RoomError, RoomSession, SessionConfig};
use scrumdeck_proto::ServerEvent;
use tokio::sync::Mutex;

use crate::{
    backlog::FeatureSource,
    broadcast::{OutboundSender, RoomChannel},
};

/// Room policy applied to every session the registry creates.
#[derive(Debug, Clone, Default)]
pub struct RoomDefaults {
    /// Let facilitators reveal before everyone has voted.
    pub allow_force_reveal: bool,
    /// URL base for the `final_backlog` redirect, e.g. `/final_backlog`.
    /// The room name is appended. `None` disables the redirect.
    pub final_backlog_url_base: Option<String>,
}

impl RoomDefaults {
    fn session_config(&self, room: &str) -> SessionConfig {
        SessionConfig {
            allow_force_reveal: self.allow_force_reveal,
            final_backlog_url: self
                .final_backlog_url_base
                .as_ref()
                .map(|base| format!("{}/{room}/", base.trim_end_matches('/'))),
        }
    }
}

/// One live room: its session behind the per-room lock, plus its fan-out
/// channel.
pub struct RoomHandle {
    room: String,
    session: Mutex<RoomSession>,
    channel: RoomChannel,
}

impl RoomHandle {
    /// Room name this handle serves.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Run the join transition for `participant` and broadcast the results.
    pub async fn join_participant(&self, participant: &str) {
        let mut session = self.session.lock().await;
        let events = session.join(participant);
        self.broadcast_locked(&mut session, events).await;
    }

    /// Run one mutating operation under the room lock and broadcast the
    /// resulting events.
    ///
    /// On a domain error the session is untouched and the error is delivered
    /// to `conn_id` alone as an `error` event.
    pub async fn process<F>(&self, conn_id: u64, operation: F)
    where
        F: FnOnce(&mut RoomSession) -> Result<Vec<ServerEvent>, RoomError>,
    {
        let mut session = self.session.lock().await;
        match operation(&mut session) {
            Ok(events) => self.broadcast_locked(&mut session, events).await,
            Err(err) => {
                tracing::debug!(room = %self.room, conn_id, "request rejected: {err}");
                self.channel.send_to(conn_id, &ServerEvent::error(&err)).await;
            },
        }
    }

    /// Deliver a request-scoped error to one connection.
    pub async fn send_error(&self, conn_id: u64, message: &str) {
        self.channel.send_to(conn_id, &ServerEvent::error(message)).await;
    }

    /// Broadcast events while holding the session lock; participants whose
    /// connections all died are removed via `leave`, and the leave events
    /// are broadcast too.
    async fn broadcast_locked(&self, session: &mut RoomSession, events: Vec<ServerEvent>) {
        let mut pending = events;
        while !pending.is_empty() {
            let mut departed = Vec::new();
            for event in &pending {
                for name in self.channel.publish(event).await {
                    if !departed.contains(&name) {
                        departed.push(name);
                    }
                }
            }
            pending = departed.iter().flat_map(|name| session.leave(name)).collect();
        }
    }

    async fn is_idle(&self) -> bool {
        self.session.lock().await.is_empty() && self.channel.connection_count().await == 0
    }
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle").field("room", &self.room).finish()
    }
}

/// Process-wide room map. Create on first join, evict when empty, nothing
/// survives a restart.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Arc<RoomHandle>>>,
    backlog: Arc<dyn FeatureSource>,
    defaults: RoomDefaults,
}

impl RoomRegistry {
    /// Create a registry seeding new rooms from `backlog`.
    #[must_use]
    pub fn new(backlog: Arc<dyn FeatureSource>, defaults: RoomDefaults) -> Self {
        Self { rooms: Mutex::new(HashMap::new()), backlog, defaults }
    }

    /// Look up (or create) the room and attach a connection's outbound
    /// queue to it.
    ///
    /// The attach happens under the map lock so the handle cannot be evicted
    /// between lookup and first use. Fails with
    /// [`RoomError::RoomNotFound`] when the backlog source does not know the
    /// room.
    pub async fn register(
        &self,
        room: &str,
        conn_id: u64,
        participant: &str,
        sender: OutboundSender,
    ) -> Result<Arc<RoomHandle>, RoomError> {
        let mut rooms = self.rooms.lock().await;

        let handle = match rooms.get(room) {
            Some(handle) => Arc::clone(handle),
            None => {
                let features = self
                    .backlog
                    .features_for(room)
                    .ok_or_else(|| RoomError::RoomNotFound(room.to_owned()))?;
                tracing::info!(room, pending = features.len(), "creating room");
                let session =
                    RoomSession::new(room, features, self.defaults.session_config(room));
                let handle = Arc::new(RoomHandle {
                    room: room.to_owned(),
                    session: Mutex::new(session),
                    channel: RoomChannel::new(),
                });
                rooms.insert(room.to_owned(), Arc::clone(&handle));
                handle
            },
        };

        handle.channel.join(conn_id, participant, sender).await;
        Ok(handle)
    }

    /// Handle a transport-level close: detach the connection, run `leave`
    /// once the participant's last connection is gone, and evict the room if
    /// it ended up empty. Disconnects are ordinary transitions, not errors.
    pub async fn connection_closed(&self, room: &str, conn_id: u64) {
        let handle = { self.rooms.lock().await.get(room).cloned() };
        let Some(handle) = handle else { return };

        if let Some(participant) = handle.channel.leave(conn_id).await {
            if !handle.channel.has_participant(&participant).await {
                let mut session = handle.session.lock().await;
                let events = session.leave(&participant);
                handle.broadcast_locked(&mut session, events).await;
                let empty = session.is_empty();
                drop(session);
                if empty {
                    self.evict_if_idle(room).await;
                }
            }
        }
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    async fn evict_if_idle(&self, room: &str) {
        let mut rooms = self.rooms.lock().await;
        let Some(handle) = rooms.get(room).cloned() else { return };
        // Re-checked under the map lock: a join that raced us wins
        if handle.is_idle().await {
            tracing::info!(room, "evicting empty room");
            rooms.remove(room);
        }
    }
}

impl std::fmt::Debug for RoomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomRegistry").finish_non_exhaustive()
    }
}
