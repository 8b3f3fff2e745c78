//! scrumdeck production server.
//!
//! Planning-poker room server: participants join a room over a WebSocket,
//! estimate features with hidden simultaneous votes, the facilitator reveals,
//! and unanimous rounds advance the backlog.
//!
//! # Architecture
//!
//! This crate is production "glue" around [`scrumdeck_core`]'s pure session
//! logic. The [`RoomSession`](scrumdeck_core::RoomSession) state machine
//! returns events (Sans-IO); this crate moves them: the [`RoomRegistry`]
//! keeps one handle per live room, every mutation runs under that room's
//! lock, and the room's [`RoomChannel`] fans the resulting events out to
//! each connection's writer task. Rooms share nothing; different rooms
//! proceed fully in parallel.
//!
//! # Components
//!
//! - [`Server`]: accept loop and per-connection tasks
//! - [`WsTransport`]: WebSocket listener (room addressed in the upgrade path)
//! - [`RoomRegistry`] / [`RoomHandle`]: room lifecycle and per-room locking
//! - [`RoomChannel`]: per-room broadcast
//! - [`FeatureSource`] / [`JsonBacklog`]: feature-list seeding

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backlog;
mod broadcast;
mod error;
mod registry;
mod transport;

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

pub use backlog::{FeatureSource, JsonBacklog};
pub use broadcast::{OutboundSender, RoomChannel};
pub use error::ServerError;
use futures_util::{SinkExt, StreamExt};
pub use registry::{RoomDefaults, RoomHandle, RoomRegistry};
use scrumdeck_proto::{ClientRequest, ServerEvent};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{WebSocketStream, tungstenite::Message};
pub use transport::{RoomPath, WsTransport};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8900").
    pub bind_address: String,
    /// Path to the JSON backlog file seeding new rooms.
    pub backlog_path: String,
    /// Room policy applied to every room.
    pub rooms: RoomDefaults,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8900".to_string(),
            backlog_path: "backlog.json".to_string(),
            rooms: RoomDefaults::default(),
        }
    }
}

/// Production scrumdeck server.
///
/// Wraps the room registry with WebSocket transport.
pub struct Server {
    registry: Arc<RoomRegistry>,
    transport: WsTransport,
}

impl Server {
    /// Load the backlog and bind the listener.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let backlog = JsonBacklog::load(Path::new(&config.backlog_path))?;
        tracing::info!(rooms = backlog.room_count(), "backlog loaded");

        let registry = Arc::new(RoomRegistry::new(Arc::new(backlog), config.rooms));
        let transport = WsTransport::bind(&config.bind_address).await?;

        Ok(Self { registry, transport })
    }

    /// Run the server, accepting connections and routing requests.
    ///
    /// This method runs until the process is shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("server listening on {}", self.transport.local_addr()?);

        loop {
            match self.transport.accept().await {
                Ok((socket, path)) => {
                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, path, registry).await {
                            tracing::debug!("connection error: {e}");
                        }
                    });
                },
                Err(e) => {
                    tracing::warn!("accept error: {e}");
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Connection ids only need to be unique within the process lifetime.
fn next_connection_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Drive a single participant connection from join to disconnect.
async fn handle_connection(
    socket: WebSocketStream<TcpStream>,
    path: RoomPath,
    registry: Arc<RoomRegistry>,
) -> Result<(), ServerError> {
    let conn_id = next_connection_id();
    let (mut sink, mut stream) = socket.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<String>();

    let handle = match registry.register(&path.room, conn_id, &path.participant, sender).await {
        Ok(handle) => handle,
        Err(err) => {
            // Unknown room: tell this client why and hang up
            let refusal = serde_json::to_string(&ServerEvent::error(&err))?;
            let _ = sink.send(Message::text(refusal)).await;
            let _ = sink.close().await;
            return Ok(());
        },
    };

    // Single writer per connection: events reach the socket in the order the
    // room emitted them
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sink.send(Message::text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    tracing::info!(room = %path.room, participant = %path.participant, conn_id, "connected");
    handle.join_participant(&path.participant).await;

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                dispatch_request(&handle, conn_id, &path.participant, text.as_str()).await;
            },
            Ok(Message::Close(_)) => break,
            // tungstenite answers pings on its own; nothing else is expected
            Ok(_) => {},
            Err(e) => {
                tracing::debug!(conn_id, "read error: {e}");
                break;
            },
        }
    }

    tracing::info!(room = %path.room, participant = %path.participant, conn_id, "disconnected");
    registry.connection_closed(&path.room, conn_id).await;
    // The registry dropped our sender, so the writer drains and exits
    let _ = writer.await;

    Ok(())
}

/// Parse one inbound message and run it against the room.
async fn dispatch_request(handle: &RoomHandle, conn_id: u64, participant: &str, text: &str) {
    match serde_json::from_str::<ClientRequest>(text) {
        Ok(ClientRequest::Vote { player, vote }) => {
            handle.process(conn_id, |session| session.vote(&player, &vote)).await;
        },
        Ok(ClientRequest::Reveal) => {
            // The reveal privilege is checked against the connection's own
            // identity, never against client-supplied data
            handle.process(conn_id, |session| session.reveal(participant)).await;
        },
        Ok(ClientRequest::StartFeature) => {
            handle.process(conn_id, |session| Ok(session.start_feature())).await;
        },
        Err(err) => {
            tracing::debug!(conn_id, "unparseable request: {err}");
            handle.send_error(conn_id, "unknown request").await;
        },
    }
}
