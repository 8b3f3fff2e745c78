//! WebSocket transport.
//!
//! One WebSocket connection per participant per room, addressed by the
//! upgrade request path:
//!
//! ```text
//! /ws/poker/{room}/{participant}
//! ```
//!
//! The handshake itself belongs to tokio-tungstenite; this module only binds
//! the listener, upgrades connections, and pulls the room address out of the
//! path. Upgrades with a malformed path are refused with a 404 before the
//! WebSocket is established.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};

use crate::error::ServerError;

/// Room address carried in a connection's upgrade path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPath {
    /// Room identifier.
    pub room: String,
    /// Display name of the connecting participant.
    pub participant: String,
}

impl RoomPath {
    /// Parse `/ws/poker/{room}/{participant}`; a trailing slash is
    /// tolerated. Empty segments are rejected.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["ws", "poker", room, participant] => {
                Some(Self { room: (*room).to_owned(), participant: (*participant).to_owned() })
            },
            _ => None,
        }
    }
}

/// WebSocket listener.
pub struct WsTransport {
    listener: TcpListener,
}

impl WsTransport {
    /// Bind the listener.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("WebSocket transport bound to {}", addr);

        Ok(Self { listener })
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }

    /// Accept and upgrade the next connection.
    ///
    /// Blocks until a client connects with a well-formed room path; clients
    /// with a bad path are refused during the handshake and the accept loop
    /// keeps going with an error for the caller to log.
    pub async fn accept(&self) -> Result<(WebSocketStream<TcpStream>, RoomPath), ServerError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| ServerError::Transport(format!("accept failed: {e}")))?;

        let mut room_path = None;
        let socket = accept_hdr_async(stream, |request: &Request, response: Response| {
            match RoomPath::parse(request.uri().path()) {
                Some(path) => {
                    room_path = Some(path);
                    Ok(response)
                },
                None => {
                    let mut refusal = ErrorResponse::new(Some(
                        "expected /ws/poker/{room}/{participant}".to_owned(),
                    ));
                    *refusal.status_mut() = StatusCode::NOT_FOUND;
                    Err(refusal)
                },
            }
        })
        .await
        .map_err(|e| ServerError::Transport(format!("handshake with {peer} failed: {e}")))?;

        // The callback ran, or the handshake above would have failed
        let path = room_path
            .ok_or_else(|| ServerError::Internal("handshake completed without a path".into()))?;

        Ok((socket, path))
    }
}
