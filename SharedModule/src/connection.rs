//! # Connection Types
//!
//! Connection state and parameters shared by the client backends.

use serde::{Deserialize, Serialize};

/// State of the connection to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    /// Not connected to the server
    #[default]
    Disconnected,

    /// Attempting to connect to the server
    Connecting,

    /// Connected to the server
    Connected,

    /// Connection failed
    Failed,
}

impl ConnectionState {
    /// True while connected or on the way there
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

/// Connection parameters for the SpacetimeDB server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// WebSocket endpoint (e.g. "ws://127.0.0.1:3000/v1/database/rpg-game/subscribe")
    pub url: String,

    /// Module (database) name
    pub module: String,

    /// Optional authentication token to reuse an identity
    pub auth_token: Option<String>,
}

/// The reason for a disconnection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Normal disconnection by client request
    ClientRequest,

    /// The server closed the socket
    ServerClosed,

    /// Network error
    NetworkError(String),
}
