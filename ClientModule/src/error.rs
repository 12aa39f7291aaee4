//! # Client Errors
//!
//! Every failure the client can report. The display text is what ends up in
//! the session's `error` field, so it is written for players.

use std::time::Duration;

use rpg_shared::RuleError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("Not connected to SpacetimeDB")]
    NotConnected,

    #[error("Invalid game server configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Rule(#[from] RuleError),

    /// A reducer failed on the server
    #[error("{0}")]
    Reducer(String),

    #[error("Connection timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_errors_keep_their_message() {
        let err: ClientError = RuleError::CharacterNameTaken.into();
        assert_eq!(err.to_string(), "Character name already taken");
    }

    #[test]
    fn timeout_reports_whole_seconds() {
        let err = ClientError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "Connection timed out after 10s");
    }
}
