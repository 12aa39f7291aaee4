//! # Client Configuration
//!
//! Reads the server address, module name and backend selection from the
//! environment (optionally seeded from a `.env` file).

use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::Lazy;

use rpg_shared::constants::{mock, network};
use rpg_shared::ConnectionParams;

use crate::error::{ClientError, ClientResult};

pub const ENV_SERVER: &str = "SPACETIME_SERVER";
pub const ENV_MODULE: &str = "SPACETIME_MODULE";
pub const ENV_USE_REAL: &str = "USE_REAL_SPACETIMEDB";
pub const ENV_TOKEN: &str = "SPACETIME_TOKEN";
pub const ENV_SEED_MOCK: &str = "MOCK_SEED_CHARACTERS";

// `.env` is read at most once per process
static DOTENV: Lazy<bool> = Lazy::new(|| match dotenvy::dotenv() {
    Ok(path) => {
        debug!("Loaded environment from {}", path.display());
        true
    }
    Err(_) => false,
});

/// Which backend implementation to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-memory stand-in, no network
    Mock,
    /// A SpacetimeDB server over WebSocket
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server: String,
    pub module: String,
    pub backend: BackendKind,
    pub auth_token: Option<String>,
    pub seed_mock_characters: bool,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub position_sync_interval: Duration,
    pub mock_connect_delay: Duration,
    pub mock_reducer_delay: Duration,
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: network::DEFAULT_SERVER.to_string(),
            module: network::DEFAULT_MODULE.to_string(),
            backend: BackendKind::Mock,
            auth_token: None,
            seed_mock_characters: false,
            connect_timeout: network::CONNECT_TIMEOUT,
            reconnect_delay: network::RECONNECT_DELAY,
            position_sync_interval: network::POSITION_SYNC_INTERVAL,
            mock_connect_delay: mock::CONNECT_DELAY,
            mock_reducer_delay: mock::REDUCER_DELAY,
            event_capacity: network::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Mock backend with default timings
    pub fn mock() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV);
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match non_empty(ENV_USE_REAL).as_deref().map(parse_flag) {
            Some(Some(true)) => BackendKind::Remote,
            Some(Some(false)) | None => BackendKind::Mock,
            Some(None) => {
                warn!("Unrecognised {} value, falling back to the mock backend", ENV_USE_REAL);
                BackendKind::Mock
            }
        };

        Self {
            server: non_empty(ENV_SERVER).unwrap_or(defaults.server),
            module: non_empty(ENV_MODULE).unwrap_or(defaults.module),
            backend,
            auth_token: non_empty(ENV_TOKEN),
            seed_mock_characters: non_empty(ENV_SEED_MOCK)
                .as_deref()
                .and_then(parse_flag)
                .unwrap_or(false),
            ..defaults
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_seeded_mock(mut self) -> Self {
        self.seed_mock_characters = true;
        self
    }

    /// Reject addresses the connection layer cannot use
    pub fn validate(&self) -> ClientResult<()> {
        if !self.server.contains(':') {
            return Err(ClientError::InvalidConfig(format!(
                "invalid server address '{}'",
                self.server
            )));
        }
        if self.module.trim().is_empty() {
            return Err(ClientError::InvalidConfig("module name is empty".to_string()));
        }
        Ok(())
    }

    /// Server address with the scheme swapped for its WebSocket equivalent
    pub fn ws_server(&self) -> String {
        let server = self.server.trim_end_matches('/');
        if let Some(rest) = server.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = server.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else if server.starts_with("ws://") || server.starts_with("wss://") {
            server.to_string()
        } else {
            format!("ws://{}", server)
        }
    }

    /// Subscription endpoint of the configured module
    pub fn subscribe_url(&self) -> String {
        format!("{}/v1/database/{}/subscribe", self.ws_server(), self.module)
    }

    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            url: self.subscribe_url(),
            module: self.module.clone(),
            auth_token: self.auth_token.clone(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
