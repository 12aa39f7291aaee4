//! # RPG Client Module
//!
//! Client side of the RPG's realtime backend. It connects to the game module
//! (or an in-memory mock of it), calls reducers, mirrors subscribed tables and
//! keeps the player's session state.
//!
//! The system is organized into several sub-modules:
//! - `config`: environment-driven configuration and backend selection
//! - `events`: the typed event bus every backend publishes on
//! - `backend`: the `GameBackend` trait with its mock and remote implementations
//! - `net`: WebSocket transport and the SpacetimeDB JSON protocol
//! - `cache`: client-side replica of subscribed rows
//! - `supervisor`: connection timeout and the single retry
//! - `auth`: session state for the login and character screens
//! - `position`: movement integration and periodic position publishing

pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod net;
pub mod position;
pub mod supervisor;

// Re-export commonly used items
pub use auth::{AuthSession, AuthState};
pub use backend::{create_backend, GameBackend, MockBackend, MockDatabase, RemoteBackend};
pub use cache::ClientCache;
pub use config::{BackendKind, ClientConfig};
pub use error::{ClientError, ClientResult};
pub use events::{EventBus, GameEvent, RowDiff, TableChange};
pub use position::{InputAxes, Movement, PositionSync};
pub use supervisor::ConnectionSupervisor;
