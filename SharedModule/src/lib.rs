//! # SharedModule
//!
//! Shared types and rules used by both the RPG client and the SpacetimeDB game
//! module. This crate holds the table row mirrors, the reducer call set, the
//! subscription query builder and the validation both sides enforce.

// Export module structure
pub mod types;
pub mod constants;
pub mod connection;
pub mod tables;
pub mod reducer;
pub mod query;
pub mod rules;

// Re-export commonly used items for convenience
pub use types::*;
pub use connection::{ConnectionParams, ConnectionState, DisconnectReason};
pub use tables::{Character, CharacterAppearance, Session, Table, User};
pub use reducer::ReducerCall;
pub use query::SubscriptionQuery;
pub use rules::RuleError;
