//! # RPG Server Module
//!
//! SpacetimeDB module holding the authoritative game state. Clients read it
//! through subscriptions and change it only through the reducers below.
//!
//! The system is organized into several sub-modules:
//! - `tables`: the public `user`, `character`, `character_appearance` and `session` tables
//! - `connection`: client connect and disconnect lifecycle
//! - `account`: user registration
//! - `character`: character creation
//! - `session`: login, logout and position updates
//!
//! Validation is shared with the client's mock backend through `rpg_shared::rules`,
//! so both reject the same inputs with the same messages.

use spacetimedb::ReducerContext;

use rpg_shared::RuleError;

// Module declarations
pub mod tables;
pub mod connection;
pub mod account;
pub mod character;
pub mod session;

// Re-export commonly used items
pub use tables::{Character, CharacterAppearance, Session, User};

/// Initialize the module
#[spacetimedb::reducer(init)]
pub fn init(_ctx: &ReducerContext) {
    log::info!("RPG game module initialized");
}

/// Handle client connection
#[spacetimedb::reducer(client_connected)]
pub fn client_connected(ctx: &ReducerContext) {
    connection::on_connect(ctx);
}

/// Handle client disconnection
#[spacetimedb::reducer(client_disconnected)]
pub fn client_disconnected(ctx: &ReducerContext) {
    connection::on_disconnect(ctx);
}

/// Reducer time in milliseconds since the Unix epoch
pub(crate) fn now_millis(ctx: &ReducerContext) -> i64 {
    ctx.timestamp.to_micros_since_unix_epoch() / 1000
}

/// Reducers report rule violations as their message
pub(crate) fn rule(err: RuleError) -> String {
    err.to_string()
}
