//! # Connection Management
//!
//! Lifecycle hooks for client connections. A session only exists after an
//! explicit login, so connecting records nothing; disconnecting drops the
//! caller's session.

use spacetimedb::ReducerContext;

use crate::tables::session;

/// Called when a client connects
pub fn on_connect(ctx: &ReducerContext) {
    log::info!("Client connected: {}", ctx.sender);
}

/// Called when a client disconnects
pub fn on_disconnect(ctx: &ReducerContext) {
    if ctx.db.session().identity().delete(ctx.sender) {
        log::info!("Client disconnected, session closed: {}", ctx.sender);
    } else {
        log::info!("Client disconnected: {}", ctx.sender);
    }
}

/// Address of the calling connection, empty when the call has none
pub(crate) fn caller_address(ctx: &ReducerContext) -> String {
    ctx.connection_id
        .map(|id| id.to_hex().to_string())
        .unwrap_or_default()
}
