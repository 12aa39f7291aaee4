//! # Accounts
//!
//! One user row per identity, created once by `register_user`.

use spacetimedb::{ReducerContext, Table};

use rpg_shared::rules::{self, RuleError};

use crate::tables::{user, User};
use crate::{now_millis, rule};

/// Register the calling identity under `username`
#[spacetimedb::reducer]
pub fn register_user(ctx: &ReducerContext, username: String) -> Result<(), String> {
    let username = rules::validate_username(&username).map_err(rule)?;

    if ctx.db.user().identity().find(ctx.sender).is_some() {
        return Err(rule(RuleError::UserAlreadyRegistered));
    }

    let now = now_millis(ctx);
    ctx.db.user().insert(User {
        identity: ctx.sender,
        username: username.to_string(),
        created_at: now,
        last_login: now,
    });

    log::info!("Registered user {} for {}", username, ctx.sender);
    Ok(())
}

/// The caller's user row, or `UserNotRegistered`
pub(crate) fn require_user(ctx: &ReducerContext) -> Result<User, String> {
    ctx.db
        .user()
        .identity()
        .find(ctx.sender)
        .ok_or_else(|| rule(RuleError::UserNotRegistered))
}
