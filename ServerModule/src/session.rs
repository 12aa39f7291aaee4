//! # Sessions
//!
//! Login binds the caller's identity to one of its characters. An identity
//! has at most one session; logging in again switches the character.

use spacetimedb::{ReducerContext, Table};

use rpg_shared::rules::{self, RuleError};

use crate::account::require_user;
use crate::character::require_owned;
use crate::connection::caller_address;
use crate::tables::{character, session, user, Character, Session, User};
use crate::{now_millis, rule};

#[spacetimedb::reducer]
pub fn login(ctx: &ReducerContext, character_id: u64) -> Result<(), String> {
    let account = require_user(ctx)?;
    let playing = require_owned(ctx, character_id)?;

    let now = now_millis(ctx);
    ctx.db.user().identity().update(User {
        last_login: now,
        ..account
    });

    match ctx.db.session().identity().find(ctx.sender) {
        Some(existing) => {
            ctx.db.session().identity().update(Session {
                character_id,
                last_activity: now,
                ..existing
            });
        }
        None => {
            ctx.db.session().insert(Session {
                identity: ctx.sender,
                character_id,
                address: caller_address(ctx),
                connected_at: now,
                last_activity: now,
            });
        }
    }

    log::info!("{} logged in as {}", ctx.sender, playing.name);
    Ok(())
}

/// Close the caller's session. Succeeds when there is none.
#[spacetimedb::reducer]
pub fn logout(ctx: &ReducerContext) -> Result<(), String> {
    if ctx.db.session().identity().delete(ctx.sender) {
        log::info!("{} logged out", ctx.sender);
    }
    Ok(())
}

#[spacetimedb::reducer]
pub fn update_position(
    ctx: &ReducerContext,
    x: f32,
    y: f32,
    direction: String,
) -> Result<(), String> {
    let facing = rules::parse_direction(&direction).map_err(rule)?;
    let active = ctx
        .db
        .session()
        .identity()
        .find(ctx.sender)
        .ok_or_else(|| rule(RuleError::NotLoggedIn))?;
    let moved = ctx
        .db
        .character()
        .id()
        .find(active.character_id)
        .ok_or_else(|| rule(RuleError::CharacterNotFound))?;

    let now = now_millis(ctx);
    ctx.db.character().id().update(Character {
        position_x: x,
        position_y: y,
        direction: facing.as_str().to_string(),
        last_updated: now,
        ..moved
    });
    ctx.db.session().identity().update(Session {
        last_activity: now,
        ..active
    });
    Ok(())
}
