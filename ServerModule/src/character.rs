//! # Characters
//!
//! Character creation. Each character gets its appearance row in the same
//! transaction, so subscribers never see one without the other.

use spacetimedb::{ReducerContext, Table};

use rpg_shared::constants::game::STARTING_LEVEL;
use rpg_shared::rules::{self, RuleError};
use rpg_shared::Direction;

use crate::account::require_user;
use crate::tables::{character, character_appearance, Character, CharacterAppearance};
use crate::{now_millis, rule};

#[spacetimedb::reducer]
pub fn create_character(
    ctx: &ReducerContext,
    name: String,
    class: String,
    skin: String,
    hair: String,
    eyes: String,
    outfit: String,
) -> Result<(), String> {
    require_user(ctx)?;
    let draft = rules::parse_draft(&name, &class, &skin, &hair, &eyes, &outfit).map_err(rule)?;

    if ctx.db.character().name().find(&draft.name).is_some() {
        return Err(rule(RuleError::CharacterNameTaken));
    }

    let now = now_millis(ctx);
    let spawn = rules::spawn_point(ctx.timestamp.to_micros_since_unix_epoch() as u64);
    let created = ctx.db.character().insert(Character {
        id: 0,
        user_identity: ctx.sender,
        name: draft.name.clone(),
        class: draft.class.id().to_string(),
        level: STARTING_LEVEL,
        position_x: spawn.x,
        position_y: spawn.y,
        direction: Direction::default().as_str().to_string(),
        created_at: now,
        last_updated: now,
    });

    let appearance = draft.appearance;
    ctx.db.character_appearance().insert(CharacterAppearance {
        character_id: created.id,
        skin: appearance.skin,
        hair: appearance.hair,
        eyes: appearance.eyes,
        outfit: appearance.outfit,
    });

    log::info!(
        "Created {} {} (id {}) for {}",
        draft.class.display_name(),
        created.name,
        created.id,
        ctx.sender
    );
    Ok(())
}

/// Character `id` if the caller owns it
pub(crate) fn require_owned(ctx: &ReducerContext, id: u64) -> Result<Character, String> {
    let found = ctx
        .db
        .character()
        .id()
        .find(id)
        .ok_or_else(|| rule(RuleError::CharacterNotFound))?;
    if found.user_identity != ctx.sender {
        return Err(rule(RuleError::CharacterNotOwned));
    }
    Ok(found)
}
