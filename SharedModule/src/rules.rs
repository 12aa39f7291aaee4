//! # Game Rules
//!
//! Validation shared by the game module and the mock backend, so both reject
//! the same inputs with the same messages.

use thiserror::Error;

use crate::constants::game::{
    EYE_OPTIONS, HAIR_OPTIONS, MAX_CHARACTER_NAME_LEN, MAX_USERNAME_LEN, OUTFIT_OPTIONS, SKIN_OPTIONS,
    SPAWN_RANGE,
};
use crate::types::{Appearance, CharacterClass, CharacterDraft, CharacterId, Direction, Position};

/// A violated game rule. The display text is shown to players as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("Username is required")]
    UsernameRequired,

    #[error("Username must be at most {} characters", MAX_USERNAME_LEN)]
    UsernameTooLong,

    #[error("User already registered")]
    UserAlreadyRegistered,

    #[error("User not registered")]
    UserNotRegistered,

    #[error("Character name is required")]
    CharacterNameRequired,

    #[error("Character name must be at most {} characters", MAX_CHARACTER_NAME_LEN)]
    CharacterNameTooLong,

    #[error("Character name already taken")]
    CharacterNameTaken,

    #[error("Unknown character class: {0}")]
    UnknownClass(String),

    #[error("Invalid {slot} option: {value}")]
    InvalidAppearance { slot: &'static str, value: String },

    #[error("Unknown direction: {0}")]
    UnknownDirection(String),

    #[error("Character not found")]
    CharacterNotFound,

    #[error("Character does not belong to this user")]
    CharacterNotOwned,

    #[error("Not logged in")]
    NotLoggedIn,
}

/// Trim and check a username
pub fn validate_username(username: &str) -> Result<&str, RuleError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(RuleError::UsernameRequired);
    }
    if trimmed.chars().count() > MAX_USERNAME_LEN {
        return Err(RuleError::UsernameTooLong);
    }
    Ok(trimmed)
}

/// Trim and check a character name
pub fn validate_character_name(name: &str) -> Result<&str, RuleError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RuleError::CharacterNameRequired);
    }
    if trimmed.chars().count() > MAX_CHARACTER_NAME_LEN {
        return Err(RuleError::CharacterNameTooLong);
    }
    Ok(trimmed)
}

pub fn validate_appearance(appearance: &Appearance) -> Result<(), RuleError> {
    let slots: [(&'static str, &str, &[&str]); 4] = [
        ("skin", appearance.skin.as_str(), SKIN_OPTIONS),
        ("hair", appearance.hair.as_str(), HAIR_OPTIONS),
        ("eyes", appearance.eyes.as_str(), EYE_OPTIONS),
        ("outfit", appearance.outfit.as_str(), OUTFIT_OPTIONS),
    ];
    for (slot, value, options) in slots {
        if !options.contains(&value) {
            return Err(RuleError::InvalidAppearance {
                slot,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Check a full draft; returns the trimmed name on success.
pub fn validate_draft(draft: &CharacterDraft) -> Result<&str, RuleError> {
    let name = validate_character_name(&draft.name)?;
    validate_appearance(&draft.appearance)?;
    Ok(name)
}

/// Validate the raw reducer arguments for character creation.
pub fn parse_draft(
    name: &str,
    class: &str,
    skin: &str,
    hair: &str,
    eyes: &str,
    outfit: &str,
) -> Result<CharacterDraft, RuleError> {
    let draft = CharacterDraft {
        name: validate_character_name(name)?.to_string(),
        class: class.parse::<CharacterClass>()?,
        appearance: Appearance {
            skin: skin.to_string(),
            hair: hair.to_string(),
            eyes: eyes.to_string(),
            outfit: outfit.to_string(),
        },
    };
    validate_appearance(&draft.appearance)?;
    Ok(draft)
}

pub fn parse_direction(direction: &str) -> Result<Direction, RuleError> {
    direction.parse()
}

/// Id handed out after a counter holding `last` (the last id issued).
pub fn next_character_id(last: Option<CharacterId>) -> CharacterId {
    last.unwrap_or(0) + 1
}

/// Spawn point in `0..SPAWN_RANGE` on both axes, scattered from `seed`
pub fn spawn_point(seed: u64) -> Position {
    // splitmix64 finalizer
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;

    let unit = |bits: u64| (bits & 0xFF_FFFF) as f32 / 16_777_216.0;
    Position::new(unit(z) * SPAWN_RANGE, unit(z >> 32) * SPAWN_RANGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_usernames_are_rejected() {
        assert_eq!(validate_username(""), Err(RuleError::UsernameRequired));
        assert_eq!(validate_username("   "), Err(RuleError::UsernameRequired));
        assert_eq!(validate_username("  hero "), Ok("hero"));
        assert_eq!(validate_username(&"x".repeat(33)), Err(RuleError::UsernameTooLong));
    }

    #[test]
    fn appearance_outside_the_options_is_rejected() {
        let mut appearance = Appearance::default();
        assert!(validate_appearance(&appearance).is_ok());

        appearance.hair = "purple".to_string();
        let err = validate_appearance(&appearance).unwrap_err();
        assert_eq!(err.to_string(), "Invalid hair option: purple");
    }

    #[test]
    fn parse_draft_checks_every_argument() {
        let draft = parse_draft(" Aria ", "mage", "tan", "red", "green", "noble").unwrap();
        assert_eq!(draft.name, "Aria");
        assert_eq!(draft.class, CharacterClass::Mage);

        assert_eq!(
            parse_draft("Aria", "bard", "tan", "red", "green", "noble"),
            Err(RuleError::UnknownClass("bard".to_string()))
        );
        assert_eq!(
            parse_draft("", "mage", "tan", "red", "green", "noble"),
            Err(RuleError::CharacterNameRequired)
        );
    }

    #[test]
    fn character_ids_start_at_one() {
        assert_eq!(next_character_id(None), 1);
        assert_eq!(next_character_id(Some(41)), 42);
    }

    #[test]
    fn spawn_points_stay_in_range() {
        for seed in 0..1000u64 {
            let p = spawn_point(seed * 7919);
            assert!((0.0..SPAWN_RANGE).contains(&p.x), "x out of range for seed {}", seed);
            assert!((0.0..SPAWN_RANGE).contains(&p.y), "y out of range for seed {}", seed);
        }
        assert_ne!(spawn_point(1), spawn_point(2));
    }

    #[test]
    fn messages_match_what_players_see() {
        assert_eq!(RuleError::CharacterNameTaken.to_string(), "Character name already taken");
        assert_eq!(RuleError::UserAlreadyRegistered.to_string(), "User already registered");
        assert_eq!(RuleError::UsernameTooLong.to_string(), "Username must be at most 32 characters");
    }
}
