//! # Common Types
//!
//! Value types shared by the client, the mock backend and the game module.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::game::{EYE_OPTIONS, HAIR_OPTIONS, OUTFIT_OPTIONS, SKIN_OPTIONS};
use crate::rules::RuleError;

/// Primary key of the character table
pub type CharacterId = u64;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Current wall-clock time in milliseconds
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or_default()
}

/// Canonical form of an identity string: lowercase, no `0x` prefix.
pub fn normalize_identity(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    stripped.to_ascii_lowercase()
}

/// Deserialize an identity from either a plain string or the
/// `{"__identity__": "0x…"}` object SpacetimeDB emits.
pub fn deserialize_identity<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdentityRepr {
        Plain(String),
        Tagged {
            #[serde(rename = "__identity__")]
            hex: serde_json::Value,
        },
    }

    match IdentityRepr::deserialize(deserializer)? {
        IdentityRepr::Plain(s) => Ok(normalize_identity(&s)),
        IdentityRepr::Tagged { hex } => match hex {
            serde_json::Value::String(s) => Ok(normalize_identity(&s)),
            other => Ok(other.to_string()),
        },
    }
}

/// Direction a character is facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(RuleError::UnknownDirection(s.to_string())),
        }
    }
}

/// Playable character classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterClass {
    Warrior,
    Mage,
    Rogue,
    Ranger,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 4] = [
        CharacterClass::Warrior,
        CharacterClass::Mage,
        CharacterClass::Rogue,
        CharacterClass::Ranger,
    ];

    /// Identifier stored in the `class` column
    pub fn id(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "warrior",
            CharacterClass::Mage => "mage",
            CharacterClass::Rogue => "rogue",
            CharacterClass::Ranger => "ranger",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Mage => "Mage",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Ranger => "Ranger",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Strong melee fighter with high health and defense.",
            CharacterClass::Mage => "Powerful spellcaster with elemental magic abilities.",
            CharacterClass::Rogue => "Agile fighter specializing in stealth and critical strikes.",
            CharacterClass::Ranger => "Skilled archer with animal companions and nature abilities.",
        }
    }

    pub fn starting_stats(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Strength +3, Constitution +2",
            CharacterClass::Mage => "Intelligence +3, Wisdom +2",
            CharacterClass::Rogue => "Dexterity +3, Charisma +2",
            CharacterClass::Ranger => "Dexterity +2, Wisdom +2, Constitution +1",
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for CharacterClass {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CharacterClass::ALL
            .into_iter()
            .find(|class| class.id() == wanted)
            .ok_or_else(|| RuleError::UnknownClass(s.to_string()))
    }
}

/// Cosmetic selectors picked at character creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub skin: String,
    pub hair: String,
    pub eyes: String,
    pub outfit: String,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            skin: SKIN_OPTIONS[0].to_string(),
            hair: HAIR_OPTIONS[0].to_string(),
            eyes: EYE_OPTIONS[0].to_string(),
            outfit: OUTFIT_OPTIONS[0].to_string(),
        }
    }
}

/// Everything needed to create a character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDraft {
    pub name: String,
    pub class: CharacterClass,
    pub appearance: Appearance,
}

impl CharacterDraft {
    pub fn new(name: impl Into<String>, class: CharacterClass) -> Self {
        Self {
            name: name.into(),
            class,
            appearance: Appearance::default(),
        }
    }

    pub fn with_appearance(mut self, appearance: Appearance) -> Self {
        self.appearance = appearance;
        self
    }
}

/// 2D world position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_normalized_from_both_forms() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "deserialize_identity")]
            identity: String,
        }

        let plain: Row = serde_json::from_str(r#"{"identity":"0xABCDEF"}"#).unwrap();
        assert_eq!(plain.identity, "abcdef");

        let tagged: Row =
            serde_json::from_str(r#"{"identity":{"__identity__":"0xC0FFEE"}}"#).unwrap();
        assert_eq!(tagged.identity, "c0ffee");
    }

    #[test]
    fn class_parsing_is_case_insensitive() {
        assert_eq!("Mage".parse::<CharacterClass>().unwrap(), CharacterClass::Mage);
        assert_eq!(
            "paladin".parse::<CharacterClass>(),
            Err(RuleError::UnknownClass("paladin".to_string()))
        );
    }

    #[test]
    fn direction_round_trips_through_its_column_value() {
        for dir in [Direction::Up, Direction::Down, Direction::Left, Direction::Right] {
            assert_eq!(dir.as_str().parse::<Direction>().unwrap(), dir);
        }
        assert!("north".parse::<Direction>().is_err());
    }
}
