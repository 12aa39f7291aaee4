//! # Table Rows
//!
//! Client-side mirrors of the game module's tables. Field order matches the
//! module's column order: SpacetimeDB's JSON encoding may send a row as a
//! positional array, and serde accepts both arrays and objects for these
//! structs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{deserialize_identity, Appearance, CharacterClass, CharacterId, Direction, Position, Timestamp};

/// The tables a client subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    User,
    Character,
    CharacterAppearance,
    Session,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::User,
        Table::Character,
        Table::CharacterAppearance,
        Table::Session,
    ];

    /// Table name as declared in the game module
    pub fn name(&self) -> &'static str {
        match self {
            Table::User => "user",
            Table::Character => "character",
            Table::CharacterAppearance => "character_appearance",
            Table::Session => "session",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown table: {}", s))
    }
}

/// Registered player account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "deserialize_identity")]
    pub identity: String,
    pub username: String,
    pub created_at: Timestamp,
    pub last_login: Timestamp,
}

/// A playable character owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    #[serde(deserialize_with = "deserialize_identity")]
    pub user_identity: String,
    pub name: String,
    pub class: String,
    pub level: u32,
    pub position_x: f32,
    pub position_y: f32,
    pub direction: String,
    pub created_at: Timestamp,
    pub last_updated: Timestamp,
}

impl Character {
    pub fn position(&self) -> Position {
        Position::new(self.position_x, self.position_y)
    }

    /// Parsed class, `None` if the column holds something unknown
    pub fn character_class(&self) -> Option<CharacterClass> {
        self.class.parse().ok()
    }

    /// Parsed facing direction, defaulting to down
    pub fn facing(&self) -> Direction {
        self.direction.parse().unwrap_or_default()
    }

    pub fn is_owned_by(&self, identity: &str) -> bool {
        self.user_identity == identity
    }
}

/// Cosmetic data, one row per character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterAppearance {
    pub character_id: CharacterId,
    pub skin: String,
    pub hair: String,
    pub eyes: String,
    pub outfit: String,
}

impl CharacterAppearance {
    pub fn new(character_id: CharacterId, appearance: &Appearance) -> Self {
        Self {
            character_id,
            skin: appearance.skin.clone(),
            hair: appearance.hair.clone(),
            eyes: appearance.eyes.clone(),
            outfit: appearance.outfit.clone(),
        }
    }

    pub fn appearance(&self) -> Appearance {
        Appearance {
            skin: self.skin.clone(),
            hair: self.hair.clone(),
            eyes: self.eyes.clone(),
            outfit: self.outfit.clone(),
        }
    }
}

/// Active play session, at most one per identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(deserialize_with = "deserialize_identity")]
    pub identity: String,
    pub character_id: CharacterId,
    pub address: String,
    pub connected_at: Timestamp,
    pub last_activity: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_row_decodes_from_positional_array() {
        let json = r#"[7, {"__identity__": "0xAB"}, "Aria", "mage", 1, 10.5, 20.0, "left", 100, 200]"#;
        let row: Character = serde_json::from_str(json).unwrap();
        assert_eq!(row.id, 7);
        assert_eq!(row.user_identity, "ab");
        assert_eq!(row.character_class(), Some(CharacterClass::Mage));
        assert_eq!(row.facing(), Direction::Left);
        assert_eq!(row.position(), Position::new(10.5, 20.0));
    }

    #[test]
    fn table_names_parse_back() {
        for table in Table::ALL {
            assert_eq!(table.name().parse::<Table>().unwrap(), table);
        }
        assert!("counter".parse::<Table>().is_err());
    }
}
