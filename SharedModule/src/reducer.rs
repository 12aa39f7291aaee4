//! # Reducer Calls
//!
//! The closed set of reducers the client may invoke on the game module,
//! together with their positional argument encoding.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{CharacterDraft, CharacterId, Direction, Position};

/// A reducer invocation, ready to be sent or applied by a mock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReducerCall {
    RegisterUser {
        username: String,
    },
    CreateCharacter {
        name: String,
        class: String,
        skin: String,
        hair: String,
        eyes: String,
        outfit: String,
    },
    Login {
        character_id: CharacterId,
    },
    Logout,
    UpdatePosition {
        x: f32,
        y: f32,
        direction: Direction,
    },
}

impl ReducerCall {
    pub fn register_user(username: impl Into<String>) -> Self {
        ReducerCall::RegisterUser {
            username: username.into(),
        }
    }

    pub fn create_character(draft: &CharacterDraft) -> Self {
        ReducerCall::CreateCharacter {
            name: draft.name.clone(),
            class: draft.class.id().to_string(),
            skin: draft.appearance.skin.clone(),
            hair: draft.appearance.hair.clone(),
            eyes: draft.appearance.eyes.clone(),
            outfit: draft.appearance.outfit.clone(),
        }
    }

    pub fn update_position(position: Position, direction: Direction) -> Self {
        ReducerCall::UpdatePosition {
            x: position.x,
            y: position.y,
            direction,
        }
    }

    /// Reducer name as exported by the game module
    pub fn name(&self) -> &'static str {
        match self {
            ReducerCall::RegisterUser { .. } => "register_user",
            ReducerCall::CreateCharacter { .. } => "create_character",
            ReducerCall::Login { .. } => "login",
            ReducerCall::Logout => "logout",
            ReducerCall::UpdatePosition { .. } => "update_position",
        }
    }

    /// Arguments in declaration order, as a JSON array
    pub fn args(&self) -> Value {
        match self {
            ReducerCall::RegisterUser { username } => json!([username]),
            ReducerCall::CreateCharacter {
                name,
                class,
                skin,
                hair,
                eyes,
                outfit,
            } => json!([name, class, skin, hair, eyes, outfit]),
            ReducerCall::Login { character_id } => json!([character_id]),
            ReducerCall::Logout => json!([]),
            ReducerCall::UpdatePosition { x, y, direction } => json!([x, y, direction.as_str()]),
        }
    }

    pub fn args_json(&self) -> String {
        self.args().to_string()
    }

    /// Calls that fire too often to log
    pub fn is_quiet(&self) -> bool {
        matches!(self, ReducerCall::UpdatePosition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CharacterClass;

    #[test]
    fn create_character_args_follow_reducer_signature() {
        let draft = CharacterDraft::new("Aria", CharacterClass::Rogue);
        let call = ReducerCall::create_character(&draft);
        assert_eq!(call.name(), "create_character");
        assert_eq!(
            call.args(),
            json!(["Aria", "rogue", "light", "black", "brown", "casual"])
        );
    }

    #[test]
    fn only_position_updates_are_quiet() {
        let update = ReducerCall::update_position(Position::new(1.0, 2.0), Direction::Left);
        assert!(update.is_quiet());
        assert_eq!(update.args_json(), "[1.0,2.0,\"left\"]");
        assert!(!ReducerCall::Logout.is_quiet());
        assert_eq!(ReducerCall::Logout.args_json(), "[]");
    }
}
