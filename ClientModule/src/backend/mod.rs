//! # Game Backends
//!
//! The [`GameBackend`] trait is the only surface the rest of the client talks
//! to. Two implementations exist: an in-memory [`MockBackend`] for offline
//! development and tests, and a [`RemoteBackend`] speaking to a live
//! SpacetimeDB server. The choice is made once, by [`create_backend`].
//!
//! Every call is fire-and-forget. A method only returns an error for failures
//! it can detect immediately (not connected, bad input); completion and late
//! failures arrive on the event bus.

pub mod mock;
pub mod remote;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;

use rpg_shared::{
    Character, CharacterAppearance, CharacterDraft, CharacterId, ConnectionState, Direction,
    Position, ReducerCall, Session, User,
};

use crate::config::{BackendKind, ClientConfig};
use crate::error::ClientResult;
use crate::events::{EventBus, GameEvent};

pub use mock::{MockBackend, MockDatabase};
pub use remote::RemoteBackend;

pub trait GameBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Start connecting. Does nothing while already connecting or connected.
    fn connect(&self) -> ClientResult<()>;

    /// Tear the connection down and forget identity-bound state
    fn disconnect(&self);

    fn state(&self) -> ConnectionState;

    /// Identity of this client, once the server has assigned one
    fn identity(&self) -> Option<String>;

    /// Hand a reducer call to the backend
    fn call_reducer(&self, call: ReducerCall) -> ClientResult<()>;

    /// Characters owned by this client's identity, in id order
    fn user_characters(&self) -> Vec<Character>;

    fn appearance(&self, character_id: CharacterId) -> Option<CharacterAppearance>;

    /// The user row of this client's identity
    fn current_user(&self) -> Option<User>;

    /// The session row of this client's identity
    fn own_session(&self) -> Option<Session>;

    fn events(&self) -> &EventBus;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn register_user(&self, username: &str) -> ClientResult<()> {
        self.call_reducer(ReducerCall::register_user(username))
    }

    fn create_character(&self, draft: &CharacterDraft) -> ClientResult<()> {
        self.call_reducer(ReducerCall::create_character(draft))
    }

    fn login(&self, character_id: CharacterId) -> ClientResult<()> {
        self.call_reducer(ReducerCall::Login { character_id })
    }

    fn logout(&self) -> ClientResult<()> {
        self.call_reducer(ReducerCall::Logout)
    }

    /// Publish the player's position. Dropped while disconnected and never
    /// reported when it fails.
    fn update_position(&self, position: Position, direction: Direction) {
        if !self.is_connected() {
            return;
        }
        let _ = self.call_reducer(ReducerCall::update_position(position, direction));
    }
}

/// Build the backend selected by `config`
pub fn create_backend(config: &ClientConfig) -> ClientResult<Arc<dyn GameBackend>> {
    config.validate()?;
    let backend: Arc<dyn GameBackend> = match config.backend {
        BackendKind::Mock => {
            info!("Using mock game backend");
            Arc::new(MockBackend::new(config))
        }
        BackendKind::Remote => {
            info!(
                "Using SpacetimeDB backend at {} (module {})",
                config.server, config.module
            );
            Arc::new(RemoteBackend::new(config))
        }
    };
    Ok(backend)
}

/// Lock a mutex, recovering the guard if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Event reported when `call` completes successfully. `created` is the id of
/// the character a `create_character` call inserted, when known.
pub(crate) fn completion_event(call: &ReducerCall, created: Option<CharacterId>) -> Option<GameEvent> {
    match call {
        ReducerCall::RegisterUser { username } => Some(GameEvent::UserRegistered {
            username: username.trim().to_string(),
        }),
        ReducerCall::CreateCharacter { name, .. } => Some(GameEvent::CharacterCreated {
            character_id: created,
            name: name.trim().to_string(),
        }),
        ReducerCall::Login { character_id } => Some(GameEvent::LoggedIn {
            character_id: *character_id,
        }),
        ReducerCall::Logout => Some(GameEvent::LoggedOut),
        ReducerCall::UpdatePosition { .. } => None,
    }
}
