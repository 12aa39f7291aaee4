//! # Auth Session
//!
//! Headless state machine behind the login, character select and game
//! screens. It issues calls on the injected backend and folds the backend's
//! events into an [`AuthState`] a UI can render from.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use rpg_shared::rules::{self, RuleError};
use rpg_shared::{Character, CharacterDraft, CharacterId, Session, Table};

use crate::backend::GameBackend;
use crate::error::{ClientError, ClientResult};
use crate::events::{GameEvent, TableChange};

/// Everything the UI shows about the player's account
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    is_authenticated: bool,
    is_loading: bool,
    username: Option<String>,
    characters: Vec<Character>,
    current_character: Option<Character>,
    active_sessions: Vec<Session>,
    error: Option<String>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            is_authenticated: false,
            is_loading: true,
            username: None,
            characters: Vec::new(),
            current_character: None,
            active_sessions: Vec::new(),
            error: None,
        }
    }
}

impl AuthState {
    /// True only while a current character is set
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn character_named(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name == name)
    }

    pub fn current_character(&self) -> Option<&Character> {
        self.current_character.as_ref()
    }

    pub fn active_sessions(&self) -> &[Session] {
        &self.active_sessions
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // The only writer of `current_character` and `is_authenticated`.
    fn set_current(&mut self, character: Option<Character>) {
        self.is_authenticated = character.is_some();
        self.current_character = character;
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.is_loading = false;
    }

    fn reset(&mut self) {
        self.set_current(None);
        self.is_loading = false;
        self.username = None;
        self.characters.clear();
        self.active_sessions.clear();
    }
}

pub struct AuthSession {
    backend: Arc<dyn GameBackend>,
    events: broadcast::Receiver<GameEvent>,
    state: AuthState,
}

impl AuthSession {
    /// Subscribes to the backend's events immediately, so nothing emitted
    /// after construction is missed.
    pub fn new(backend: Arc<dyn GameBackend>) -> Self {
        let events = backend.events().subscribe();
        Self {
            backend,
            events,
            state: AuthState::default(),
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn backend(&self) -> &Arc<dyn GameBackend> {
        &self.backend
    }

    pub fn start(&mut self) -> ClientResult<()> {
        self.backend.connect().map_err(|err| {
            self.state.fail(err.to_string());
            err
        })
    }

    pub fn register(&mut self, username: &str) -> ClientResult<()> {
        let username = match rules::validate_username(username) {
            Ok(name) => name,
            Err(err) => return Err(self.reject(err)),
        };
        self.state.error = None;
        self.state.is_loading = true;
        info!("Registering user {}", username);
        let result = self.backend.register_user(username);
        self.settle(result)
    }

    pub fn create_character(&mut self, draft: &CharacterDraft) -> ClientResult<()> {
        if let Err(err) = rules::validate_draft(draft) {
            return Err(self.reject(err));
        }
        self.state.error = None;
        self.state.is_loading = true;
        info!("Creating character {}", draft.name.trim());
        let result = self.backend.create_character(draft);
        self.settle(result)
    }

    pub fn login(&mut self, character_id: CharacterId) -> ClientResult<()> {
        if self.state.character(character_id).is_none() {
            return Err(self.reject(RuleError::CharacterNotFound));
        }
        self.state.error = None;
        info!("Logging in with character {}", character_id);
        let result = self.backend.login(character_id);
        self.settle(result)
    }

    pub fn logout(&mut self) -> ClientResult<()> {
        info!("Logging out");
        let result = self.backend.logout();
        self.settle(result)
    }

    fn reject(&mut self, err: RuleError) -> ClientError {
        warn!("Rejected locally: {}", err);
        self.state.fail(err.to_string());
        err.into()
    }

    fn settle(&mut self, result: ClientResult<()>) -> ClientResult<()> {
        if let Err(err) = &result {
            self.state.fail(err.to_string());
        }
        result
    }

    /// Fold one backend event into the state
    pub fn apply(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Connected { .. } => {
                self.state.is_loading = false;
                self.state.error = None;
                if let Some(user) = self.backend.current_user() {
                    self.state.username = Some(user.username);
                }
                self.reload_characters();
                self.sync_session();
            }
            GameEvent::Disconnected => self.state.reset(),
            GameEvent::Error { message } => self.state.fail(message.clone()),
            GameEvent::IdentityChanged { .. } => {}
            GameEvent::UserRegistered { username } => {
                self.state.username = Some(username.clone());
                self.state.is_loading = false;
                self.reload_characters();
            }
            GameEvent::CharacterCreated { .. } => {
                self.state.is_loading = false;
                self.reload_characters();
            }
            GameEvent::LoggedIn { character_id } => {
                self.state.is_loading = false;
                self.reload_characters();
                match self.state.character(*character_id).cloned() {
                    Some(character) => self.state.set_current(Some(character)),
                    None => {
                        self.state.set_current(None);
                        self.state.fail(RuleError::CharacterNotFound.to_string());
                    }
                }
            }
            GameEvent::LoggedOut => self.state.set_current(None),
            GameEvent::TableChanged(change) => match change.table() {
                Table::Character | Table::CharacterAppearance => self.reload_characters(),
                Table::Session => self.sync_session(),
                Table::User => self.refresh_username(change),
            },
        }
    }

    fn reload_characters(&mut self) {
        self.state.characters = self.backend.user_characters();
        let refreshed = self
            .state
            .current_character
            .as_ref()
            .and_then(|current| self.state.character(current.id).cloned());
        if self.state.current_character.is_some() {
            self.state.set_current(refreshed);
        }
    }

    fn sync_session(&mut self) {
        self.state.active_sessions = self.backend.own_session().into_iter().collect();
        let current = self
            .state
            .active_sessions
            .first()
            .and_then(|session| self.state.character(session.character_id).cloned());
        self.state.set_current(current);
    }

    fn refresh_username(&mut self, change: &TableChange) {
        let identity = match self.backend.identity() {
            Some(identity) => identity,
            None => return,
        };
        if let TableChange::User(diff) = change {
            if let Some(user) = diff.inserts.iter().find(|u| u.identity == identity) {
                self.state.username = Some(user.username.clone());
            }
        }
    }

    /// Wait for the next event and apply it. `None` once the bus is gone.
    pub async fn next_event(&mut self) -> Option<GameEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.apply(&event);
                    return Some(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session fell behind, {} events skipped", skipped);
                    self.resync();
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Apply every event already queued; returns how many were applied
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply(&event);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Session fell behind, {} events skipped", skipped);
                    self.resync();
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return applied,
            }
        }
    }

    /// Process events until `done` holds or `timeout` passes
    pub async fn wait_until(
        &mut self,
        timeout: Duration,
        done: impl Fn(&AuthState) -> bool,
    ) -> bool {
        let wait = async {
            while !done(&self.state) {
                if self.next_event().await.is_none() {
                    return false;
                }
            }
            true
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    // Rebuild from the backend after missed events.
    fn resync(&mut self) {
        debug!("Resynchronising session state");
        if self.backend.is_connected() {
            self.reload_characters();
            self.sync_session();
        }
    }
}
