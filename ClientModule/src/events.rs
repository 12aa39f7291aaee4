//! # Client Events
//!
//! Typed event bus between the backends and whatever renders client state.
//! Every backend notification (connection changes, reducer completions, row
//! changes from subscriptions) is one of the [`GameEvent`] variants.

use log::debug;
use tokio::sync::broadcast;

use rpg_shared::{Character, CharacterAppearance, CharacterId, Session, Table, User};

/// Inserts and deletes for one table from one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct RowDiff<T> {
    pub inserts: Vec<T>,
    pub deletes: Vec<T>,
}

impl<T> Default for RowDiff<T> {
    fn default() -> Self {
        Self {
            inserts: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl<T> RowDiff<T> {
    pub fn inserted(rows: Vec<T>) -> Self {
        Self {
            inserts: rows,
            deletes: Vec::new(),
        }
    }

    pub fn deleted(rows: Vec<T>) -> Self {
        Self {
            inserts: Vec::new(),
            deletes: rows,
        }
    }

    /// An in-place row update: the old row is deleted, the new one inserted
    pub fn replaced(old: T, new: T) -> Self {
        Self {
            inserts: vec![new],
            deletes: vec![old],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.deletes.len()
    }
}

/// Row changes for one subscribed table
#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    User(RowDiff<User>),
    Character(RowDiff<Character>),
    CharacterAppearance(RowDiff<CharacterAppearance>),
    Session(RowDiff<Session>),
}

impl TableChange {
    pub fn table(&self) -> Table {
        match self {
            TableChange::User(_) => Table::User,
            TableChange::Character(_) => Table::Character,
            TableChange::CharacterAppearance(_) => Table::CharacterAppearance,
            TableChange::Session(_) => Table::Session,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TableChange::User(diff) => diff.is_empty(),
            TableChange::Character(diff) => diff.is_empty(),
            TableChange::CharacterAppearance(diff) => diff.is_empty(),
            TableChange::Session(diff) => diff.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Connected { identity: String },
    Disconnected,
    Error { message: String },
    IdentityChanged { identity: String },
    UserRegistered { username: String },
    CharacterCreated { character_id: Option<CharacterId>, name: String },
    LoggedIn { character_id: CharacterId },
    LoggedOut,
    TableChanged(TableChange),
}

impl GameEvent {
    pub fn error(message: impl Into<String>) -> Self {
        GameEvent::Error {
            message: message.into(),
        }
    }

    /// Stable event name, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Connected { .. } => "spacetime:connected",
            GameEvent::Disconnected => "spacetime:disconnected",
            GameEvent::Error { .. } => "spacetime:error",
            GameEvent::IdentityChanged { .. } => "spacetime:identity-changed",
            GameEvent::UserRegistered { .. } => "spacetime:user:registered",
            GameEvent::CharacterCreated { .. } => "spacetime:character:created",
            GameEvent::LoggedIn { .. } => "spacetime:user:logged_in",
            GameEvent::LoggedOut => "spacetime:user:logged_out",
            GameEvent::TableChanged(change) => match change.table() {
                Table::User => "spacetime:subscription:user",
                Table::Character => "spacetime:subscription:character",
                Table::CharacterAppearance => "spacetime:subscription:character_appearance",
                Table::Session => "spacetime:subscription:session",
            },
        }
    }
}

/// Cloneable handle to the broadcast channel carrying [`GameEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GameEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: GameEvent) {
        debug!("Dispatched event: {}", event.name());
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(rpg_shared::constants::network::EVENT_CHANNEL_CAPACITY)
    }
}
