//! # Mock Backend
//!
//! In-memory stand-in for the game module. Reducers run against local tables
//! using the same rule functions the module uses, so offline play rejects
//! exactly what the server would. Completion events are delayed to mimic a
//! network round trip.
//!
//! A [`MockDatabase`] can be shared between several [`MockBackend`]s with
//! different identities; every connected backend sees the others' row changes.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use tokio::runtime::Handle;

use rpg_shared::constants::{game, mock};
use rpg_shared::rules::{self, RuleError};
use rpg_shared::{
    now_millis, Character, CharacterAppearance, CharacterClass, CharacterDraft, CharacterId,
    ConnectionState, Direction, Position, ReducerCall, Session, Timestamp, User,
};

use super::{completion_event, lock, GameBackend};
use crate::config::{BackendKind, ClientConfig};
use crate::error::{ClientError, ClientResult};
use crate::events::{EventBus, GameEvent, RowDiff, TableChange};

static NEXT_BACKEND_ID: AtomicU64 = AtomicU64::new(1);

/// Rows touched by one reducer
#[derive(Debug, Default)]
struct Applied {
    created: Option<CharacterId>,
    changes: Vec<TableChange>,
}

impl Applied {
    fn with(change: TableChange) -> Self {
        Self {
            created: None,
            changes: vec![change],
        }
    }
}

#[derive(Debug, Default)]
struct MockTables {
    users: BTreeMap<String, User>,
    characters: BTreeMap<CharacterId, Character>,
    appearances: BTreeMap<CharacterId, CharacterAppearance>,
    sessions: BTreeMap<String, Session>,
    counters: HashMap<&'static str, u64>,
}

impl MockTables {
    fn apply(&mut self, identity: &str, address: &str, call: &ReducerCall) -> Result<Applied, RuleError> {
        let now = now_millis();
        match call {
            ReducerCall::RegisterUser { username } => self.register_user(identity, username, now),
            ReducerCall::CreateCharacter {
                name,
                class,
                skin,
                hair,
                eyes,
                outfit,
            } => {
                let draft = rules::parse_draft(name, class, skin, hair, eyes, outfit)?;
                self.create_character(identity, &draft, random_spawn(), Direction::Down, now)
            }
            ReducerCall::Login { character_id } => self.login(identity, address, *character_id, now),
            ReducerCall::Logout => Ok(self.logout(identity)),
            ReducerCall::UpdatePosition { x, y, direction } => {
                self.update_position(identity, Position::new(*x, *y), *direction, now)
            }
        }
    }

    fn require_user(&self, identity: &str) -> Result<(), RuleError> {
        if self.users.contains_key(identity) {
            Ok(())
        } else {
            Err(RuleError::UserNotRegistered)
        }
    }

    fn register_user(&mut self, identity: &str, username: &str, now: Timestamp) -> Result<Applied, RuleError> {
        let username = rules::validate_username(username)?;
        if self.users.contains_key(identity) {
            return Err(RuleError::UserAlreadyRegistered);
        }
        let user = User {
            identity: identity.to_string(),
            username: username.to_string(),
            created_at: now,
            last_login: now,
        };
        self.users.insert(user.identity.clone(), user.clone());
        Ok(Applied::with(TableChange::User(RowDiff::inserted(vec![user]))))
    }

    fn create_character(
        &mut self,
        identity: &str,
        draft: &CharacterDraft,
        spawn: Position,
        facing: Direction,
        now: Timestamp,
    ) -> Result<Applied, RuleError> {
        self.require_user(identity)?;
        let name = rules::validate_draft(draft)?;
        if self.characters.values().any(|c| c.name == name) {
            return Err(RuleError::CharacterNameTaken);
        }

        let id = rules::next_character_id(self.counters.get(game::CHARACTER_ID_COUNTER).copied());
        self.counters.insert(game::CHARACTER_ID_COUNTER, id);

        let character = Character {
            id,
            user_identity: identity.to_string(),
            name: name.to_string(),
            class: draft.class.id().to_string(),
            level: game::STARTING_LEVEL,
            position_x: spawn.x,
            position_y: spawn.y,
            direction: facing.as_str().to_string(),
            created_at: now,
            last_updated: now,
        };
        let appearance = CharacterAppearance::new(id, &draft.appearance);
        self.characters.insert(id, character.clone());
        self.appearances.insert(id, appearance.clone());

        Ok(Applied {
            created: Some(id),
            changes: vec![
                TableChange::Character(RowDiff::inserted(vec![character])),
                TableChange::CharacterAppearance(RowDiff::inserted(vec![appearance])),
            ],
        })
    }

    fn login(
        &mut self,
        identity: &str,
        address: &str,
        character_id: CharacterId,
        now: Timestamp,
    ) -> Result<Applied, RuleError> {
        self.require_user(identity)?;
        let character = self
            .characters
            .get(&character_id)
            .ok_or(RuleError::CharacterNotFound)?;
        if !character.is_owned_by(identity) {
            return Err(RuleError::CharacterNotOwned);
        }

        let mut changes = Vec::new();
        if let Some(user) = self.users.get_mut(identity) {
            let old = user.clone();
            user.last_login = now;
            changes.push(TableChange::User(RowDiff::replaced(old, user.clone())));
        }

        // One session per identity: logging in again switches its character.
        let previous = self.sessions.get(identity).cloned();
        let session = Session {
            identity: identity.to_string(),
            character_id,
            address: address.to_string(),
            connected_at: previous.as_ref().map(|s| s.connected_at).unwrap_or(now),
            last_activity: now,
        };
        self.sessions.insert(session.identity.clone(), session.clone());
        changes.push(TableChange::Session(match previous {
            Some(old) => RowDiff::replaced(old, session),
            None => RowDiff::inserted(vec![session]),
        }));

        Ok(Applied {
            created: None,
            changes,
        })
    }

    fn logout(&mut self, identity: &str) -> Applied {
        match self.sessions.remove(identity) {
            Some(session) => Applied::with(TableChange::Session(RowDiff::deleted(vec![session]))),
            None => Applied::default(),
        }
    }

    fn update_position(
        &mut self,
        identity: &str,
        position: Position,
        direction: Direction,
        now: Timestamp,
    ) -> Result<Applied, RuleError> {
        let session = self.sessions.get_mut(identity).ok_or(RuleError::NotLoggedIn)?;
        let character = self
            .characters
            .get_mut(&session.character_id)
            .ok_or(RuleError::CharacterNotFound)?;

        let old_character = character.clone();
        character.position_x = position.x;
        character.position_y = position.y;
        character.direction = direction.as_str().to_string();
        character.last_updated = now;

        let old_session = session.clone();
        session.last_activity = now;

        Ok(Applied {
            created: None,
            changes: vec![
                TableChange::Character(RowDiff::replaced(old_character, character.clone())),
                TableChange::Session(RowDiff::replaced(old_session, session.clone())),
            ],
        })
    }

    /// Demo data: a registered user owning two characters
    fn seed_demo(&mut self, identity: &str) {
        let now = now_millis();
        let seeds = [
            ("Mock Warrior", CharacterClass::Warrior, Position::new(100.0, 100.0), Direction::Down),
            ("Mock Mage", CharacterClass::Mage, Position::new(200.0, 200.0), Direction::Up),
        ];

        if let Err(err) = self.register_user(identity, mock::MOCK_USERNAME, now) {
            debug!("Seed user not created: {}", err);
        }
        for (name, class, spawn, facing) in seeds {
            let draft = CharacterDraft::new(name, class);
            if let Err(err) = self.create_character(identity, &draft, spawn, facing, now) {
                debug!("Seed character {} not created: {}", name, err);
            }
        }
    }
}

fn random_spawn() -> Position {
    let mut rng = rand::thread_rng();
    Position::new(
        rng.gen_range(0.0..game::SPAWN_RANGE),
        rng.gen_range(0.0..game::SPAWN_RANGE),
    )
}

/// Tables shared by any number of mock backends
#[derive(Debug, Default)]
pub struct MockDatabase {
    tables: Mutex<MockTables>,
    /// Event buses of connected backends, by backend id
    peers: Mutex<HashMap<u64, EventBus>>,
}

impl MockDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Database pre-populated with the demo user and characters of `identity`
    pub fn seeded(identity: &str) -> Arc<Self> {
        let db = Self::default();
        lock(&db.tables).seed_demo(identity);
        Arc::new(db)
    }

    pub fn user(&self, identity: &str) -> Option<User> {
        lock(&self.tables).users.get(identity).cloned()
    }

    pub fn characters_owned_by(&self, identity: &str) -> Vec<Character> {
        lock(&self.tables)
            .characters
            .values()
            .filter(|c| c.is_owned_by(identity))
            .cloned()
            .collect()
    }

    pub fn appearance(&self, character_id: CharacterId) -> Option<CharacterAppearance> {
        lock(&self.tables).appearances.get(&character_id).cloned()
    }

    pub fn session(&self, identity: &str) -> Option<Session> {
        lock(&self.tables).sessions.get(identity).cloned()
    }

    pub fn character_count(&self) -> usize {
        lock(&self.tables).characters.len()
    }

    fn apply(&self, identity: &str, address: &str, call: &ReducerCall) -> Result<Applied, RuleError> {
        lock(&self.tables).apply(identity, address, call)
    }

    /// Drop the session of a departing client
    fn client_disconnected(&self, identity: &str) -> Option<TableChange> {
        let session = lock(&self.tables).sessions.remove(identity)?;
        Some(TableChange::Session(RowDiff::deleted(vec![session])))
    }

    fn attach(&self, backend_id: u64, bus: EventBus) {
        lock(&self.peers).insert(backend_id, bus);
    }

    fn detach(&self, backend_id: u64) {
        lock(&self.peers).remove(&backend_id);
    }

    /// Send row changes to every connected backend
    fn publish(&self, changes: &[TableChange]) {
        let peers: Vec<EventBus> = lock(&self.peers).values().cloned().collect();
        for bus in peers {
            for change in changes {
                bus.emit(GameEvent::TableChanged(change.clone()));
            }
        }
    }
}

#[derive(Debug)]
struct MockConnection {
    state: ConnectionState,
    identity: Option<String>,
    /// Bumped by every connect and disconnect; stale timers compare against it
    epoch: u64,
    /// Runtime `connect` ran on; reducer timers are spawned onto it
    runtime: Option<Handle>,
}

#[derive(Debug)]
struct MockShared {
    id: u64,
    db: Arc<MockDatabase>,
    identity: String,
    address: String,
    bus: EventBus,
    connection: Mutex<MockConnection>,
    connect_delay: Duration,
    reducer_delay: Duration,
}

impl MockShared {
    fn is_current(&self, epoch: u64) -> bool {
        lock(&self.connection).epoch == epoch
    }
}

/// Offline [`GameBackend`]
#[derive(Debug, Clone)]
pub struct MockBackend {
    shared: Arc<MockShared>,
}

impl MockBackend {
    /// Backend over a private database, seeded when the config asks for it
    pub fn new(config: &ClientConfig) -> Self {
        let db = if config.seed_mock_characters {
            MockDatabase::seeded(mock::MOCK_IDENTITY)
        } else {
            MockDatabase::new()
        };
        Self::with_database(config, db, mock::MOCK_IDENTITY)
    }

    /// Backend over a shared database, acting as `identity`
    pub fn with_database(config: &ClientConfig, db: Arc<MockDatabase>, identity: &str) -> Self {
        let connection = MockConnection {
            state: ConnectionState::Disconnected,
            identity: None,
            epoch: 0,
            runtime: None,
        };
        Self {
            shared: Arc::new(MockShared {
                id: NEXT_BACKEND_ID.fetch_add(1, Ordering::Relaxed),
                db,
                identity: identity.to_string(),
                address: mock::MOCK_ADDRESS.to_string(),
                bus: EventBus::new(config.event_capacity),
                connection: Mutex::new(connection),
                connect_delay: config.mock_connect_delay,
                reducer_delay: config.mock_reducer_delay,
            }),
        }
    }

    pub fn database(&self) -> Arc<MockDatabase> {
        self.shared.db.clone()
    }

    fn connected_identity(&self) -> Option<String> {
        let connection = lock(&self.shared.connection);
        match connection.state {
            ConnectionState::Connected => connection.identity.clone(),
            _ => None,
        }
    }
}

impl GameBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    fn connect(&self) -> ClientResult<()> {
        let runtime = Handle::try_current()
            .map_err(|err| ClientError::Transport(format!("no async runtime: {}", err)))?;

        let epoch = {
            let mut connection = lock(&self.shared.connection);
            if connection.state.is_active() {
                return Ok(());
            }
            connection.state = ConnectionState::Connecting;
            connection.epoch += 1;
            connection.runtime = Some(runtime.clone());
            connection.epoch
        };
        info!("Connecting to mock backend as {}", self.shared.identity);

        let shared = self.shared.clone();
        runtime.spawn(async move {
            tokio::time::sleep(shared.connect_delay).await;
            {
                let mut connection = lock(&shared.connection);
                if connection.epoch != epoch || connection.state != ConnectionState::Connecting {
                    debug!("Discarding stale mock connection attempt");
                    return;
                }
                connection.state = ConnectionState::Connected;
                connection.identity = Some(shared.identity.clone());
            }
            shared.db.attach(shared.id, shared.bus.clone());
            info!("Connected to mock backend");
            shared.bus.emit(GameEvent::IdentityChanged {
                identity: shared.identity.clone(),
            });
            shared.bus.emit(GameEvent::Connected {
                identity: shared.identity.clone(),
            });
        });
        Ok(())
    }

    fn disconnect(&self) {
        {
            let mut connection = lock(&self.shared.connection);
            if connection.state == ConnectionState::Disconnected {
                return;
            }
            connection.state = ConnectionState::Disconnected;
            connection.identity = None;
            connection.epoch += 1;
        }

        self.shared.db.detach(self.shared.id);
        if let Some(change) = self.shared.db.client_disconnected(&self.shared.identity) {
            self.shared.db.publish(&[change]);
        }
        info!("Disconnected from mock backend");
        self.shared.bus.emit(GameEvent::Disconnected);
    }

    fn state(&self) -> ConnectionState {
        lock(&self.shared.connection).state
    }

    fn identity(&self) -> Option<String> {
        lock(&self.shared.connection).identity.clone()
    }

    fn call_reducer(&self, call: ReducerCall) -> ClientResult<()> {
        let (identity, epoch, runtime) = {
            let connection = lock(&self.shared.connection);
            match (&connection.state, &connection.identity, &connection.runtime) {
                (ConnectionState::Connected, Some(identity), Some(runtime)) => {
                    (identity.clone(), connection.epoch, runtime.clone())
                }
                _ => return Err(ClientError::NotConnected),
            }
        };
        let quiet = call.is_quiet();

        let applied = match self.shared.db.apply(&identity, &self.shared.address, &call) {
            Ok(applied) => applied,
            Err(err) => {
                if !quiet {
                    warn!("Mock reducer {} failed: {}", call.name(), err);
                    self.shared.bus.emit(GameEvent::error(err.to_string()));
                }
                return Err(err.into());
            }
        };
        if !quiet {
            info!("Mock reducer {} applied", call.name());
        }

        let shared = self.shared.clone();
        runtime.spawn(async move {
            tokio::time::sleep(shared.reducer_delay).await;
            if shared.is_current(epoch) {
                if let Some(event) = completion_event(&call, applied.created) {
                    shared.bus.emit(event);
                }
            }
            shared.db.publish(&applied.changes);
        });
        Ok(())
    }

    fn user_characters(&self) -> Vec<Character> {
        self.connected_identity()
            .map(|identity| self.shared.db.characters_owned_by(&identity))
            .unwrap_or_default()
    }

    fn appearance(&self, character_id: CharacterId) -> Option<CharacterAppearance> {
        self.shared.db.appearance(character_id)
    }

    fn current_user(&self) -> Option<User> {
        self.connected_identity()
            .and_then(|identity| self.shared.db.user(&identity))
    }

    fn own_session(&self) -> Option<Session> {
        self.connected_identity()
            .and_then(|identity| self.shared.db.session(&identity))
    }

    fn events(&self) -> &EventBus {
        &self.shared.bus
    }
}
