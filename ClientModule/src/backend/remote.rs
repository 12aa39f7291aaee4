//! # Remote Backend
//!
//! [`GameBackend`] over a live SpacetimeDB connection. Subscribed rows are
//! mirrored in a [`ClientCache`]; reducer calls are matched to their
//! transaction updates by request id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use tokio::runtime::Handle;

use rpg_shared::{
    Character, CharacterAppearance, CharacterId, ConnectionParams, ConnectionState,
    DisconnectReason, ReducerCall, Session, SubscriptionQuery, User,
};

use super::{completion_event, lock, GameBackend};
use crate::cache::ClientCache;
use crate::config::{BackendKind, ClientConfig};
use crate::error::{ClientError, ClientResult};
use crate::events::{EventBus, GameEvent, TableChange};
use crate::net::{self, ClientMessage, NetEvent, ServerMessage, SocketHandle, TransactionUpdate, UpdateStatus};

#[derive(Debug, Default)]
struct RemoteInner {
    state: ConnectionState,
    identity: Option<String>,
    /// Token issued with our identity, reused on reconnect
    token: Option<String>,
    epoch: u64,
    socket: Option<SocketHandle>,
    /// Calls awaiting their transaction update, by request id
    pending: HashMap<u32, ReducerCall>,
    cache: ClientCache,
}

#[derive(Debug)]
struct RemoteShared {
    params: ConnectionParams,
    bus: EventBus,
    inner: Mutex<RemoteInner>,
    next_request: AtomicU32,
}

#[derive(Debug, Clone)]
pub struct RemoteBackend {
    shared: Arc<RemoteShared>,
}

impl RemoteBackend {
    pub fn new(config: &ClientConfig) -> Self {
        let inner = RemoteInner {
            token: config.auth_token.clone(),
            ..RemoteInner::default()
        };
        Self {
            shared: Arc::new(RemoteShared {
                params: config.connection_params(),
                bus: EventBus::new(config.event_capacity),
                inner: Mutex::new(inner),
                next_request: AtomicU32::new(1),
            }),
        }
    }

    /// Token for the identity the server assigned, if any
    pub fn auth_token(&self) -> Option<String> {
        lock(&self.shared.inner).token.clone()
    }

    fn with_identity<T>(&self, f: impl FnOnce(&ClientCache, &str) -> T) -> Option<T> {
        let inner = lock(&self.shared.inner);
        let identity = inner.identity.as_deref()?;
        Some(f(&inner.cache, identity))
    }
}

impl RemoteShared {
    fn next_request_id(&self) -> u32 {
        self.next_request.fetch_add(1, Ordering::Relaxed)
    }

    async fn run(self: Arc<Self>, epoch: u64) {
        let mut params = self.params.clone();
        params.auth_token = lock(&self.inner).token.clone();

        let (socket, mut events) = match net::open(&params).await {
            Ok(pair) => pair,
            Err(err) => {
                self.fail(epoch, err);
                return;
            }
        };

        {
            let mut inner = lock(&self.inner);
            if inner.epoch != epoch {
                debug!("Closing socket of a superseded connection attempt");
                socket.close();
                return;
            }
            inner.socket = Some(socket.clone());
        }

        let subscribe = ClientMessage::Subscribe {
            query_strings: SubscriptionQuery::game_state()
                .iter()
                .map(ToString::to_string)
                .collect(),
            request_id: self.next_request_id(),
        };
        if let Err(err) = socket.send(subscribe) {
            self.fail(epoch, err);
            return;
        }

        while let Some(event) = events.recv().await {
            match event {
                NetEvent::Message(message) => self.handle_message(epoch, message),
                NetEvent::Closed(reason) => {
                    self.closed(epoch, reason);
                    break;
                }
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        lock(&self.inner).epoch == epoch
    }

    fn handle_message(&self, epoch: u64, message: ServerMessage) {
        if !self.is_current(epoch) {
            return;
        }
        match message {
            ServerMessage::IdentityToken { identity, token } => {
                {
                    let mut inner = lock(&self.inner);
                    inner.identity = Some(identity.clone());
                    if !token.is_empty() {
                        inner.token = Some(token);
                    }
                }
                debug!("Identity assigned: {}", identity);
                self.bus.emit(GameEvent::IdentityChanged { identity });
            }
            // The connection counts as up once the subscribed rows are cached.
            ServerMessage::InitialSubscription { changes } => {
                let connected = {
                    let mut inner = lock(&self.inner);
                    inner.cache.clear();
                    for change in &changes {
                        inner.cache.apply(change);
                    }
                    let identity = inner.identity.clone();
                    if inner.state == ConnectionState::Connecting && identity.is_some() {
                        inner.state = ConnectionState::Connected;
                        identity
                    } else {
                        None
                    }
                };
                debug!("Initial subscription applied ({} tables)", changes.len());
                for change in changes {
                    self.bus.emit(GameEvent::TableChanged(change));
                }
                if let Some(identity) = connected {
                    info!("Connected to SpacetimeDB as {}", identity);
                    self.bus.emit(GameEvent::Connected { identity });
                }
            }
            ServerMessage::TransactionUpdate(update) => self.handle_transaction(update),
            ServerMessage::Ignored(kind) => debug!("Ignoring server message {}", kind),
        }
    }

    fn handle_transaction(&self, update: TransactionUpdate) {
        let (call, identity) = {
            let mut inner = lock(&self.inner);
            if let UpdateStatus::Committed(changes) = &update.status {
                for change in changes {
                    inner.cache.apply(change);
                }
            }
            let ours = update.caller_identity.is_some() && update.caller_identity == inner.identity;
            let call = match (ours, update.request_id) {
                (true, Some(id)) => inner.pending.remove(&id),
                _ => None,
            };
            (call, inner.identity.clone())
        };

        match update.status {
            UpdateStatus::Committed(changes) => {
                let created = call
                    .as_ref()
                    .and_then(|call| created_character(call, &changes, identity.as_deref()));
                for change in changes {
                    self.bus.emit(GameEvent::TableChanged(change));
                }
                if let Some(event) = call.and_then(|call| completion_event(&call, created)) {
                    self.bus.emit(event);
                }
            }
            UpdateStatus::Failed(message) => {
                if let Some(call) = call {
                    warn!("Reducer {} failed: {}", call.name(), message);
                    self.bus.emit(GameEvent::error(message));
                }
            }
            UpdateStatus::OutOfEnergy => {
                if let Some(call) = call {
                    warn!("Reducer {} ran out of energy", call.name());
                    self.bus.emit(GameEvent::error("Reducer ran out of energy"));
                }
            }
        }
    }

    fn closed(&self, epoch: u64, reason: DisconnectReason) {
        {
            let mut inner = lock(&self.inner);
            if inner.epoch != epoch {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.identity = None;
            inner.socket = None;
            inner.pending.clear();
            inner.cache.clear();
        }
        match reason {
            DisconnectReason::NetworkError(message) => {
                error!("Connection to SpacetimeDB lost: {}", message);
                self.bus.emit(GameEvent::error(message));
            }
            other => info!("Connection to SpacetimeDB closed: {:?}", other),
        }
        self.bus.emit(GameEvent::Disconnected);
    }

    fn fail(&self, epoch: u64, err: ClientError) {
        {
            let mut inner = lock(&self.inner);
            if inner.epoch != epoch {
                return;
            }
            inner.state = ConnectionState::Failed;
            inner.socket = None;
        }
        error!("Failed to connect to SpacetimeDB: {}", err);
        self.bus.emit(GameEvent::error(err.to_string()));
    }
}

/// Id of the character a successful `create_character` call inserted
fn created_character(
    call: &ReducerCall,
    changes: &[TableChange],
    identity: Option<&str>,
) -> Option<CharacterId> {
    let name = match call {
        ReducerCall::CreateCharacter { name, .. } => name.trim(),
        _ => return None,
    };
    changes.iter().find_map(|change| match change {
        TableChange::Character(diff) => diff
            .inserts
            .iter()
            .find(|c| c.name == name && identity.map_or(true, |id| c.is_owned_by(id)))
            .map(|c| c.id),
        _ => None,
    })
}

impl GameBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn connect(&self) -> ClientResult<()> {
        let runtime = Handle::try_current()
            .map_err(|err| ClientError::Transport(format!("no async runtime: {}", err)))?;

        let epoch = {
            let mut inner = lock(&self.shared.inner);
            if inner.state.is_active() {
                return Ok(());
            }
            inner.state = ConnectionState::Connecting;
            inner.epoch += 1;
            inner.epoch
        };
        info!("Connecting to {}", self.shared.params.url);
        runtime.spawn(self.shared.clone().run(epoch));
        Ok(())
    }

    fn disconnect(&self) {
        let socket = {
            let mut inner = lock(&self.shared.inner);
            if inner.state == ConnectionState::Disconnected {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.identity = None;
            inner.epoch += 1;
            inner.pending.clear();
            inner.cache.clear();
            inner.socket.take()
        };
        if let Some(socket) = socket {
            socket.close();
        }
        info!("Disconnected from SpacetimeDB");
        self.shared.bus.emit(GameEvent::Disconnected);
    }

    fn state(&self) -> ConnectionState {
        lock(&self.shared.inner).state
    }

    fn identity(&self) -> Option<String> {
        lock(&self.shared.inner).identity.clone()
    }

    fn call_reducer(&self, call: ReducerCall) -> ClientResult<()> {
        let quiet = call.is_quiet();
        let request_id = self.shared.next_request_id();
        let socket = {
            let mut inner = lock(&self.shared.inner);
            if inner.state != ConnectionState::Connected {
                return Err(ClientError::NotConnected);
            }
            let socket = inner.socket.clone().ok_or(ClientError::NotConnected)?;
            if !quiet {
                inner.pending.insert(request_id, call.clone());
            }
            socket
        };

        let message = ClientMessage::CallReducer {
            reducer: call.name().to_string(),
            args: call.args_json(),
            request_id,
            flags: 0,
        };
        if let Err(err) = socket.send(message) {
            lock(&self.shared.inner).pending.remove(&request_id);
            return Err(err);
        }
        if !quiet {
            info!("Called reducer {} (request {})", call.name(), request_id);
        }
        Ok(())
    }

    fn user_characters(&self) -> Vec<Character> {
        self.with_identity(|cache, identity| cache.characters_owned_by(identity))
            .unwrap_or_default()
    }

    fn appearance(&self, character_id: CharacterId) -> Option<CharacterAppearance> {
        lock(&self.shared.inner).cache.appearance(character_id).cloned()
    }

    fn current_user(&self) -> Option<User> {
        self.with_identity(|cache, identity| cache.user(identity).cloned())
            .flatten()
    }

    fn own_session(&self) -> Option<Session> {
        self.with_identity(|cache, identity| cache.session(identity).cloned())
            .flatten()
    }

    fn events(&self) -> &EventBus {
        &self.shared.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthSession;
    use crate::events::RowDiff;
    use tokio::sync::broadcast::error::TryRecvError;

    const ME: &str = "c0ffee";

    fn character(id: CharacterId, owner: &str, name: &str) -> Character {
        Character {
            id,
            user_identity: owner.to_string(),
            name: name.to_string(),
            class: "mage".to_string(),
            level: 1,
            position_x: 0.0,
            position_y: 0.0,
            direction: "down".to_string(),
            created_at: 0,
            last_updated: 0,
        }
    }

    fn user(identity: &str, username: &str) -> User {
        User {
            identity: identity.to_string(),
            username: username.to_string(),
            created_at: 0,
            last_login: 0,
        }
    }

    /// Backend on connection `epoch` 1 that has not heard from the server yet
    fn connecting() -> RemoteBackend {
        let backend = RemoteBackend::new(&ClientConfig::mock().with_backend(BackendKind::Remote));
        {
            let mut inner = lock(&backend.shared.inner);
            inner.epoch = 1;
            inner.state = ConnectionState::Connecting;
        }
        backend
    }

    fn identity_token(backend: &RemoteBackend) {
        backend.shared.handle_message(
            1,
            ServerMessage::IdentityToken {
                identity: ME.to_string(),
                token: "tok".to_string(),
            },
        );
    }

    /// Backend with its identity and an empty initial subscription
    fn connected() -> RemoteBackend {
        let backend = connecting();
        identity_token(&backend);
        backend
            .shared
            .handle_message(1, ServerMessage::InitialSubscription { changes: Vec::new() });
        backend
    }

    #[test]
    fn calls_fail_fast_while_disconnected() {
        let backend = RemoteBackend::new(&ClientConfig::mock());
        assert_eq!(backend.login(1), Err(ClientError::NotConnected));
    }

    #[test]
    fn initial_subscription_completes_the_connection() {
        let backend = connecting();
        let mut events = backend.events().subscribe();

        identity_token(&backend);
        assert_eq!(backend.state(), ConnectionState::Connecting);
        assert_eq!(backend.identity().as_deref(), Some(ME));
        assert_eq!(backend.auth_token().as_deref(), Some("tok"));
        assert!(matches!(events.try_recv(), Ok(GameEvent::IdentityChanged { .. })));
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

        backend.shared.handle_message(
            1,
            ServerMessage::InitialSubscription {
                changes: vec![TableChange::User(RowDiff::inserted(vec![user(ME, "hero")]))],
            },
        );
        assert_eq!(backend.state(), ConnectionState::Connected);
        assert!(matches!(events.try_recv(), Ok(GameEvent::TableChanged(_))));
        assert_eq!(
            events.try_recv(),
            Ok(GameEvent::Connected {
                identity: ME.to_string()
            })
        );
    }

    #[test]
    fn returning_player_is_known_when_loading_ends() {
        let backend = connecting();
        let mut session = AuthSession::new(Arc::new(backend.clone()));

        identity_token(&backend);
        session.drain();
        assert!(session.state().is_loading());

        backend.shared.handle_message(
            1,
            ServerMessage::InitialSubscription {
                changes: vec![
                    TableChange::User(RowDiff::inserted(vec![user(ME, "hero")])),
                    TableChange::Character(RowDiff::inserted(vec![
                        character(1, ME, "Aria"),
                        character(2, ME, "Brom"),
                    ])),
                ],
            },
        );
        session.drain();

        assert!(!session.state().is_loading());
        assert_eq!(session.state().username(), Some("hero"));
        assert_eq!(session.state().characters().len(), 2);
    }

    #[test]
    fn resubscribing_does_not_reconnect() {
        let backend = connected();
        let mut events = backend.events().subscribe();

        backend
            .shared
            .handle_message(1, ServerMessage::InitialSubscription { changes: Vec::new() });

        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn failed_open_marks_the_connection_failed() {
        let backend = connecting();
        let mut events = backend.events().subscribe();

        backend
            .shared
            .fail(1, ClientError::Transport("connection refused".to_string()));

        assert_eq!(backend.state(), ConnectionState::Failed);
        assert!(matches!(
            events.try_recv(),
            Ok(GameEvent::Error { message }) if message.contains("connection refused")
        ));
        // a failed attempt can be retried
        assert!(!backend.state().is_active());
    }

    #[test]
    fn stale_failures_are_ignored() {
        let backend = connected();
        let mut events = backend.events().subscribe();

        backend.shared.fail(0, ClientError::Transport("old attempt".to_string()));

        assert_eq!(backend.state(), ConnectionState::Connected);
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn lost_connection_reports_error_then_disconnected() {
        let backend = connected();
        lock(&backend.shared.inner)
            .pending
            .insert(5, ReducerCall::Logout);
        let mut events = backend.events().subscribe();

        backend
            .shared
            .closed(1, DisconnectReason::NetworkError("reset by peer".to_string()));

        assert_eq!(backend.state(), ConnectionState::Disconnected);
        assert_eq!(backend.identity(), None);
        assert!(lock(&backend.shared.inner).pending.is_empty());
        assert_eq!(events.try_recv(), Ok(GameEvent::error("reset by peer")));
        assert_eq!(events.try_recv(), Ok(GameEvent::Disconnected));
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn clean_close_only_reports_disconnected() {
        let backend = connected();
        let mut events = backend.events().subscribe();

        backend.shared.closed(1, DisconnectReason::ClientRequest);

        assert_eq!(events.try_recv(), Ok(GameEvent::Disconnected));
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn stale_epochs_are_ignored() {
        let backend = RemoteBackend::new(&ClientConfig::mock());
        let mut events = backend.events().subscribe();
        lock(&backend.shared.inner).epoch = 2;

        backend.shared.handle_message(
            1,
            ServerMessage::IdentityToken {
                identity: ME.to_string(),
                token: String::new(),
            },
        );

        assert_eq!(backend.state(), ConnectionState::Disconnected);
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn initial_subscription_fills_the_cache() {
        let backend = connected();
        backend.shared.handle_message(
            1,
            ServerMessage::InitialSubscription {
                changes: vec![TableChange::Character(RowDiff::inserted(vec![
                    character(1, ME, "Aria"),
                    character(2, "other", "Cato"),
                ]))],
            },
        );

        let names: Vec<String> = backend.user_characters().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Aria"]);
    }

    #[test]
    fn committed_create_reports_the_new_id() {
        let backend = connected();
        let mut events = backend.events().subscribe();
        let call = ReducerCall::CreateCharacter {
            name: "Aria".to_string(),
            class: "mage".to_string(),
            skin: "light".to_string(),
            hair: "black".to_string(),
            eyes: "brown".to_string(),
            outfit: "casual".to_string(),
        };
        lock(&backend.shared.inner).pending.insert(7, call);

        backend.shared.handle_transaction(TransactionUpdate {
            status: UpdateStatus::Committed(vec![TableChange::Character(RowDiff::inserted(vec![
                character(4, ME, "Aria"),
            ]))]),
            caller_identity: Some(ME.to_string()),
            reducer_name: "create_character".to_string(),
            request_id: Some(7),
        });

        assert!(matches!(events.try_recv(), Ok(GameEvent::TableChanged(_))));
        assert_eq!(
            events.try_recv().unwrap(),
            GameEvent::CharacterCreated {
                character_id: Some(4),
                name: "Aria".to_string()
            }
        );
        assert_eq!(backend.user_characters().len(), 1);
    }

    #[test]
    fn failed_call_becomes_an_error_event() {
        let backend = connected();
        let mut events = backend.events().subscribe();
        lock(&backend.shared.inner)
            .pending
            .insert(3, ReducerCall::register_user("hero"));

        backend.shared.handle_transaction(TransactionUpdate {
            status: UpdateStatus::Failed("User already registered".to_string()),
            caller_identity: Some(ME.to_string()),
            reducer_name: "register_user".to_string(),
            request_id: Some(3),
        });

        assert_eq!(events.try_recv().unwrap(), GameEvent::error("User already registered"));
    }

    #[test]
    fn other_clients_failures_are_not_ours() {
        let backend = connected();
        let mut events = backend.events().subscribe();
        lock(&backend.shared.inner)
            .pending
            .insert(3, ReducerCall::Logout);

        backend.shared.handle_transaction(TransactionUpdate {
            status: UpdateStatus::Failed("Not logged in".to_string()),
            caller_identity: Some("someone-else".to_string()),
            reducer_name: "logout".to_string(),
            request_id: Some(3),
        });

        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn disconnect_clears_identity_and_cache() {
        let backend = connected();
        backend.shared.handle_message(
            1,
            ServerMessage::InitialSubscription {
                changes: vec![TableChange::Character(RowDiff::inserted(vec![character(
                    1, ME, "Aria",
                )]))],
            },
        );
        let mut events = backend.events().subscribe();

        backend.disconnect();

        assert_eq!(backend.state(), ConnectionState::Disconnected);
        assert_eq!(backend.identity(), None);
        assert!(backend.user_characters().is_empty());
        assert_eq!(events.try_recv().unwrap(), GameEvent::Disconnected);
        assert_eq!(backend.auth_token().as_deref(), Some("tok"));
    }
}
