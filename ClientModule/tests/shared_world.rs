//! Two players on one mock database: row changes made by one client reach
//! the other, and the game rules hold across identities.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use rpg_client::{ClientConfig, ClientError, GameBackend, GameEvent, MockBackend, MockDatabase, TableChange};
use rpg_shared::{CharacterClass, CharacterDraft, RuleError};

const ALICE: &str = "a11ce";
const BOB: &str = "b0b";

async fn pair() -> (MockBackend, MockBackend) {
    let _ = env_logger::try_init();

    let config = ClientConfig::mock();
    let db = MockDatabase::new();
    let alice = MockBackend::with_database(&config, db.clone(), ALICE);
    let bob = MockBackend::with_database(&config, db, BOB);
    alice.connect().unwrap();
    bob.connect().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(alice.is_connected() && bob.is_connected());
    (alice, bob)
}

fn drain(events: &mut broadcast::Receiver<GameEvent>) -> Vec<GameEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return seen,
            Err(TryRecvError::Lagged(_)) => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn characters_created_by_one_player_reach_the_other() {
    let (alice, bob) = pair().await;
    let mut bob_events = bob.events().subscribe();

    alice.register_user("alice").unwrap();
    alice
        .create_character(&CharacterDraft::new("Aria", CharacterClass::Mage))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    let seen = drain(&mut bob_events);
    let created = seen.iter().any(|event| match event {
        GameEvent::TableChanged(TableChange::Character(diff)) => {
            diff.inserts.iter().any(|c| c.name == "Aria" && c.is_owned_by(ALICE))
        }
        _ => false,
    });
    assert!(created);
    // completion events stay with the caller
    assert!(!seen.iter().any(|e| matches!(e, GameEvent::CharacterCreated { .. })));

    assert_eq!(alice.user_characters().len(), 1);
    assert!(bob.user_characters().is_empty());
}

#[tokio::test(start_paused = true)]
async fn names_are_unique_across_players() {
    let (alice, bob) = pair().await;
    alice.register_user("alice").unwrap();
    bob.register_user("bob").unwrap();
    alice
        .create_character(&CharacterDraft::new("Aria", CharacterClass::Mage))
        .unwrap();

    let err = bob
        .create_character(&CharacterDraft::new("Aria", CharacterClass::Rogue))
        .unwrap_err();
    assert_eq!(err, ClientError::Rule(RuleError::CharacterNameTaken));
}

#[tokio::test(start_paused = true)]
async fn reducers_require_a_registered_user() {
    let (alice, _bob) = pair().await;
    let mut events = alice.events().subscribe();

    let err = alice
        .create_character(&CharacterDraft::new("Aria", CharacterClass::Mage))
        .unwrap_err();
    assert_eq!(err, ClientError::Rule(RuleError::UserNotRegistered));
    assert_eq!(events.try_recv(), Ok(GameEvent::error("User not registered")));
}

#[tokio::test(start_paused = true)]
async fn nobody_can_log_in_with_someone_elses_character() {
    let (alice, bob) = pair().await;
    alice.register_user("alice").unwrap();
    bob.register_user("bob").unwrap();
    alice
        .create_character(&CharacterDraft::new("Aria", CharacterClass::Mage))
        .unwrap();
    let aria = alice.user_characters()[0].id;

    assert_eq!(
        bob.login(aria).unwrap_err(),
        ClientError::Rule(RuleError::CharacterNotOwned)
    );
    assert!(bob.own_session().is_none());
}

#[tokio::test(start_paused = true)]
async fn leaving_drops_the_session_for_everyone() {
    let (alice, bob) = pair().await;
    alice.register_user("alice").unwrap();
    alice
        .create_character(&CharacterDraft::new("Aria", CharacterClass::Mage))
        .unwrap();
    alice.login(alice.user_characters()[0].id).unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(alice.database().session(ALICE).is_some());

    let mut bob_events = bob.events().subscribe();
    alice.disconnect();

    let seen = drain(&mut bob_events);
    let dropped = seen.iter().any(|event| match event {
        GameEvent::TableChanged(TableChange::Session(diff)) => {
            diff.deletes.iter().any(|s| s.identity == ALICE)
        }
        _ => false,
    });
    assert!(dropped);
    assert!(bob.database().session(ALICE).is_none());
}

#[tokio::test(start_paused = true)]
async fn calls_fail_fast_once_disconnected() {
    let (alice, _bob) = pair().await;
    alice.disconnect();

    assert_eq!(alice.register_user("alice"), Err(ClientError::NotConnected));
    // position updates are dropped silently
    alice.update_position(Default::default(), Default::default());
}
