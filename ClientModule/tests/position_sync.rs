//! Periodic position publishing against the mock backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};

use rpg_client::{ClientConfig, GameBackend, GameEvent, MockBackend, PositionSync, TableChange};
use rpg_shared::{Direction, Position};

const PERIOD: Duration = Duration::from_secs(5);

/// Seeded mock, connected and logged in as "Mock Warrior" (100, 100)
async fn playing() -> (MockBackend, Arc<dyn GameBackend>) {
    let _ = env_logger::try_init();

    let mock = MockBackend::new(&ClientConfig::mock().with_seeded_mock());
    mock.connect().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    mock.login(1).unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    let backend: Arc<dyn GameBackend> = Arc::new(mock.clone());
    (mock, backend)
}

fn warrior_position(mock: &MockBackend) -> Position {
    mock.user_characters()[0].position()
}

fn character_updates(events: &mut broadcast::Receiver<GameEvent>) -> usize {
    let mut count = 0;
    loop {
        match events.try_recv() {
            Ok(GameEvent::TableChanged(TableChange::Character(_))) => count += 1,
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return count,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn position_is_published_on_the_interval() {
    let (mock, backend) = playing().await;
    let sync = PositionSync::spawn(backend, PERIOD);

    sync.report(Position::new(10.0, 20.0), Direction::Right);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(warrior_position(&mock), Position::new(100.0, 100.0));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(warrior_position(&mock), Position::new(10.0, 20.0));
    assert_eq!(mock.user_characters()[0].facing(), Direction::Right);
    sync.stop();
}

#[tokio::test(start_paused = true)]
async fn unchanged_position_is_not_republished() {
    let (mock, backend) = playing().await;
    let mut events = mock.events().subscribe();
    let sync = PositionSync::spawn(backend, PERIOD);

    sync.report(Position::new(10.0, 20.0), Direction::Right);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(character_updates(&mut events), 1);

    // same position again: nothing new goes out
    sync.report(Position::new(10.0, 20.0), Direction::Right);
    tokio::time::sleep(PERIOD * 3).await;
    assert_eq!(character_updates(&mut events), 0);

    sync.report(Position::new(11.0, 20.0), Direction::Right);
    tokio::time::sleep(PERIOD).await;
    assert_eq!(character_updates(&mut events), 1);
}

#[tokio::test(start_paused = true)]
async fn updates_while_disconnected_are_dropped() {
    let (mock, backend) = playing().await;
    let sync = PositionSync::spawn(backend, PERIOD);
    mock.disconnect();

    sync.report(Position::new(42.0, 42.0), Direction::Up);
    tokio::time::sleep(PERIOD * 2).await;

    let warrior = mock.database().characters_owned_by("mock-identity-123")[0].clone();
    assert_eq!(warrior.position(), Position::new(100.0, 100.0));
}

#[tokio::test(start_paused = true)]
async fn stopped_sync_publishes_nothing() {
    let (mock, backend) = playing().await;
    let sync = PositionSync::spawn(backend, PERIOD);
    sync.stop();

    sync.report(Position::new(1.0, 1.0), Direction::Left);
    tokio::time::sleep(PERIOD * 2).await;
    assert_eq!(warrior_position(&mock), Position::new(100.0, 100.0));
}
