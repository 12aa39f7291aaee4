//! # Position Sync
//!
//! Local movement integration and the fixed-interval publisher that pushes
//! the player's position to the backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use rpg_shared::constants::game::PLAYER_SPEED;
use rpg_shared::{Direction, Position};

use crate::backend::GameBackend;

/// Directional input, each axis in `-1.0..=1.0`. Negative `y` is up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputAxes {
    pub x: f32,
    pub y: f32,
}

impl InputAxes {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Axes from the four movement keys
    pub fn from_keys(up: bool, down: bool, left: bool, right: bool) -> Self {
        let axis = |neg: bool, pos: bool| (pos as i8 - neg as i8) as f32;
        Self {
            x: axis(left, right),
            y: axis(up, down),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    /// World units per second
    pub speed: f32,
}

impl Default for Movement {
    fn default() -> Self {
        Self { speed: PLAYER_SPEED }
    }
}

impl Movement {
    /// Advance `position` by `delta` along `axes`. Diagonal input is
    /// normalised; the new facing favours the horizontal axis.
    pub fn step(
        &self,
        position: Position,
        facing: Direction,
        axes: InputAxes,
        delta: Duration,
    ) -> (Position, Direction) {
        if axes.is_idle() {
            return (position, facing);
        }

        let length = (axes.x * axes.x + axes.y * axes.y).sqrt();
        let distance = self.speed * delta.as_secs_f32();
        let moved = Position::new(
            position.x + axes.x / length * distance,
            position.y + axes.y / length * distance,
        );

        let direction = if axes.x < 0.0 {
            Direction::Left
        } else if axes.x > 0.0 {
            Direction::Right
        } else if axes.y < 0.0 {
            Direction::Up
        } else {
            Direction::Down
        };
        (moved, direction)
    }
}

/// Publishes the latest reported position on a fixed interval
pub struct PositionSync {
    latest: watch::Sender<Option<(Position, Direction)>>,
    task: JoinHandle<()>,
}

impl PositionSync {
    pub fn spawn(backend: Arc<dyn GameBackend>, period: Duration) -> Self {
        let (latest, mut rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut published: Option<(Position, Direction)> = None;
            loop {
                ticker.tick().await;
                if rx.has_changed().is_err() {
                    break;
                }
                let current = *rx.borrow_and_update();
                if let Some((position, direction)) = current {
                    if published != current {
                        backend.update_position(position, direction);
                        published = current;
                    }
                }
            }
        });
        Self { latest, task }
    }

    /// Record where the player is now; sent on the next tick if it changed
    pub fn report(&self, position: Position, direction: Direction) {
        self.latest.send_replace(Some((position, direction)));
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PositionSync {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_right_moves_full_speed() {
        let (pos, dir) = Movement::default().step(
            Position::new(0.0, 0.0),
            Direction::Down,
            InputAxes::from_keys(false, false, false, true),
            Duration::from_secs(1),
        );
        assert_eq!(pos, Position::new(150.0, 0.0));
        assert_eq!(dir, Direction::Right);
    }

    #[test]
    fn diagonals_are_normalised_and_face_sideways() {
        let (pos, dir) = Movement::default().step(
            Position::default(),
            Direction::Down,
            InputAxes::from_keys(true, false, true, false),
            Duration::from_secs(1),
        );
        let travelled = (pos.x * pos.x + pos.y * pos.y).sqrt();
        assert!((travelled - 150.0).abs() < 1e-3);
        assert!(pos.x < 0.0 && pos.y < 0.0);
        assert_eq!(dir, Direction::Left);
    }

    #[test]
    fn idle_keeps_position_and_facing() {
        let start = Position::new(3.0, 4.0);
        let (pos, dir) = Movement::default().step(
            start,
            Direction::Up,
            InputAxes::default(),
            Duration::from_millis(16),
        );
        assert_eq!((pos, dir), (start, Direction::Up));
    }

    #[test]
    fn opposite_keys_cancel() {
        assert!(InputAxes::from_keys(true, true, true, true).is_idle());
        assert_eq!(InputAxes::from_keys(false, true, false, false), InputAxes::new(0.0, 1.0));
    }
}
