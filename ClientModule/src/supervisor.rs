//! # Connection Supervisor
//!
//! Owns the retry policy: wait a bounded time for the backend to connect,
//! report a timeout, then make exactly one fresh attempt.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::backend::GameBackend;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::GameEvent;
use rpg_shared::ConnectionState;

pub struct ConnectionSupervisor {
    backend: Arc<dyn GameBackend>,
    connect_timeout: Duration,
    reconnect_delay: Duration,
}

impl ConnectionSupervisor {
    pub fn new(backend: Arc<dyn GameBackend>, config: &ClientConfig) -> Self {
        Self {
            backend,
            connect_timeout: config.connect_timeout,
            reconnect_delay: config.reconnect_delay,
        }
    }

    /// Connect and wait. On timeout an error is published, and after
    /// `reconnect_delay` one disconnect/connect cycle is made. An attempt the
    /// backend reports as failed is retried the same way without the timeout
    /// error, since the backend already published its own.
    pub async fn run(&self) -> ClientResult<()> {
        let mut events = self.backend.events().subscribe();
        self.backend.connect()?;
        match self.wait_connected(&mut events).await {
            Attempt::Connected => return Ok(()),
            Attempt::Failed => {}
            Attempt::TimedOut => {
                self.report_timeout();
            }
        }

        tokio::time::sleep(self.reconnect_delay).await;
        info!("Retrying connection once");
        let mut events = self.backend.events().subscribe();
        self.backend.disconnect();
        self.backend.connect()?;
        match self.wait_connected(&mut events).await {
            Attempt::Connected => Ok(()),
            Attempt::Failed => Err(ClientError::Transport("connection failed".to_string())),
            Attempt::TimedOut => Err(self.report_timeout()),
        }
    }

    pub fn spawn(self) -> JoinHandle<ClientResult<()>> {
        tokio::spawn(async move { self.run().await })
    }

    fn report_timeout(&self) -> ClientError {
        let err = ClientError::Timeout(self.connect_timeout);
        warn!("{}", err);
        self.backend.events().emit(GameEvent::error(err.to_string()));
        err
    }

    async fn wait_connected(&self, events: &mut broadcast::Receiver<GameEvent>) -> Attempt {
        let backend = &self.backend;
        let wait = async {
            loop {
                match backend.state() {
                    ConnectionState::Connected => return Attempt::Connected,
                    ConnectionState::Failed => return Attempt::Failed,
                    _ => {}
                }
                match events.recv().await {
                    Ok(GameEvent::Connected { .. }) => return Attempt::Connected,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return Attempt::TimedOut,
                }
            }
        };
        tokio::time::timeout(self.connect_timeout, wait)
            .await
            .unwrap_or(Attempt::TimedOut)
    }
}

/// How one connection attempt ended
enum Attempt {
    Connected,
    Failed,
    TimedOut,
}
