//! Connection establishment with bounded retries
//!
//! The human-readable status lives behind its own lock so status queries never
//! wait on telemetry updates. The connected flag is a separate atomic for
//! cheap polling from the host.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::transport::TransportPort;
use crate::types::{MonitorError, Result};

/// Link state as shown to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting { attempt: u32, max: u32 },
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting { attempt, max } => {
                write!(f, "Connecting (attempt {}/{})...", attempt, max)
            }
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Connection Failed - All retries exhausted"),
        }
    }
}

/// Shared connection status
#[derive(Debug, Default)]
pub struct ConnectionStatus {
    state: Mutex<ConnectionState>,
    connected: AtomicBool,
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a state transition
    pub fn set(&self, state: ConnectionState) {
        let mut current = self.state.lock();
        if *current != state {
            log::info!("Connection status: {}", state);
        }
        *current = state;
        self.connected
            .store(state == ConnectionState::Connected, Ordering::SeqCst);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Status string, e.g. `Connecting (attempt 2/5)...`
    pub fn text(&self) -> String {
        self.state().to_string()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Drives the transport's single-attempt `open()` with a constant retry delay
pub struct ConnectionManager<'a> {
    transport: &'a dyn TransportPort,
    status: &'a ConnectionStatus,
}

impl<'a> ConnectionManager<'a> {
    pub fn new(transport: &'a dyn TransportPort, status: &'a ConnectionStatus) -> Self {
        Self { transport, status }
    }

    /// Try to open the transport up to `max_attempts` times
    ///
    /// Blocks for at most `(max_attempts - 1) * delay` plus the time spent in
    /// `open()`. No delay follows the final attempt.
    pub fn connect(&self, max_attempts: u32, delay: Duration) -> Result<()> {
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.status.set(ConnectionState::Connecting {
                attempt,
                max: max_attempts,
            });

            if self.transport.open() {
                self.status.set(ConnectionState::Connected);
                return Ok(());
            }

            log::warn!("Connection attempt {}/{} failed", attempt, max_attempts);
            if attempt < max_attempts {
                thread::sleep(delay);
            }
        }

        self.status.set(ConnectionState::Failed);
        Err(MonitorError::ConnectionFailed {
            attempts: max_attempts,
        })
    }
}
