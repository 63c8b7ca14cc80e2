//! Transport layer abstraction
//!
//! The physical link to the OBD adapter (serial, Bluetooth, WiFi bridge) lives
//! outside this crate. The engine only talks to a [`TransportPort`]:
//! - [`MockTransport`] scripts responses for tests
//! - [`ReplayTransport`] serves frames recorded in a candump log
//!
//! Implementations use interior mutability: the worker thread and the caller's
//! thread (on-demand SOH requests) share one `Arc<dyn TransportPort>`.

pub mod mock;
pub mod replay;

pub use mock::MockTransport;
pub use replay::ReplayTransport;

use std::time::Duration;

use crate::types::RawFrame;

/// A CAN channel provided by the host application
pub trait TransportPort: Send + Sync {
    /// Establish the link; true once the channel is ready for traffic
    fn open(&self) -> bool;

    /// Whether the channel can currently send and receive
    fn is_ready(&self) -> bool;

    /// Queue a frame for transmission; false if it could not be sent
    fn send(&self, id: u32, data: &[u8], extended: bool) -> bool;

    /// Wait up to `timeout` for the next inbound frame
    fn receive(&self, timeout: Duration) -> Option<RawFrame>;

    /// Tear the link down
    fn close(&self);
}
