//! The injected radio-stack seam.
//!
//! The underlying BLE handle is a process-wide singleton, so everything
//! above it talks through [`RadioLink`]: one concrete binding exists per
//! process (btleplug) plus a scripted mock for tests and demos. Hardware
//! callbacks surface as a [`RadioSignal`] stream; commands are the async
//! trait methods.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::RadioError;

/// Opaque reference to a discovered or connected peripheral.
///
/// Held only by the component that owns the session; released through
/// [`RadioLink::cancel_connection`] on every exit path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeripheralHandle(String);

impl PeripheralHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Power/authorization state of the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    PoweredOn,
    PoweredOff,
    Unauthorized,
    Unknown,
}

/// Asynchronous callbacks from the radio stack.
#[derive(Debug, Clone)]
pub enum RadioSignal {
    /// An advertisement was received while scanning.
    Discovered {
        handle: PeripheralHandle,
        name: Option<String>,
    },
    /// The stack reports the link to `handle` as down. May be spurious;
    /// consumers debounce before tearing down.
    Disconnected { handle: PeripheralHandle },
    /// Adapter power or authorization changed.
    StateChanged(RadioState),
}

/// Commands and queries against the radio stack.
///
/// All methods suspend until the stack responds; callers serialize them
/// through a single event loop so no two suspending operations of the
/// same kind are ever outstanding at once.
#[async_trait]
pub trait RadioLink: Send + Sync {
    async fn state(&self) -> Result<RadioState, RadioError>;

    /// Subscribe to hardware callbacks. Each call returns an independent
    /// stream; signals are broadcast to every live subscriber.
    async fn signals(&self) -> Result<BoxStream<'static, RadioSignal>, RadioError>;

    async fn start_scan(&self) -> Result<(), RadioError>;
    async fn stop_scan(&self) -> Result<(), RadioError>;

    async fn connect(&self, handle: &PeripheralHandle) -> Result<(), RadioError>;
    async fn cancel_connection(&self, handle: &PeripheralHandle) -> Result<(), RadioError>;
    async fn is_connected(&self, handle: &PeripheralHandle) -> Result<bool, RadioError>;

    async fn discover_services(&self, handle: &PeripheralHandle) -> Result<(), RadioError>;

    /// Single read of a characteristic's current value.
    async fn read_characteristic(
        &self,
        handle: &PeripheralHandle,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, RadioError>;

    async fn subscribe(
        &self,
        handle: &PeripheralHandle,
        characteristic: Uuid,
    ) -> Result<(), RadioError>;

    /// Notification payloads for a subscribed characteristic.
    async fn notifications(
        &self,
        handle: &PeripheralHandle,
        characteristic: Uuid,
    ) -> Result<BoxStream<'static, Vec<u8>>, RadioError>;
}
