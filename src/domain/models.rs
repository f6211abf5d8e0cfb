//! Core session types shared across the bridge.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single peripheral session. Owned exclusively by the
/// connection supervisor; every transition goes through its event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    RadioOff,
    Idle,
    Scanning,
    Connecting,
    Discovering,
    Ready,
    Disconnecting,
}

impl ConnectionState {
    /// States that hold radio resources (an active scan or a link).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Scanning | Self::Connecting | Self::Discovering | Self::Ready
        )
    }
}

/// Externally observable session status, published through a watch channel.
///
/// Mirrors [`ConnectionState`] plus the terminal informational outcomes a
/// caller can act on (retry scan, re-grant permissions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    RadioOff,
    Idle,
    Scanning,
    Connecting,
    Discovering,
    Connected,
    Disconnecting,
    DeviceNotFound,
    ConnectionFailed,
    PermissionDenied,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Uninitialized => "Starting…",
            Self::RadioOff => "Bluetooth Off",
            Self::Idle => "Disconnected",
            Self::Scanning => "Scanning…",
            Self::Connecting => "Connecting…",
            Self::Discovering => "Discovering Services…",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting…",
            Self::DeviceNotFound => "Device Not Found",
            Self::ConnectionFailed => "Connection Failed",
            Self::PermissionDenied => "Permissions Disabled",
        };
        f.write_str(text)
    }
}

/// A fully validated glucose reading produced by the one-shot pipeline.
///
/// Constructed only by the wire format codec; immutable after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReading {
    pub glucose: f64,
    pub calories: f64,
    pub tag: String,
    pub timestamp: DateTime<Utc>,
}
