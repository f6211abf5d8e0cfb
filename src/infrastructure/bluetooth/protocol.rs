//! Tracker wire contract
//!
//! Fixed advertised names and characteristic identifiers for the two
//! supported peripherals. These must match the tracker firmware exactly;
//! discovery matches on the advertised name, data flows through the
//! characteristic listed here for each variant.

use uuid::{uuid, Uuid};

/// Advertised name of the streaming exercise tracker.
pub const EXERCISE_PERIPHERAL_NAME: &str = "CalTracker";

/// Advertised name of the transactional glucose tracker.
pub const GLUCOSE_PERIPHERAL_NAME: &str = "GlucoMonitor";

/// Notify characteristic pushing base64 calorie deltas.
pub const EXERCISE_NOTIFY_CHAR_UUID: Uuid = uuid!("b5f90001-aa8d-4e2a-87fc-3ae74d2c7b61");

/// Read characteristic returning the base64 structured reading.
pub const GLUCOSE_READ_CHAR_UUID: Uuid = uuid!("b5f90101-aa8d-4e2a-87fc-3ae74d2c7b61");

/// Scan window before giving up on discovery.
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;

/// One-shot connect stage timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 8;

/// Streaming upload flush interval.
pub const DEFAULT_UPLOAD_INTERVAL_SECS: u64 = 3;

/// Delay before re-querying the link after a disconnect callback.
///
/// Empirically chosen to mask a radio-stack artifact that reports
/// disconnects while the physical link is still alive; not derived from
/// any protocol timing guarantee, hence configurable in `Settings`.
pub const DEFAULT_DISCONNECT_DEBOUNCE_MS: u64 = 500;
