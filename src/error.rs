//! Error taxonomy for the peripheral bridge.
//!
//! Per-sample decode failures never leave the streaming monitor; one-shot
//! stage failures are always surfaced as the pipeline result; upload
//! failures are recoverable and trigger accumulator restoration.

use thiserror::Error;
use uuid::Uuid;

/// Faults reported by the underlying radio stack.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("no bluetooth adapter found")]
    AdapterNotFound,
    #[error("bluetooth permission denied")]
    PermissionDenied,
    #[error("peripheral handle is no longer known to the radio")]
    UnknownPeripheral,
    #[error("characteristic {0} not found on peripheral")]
    CharacteristicNotFound(Uuid),
    #[error("radio stack error: {0}")]
    Stack(String),
}

/// Payload decode failures from the wire format codec.
///
/// The two subtypes matter to callers: a short payload is `IncompleteData`,
/// a payload with the right field count but an unparseable field is
/// `InvalidFormat`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("incomplete data: expected 4 fields, got {0}")]
    IncompleteData(usize),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Terminal outcome of the one-shot sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("radio is powered off")]
    RadioOff,
    #[error("bluetooth permission denied")]
    PermissionDenied,
    #[error("device not found within the scan window")]
    DeviceNotFound,
    #[error("connection failed: {0}")]
    Connection(RadioError),
    #[error("connection attempt timed out")]
    ConnectionTimeout,
    #[error("service discovery failed: {0}")]
    Discovery(RadioError),
    #[error("characteristic read failed: {0}")]
    Read(RadioError),
    #[error(transparent)]
    Parse(#[from] CodecError),
    #[error("radio fault: {0}")]
    Radio(RadioError),
}

/// A failed backend submission. Recoverable: the streaming uploader
/// restores the drained batch and retries on the next tick.
#[derive(Debug, Error)]
#[error("upload failed: {0}")]
pub struct UploadError(pub String);
