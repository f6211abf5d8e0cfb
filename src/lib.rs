//! tracker-bridge
//!
//! Bridges two low-power wireless sensors into an application's data
//! pipeline: a continuously streaming exercise tracker (notify
//! characteristic, periodic batch upload) and a transaction-oriented
//! glucose tracker (single read, one-shot sync). The radio stack is an
//! injected [`infrastructure::radio::RadioLink`], so everything above
//! the btleplug binding runs unchanged against the scripted mock.

pub mod backend;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod pipeline;

pub use domain::models::{ConnectionState, SessionStatus, StructuredReading};
pub use domain::settings::{Settings, SettingsService};
pub use error::{CodecError, RadioError, SyncError, UploadError};
pub use pipeline::oneshot::fetch_structured_reading;
pub use pipeline::streaming::{StreamingHandle, StreamingSession};
