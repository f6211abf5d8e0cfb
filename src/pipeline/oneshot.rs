//! One-shot glucose sync: a single bounded operation, not a session.
//!
//! Composes scan → connect → discover → read → decode with a per-stage
//! timeout, and returns one tagged result. Acquisition is scoped: a
//! cleanup record tracks what has been acquired (scan started, handle
//! held) and releases it exactly once on every exit path, success
//! included, instead of relying on call-site discipline in each branch.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::domain::codec;
use crate::domain::models::StructuredReading;
use crate::domain::settings::Settings;
use crate::error::{RadioError, SyncError};
use crate::infrastructure::radio::{PeripheralHandle, RadioLink, RadioSignal, RadioState};

struct Cleanup {
    radio: Arc<dyn RadioLink>,
    scan_active: bool,
    handle: Option<PeripheralHandle>,
}

impl Cleanup {
    fn new(radio: Arc<dyn RadioLink>) -> Self {
        Self {
            radio,
            scan_active: false,
            handle: None,
        }
    }

    async fn release(&mut self) {
        if self.scan_active {
            self.scan_active = false;
            if let Err(e) = self.radio.stop_scan().await {
                warn!("failed to stop scan during cleanup: {e}");
            }
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.radio.cancel_connection(&handle).await {
                warn!(%handle, "failed to cancel connection during cleanup: {e}");
            }
        }
    }
}

/// Fetch one validated reading from the glucose tracker.
pub async fn fetch_structured_reading(
    radio: Arc<dyn RadioLink>,
    settings: &Settings,
) -> Result<StructuredReading, SyncError> {
    match radio.state().await.map_err(SyncError::Radio)? {
        RadioState::PoweredOn => {}
        RadioState::Unauthorized => return Err(SyncError::PermissionDenied),
        _ => return Err(SyncError::RadioOff),
    }

    let mut cleanup = Cleanup::new(radio.clone());
    let outcome = run_stages(&radio, settings, &mut cleanup).await;
    cleanup.release().await;
    outcome
}

async fn run_stages(
    radio: &Arc<dyn RadioLink>,
    settings: &Settings,
    cleanup: &mut Cleanup,
) -> Result<StructuredReading, SyncError> {
    // Scan for the exact advertised name; first match wins.
    let mut signals = radio.signals().await.map_err(SyncError::Radio)?;
    radio.start_scan().await.map_err(SyncError::Radio)?;
    cleanup.scan_active = true;

    let handle = match timeout(
        settings.scan_timeout(),
        wait_for_match(&mut signals, &settings.glucose_device_name),
    )
    .await
    {
        Ok(Some(handle)) => handle,
        Ok(None) => {
            return Err(SyncError::Radio(RadioError::Stack(
                "radio signal stream ended during scan".into(),
            )))
        }
        Err(_) => return Err(SyncError::DeviceNotFound),
    };
    info!(%handle, "glucose tracker found");
    // Cleared before the stop is attempted: one stop per scan, even if
    // the stop itself fails.
    cleanup.scan_active = false;
    radio.stop_scan().await.map_err(SyncError::Radio)?;

    // Connect. The handle goes into the cleanup record before the
    // attempt so a timed-out attempt still gets cancelled.
    cleanup.handle = Some(handle.clone());
    match timeout(settings.connect_timeout(), radio.connect(&handle)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(SyncError::Connection(e)),
        Err(_) => return Err(SyncError::ConnectionTimeout),
    }

    radio
        .discover_services(&handle)
        .await
        .map_err(SyncError::Discovery)?;

    // A single read of the current value, not a subscription.
    let payload = radio
        .read_characteristic(&handle, settings.glucose_read_char)
        .await
        .map_err(SyncError::Read)?;

    Ok(codec::decode_structured_reading(&payload)?)
}

async fn wait_for_match(
    signals: &mut BoxStream<'static, RadioSignal>,
    target: &str,
) -> Option<PeripheralHandle> {
    while let Some(signal) = signals.next().await {
        if let RadioSignal::Discovered { handle, name } = signal {
            if name.as_deref() == Some(target) {
                return Some(handle);
            }
        }
    }
    None
}
