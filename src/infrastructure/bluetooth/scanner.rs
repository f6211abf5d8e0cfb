//! Bounded, name-filtered peripheral discovery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::RadioError;
use crate::infrastructure::bluetooth::supervisor::SessionEvent;
use crate::infrastructure::radio::RadioLink;

/// Drives the radio's scan commands for the streaming supervisor.
///
/// Contract: exactly one radio stop-scan per start, whether the scan ends
/// in a match, a timeout, or an error. Starting while a scan is active
/// stops the previous scan (and its timer) first, so at most one scan is
/// ever in flight. Timeouts arrive in the session queue as
/// [`SessionEvent::ScanTimedOut`] tagged with the epoch of the scan that
/// armed them; a stale epoch means the scan was already superseded.
pub struct NameScanner {
    radio: Arc<dyn RadioLink>,
    events: mpsc::UnboundedSender<SessionEvent>,
    target_name: String,
    timeout: Duration,
    timeout_task: Option<JoinHandle<()>>,
    epoch: u64,
    active: bool,
}

impl NameScanner {
    pub fn new(
        radio: Arc<dyn RadioLink>,
        events: mpsc::UnboundedSender<SessionEvent>,
        target_name: String,
        timeout: Duration,
    ) -> Self {
        Self {
            radio,
            events,
            target_name,
            timeout,
            timeout_task: None,
            epoch: 0,
            active: false,
        }
    }

    /// Begin discovery, returning the epoch of the new scan.
    pub async fn start(&mut self) -> Result<u64, RadioError> {
        self.stop().await?;

        self.epoch += 1;
        let epoch = self.epoch;
        info!(target_name = %self.target_name, "starting scan");
        self.radio.start_scan().await?;
        self.active = true;

        let events = self.events.clone();
        let timeout = self.timeout;
        self.timeout_task = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(SessionEvent::ScanTimedOut { epoch });
        }));

        Ok(epoch)
    }

    /// Stop discovery. Idempotent; the timeout timer is cancelled before
    /// the radio is told to stop so it cannot fire against a dead scan.
    pub async fn stop(&mut self) -> Result<(), RadioError> {
        if let Some(task) = self.timeout_task.take() {
            task.abort();
        }
        if self.active {
            self.active = false;
            info!("stopping scan");
            self.radio.stop_scan().await?;
        }
        Ok(())
    }

    /// Whether a timeout event belongs to the scan that is still running.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.active && epoch == self.epoch
    }

    /// Exact advertised-name match; first match wins.
    pub fn matches(&self, name: Option<&str>) -> bool {
        name == Some(self.target_name.as_str())
    }

    pub fn is_scanning(&self) -> bool {
        self.active
    }
}
