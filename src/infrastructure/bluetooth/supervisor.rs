//! Connection supervisor: the single owner of a streaming session's state.
//!
//! Every hardware callback, timer expiry, and user command is queued as a
//! [`SessionEvent`] and applied by one consumer loop, so shared state
//! (the state machine, the held handle, the pending timers, the
//! accumulator) is never touched from two code paths at once. Suspending
//! radio calls are awaited inline by the loop, which also guarantees no
//! second suspending operation of the same kind starts while one is
//! outstanding.
//!
//! State machine:
//!
//! ```text
//! Idle --startScan--> Scanning --found--> Connecting --connected--> Discovering
//!     --servicesReady--> Ready --disconnect(confirmed)--> Idle
//! {Scanning, Connecting, Discovering} --error--> Idle
//! any --explicitDisconnect--> Disconnecting --> Idle
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::models::{ConnectionState, SessionStatus};
use crate::error::RadioError;
use crate::infrastructure::bluetooth::scanner::NameScanner;
use crate::infrastructure::radio::{PeripheralHandle, RadioLink, RadioState};
use crate::pipeline::streaming::BatchUploader;

/// User-facing commands accepted by a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    StartScan,
    Disconnect,
    Shutdown,
}

/// Everything the supervisor's consumer loop reacts to.
#[derive(Debug)]
pub enum SessionEvent {
    Command(SessionCommand),
    Discovered {
        handle: PeripheralHandle,
        name: Option<String>,
    },
    ScanTimedOut {
        epoch: u64,
    },
    Notification(Vec<u8>),
    /// The radio stack reported the link down. Possibly spurious.
    LinkDown(PeripheralHandle),
    /// The disconnect confirmation delay elapsed.
    DebounceElapsed(PeripheralHandle),
    UploadTick,
    RadioState(RadioState),
}

pub struct ConnectionSupervisor {
    radio: Arc<dyn RadioLink>,
    scanner: NameScanner,
    uploader: BatchUploader,
    state: ConnectionState,
    status_tx: watch::Sender<SessionStatus>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    handle: Option<PeripheralHandle>,
    connect_in_flight: bool,
    notify_char: Uuid,
    upload_interval: Duration,
    debounce: Duration,
    notif_pump: Option<JoinHandle<()>>,
    upload_ticker: Option<JoinHandle<()>>,
    debounce_task: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        radio: Arc<dyn RadioLink>,
        scanner: NameScanner,
        uploader: BatchUploader,
        status_tx: watch::Sender<SessionStatus>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        notify_char: Uuid,
        upload_interval: Duration,
        debounce: Duration,
    ) -> Self {
        Self {
            radio,
            scanner,
            uploader,
            state: ConnectionState::Uninitialized,
            status_tx,
            events_tx,
            handle: None,
            connect_in_flight: false,
            notify_char,
            upload_interval,
            debounce,
            notif_pump: None,
            upload_ticker: None,
            debounce_task: None,
        }
    }

    /// Consume session events until shutdown. The sole mutator of the
    /// session's state.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        self.probe_radio().await;

        while let Some(event) = events.recv().await {
            if matches!(event, SessionEvent::Command(SessionCommand::Shutdown)) {
                self.teardown(ConnectionState::Idle, SessionStatus::Idle)
                    .await;
                break;
            }
            self.handle_event(event).await;
        }
        debug!("supervisor loop exited");
    }

    async fn probe_radio(&mut self) {
        match self.radio.state().await {
            Ok(RadioState::PoweredOn) => {
                self.set_state(ConnectionState::Idle, SessionStatus::Idle)
            }
            Ok(RadioState::Unauthorized) => {
                self.set_state(ConnectionState::Idle, SessionStatus::PermissionDenied)
            }
            Ok(_) => self.set_state(ConnectionState::RadioOff, SessionStatus::RadioOff),
            Err(e) => {
                error!("radio state probe failed: {e}");
                self.set_state(ConnectionState::Idle, SessionStatus::Idle);
            }
        }
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Command(SessionCommand::StartScan) => self.start_scan().await,
            SessionEvent::Command(SessionCommand::Disconnect) => self.disconnect().await,
            SessionEvent::Command(SessionCommand::Shutdown) => {} // handled by run
            SessionEvent::Discovered { handle, name } => self.on_discovered(handle, name).await,
            SessionEvent::ScanTimedOut { epoch } => self.on_scan_timeout(epoch).await,
            SessionEvent::Notification(payload) => self.on_notification(&payload),
            SessionEvent::LinkDown(handle) => self.on_link_down(handle),
            SessionEvent::DebounceElapsed(handle) => self.on_debounce_elapsed(handle).await,
            SessionEvent::UploadTick => self.on_upload_tick().await,
            SessionEvent::RadioState(state) => self.on_radio_state(state).await,
        }
    }

    async fn start_scan(&mut self) {
        if self.state == ConnectionState::RadioOff {
            self.publish(SessionStatus::RadioOff);
            return;
        }
        if self.connect_in_flight || self.handle.is_some() {
            warn!("scan requested while a session is active; ignoring");
            return;
        }

        match self.scanner.start().await {
            Ok(_) => self.set_state(ConnectionState::Scanning, SessionStatus::Scanning),
            Err(e) => {
                error!("failed to start scan: {e}");
                self.teardown(ConnectionState::Idle, SessionStatus::Idle)
                    .await;
            }
        }
    }

    async fn on_discovered(&mut self, handle: PeripheralHandle, name: Option<String>) {
        if self.state != ConnectionState::Scanning || !self.scanner.matches(name.as_deref()) {
            return;
        }
        // Re-checked here, on the consumer loop, so two overlapping
        // discoveries cannot produce two live sessions.
        if self.connect_in_flight || self.handle.is_some() {
            return;
        }

        info!(%handle, "matching peripheral found");
        if let Err(e) = self.scanner.stop().await {
            warn!("failed to stop scan after match: {e}");
        }

        self.connect_in_flight = true;
        self.set_state(ConnectionState::Connecting, SessionStatus::Connecting);

        match self.radio.connect(&handle).await {
            Ok(()) => {
                self.connect_in_flight = false;
                self.handle = Some(handle.clone());
                self.set_state(ConnectionState::Discovering, SessionStatus::Discovering);
                if let Err(e) = self.establish(&handle).await {
                    error!("service discovery failed: {e}");
                    self.teardown(ConnectionState::Idle, SessionStatus::ConnectionFailed)
                        .await;
                }
            }
            Err(e) => {
                error!(%handle, "connection failed: {e}");
                self.connect_in_flight = false;
                self.teardown(ConnectionState::Idle, SessionStatus::ConnectionFailed)
                    .await;
            }
        }
    }

    /// Discover services, subscribe to the notify characteristic, and
    /// start the upload ticker. Completes the transition to `Ready`.
    async fn establish(&mut self, handle: &PeripheralHandle) -> Result<(), RadioError> {
        self.radio.discover_services(handle).await?;
        self.radio.subscribe(handle, self.notify_char).await?;

        let mut notifications = self.radio.notifications(handle, self.notify_char).await?;
        let events = self.events_tx.clone();
        self.notif_pump = Some(tokio::spawn(async move {
            use futures::StreamExt;
            while let Some(payload) = notifications.next().await {
                if events.send(SessionEvent::Notification(payload)).is_err() {
                    break;
                }
            }
        }));

        self.start_upload_ticker();
        self.set_state(ConnectionState::Ready, SessionStatus::Connected);
        info!(%handle, "session ready, streaming");
        Ok(())
    }

    fn start_upload_ticker(&mut self) {
        let events = self.events_tx.clone();
        let period = self.upload_interval;
        self.upload_ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // the first tick completes immediately
            loop {
                ticker.tick().await;
                if events.send(SessionEvent::UploadTick).is_err() {
                    break;
                }
            }
        }));
    }

    async fn on_scan_timeout(&mut self, epoch: u64) {
        if self.state != ConnectionState::Scanning || !self.scanner.is_current(epoch) {
            return; // stale timer from a superseded scan
        }
        info!("no matching advertisement within the scan window");
        if let Err(e) = self.scanner.stop().await {
            warn!("failed to stop timed-out scan: {e}");
        }
        self.set_state(ConnectionState::Idle, SessionStatus::DeviceNotFound);
    }

    fn on_notification(&mut self, payload: &[u8]) {
        if self.state != ConnectionState::Ready {
            return;
        }
        // One bad sample must not stop the stream.
        match crate::domain::codec::decode_calorie_sample(payload) {
            Ok(value) => self.uploader.record(value),
            Err(e) => warn!("discarding unreadable sample: {e}"),
        }
    }

    async fn on_upload_tick(&mut self) {
        if self.state != ConnectionState::Ready {
            return;
        }
        self.uploader.flush().await;
    }

    /// Disconnect debouncer: do not tear down on the raw callback. Wait
    /// out the confirmation delay, then re-query the actual link status.
    /// Single-shot; a later genuine drop restarts the sequence.
    fn on_link_down(&mut self, handle: PeripheralHandle) {
        if self.handle.as_ref() != Some(&handle) {
            return;
        }
        debug!(%handle, "disconnect signal; scheduling confirmation");
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
        let events = self.events_tx.clone();
        let delay = self.debounce;
        self.debounce_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SessionEvent::DebounceElapsed(handle));
        }));
    }

    async fn on_debounce_elapsed(&mut self, handle: PeripheralHandle) {
        if self.handle.as_ref() != Some(&handle) {
            return; // handle already cleared by another path
        }
        match self.radio.is_connected(&handle).await {
            Ok(true) => {
                debug!(%handle, "link still up; disconnect signal was transient");
            }
            Ok(false) => {
                info!(%handle, "link loss confirmed");
                self.teardown(ConnectionState::Idle, SessionStatus::Idle)
                    .await;
            }
            Err(e) => {
                warn!(%handle, "link status query failed, treating as lost: {e}");
                self.teardown(ConnectionState::Idle, SessionStatus::Idle)
                    .await;
            }
        }
    }

    async fn on_radio_state(&mut self, state: RadioState) {
        match state {
            RadioState::PoweredOn => {
                if self.state == ConnectionState::RadioOff
                    || self.state == ConnectionState::Uninitialized
                {
                    info!("radio powered on");
                    self.set_state(ConnectionState::Idle, SessionStatus::Idle);
                }
            }
            RadioState::Unauthorized => {
                warn!("bluetooth permission revoked");
                self.teardown(ConnectionState::Idle, SessionStatus::PermissionDenied)
                    .await;
            }
            _ => {
                warn!("radio powered off; tearing down session");
                self.teardown(ConnectionState::RadioOff, SessionStatus::RadioOff)
                    .await;
            }
        }
    }

    async fn disconnect(&mut self) {
        self.set_state(ConnectionState::Disconnecting, SessionStatus::Disconnecting);
        self.teardown(ConnectionState::Idle, SessionStatus::Idle)
            .await;
    }

    /// The only path that releases resources; safe to call from any
    /// state, on every exit path. Cancels the scan timeout, stops an
    /// active scan, cancels the connection if held, and clears the
    /// upload ticker.
    async fn teardown(&mut self, state: ConnectionState, status: SessionStatus) {
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
        if let Some(task) = self.notif_pump.take() {
            task.abort();
        }
        if let Some(task) = self.upload_ticker.take() {
            task.abort();
        }
        if let Err(e) = self.scanner.stop().await {
            warn!("failed to stop scan during teardown: {e}");
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.radio.cancel_connection(&handle).await {
                warn!(%handle, "failed to cancel connection: {e}");
            }
        }
        self.connect_in_flight = false;
        self.set_state(state, status);
    }

    fn set_state(&mut self, state: ConnectionState, status: SessionStatus) {
        debug!(from = ?self.state, to = ?state, "state transition");
        self.state = state;
        self.publish(status);
    }

    fn publish(&self, status: SessionStatus) {
        self.status_tx.send_replace(status);
    }
}
