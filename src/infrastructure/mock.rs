//! Scripted radio for tests and hardware-free demos.
//!
//! Behaves like a cooperative radio stack: tests inject advertisements,
//! disconnect callbacks, power flips, and notification payloads, and
//! assert against the recorded command ledger (for example that exactly
//! one stop-scan was issued per start).

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::RadioError;
use crate::infrastructure::radio::{PeripheralHandle, RadioLink, RadioSignal, RadioState};

/// One command issued against the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCommand {
    StartScan,
    StopScan,
    Connect(PeripheralHandle),
    CancelConnection(PeripheralHandle),
    QueryConnected(PeripheralHandle),
    DiscoverServices(PeripheralHandle),
    Read(Uuid),
    Subscribe(Uuid),
}

#[derive(Debug)]
struct Inner {
    state: RadioState,
    connected: HashSet<PeripheralHandle>,
    connect_ok: bool,
    connect_hangs: bool,
    stop_scan_ok: bool,
    discover_ok: bool,
    read_payload: Option<Vec<u8>>,
    commands: Vec<RadioCommand>,
    next_id: u32,
}

pub struct MockRadio {
    inner: Mutex<Inner>,
    signal_tx: broadcast::Sender<RadioSignal>,
    notif_tx: broadcast::Sender<Vec<u8>>,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRadio {
    pub fn new() -> Self {
        let (signal_tx, _) = broadcast::channel(64);
        let (notif_tx, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner {
                state: RadioState::PoweredOn,
                connected: HashSet::new(),
                connect_ok: true,
                connect_hangs: false,
                stop_scan_ok: true,
                discover_ok: true,
                read_payload: None,
                commands: Vec::new(),
                next_id: 0,
            }),
            signal_tx,
            notif_tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, command: RadioCommand) {
        self.lock().commands.push(command);
    }

    /// Broadcast an advertisement for a peripheral with the given name.
    pub fn advertise(&self, name: &str) -> PeripheralHandle {
        let handle = {
            let mut inner = self.lock();
            inner.next_id += 1;
            PeripheralHandle::new(format!("mock-{}", inner.next_id))
        };
        let _ = self.signal_tx.send(RadioSignal::Discovered {
            handle: handle.clone(),
            name: Some(name.to_string()),
        });
        handle
    }

    /// Flip the adapter state and notify subscribers.
    pub fn set_state(&self, state: RadioState) {
        self.lock().state = state;
        let _ = self.signal_tx.send(RadioSignal::StateChanged(state));
    }

    pub fn set_connect_ok(&self, ok: bool) {
        self.lock().connect_ok = ok;
    }

    /// Make `connect` suspend forever, for timeout tests.
    pub fn set_connect_hangs(&self, hangs: bool) {
        self.lock().connect_hangs = hangs;
    }

    pub fn set_stop_scan_ok(&self, ok: bool) {
        self.lock().stop_scan_ok = ok;
    }

    pub fn set_discover_ok(&self, ok: bool) {
        self.lock().discover_ok = ok;
    }

    pub fn set_read_payload(&self, payload: Vec<u8>) {
        self.lock().read_payload = Some(payload);
    }

    /// Force the link status a later `is_connected` query will report.
    pub fn set_link_up(&self, handle: &PeripheralHandle, up: bool) {
        let mut inner = self.lock();
        if up {
            inner.connected.insert(handle.clone());
        } else {
            inner.connected.remove(handle);
        }
    }

    /// Emit a disconnect callback without changing the queryable link
    /// status, mimicking the spurious-disconnect radio artifact.
    pub fn signal_disconnect(&self, handle: &PeripheralHandle) {
        let _ = self.signal_tx.send(RadioSignal::Disconnected {
            handle: handle.clone(),
        });
    }

    /// Push one notification payload to every subscriber.
    pub fn push_notification(&self, payload: Vec<u8>) {
        let _ = self.notif_tx.send(payload);
    }

    pub fn commands(&self) -> Vec<RadioCommand> {
        self.lock().commands.clone()
    }

    pub fn count_of(&self, command: &RadioCommand) -> usize {
        self.lock().commands.iter().filter(|c| *c == command).count()
    }
}

#[async_trait]
impl RadioLink for MockRadio {
    async fn state(&self) -> Result<RadioState, RadioError> {
        Ok(self.lock().state)
    }

    async fn signals(&self) -> Result<BoxStream<'static, RadioSignal>, RadioError> {
        let rx = self.signal_tx.subscribe();
        Ok(BroadcastStream::new(rx)
            .filter_map(|signal| async move { signal.ok() })
            .boxed())
    }

    async fn start_scan(&self) -> Result<(), RadioError> {
        self.record(RadioCommand::StartScan);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), RadioError> {
        let ok = {
            let mut inner = self.lock();
            inner.commands.push(RadioCommand::StopScan);
            inner.stop_scan_ok
        };
        if ok {
            Ok(())
        } else {
            Err(RadioError::Stack("scripted stop-scan failure".into()))
        }
    }

    async fn connect(&self, handle: &PeripheralHandle) -> Result<(), RadioError> {
        let (hangs, ok) = {
            let mut inner = self.lock();
            inner.commands.push(RadioCommand::Connect(handle.clone()));
            (inner.connect_hangs, inner.connect_ok)
        };
        if hangs {
            futures::future::pending::<()>().await;
        }
        if !ok {
            return Err(RadioError::Stack("scripted connect failure".into()));
        }
        self.lock().connected.insert(handle.clone());
        Ok(())
    }

    async fn cancel_connection(&self, handle: &PeripheralHandle) -> Result<(), RadioError> {
        let mut inner = self.lock();
        inner
            .commands
            .push(RadioCommand::CancelConnection(handle.clone()));
        inner.connected.remove(handle);
        Ok(())
    }

    async fn is_connected(&self, handle: &PeripheralHandle) -> Result<bool, RadioError> {
        let mut inner = self.lock();
        inner
            .commands
            .push(RadioCommand::QueryConnected(handle.clone()));
        Ok(inner.connected.contains(handle))
    }

    async fn discover_services(&self, handle: &PeripheralHandle) -> Result<(), RadioError> {
        let ok = {
            let mut inner = self.lock();
            inner
                .commands
                .push(RadioCommand::DiscoverServices(handle.clone()));
            inner.discover_ok
        };
        if ok {
            Ok(())
        } else {
            Err(RadioError::Stack("scripted discovery failure".into()))
        }
    }

    async fn read_characteristic(
        &self,
        _handle: &PeripheralHandle,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, RadioError> {
        let payload = {
            let mut inner = self.lock();
            inner.commands.push(RadioCommand::Read(characteristic));
            inner.read_payload.clone()
        };
        payload.ok_or(RadioError::CharacteristicNotFound(characteristic))
    }

    async fn subscribe(
        &self,
        _handle: &PeripheralHandle,
        characteristic: Uuid,
    ) -> Result<(), RadioError> {
        self.record(RadioCommand::Subscribe(characteristic));
        Ok(())
    }

    async fn notifications(
        &self,
        _handle: &PeripheralHandle,
        _characteristic: Uuid,
    ) -> Result<BoxStream<'static, Vec<u8>>, RadioError> {
        let rx = self.notif_tx.subscribe();
        Ok(BroadcastStream::new(rx)
            .filter_map(|payload| async move { payload.ok() })
            .boxed())
    }
}
