//! Streaming exercise session: scan, connect, stream calorie deltas,
//! and flush the running total to the backend on a fixed interval.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::ReadingSink;
use crate::domain::accumulator::ReadingAccumulator;
use crate::domain::models::SessionStatus;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::scanner::NameScanner;
use crate::infrastructure::bluetooth::supervisor::{
    ConnectionSupervisor, SessionCommand, SessionEvent,
};
use crate::infrastructure::radio::{RadioLink, RadioSignal};

/// Drains the accumulator on each tick and submits the total, restoring
/// it on failure so a transient network error never loses readings.
/// At-least-once: a failed batch is merged with later samples and
/// retried as one larger total.
pub struct BatchUploader {
    accumulator: ReadingAccumulator,
    sink: Arc<dyn ReadingSink>,
}

impl BatchUploader {
    pub fn new(sink: Arc<dyn ReadingSink>) -> Self {
        Self {
            accumulator: ReadingAccumulator::new(),
            sink,
        }
    }

    pub fn record(&mut self, value: f64) {
        self.accumulator.add(value);
    }

    pub async fn flush(&mut self) {
        if self.accumulator.total() <= 0.0 {
            return;
        }
        let batch = self.accumulator.drain();
        match self.sink.submit_exercise_batch(batch.total).await {
            Ok(()) => {
                info!(total = batch.total, samples = batch.samples, "exercise batch uploaded");
            }
            Err(e) => {
                warn!(total = batch.total, "upload failed, restoring batch: {e}");
                self.accumulator.restore(batch);
            }
        }
    }
}

/// Commands and status for a running streaming session.
///
/// There is no single caller awaiting the session: errors surface as
/// status changes on the watch channel, not as returned results.
pub struct StreamingHandle {
    commands: mpsc::UnboundedSender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
    task: JoinHandle<()>,
}

impl StreamingHandle {
    pub fn start_scan(&self) {
        let _ = self
            .commands
            .send(SessionEvent::Command(SessionCommand::StartScan));
    }

    pub fn disconnect(&self) {
        let _ = self
            .commands
            .send(SessionEvent::Command(SessionCommand::Disconnect));
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Tear down the session and wait for the supervisor to exit.
    pub async fn shutdown(self) {
        let _ = self
            .commands
            .send(SessionEvent::Command(SessionCommand::Shutdown));
        let _ = self.task.await;
    }
}

pub struct StreamingSession;

impl StreamingSession {
    /// Spawn a streaming session task against the given radio and sink.
    ///
    /// Radio callbacks are pumped into the session's event queue; a
    /// single consumer loop (the supervisor) applies them to state.
    pub fn spawn(
        radio: Arc<dyn RadioLink>,
        sink: Arc<dyn ReadingSink>,
        settings: &Settings,
    ) -> StreamingHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::Uninitialized);

        let scanner = NameScanner::new(
            radio.clone(),
            events_tx.clone(),
            settings.exercise_device_name.clone(),
            settings.scan_timeout(),
        );
        let supervisor = ConnectionSupervisor::new(
            radio.clone(),
            scanner,
            BatchUploader::new(sink),
            status_tx,
            events_tx.clone(),
            settings.exercise_notify_char,
            settings.upload_interval(),
            settings.disconnect_debounce(),
        );

        let signal_radio = radio;
        let signal_tx = events_tx.clone();
        let task = tokio::spawn(async move {
            let pump = tokio::spawn(async move {
                use futures::StreamExt;
                match signal_radio.signals().await {
                    Ok(mut signals) => {
                        while let Some(signal) = signals.next().await {
                            let event = match signal {
                                RadioSignal::Discovered { handle, name } => {
                                    SessionEvent::Discovered { handle, name }
                                }
                                RadioSignal::Disconnected { handle } => {
                                    SessionEvent::LinkDown(handle)
                                }
                                RadioSignal::StateChanged(state) => {
                                    SessionEvent::RadioState(state)
                                }
                            };
                            if signal_tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => error!("radio signal stream unavailable: {e}"),
                }
            });
            supervisor.run(events_rx).await;
            pump.abort();
        });

        StreamingHandle {
            commands: events_tx,
            status: status_rx,
            task,
        }
    }
}
