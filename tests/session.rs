//! End-to-end session behavior over the scripted mock radio.
//!
//! Time is paused and advanced explicitly, so timer-driven behavior
//! (scan windows, upload ticks, the disconnect confirmation delay) is
//! deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};

use tracker_bridge::backend::ReadingSink;
use tracker_bridge::domain::codec;
use tracker_bridge::error::{CodecError, SyncError, UploadError};
use tracker_bridge::infrastructure::mock::{MockRadio, RadioCommand};
use tracker_bridge::infrastructure::radio::{RadioLink, RadioState};
use tracker_bridge::{
    fetch_structured_reading, SessionStatus, Settings, StreamingSession, StructuredReading,
};

/// Backend sink recording successful batches; failures are scripted.
struct RecordingSink {
    fail: AtomicBool,
    batches: Mutex<Vec<f64>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            batches: Mutex::new(Vec::new()),
        }
    }

    fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn batches(&self) -> Vec<f64> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReadingSink for RecordingSink {
    async fn submit_exercise_batch(&self, total: f64) -> Result<(), UploadError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(UploadError("scripted network failure".into()));
        }
        self.batches.lock().unwrap().push(total);
        Ok(())
    }

    async fn submit_log_entry(
        &self,
        _amount: f64,
        _category: &str,
        _timestamp: DateTime<Utc>,
        _tag: Option<&str>,
    ) -> Result<(), UploadError> {
        Ok(())
    }
}

/// Let every spawned task run until the event queue is drained.
async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

fn count(mock: &MockRadio, command: RadioCommand) -> usize {
    mock.count_of(&command)
}

#[tokio::test(start_paused = true)]
async fn scan_timeout_reports_device_not_found_and_stops_scan_once() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink, &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Scanning);

    advance(Duration::from_secs(10)).await;
    assert_eq!(session.current_status(), SessionStatus::DeviceNotFound);
    assert_eq!(count(&mock, RadioCommand::StartScan), 1);
    assert_eq!(count(&mock, RadioCommand::StopScan), 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn second_scan_supersedes_the_first_and_its_timer() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink, &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;
    advance(Duration::from_secs(5)).await;

    session.start_scan();
    settle().await;
    assert_eq!(count(&mock, RadioCommand::StartScan), 2);
    assert_eq!(count(&mock, RadioCommand::StopScan), 1);

    // The first scan's window expires here; its timer must not fire
    // against the superseding scan.
    advance(Duration::from_secs(6)).await;
    assert_eq!(session.current_status(), SessionStatus::Scanning);

    advance(Duration::from_secs(5)).await;
    assert_eq!(session.current_status(), SessionStatus::DeviceNotFound);
    assert_eq!(count(&mock, RadioCommand::StopScan), 2);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn matching_advertisement_leads_to_ready() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink, &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;

    // Non-matching names are ignored; exact match wins.
    mock.advertise("SomeOtherDevice");
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Scanning);

    mock.advertise("CalTracker");
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Connected);
    assert_eq!(count(&mock, RadioCommand::StopScan), 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn connect_failure_surfaces_as_connection_failed() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink, &Settings::default());
    settle().await;
    mock.set_connect_ok(false);

    session.start_scan();
    settle().await;
    mock.advertise("CalTracker");
    settle().await;

    // Distinguishable from a clean disconnect, so callers can retry.
    assert_eq!(session.current_status(), SessionStatus::ConnectionFailed);
    assert_eq!(count(&mock, RadioCommand::StopScan), 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn transient_disconnect_signal_is_ignored_after_confirmation() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink, &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;
    let handle = mock.advertise("CalTracker");
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Connected);

    // Spurious callback: the queryable link status stays up.
    mock.signal_disconnect(&handle);
    settle().await;
    advance(Duration::from_millis(500)).await;

    assert_eq!(session.current_status(), SessionStatus::Connected);
    assert_eq!(count(&mock, RadioCommand::QueryConnected(handle.clone())), 1);
    assert_eq!(count(&mock, RadioCommand::CancelConnection(handle)), 0);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn confirmed_disconnect_tears_down_exactly_once() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink, &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;
    let handle = mock.advertise("CalTracker");
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Connected);

    mock.set_link_up(&handle, false);
    mock.signal_disconnect(&handle);
    settle().await;
    advance(Duration::from_millis(500)).await;

    assert_eq!(session.current_status(), SessionStatus::Idle);
    assert_eq!(count(&mock, RadioCommand::CancelConnection(handle)), 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_upload_is_merged_and_retried() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink.clone(), &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;
    mock.advertise("CalTracker");
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Connected);

    mock.push_notification(codec::encode_calorie_sample(10.0).into_bytes());
    mock.push_notification(codec::encode_calorie_sample(15.0).into_bytes());
    settle().await;

    sink.set_fail(true);
    advance(Duration::from_secs(3)).await;
    assert!(sink.batches().is_empty());

    sink.set_fail(false);
    mock.push_notification(codec::encode_calorie_sample(5.0).into_bytes());
    settle().await;
    advance(Duration::from_secs(3)).await;

    assert_eq!(sink.batches(), vec![30.0]);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn garbled_notification_does_not_stop_the_stream() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink.clone(), &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;
    mock.advertise("CalTracker");
    settle().await;

    mock.push_notification(b"!!garbage!!".to_vec());
    mock.push_notification(codec::encode_calorie_sample(7.5).into_bytes());
    settle().await;
    advance(Duration::from_secs(3)).await;

    assert_eq!(sink.batches(), vec![7.5]);
    assert_eq!(session.current_status(), SessionStatus::Connected);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn radio_power_loss_tears_down_and_recovers() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink, &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;
    let handle = mock.advertise("CalTracker");
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Connected);

    mock.set_state(RadioState::PoweredOff);
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::RadioOff);
    assert_eq!(count(&mock, RadioCommand::CancelConnection(handle)), 1);

    mock.set_state(RadioState::PoweredOn);
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Idle);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn upload_ticker_stops_when_the_session_ends() {
    let mock = Arc::new(MockRadio::new());
    let sink = Arc::new(RecordingSink::new());
    let session = StreamingSession::spawn(mock.clone(), sink.clone(), &Settings::default());
    settle().await;

    session.start_scan();
    settle().await;
    mock.advertise("CalTracker");
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Connected);

    session.disconnect();
    settle().await;
    assert_eq!(session.current_status(), SessionStatus::Idle);

    // Neither the notification pump nor the ticker outlives the session.
    mock.push_notification(codec::encode_calorie_sample(10.0).into_bytes());
    settle().await;
    advance(Duration::from_secs(3)).await;
    assert!(sink.batches().is_empty());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn one_shot_fetch_resolves_reference_payload() {
    let mock = Arc::new(MockRadio::new());
    let expected = StructuredReading {
        glucose: 145.2,
        calories: 38.0,
        tag: "Post-Meal".into(),
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
    };
    mock.set_read_payload(codec::encode_structured_reading(&expected).into_bytes());

    let task = tokio::spawn({
        let radio: Arc<dyn RadioLink> = mock.clone();
        let settings = Settings::default();
        async move { fetch_structured_reading(radio, &settings).await }
    });
    settle().await;
    mock.advertise("GlucoMonitor");

    let reading = task.await.unwrap().unwrap();
    assert_eq!(reading, expected);

    // Scoped cleanup ran on the success path too.
    assert_eq!(count(&mock, RadioCommand::StopScan), 1);
    assert_eq!(
        mock.commands()
            .iter()
            .filter(|c| matches!(c, RadioCommand::CancelConnection(_)))
            .count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn one_shot_scan_window_expiry_is_device_not_found() {
    let mock = Arc::new(MockRadio::new());
    let task = tokio::spawn({
        let radio: Arc<dyn RadioLink> = mock.clone();
        let settings = Settings::default();
        async move { fetch_structured_reading(radio, &settings).await }
    });
    settle().await;

    advance(Duration::from_secs(10)).await;
    assert!(matches!(task.await.unwrap(), Err(SyncError::DeviceNotFound)));
    assert_eq!(count(&mock, RadioCommand::StopScan), 1);
}

#[tokio::test(start_paused = true)]
async fn one_shot_fails_fast_when_radio_is_off() {
    let mock = Arc::new(MockRadio::new());
    mock.set_state(RadioState::PoweredOff);

    let radio: Arc<dyn RadioLink> = mock.clone();
    let result = fetch_structured_reading(radio, &Settings::default()).await;
    assert!(matches!(result, Err(SyncError::RadioOff)));
    assert_eq!(count(&mock, RadioCommand::StartScan), 0);
}

#[tokio::test(start_paused = true)]
async fn one_shot_connect_timeout_cancels_the_attempt() {
    let mock = Arc::new(MockRadio::new());
    mock.set_connect_hangs(true);

    let task = tokio::spawn({
        let radio: Arc<dyn RadioLink> = mock.clone();
        let settings = Settings::default();
        async move { fetch_structured_reading(radio, &settings).await }
    });
    settle().await;
    let handle = mock.advertise("GlucoMonitor");
    settle().await;

    advance(Duration::from_secs(8)).await;
    assert!(matches!(
        task.await.unwrap(),
        Err(SyncError::ConnectionTimeout)
    ));
    // The timed-out attempt is still cancelled by cleanup.
    assert_eq!(count(&mock, RadioCommand::CancelConnection(handle)), 1);
}

#[tokio::test(start_paused = true)]
async fn one_shot_failed_stop_scan_is_not_retried_by_cleanup() {
    let mock = Arc::new(MockRadio::new());
    mock.set_stop_scan_ok(false);

    let task = tokio::spawn({
        let radio: Arc<dyn RadioLink> = mock.clone();
        let settings = Settings::default();
        async move { fetch_structured_reading(radio, &settings).await }
    });
    settle().await;
    mock.advertise("GlucoMonitor");

    assert!(matches!(task.await.unwrap(), Err(SyncError::Radio(_))));
    // One stop per scan even when the stop itself fails; no connection
    // was made, so nothing to cancel either.
    assert_eq!(count(&mock, RadioCommand::StopScan), 1);
    assert_eq!(
        mock.commands()
            .iter()
            .filter(|c| matches!(c, RadioCommand::CancelConnection(_)))
            .count(),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn one_shot_short_payload_is_incomplete_data() {
    let mock = Arc::new(MockRadio::new());
    mock.set_read_payload(BASE64.encode("145.2,38.0,Post-Meal").into_bytes());

    let task = tokio::spawn({
        let radio: Arc<dyn RadioLink> = mock.clone();
        let settings = Settings::default();
        async move { fetch_structured_reading(radio, &settings).await }
    });
    settle().await;
    mock.advertise("GlucoMonitor");

    assert!(matches!(
        task.await.unwrap(),
        Err(SyncError::Parse(CodecError::IncompleteData(3)))
    ));
}
