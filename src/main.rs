use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use tracker_bridge::backend::ReadingSink;
use tracker_bridge::error::UploadError;
use tracker_bridge::infrastructure::bluetooth::btleplug_link::BtleplugLink;
use tracker_bridge::infrastructure::logging;
use tracker_bridge::infrastructure::mock::MockRadio;
use tracker_bridge::infrastructure::radio::RadioLink;
use tracker_bridge::{fetch_structured_reading, SettingsService, StreamingSession};

/// Stand-in backend that just logs submissions.
struct LoggingSink;

#[async_trait]
impl ReadingSink for LoggingSink {
    async fn submit_exercise_batch(&self, total: f64) -> Result<(), UploadError> {
        info!(total, "submit exercise batch");
        Ok(())
    }

    async fn submit_log_entry(
        &self,
        amount: f64,
        category: &str,
        timestamp: DateTime<Utc>,
        tag: Option<&str>,
    ) -> Result<(), UploadError> {
        info!(amount, category, %timestamp, tag = tag.unwrap_or(""), "submit log entry");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();
    let _logging_guard = logging::init_logger(&settings.log_settings)?;
    info!("starting tracker-bridge");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let use_mock = args.iter().any(|a| a == "--mock");
    let radio: Arc<dyn RadioLink> = if use_mock {
        Arc::new(MockRadio::new())
    } else {
        Arc::new(BtleplugLink::new().await?)
    };
    let sink = Arc::new(LoggingSink);

    if args.iter().any(|a| a == "glucose") {
        let reading = fetch_structured_reading(radio, &settings)
            .await
            .map_err(|e| anyhow::anyhow!("sync failed: {e}"))?;
        info!(
            glucose = reading.glucose,
            calories = reading.calories,
            tag = %reading.tag,
            timestamp = %reading.timestamp,
            "fetched structured reading"
        );
        sink.submit_log_entry(
            reading.glucose,
            "glucose",
            reading.timestamp,
            Some(&reading.tag),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
        return Ok(());
    }

    let session = StreamingSession::spawn(radio, sink, &settings);
    session.start_scan();

    let mut status = session.status();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(status = %*status.borrow(), "session status");
            }
        }
    }
    session.shutdown().await;
    Ok(())
}
