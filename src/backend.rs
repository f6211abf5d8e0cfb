//! Backend collaborator boundary.
//!
//! The bridge does not persist readings itself; it hands them to this
//! sink and relies on its durability. Neither call carries a dedup key,
//! which is why the streaming uploader restores a drained batch when a
//! submission fails instead of dropping it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::UploadError;

#[async_trait]
pub trait ReadingSink: Send + Sync {
    /// Submit the drained calorie total of a streaming session.
    async fn submit_exercise_batch(&self, total: f64) -> Result<(), UploadError>;

    /// Record a single structured log entry.
    async fn submit_log_entry(
        &self,
        amount: f64,
        category: &str,
        timestamp: DateTime<Utc>,
        tag: Option<&str>,
    ) -> Result<(), UploadError>;
}
