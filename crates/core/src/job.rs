//! Remote job records, statuses, and output payloads.

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Lifecycle status of a job on the remote queue, using the queue
/// service's wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "IN_QUEUE")]
    Queued,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl JobStatus {
    /// Whether this status ends the polling loop.  Terminal statuses are
    /// never left again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Client-side record of a submitted remote job.
///
/// Created on submission and mutated only by
/// [`apply_poll`](JobRecord::apply_poll); discarded once output is
/// fetched or a terminal failure is reported.
#[derive(Debug, Clone)]
pub struct JobRecord {
    /// Server-assigned job identifier.
    pub id: String,
    pub status: JobStatus,
    /// Error message reported by the service, if any.
    pub error: Option<String>,
    pub created_at: Timestamp,
}

impl JobRecord {
    /// Record a freshly submitted job.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            error: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Fold a poll response into the record.
    pub fn apply_poll(&mut self, status: JobStatus, error: Option<String>) {
        self.status = status;
        if error.is_some() {
            self.error = error;
        }
    }
}

/// Result payload of a completed remote job.
///
/// The service echoes the request parameters back alongside the images.
/// A payload without an `images` field decodes as an empty sequence,
/// not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputPayload {
    #[serde(default)]
    pub images: Vec<Artifact>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub face_id_weight: Option<f64>,
    #[serde(default)]
    pub seed: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Terminal status set --

    #[test]
    fn completed_failed_cancelled_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn queued_and_in_progress_are_not_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    // -- Wire strings --

    #[test]
    fn statuses_use_queue_service_strings() {
        let status: JobStatus = serde_json::from_str("\"IN_QUEUE\"").unwrap();
        assert_eq!(status, JobStatus::Queued);

        let status: JobStatus = serde_json::from_str("\"IN_PROGRESS\"").unwrap();
        assert_eq!(status, JobStatus::InProgress);
    }

    // -- Records --

    #[test]
    fn new_records_start_queued() {
        let record = JobRecord::new("job-1");
        assert_eq!(record.status, JobStatus::Queued);
        assert!(record.error.is_none());
    }

    #[test]
    fn apply_poll_keeps_earlier_error() {
        let mut record = JobRecord::new("job-1");
        record.apply_poll(JobStatus::Failed, Some("OOM".into()));
        record.apply_poll(JobStatus::Failed, None);
        assert_eq!(record.error.as_deref(), Some("OOM"));
    }

    // -- Output payload --

    #[test]
    fn missing_images_field_decodes_as_empty() {
        let payload: OutputPayload = serde_json::from_str(r#"{"seed": 42}"#).unwrap();
        assert!(payload.images.is_empty());
        assert_eq!(payload.seed, Some(42));
    }

    #[test]
    fn images_decode_with_wire_field_names() {
        let payload: OutputPayload = serde_json::from_str(
            r#"{"images": [{"image": "aGVsbG8=", "filename": "out.png"}]}"#,
        )
        .unwrap();
        assert_eq!(payload.images.len(), 1);
        assert_eq!(payload.images[0].filename, "out.png");
        assert_eq!(payload.images[0].decode().unwrap(), b"hello");
    }
}
