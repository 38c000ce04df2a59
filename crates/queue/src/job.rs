//! Job representation and handler errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A queued unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: Uuid,
    /// Dispatch key; one registered handler per type
    pub job_type: String,
    /// Opaque payload interpreted by the handler
    pub payload: serde_json::Value,
    /// Failed delivery attempts so far
    pub attempts: u32,
    /// Attempts after which the job is dropped
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            payload,
            attempts: 0,
            max_attempts,
            created_at: Utc::now(),
        }
    }

    /// Deserialize the payload into a typed value
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, JobError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Errors a job handler can surface to the queue
#[derive(Debug, Error)]
pub enum JobError {
    /// Payload did not deserialize into what the handler expected
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Handler-level failure; retried while attempts remain
    #[error("{0}")]
    Failed(String),
}

impl JobError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_starts_with_zero_attempts() {
        let job = Job::new("advance", serde_json::json!({ "x": 1 }), 3);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, 3);
    }

    #[test]
    fn test_typed_payload() {
        #[derive(serde::Deserialize)]
        struct P {
            x: i64,
        }
        let job = Job::new("advance", serde_json::json!({ "x": 7 }), 3);
        let p: P = job.payload_as().unwrap();
        assert_eq!(p.x, 7);

        let bad: Result<Vec<String>, _> = job.payload_as();
        assert!(bad.is_err());
    }
}
