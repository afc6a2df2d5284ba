use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::common::utils::decode_base64_payload;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignRequest {
    /// Certificate keys, applied in this order
    pub certificates: Vec<String>,
    /// Base64-encoded PDF
    pub data: String,
}

impl SignRequest {
    pub fn into_payload(self) -> AppResult<SignPayload> {
        if self.certificates.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one certificate key is required".to_string(),
            ));
        }
        if self.certificates.iter().any(|key| key.trim().is_empty()) {
            return Err(AppError::InvalidInput(
                "Certificate keys must not be empty".to_string(),
            ));
        }
        let document = decode_base64_payload("data", &self.data)?;
        Ok(SignPayload {
            document,
            certificate_keys: self.certificates,
        })
    }
}

/// One unit of signing work as carried by the queue
#[derive(Debug, Clone)]
pub struct SignPayload {
    pub document: Vec<u8>,
    pub certificate_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Active => write!(f, "active"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a sign job
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub certificates: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Artifact store name of the signed document, once completed
    pub document: Option<String>,
    pub error: Option<String>,
}

impl SignJob {
    pub fn queued(id: Uuid, certificates: Vec<String>) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            certificates,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            document: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignAccepted {
    pub job_id: Uuid,
}
