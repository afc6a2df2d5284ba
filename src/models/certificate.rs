use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::common::utils::{decode_base64_payload, is_valid_key_name};

/// Stored certificate as exposed by default reads (no password)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CertificateList {
    pub rows: Vec<Certificate>,
    pub count: i64,
}

/// Body of certificate create and update requests
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CertificateRequest {
    /// Uploaded file name, e.g. `feather.pfx`; the stored key drops the extension
    pub key: String,
    /// PKCS#12 unlock password
    pub password: String,
    /// Base64-encoded PKCS#12 bundle
    pub data: String,
}

impl CertificateRequest {
    /// Validate the request and decode the bundle
    pub fn into_upload(self) -> AppResult<CertificateUpload> {
        if !is_valid_key_name(&self.key) {
            return Err(AppError::InvalidInput(format!(
                "Invalid certificate key: {}",
                self.key
            )));
        }
        let bundle = decode_base64_payload("data", &self.data)?;
        Ok(CertificateUpload {
            file_name: self.key,
            password: self.password,
            bundle,
        })
    }
}

/// Decoded certificate upload
pub struct CertificateUpload {
    pub file_name: String,
    pub password: String,
    pub bundle: Vec<u8>,
}

impl std::fmt::Debug for CertificateUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateUpload")
            .field("file_name", &self.file_name)
            .field("password", &"<redacted>")
            .field("bundle_len", &self.bundle.len())
            .finish()
    }
}
