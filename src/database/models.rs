use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::certificate::Certificate;

// Full certificate row, including the encrypted password
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbCertificate {
    pub id: Uuid,
    pub key: String,
    #[serde(skip_serializing)] // Never expose encrypted password
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbCertificate> for Certificate {
    fn from(row: DbCertificate) -> Self {
        Self {
            id: row.id,
            key: row.key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// Insert payload; password is already encrypted
#[derive(Debug, Clone)]
pub struct CreateCertificate {
    pub id: Uuid,
    pub key: String,
    pub password: String,
}

// Replacement key and encrypted password for an existing row
#[derive(Debug, Clone)]
pub struct UpdateCertificate {
    pub key: String,
    pub password: String,
}
