//! Record store behind the certificate service.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

use super::connection::DbPool;
use super::models::{CreateCertificate, DbCertificate, UpdateCertificate};
use super::queries::CertificateQueries;
use crate::common::error::{AppError, AppResult};
use crate::models::certificate::Certificate;

/// Keyed certificate records with a unique `key`.
///
/// `insert` and `update` fail with `DuplicateKey` when another record
/// already holds the key.
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn insert(&self, data: CreateCertificate) -> AppResult<Certificate>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Certificate>>;

    async fn find_by_key(&self, key: &str) -> AppResult<Option<Certificate>>;

    async fn list(&self) -> AppResult<(Vec<Certificate>, i64)>;

    async fn find_by_keys_with_secret(&self, keys: &[String]) -> AppResult<Vec<DbCertificate>>;

    async fn update(&self, id: Uuid, data: UpdateCertificate) -> AppResult<Option<Certificate>>;

    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

pub struct PgCertificateRepository {
    pool: DbPool,
}

impl PgCertificateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn log_db_error(operation: &str, err: sqlx::Error) -> AppError {
    error!("Database error during {}: {:?}", operation, err);
    AppError::from(err)
}

#[async_trait]
impl CertificateRepository for PgCertificateRepository {
    async fn insert(&self, data: CreateCertificate) -> AppResult<Certificate> {
        let key = data.key.clone();
        CertificateQueries::create_certificate(&self.pool, data)
            .await
            .map_err(|e| {
                error!("Failed to insert certificate {}: {:?}", key, e);
                AppError::from_insert(e, &key)
            })
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Certificate>> {
        CertificateQueries::get_certificate_by_id(&self.pool, id)
            .await
            .map_err(|e| log_db_error("find_by_id", e))
    }

    async fn find_by_key(&self, key: &str) -> AppResult<Option<Certificate>> {
        CertificateQueries::get_certificate_by_key(&self.pool, key)
            .await
            .map_err(|e| log_db_error("find_by_key", e))
    }

    async fn list(&self) -> AppResult<(Vec<Certificate>, i64)> {
        let rows = CertificateQueries::get_all_certificates(&self.pool)
            .await
            .map_err(|e| log_db_error("list", e))?;
        let count = CertificateQueries::count_certificates(&self.pool)
            .await
            .map_err(|e| log_db_error("count", e))?;
        Ok((rows, count))
    }

    async fn find_by_keys_with_secret(&self, keys: &[String]) -> AppResult<Vec<DbCertificate>> {
        CertificateQueries::get_certificates_by_keys_with_password(&self.pool, keys)
            .await
            .map_err(|e| log_db_error("find_by_keys_with_secret", e))
    }

    async fn update(&self, id: Uuid, data: UpdateCertificate) -> AppResult<Option<Certificate>> {
        let key = data.key.clone();
        CertificateQueries::update_certificate(&self.pool, id, data)
            .await
            .map_err(|e| {
                error!("Failed to update certificate {}: {:?}", id, e);
                AppError::from_insert(e, &key)
            })
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        CertificateQueries::delete_certificate(&self.pool, id)
            .await
            .map_err(|e| log_db_error("delete", e))
    }
}

/// Process-local store for development and tests
#[derive(Default)]
pub struct MemoryCertificateRepository {
    rows: RwLock<HashMap<Uuid, DbCertificate>>,
}

impl MemoryCertificateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CertificateRepository for MemoryCertificateRepository {
    async fn insert(&self, data: CreateCertificate) -> AppResult<Certificate> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|row| row.key == data.key) {
            return Err(AppError::DuplicateKey(data.key));
        }
        let now = Utc::now();
        let row = DbCertificate {
            id: data.id,
            key: data.key,
            password: data.password,
            created_at: now,
            updated_at: now,
        };
        rows.insert(row.id, row.clone());
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Certificate>> {
        Ok(self.rows.read().await.get(&id).cloned().map(Into::into))
    }

    async fn find_by_key(&self, key: &str) -> AppResult<Option<Certificate>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|row| row.key == key)
            .cloned()
            .map(Into::into))
    }

    async fn list(&self) -> AppResult<(Vec<Certificate>, i64)> {
        let rows = self.rows.read().await;
        let mut list: Vec<Certificate> = rows.values().cloned().map(Into::into).collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let count = list.len() as i64;
        Ok((list, count))
    }

    async fn find_by_keys_with_secret(&self, keys: &[String]) -> AppResult<Vec<DbCertificate>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| keys.contains(&row.key))
            .cloned()
            .collect())
    }

    async fn update(&self, id: Uuid, data: UpdateCertificate) -> AppResult<Option<Certificate>> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|row| row.key == data.key && row.id != id) {
            return Err(AppError::DuplicateKey(data.key));
        }
        Ok(rows.get_mut(&id).map(|row| {
            row.key = data.key;
            row.password = data.password;
            row.updated_at = Utc::now();
            row.clone().into()
        }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}
