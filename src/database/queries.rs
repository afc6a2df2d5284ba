use sqlx::PgPool;
use uuid::Uuid;

use super::models::{CreateCertificate, DbCertificate, UpdateCertificate};
use crate::models::certificate::Certificate;

pub struct CertificateQueries;

impl CertificateQueries {
    pub async fn create_certificate(pool: &PgPool, data: CreateCertificate) -> Result<Certificate, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(
            r#"
            INSERT INTO certificate (id, key, password, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, key, created_at, updated_at
            "#
        )
        .bind(data.id)
        .bind(&data.key)
        .bind(&data.password)
        .fetch_one(pool)
        .await
    }

    pub async fn get_certificate_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Certificate>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(
            "SELECT id, key, created_at, updated_at FROM certificate WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn get_certificate_by_key(pool: &PgPool, key: &str) -> Result<Option<Certificate>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(
            "SELECT id, key, created_at, updated_at FROM certificate WHERE key = $1"
        )
        .bind(key)
        .fetch_optional(pool)
        .await
    }

    pub async fn get_all_certificates(pool: &PgPool) -> Result<Vec<Certificate>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(
            "SELECT id, key, created_at, updated_at FROM certificate ORDER BY created_at DESC"
        )
        .fetch_all(pool)
        .await
    }

    pub async fn count_certificates(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM certificate")
            .fetch_one(pool)
            .await
    }

    // Only the signing path selects the encrypted password
    pub async fn get_certificates_by_keys_with_password(pool: &PgPool, keys: &[String]) -> Result<Vec<DbCertificate>, sqlx::Error> {
        sqlx::query_as::<_, DbCertificate>(
            r#"
            SELECT id, key, password, created_at, updated_at
            FROM certificate
            WHERE key = ANY($1)
            "#
        )
        .bind(keys)
        .fetch_all(pool)
        .await
    }

    pub async fn update_certificate(pool: &PgPool, id: Uuid, data: UpdateCertificate) -> Result<Option<Certificate>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(
            r#"
            UPDATE certificate
            SET key = $1, password = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING id, key, created_at, updated_at
            "#
        )
        .bind(&data.key)
        .bind(&data.password)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_certificate(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM certificate WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
