use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::common::utils::{file_extension, normalize_key};
use crate::database::models::{CreateCertificate, DbCertificate, UpdateCertificate};
use crate::database::repository::CertificateRepository;
use crate::models::certificate::{Certificate, CertificateList, CertificateUpload};
use crate::services::conversion::{CertificateConverter, DerivedArtifacts};
use crate::services::crypto::CryptoService;
use crate::services::file_store::TempFileStore;
use crate::services::verification;

/// Upload extensions that would collide with derived artifact names
const RESERVED_EXTENSIONS: [&str; 2] = [".pem", ".key"];

/// Certificate CRUD over the record store and the derived PEM artifacts
#[derive(Clone)]
pub struct CertificateService {
    repo: Arc<dyn CertificateRepository>,
    store: TempFileStore,
    converter: CertificateConverter,
    crypto: CryptoService,
}

impl CertificateService {
    pub fn new(
        repo: Arc<dyn CertificateRepository>,
        store: TempFileStore,
        converter: CertificateConverter,
        crypto: CryptoService,
    ) -> Self {
        Self {
            repo,
            store,
            converter,
            crypto,
        }
    }

    pub async fn add(&self, upload: CertificateUpload) -> AppResult<Certificate> {
        let key = normalize_key(&upload.file_name);
        let extension = upload_extension(&upload.file_name)?;

        if self.repo.find_by_key(&key).await?.is_some() {
            error!("Certificate {} already exists", key);
            return Err(AppError::DuplicateKey(key));
        }

        let id = Uuid::new_v4();
        let staged = format!("{}{}", id, extension);
        let derived = DerivedArtifacts::for_certificate(&id.to_string());

        let mut scope = self.store.scope();
        scope.track(&staged);
        scope.track(&derived.cert_pem);
        scope.track(&derived.key_pem);

        self.store.stage(&upload.bundle, &staged).await?;
        self.converter
            .convert(&staged, &id.to_string(), &upload.password)
            .await
            .map_err(|e| {
                error!("Failed to convert certificate {}: {}", key, e);
                e
            })?;
        self.store.remove(&staged)?;

        let password = self.crypto.encrypt(&upload.password)?;
        let certificate = self
            .repo
            .insert(CreateCertificate { id, key, password })
            .await?;

        scope.keep(&derived.cert_pem);
        scope.keep(&derived.key_pem);
        info!("Certificate {} added as {}", certificate.key, certificate.id);

        Ok(certificate)
    }

    pub async fn find_all(&self) -> AppResult<CertificateList> {
        let (rows, count) = self.repo.list().await?;
        Ok(CertificateList { rows, count })
    }

    pub async fn find_one(&self, id: Uuid) -> AppResult<Certificate> {
        self.repo.find_by_id(id).await?.ok_or_else(|| {
            error!("Certificate {} not found", id);
            AppError::NotFound("Certificate".to_string())
        })
    }

    /// Rows for `keys` including the encrypted password; missing keys are skipped
    pub async fn find_by_keys_with_secret(&self, keys: &[String]) -> AppResult<Vec<DbCertificate>> {
        self.repo.find_by_keys_with_secret(keys).await
    }

    /// All-or-nothing resolution of a signing request's certificate keys
    pub async fn verify_exist(&self, keys: &[String]) -> AppResult<Vec<DbCertificate>> {
        verification::verify_exist(keys, |unique| async move {
            self.find_by_keys_with_secret(&unique).await
        })
        .await
    }

    /// Replace key, password and bundle of an existing certificate.
    ///
    /// The current PEM artifacts are deleted before the new bundle is
    /// converted; if conversion fails the certificate is left without them.
    pub async fn update(&self, id: Uuid, upload: CertificateUpload) -> AppResult<Certificate> {
        let existing = self.find_one(id).await?;
        let key = normalize_key(&upload.file_name);
        let extension = upload_extension(&upload.file_name)?;

        if let Some(other) = self.repo.find_by_key(&key).await? {
            if other.id != existing.id {
                error!("Certificate key {} is taken by {}", key, other.id);
                return Err(AppError::DuplicateKey(key));
            }
        }

        let certificate_id = existing.id.to_string();
        let derived = DerivedArtifacts::for_certificate(&certificate_id);
        self.store.remove_if_exists(&derived.cert_pem)?;
        self.store.remove_if_exists(&derived.key_pem)?;

        let staged = format!("{}{}", certificate_id, extension);
        let mut scope = self.store.scope();
        scope.track(&staged);
        scope.track(&derived.cert_pem);
        scope.track(&derived.key_pem);

        self.store.stage(&upload.bundle, &staged).await?;
        self.converter
            .convert(&staged, &certificate_id, &upload.password)
            .await
            .map_err(|e| {
                error!("Failed to convert certificate {}: {}", key, e);
                e
            })?;
        self.store.remove(&staged)?;

        let password = self.crypto.encrypt(&upload.password)?;
        let certificate = self
            .repo
            .update(existing.id, UpdateCertificate { key, password })
            .await?
            .ok_or_else(|| AppError::NotFound("Certificate".to_string()))?;

        scope.keep(&derived.cert_pem);
        scope.keep(&derived.key_pem);
        info!("Certificate {} updated", certificate.id);

        Ok(certificate)
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<()> {
        let existing = self.find_one(id).await?;
        let derived = DerivedArtifacts::for_certificate(&existing.id.to_string());

        self.store.remove_if_exists(&derived.cert_pem)?;
        self.store.remove_if_exists(&derived.key_pem)?;

        if !self.repo.delete(existing.id).await? {
            return Err(AppError::NotFound("Certificate".to_string()));
        }

        info!("Certificate {} removed", existing.id);
        Ok(())
    }
}

fn upload_extension(file_name: &str) -> AppResult<String> {
    let extension = file_extension(file_name);
    if RESERVED_EXTENSIONS
        .iter()
        .any(|reserved| extension.eq_ignore_ascii_case(reserved))
    {
        return Err(AppError::InvalidInput(format!(
            "Certificate bundles with extension {} are not accepted",
            extension
        )));
    }
    Ok(extension)
}
