use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::common::error::{AppError, AppResult};
use crate::services::file_store::TempFileStore;
use crate::services::toolchain::CommandRunner;

/// `{id}.pem`, the leaf certificate of a stored certificate
pub fn cert_pem_name(certificate_id: &str) -> String {
    format!("{}.pem", certificate_id)
}

/// `{id}-key.pem`, the unencrypted private key of a stored certificate
pub fn key_pem_name(certificate_id: &str) -> String {
    format!("{}-key.pem", certificate_id)
}

/// `{id}.key`, the password-protected key produced between steps
fn encrypted_key_name(certificate_id: &str) -> String {
    format!("{}.key", certificate_id)
}

/// PEM files derived from a PKCS#12 bundle, as artifact store names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedArtifacts {
    pub cert_pem: String,
    pub key_pem: String,
}

impl DerivedArtifacts {
    pub fn for_certificate(certificate_id: &str) -> Self {
        Self {
            cert_pem: cert_pem_name(certificate_id),
            key_pem: key_pem_name(certificate_id),
        }
    }
}

/// PKCS#12 to PEM conversion through the openssl command-line tool
#[derive(Clone)]
pub struct CertificateConverter {
    store: TempFileStore,
    runner: Arc<dyn CommandRunner>,
    openssl_bin: String,
}

impl CertificateConverter {
    pub fn new(store: TempFileStore, runner: Arc<dyn CommandRunner>, openssl_bin: impl Into<String>) -> Self {
        Self {
            store,
            runner,
            openssl_bin: openssl_bin.into(),
        }
    }

    /// Derive `{id}.pem` and `{id}-key.pem` from the staged bundle `staged_file`.
    ///
    /// Steps run strictly in order. The intermediate `{id}.key` never
    /// survives the call, and on failure neither do the outputs of earlier
    /// steps. The staged bundle itself belongs to the caller.
    pub async fn convert(
        &self,
        staged_file: &str,
        certificate_id: &str,
        password: &str,
    ) -> AppResult<DerivedArtifacts> {
        let openssl = self.runner.locate(&self.openssl_bin)?;
        let derived = DerivedArtifacts::for_certificate(certificate_id);
        let encrypted_key = encrypted_key_name(certificate_id);
        let pass = format!("pass:{}", password);

        let src = self.path_arg(staged_file);
        let mut scope = self.store.scope();

        scope.track(&derived.cert_pem);
        self.run_step(
            &openssl,
            "certificate extraction",
            &derived.cert_pem,
            vec![
                "pkcs12".into(),
                "-passin".into(),
                pass.clone(),
                "-clcerts".into(),
                "-nokeys".into(),
                "-in".into(),
                src.clone(),
                "-out".into(),
                self.path_arg(&derived.cert_pem),
            ],
        )
        .await?;

        scope.track(&encrypted_key);
        self.run_step(
            &openssl,
            "private key extraction",
            &encrypted_key,
            vec![
                "pkcs12".into(),
                "-passin".into(),
                pass.clone(),
                "-passout".into(),
                pass.clone(),
                "-nocerts".into(),
                "-in".into(),
                src,
                "-out".into(),
                self.path_arg(&encrypted_key),
            ],
        )
        .await?;

        scope.track(&derived.key_pem);
        self.run_step(
            &openssl,
            "private key decryption",
            &derived.key_pem,
            vec![
                "pkey".into(),
                "-passin".into(),
                pass,
                "-in".into(),
                self.path_arg(&encrypted_key),
                "-out".into(),
                self.path_arg(&derived.key_pem),
            ],
        )
        .await?;

        scope.keep(&derived.cert_pem);
        scope.keep(&derived.key_pem);
        info!("Derived PEM artifacts for certificate {}", certificate_id);

        Ok(derived)
    }

    async fn run_step(
        &self,
        openssl: &Path,
        step: &'static str,
        output_name: &str,
        args: Vec<String>,
    ) -> AppResult<()> {
        let output = self.runner.run(openssl, &args).await?;

        if !output.success {
            let stderr = output.diagnostics();
            error!("openssl {} failed: {}", step, stderr);
            return Err(AppError::ConversionFailed { step, stderr });
        }

        if !self.store.exists(output_name) {
            error!("openssl {} exited cleanly but produced no {}", step, output_name);
            return Err(AppError::ConversionFailed {
                step,
                stderr: format!("{} was not produced", output_name),
            });
        }

        Ok(())
    }

    fn path_arg(&self, name: &str) -> String {
        self.store.path_of(name).to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::toolchain::fake::FakeRunner;

    fn setup() -> (tempfile::TempDir, TempFileStore, FakeRunner, CertificateConverter) {
        let dir = tempfile::tempdir().unwrap();
        let store = TempFileStore::open(dir.path()).unwrap();
        let runner = FakeRunner::new();
        let converter = CertificateConverter::new(store.clone(), Arc::new(runner.clone()), "openssl");
        (dir, store, runner, converter)
    }

    #[tokio::test]
    async fn test_convert_keeps_pems_and_drops_intermediate_key() {
        let (_dir, store, runner, converter) = setup();
        store.stage(b"pkcs12-bytes", "cert-1.pfx").await.unwrap();

        let derived = converter.convert("cert-1.pfx", "cert-1", "abcd").await.unwrap();

        assert_eq!(derived.cert_pem, "cert-1.pem");
        assert_eq!(derived.key_pem, "cert-1-key.pem");
        assert!(store.exists("cert-1.pem"));
        assert!(store.exists("cert-1-key.pem"));
        assert!(!store.exists("cert-1.key"));
        // staged upload is the caller's to delete
        assert!(store.exists("cert-1.pfx"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].args[0], "pkcs12");
        assert!(calls[0].args.contains(&"-nokeys".to_string()));
        assert!(calls[1].args.contains(&"-nocerts".to_string()));
        assert_eq!(calls[1].value_after("-passout"), Some("pass:abcd"));
        assert_eq!(calls[2].args[0], "pkey");
        assert!(calls[2].value_after("-in").unwrap().ends_with("cert-1.key"));
    }

    #[tokio::test]
    async fn test_first_step_failure_leaves_nothing_derived() {
        let (_dir, store, runner, converter) = setup();
        store.stage(b"pkcs12-bytes", "cert-2.pfx").await.unwrap();
        runner.fail_when(|_| Some("Mac verify error: invalid password?".to_string()));

        let err = converter.convert("cert-2.pfx", "cert-2", "wrong").await.unwrap_err();

        match err {
            AppError::ConversionFailed { step, stderr } => {
                assert_eq!(step, "certificate extraction");
                assert!(stderr.contains("invalid password"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(runner.calls().len(), 1);
        assert!(!store.exists("cert-2.pem"));
        assert!(!store.exists("cert-2.key"));
        assert!(!store.exists("cert-2-key.pem"));
    }

    #[tokio::test]
    async fn test_last_step_failure_removes_earlier_outputs() {
        let (_dir, store, runner, converter) = setup();
        store.stage(b"pkcs12-bytes", "cert-3.pfx").await.unwrap();
        runner.fail_when(|call| (call.args[0] == "pkey").then(|| "unable to load key".to_string()));

        let err = converter.convert("cert-3.pfx", "cert-3", "abcd").await.unwrap_err();

        assert!(matches!(err, AppError::ConversionFailed { step: "private key decryption", .. }));
        assert_eq!(runner.calls().len(), 3);
        assert!(!store.exists("cert-3.pem"));
        assert!(!store.exists("cert-3.key"));
        assert!(!store.exists("cert-3-key.pem"));
    }

    #[tokio::test]
    async fn test_missing_openssl_is_reported_before_any_step() {
        let (_dir, store, runner, converter) = setup();
        store.stage(b"pkcs12-bytes", "cert-4.pfx").await.unwrap();
        runner.mark_missing("openssl");

        let err = converter.convert("cert-4.pfx", "cert-4", "abcd").await.unwrap_err();

        assert!(matches!(err, AppError::ToolNotAvailable(tool) if tool == "openssl"));
        assert!(runner.calls().is_empty());
    }
}
