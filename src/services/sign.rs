use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::common::error::{AppError, AppResult};
use crate::database::models::DbCertificate;
use crate::services::certificate::CertificateService;
use crate::services::conversion::DerivedArtifacts;
use crate::services::crypto::CryptoService;
use crate::services::file_store::TempFileStore;
use crate::services::toolchain::CommandRunner;

/// Prefix open-pdf-sign output gets before it replaces the staged input
pub const SIGNED_PREFIX: &str = "signed-";

/// Applies certificate signatures to a PDF through open-pdf-sign
#[derive(Clone)]
pub struct SignService {
    certificates: CertificateService,
    store: TempFileStore,
    runner: Arc<dyn CommandRunner>,
    crypto: CryptoService,
    java_bin: String,
    jar_path: PathBuf,
}

impl SignService {
    pub fn new(
        certificates: CertificateService,
        store: TempFileStore,
        runner: Arc<dyn CommandRunner>,
        crypto: CryptoService,
        java_bin: impl Into<String>,
        jar_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            certificates,
            store,
            runner,
            crypto,
            java_bin: java_bin.into(),
            jar_path: jar_path.into(),
        }
    }

    /// Sign `document` with every certificate in `certificate_keys`, in that order.
    ///
    /// Each signature is applied to the output of the previous one, so the
    /// loop must stay sequential. Returns the artifact store name of the
    /// signed document; on any error nothing staged by this call remains.
    pub async fn sign(&self, document: &[u8], certificate_keys: &[String]) -> AppResult<String> {
        let pdf_name = format!("{}.pdf", Uuid::new_v4());
        let signed_name = format!("{}{}", SIGNED_PREFIX, pdf_name);

        let mut scope = self.store.scope();
        scope.track(&pdf_name);
        scope.track(&signed_name);

        self.store.stage(document, &pdf_name).await?;

        let found = self.certificates.verify_exist(certificate_keys).await?;
        let by_key: HashMap<&str, &DbCertificate> =
            found.iter().map(|row| (row.key.as_str(), row)).collect();

        let java = self.runner.locate(&self.java_bin)?;
        if !self.jar_path.is_file() {
            error!("open-pdf-sign not found at {}", self.jar_path.display());
            return Err(AppError::ToolNotAvailable(self.jar_path.display().to_string()));
        }

        for key in certificate_keys {
            let certificate = by_key
                .get(key.as_str())
                .ok_or_else(|| AppError::UnresolvedKeys(vec![key.clone()]))?;
            self.apply_signature(&java, &pdf_name, &signed_name, certificate).await?;
            debug!("Applied signature {} to {}", key, pdf_name);
        }

        scope.keep(&pdf_name);
        info!(
            "Signed {} with {} certificate(s)",
            pdf_name,
            certificate_keys.len()
        );

        Ok(pdf_name)
    }

    async fn apply_signature(
        &self,
        java: &std::path::Path,
        pdf_name: &str,
        signed_name: &str,
        certificate: &DbCertificate,
    ) -> AppResult<()> {
        let derived = DerivedArtifacts::for_certificate(&certificate.id.to_string());
        if !self.store.exists(&derived.cert_pem) || !self.store.exists(&derived.key_pem) {
            error!("Certificate {} has no derived PEM artifacts", certificate.key);
            return Err(AppError::SigningFailed {
                key: certificate.key.clone(),
                stderr: "derived PEM artifacts are missing".to_string(),
            });
        }

        let passphrase = self.crypto.decrypt(&certificate.password)?;
        let args = vec![
            "-jar".to_string(),
            self.jar_path.to_string_lossy().to_string(),
            "-i".to_string(),
            self.path_arg(pdf_name),
            "-o".to_string(),
            self.path_arg(signed_name),
            "-k".to_string(),
            self.path_arg(&derived.key_pem),
            "-c".to_string(),
            self.path_arg(&derived.cert_pem),
            "--passphrase".to_string(),
            passphrase,
        ];

        let output = self.runner.run(java, &args).await?;
        if !output.success {
            let stderr = output.diagnostics();
            error!("Signing with {} failed: {}", certificate.key, stderr);
            return Err(AppError::SigningFailed {
                key: certificate.key.clone(),
                stderr,
            });
        }

        if !self.store.exists(signed_name) {
            error!("Signing with {} produced no output", certificate.key);
            return Err(AppError::SigningFailed {
                key: certificate.key.clone(),
                stderr: format!("{} was not produced", signed_name),
            });
        }

        // next certificate signs the already-signed document
        self.store.rename(signed_name, pdf_name)?;
        Ok(())
    }

    fn path_arg(&self, name: &str) -> String {
        self.store.path_of(name).to_string_lossy().to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::certificate::tests::{fixture, upload, Fixture};

    pub(crate) fn sign_service(f: &Fixture) -> SignService {
        let jar = f.store.root().join("open-pdf-sign.jar");
        std::fs::write(&jar, b"jar").unwrap();
        SignService::new(
            f.service.clone(),
            f.store.clone(),
            Arc::new(f.runner.clone()),
            f.crypto.clone(),
            "java",
            jar,
        )
    }

    fn pdf_files(store: &TempFileStore) -> Vec<String> {
        std::fs::read_dir(store.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".pdf"))
            .collect()
    }

    #[tokio::test]
    async fn test_signatures_apply_in_requested_order() {
        let f = fixture();
        let k1 = f.service.add(upload("k1.pfx", "one")).await.unwrap();
        let k2 = f.service.add(upload("k2.pfx", "two")).await.unwrap();
        let signer = sign_service(&f);

        let name = signer
            .sign(b"%PDF", &["k1".to_string(), "k2".to_string()])
            .await
            .unwrap();

        let signer_calls: Vec<_> = f
            .runner
            .calls()
            .into_iter()
            .filter(|call| call.args.iter().any(|a| a == "-jar"))
            .collect();
        assert_eq!(signer_calls.len(), 2);
        assert!(signer_calls.iter().all(|call| call.program.ends_with("java")));
        assert!(signer_calls[0].value_after("-c").unwrap().ends_with(&format!("{}.pem", k1.id)));
        assert!(signer_calls[1].value_after("-c").unwrap().ends_with(&format!("{}.pem", k2.id)));
        assert_eq!(signer_calls[0].value_after("--passphrase"), Some("one"));
        assert_eq!(signer_calls[1].value_after("--passphrase"), Some("two"));
        // both calls read the same staged document
        assert_eq!(signer_calls[0].value_after("-i"), signer_calls[1].value_after("-i"));

        let signed = f.store.read(&name).await.unwrap();
        let expected = format!("%PDF|signed-by:{}.pem|signed-by:{}.pem", k1.id, k2.id);
        assert_eq!(String::from_utf8(signed).unwrap(), expected);
        assert_eq!(pdf_files(&f.store), vec![name]);
    }

    #[tokio::test]
    async fn test_reverse_order_gives_different_document() {
        let f = fixture();
        f.service.add(upload("k1.pfx", "one")).await.unwrap();
        f.service.add(upload("k2.pfx", "two")).await.unwrap();
        let signer = sign_service(&f);

        let forward = signer.sign(b"%PDF", &["k1".to_string(), "k2".to_string()]).await.unwrap();
        let reverse = signer.sign(b"%PDF", &["k2".to_string(), "k1".to_string()]).await.unwrap();

        assert_ne!(forward, reverse);
        assert_ne!(
            f.store.read(&forward).await.unwrap(),
            f.store.read(&reverse).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_unresolved_keys_abort_before_signing() {
        let f = fixture();
        f.service.add(upload("k1.pfx", "one")).await.unwrap();
        let signer = sign_service(&f);
        let calls_before = f.runner.calls().len();

        let err = signer
            .sign(b"%PDF", &["k1".to_string(), "ghost".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UnresolvedKeys(keys) if keys == vec!["ghost".to_string()]));
        assert_eq!(f.runner.calls().len(), calls_before);
        assert!(pdf_files(&f.store).is_empty());
    }

    #[tokio::test]
    async fn test_failure_mid_chain_leaves_no_document() {
        let f = fixture();
        f.service.add(upload("k1.pfx", "one")).await.unwrap();
        let k2 = f.service.add(upload("k2.pfx", "two")).await.unwrap();
        let signer = sign_service(&f);
        let k2_cert = format!("{}.pem", k2.id);
        f.runner.fail_when(move |call| {
            let is_signer = call.args.iter().any(|a| a == "-jar");
            let uses_k2 = call.value_after("-c").map_or(false, |c| c.ends_with(&k2_cert));
            (is_signer && uses_k2).then(|| "keystore error".to_string())
        });

        let err = signer
            .sign(b"%PDF", &["k1".to_string(), "k2".to_string()])
            .await
            .unwrap_err();

        match err {
            AppError::SigningFailed { key, stderr } => {
                assert_eq!(key, "k2");
                assert_eq!(stderr, "keystore error");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(pdf_files(&f.store).is_empty());
    }

    #[tokio::test]
    async fn test_missing_java_is_fatal_and_cleans_up() {
        let f = fixture();
        f.service.add(upload("k1.pfx", "one")).await.unwrap();
        let signer = sign_service(&f);
        f.runner.mark_missing("java");

        let err = signer.sign(b"%PDF", &["k1".to_string()]).await.unwrap_err();

        assert!(matches!(err, AppError::ToolNotAvailable(tool) if tool == "java"));
        assert!(pdf_files(&f.store).is_empty());
    }

    #[tokio::test]
    async fn test_missing_derived_artifacts_fail_signing() {
        let f = fixture();
        let k1 = f.service.add(upload("k1.pfx", "one")).await.unwrap();
        let signer = sign_service(&f);
        f.store.remove(&format!("{}-key.pem", k1.id)).unwrap();

        let err = signer.sign(b"%PDF", &["k1".to_string()]).await.unwrap_err();

        assert!(matches!(err, AppError::SigningFailed { .. }));
        assert!(pdf_files(&f.store).is_empty());
    }
}
