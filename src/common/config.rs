use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Which record store backs the certificate table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

/// Key material for the password cipher.
///
/// Both values are raw strings; `CryptoService` pads or truncates them to the
/// cipher's key and IV lengths.
#[derive(Clone)]
pub struct CryptoConfig {
    pub secret_key: String,
    pub init_vector: String,
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("secret_key", &"<redacted>")
            .field("init_vector", &"<redacted>")
            .finish()
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            secret_key: "faraday".to_string(),
            init_vector: "tesla".to_string(),
        }
    }
}

/// External command-line tools used by the conversion and signing pipelines
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub openssl_bin: String,
    pub java_bin: String,
    pub open_pdf_sign_jar: PathBuf,
    pub timeout: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            openssl_bin: "openssl".to_string(),
            java_bin: "java".to_string(),
            open_pdf_sign_jar: PathBuf::from("./java/open-pdf-sign.jar"),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Sizing of the sign job worker pool
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub workers: usize,
    pub capacity: usize,
    pub retention: usize,
}

impl QueueConfig {
    /// Every limit must be at least 1; a retention of 0 would evict a job
    /// (and its signed document) the moment it finishes
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("SIGN_WORKERS must be at least 1"));
        }
        if self.capacity == 0 {
            return Err(anyhow!("SIGN_QUEUE_CAPACITY must be at least 1"));
        }
        if self.retention == 0 {
            return Err(anyhow!("JOB_RETENTION must be at least 1"));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 256,
            retention: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub temp_dir: PathBuf,
    pub crypto: CryptoConfig,
    pub tools: ToolConfig,
    pub queue: QueueConfig,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honored.
    pub fn from_env() -> Result<Self> {
        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>().map_err(|e| anyhow!(e))?,
            None => StorageBackend::Postgres,
        };

        let database_url = env_opt("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(anyhow!("DATABASE_URL must be set when STORAGE_BACKEND=postgres"));
        }

        let tool_defaults = ToolConfig::default();
        let queue_defaults = QueueConfig::default();
        let crypto_defaults = CryptoConfig::default();

        let config = Self {
            port: env_parse("PORT", 8080)?,
            storage_backend,
            database_url,
            temp_dir: env_opt("TEMP_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./tmp")),
            crypto: CryptoConfig {
                secret_key: env_opt("HASH_SECURITY_KEY").unwrap_or(crypto_defaults.secret_key),
                init_vector: env_opt("HASH_INIT_VECTOR").unwrap_or(crypto_defaults.init_vector),
            },
            tools: ToolConfig {
                openssl_bin: env_opt("OPENSSL_BIN").unwrap_or(tool_defaults.openssl_bin),
                java_bin: env_opt("JAVA_BIN").unwrap_or(tool_defaults.java_bin),
                open_pdf_sign_jar: env_opt("OPEN_PDF_SIGN_JAR")
                    .map(PathBuf::from)
                    .unwrap_or(tool_defaults.open_pdf_sign_jar),
                timeout: Duration::from_secs(env_parse("TOOL_TIMEOUT_SECS", tool_defaults.timeout.as_secs())?),
            },
            queue: QueueConfig {
                workers: env_parse("SIGN_WORKERS", queue_defaults.workers)?,
                capacity: env_parse("SIGN_QUEUE_CAPACITY", queue_defaults.capacity)?,
                retention: env_parse("JOB_RETENTION", queue_defaults.retention)?,
            },
        };

        config.queue.validate()?;

        Ok(config)
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_opt(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", name, value)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!("Postgres".parse::<StorageBackend>().unwrap(), StorageBackend::Postgres);
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_crypto_config_debug_redacts_secrets() {
        let config = CryptoConfig {
            secret_key: "super-secret".to_string(),
            init_vector: "iv-value".to_string(),
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("iv-value"));
    }

    #[test]
    fn test_queue_config_rejects_zero_limits() {
        assert!(QueueConfig::default().validate().is_ok());

        let no_retention = QueueConfig {
            retention: 0,
            ..QueueConfig::default()
        };
        let err = no_retention.validate().unwrap_err();
        assert!(err.to_string().contains("JOB_RETENTION"));

        let no_workers = QueueConfig {
            workers: 0,
            ..QueueConfig::default()
        };
        assert!(no_workers.validate().is_err());

        let no_capacity = QueueConfig {
            capacity: 0,
            ..QueueConfig::default()
        };
        assert!(no_capacity.validate().is_err());
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("CERTSIGN_TEST_WORKERS", "many");
        assert!(env_parse::<usize>("CERTSIGN_TEST_WORKERS", 4).is_err());
        std::env::set_var("CERTSIGN_TEST_WORKERS", " 7 ");
        assert_eq!(env_parse::<usize>("CERTSIGN_TEST_WORKERS", 4).unwrap(), 7);
        std::env::remove_var("CERTSIGN_TEST_WORKERS");
        assert_eq!(env_parse::<usize>("CERTSIGN_TEST_WORKERS", 4).unwrap(), 4);
    }
}
