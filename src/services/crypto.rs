use openssl::symm::{decrypt, encrypt, Cipher};

use crate::common::config::CryptoConfig;
use crate::common::error::{AppError, AppResult};

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// AES-256-CBC encryption of certificate unlock passwords.
///
/// The IV is fixed by configuration, so the same plaintext always yields the
/// same ciphertext. Stored values are reproducible and comparable but the
/// scheme is not semantically secure; moving to random nonces would change
/// the stored format. Ciphertext is lowercase hex.
#[derive(Clone)]
pub struct CryptoService {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl CryptoService {
    pub fn new(config: &CryptoConfig) -> Self {
        Self {
            key: fit::<KEY_LEN>(config.secret_key.as_bytes()),
            iv: fit::<IV_LEN>(config.init_vector.as_bytes()),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let ciphertext = encrypt(Cipher::aes_256_cbc(), &self.key, Some(&self.iv), plaintext.as_bytes())
            .map_err(|e| {
                tracing::error!("Failed to encrypt secret: {}", e);
                AppError::Crypto(format!("encryption failed: {}", e))
            })?;
        Ok(hex::encode(ciphertext))
    }

    pub fn decrypt(&self, ciphertext: &str) -> AppResult<String> {
        let raw = hex::decode(ciphertext)
            .map_err(|e| AppError::Crypto(format!("ciphertext is not valid hex: {}", e)))?;

        let plaintext = decrypt(Cipher::aes_256_cbc(), &self.key, Some(&self.iv), &raw).map_err(|e| {
            tracing::error!("Failed to decrypt secret: {}", e);
            AppError::Crypto(format!("decryption failed: {}", e))
        })?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::Crypto("decrypted secret is not valid UTF-8".to_string()))
    }
}

/// Zero-pad or truncate `input` to exactly `N` bytes
fn fit<const N: usize>(input: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = input.len().min(N);
    out[..len].copy_from_slice(&input[..len]);
    out
}
