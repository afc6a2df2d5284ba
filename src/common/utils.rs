use base64::{engine::general_purpose, Engine as _};

use crate::common::error::{AppError, AppResult};

/// Logical certificate key from an uploaded file name: everything before the first dot
pub fn normalize_key(name: &str) -> String {
    name.split('.').next().unwrap_or_default().to_string()
}

/// Extension of an uploaded file name including the leading dot, e.g. `.pfx`
///
/// Names without a dot get an empty extension.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => format!(".{}", ext),
        None => String::new(),
    }
}

/// Accepts `name` or `name.ext` where name is `[A-Za-z0-9_-]+` and ext is alphanumeric
pub fn is_valid_key_name(name: &str) -> bool {
    let (stem, ext) = match name.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    };

    let stem_ok = !stem.is_empty()
        && stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    let ext_ok = match ext {
        Some(ext) => !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()),
        None => true,
    };

    stem_ok && ext_ok
}

/// Decode a base64 request payload, rejecting empty results
pub fn decode_base64_payload(field: &str, data: &str) -> AppResult<Vec<u8>> {
    let bytes = general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|_| AppError::InvalidInput(format!("{} must be valid base64", field)))?;

    if bytes.is_empty() {
        return Err(AppError::InvalidInput(format!("{} must not be empty", field)));
    }

    Ok(bytes)
}

/// Render external tool arguments for logs with any inline password replaced
pub fn redact_args(args: &[String]) -> String {
    let mut redact_next = false;
    args.iter()
        .map(|arg| {
            if redact_next {
                redact_next = false;
                return "***".to_string();
            }
            if arg == "--passphrase" {
                redact_next = true;
                return arg.clone();
            }
            if arg.starts_with("pass:") {
                return "pass:***".to_string();
            }
            arg.clone()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
