use std::collections::BTreeSet;
use std::future::Future;

use tracing::error;

use crate::common::error::{AppError, AppResult};
use crate::database::models::DbCertificate;

/// Resolve every requested key, or fail naming all keys that did not resolve.
///
/// `fetch` receives the deduplicated keys and returns the rows it found,
/// with the encrypted password. Repeated keys in the request are verified once.
pub async fn verify_exist<F, Fut>(requested: &[String], fetch: F) -> AppResult<Vec<DbCertificate>>
where
    F: FnOnce(Vec<String>) -> Fut,
    Fut: Future<Output = AppResult<Vec<DbCertificate>>>,
{
    let requested_set: BTreeSet<&str> = requested.iter().map(String::as_str).collect();
    let unique: Vec<String> = requested_set.iter().map(|key| key.to_string()).collect();

    let found = fetch(unique).await?;
    let found_set: BTreeSet<&str> = found.iter().map(|row| row.key.as_str()).collect();

    let unresolved: Vec<String> = requested_set
        .symmetric_difference(&found_set)
        .map(|key| key.to_string())
        .collect();

    if !unresolved.is_empty() {
        error!("Certificates do not exist: {}", unresolved.join(","));
        return Err(AppError::UnresolvedKeys(unresolved));
    }

    Ok(found)
}
