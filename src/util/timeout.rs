//! Timeout helper for issuer calls.

use std::future::Future;
use std::time::Duration;

use crate::auth::AuthError;

/// Wrap an issuer call with a timeout.
///
/// Elapsed calls surface as a credential issuance failure, so callers treat a
/// hung issuer exactly like one that answered with an error.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::issuance(
            None,
            format!("issuer timed out after {}ms", duration.as_millis()),
        )),
    }
}
