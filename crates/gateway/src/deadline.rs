//! Bounded waits on gateway calls
//!
//! A call that does not answer in time has an unknown outcome: the exchange
//! may have acted on it. Callers receive `GatewayError::Timeout` and must
//! reconcile rather than assume success or failure.

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;

/// Await `call` for at most `limit`
pub async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(limit)),
    }
}
