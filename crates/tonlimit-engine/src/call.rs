//! Bounded external calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Await `fut` for at most `limit`, mapping its error into the engine taxonomy.
pub(crate) async fn bounded<T, E, F>(limit: Duration, operation: &'static str, fut: F) -> EngineResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<EngineError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(EngineError::Timeout {
            operation,
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
