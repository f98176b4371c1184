//! REST API handlers organized by concern.

pub mod allotments;
pub mod analytics;
pub mod configs;
pub mod export;
pub mod health;
pub mod reservations;
pub mod rules;
pub mod webhook;

use std::future::Future;
use std::time::Duration;

use crate::infra::EngineError;

use super::error::ApiError;

/// Run an engine operation under the request deadline. On expiry the
/// operation's tentative changes are dropped unsaved and the caller gets
/// the timeout error kind.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, operation: F) -> Result<T, ApiError>
where
    F: Future<Output = crate::infra::Result<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(_) => Err(ApiError::from(EngineError::Timeout)),
    }
}
