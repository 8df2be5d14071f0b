//! Upper bounds on every outbound call. A hung request becomes an error the view can retry.

use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Bounds a compute call; running out of time is a `Network` failure.
pub async fn compute<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    timeout(limit, fut).await.map_err(|_| {
        AppError::Network(format!("{} timed out after {}s", what, limit.as_secs()))
    })?
}

/// Bounds a store call; running out of time is a `Persistence` failure.
pub async fn persist<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    timeout(limit, fut).await.map_err(|_| {
        AppError::Persistence(format!("{} timed out after {}s", what, limit.as_secs()))
    })?
}
