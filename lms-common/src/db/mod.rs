//! Database schema, migrations, models and store-call helpers

pub mod init;
pub mod migrations;
pub mod models;

pub use init::*;
pub use migrations::*;
pub use models::*;

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Run one store round trip with a bounded wait
///
/// Expiry yields [`Error::Timeout`], which callers treat as retryable. The
/// timed-out future is dropped; nothing is assumed committed.
pub async fn bounded<T, F>(limit: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "{} exceeded {} ms",
            op,
            limit.as_millis()
        ))),
    }
}

/// True when a write failed on a UNIQUE constraint or index
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint")
        }
        _ => false,
    }
}
