pub mod locks;

use std::future::Future;
use std::time::Duration;

use crate::error::{MeshError, MeshResult};

/// Bound a storage call. Expiry maps to `StorageUnavailable`; dropping the
/// inner future is what rolls back any open transaction.
pub async fn bounded<T, F>(limit: Duration, op: &str, fut: F) -> MeshResult<T>
where
    F: Future<Output = MeshResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(MeshError::StorageUnavailable(format!("{} timed out after {:?}", op, limit))),
    }
}
