//! Remote query collaborator used to refetch authoritative entity data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Entry point + fields + id filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteQueryDescriptor {
    /// Remote entry point, e.g. `product`.
    pub entry_point: String,
    /// Fields to fetch; dotted fields reach into relations.
    pub fields: Vec<String>,
    /// Instances to fetch.
    pub ids: Vec<String>,
}

/// Failure reported by the remote query collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("remote query for {entry_point} failed: {detail}")]
pub struct RemoteQueryError {
    pub entry_point: String,
    pub detail: String,
}

/// Resolves entity data by entry point, fields and ids.
///
/// Dotted fields (`product.id`) are returned nested (`{"product": {"id": ..}}`),
/// parents with many instances as arrays.
pub trait RemoteQuery {
    fn query(
        &self,
        descriptor: RemoteQueryDescriptor,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteQueryError>> + Send;
}

impl<T: RemoteQuery + Sync> RemoteQuery for &T {
    async fn query(&self, descriptor: RemoteQueryDescriptor) -> Result<Vec<Value>, RemoteQueryError> {
        (*self).query(descriptor).await
    }
}

impl<T: RemoteQuery + Send + Sync> RemoteQuery for Arc<T> {
    async fn query(&self, descriptor: RemoteQueryDescriptor) -> Result<Vec<Value>, RemoteQueryError> {
        self.as_ref().query(descriptor).await
    }
}
