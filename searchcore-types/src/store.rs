use crate::catalog::{Catalog, CatalogRelation, ProjectionBatch};
use crate::query::{BuiltQuery, ResultRow};
use crate::schema::{EntityName, SchemaObjectRepresentation};
use std::future::Future;
use std::sync::Arc;

/// Identifies the catalog store operation that failed.
///
/// Used by `CatalogStoreError::StoreFailure` to provide strongly-typed
/// identification of which operation encountered an infrastructure failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Applying schema migrations.
    Migrate,
    /// Creating catalog or relation partitions.
    CreatePartitions,
    /// Beginning a database transaction.
    BeginTransaction,
    /// Writing a catalog row.
    UpsertCatalog,
    /// Writing a relation edge.
    InsertRelation,
    /// Deleting catalog rows.
    DeleteCatalog,
    /// Deleting relation edges.
    DeleteRelations,
    /// Committing a database transaction.
    CommitTransaction,
    /// Executing a compiled catalog query.
    ExecuteQuery,
    /// Reading catalog rows or relations back.
    ReadCatalog,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Migrate => write!(f, "migrate"),
            Operation::CreatePartitions => write!(f, "create_partitions"),
            Operation::BeginTransaction => write!(f, "begin_transaction"),
            Operation::UpsertCatalog => write!(f, "upsert_catalog"),
            Operation::InsertRelation => write!(f, "insert_relation"),
            Operation::DeleteCatalog => write!(f, "delete_catalog"),
            Operation::DeleteRelations => write!(f, "delete_relations"),
            Operation::CommitTransaction => write!(f, "commit_transaction"),
            Operation::ExecuteQuery => write!(f, "execute_query"),
            Operation::ReadCatalog => write!(f, "read_catalog"),
        }
    }
}

/// Error type returned by catalog store operations.
///
/// Storage errors are surfaced to the caller, which owns the retry policy.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogStoreError {
    /// Represents infrastructure failures surfaced by the backing store (e.g., connection drops).
    #[error("{operation} operation failed")]
    StoreFailure { operation: Operation },

    /// The backing store refused the data itself (invalid text, failed cast).
    ///
    /// Retrying the same write or query fails the same way.
    #[error("{operation} operation rejected the data: {detail}")]
    DataRejected { operation: Operation, detail: String },

    /// Returned when a result column cannot be decoded into its declared kind.
    #[error("failed to decode column {column}: {detail}")]
    DecodeFailed { column: String, detail: String },
}

/// Write side of the catalog.
///
/// Implementations include:
/// - `searchcore-postgres`: production PostgreSQL backend
/// - `searchcore::InMemoryCatalogStore`: in-memory backend for testing
pub trait CatalogStore {
    /// Prepare storage for the schema (partitions, indexes).
    ///
    /// Runs once at startup, before any event or query is served.
    fn prepare(
        &self,
        schema: &SchemaObjectRepresentation,
    ) -> impl Future<Output = Result<(), CatalogStoreError>> + Send;

    /// Apply every write of the batch atomically.
    ///
    /// Either all rows and edges of the batch are committed or none are.
    fn apply(
        &self,
        batch: ProjectionBatch,
    ) -> impl Future<Output = Result<(), CatalogStoreError>> + Send;
}

/// Runs compiled catalog queries.
pub trait QueryExecutor {
    fn execute(
        &self,
        query: &BuiltQuery,
    ) -> impl Future<Output = Result<Vec<ResultRow>, CatalogStoreError>> + Send;
}

/// Point reads used for inspection and contract tests.
pub trait CatalogReader {
    fn catalog_entry(
        &self,
        name: &EntityName,
        id: &str,
    ) -> impl Future<Output = Result<Option<Catalog>, CatalogStoreError>> + Send;

    /// Every relation row where `(id, name)` is parent or child.
    fn relations_for(
        &self,
        name: &EntityName,
        id: &str,
    ) -> impl Future<Output = Result<Vec<CatalogRelation>, CatalogStoreError>> + Send;

    fn count_relations(&self) -> impl Future<Output = Result<u64, CatalogStoreError>> + Send;
}

impl<T: CatalogStore + Sync> CatalogStore for &T {
    async fn prepare(&self, schema: &SchemaObjectRepresentation) -> Result<(), CatalogStoreError> {
        (*self).prepare(schema).await
    }

    async fn apply(&self, batch: ProjectionBatch) -> Result<(), CatalogStoreError> {
        (*self).apply(batch).await
    }
}

impl<T: CatalogStore + Send + Sync> CatalogStore for Arc<T> {
    async fn prepare(&self, schema: &SchemaObjectRepresentation) -> Result<(), CatalogStoreError> {
        self.as_ref().prepare(schema).await
    }

    async fn apply(&self, batch: ProjectionBatch) -> Result<(), CatalogStoreError> {
        self.as_ref().apply(batch).await
    }
}

impl<T: QueryExecutor + Sync> QueryExecutor for &T {
    async fn execute(&self, query: &BuiltQuery) -> Result<Vec<ResultRow>, CatalogStoreError> {
        (*self).execute(query).await
    }
}

impl<T: QueryExecutor + Send + Sync> QueryExecutor for Arc<T> {
    async fn execute(&self, query: &BuiltQuery) -> Result<Vec<ResultRow>, CatalogStoreError> {
        self.as_ref().execute(query).await
    }
}

impl<T: CatalogReader + Send + Sync> CatalogReader for Arc<T> {
    async fn catalog_entry(
        &self,
        name: &EntityName,
        id: &str,
    ) -> Result<Option<Catalog>, CatalogStoreError> {
        self.as_ref().catalog_entry(name, id).await
    }

    async fn relations_for(
        &self,
        name: &EntityName,
        id: &str,
    ) -> Result<Vec<CatalogRelation>, CatalogStoreError> {
        self.as_ref().relations_for(name, id).await
    }

    async fn count_relations(&self) -> Result<u64, CatalogStoreError> {
        self.as_ref().count_relations().await
    }
}
