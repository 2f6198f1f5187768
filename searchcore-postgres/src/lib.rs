//! PostgreSQL backend for the SearchCore catalog.
//!
//! Catalog rows live in `catalog`, list-partitioned by entity name, and
//! relation edges in `catalog_relation`, list-partitioned by pivot. Both
//! tables and their default partitions are created by [`PostgresCatalogStore::migrate`];
//! per-entity partitions are created by `CatalogStore::prepare`.

mod partitions;

use std::num::NonZeroU32;
use std::time::Duration;

use nutype::nutype;
use searchcore_types::{
    BuiltQuery, Catalog, CatalogReader, CatalogRelation, CatalogStore, CatalogStoreError,
    CatalogWrite, ColumnKind, ColumnSpec, EntityName, Operation, ProjectionBatch, QueryExecutor,
    ResultRow, SchemaObjectRepresentation, SqlParam, UpsertMode,
};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row, postgres::PgPoolOptions, query, query_scalar};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Errors raised while opening the catalog database.
#[derive(Debug, Error)]
pub enum PostgresCatalogStoreError {
    #[error("could not connect to the catalog database")]
    ConnectionFailed(#[source] sqlx::Error),
}

/// Upper bound on pooled connections shared by projection writes and queries.
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(NonZeroU32);

const DEFAULT_POOL_SIZE: NonZeroU32 = NonZeroU32::MIN.saturating_add(9);

/// Pool settings for [`PostgresCatalogStore`].
///
/// Event projection holds a connection for one transaction per event, while
/// queries hold one per statement (two for filtered-entities reloads). Size
/// the pool for the expected number of concurrent events plus queries.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Pool size, 10 by default.
    pub max_connections: MaxConnections,
    /// How long a projection or query waits for a free connection.
    pub acquire_timeout: Duration,
    /// Idle connections are closed after this long.
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: MaxConnections::new(DEFAULT_POOL_SIZE),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Catalog store backed by the partitioned `catalog` and `catalog_relation` tables.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Pool<Postgres>,
}

impl PostgresCatalogStore {
    /// Connect with [`PostgresConfig::default`].
    pub async fn new<S: Into<String>>(
        connection_string: S,
    ) -> Result<Self, PostgresCatalogStoreError> {
        Self::with_config(connection_string, PostgresConfig::default()).await
    }

    /// Connect with explicit pool settings.
    pub async fn with_config<S: Into<String>>(
        connection_string: S,
        config: PostgresConfig,
    ) -> Result<Self, PostgresCatalogStoreError> {
        let max_connections: NonZeroU32 = config.max_connections.into();
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&connection_string.into())
            .await
            .map_err(PostgresCatalogStoreError::ConnectionFailed)?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap a pool the application already owns.
    ///
    /// The tables are expected to exist; call [`migrate`](Self::migrate) otherwise.
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create the catalog tables, their default partitions and indexes.
    #[instrument(name = "postgres.migrate", skip(self))]
    pub async fn migrate(&self) -> Result<(), CatalogStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|error| {
                error!(
                    error = %error,
                    operation = %Operation::Migrate,
                    "[postgres.migrate] migration failed"
                );
                CatalogStoreError::StoreFailure {
                    operation: Operation::Migrate,
                }
            })
    }
}

impl CatalogStore for PostgresCatalogStore {
    #[instrument(name = "postgres.prepare", skip(self, schema))]
    async fn prepare(&self, schema: &SchemaObjectRepresentation) -> Result<(), CatalogStoreError> {
        let planned = partitions::plan(schema);
        let mut created = 0usize;

        for partition in &planned {
            let occupied: bool = query_scalar(&partition.occupied_sql())
                .bind(partition.value.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|error| map_sqlx_error(error, Operation::CreatePartitions))?;

            if occupied {
                warn!(
                    partition = %partition.name,
                    value = %partition.value,
                    table = ?partition.table,
                    "[postgres.prepare] rows already in the default partition, keeping them there"
                );
                continue;
            }

            query(&partition.create_sql())
                .execute(&self.pool)
                .await
                .map_err(|error| map_sqlx_error(error, Operation::CreatePartitions))?;
            debug!(partition = %partition.name, "[postgres.prepare] partition ready");
            created += 1;
        }

        info!(
            planned = planned.len(),
            created, "[postgres.prepare] catalog partitions prepared"
        );
        Ok(())
    }

    #[instrument(name = "postgres.apply", skip(self, batch), fields(writes = batch.len()))]
    async fn apply(&self, batch: ProjectionBatch) -> Result<(), CatalogStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error(error, Operation::BeginTransaction))?;

        for write in batch.into_writes() {
            match write {
                CatalogWrite::Upsert { entry, mode } => {
                    let statement = match mode {
                        UpsertMode::Replace => {
                            "INSERT INTO catalog (id, name, data) VALUES ($1, $2, $3) \
                             ON CONFLICT (id, name) DO UPDATE SET data = EXCLUDED.data, updated_at = now()"
                        }
                        UpsertMode::Merge => {
                            "INSERT INTO catalog (id, name, data) VALUES ($1, $2, $3) \
                             ON CONFLICT (id, name) DO UPDATE SET data = catalog.data || EXCLUDED.data, updated_at = now()"
                        }
                    };
                    let _ = query(statement)
                        .bind(entry.id.as_str())
                        .bind(entry.name.as_ref())
                        .bind(Json(Value::Object(entry.data)))
                        .execute(&mut *tx)
                        .await
                        .map_err(|error| map_sqlx_error(error, Operation::UpsertCatalog))?;
                }
                CatalogWrite::Relate(relation) => {
                    let _ = query(
                        "INSERT INTO catalog_relation (pivot, parent_id, parent_name, child_id, child_name) \
                         VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
                    )
                    .bind(relation.pivot.as_str())
                    .bind(relation.parent_id.as_str())
                    .bind(relation.parent_name.as_ref())
                    .bind(relation.child_id.as_str())
                    .bind(relation.child_name.as_ref())
                    .execute(&mut *tx)
                    .await
                    .map_err(|error| map_sqlx_error(error, Operation::InsertRelation))?;
                }
                CatalogWrite::Delete { name, ids } => {
                    let _ = query("DELETE FROM catalog WHERE name = $1 AND id = ANY($2)")
                        .bind(name.as_ref())
                        .bind(&ids)
                        .execute(&mut *tx)
                        .await
                        .map_err(|error| map_sqlx_error(error, Operation::DeleteCatalog))?;
                    let _ = query(
                        "DELETE FROM catalog_relation \
                         WHERE (parent_name = $1 AND parent_id = ANY($2)) \
                            OR (child_name = $1 AND child_id = ANY($2))",
                    )
                    .bind(name.as_ref())
                    .bind(&ids)
                    .execute(&mut *tx)
                    .await
                    .map_err(|error| map_sqlx_error(error, Operation::DeleteRelations))?;
                }
            }
        }

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error(error, Operation::CommitTransaction))?;
        Ok(())
    }
}

impl QueryExecutor for PostgresCatalogStore {
    #[instrument(name = "postgres.execute", skip(self, built), fields(params = built.params.len()))]
    async fn execute(&self, built: &BuiltQuery) -> Result<Vec<ResultRow>, CatalogStoreError> {
        let mut statement = query(&built.sql);
        for param in &built.params {
            statement = match param {
                SqlParam::Text(value) => statement.bind(value.as_str()),
                SqlParam::TextArray(values) => statement.bind(values.clone()),
                SqlParam::Json(value) => statement.bind(Json(value.clone())),
                SqlParam::BigInt(value) => statement.bind(*value),
            };
        }

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::ExecuteQuery))?;
        debug!(rows = rows.len(), "[postgres.execute] catalog query returned");

        rows.iter()
            .map(|row| decode_row(row, &built.columns))
            .collect()
    }
}

impl CatalogReader for PostgresCatalogStore {
    async fn catalog_entry(
        &self,
        name: &EntityName,
        id: &str,
    ) -> Result<Option<Catalog>, CatalogStoreError> {
        let row = query("SELECT data FROM catalog WHERE name = $1 AND id = $2")
            .bind(name.as_ref())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::ReadCatalog))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data: Json<Value> = row
            .try_get("data")
            .map_err(|error| decode_failed("data", &error))?;
        let Value::Object(data) = data.0 else {
            return Err(CatalogStoreError::DecodeFailed {
                column: "data".to_string(),
                detail: "catalog data is not an object".to_string(),
            });
        };

        Ok(Some(Catalog {
            id: id.to_string(),
            name: name.clone(),
            data,
        }))
    }

    async fn relations_for(
        &self,
        name: &EntityName,
        id: &str,
    ) -> Result<Vec<CatalogRelation>, CatalogStoreError> {
        let rows = query(
            "SELECT pivot, parent_id, parent_name, child_id, child_name FROM catalog_relation \
             WHERE (parent_name = $1 AND parent_id = $2) OR (child_name = $1 AND child_id = $2) \
             ORDER BY pivot, parent_id, child_id",
        )
        .bind(name.as_ref())
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error(error, Operation::ReadCatalog))?;

        rows.iter().map(decode_relation).collect()
    }

    async fn count_relations(&self) -> Result<u64, CatalogStoreError> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM catalog_relation")
            .fetch_one(&self.pool)
            .await
            .map_err(|error| map_sqlx_error(error, Operation::ReadCatalog))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

fn decode_row(row: &PgRow, columns: &[ColumnSpec]) -> Result<ResultRow, CatalogStoreError> {
    let mut decoded = ResultRow::new();
    for column in columns {
        let name = column.name.as_str();
        let value = match column.kind {
            ColumnKind::Id => row
                .try_get::<Option<String>, _>(name)
                .map(|id| id.map_or(Value::Null, Value::String)),
            ColumnKind::Data => row
                .try_get::<Option<Json<Value>>, _>(name)
                .map(|data| data.map_or(Value::Null, |data| data.0)),
            ColumnKind::Count => row.try_get::<i64, _>(name).map(Value::from),
        }
        .map_err(|error| decode_failed(name, &error))?;
        let _ = decoded.insert(column.name.clone(), value);
    }
    Ok(decoded)
}

fn decode_relation(row: &PgRow) -> Result<CatalogRelation, CatalogStoreError> {
    let text = |column: &str| -> Result<String, CatalogStoreError> {
        row.try_get::<String, _>(column)
            .map_err(|error| decode_failed(column, &error))
    };
    let entity = |column: &str| -> Result<EntityName, CatalogStoreError> {
        EntityName::try_new(text(column)?).map_err(|error| CatalogStoreError::DecodeFailed {
            column: column.to_string(),
            detail: error.to_string(),
        })
    };

    Ok(CatalogRelation {
        pivot: text("pivot")?,
        parent_id: text("parent_id")?,
        parent_name: entity("parent_name")?,
        child_id: text("child_id")?,
        child_name: entity("child_name")?,
    })
}

fn decode_failed(column: &str, error: &sqlx::Error) -> CatalogStoreError {
    error!(
        column,
        error = %error,
        "[postgres.decode_error] failed to decode catalog column"
    );
    CatalogStoreError::DecodeFailed {
        column: column.to_string(),
        detail: error.to_string(),
    }
}

/// SQLSTATE class 22: data exceptions (bad casts, invalid text encoding).
const DATA_EXCEPTION_CLASS: &str = "22";

fn map_sqlx_error(error: sqlx::Error, operation: Operation) -> CatalogStoreError {
    if let sqlx::Error::Database(database_error) = &error {
        let data_exception = database_error
            .code()
            .is_some_and(|code| code.starts_with(DATA_EXCEPTION_CLASS));
        if data_exception {
            warn!(
                error = %error,
                operation = %operation,
                "[postgres.data_rejected] database rejected the data"
            );
            return CatalogStoreError::DataRejected {
                operation,
                detail: database_error.message().to_string(),
            };
        }
    }
    error!(
        error = %error,
        operation = %operation,
        "[postgres.database_error] database operation failed"
    );
    CatalogStoreError::StoreFailure { operation }
}
