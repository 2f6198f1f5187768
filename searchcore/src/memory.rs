//! In-memory catalog store for tests and development.
//!
//! `InMemoryCatalogStore` keeps catalog rows and relation edges in standard
//! collections. A batch is staged against a copy of the state and swapped in
//! once every write has been applied, so readers never observe half a batch
//! and a failed write discards the whole batch.
//! It does not execute compiled SQL; query tests run against PostgreSQL.

use searchcore_types::{
    Catalog, CatalogReader, CatalogRelation, CatalogStore, CatalogStoreError, CatalogWrite,
    EntityName, Operation, ProjectionBatch, SchemaObjectRepresentation, UpsertMode,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
struct CatalogData {
    entries: BTreeMap<(EntityName, String), Map<String, Value>>,
    relations: BTreeSet<CatalogRelation>,
    prepared: BTreeSet<EntityName>,
}

impl CatalogData {
    fn write(&mut self, write: CatalogWrite) -> Result<(), CatalogStoreError> {
        match write {
            CatalogWrite::Upsert { entry, mode } => {
                if entry.id.contains('\0') || entry.data.values().any(contains_nul) {
                    return Err(CatalogStoreError::DataRejected {
                        operation: Operation::UpsertCatalog,
                        detail: format!("catalog row {} contains a NUL character", entry.id),
                    });
                }
                let key = (entry.name, entry.id);
                match (mode, self.entries.get_mut(&key)) {
                    (UpsertMode::Merge, Some(existing)) => existing.extend(entry.data),
                    _ => {
                        let _ = self.entries.insert(key, entry.data);
                    }
                }
            }
            CatalogWrite::Relate(relation) => {
                let _ = self.relations.insert(relation);
            }
            CatalogWrite::Delete { name, ids } => {
                for id in &ids {
                    let _ = self.entries.remove(&(name.clone(), id.clone()));
                    self.relations.retain(|relation| !relation.touches(&name, id));
                }
            }
        }
        Ok(())
    }
}

/// Text that PostgreSQL `jsonb` refuses to store.
fn contains_nul(value: &Value) -> bool {
    match value {
        Value::String(text) => text.contains('\0'),
        Value::Array(items) => items.iter().any(contains_nul),
        Value::Object(entries) => entries
            .iter()
            .any(|(key, value)| key.contains('\0') || contains_nul(value)),
        _ => false,
    }
}

/// Catalog store kept in process memory.
pub struct InMemoryCatalogStore {
    data: Mutex<CatalogData>,
}

impl InMemoryCatalogStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            data: Mutex::new(CatalogData::default()),
        }
    }

    /// Entity names `prepare` has registered so far.
    pub fn prepared_entities(&self) -> Result<Vec<EntityName>, CatalogStoreError> {
        let data = self.lock(Operation::ReadCatalog)?;
        Ok(data.prepared.iter().cloned().collect())
    }

    /// Number of catalog rows stored under `name`.
    pub fn count_entries(&self, name: &EntityName) -> Result<usize, CatalogStoreError> {
        let data = self.lock(Operation::ReadCatalog)?;
        Ok(data.entries.keys().filter(|(entry_name, _)| entry_name == name).count())
    }

    fn lock(
        &self,
        operation: Operation,
    ) -> Result<std::sync::MutexGuard<'_, CatalogData>, CatalogStoreError> {
        self.data
            .lock()
            .map_err(|_| CatalogStoreError::StoreFailure { operation })
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for InMemoryCatalogStore {
    async fn prepare(&self, schema: &SchemaObjectRepresentation) -> Result<(), CatalogStoreError> {
        let mut data = self.lock(Operation::CreatePartitions)?;
        data.prepared.extend(schema.entity_names());
        Ok(())
    }

    #[instrument(name = "memory.apply", skip(self, batch), fields(writes = batch.len()))]
    async fn apply(&self, batch: ProjectionBatch) -> Result<(), CatalogStoreError> {
        let mut data = self.lock(Operation::BeginTransaction)?;

        let mut staged = data.clone();
        for write in batch.into_writes() {
            staged.write(write)?;
        }
        *data = staged;

        debug!("[memory.apply] batch committed");
        Ok(())
    }
}

impl CatalogReader for InMemoryCatalogStore {
    async fn catalog_entry(
        &self,
        name: &EntityName,
        id: &str,
    ) -> Result<Option<Catalog>, CatalogStoreError> {
        let data = self.lock(Operation::ReadCatalog)?;
        Ok(data
            .entries
            .get(&(name.clone(), id.to_string()))
            .map(|entry| Catalog {
                id: id.to_string(),
                name: name.clone(),
                data: entry.clone(),
            }))
    }

    async fn relations_for(
        &self,
        name: &EntityName,
        id: &str,
    ) -> Result<Vec<CatalogRelation>, CatalogStoreError> {
        let data = self.lock(Operation::ReadCatalog)?;
        Ok(data
            .relations
            .iter()
            .filter(|relation| relation.touches(name, id))
            .cloned()
            .collect())
    }

    async fn count_relations(&self) -> Result<u64, CatalogStoreError> {
        let data = self.lock(Operation::ReadCatalog)?;
        Ok(data.relations.len() as u64)
    }
}
