#![allow(dead_code)]
//! Common test doubles for searchcore integration tests.

use searchcore::{
    BuiltQuery, CatalogStore, CatalogStoreError, InMemoryCatalogStore, Operation,
    ProjectionBatch, QueryExecutor, RemoteQuery, RemoteQueryDescriptor, RemoteQueryError,
    ResultRow, SchemaObjectRepresentation, SearchModuleOptions,
};
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

/// Route provider logs to the test writer; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// product 1-n variants and variants linked to price sets.
pub fn catalog_options() -> SearchModuleOptions {
    serde_json::from_value(json!({
        "schema": {
            "entities": [
                { "alias": "product", "entity": "Product", "fields": ["id", "title", "status"] },
                {
                    "alias": "variant",
                    "entity": "ProductVariant",
                    "fields": ["id", "sku", "product.id", "product.title"],
                    "parents": [{ "alias": "product", "target_prop": "variants" }]
                },
                { "alias": "price_set", "entity": "PriceSet", "fields": ["id", "currency_code"] },
                {
                    "alias": "variant_price_set",
                    "entity": "LinkProductVariantPriceSet",
                    "fields": ["id", "variant_id", "price_set_id"],
                    "relationships": [
                        { "foreign_key": "variant_id", "service_name": "product" },
                        { "foreign_key": "price_set_id", "service_name": "pricing" }
                    ]
                }
            ],
            "services": {
                "product": { "linkable_keys": { "variant_id": "ProductVariant" } },
                "pricing": { "linkable_keys": { "price_set_id": "PriceSet" } }
            }
        }
    }))
    .expect("catalog options should deserialize")
}

pub fn row(value: Value) -> ResultRow {
    match value {
        Value::Object(row) => row,
        other => panic!("result rows are objects, got {other}"),
    }
}

/// Remote query answering from fixed records keyed by entry point.
#[derive(Default)]
pub struct FakeRemoteQuery {
    records: BTreeMap<String, Vec<Value>>,
    calls: Mutex<Vec<RemoteQueryDescriptor>>,
}

impl FakeRemoteQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, entry_point: &str, records: Vec<Value>) -> Self {
        self.records
            .entry(entry_point.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn calls(&self) -> Vec<RemoteQueryDescriptor> {
        self.calls.lock().expect("calls mutex should not be poisoned").clone()
    }
}

impl RemoteQuery for FakeRemoteQuery {
    async fn query(
        &self,
        descriptor: RemoteQueryDescriptor,
    ) -> Result<Vec<Value>, RemoteQueryError> {
        let records = self
            .records
            .get(&descriptor.entry_point)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| {
                        record["id"]
                            .as_str()
                            .is_some_and(|id| descriptor.ids.iter().any(|wanted| wanted == id))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        self.calls
            .lock()
            .expect("calls mutex should not be poisoned")
            .push(descriptor);
        Ok(records)
    }
}

/// In-memory catalog whose query side replays canned result sets.
pub struct ScriptedCatalog {
    catalog: InMemoryCatalogStore,
    responses: Mutex<VecDeque<Vec<ResultRow>>>,
    executed: Mutex<Vec<BuiltQuery>>,
    prepare_failures: AtomicUsize,
    prepare_calls: AtomicUsize,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self {
            catalog: InMemoryCatalogStore::new(),
            responses: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
            prepare_failures: AtomicUsize::new(0),
            prepare_calls: AtomicUsize::new(0),
        }
    }

    /// A catalog whose storage preparation always fails.
    pub fn failing_prepare() -> Self {
        Self::failing_prepares(usize::MAX)
    }

    /// A catalog whose first `failures` preparations fail.
    pub fn failing_prepares(failures: usize) -> Self {
        Self {
            prepare_failures: AtomicUsize::new(failures),
            ..Self::new()
        }
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    /// Queue the rows returned by the next executed statement.
    pub fn respond_with(self, rows: Vec<Value>) -> Self {
        self.responses
            .lock()
            .expect("responses mutex should not be poisoned")
            .push_back(rows.into_iter().map(row).collect());
        self
    }

    pub fn catalog(&self) -> &InMemoryCatalogStore {
        &self.catalog
    }

    pub fn executed(&self) -> Vec<BuiltQuery> {
        self.executed
            .lock()
            .expect("executed mutex should not be poisoned")
            .clone()
    }
}

impl CatalogStore for ScriptedCatalog {
    async fn prepare(&self, schema: &SchemaObjectRepresentation) -> Result<(), CatalogStoreError> {
        let _ = self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .prepare_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CatalogStoreError::StoreFailure {
                operation: Operation::CreatePartitions,
            });
        }
        self.catalog.prepare(schema).await
    }

    async fn apply(&self, batch: ProjectionBatch) -> Result<(), CatalogStoreError> {
        self.catalog.apply(batch).await
    }
}

impl QueryExecutor for ScriptedCatalog {
    async fn execute(&self, query: &BuiltQuery) -> Result<Vec<ResultRow>, CatalogStoreError> {
        self.executed
            .lock()
            .expect("executed mutex should not be poisoned")
            .push(query.clone());
        Ok(self
            .responses
            .lock()
            .expect("responses mutex should not be poisoned")
            .pop_front()
            .unwrap_or_default())
    }
}
