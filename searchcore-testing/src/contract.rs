use searchcore_types::{
    Catalog, CatalogReader, CatalogRelation, CatalogStore, CatalogStoreError, CatalogWrite,
    EntityName, ProjectionBatch, SchemaConfig, SchemaObjectRepresentation, UpsertMode,
};
use serde_json::{Map, Value, json};
use std::fmt;
use uuid::Uuid;

/// A contract scenario that failed, with the reason.
#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn store_error(
        scenario: &'static str,
        operation: &'static str,
        error: CatalogStoreError,
    ) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

/// Outcome of one contract scenario.
pub type ContractTestResult = Result<(), ContractTestFailure>;

const PRODUCT: &str = "ContractProduct";
const VARIANT: &str = "ContractVariant";

fn contract_name(scenario: &'static str, value: &str) -> Result<EntityName, ContractTestFailure> {
    EntityName::try_new(value).map_err(|error| {
        ContractTestFailure::assertion(
            scenario,
            format!("unable to construct entity name `{value}`: {error}"),
        )
    })
}

fn contract_id(scenario: &'static str, label: &str) -> String {
    // Include UUID for parallel test execution against shared database
    format!("{scenario}_{label}_{}", Uuid::now_v7())
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn upsert(name: &EntityName, id: &str, data: Value, mode: UpsertMode) -> CatalogWrite {
    CatalogWrite::Upsert {
        entry: Catalog {
            id: id.to_string(),
            name: name.clone(),
            data: object(data),
        },
        mode,
    }
}

async fn apply<S: CatalogStore>(
    scenario: &'static str,
    store: &S,
    writes: Vec<CatalogWrite>,
) -> ContractTestResult {
    let mut batch = ProjectionBatch::new();
    for write in writes {
        batch.push(write);
    }
    store
        .apply(batch)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "apply", error))
}

async fn stored_data<S: CatalogReader>(
    scenario: &'static str,
    store: &S,
    name: &EntityName,
    id: &str,
) -> Result<Option<Value>, ContractTestFailure> {
    let entry = store
        .catalog_entry(name, id)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "catalog_entry", error))?;
    Ok(entry.map(|entry| Value::Object(entry.data)))
}

async fn relations<S: CatalogReader>(
    scenario: &'static str,
    store: &S,
    name: &EntityName,
    id: &str,
) -> Result<Vec<CatalogRelation>, ContractTestFailure> {
    store
        .relations_for(name, id)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "relations_for", error))
}

pub async fn test_replace_upsert_roundtrip<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: CatalogStore + CatalogReader + Send + Sync + 'static,
{
    const SCENARIO: &str = "replace_upsert_roundtrip";

    let store = make_store();
    let product = contract_name(SCENARIO, PRODUCT)?;
    let id = contract_id(SCENARIO, "product");

    apply(SCENARIO, &store, vec![upsert(
        &product,
        &id,
        json!({ "id": id, "title": "Shirt", "handle": "shirt" }),
        UpsertMode::Replace,
    )])
    .await?;
    apply(SCENARIO, &store, vec![upsert(
        &product,
        &id,
        json!({ "id": id, "title": "T-Shirt" }),
        UpsertMode::Replace,
    )])
    .await?;

    let stored = stored_data(SCENARIO, &store, &product, &id).await?;
    if stored != Some(json!({ "id": id, "title": "T-Shirt" })) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected the second write to replace the row, observed {stored:?}"),
        ));
    }

    Ok(())
}

pub async fn test_merge_upsert_preserves_existing_fields<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: CatalogStore + CatalogReader + Send + Sync + 'static,
{
    const SCENARIO: &str = "merge_upsert_preserves_existing_fields";

    let store = make_store();
    let product = contract_name(SCENARIO, PRODUCT)?;
    let id = contract_id(SCENARIO, "product");

    apply(SCENARIO, &store, vec![upsert(
        &product,
        &id,
        json!({ "id": id, "title": "Shirt", "status": "draft" }),
        UpsertMode::Replace,
    )])
    .await?;
    apply(SCENARIO, &store, vec![upsert(
        &product,
        &id,
        json!({ "id": id, "status": "published" }),
        UpsertMode::Merge,
    )])
    .await?;

    let stored = stored_data(SCENARIO, &store, &product, &id).await?;
    if stored != Some(json!({ "id": id, "title": "Shirt", "status": "published" })) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected merged fields, observed {stored:?}"),
        ));
    }

    let missing = contract_id(SCENARIO, "stub");
    apply(SCENARIO, &store, vec![upsert(
        &product,
        &missing,
        json!({ "id": missing }),
        UpsertMode::Merge,
    )])
    .await?;

    let stub = stored_data(SCENARIO, &store, &product, &missing).await?;
    if stub != Some(json!({ "id": missing })) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected merge into a missing row to insert it, observed {stub:?}"),
        ));
    }

    Ok(())
}

pub async fn test_delete_cascades_relations<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: CatalogStore + CatalogReader + Send + Sync + 'static,
{
    const SCENARIO: &str = "delete_cascades_relations";

    let store = make_store();
    let product = contract_name(SCENARIO, PRODUCT)?;
    let variant = contract_name(SCENARIO, VARIANT)?;
    let product_id = contract_id(SCENARIO, "product");
    let variant_id = contract_id(SCENARIO, "variant");
    let other_id = contract_id(SCENARIO, "other");

    apply(SCENARIO, &store, vec![
        upsert(&product, &product_id, json!({ "id": product_id }), UpsertMode::Replace),
        upsert(&variant, &variant_id, json!({ "id": variant_id }), UpsertMode::Replace),
        upsert(&variant, &other_id, json!({ "id": other_id }), UpsertMode::Replace),
        CatalogWrite::Relate(CatalogRelation::new(
            product_id.as_str(),
            product.clone(),
            variant_id.as_str(),
            variant.clone(),
        )),
        CatalogWrite::Relate(CatalogRelation::new(
            product_id.as_str(),
            product.clone(),
            other_id.as_str(),
            variant.clone(),
        )),
    ])
    .await?;

    for attempt in ["first", "second"] {
        apply(SCENARIO, &store, vec![CatalogWrite::Delete {
            name: product.clone(),
            ids: vec![product_id.clone()],
        }])
        .await
        .map_err(|failure| {
            ContractTestFailure::assertion(SCENARIO, format!("{attempt} delete failed: {failure}"))
        })?;
    }

    if stored_data(SCENARIO, &store, &product, &product_id).await?.is_some() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "deleted catalog row is still readable",
        ));
    }

    for id in [&product_id, &variant_id, &other_id] {
        let name = if id == &product_id { &product } else { &variant };
        let remaining = relations(SCENARIO, &store, name, id).await?;
        if !remaining.is_empty() {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!("expected no relations touching {id}, observed {}", remaining.len()),
            ));
        }
    }

    if stored_data(SCENARIO, &store, &variant, &variant_id).await?.is_none() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "deleting the parent must not delete child rows",
        ));
    }

    Ok(())
}

pub async fn test_duplicate_relations_are_ignored<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: CatalogStore + CatalogReader + Send + Sync + 'static,
{
    const SCENARIO: &str = "duplicate_relations_are_ignored";

    let store = make_store();
    let product = contract_name(SCENARIO, PRODUCT)?;
    let variant = contract_name(SCENARIO, VARIANT)?;
    let product_id = contract_id(SCENARIO, "product");
    let variant_id = contract_id(SCENARIO, "variant");
    let relation = CatalogRelation::new(
        product_id.as_str(),
        product.clone(),
        variant_id.as_str(),
        variant.clone(),
    );

    for _ in 0..2 {
        apply(SCENARIO, &store, vec![CatalogWrite::Relate(relation.clone())]).await?;
    }
    apply(SCENARIO, &store, vec![
        CatalogWrite::Relate(relation.clone()),
        CatalogWrite::Relate(relation.clone()),
    ])
    .await?;

    let stored = relations(SCENARIO, &store, &product, &product_id).await?;
    if stored != vec![relation] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected exactly one relation row, observed {stored:?}"),
        ));
    }

    Ok(())
}

pub async fn test_batch_writes_apply_in_order<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: CatalogStore + CatalogReader + Send + Sync + 'static,
{
    const SCENARIO: &str = "batch_writes_apply_in_order";

    let store = make_store();
    let product = contract_name(SCENARIO, PRODUCT)?;
    let id = contract_id(SCENARIO, "product");

    apply(SCENARIO, &store, vec![
        upsert(&product, &id, json!({ "id": id, "title": "first" }), UpsertMode::Replace),
        CatalogWrite::Delete {
            name: product.clone(),
            ids: vec![id.clone()],
        },
        upsert(&product, &id, json!({ "id": id, "title": "last" }), UpsertMode::Replace),
    ])
    .await?;

    let stored = stored_data(SCENARIO, &store, &product, &id).await?;
    if stored != Some(json!({ "id": id, "title": "last" })) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected the last write of the batch to win, observed {stored:?}"),
        ));
    }

    Ok(())
}

pub async fn test_failed_batch_commits_nothing<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: CatalogStore + CatalogReader + Send + Sync + 'static,
{
    const SCENARIO: &str = "failed_batch_commits_nothing";

    let store = make_store();
    let product = contract_name(SCENARIO, PRODUCT)?;
    let variant = contract_name(SCENARIO, VARIANT)?;
    let product_id = contract_id(SCENARIO, "product");
    let variant_id = contract_id(SCENARIO, "variant");
    let before = json!({ "id": product_id, "title": "before" });

    apply(SCENARIO, &store, vec![upsert(
        &product,
        &product_id,
        before.clone(),
        UpsertMode::Replace,
    )])
    .await?;

    // jsonb cannot store NUL, so the last write of the batch fails.
    let mut batch = ProjectionBatch::new();
    batch.push(upsert(
        &product,
        &product_id,
        json!({ "id": product_id, "title": "after" }),
        UpsertMode::Merge,
    ));
    batch.push(CatalogWrite::Relate(CatalogRelation::new(
        product_id.as_str(),
        product.clone(),
        variant_id.as_str(),
        variant.clone(),
    )));
    batch.push(upsert(
        &variant,
        &variant_id,
        json!({ "id": variant_id, "sku": "SKU\u{0}1" }),
        UpsertMode::Replace,
    ));

    if store.apply(batch).await.is_ok() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "a batch containing a NUL character must be rejected",
        ));
    }

    let stored = stored_data(SCENARIO, &store, &product, &product_id).await?;
    if stored != Some(before) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("earlier writes of the failed batch must roll back, observed {stored:?}"),
        ));
    }

    let edges = relations(SCENARIO, &store, &product, &product_id).await?;
    if !edges.is_empty() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("no relation of the failed batch may persist, observed {edges:?}"),
        ));
    }

    if stored_data(SCENARIO, &store, &variant, &variant_id).await?.is_some() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "the rejected row must not be stored",
        ));
    }

    Ok(())
}

pub async fn test_prepare_is_idempotent<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: CatalogStore + CatalogReader + Send + Sync + 'static,
{
    const SCENARIO: &str = "prepare_is_idempotent";

    let config: SchemaConfig = serde_json::from_value(json!({
        "entities": [
            { "alias": "prepared_parent", "entity": "ContractPreparedParent", "fields": ["id"] },
            {
                "alias": "prepared_child",
                "entity": "ContractPreparedChild",
                "fields": ["id", "prepared_parent.id"],
                "parents": [{ "alias": "prepared_parent" }]
            }
        ]
    }))
    .map_err(|error| ContractTestFailure::assertion(SCENARIO, error.to_string()))?;
    let schema = SchemaObjectRepresentation::from_config(config)
        .map_err(|error| ContractTestFailure::assertion(SCENARIO, error.to_string()))?;

    let store = make_store();
    for attempt in ["first", "second"] {
        store.prepare(&schema).await.map_err(|error| {
            ContractTestFailure::assertion(SCENARIO, format!("{attempt} prepare failed: {error}"))
        })?;
    }

    let parent = contract_name(SCENARIO, "ContractPreparedParent")?;
    let id = contract_id(SCENARIO, "parent");
    apply(SCENARIO, &store, vec![upsert(
        &parent,
        &id,
        json!({ "id": id }),
        UpsertMode::Replace,
    )])
    .await?;

    if stored_data(SCENARIO, &store, &parent, &id).await?.is_none() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "rows of a prepared entity must be readable",
        ));
    }

    Ok(())
}

#[macro_export]
macro_rules! catalog_store_contract_tests {
    (suite = $suite:ident, make_store = $make_store:expr $(,)?) => {
        #[allow(non_snake_case)]
        mod $suite {
            use $crate::contract::{
                test_batch_writes_apply_in_order, test_delete_cascades_relations,
                test_duplicate_relations_are_ignored, test_failed_batch_commits_nothing,
                test_merge_upsert_preserves_existing_fields, test_prepare_is_idempotent,
                test_replace_upsert_roundtrip,
            };

            #[tokio::test(flavor = "multi_thread")]
            async fn replace_upsert_roundtrip_contract() {
                test_replace_upsert_roundtrip($make_store)
                    .await
                    .expect("catalog store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn merge_upsert_preserves_existing_fields_contract() {
                test_merge_upsert_preserves_existing_fields($make_store)
                    .await
                    .expect("catalog store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn delete_cascades_relations_contract() {
                test_delete_cascades_relations($make_store)
                    .await
                    .expect("catalog store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn duplicate_relations_are_ignored_contract() {
                test_duplicate_relations_are_ignored($make_store)
                    .await
                    .expect("catalog store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn batch_writes_apply_in_order_contract() {
                test_batch_writes_apply_in_order($make_store)
                    .await
                    .expect("catalog store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn failed_batch_commits_nothing_contract() {
                test_failed_batch_commits_nothing($make_store)
                    .await
                    .expect("catalog store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn prepare_is_idempotent_contract() {
                test_prepare_is_idempotent($make_store)
                    .await
                    .expect("catalog store contract failed");
            }
        }
    };
}

pub use catalog_store_contract_tests;
