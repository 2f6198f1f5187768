//! Declarative query vocabulary and the compiled statement handed to a
//! [`QueryExecutor`](crate::QueryExecutor).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Nested selection over the catalog.
///
/// `select` has a single top-level key, the entry point alias. Nested values
/// are `true` for a field of the enclosing entity or an object for a relation:
///
/// ```ignore
/// let selection = QueryFormat::new(json!({
///     "product": { "title": true, "variants": { "sku": true } }
/// }))
/// .with_where("product.variants.sku", json!({ "$like": "SHIRT-%" }));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFormat {
    /// Entry point alias mapped to its nested field selection.
    pub select: Map<String, Value>,
    /// Predicates restricting which rows match.
    #[serde(default, rename = "where")]
    pub filters: BTreeMap<String, Value>,
    /// Predicates applied to the join of the alias they target.
    #[serde(default)]
    pub join_where: BTreeMap<String, Value>,
}

impl QueryFormat {
    /// Build a selection from a JSON object; other values give an empty selection.
    pub fn new(select: Value) -> Self {
        let select = match select {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            select,
            filters: BTreeMap::new(),
            join_where: BTreeMap::new(),
        }
    }

    /// Add a `where` predicate on a dotted path such as `product.status`.
    pub fn with_where(mut self, path: impl Into<String>, value: Value) -> Self {
        let _ = self.filters.insert(path.into(), value);
        self
    }

    /// Add a predicate to the join of the relation the path names.
    pub fn with_join_where(mut self, path: impl Into<String>, value: Value) -> Self {
        let _ = self.join_where.insert(path.into(), value);
        self
    }

    /// The entry point alias, when the selection has exactly one root.
    pub fn entry_point(&self) -> Option<&str> {
        if self.select.len() == 1 {
            self.select.keys().next().map(String::as_str)
        } else {
            None
        }
    }
}

/// Sort direction, serialized as `ASC` / `DESC`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Ordering over a field of the entry point, e.g. `product.title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Dotted path, e.g. `product.title`.
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Paging, ordering and expansion options of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Root entities to skip.
    #[serde(default)]
    pub skip: Option<u64>,
    /// Maximum root entities to return.
    #[serde(default)]
    pub take: Option<u64>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    /// Re-expand the paged root entities with their full relation graph.
    #[serde(default)]
    pub keep_filtered_entities: bool,
}

impl QueryOptions {
    /// Options for one page of `take` roots after `skip`.
    pub fn paginated(skip: u64, take: u64) -> Self {
        Self {
            skip: Some(skip),
            take: Some(take),
            ..Self::default()
        }
    }

    /// Whether `skip` or `take` is set.
    pub fn has_pagination(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    TextArray(Vec<String>),
    Json(Value),
    BigInt(i64),
}

/// How a result column decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Nullable text id.
    Id,
    /// Nullable JSON object.
    Data,
    /// Non-null 64-bit count.
    Count,
}

/// Name and decoding of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Parameterized SQL over `catalog`/`catalog_relation`.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
    /// Result columns in select order.
    pub columns: Vec<ColumnSpec>,
}

/// One decoded result row keyed by column name.
pub type ResultRow = Map<String, Value>;
