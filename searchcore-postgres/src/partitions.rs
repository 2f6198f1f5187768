//! List partitions of `catalog` (by `name`) and `catalog_relation` (by `pivot`).
//!
//! Partition DDL cannot take bound parameters, so partition values are
//! inlined as quoted literals. Entity names are validated identifiers and
//! pivots join two of them with `-`, which keeps the literals plain.

use searchcore_types::{SchemaObjectRepresentation, pivot};

/// Longest identifier PostgreSQL keeps without truncating.
const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PartitionedTable {
    Catalog,
    Relation,
}

impl PartitionedTable {
    fn parent(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Relation => "catalog_relation",
        }
    }

    fn default_partition(self) -> &'static str {
        match self {
            Self::Catalog => "catalog_default",
            Self::Relation => "catalog_relation_default",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Catalog => "name",
            Self::Relation => "pivot",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Catalog => "cat_",
            Self::Relation => "cat_pivot_",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Partition {
    pub(crate) table: PartitionedTable,
    pub(crate) value: String,
    pub(crate) name: String,
}

impl Partition {
    fn new(table: PartitionedTable, value: String) -> Self {
        let name = partition_name(table, &value);
        Self { table, value, name }
    }

    /// Whether rows for the value already sit in the default partition.
    ///
    /// Attaching a partition over such rows fails, so those values stay in
    /// the default partition.
    pub(crate) fn occupied_sql(&self) -> String {
        format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1)",
            self.table.default_partition(),
            self.table.key()
        )
    }

    pub(crate) fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} PARTITION OF {} FOR VALUES IN ({})",
            quote_identifier(&self.name),
            self.table.parent(),
            quote_literal(&self.value)
        )
    }
}

/// `cat_<entity>` / `cat_pivot_<parent>_<child>`, lowercased.
///
/// Names are cut at the identifier limit; a value whose name collides with
/// an existing partition keeps living in the default partition.
pub(crate) fn partition_name(table: PartitionedTable, value: &str) -> String {
    let mut name: String = format!("{}{value}", table.prefix())
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    name.truncate(MAX_IDENTIFIER_LEN);
    name
}

/// Every partition the schema needs, catalog partitions first.
pub(crate) fn plan(schema: &SchemaObjectRepresentation) -> Vec<Partition> {
    let catalog = schema
        .entity_names()
        .into_iter()
        .map(|name| Partition::new(PartitionedTable::Catalog, name.to_string()));
    let relations = schema
        .relation_pairs()
        .into_iter()
        .map(|(parent, child)| Partition::new(PartitionedTable::Relation, pivot(&parent, &child)));
    catalog.chain(relations).collect()
}

fn quote_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
