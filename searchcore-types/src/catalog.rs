//! Denormalized catalog rows and the write batches that maintain them.

use crate::schema::EntityName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Relation type identifier: `<parent_name>-<child_name>`.
pub fn pivot(parent: &EntityName, child: &EntityName) -> String {
    format!("{parent}-{child}")
}

/// One denormalized snapshot of one source entity instance.
///
/// `data` holds the entity's declared top-level fields and always contains
/// `id`; parent data lives in its own row, connected by a
/// [`CatalogRelation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Source entity id.
    pub id: String,
    /// Entity type; also the partition key.
    pub name: EntityName,
    /// Declared fields of the entity, `id` included.
    pub data: Map<String, Value>,
}

/// Directed edge "parent instance has child instance".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogRelation {
    pub parent_id: String,
    pub parent_name: EntityName,
    pub child_id: String,
    pub child_name: EntityName,
    /// `<parent_name>-<child_name>`, the partition key.
    pub pivot: String,
}

impl CatalogRelation {
    /// Build an edge, deriving its pivot from the two entity names.
    pub fn new(
        parent_id: impl Into<String>,
        parent_name: EntityName,
        child_id: impl Into<String>,
        child_name: EntityName,
    ) -> Self {
        let pivot = pivot(&parent_name, &child_name);
        Self {
            parent_id: parent_id.into(),
            parent_name,
            child_id: child_id.into(),
            child_name,
            pivot,
        }
    }

    /// Whether the row has `(id, name)` as either endpoint.
    pub fn touches(&self, name: &EntityName, id: &str) -> bool {
        (&self.parent_name == name && self.parent_id == id)
            || (&self.child_name == name && self.child_id == id)
    }
}

/// Conflict behaviour of a catalog upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Replace the stored `data` with the new one.
    Replace,
    /// Shallow-merge the new keys over the stored `data`.
    Merge,
}

/// A single storage mutation produced by the projector.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogWrite {
    /// Insert or update one catalog row.
    Upsert { entry: Catalog, mode: UpsertMode },
    /// Insert one relation edge; an identical edge is left as is.
    Relate(CatalogRelation),
    /// Delete catalog rows and every relation edge touching them.
    Delete { name: EntityName, ids: Vec<String> },
}

/// Writes of one projector invocation, committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionBatch {
    writes: Vec<CatalogWrite>,
}

impl ProjectionBatch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write; writes apply in push order.
    pub fn push(&mut self, write: CatalogWrite) {
        self.writes.push(write);
    }

    /// Number of writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the batch has no writes.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Writes in application order.
    pub fn writes(&self) -> &[CatalogWrite] {
        &self.writes
    }

    /// Consume the batch into its writes.
    pub fn into_writes(self) -> Vec<CatalogWrite> {
        self.writes
    }
}
