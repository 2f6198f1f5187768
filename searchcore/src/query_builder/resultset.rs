//! Folds flat join rows back into nested objects.

use super::{QueryBuilder, data_column, id_column};
use searchcore_types::ResultRow;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
struct Level {
    node: usize,
    items: Vec<Assembled>,
    positions: HashMap<String, usize>,
}

#[derive(Debug)]
struct Assembled {
    data: Map<String, Value>,
    children: Vec<Level>,
}

impl QueryBuilder<'_> {
    /// Rebuild the entry point objects in row order.
    ///
    /// Rows repeat a parent once per joined child, so every level is
    /// deduplicated by id. List relations become arrays (empty when nothing
    /// joined) and single relations an object or `null`.
    pub fn build_object_from_resultset(&self, rows: &[ResultRow]) -> Vec<Value> {
        let mut roots = self.level(0);
        for row in rows {
            self.fold(row, &mut roots);
        }
        roots
            .items
            .into_iter()
            .map(|item| self.finish(item))
            .collect()
    }

    /// Distinct root ids in row order.
    pub fn root_ids(&self, rows: &[ResultRow]) -> Vec<String> {
        let column = id_column(0);
        let mut seen = HashSet::new();
        rows.iter()
            .filter_map(|row| row.get(&column).and_then(Value::as_str))
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect()
    }

    /// Total match count carried by the counting form.
    pub fn count(&self, rows: &[ResultRow]) -> u64 {
        rows.first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    fn level(&self, node: usize) -> Level {
        Level {
            node,
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn fold(&self, row: &ResultRow, level: &mut Level) {
        let Some(id) = row.get(&id_column(level.node)).and_then(Value::as_str) else {
            return;
        };

        let position = match level.positions.get(id) {
            Some(position) => *position,
            None => {
                let data = self.project(level.node, id, row.get(&data_column(level.node)));
                let children = self.nodes[level.node]
                    .children
                    .iter()
                    .filter(|child| self.nodes[**child].selected)
                    .map(|child| self.level(*child))
                    .collect();
                level.items.push(Assembled { data, children });
                let _ = level.positions.insert(id.to_string(), level.items.len() - 1);
                level.items.len() - 1
            }
        };

        for child in &mut level.items[position].children {
            self.fold(row, child);
        }
    }

    fn project(&self, node: usize, id: &str, stored: Option<&Value>) -> Map<String, Value> {
        let stored = stored.and_then(Value::as_object);
        let fields = &self.nodes[node].fields;

        let mut object = match stored {
            Some(stored) if fields.is_empty() => stored.clone(),
            Some(stored) => fields
                .iter()
                .filter_map(|field| stored.get(field).map(|value| (field.clone(), value.clone())))
                .collect(),
            None => Map::new(),
        };
        let _ = object
            .entry("id")
            .or_insert_with(|| Value::String(id.to_string()));
        object
    }

    fn finish(&self, item: Assembled) -> Value {
        let mut object = item.data;
        for child in item.children {
            let node = &self.nodes[child.node];
            let is_list = node.relation.as_ref().is_some_and(|relation| relation.is_list);
            let mut values = child.items.into_iter().map(|item| self.finish(item));
            let value = if is_list {
                Value::Array(values.collect())
            } else {
                values.next().unwrap_or(Value::Null)
            };
            let _ = object.insert(node.key.clone(), value);
        }
        Value::Object(object)
    }
}
