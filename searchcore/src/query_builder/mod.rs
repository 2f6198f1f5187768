//! Compiles declarative nested selections into one SQL statement over the
//! `catalog` and `catalog_relation` tables.
//!
//! A selection is planned as a tree of nodes, one per traversed relation.
//! Node `i` is joined as `catalog_relation r{i}` + `catalog t{i}` and its
//! columns are exposed as `c{i}_id` / `c{i}_data`. Every user supplied value,
//! JSON path, entity name and pivot is a bound parameter; the SQL text only
//! ever contains generated aliases.

mod filter;
mod resultset;

use searchcore_types::{
    BuiltQuery, ColumnKind, ColumnSpec, QueryFormat, QueryOptions, RelationDirection,
    ResolvedRelation, SchemaObjectEntityRepresentation, SchemaObjectRepresentation,
    SortDirection, SqlParam,
};
use serde_json::Value;
use thiserror::Error;

/// Reasons a selection cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryBuildError {
    #[error("a selection needs exactly one entry point, found {found}")]
    MissingEntryPoint { found: usize },

    #[error("no schema entity is registered under the entry point {alias}")]
    UnknownEntryPoint { alias: String },

    #[error("{entity} has no relation named {key}")]
    UnknownRelation { entity: String, key: String },

    #[error("invalid selection at {path}: {detail}")]
    InvalidSelection { path: String, detail: String },

    #[error("invalid filter at {path}: {detail}")]
    InvalidFilter { path: String, detail: String },

    #[error("unsupported filter operator {operator} at {path}")]
    UnknownOperator { path: String, operator: String },

    #[error("cannot order by {field}: only fields of the entry point are sortable")]
    InvalidOrderBy { field: String },
}

#[derive(Debug)]
struct PlanNode<'a> {
    /// Property name in the reconstructed object.
    key: String,
    /// Dotted path from the entry point.
    path: String,
    entity: &'a SchemaObjectEntityRepresentation,
    relation: Option<ResolvedRelation<'a>>,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Explicitly selected fields. Empty selects the full stored data.
    fields: Vec<String>,
    /// Filter-only joins are not returned.
    selected: bool,
}

#[derive(Debug, Clone)]
struct Predicate {
    node: usize,
    path: Vec<String>,
    source: String,
    value: Value,
}

#[derive(Debug, Default)]
struct Params(Vec<SqlParam>);

impl Params {
    fn bind(&mut self, param: SqlParam) -> String {
        self.0.push(param);
        format!("${}", self.0.len())
    }
}

fn direction_keyword(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

fn id_column(node: usize) -> String {
    format!("c{node}_id")
}

fn data_column(node: usize) -> String {
    format!("c{node}_data")
}

/// Planned selection, ready to render.
#[derive(Debug)]
pub struct QueryBuilder<'a> {
    schema: &'a SchemaObjectRepresentation,
    nodes: Vec<PlanNode<'a>>,
    filters: Vec<Predicate>,
    join_filters: Vec<Predicate>,
    order: Vec<(Vec<String>, SortDirection)>,
    skip: Option<u64>,
    take: Option<u64>,
}

impl<'a> QueryBuilder<'a> {
    /// Resolve `selection` and `options` against the schema.
    pub fn new(
        schema: &'a SchemaObjectRepresentation,
        selection: &QueryFormat,
        options: &QueryOptions,
    ) -> Result<Self, QueryBuildError> {
        let alias = selection
            .entry_point()
            .ok_or(QueryBuildError::MissingEntryPoint {
                found: selection.select.len(),
            })?;
        let root = schema
            .entity(alias)
            .ok_or_else(|| QueryBuildError::UnknownEntryPoint {
                alias: alias.to_string(),
            })?;

        let mut builder = Self {
            schema,
            nodes: vec![PlanNode {
                key: alias.to_string(),
                path: alias.to_string(),
                entity: root,
                relation: None,
                parent: None,
                children: Vec::new(),
                fields: Vec::new(),
                selected: true,
            }],
            filters: Vec::new(),
            join_filters: Vec::new(),
            order: Vec::new(),
            skip: options.skip,
            take: options.take,
        };

        if let Some(tree) = selection.select.get(alias) {
            builder.expand_selection(0, tree)?;
        }

        for (path, value) in &selection.filters {
            let predicate = builder.predicate(path, value)?;
            builder.filters.push(predicate);
        }

        for (path, value) in &selection.join_where {
            let predicate = builder.predicate(path, value)?;
            // The entry point has no join to narrow.
            if predicate.node == 0 {
                builder.filters.push(predicate);
            } else {
                builder.join_filters.push(predicate);
            }
        }

        for order in &options.order_by {
            let prefix = format!("{alias}.");
            let field = order
                .field
                .strip_prefix(&prefix)
                .unwrap_or(order.field.as_str());
            let (node, path) = builder
                .resolve_path(&format!("{alias}.{field}"))
                .map_err(|_| QueryBuildError::InvalidOrderBy {
                    field: order.field.clone(),
                })?;
            if node != 0 {
                return Err(QueryBuildError::InvalidOrderBy {
                    field: order.field.clone(),
                });
            }
            builder.order.push((path, order.direction));
        }

        Ok(builder)
    }

    /// Alias of the entry point entity.
    pub fn entry_point(&self) -> &str {
        &self.nodes[0].key
    }

    fn expand_selection(&mut self, node: usize, tree: &Value) -> Result<(), QueryBuildError> {
        let entries = match tree {
            Value::Bool(true) | Value::Null => return Ok(()),
            Value::Object(entries) => entries,
            other => {
                return Err(QueryBuildError::InvalidSelection {
                    path: self.nodes[node].path.clone(),
                    detail: format!("expected an object, found {other}"),
                });
            }
        };

        for (key, value) in entries {
            match value {
                Value::Bool(true) => {
                    if !self.nodes[node].fields.contains(key) {
                        self.nodes[node].fields.push(key.clone());
                    }
                }
                Value::Bool(false) => {}
                Value::Object(_) => {
                    let child = self.join(node, key, true)?;
                    self.expand_selection(child, value)?;
                }
                other => {
                    return Err(QueryBuildError::InvalidSelection {
                        path: format!("{}.{key}", self.nodes[node].path),
                        detail: format!("expected true or an object, found {other}"),
                    });
                }
            }
        }

        Ok(())
    }

    fn child(&self, node: usize, key: &str) -> Option<usize> {
        self.nodes[node]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].key == key)
    }

    fn join(&mut self, parent: usize, key: &str, selected: bool) -> Result<usize, QueryBuildError> {
        if let Some(existing) = self.child(parent, key) {
            self.nodes[existing].selected |= selected;
            return Ok(existing);
        }

        let from = self.nodes[parent].entity;
        let relation = self.schema.resolve_relation(from, key).ok_or_else(|| {
            QueryBuildError::UnknownRelation {
                entity: from.entity.to_string(),
                key: key.to_string(),
            }
        })?;

        let index = self.nodes.len();
        self.nodes.push(PlanNode {
            key: key.to_string(),
            path: format!("{}.{key}", self.nodes[parent].path),
            entity: relation.target,
            relation: Some(relation),
            parent: Some(parent),
            children: Vec::new(),
            fields: Vec::new(),
            selected,
        });
        self.nodes[parent].children.push(index);
        Ok(index)
    }

    /// Split a dotted path into the node it filters and the JSON path below it.
    ///
    /// Leading segments that name relations are joined; the last segment is
    /// always a field.
    fn resolve_path(&mut self, path: &str) -> Result<(usize, Vec<String>), QueryBuildError> {
        let segments: Vec<&str> = path.split('.').collect();
        let invalid = |detail: String| QueryBuildError::InvalidFilter {
            path: path.to_string(),
            detail,
        };

        if segments.len() < 2 || segments[0] != self.entry_point() {
            return Err(invalid(format!(
                "paths start at the entry point {} and name a field",
                self.entry_point()
            )));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid("empty path segment".to_string()));
        }

        let mut node = 0;
        let mut position = 1;
        while position + 1 < segments.len() {
            let key = segments[position];
            let joinable = self.child(node, key).is_some()
                || self
                    .schema
                    .resolve_relation(self.nodes[node].entity, key)
                    .is_some();
            if !joinable {
                break;
            }
            node = self.join(node, key, false)?;
            position += 1;
        }

        let json_path = segments[position..]
            .iter()
            .map(|segment| (*segment).to_string())
            .collect();
        Ok((node, json_path))
    }

    fn predicate(&mut self, path: &str, value: &Value) -> Result<Predicate, QueryBuildError> {
        let (node, json_path) = self.resolve_path(path)?;
        Ok(Predicate {
            node,
            path: json_path,
            source: path.to_string(),
            value: value.clone(),
        })
    }

    fn selected_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.selected)
            .map(|(index, _)| index)
    }

    fn data_columns(&self) -> (Vec<String>, Vec<ColumnSpec>) {
        let mut select = Vec::new();
        let mut columns = Vec::new();
        for index in self.selected_nodes() {
            select.push(format!("t{index}.id AS {}", id_column(index)));
            select.push(format!("t{index}.data AS {}", data_column(index)));
            columns.push(ColumnSpec {
                name: id_column(index),
                kind: ColumnKind::Id,
            });
            columns.push(ColumnSpec {
                name: data_column(index),
                kind: ColumnKind::Data,
            });
        }
        (select, columns)
    }

    fn render_from(&self, params: &mut Params) -> Result<String, QueryBuildError> {
        let mut sql = String::from("FROM catalog t0");

        for (index, node) in self.nodes.iter().enumerate() {
            let (Some(relation), Some(parent)) = (&node.relation, node.parent) else {
                continue;
            };
            let (near, far) = match relation.direction {
                RelationDirection::Child => ("parent_id", "child_id"),
                RelationDirection::Parent => ("child_id", "parent_id"),
            };

            let pivot = params.bind(SqlParam::Text(relation.pivot.clone()));
            sql.push_str(&format!(
                " LEFT JOIN catalog_relation r{index} ON r{index}.pivot = {pivot} AND r{index}.{near} = t{parent}.id"
            ));

            let name = params.bind(SqlParam::Text(node.entity.entity.to_string()));
            sql.push_str(&format!(
                " LEFT JOIN catalog t{index} ON t{index}.name = {name} AND t{index}.id = r{index}.{far}"
            ));

            for predicate in self.join_filters.iter().filter(|p| p.node == index) {
                sql.push_str(" AND ");
                sql.push_str(&filter::render(predicate, params)?);
            }
        }

        Ok(sql)
    }

    fn render_where(&self, params: &mut Params) -> Result<String, QueryBuildError> {
        let name = params.bind(SqlParam::Text(self.nodes[0].entity.entity.to_string()));
        let mut clauses = vec![format!("t0.name = {name}")];
        for predicate in &self.filters {
            clauses.push(filter::render(predicate, params)?);
        }
        Ok(format!("WHERE {}", clauses.join(" AND ")))
    }

    /// Root sort expressions, bound fresh for each use.
    fn sort_expressions(&self, params: &mut Params) -> Vec<String> {
        self.order
            .iter()
            .map(|(path, _)| {
                let path = params.bind(SqlParam::TextArray(path.clone()));
                format!("t0.data #> {path}")
            })
            .collect()
    }

    fn sort_keys(&self, qualifier: &str) -> Vec<String> {
        self.order
            .iter()
            .enumerate()
            .map(|(index, (_, direction))| {
                format!("{qualifier}s{index} {}", direction_keyword(*direction))
            })
            .collect()
    }

    /// Render the statement.
    ///
    /// Without pagination or the filtered-entities mode the statement is a
    /// plain join. Otherwise matching root ids are collected and sliced in
    /// `matched`/`page` CTEs and a `count` column carries the total; in the
    /// filtered-entities mode only the page ids are returned.
    pub fn build_query(
        &self,
        has_pagination: bool,
        keep_filtered_entities: bool,
    ) -> Result<BuiltQuery, QueryBuildError> {
        let mut params = Params::default();
        let (data_select, data_specs) = self.data_columns();

        if !has_pagination && !keep_filtered_entities {
            let from = self.render_from(&mut params)?;
            let filters = self.render_where(&mut params)?;
            let mut order: Vec<String> = self
                .sort_expressions(&mut params)
                .into_iter()
                .zip(&self.order)
                .map(|(expression, (_, direction))| {
                    format!("{expression} {}", direction_keyword(*direction))
                })
                .collect();
            order.extend(self.selected_nodes().map(|index| format!("t{index}.id")));

            return Ok(BuiltQuery {
                sql: format!(
                    "SELECT {} {from} {filters} ORDER BY {}",
                    data_select.join(", "),
                    order.join(", ")
                ),
                params: params.0,
                columns: data_specs,
            });
        }

        let matched = {
            let from = self.render_from(&mut params)?;
            let filters = self.render_where(&mut params)?;
            let keys: String = self
                .sort_expressions(&mut params)
                .iter()
                .enumerate()
                .map(|(index, expression)| format!(", {expression} AS s{index}"))
                .collect();
            format!("matched AS (SELECT DISTINCT t0.id AS id{keys} {from} {filters})")
        };

        let page = {
            let mut order = self.sort_keys("");
            order.push("id".to_string());
            let mut page = format!("page AS (SELECT * FROM matched ORDER BY {}", order.join(", "));
            if let Some(take) = self.take {
                let limit = params.bind(SqlParam::BigInt(i64::try_from(take).unwrap_or(i64::MAX)));
                page.push_str(&format!(" LIMIT {limit}"));
            }
            if let Some(skip) = self.skip {
                let offset = params.bind(SqlParam::BigInt(i64::try_from(skip).unwrap_or(i64::MAX)));
                page.push_str(&format!(" OFFSET {offset}"));
            }
            page.push(')');
            page
        };

        let totals = "totals AS (SELECT COUNT(*) AS count FROM matched)";
        let count_spec = ColumnSpec {
            name: "count".to_string(),
            kind: ColumnKind::Count,
        };

        if keep_filtered_entities {
            let mut order = self.sort_keys("page.");
            order.push("page.id".to_string());

            return Ok(BuiltQuery {
                sql: format!(
                    "WITH {matched}, {page}, {totals} SELECT totals.count AS count, page.id AS {} FROM totals LEFT JOIN page ON TRUE ORDER BY {}",
                    id_column(0),
                    order.join(", ")
                ),
                params: params.0,
                columns: vec![
                    count_spec,
                    ColumnSpec {
                        name: id_column(0),
                        kind: ColumnKind::Id,
                    },
                ],
            });
        }

        let from = self.render_from(&mut params)?;
        let filters = self.render_where(&mut params)?;
        let mut select = data_select;
        select.extend(
            self.sort_expressions(&mut params)
                .into_iter()
                .enumerate()
                .map(|(index, expression)| format!("{expression} AS s{index}")),
        );

        let mut order = self.sort_keys("q.");
        order.extend(self.selected_nodes().map(|index| format!("q.{}", id_column(index))));

        let mut columns = vec![count_spec];
        columns.extend(data_specs);

        Ok(BuiltQuery {
            sql: format!(
                "WITH {matched}, {page}, {totals} SELECT totals.count AS count, q.* FROM totals LEFT JOIN (SELECT {} {from} {filters} AND t0.id IN (SELECT id FROM page)) q ON TRUE ORDER BY {}",
                select.join(", "),
                order.join(", ")
            ),
            params: params.0,
            columns,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_schema::catalog_schema;
    use super::*;
    use searchcore_types::OrderBy;
    use serde_json::json;

    fn texts(query: &BuiltQuery) -> Vec<&str> {
        query
            .params
            .iter()
            .filter_map(|param| match param {
                SqlParam::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn plain_selection_joins_each_relation_through_its_pivot() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({
            "product": { "title": true, "variants": { "sku": true } }
        }));

        let builder = QueryBuilder::new(&schema, &selection, &QueryOptions::default())
            .expect("selection should plan");
        let query = builder.build_query(false, false).expect("query should render");

        assert!(query.sql.starts_with("SELECT t0.id AS c0_id, t0.data AS c0_data, t1.id AS c1_id"));
        assert!(query.sql.contains(
            "LEFT JOIN catalog_relation r1 ON r1.pivot = $1 AND r1.parent_id = t0.id"
        ));
        assert!(query.sql.contains("LEFT JOIN catalog t1 ON t1.name = $2 AND t1.id = r1.child_id"));
        assert!(query.sql.contains("WHERE t0.name = $3"));
        assert!(query.sql.ends_with("ORDER BY t0.id, t1.id"));
        assert_eq!(texts(&query), vec!["Product-ProductVariant", "ProductVariant", "Product"]);
        assert_eq!(query.columns.len(), 4);
    }

    #[test]
    fn parent_relations_join_from_the_child_side() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({ "variant": { "product": { "title": true } } }));

        let query = QueryBuilder::new(&schema, &selection, &QueryOptions::default())
            .and_then(|builder| builder.build_query(false, false))
            .expect("query should render");

        assert!(query.sql.contains("r1.child_id = t0.id"));
        assert!(query.sql.contains("t1.id = r1.parent_id"));
    }

    #[test]
    fn user_input_never_reaches_the_sql_text() {
        let schema = catalog_schema();
        let hostile = "x'); DROP TABLE catalog; --";
        let selection = QueryFormat::new(json!({ "product": { "variants": {} } }))
            .with_where("product.title", json!(hostile))
            .with_where("product.variants.sku", json!({ "$like": hostile }));

        let query = QueryBuilder::new(&schema, &selection, &QueryOptions::paginated(0, 5))
            .and_then(|builder| builder.build_query(true, false))
            .expect("query should render");

        assert!(!query.sql.contains("DROP"));
        assert!(!query.sql.contains("title"));
        assert!(!query.sql.contains("sku"));
        assert!(query.params.contains(&SqlParam::Json(json!(hostile))));
    }

    #[test]
    fn filter_paths_through_unselected_relations_add_joins() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({ "product": { "title": true } }))
            .with_where("product.variants.sku", json!("S-1"));

        let builder = QueryBuilder::new(&schema, &selection, &QueryOptions::default())
            .expect("selection should plan");
        let query = builder.build_query(false, false).expect("query should render");

        assert!(query.sql.contains("LEFT JOIN catalog t1"));
        assert!(!query.sql.contains("c1_id"));
        assert!(query.sql.contains("(t1.data #> $4) = $5"));
        assert!(query.params.contains(&SqlParam::TextArray(vec!["sku".to_string()])));
    }

    #[test]
    fn join_where_predicates_narrow_the_join_not_the_roots() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({ "product": { "variants": {} } }))
            .with_join_where("product.variants.sku", json!("S-1"));

        let query = QueryBuilder::new(&schema, &selection, &QueryOptions::default())
            .and_then(|builder| builder.build_query(false, false))
            .expect("query should render");

        assert!(query.sql.contains("t1.id = r1.child_id AND (t1.data #> $3) = $4"));
        assert!(query.sql.contains("WHERE t0.name = $5 ORDER BY"));
    }

    #[test]
    fn link_entities_are_reachable_from_their_parent_entity() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({
            "variant": { "variant_price_set": { "price_set": { "currency_code": true } } }
        }));

        let query = QueryBuilder::new(&schema, &selection, &QueryOptions::default())
            .and_then(|builder| builder.build_query(false, false))
            .expect("query should render");

        assert_eq!(
            texts(&query)[..4],
            [
                "ProductVariant-LinkProductVariantPriceSet",
                "LinkProductVariantPriceSet",
                "LinkProductVariantPriceSet-PriceSet",
                "PriceSet"
            ]
        );
        assert!(query.sql.contains("r2.parent_id = t1.id"));
    }

    #[test]
    fn pagination_slices_root_ids_and_counts_matches() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({ "product": { "variants": {} } }));
        let options = QueryOptions {
            skip: Some(10),
            take: Some(5),
            order_by: vec![OrderBy {
                field: "title".to_string(),
                direction: SortDirection::Desc,
            }],
            keep_filtered_entities: false,
        };

        let query = QueryBuilder::new(&schema, &selection, &options)
            .and_then(|builder| builder.build_query(true, false))
            .expect("query should render");

        assert!(query.sql.starts_with("WITH matched AS (SELECT DISTINCT t0.id AS id, t0.data #> $"));
        assert!(query.sql.contains("page AS (SELECT * FROM matched ORDER BY s0 DESC, id LIMIT $"));
        assert!(query.sql.contains("totals AS (SELECT COUNT(*) AS count FROM matched)"));
        assert!(query.sql.contains("AND t0.id IN (SELECT id FROM page)) q ON TRUE"));
        assert!(query.sql.ends_with("ORDER BY q.s0 DESC, q.c0_id, q.c1_id"));
        assert!(query.params.contains(&SqlParam::BigInt(5)));
        assert!(query.params.contains(&SqlParam::BigInt(10)));
        assert_eq!(query.columns[0].kind, ColumnKind::Count);
    }

    #[test]
    fn filtered_entities_mode_selects_only_page_ids() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({ "product": { "variants": {} } }))
            .with_where("product.variants.sku", json!("S-1"));
        let options = QueryOptions {
            take: Some(2),
            keep_filtered_entities: true,
            ..QueryOptions::default()
        };

        let query = QueryBuilder::new(&schema, &selection, &options)
            .and_then(|builder| builder.build_query(true, true))
            .expect("query should render");

        assert!(query.sql.ends_with(
            "SELECT totals.count AS count, page.id AS c0_id FROM totals LEFT JOIN page ON TRUE ORDER BY page.id"
        ));
        assert_eq!(
            query.columns,
            vec![
                ColumnSpec {
                    name: "count".to_string(),
                    kind: ColumnKind::Count
                },
                ColumnSpec {
                    name: "c0_id".to_string(),
                    kind: ColumnKind::Id
                },
            ]
        );
    }

    #[test]
    fn selection_requires_a_single_known_entry_point() {
        let schema = catalog_schema();
        let options = QueryOptions::default();

        let multiple = QueryFormat::new(json!({ "product": {}, "variant": {} }));
        assert_eq!(
            QueryBuilder::new(&schema, &multiple, &options).map(|_| ()),
            Err(QueryBuildError::MissingEntryPoint { found: 2 })
        );

        let unknown = QueryFormat::new(json!({ "collection": {} }));
        assert_eq!(
            QueryBuilder::new(&schema, &unknown, &options).map(|_| ()),
            Err(QueryBuildError::UnknownEntryPoint {
                alias: "collection".to_string()
            })
        );
    }

    #[test]
    fn unknown_relations_are_rejected() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({ "product": { "collection": { "title": true } } }));

        let error = QueryBuilder::new(&schema, &selection, &QueryOptions::default())
            .map(|_| ())
            .expect_err("collection is not related to product");

        assert_eq!(
            error,
            QueryBuildError::UnknownRelation {
                entity: "Product".to_string(),
                key: "collection".to_string()
            }
        );
    }

    #[test]
    fn filters_must_start_at_the_entry_point() {
        let schema = catalog_schema();
        let selection =
            QueryFormat::new(json!({ "product": {} })).with_where("variant.sku", json!("S-1"));

        let error = QueryBuilder::new(&schema, &selection, &QueryOptions::default())
            .map(|_| ())
            .expect_err("filter starts at another entity");

        assert!(matches!(error, QueryBuildError::InvalidFilter { .. }));
    }

    #[test]
    fn ordering_by_a_nested_field_is_rejected() {
        let schema = catalog_schema();
        let selection = QueryFormat::new(json!({ "product": { "variants": {} } }));
        let options = QueryOptions {
            order_by: vec![OrderBy {
                field: "variants.sku".to_string(),
                direction: SortDirection::Asc,
            }],
            ..QueryOptions::default()
        };

        let error = QueryBuilder::new(&schema, &selection, &options)
            .map(|_| ())
            .expect_err("nested order is not supported");

        assert_eq!(
            error,
            QueryBuildError::InvalidOrderBy {
                field: "variants.sku".to_string()
            }
        );
    }
}
