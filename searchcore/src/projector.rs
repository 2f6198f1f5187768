//! Turns canonical entity data into catalog writes.
//!
//! The projector is pure: every operation returns a [`ProjectionBatch`] which
//! the store applies inside a single transaction.

use crate::errors::SearchError;
use searchcore_types::{
    Catalog, CatalogRelation, CatalogWrite, ConfigurationError, EntityName, EventAction,
    ProjectionBatch, SchemaObjectEntityRepresentation, SchemaObjectRepresentation, UpsertMode,
};
use serde_json::{Map, Value};

/// Fields of an entity split by owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedData<'a> {
    /// Non-dotted fields, always led by `id`.
    pub own_properties: Vec<&'a str>,
    /// Dotted fields grouped by parent alias, in declaration order.
    pub parents: Vec<ParentProperties<'a>>,
}

/// Fields of one parent carried on the child's refetched data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentProperties<'a> {
    /// Parent alias, also the key of the nested object.
    pub alias: &'a str,
    pub entity: &'a EntityName,
    /// The parent's own fields carried by the child, always led by `id`.
    pub properties: Vec<&'a str>,
}

/// Split the declared fields of `entity` into own and parent-scoped fields.
pub fn parse_data(
    entity: &SchemaObjectEntityRepresentation,
) -> Result<ParsedData<'_>, ConfigurationError> {
    let mut own_properties = vec!["id"];
    let mut parents: Vec<ParentProperties<'_>> = Vec::new();

    for field in &entity.fields {
        let Some((alias, rest)) = field.split_once('.') else {
            if !own_properties.contains(&field.as_str()) {
                own_properties.push(field);
            }
            continue;
        };

        let parent = entity
            .parent_by_alias(alias)
            .ok_or_else(|| ConfigurationError::UnknownParentAlias {
                entity: entity.entity.to_string(),
                alias: alias.to_string(),
            })?;

        let index = match parents.iter().position(|group| group.alias == alias) {
            Some(index) => index,
            None => {
                parents.push(ParentProperties {
                    alias,
                    entity: &parent.r#ref.entity,
                    properties: vec!["id"],
                });
                parents.len() - 1
            }
        };

        // Deeper paths belong to the parent's own parents.
        if !rest.contains('.') && !parents[index].properties.contains(&rest) {
            parents[index].properties.push(rest);
        }
    }

    Ok(ParsedData {
        own_properties,
        parents,
    })
}

fn pick(instance: &Map<String, Value>, properties: &[&str]) -> Map<String, Value> {
    properties
        .iter()
        .filter_map(|property| {
            instance
                .get(*property)
                .map(|value| ((*property).to_string(), value.clone()))
        })
        .collect()
}

fn as_object<'v>(
    entity: &SchemaObjectEntityRepresentation,
    position: usize,
    value: &'v Value,
) -> Result<&'v Map<String, Value>, SearchError> {
    value.as_object().ok_or_else(|| SearchError::InvalidPayload {
        entity: entity.entity.to_string(),
        detail: format!("entry {position} is not an object"),
    })
}

fn string_field<'v>(
    entity: &SchemaObjectEntityRepresentation,
    instance: &'v Map<String, Value>,
    field: &str,
) -> Result<&'v str, SearchError> {
    instance
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| SearchError::InvalidPayload {
            entity: entity.entity.to_string(),
            detail: format!("missing string field {field}"),
        })
}

/// Builds projection batches against one schema.
#[derive(Debug, Clone, Copy)]
pub struct CatalogProjector<'a> {
    schema: &'a SchemaObjectRepresentation,
}

impl<'a> CatalogProjector<'a> {
    /// A projector over `schema`.
    pub fn new(schema: &'a SchemaObjectRepresentation) -> Self {
        Self { schema }
    }

    /// Dispatch to the operation handling `action`.
    pub fn project(
        &self,
        action: EventAction,
        entity: &SchemaObjectEntityRepresentation,
        data: &[Value],
    ) -> Result<ProjectionBatch, SearchError> {
        match action {
            EventAction::Created => self.on_create(entity, data),
            EventAction::Updated => self.on_update(entity, data),
            EventAction::Deleted => self.on_delete(entity, data),
            EventAction::Attached => self.on_attach(entity, data),
            EventAction::Detached => self.on_detach(entity, data),
        }
    }

    /// Write each instance's own row, a merged row per parent instance and
    /// the parent→child edges.
    pub fn on_create(
        &self,
        entity: &SchemaObjectEntityRepresentation,
        data: &[Value],
    ) -> Result<ProjectionBatch, SearchError> {
        let parsed = parse_data(entity)?;
        let mut batch = ProjectionBatch::new();

        for (position, value) in data.iter().enumerate() {
            let instance = as_object(entity, position, value)?;
            let id = string_field(entity, instance, "id")?;

            batch.push(CatalogWrite::Upsert {
                entry: Catalog {
                    id: id.to_string(),
                    name: entity.entity.clone(),
                    data: pick(instance, &parsed.own_properties),
                },
                mode: UpsertMode::Replace,
            });

            for parent in &parsed.parents {
                let parent_instances = match instance.get(parent.alias) {
                    None | Some(Value::Null) => continue,
                    Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
                    Some(single) => vec![single],
                };

                for parent_value in parent_instances {
                    let parent_instance = as_object(entity, position, parent_value)?;
                    let parent_id = string_field(entity, parent_instance, "id")?;

                    batch.push(CatalogWrite::Upsert {
                        entry: Catalog {
                            id: parent_id.to_string(),
                            name: parent.entity.clone(),
                            data: pick(parent_instance, &parent.properties),
                        },
                        mode: UpsertMode::Merge,
                    });
                    batch.push(CatalogWrite::Relate(CatalogRelation::new(
                        parent_id,
                        parent.entity.clone(),
                        id,
                        entity.entity.clone(),
                    )));
                }
            }
        }

        Ok(batch)
    }

    /// Replace each instance's own row. Relations are left untouched.
    pub fn on_update(
        &self,
        entity: &SchemaObjectEntityRepresentation,
        data: &[Value],
    ) -> Result<ProjectionBatch, SearchError> {
        let parsed = parse_data(entity)?;
        let mut batch = ProjectionBatch::new();

        for (position, value) in data.iter().enumerate() {
            let instance = as_object(entity, position, value)?;
            let id = string_field(entity, instance, "id")?;

            batch.push(CatalogWrite::Upsert {
                entry: Catalog {
                    id: id.to_string(),
                    name: entity.entity.clone(),
                    data: pick(instance, &parsed.own_properties),
                },
                mode: UpsertMode::Replace,
            });
        }

        Ok(batch)
    }

    /// Delete the rows of `data` and every edge touching them.
    pub fn on_delete(
        &self,
        entity: &SchemaObjectEntityRepresentation,
        data: &[Value],
    ) -> Result<ProjectionBatch, SearchError> {
        let ids = data
            .iter()
            .enumerate()
            .map(|(position, value)| {
                let instance = as_object(entity, position, value)?;
                string_field(entity, instance, "id").map(str::to_string)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut batch = ProjectionBatch::new();
        if !ids.is_empty() {
            batch.push(CatalogWrite::Delete {
                name: entity.entity.clone(),
                ids,
            });
        }
        Ok(batch)
    }

    /// Write the link row plus the parent→link and link→child edges.
    pub fn on_attach(
        &self,
        entity: &SchemaObjectEntityRepresentation,
        data: &[Value],
    ) -> Result<ProjectionBatch, SearchError> {
        let endpoints = self.schema.link_endpoints(entity)?;
        let parsed = parse_data(entity)?;
        let mut batch = ProjectionBatch::new();

        for (position, value) in data.iter().enumerate() {
            let instance = as_object(entity, position, value)?;
            let id = string_field(entity, instance, "id")?;
            let parent_id = string_field(entity, instance, endpoints.parent_foreign_key)?;
            let child_id = string_field(entity, instance, endpoints.child_foreign_key)?;

            batch.push(CatalogWrite::Upsert {
                entry: Catalog {
                    id: id.to_string(),
                    name: entity.entity.clone(),
                    data: pick(instance, &parsed.own_properties),
                },
                mode: UpsertMode::Replace,
            });
            batch.push(CatalogWrite::Relate(CatalogRelation::new(
                parent_id,
                endpoints.parent_entity.clone(),
                id,
                entity.entity.clone(),
            )));
            batch.push(CatalogWrite::Relate(CatalogRelation::new(
                id,
                entity.entity.clone(),
                child_id,
                endpoints.child_entity.clone(),
            )));
        }

        Ok(batch)
    }

    /// Remove the link rows and every edge touching them.
    pub fn on_detach(
        &self,
        entity: &SchemaObjectEntityRepresentation,
        data: &[Value],
    ) -> Result<ProjectionBatch, SearchError> {
        self.on_delete(entity, data)
    }
}
