//! Schema representation of the indexed entity graph.
//!
//! The representation is built once from a [`SchemaConfig`] at startup and is
//! read-only afterwards. It describes which entities are projected into the
//! catalog, the fields each one carries, and how entities link to each other
//! through parent backlinks or link-module relationships.

use crate::catalog::pivot;
use crate::event::EventAction;
use crate::validation::is_identifier;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Storage name of an indexed entity (e.g. `Product`).
///
/// Entity names become catalog `name` values and partition names, so they are
/// limited to identifier characters and the Postgres identifier length.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 63, predicate = is_identifier),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EntityName(String);

/// Query-facing name of an indexed entity (e.g. `product`).
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 63, predicate = is_identifier),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EntityAlias(String);

/// Which end of a link entity a relationship descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipSide {
    /// Relationship at index 0.
    Parent,
    /// Relationship at index 1.
    Child,
}

impl fmt::Display for RelationshipSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipSide::Parent => write!(f, "parent"),
            RelationshipSide::Child => write!(f, "child"),
        }
    }
}

/// Deployment or configuration defect detected while handling the schema.
///
/// These errors are never transient: retrying the triggering event cannot
/// succeed until the configuration changes.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// An entity name or alias does not satisfy the identifier rules.
    #[error("invalid {kind} {value:?}: {detail}")]
    InvalidName {
        kind: &'static str,
        value: String,
        detail: String,
    },

    /// Two entities share the same alias.
    #[error("entity alias {alias} is declared more than once")]
    DuplicateAlias { alias: String },

    /// A dotted field or parent declaration references an alias that is not
    /// declared as a parent of the entity.
    #[error(
        "unable to parse data for {entity}: the parent schema object representation could not be found for the alias {alias}"
    )]
    UnknownParentAlias { entity: String, alias: String },

    /// A link entity does not declare both relationship descriptors.
    #[error("unable to handle link event for {entity}: expected 2 relationships, found {found}")]
    MissingRelationships { entity: String, found: usize },

    /// A relationship foreign key does not map to an entity through the
    /// linkable keys of its service.
    #[error(
        "unable to handle link event for {entity}: the {side} entity name could not be found using the linkable key {foreign_key} of the module {service_name}"
    )]
    UnresolvedLinkableKey {
        entity: String,
        side: RelationshipSide,
        service_name: String,
        foreign_key: String,
    },

    /// No entity is registered under the alias.
    #[error("no schema entity is registered under the alias {alias}")]
    UnknownEntity { alias: String },
}

/// Backlink target of a parent declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    /// Alias of the parent entity.
    pub alias: EntityAlias,
    /// Entity name of the parent.
    pub entity: EntityName,
}

/// A parent of an entity, as seen from the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaParentRepresentation {
    pub r#ref: ParentRef,
    /// Property under which the child appears on the parent.
    pub target_prop: String,
    /// Whether the parent holds a collection of this child.
    pub is_list: bool,
}

/// Link-module relationship descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Foreign key field on the link entity.
    pub foreign_key: String,
    /// Service owning the referenced entity.
    pub service_name: String,
}

/// Module-level settings of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Service that owns the entity.
    pub service_name: Option<String>,
    /// Index 0 is the parent side, index 1 the child side.
    pub relationships: Vec<Relationship>,
}

/// One indexed entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObjectEntityRepresentation {
    pub entity: EntityName,
    pub alias: EntityAlias,
    /// Ordered dotted field paths, e.g. `title` or `product.id`.
    pub fields: Vec<String>,
    /// Declared parents, in declaration order.
    pub parents: Vec<SchemaParentRepresentation>,
    pub module_config: ModuleConfig,
}

impl SchemaObjectEntityRepresentation {
    /// Link entities connect two entities of other modules.
    pub fn is_link(&self) -> bool {
        !self.module_config.relationships.is_empty()
    }

    /// The parent declared under `alias`.
    pub fn parent_by_alias(&self, alias: &str) -> Option<&SchemaParentRepresentation> {
        self.parents
            .iter()
            .find(|parent| parent.r#ref.alias.as_ref() == alias)
    }

    /// Event names this entity's handler listens to.
    pub fn event_names(&self) -> Vec<(EventAction, String)> {
        let actions: &[EventAction] = if self.is_link() {
            &[EventAction::Attached, EventAction::Detached]
        } else {
            &[
                EventAction::Created,
                EventAction::Updated,
                EventAction::Deleted,
            ]
        };

        actions
            .iter()
            .map(|action| (*action, format!("{}.{}", self.alias, action)))
            .collect()
    }
}

/// Per-service module configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceModuleConfig {
    /// Foreign key field name to the entity it references.
    pub linkable_keys: BTreeMap<String, EntityName>,
}

/// Resolved entity names and foreign keys of a link entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEndpoints<'a> {
    pub parent_entity: EntityName,
    pub parent_foreign_key: &'a str,
    pub child_entity: EntityName,
    pub child_foreign_key: &'a str,
}

/// Direction of a traversed relation, relative to the entity it starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationDirection {
    /// The target is a child: the start entity is `parent_*` in the relation row.
    Child,
    /// The target is a parent: the start entity is `child_*` in the relation row.
    Parent,
}

/// A relation step of a selection, resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelation<'a> {
    pub target: &'a SchemaObjectEntityRepresentation,
    pub direction: RelationDirection,
    /// Pivot of the relation rows to join.
    pub pivot: String,
    /// Whether the step yields a list.
    pub is_list: bool,
}

/// Serde form of the schema, supplied once at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Indexed entities.
    pub entities: Vec<EntityConfig>,
    /// Per-service settings, keyed by service name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

/// Serde form of one indexed entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Query-facing alias, also the event name prefix.
    pub alias: String,
    /// Entity type name.
    pub entity: String,
    /// Dotted field paths to index.
    pub fields: Vec<String>,
    #[serde(default)]
    pub parents: Vec<ParentConfig>,
    #[serde(default)]
    pub service_name: Option<String>,
    /// Link relationships; parent side first.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

/// Serde form of a parent declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentConfig {
    /// Alias of the parent entity.
    pub alias: String,
    /// Property on the parent; defaults to the child alias.
    #[serde(default)]
    pub target_prop: Option<String>,
    #[serde(default = "default_is_list")]
    pub is_list: bool,
}

/// Serde form of per-service settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Foreign key field name to the entity name it references.
    #[serde(default)]
    pub linkable_keys: BTreeMap<String, String>,
}

fn default_is_list() -> bool {
    true
}

/// Immutable description of every indexed entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaObjectRepresentation {
    entities: BTreeMap<EntityAlias, SchemaObjectEntityRepresentation>,
    services: BTreeMap<String, ServiceModuleConfig>,
}

fn entity_name(value: &str) -> Result<EntityName, ConfigurationError> {
    EntityName::try_new(value).map_err(|error| ConfigurationError::InvalidName {
        kind: "entity name",
        value: value.to_string(),
        detail: error.to_string(),
    })
}

fn entity_alias(value: &str) -> Result<EntityAlias, ConfigurationError> {
    EntityAlias::try_new(value).map_err(|error| ConfigurationError::InvalidName {
        kind: "entity alias",
        value: value.to_string(),
        detail: error.to_string(),
    })
}

impl SchemaObjectRepresentation {
    /// Build and validate the representation.
    pub fn from_config(config: SchemaConfig) -> Result<Self, ConfigurationError> {
        let mut services = BTreeMap::new();
        for (service_name, service) in config.services {
            let mut linkable_keys = BTreeMap::new();
            for (foreign_key, entity) in service.linkable_keys {
                let _ = linkable_keys.insert(foreign_key, entity_name(&entity)?);
            }
            let _ = services.insert(service_name, ServiceModuleConfig { linkable_keys });
        }

        let mut declared: BTreeMap<EntityAlias, EntityName> = BTreeMap::new();
        for entity in &config.entities {
            let alias = entity_alias(&entity.alias)?;
            let name = entity_name(&entity.entity)?;
            if declared.insert(alias, name).is_some() {
                return Err(ConfigurationError::DuplicateAlias {
                    alias: entity.alias.clone(),
                });
            }
        }

        let mut entities = BTreeMap::new();
        for entity in config.entities {
            let alias = entity_alias(&entity.alias)?;
            let name = entity_name(&entity.entity)?;

            let mut parents = Vec::with_capacity(entity.parents.len());
            for parent in entity.parents {
                let parent_alias = entity_alias(&parent.alias)?;
                let parent_entity = declared.get(&parent_alias).cloned().ok_or_else(|| {
                    ConfigurationError::UnknownParentAlias {
                        entity: entity.entity.clone(),
                        alias: parent.alias.clone(),
                    }
                })?;
                parents.push(SchemaParentRepresentation {
                    r#ref: ParentRef {
                        alias: parent_alias,
                        entity: parent_entity,
                    },
                    target_prop: parent
                        .target_prop
                        .unwrap_or_else(|| entity.alias.trim().to_string()),
                    is_list: parent.is_list,
                });
            }

            let representation = SchemaObjectEntityRepresentation {
                entity: name,
                alias: alias.clone(),
                fields: entity.fields,
                parents,
                module_config: ModuleConfig {
                    service_name: entity.service_name,
                    relationships: entity.relationships,
                },
            };
            let _ = entities.insert(alias, representation);
        }

        Ok(Self { entities, services })
    }

    /// Look up an entity by alias.
    pub fn entity(&self, alias: &str) -> Option<&SchemaObjectEntityRepresentation> {
        self.entities
            .iter()
            .find(|(key, _)| key.as_ref() == alias)
            .map(|(_, representation)| representation)
    }

    /// Look up an entity by entity name.
    pub fn entity_by_name(&self, name: &EntityName) -> Option<&SchemaObjectEntityRepresentation> {
        self.entities
            .values()
            .find(|representation| &representation.entity == name)
    }

    /// Every indexed entity, ordered by alias.
    pub fn entities(&self) -> impl Iterator<Item = &SchemaObjectEntityRepresentation> {
        self.entities.values()
    }

    /// Settings of a service.
    pub fn service(&self, service_name: &str) -> Option<&ServiceModuleConfig> {
        self.services.get(service_name)
    }

    /// Resolve both ends of a link entity through the linkable keys of the
    /// services named by its relationship descriptors.
    pub fn link_endpoints<'a>(
        &self,
        link: &'a SchemaObjectEntityRepresentation,
    ) -> Result<LinkEndpoints<'a>, ConfigurationError> {
        let relationships = &link.module_config.relationships;
        if relationships.len() < 2 {
            return Err(ConfigurationError::MissingRelationships {
                entity: link.entity.to_string(),
                found: relationships.len(),
            });
        }

        let resolve = |relationship: &Relationship, side: RelationshipSide| {
            self.service(&relationship.service_name)
                .and_then(|service| service.linkable_keys.get(&relationship.foreign_key))
                .cloned()
                .ok_or_else(|| ConfigurationError::UnresolvedLinkableKey {
                    entity: link.entity.to_string(),
                    side,
                    service_name: relationship.service_name.clone(),
                    foreign_key: relationship.foreign_key.clone(),
                })
        };

        let parent_entity = resolve(&relationships[0], RelationshipSide::Parent)?;
        let child_entity = resolve(&relationships[1], RelationshipSide::Child)?;

        Ok(LinkEndpoints {
            parent_entity,
            parent_foreign_key: &relationships[0].foreign_key,
            child_entity,
            child_foreign_key: &relationships[1].foreign_key,
        })
    }

    /// Resolve the relation reached by following `key` from `from`.
    ///
    /// Children are matched on the backlink's `target_prop`, parents on their
    /// alias. Link entities are reachable from their parent side under the
    /// link alias, and lead to their child side under the child's alias.
    pub fn resolve_relation<'a>(
        &'a self,
        from: &SchemaObjectEntityRepresentation,
        key: &str,
    ) -> Option<ResolvedRelation<'a>> {
        for candidate in self.entities.values() {
            for parent in &candidate.parents {
                if parent.r#ref.entity == from.entity && parent.target_prop == key {
                    return Some(ResolvedRelation {
                        target: candidate,
                        direction: RelationDirection::Child,
                        pivot: pivot(&from.entity, &candidate.entity),
                        is_list: parent.is_list,
                    });
                }
            }
        }

        if let Some(parent) = from.parent_by_alias(key) {
            let target = self.entity(key)?;
            return Some(ResolvedRelation {
                target,
                direction: RelationDirection::Parent,
                pivot: pivot(&parent.r#ref.entity, &from.entity),
                is_list: false,
            });
        }

        let target = self.entity(key)?;

        if target.is_link() {
            if let Ok(endpoints) = self.link_endpoints(target) {
                if endpoints.parent_entity == from.entity {
                    return Some(ResolvedRelation {
                        target,
                        direction: RelationDirection::Child,
                        pivot: pivot(&from.entity, &target.entity),
                        is_list: true,
                    });
                }
            }
        }

        if from.is_link() {
            if let Ok(endpoints) = self.link_endpoints(from) {
                if endpoints.child_entity == target.entity {
                    return Some(ResolvedRelation {
                        target,
                        direction: RelationDirection::Child,
                        pivot: pivot(&from.entity, &target.entity),
                        is_list: false,
                    });
                }
                if endpoints.parent_entity == target.entity {
                    return Some(ResolvedRelation {
                        target,
                        direction: RelationDirection::Parent,
                        pivot: pivot(&target.entity, &from.entity),
                        is_list: false,
                    });
                }
            }
        }

        None
    }

    /// Every entity name that can appear in the catalog.
    pub fn entity_names(&self) -> BTreeSet<EntityName> {
        let mut names: BTreeSet<EntityName> = self
            .entities
            .values()
            .map(|representation| representation.entity.clone())
            .collect();

        for representation in self.entities.values().filter(|r| r.is_link()) {
            if let Ok(endpoints) = self.link_endpoints(representation) {
                let _ = names.insert(endpoints.parent_entity);
                let _ = names.insert(endpoints.child_entity);
            }
        }

        names
    }

    /// Every `(parent, child)` entity pair that can appear as a relation.
    pub fn relation_pairs(&self) -> BTreeSet<(EntityName, EntityName)> {
        let mut pairs = BTreeSet::new();

        for representation in self.entities.values() {
            for parent in &representation.parents {
                let _ = pairs.insert((parent.r#ref.entity.clone(), representation.entity.clone()));
            }

            if representation.is_link() {
                if let Ok(endpoints) = self.link_endpoints(representation) {
                    let _ = pairs.insert((endpoints.parent_entity, representation.entity.clone()));
                    let _ = pairs.insert((representation.entity.clone(), endpoints.child_entity));
                }
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(alias: &str, name: &str, fields: &[&str], parents: &[&str]) -> EntityConfig {
        EntityConfig {
            alias: alias.to_string(),
            entity: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            parents: parents
                .iter()
                .map(|parent| ParentConfig {
                    alias: parent.to_string(),
                    target_prop: None,
                    is_list: true,
                })
                .collect(),
            service_name: None,
            relationships: Vec::new(),
        }
    }

    fn product_schema() -> SchemaObjectRepresentation {
        let mut variant = entity("variants", "ProductVariant", &["id", "sku", "product.id"], &[
            "product",
        ]);
        variant.parents[0].target_prop = Some("variants".to_string());

        let mut link = entity(
            "variant_price_set",
            "LinkProductVariantPriceSet",
            &["id", "variant_id", "price_set_id"],
            &[],
        );
        link.relationships = vec![
            Relationship {
                foreign_key: "variant_id".to_string(),
                service_name: "product".to_string(),
            },
            Relationship {
                foreign_key: "price_set_id".to_string(),
                service_name: "pricing".to_string(),
            },
        ];

        let config = SchemaConfig {
            entities: vec![
                entity("product", "Product", &["id", "title"], &[]),
                variant,
                entity("price_set", "PriceSet", &["id"], &[]),
                link,
            ],
            services: BTreeMap::from([
                (
                    "product".to_string(),
                    ServiceConfig {
                        linkable_keys: BTreeMap::from([(
                            "variant_id".to_string(),
                            "ProductVariant".to_string(),
                        )]),
                    },
                ),
                (
                    "pricing".to_string(),
                    ServiceConfig {
                        linkable_keys: BTreeMap::from([(
                            "price_set_id".to_string(),
                            "PriceSet".to_string(),
                        )]),
                    },
                ),
            ]),
        };

        SchemaObjectRepresentation::from_config(config).expect("valid schema")
    }

    #[test]
    fn from_config_resolves_parent_entities_by_alias() {
        let schema = product_schema();

        let variant = schema.entity("variants").expect("variant registered");

        assert_eq!(variant.parents.len(), 1);
        assert_eq!(variant.parents[0].r#ref.entity.as_ref(), "Product");
        assert_eq!(variant.parents[0].target_prop, "variants");
    }

    #[test]
    fn from_config_rejects_duplicate_aliases() {
        let config = SchemaConfig {
            entities: vec![
                entity("product", "Product", &["id"], &[]),
                entity("product", "OtherProduct", &["id"], &[]),
            ],
            services: BTreeMap::new(),
        };

        let error = SchemaObjectRepresentation::from_config(config).unwrap_err();

        assert_eq!(
            error,
            ConfigurationError::DuplicateAlias {
                alias: "product".to_string()
            }
        );
    }

    #[test]
    fn from_config_rejects_parents_that_are_not_declared() {
        let config = SchemaConfig {
            entities: vec![entity("variant", "ProductVariant", &["id"], &["product"])],
            services: BTreeMap::new(),
        };

        let error = SchemaObjectRepresentation::from_config(config).unwrap_err();

        assert!(matches!(error, ConfigurationError::UnknownParentAlias { .. }));
    }

    #[test]
    fn from_config_rejects_entity_names_with_sql_metacharacters() {
        let config = SchemaConfig {
            entities: vec![entity("product", "Product'--", &["id"], &[])],
            services: BTreeMap::new(),
        };

        let error = SchemaObjectRepresentation::from_config(config).unwrap_err();

        assert!(matches!(error, ConfigurationError::InvalidName { .. }));
    }

    #[test]
    fn link_endpoints_resolve_through_linkable_keys() {
        let schema = product_schema();
        let link = schema.entity("variant_price_set").expect("link registered");

        let endpoints = schema.link_endpoints(link).expect("endpoints resolve");

        assert_eq!(endpoints.parent_entity.as_ref(), "ProductVariant");
        assert_eq!(endpoints.parent_foreign_key, "variant_id");
        assert_eq!(endpoints.child_entity.as_ref(), "PriceSet");
        assert_eq!(endpoints.child_foreign_key, "price_set_id");
    }

    #[test]
    fn link_endpoints_report_the_unresolved_side() {
        let mut schema = product_schema();
        let _ = schema.services.remove("pricing");
        let link = schema.entity("variant_price_set").expect("link registered");

        let error = schema.link_endpoints(link).unwrap_err();

        assert!(matches!(
            error,
            ConfigurationError::UnresolvedLinkableKey {
                side: RelationshipSide::Child,
                ..
            }
        ));
    }

    #[test]
    fn resolve_relation_walks_children_parents_and_links() {
        let schema = product_schema();
        let product = schema.entity("product").expect("product");
        let variant = schema.entity("variants").expect("variant");
        let link = schema.entity("variant_price_set").expect("link");

        let to_variants = schema.resolve_relation(product, "variants").expect("child");
        assert_eq!(to_variants.direction, RelationDirection::Child);
        assert_eq!(to_variants.pivot, "Product-ProductVariant");
        assert!(to_variants.is_list);

        let to_product = schema.resolve_relation(variant, "product").expect("parent");
        assert_eq!(to_product.direction, RelationDirection::Parent);
        assert!(!to_product.is_list);

        let to_link = schema
            .resolve_relation(variant, "variant_price_set")
            .expect("link");
        assert_eq!(to_link.pivot, "ProductVariant-LinkProductVariantPriceSet");

        let to_price_set = schema.resolve_relation(link, "price_set").expect("link child");
        assert_eq!(to_price_set.pivot, "LinkProductVariantPriceSet-PriceSet");
        assert_eq!(to_price_set.direction, RelationDirection::Child);

        assert!(schema.resolve_relation(product, "price_set").is_none());
    }

    #[test]
    fn link_entities_listen_to_attach_and_detach_events() {
        let schema = product_schema();

        let link_events: Vec<String> = schema
            .entity("variant_price_set")
            .expect("link")
            .event_names()
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        let product_events: Vec<String> = schema
            .entity("product")
            .expect("product")
            .event_names()
            .into_iter()
            .map(|(_, name)| name)
            .collect();

        assert_eq!(
            link_events,
            vec!["variant_price_set.attached", "variant_price_set.detached"]
        );
        assert_eq!(
            product_events,
            vec!["product.created", "product.updated", "product.deleted"]
        );
    }

    #[test]
    fn relation_pairs_include_parent_backlinks_and_link_edges() {
        let schema = product_schema();

        let pairs: Vec<(String, String)> = schema
            .relation_pairs()
            .into_iter()
            .map(|(parent, child)| (parent.to_string(), child.to_string()))
            .collect();

        assert!(pairs.contains(&("Product".to_string(), "ProductVariant".to_string())));
        assert!(pairs.contains(&(
            "ProductVariant".to_string(),
            "LinkProductVariantPriceSet".to_string()
        )));
        assert!(pairs.contains(&(
            "LinkProductVariantPriceSet".to_string(),
            "PriceSet".to_string()
        )));
    }
}
