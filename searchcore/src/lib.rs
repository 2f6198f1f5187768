#![forbid(unsafe_code)]
#![deny(
    bad_style,
    non_ascii_idents,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]

//! `SearchCore` - event-driven catalog projection and nested queries.
//!
//! The crate listens to domain change events, keeps a denormalized
//! `catalog` / `catalog_relation` projection of the indexed entities and
//! answers nested selections against it.
//!
//! # Overview
//!
//! - [`SearchProvider`]: consumes events and serves `query` / `query_and_count`
//! - [`CatalogProjector`]: turns entity data into a [`ProjectionBatch`]
//! - [`QueryBuilder`]: compiles a [`QueryFormat`] into one parameterized statement
//! - [`ReadinessGate`]: one-shot startup gate awaited by every entry point
//! - [`InMemoryEventBus`] and [`InMemoryCatalogStore`]: in-process backends
//!
//! Storage backends implement the traits of `searchcore-types`; the PostgreSQL
//! backend lives in `searchcore-postgres`.

mod bus;
mod consumer;
mod errors;
mod memory;
mod projector;
mod provider;
mod query_builder;
mod readiness;

pub use bus::{EventBus, InMemoryEventBus, Subscriber};
pub use consumer::normalize;
pub use errors::{ErrorCategory, SearchError};
pub use memory::InMemoryCatalogStore;
pub use projector::{CatalogProjector, ParentProperties, ParsedData, parse_data};
pub use provider::SearchProvider;
pub use query_builder::{QueryBuildError, QueryBuilder};
pub use readiness::ReadinessGate;

// Re-export the shared vocabulary so callers depend on one crate.
pub use searchcore_types::{
    BuiltQuery, CanonicalEvent, Catalog, CatalogReader, CatalogRelation, CatalogStore,
    CatalogStoreError, CatalogWrite, ColumnKind, ColumnSpec, ConfigurationError, EntityAlias,
    EntityName, EventAction, Operation, OrderBy, ProjectionBatch, QueryExecutor, QueryFormat,
    QueryOptions, RemoteQuery, RemoteQueryDescriptor, RemoteQueryError, ResultRow, SchemaConfig,
    SchemaObjectEntityRepresentation, SchemaObjectRepresentation, SearchModuleOptions,
    SortDirection, SqlParam, UpsertMode,
};
