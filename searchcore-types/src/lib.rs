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

//! Shared vocabulary types and traits for the SearchCore catalog engine.
//!
//! This crate provides the foundational types that are shared between the
//! `searchcore` crate and storage adapters like `searchcore-postgres`.
//!
//! # Overview
//!
//! This crate contains:
//! - Schema: `SchemaObjectRepresentation`, `SchemaObjectEntityRepresentation`, `SchemaConfig`
//! - Rows: `Catalog`, `CatalogRelation`, `CatalogWrite`, `ProjectionBatch`
//! - Events: `EventAction`, `CanonicalEvent`
//! - Queries: `QueryFormat`, `QueryOptions`, `BuiltQuery`, `SqlParam`
//! - Traits: `CatalogStore`, `QueryExecutor`, `CatalogReader`, `RemoteQuery`
//! - Errors: `ConfigurationError`, `CatalogStoreError`, `RemoteQueryError`, `Operation`

mod catalog;
mod config;
mod event;
mod query;
mod remote;
mod schema;
mod store;
mod validation;

pub use catalog::{Catalog, CatalogRelation, CatalogWrite, ProjectionBatch, UpsertMode, pivot};
pub use config::SearchModuleOptions;
pub use event::{CanonicalEvent, EventAction};
pub use query::{
    BuiltQuery, ColumnKind, ColumnSpec, OrderBy, QueryFormat, QueryOptions, ResultRow,
    SortDirection, SqlParam,
};
pub use remote::{RemoteQuery, RemoteQueryDescriptor, RemoteQueryError};
pub use schema::{
    ConfigurationError, EntityAlias, EntityConfig, EntityName, LinkEndpoints, ModuleConfig,
    ParentConfig, ParentRef, RelationDirection, Relationship, RelationshipSide, ResolvedRelation,
    SchemaConfig, SchemaObjectEntityRepresentation, SchemaObjectRepresentation,
    SchemaParentRepresentation, ServiceConfig, ServiceModuleConfig,
};
pub use store::{CatalogReader, CatalogStore, CatalogStoreError, Operation, QueryExecutor};
