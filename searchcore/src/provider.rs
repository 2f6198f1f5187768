//! The search provider: event consumption and the query facade.

use crate::bus::{EventBus, Subscriber};
use crate::consumer::normalize;
use crate::errors::SearchError;
use crate::projector::CatalogProjector;
use crate::query_builder::QueryBuilder;
use crate::readiness::ReadinessGate;
use futures::FutureExt;
use searchcore_types::{
    CatalogStore, ConfigurationError, EventAction, ProjectionBatch, QueryExecutor, QueryFormat,
    QueryOptions, RemoteQuery, RemoteQueryDescriptor, ResultRow, SchemaObjectEntityRepresentation,
    SchemaObjectRepresentation, SearchModuleOptions,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Projects domain events into the catalog and serves nested queries.
///
/// `S` is the catalog store (write side and, for queries, the executor) and
/// `R` the remote query collaborator used to refetch entity data.
pub struct SearchProvider<S, R> {
    store: S,
    remote_query: R,
    schema: Arc<SchemaObjectRepresentation>,
    ready: ReadinessGate,
}

impl<S, R> SearchProvider<S, R> {
    /// A provider over an already validated schema; the gate starts pending.
    pub fn new(store: S, remote_query: R, schema: Arc<SchemaObjectRepresentation>) -> Self {
        Self {
            store,
            remote_query,
            schema,
            ready: ReadinessGate::new(),
        }
    }

    /// Build the schema from the module options.
    pub fn from_options(
        store: S,
        remote_query: R,
        options: &SearchModuleOptions,
    ) -> Result<Self, SearchError> {
        let schema = options.build_schema().inspect_err(|error| {
            error!(error = %error, "[search.configuration] invalid schema configuration");
        })?;
        Ok(Self::new(store, remote_query, Arc::new(schema)))
    }

    /// The validated schema.
    pub fn schema(&self) -> &SchemaObjectRepresentation {
        &self.schema
    }

    /// The catalog store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The remote query collaborator.
    pub fn remote_query(&self) -> &R {
        &self.remote_query
    }

    /// Whether startup preparation succeeded.
    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }
}

impl<S: CatalogStore + Sync, R: Sync> SearchProvider<S, R> {
    /// Prepare storage and settle the readiness gate.
    ///
    /// A failure poisons the gate: every later event and query fails with
    /// [`SearchError::NotReady`] carrying the same reason. Once the gate has
    /// settled, later calls skip preparation and report the settled outcome.
    #[instrument(name = "search.on_application_start", skip(self))]
    pub async fn on_application_start(&self) -> Result<(), SearchError> {
        if self.ready.is_settled() {
            debug!("[search.on_application_start] readiness already settled");
            return self.ready.wait().await;
        }

        match self.store.prepare(&self.schema).await {
            Ok(()) => {
                if !self.ready.resolve() {
                    return self.ready.wait().await;
                }
                info!("[search.on_application_start] catalog storage prepared");
                Ok(())
            }
            Err(failure) => {
                error!(error = %failure, "[search.on_application_start] catalog storage preparation failed");
                if !self.ready.reject(failure.to_string()) {
                    return self.ready.wait().await;
                }
                Err(failure.into())
            }
        }
    }
}

impl<S: CatalogStore + Sync, R: RemoteQuery + Sync> SearchProvider<S, R> {
    /// Normalize, refetch and project one event for `entity`.
    #[instrument(
        name = "search.handle_event",
        skip(self, entity, payload),
        fields(entity = %entity.entity)
    )]
    pub async fn handle_event(
        &self,
        entity: &SchemaObjectEntityRepresentation,
        payload: Value,
        event_name: &str,
    ) -> Result<(), SearchError> {
        self.ready.wait().await?;

        let event = normalize(entity, payload, event_name)?;
        let Some(action) = event.action() else {
            debug!(action = %event.action, "[search.handle_event] ignoring unknown action");
            return Ok(());
        };
        if event.ids.is_empty() {
            debug!(%action, "[search.handle_event] event carries no ids");
            return Ok(());
        }

        let data = if action.requires_refetch() {
            self.remote_query
                .query(RemoteQueryDescriptor {
                    entry_point: entity.alias.to_string(),
                    fields: entity.fields.clone(),
                    ids: event.ids.clone(),
                })
                .await?
        } else {
            event
                .ids
                .iter()
                .map(|id| serde_json::json!({ "id": id }))
                .collect()
        };

        let batch = self.project(action, entity, &data)?;
        let writes = batch.len();
        if !batch.is_empty() {
            self.store.apply(batch).await?;
        }

        info!(
            %action,
            ids = event.ids.len(),
            writes,
            "[search.handle_event] event projected"
        );
        Ok(())
    }

    /// Build the writes for already refetched `data`, without applying them.
    pub fn project(
        &self,
        action: EventAction,
        entity: &SchemaObjectEntityRepresentation,
        data: &[Value],
    ) -> Result<ProjectionBatch, SearchError> {
        CatalogProjector::new(&self.schema)
            .project(action, entity, data)
            .inspect_err(|failure| {
                if let SearchError::Configuration(configuration) = failure {
                    error!(error = %configuration, "[search.project] schema configuration mismatch");
                }
            })
    }
}

impl<S, R> SearchProvider<S, R>
where
    S: CatalogStore + Send + Sync + 'static,
    R: RemoteQuery + Send + Sync + 'static,
{
    /// Subscriber handling every event of the entity registered under `alias`.
    pub fn consume_event(self: &Arc<Self>, alias: &str) -> Result<Subscriber, SearchError> {
        let entity = self
            .schema
            .entity(alias)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownEntity {
                alias: alias.to_string(),
            })?;
        let provider = Arc::clone(self);

        Ok(Arc::new(move |payload: Value, event_name: String| {
            let provider = Arc::clone(&provider);
            let entity = entity.clone();
            async move { provider.handle_event(&entity, payload, &event_name).await }.boxed()
        }))
    }

    /// Subscribe every schema entity to its event names on `bus`.
    #[instrument(name = "search.register_subscribers", skip(self, bus))]
    pub async fn register_subscribers(
        self: &Arc<Self>,
        bus: &dyn EventBus,
    ) -> Result<usize, SearchError> {
        let mut registered = 0;
        for entity in self.schema.entities() {
            let subscriber = self.consume_event(&entity.alias)?;
            for (_, event_name) in entity.event_names() {
                bus.subscribe(&event_name, Arc::clone(&subscriber)).await;
                registered += 1;
            }
        }
        info!(registered, "[search.register_subscribers] subscribers registered");
        Ok(registered)
    }
}

impl<S: QueryExecutor + Sync, R: Sync> SearchProvider<S, R> {
    /// Run `selection` and rebuild the nested result objects.
    #[instrument(name = "search.query", skip(self, selection, options))]
    pub async fn query(
        &self,
        selection: &QueryFormat,
        options: &QueryOptions,
    ) -> Result<Vec<Value>, SearchError> {
        self.ready.wait().await?;

        let builder = QueryBuilder::new(&self.schema, selection, options)?;
        let query = builder.build_query(
            options.has_pagination(),
            options.keep_filtered_entities,
        )?;
        let rows = self.store.execute(&query).await?;

        if options.keep_filtered_entities {
            return self.expand_filtered(&builder, selection, options, &rows).await;
        }
        Ok(builder.build_object_from_resultset(&rows))
    }

    /// Like [`query`](Self::query), always counting the total matches.
    #[instrument(name = "search.query_and_count", skip(self, selection, options))]
    pub async fn query_and_count(
        &self,
        selection: &QueryFormat,
        options: &QueryOptions,
    ) -> Result<(Vec<Value>, u64), SearchError> {
        self.ready.wait().await?;

        let builder = QueryBuilder::new(&self.schema, selection, options)?;
        let query = builder.build_query(true, options.keep_filtered_entities)?;
        let rows = self.store.execute(&query).await?;
        let count = builder.count(&rows);

        if options.keep_filtered_entities {
            let objects = self.expand_filtered(&builder, selection, options, &rows).await?;
            return Ok((objects, count));
        }
        Ok((builder.build_object_from_resultset(&rows), count))
    }

    /// Re-run the selection for exactly the returned root ids, without the
    /// `where` filters, so nested collections are complete.
    async fn expand_filtered(
        &self,
        builder: &QueryBuilder<'_>,
        selection: &QueryFormat,
        options: &QueryOptions,
        rows: &[ResultRow],
    ) -> Result<Vec<Value>, SearchError> {
        let ids = builder.root_ids(rows);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let expanded = QueryFormat {
            select: selection.select.clone(),
            filters: BTreeMap::from([(format!("{}.id", builder.entry_point()), Value::from(ids))]),
            join_where: selection.join_where.clone(),
        };
        let expanded_options = QueryOptions {
            order_by: options.order_by.clone(),
            ..QueryOptions::default()
        };

        let expanded_builder = QueryBuilder::new(&self.schema, &expanded, &expanded_options)?;
        let query = expanded_builder.build_query(false, false)?;
        let rows = self.store.execute(&query).await?;
        Ok(expanded_builder.build_object_from_resultset(&rows))
    }
}
