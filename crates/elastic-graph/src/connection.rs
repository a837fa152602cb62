//! Connection resolution.
//!
//! A [`ConnectionField`] is the per-document entry point: it owns the
//! backend pipeline, exposes the argument tree and resolves a request into a
//! [`ConnectionPage`] through a [`SearchClient`].

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::backends::{BackendPipeline, CONNECTION_ARGUMENTS, FilterBackend};
use crate::config::ConnectionSettings;
use crate::error::{ConfigurationError, GraphResult, SearchError, ValidationError};
use crate::pagination::{SliceArgs, connection_from_slice, plan_window};
use crate::registry::DocumentFields;
use crate::types::{
    ConnectionExtras, ConnectionPage, EsQuery, Node, QueryBuilder, SchemaArguments, SearchHit,
    SearchResponse,
};

/// The search engine collaborator.
///
/// Implementations own transport, retries and timeouts; errors are passed
/// through to the caller unchanged.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Runs a search body against `index`.
    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, SearchError>;

    /// Counts the documents matching a count body.
    async fn count(&self, index: &str, body: &Value) -> Result<u64, SearchError>;

    /// Fetches one document by identity.
    async fn get(&self, index: &str, id: &str) -> Result<Option<SearchHit>, SearchError>;
}

/// One queryable connection over a document index.
#[derive(Debug)]
pub struct ConnectionField {
    name: String,
    index: String,
    pipeline: BackendPipeline,
    settings: ConnectionSettings,
}

impl ConnectionField {
    /// Builds the pipeline for `backends` and computes the argument tree.
    pub fn new(
        name: impl Into<String>,
        index: impl Into<String>,
        backends: Vec<Box<dyn FilterBackend>>,
        document: &DocumentFields,
        settings: ConnectionSettings,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let pipeline = BackendPipeline::new(name.clone(), backends, document)?;
        Ok(Self {
            name,
            index: index.into(),
            pipeline,
            settings,
        })
    }

    /// Returns the connection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the engine index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns the pagination settings.
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Returns the backend pipeline.
    pub fn pipeline(&self) -> &BackendPipeline {
        &self.pipeline
    }

    /// Returns the argument tree for introspection.
    pub fn arguments(&self) -> &SchemaArguments {
        self.pipeline.arguments()
    }

    fn argument_map(args: &Value) -> Result<Map<String, Value>, ValidationError> {
        match args {
            Value::Object(map) => Ok(map.clone()),
            Value::Null => Ok(Map::new()),
            _ => Err(ValidationError::InvalidArgument {
                argument: "arguments".to_string(),
                message: "expected an object".to_string(),
            }),
        }
    }

    /// Splits validated arguments into pagination arguments and backend
    /// buckets.
    fn split_arguments(
        &self,
        args: &Value,
    ) -> Result<(Map<String, Value>, Map<String, Value>), ValidationError> {
        let args = Self::argument_map(args)?;
        self.pipeline.validate(&args)?;
        let (connection, buckets): (Map<String, Value>, Map<String, Value>) = args
            .into_iter()
            .partition(|(name, _)| CONNECTION_ARGUMENTS.contains(&name.as_str()));
        Ok((connection, buckets))
    }

    /// Compiles the search body for `args` without pagination.
    pub fn compile(&self, args: &Value) -> GraphResult<EsQuery> {
        let (_, buckets) = self.split_arguments(args)?;
        let builder = self
            .pipeline
            .apply(QueryBuilder::new(self.index.clone()), &buckets)?;
        Ok(builder.build())
    }

    /// Resolves one request.
    ///
    /// With an `id` argument the node is fetched directly and the backends
    /// do not run. Otherwise the matching documents are counted, the page
    /// window is planned from the count and only that window is searched.
    pub async fn resolve(
        &self,
        client: &dyn SearchClient,
        args: &Value,
    ) -> GraphResult<ConnectionPage> {
        let (connection_args, buckets) = self.split_arguments(args)?;
        let slice_args = SliceArgs::from_arguments(&connection_args, &self.settings)?;
        slice_args.validate(&self.name)?;

        if let Some(id) = connection_args.get("id").and_then(Value::as_str) {
            return self.resolve_id(client, id, &slice_args).await;
        }

        let mut builder = self
            .pipeline
            .apply(QueryBuilder::new(self.index.clone()), &buckets)?;

        let count_query = builder.build_count();
        tracing::debug!(
            connection = %self.name,
            index = %self.index,
            body = %count_query.body,
            "Counting documents"
        );
        let total = client
            .count(&self.index, &count_query.body)
            .await
            .map_err(|e| self.log_search_error("count", e))?;

        let list_length = i64::try_from(total).unwrap_or(i64::MAX);
        let bounds = plan_window(&slice_args, &self.name, list_length)?;
        builder.set_window(bounds.from(), bounds.len());

        let query = builder.build();
        tracing::debug!(
            connection = %self.name,
            index = %self.index,
            body = %query.body,
            "Searching documents"
        );
        let response = client
            .search(&self.index, &query.body)
            .await
            .map_err(|e| self.log_search_error("search", e))?;

        let extras = self.pipeline.alter_connection(&response);
        let outputs = self.pipeline.output_fields();
        let window = connection_from_slice(
            response.hits,
            &slice_args,
            &self.name,
            list_length,
            bounds.start_offset,
            None,
        )?
        .map(|hit| Node::from_hit(hit, outputs));

        Ok(ConnectionPage {
            window,
            total,
            extras,
        })
    }

    async fn resolve_id(
        &self,
        client: &dyn SearchClient,
        id: &str,
        slice_args: &SliceArgs,
    ) -> GraphResult<ConnectionPage> {
        let hit = client
            .get(&self.index, id)
            .await
            .map_err(|e| self.log_search_error("get", e))?;

        let hits: Vec<SearchHit> = hit.into_iter().collect();
        let total = hits.len() as u64;
        let window = connection_from_slice(hits, slice_args, &self.name, total as i64, 0, None)?
            .map(|hit| Node::from_hit(hit, self.pipeline.output_fields()));

        Ok(ConnectionPage {
            window,
            total,
            extras: ConnectionExtras::new(),
        })
    }

    fn log_search_error(&self, operation: &str, error: SearchError) -> SearchError {
        tracing::warn!(
            connection = %self.name,
            index = %self.index,
            operation,
            error = %error,
            "Search client failed"
        );
        error
    }
}
