//! Pipeline registration, lookup and token minting.

use tracing::info;
use uuid::Uuid;

use crate::error::{is_unique_violation, ServiceError};
use crate::models::{Permission, Pipeline, Token};
use crate::store::{pipelines, tokens, Store};

/// Pipeline CRUD and token minting.
#[derive(Clone)]
pub struct PipelineService {
    store: Store,
}

impl PipelineService {
    /// Create a service backed by the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Register a new pipeline. Power users only.
    ///
    /// Pipeline identity is authored, not derived, so re-creating an
    /// existing name is a conflict rather than an idempotent success.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Forbidden`] for non-power-user credentials
    /// - [`ServiceError::MissingField`] when name, uri or version is
    ///   absent or empty
    /// - [`ServiceError::Conflict`] when the name is already registered
    pub async fn create_pipeline(
        &self,
        permission: &Permission,
        pipeline: &Pipeline,
    ) -> Result<Pipeline, ServiceError> {
        permission.require_power_user()?;

        let uri_missing = pipeline.uri.as_deref().is_none_or(str::is_empty);
        let version_missing = pipeline.version.as_deref().is_none_or(str::is_empty);
        if pipeline.name.is_empty() || uri_missing || version_missing {
            return Err(ServiceError::MissingField(
                "Pipeline must specify a name and URI and version".to_owned(),
            ));
        }

        let mut conn = self.store.pool().acquire().await?;
        match pipelines::insert(&mut conn, pipeline).await {
            Ok(row) => {
                info!(pipeline = %row.name, "pipeline created");
                Ok(row.into_model())
            }
            Err(e) if is_unique_violation(&e) => {
                Err(ServiceError::Conflict("Pipeline already exists".to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch one pipeline by name.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when no pipeline has that name.
    pub async fn get_pipeline(&self, name: &str) -> Result<Pipeline, ServiceError> {
        let mut conn = self.store.pool().acquire().await?;
        let row = pipelines::find_by_name(&mut conn, name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Pipeline '{name}' not found")))?;
        Ok(row.into_model())
    }

    /// List pipelines matching the AND of the supplied equality
    /// filters. Returns an empty list rather than an error when nothing
    /// matches.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn list_pipelines(
        &self,
        name: Option<&str>,
        uri: Option<&str>,
        version: Option<&str>,
    ) -> Result<Vec<Pipeline>, ServiceError> {
        let mut conn = self.store.pool().acquire().await?;
        let rows = pipelines::list(&mut conn, name, uri, version).await?;
        Ok(rows.into_iter().map(pipelines::PipelineRow::into_model).collect())
    }

    /// Mint a new token bound to a pipeline.
    ///
    /// The credential is 32 hex characters drawn from a random UUID.
    /// The string is returned exactly once, here; afterwards only its
    /// row id circulates.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when the pipeline does not exist.
    pub async fn mint_token(
        &self,
        pipeline_name: &str,
        description: &str,
    ) -> Result<Token, ServiceError> {
        let mut tx = self.store.pool().begin().await?;

        let row = pipelines::find_by_name(&mut tx, pipeline_name)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Pipeline '{pipeline_name}' not found"))
            })?;

        let token = Uuid::new_v4().simple().to_string();
        tokens::insert(&mut tx, row.pipeline_id, &token, description).await?;
        tx.commit().await?;

        info!(pipeline = %row.name, "token minted");
        Ok(Token {
            name: row.name,
            token,
            description: description.to_owned(),
        })
    }
}
