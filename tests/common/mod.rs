//! Shared fixtures for database-backed integration tests.
//!
//! Suites are skipped unless `PORCH_TEST_DB_URL` points at a reachable
//! Postgres server. Every fixture deploys the schema into a fresh
//! randomly-named schema, so suites and tests can run concurrently
//! against one database.

// Not every suite uses every helper.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use tower::util::ServiceExt;
use uuid::Uuid;

use porch::auth::Validator;
use porch::http::AppState;
use porch::models::{Permission, Pipeline};
use porch::service::{PipelineService, TaskService};
use porch::store::{pipelines, Store};

/// A store connected to a throwaway schema.
pub struct TestDb {
    /// Store bound to this test's private schema.
    pub store: Store,
}

impl TestDb {
    /// Connect to the test database, or `None` when the environment
    /// does not provide one (the caller should then return early).
    pub async fn new() -> Option<Self> {
        let Ok(db_url) = std::env::var("PORCH_TEST_DB_URL") else {
            eprintln!("PORCH_TEST_DB_URL not set; skipping database test");
            return None;
        };

        let schema = format!("porch_test_{}", Uuid::new_v4().simple());
        let store = Store::connect(&db_url, &schema).await.expect("connect");
        store.deploy_schema().await.expect("deploy schema");
        Some(Self { store })
    }

    /// Task service handle over this store.
    pub fn tasks(&self) -> TaskService {
        TaskService::new(self.store.clone())
    }

    /// Pipeline service handle over this store.
    pub fn pipelines(&self) -> PipelineService {
        PipelineService::new(self.store.clone())
    }

    /// Gateway application over this store.
    pub fn app(&self) -> Router {
        porch::http::router(AppState::new(self.store.clone()))
    }

    /// Register a pipeline directly through the store.
    pub async fn create_pipeline(&self, name: &str) -> Pipeline {
        let mut conn = self.store.pool().acquire().await.expect("acquire");
        let pipeline = Pipeline {
            name: name.to_owned(),
            uri: Some(format!("http://example.com/{name}")),
            version: Some("1".to_owned()),
        };
        pipelines::insert(&mut conn, &pipeline)
            .await
            .expect("insert pipeline")
            .into_model()
    }

    /// Seed a power-user token (no pipeline binding) and return the
    /// bearer string.
    pub async fn seed_power_token(&self) -> String {
        let token = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO token (token, description) VALUES ($1, 'admin')")
            .bind(&token)
            .execute(self.store.pool())
            .await
            .expect("insert power token");
        token
    }

    /// Mint a regular token bound to a pipeline and return the bearer
    /// string.
    pub async fn seed_pipeline_token(&self, pipeline_name: &str) -> String {
        self.pipelines()
            .mint_token(pipeline_name, "test worker")
            .await
            .expect("mint token")
            .token
    }

    /// Resolve a bearer string into a permission, for direct service
    /// calls.
    pub async fn permission_for(&self, bearer: &str) -> Permission {
        Validator::new(self.store.clone())
            .token_to_permission(bearer)
            .await
            .expect("valid token")
    }

    /// Drop the throwaway schema. Call at the end of a test.
    pub async fn finish(self) {
        self.store.drop_schema().await.expect("drop schema");
    }
}

/// Drive one request through an in-process gateway and return the
/// status plus the parsed JSON body.
pub async fn request(
    app: Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).expect("serialize body")))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    };

    let response = app.oneshot(request).await.expect("run request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };
    (status, json)
}
