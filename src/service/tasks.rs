//! Task lifecycle: idempotent creation, FIFO claiming, state updates,
//! listings and the per-task event history.
//!
//! Every mutating operation runs inside one transaction and appends its
//! audit events before committing, so side effects become observable
//! only after a successful commit.

use sqlx::Acquire;
use tracing::{debug, info};

use crate::error::{is_serialization_failure, is_unique_violation, ServiceError};
use crate::identity;
use crate::models::{Event, Permission, Pipeline, Task, TaskStatus};
use crate::store::{events, pipelines, tasks, Store};

/// Orchestrates create/update/claim against the store under permission
/// constraints.
#[derive(Clone)]
pub struct TaskService {
    store: Store,
}

impl TaskService {
    /// Create a service backed by the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a task, or return the existing one with the same input.
    ///
    /// The INSERT runs inside a savepoint: on a duplicate-descriptor
    /// violation the savepoint is rolled back, the surviving row is
    /// re-read, and the call reports `created = false`. Two machines
    /// racing to enqueue the same work therefore both observe success,
    /// and exactly one `Created` event is ever written.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Forbidden`] when the credentials are not
    ///   scoped to the task's pipeline
    /// - [`ServiceError::NotFound`] when the pipeline does not exist
    /// - [`ServiceError::InvalidArgument`] when `task_input` is not a
    ///   non-empty object
    pub async fn create_task(
        &self,
        permission: &Permission,
        task: &Task,
    ) -> Result<(Task, bool), ServiceError> {
        permission.authorize_for(&task.pipeline)?;
        check_task_input(&task.task_input)?;

        let mut tx = self.store.pool().begin().await?;
        let pipeline_row = find_pipeline(&mut tx, &task.pipeline.name).await?;
        let descriptor = identity::fingerprint(&task.task_input);

        let mut savepoint = tx.begin().await?;
        let inserted = tasks::insert_pending(
            &mut savepoint,
            pipeline_row.pipeline_id,
            &descriptor,
            &task.task_input,
        )
        .await;

        match inserted {
            Ok(row) => {
                events::append(
                    &mut savepoint,
                    row.task_id,
                    permission.requestor_id(),
                    "Created",
                )
                .await?;
                savepoint.commit().await?;
                tx.commit().await?;

                info!(pipeline = %pipeline_row.name, descriptor = %descriptor, "task created");
                Ok((row.into_model(pipeline_row.into_model())?, true))
            }
            Err(e) if is_unique_violation(&e) => {
                savepoint.rollback().await?;
                // Another submission won the race (or got here first);
                // serve the row it created.
                let row =
                    tasks::find_by_descriptor(&mut tx, pipeline_row.pipeline_id, &descriptor)
                        .await?
                        .ok_or(ServiceError::Database(sqlx::Error::RowNotFound))?;
                tx.commit().await?;

                debug!(pipeline = %pipeline_row.name, descriptor = %descriptor, "task already exists");
                Ok((row.into_model(pipeline_row.into_model())?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Claim up to `num_tasks` pending tasks of one pipeline, oldest
    /// first.
    ///
    /// The selection locks each chosen row at read time and skips rows
    /// locked by a competing claimer, so concurrent claims return
    /// disjoint sets without blocking each other. A commit that fails
    /// with a serialization conflict is absorbed into an empty result;
    /// the worker simply retries.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::InvalidArgument`] when `num_tasks < 1`
    /// - [`ServiceError::Forbidden`] for out-of-scope credentials
    /// - [`ServiceError::NotFound`] when the pipeline does not exist
    pub async fn claim_tasks(
        &self,
        permission: &Permission,
        pipeline: &Pipeline,
        num_tasks: i64,
    ) -> Result<Vec<Task>, ServiceError> {
        if num_tasks < 1 {
            return Err(ServiceError::InvalidArgument(
                "num_tasks must be a positive integer".to_owned(),
            ));
        }
        permission.authorize_for(pipeline)?;

        let mut tx = self.store.pool().begin().await?;
        let pipeline_row = find_pipeline(&mut tx, &pipeline.name).await?;

        let rows = tasks::pending_for_claim(&mut tx, pipeline_row.pipeline_id, num_tasks).await?;
        for row in &rows {
            tasks::set_state(&mut tx, row.task_id, TaskStatus::Claimed).await?;
            events::append(&mut tx, row.task_id, permission.requestor_id(), "Task claimed")
                .await?;
        }

        if let Err(e) = tx.commit().await {
            if is_serialization_failure(&e) {
                info!(pipeline = %pipeline_row.name, error = %e, "claim lost a serialization race");
                return Ok(Vec::new());
            }
            return Err(e.into());
        }

        debug!(pipeline = %pipeline_row.name, count = rows.len(), "tasks claimed");
        let model = pipeline_row.to_model();
        rows.into_iter()
            .map(|row| {
                let mut task = row.into_model(model.clone())?;
                task.status = Some(TaskStatus::Claimed);
                Ok(task)
            })
            .collect()
    }

    /// Overwrite the state of an existing task.
    ///
    /// The task is addressed by the fingerprint of the supplied input;
    /// neither the input nor the descriptor is mutable, so a payload
    /// whose input disagrees with the persisted document simply fails
    /// to find the task. Writing the current state again is allowed and
    /// still produces an event, which doubles as a heartbeat.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Forbidden`] for out-of-scope credentials
    /// - [`ServiceError::NotFound`] when the pipeline or task is absent
    /// - [`ServiceError::InvalidArgument`] when no status is supplied
    pub async fn update_task(
        &self,
        permission: &Permission,
        task: &Task,
    ) -> Result<Task, ServiceError> {
        permission.authorize_for(&task.pipeline)?;
        let new_status = task.status.ok_or_else(|| {
            ServiceError::InvalidArgument("a task update must supply a status".to_owned())
        })?;

        let mut tx = self.store.pool().begin().await?;
        let pipeline_row = find_pipeline(&mut tx, &task.pipeline.name).await?;

        let descriptor = identity::fingerprint(&task.task_input);
        let row = tasks::find_by_descriptor_for_update(
            &mut tx,
            pipeline_row.pipeline_id,
            &descriptor,
        )
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound("Task to be modified could not be found".to_owned())
        })?;

        tasks::set_state(&mut tx, row.task_id, new_status).await?;
        events::append(
            &mut tx,
            row.task_id,
            permission.requestor_id(),
            &format!("Task changed, new status {new_status}"),
        )
        .await?;
        tx.commit().await?;

        info!(pipeline = %pipeline_row.name, descriptor = %descriptor, status = %new_status, "task updated");
        let mut updated = row.into_model(pipeline_row.into_model())?;
        updated.status = Some(new_status);
        Ok(updated)
    }

    /// List tasks filtered by the AND of the supplied predicates.
    /// Result order is unspecified.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn list_tasks(
        &self,
        pipeline_name: Option<&str>,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Task>, ServiceError> {
        let mut conn = self.store.pool().acquire().await?;
        let rows = tasks::list(&mut conn, pipeline_name, status).await?;
        rows.into_iter()
            .map(|row| row.into_model().map_err(ServiceError::from))
            .collect()
    }

    /// All events recorded for the given task, in insertion order.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub async fn events_for_task(&self, task: &Task) -> Result<Vec<Event>, ServiceError> {
        let descriptor = task
            .task_input_id
            .clone()
            .unwrap_or_else(|| task.generate_task_id());

        let mut conn = self.store.pool().acquire().await?;
        let rows = events::for_descriptor(&mut conn, &descriptor).await?;
        Ok(rows.into_iter().map(events::EventRow::into_model).collect())
    }
}

/// Resolve a pipeline row by name or report it missing.
async fn find_pipeline(
    conn: &mut sqlx::PgConnection,
    name: &str,
) -> Result<pipelines::PipelineRow, ServiceError> {
    pipelines::find_by_name(conn, name)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Pipeline not found".to_owned()))
}

/// Task inputs must be non-empty objects; anything else cannot identify
/// a piece of work.
fn check_task_input(input: &serde_json::Value) -> Result<(), ServiceError> {
    match input {
        serde_json::Value::Object(map) if !map.is_empty() => Ok(()),
        _ => Err(ServiceError::InvalidArgument(
            "task_input must be a non-empty object".to_owned(),
        )),
    }
}
