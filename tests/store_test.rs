//! Tests for `src/store/` — row-level locking behaviour and the raw
//! query layer that the services build on.

mod common;

use serde_json::json;
use sqlx::Acquire;

use porch::identity;
use porch::models::TaskStatus;
use porch::store::{events, pipelines, tasks, tokens};

use common::TestDb;

/// Insert a pipeline and `count` pending tasks, returning the pipeline id.
async fn seed_tasks(db: &TestDb, name: &str, count: i64) -> i64 {
    let mut conn = db.store.pool().acquire().await.expect("acquire");
    let pipeline = db.create_pipeline(name).await;
    let row = pipelines::find_by_name(&mut conn, &pipeline.name)
        .await
        .expect("find")
        .expect("exists");
    for i in 1..=count {
        let input = json!({"number": i});
        tasks::insert_pending(&mut conn, row.pipeline_id, &identity::fingerprint(&input), &input)
            .await
            .expect("insert task");
    }
    row.pipeline_id
}

#[tokio::test]
async fn claim_selection_skips_rows_locked_by_a_competitor() {
    let Some(db) = TestDb::new().await else { return };
    let pipeline_id = seed_tasks(&db, "p1", 3).await;

    let mut conn_a = db.store.pool().acquire().await.expect("acquire a");
    let mut conn_b = db.store.pool().acquire().await.expect("acquire b");
    let mut tx_a = conn_a.begin().await.expect("begin a");
    let mut tx_b = conn_b.begin().await.expect("begin b");

    // The first claimer locks the two oldest tasks; the second must
    // neither block nor see them.
    let locked_a = tasks::pending_for_claim(&mut tx_a, pipeline_id, 2)
        .await
        .expect("claim a");
    assert_eq!(locked_a.len(), 2);

    let locked_b = tasks::pending_for_claim(&mut tx_b, pipeline_id, 2)
        .await
        .expect("claim b");
    assert_eq!(locked_b.len(), 1);

    let ids_a: Vec<i64> = locked_a.iter().map(|t| t.task_id).collect();
    assert!(!ids_a.contains(&locked_b[0].task_id));

    tx_a.rollback().await.expect("rollback a");
    tx_b.rollback().await.expect("rollback b");
    db.finish().await;
}

#[tokio::test]
async fn released_locks_make_rows_claimable_again() {
    let Some(db) = TestDb::new().await else { return };
    let pipeline_id = seed_tasks(&db, "p1", 1).await;

    let mut conn = db.store.pool().acquire().await.expect("acquire");
    let mut tx = conn.begin().await.expect("begin");
    let locked = tasks::pending_for_claim(&mut tx, pipeline_id, 1)
        .await
        .expect("claim");
    assert_eq!(locked.len(), 1);
    tx.rollback().await.expect("rollback");

    // The rolled-back claim left no trace; the task is pending and free.
    let mut conn = db.store.pool().acquire().await.expect("acquire");
    let mut tx = conn.begin().await.expect("begin");
    let relocked = tasks::pending_for_claim(&mut tx, pipeline_id, 1)
        .await
        .expect("reclaim");
    assert_eq!(relocked.len(), 1);
    assert_eq!(relocked[0].state, "PENDING");
    tx.commit().await.expect("commit");
    db.finish().await;
}

#[tokio::test]
async fn pending_selection_is_fifo_and_ignores_other_states() {
    let Some(db) = TestDb::new().await else { return };
    let pipeline_id = seed_tasks(&db, "p1", 4).await;

    let mut conn = db.store.pool().acquire().await.expect("acquire");

    // Knock the oldest task out of the pending set.
    let mut tx = conn.begin().await.expect("begin");
    let oldest = tasks::pending_for_claim(&mut tx, pipeline_id, 1)
        .await
        .expect("select");
    tasks::set_state(&mut tx, oldest[0].task_id, TaskStatus::Done)
        .await
        .expect("set state");
    tx.commit().await.expect("commit");

    let mut tx = conn.begin().await.expect("begin");
    let remaining = tasks::pending_for_claim(&mut tx, pipeline_id, 10)
        .await
        .expect("select");
    tx.commit().await.expect("commit");

    let numbers: Vec<i64> = remaining
        .iter()
        .map(|t| t.definition["number"].as_i64().expect("number"))
        .collect();
    assert_eq!(numbers, vec![2, 3, 4]);
    db.finish().await;
}

#[tokio::test]
async fn task_rows_resolve_by_descriptor() {
    let Some(db) = TestDb::new().await else { return };
    let pipeline_id = seed_tasks(&db, "p1", 1).await;
    let descriptor = identity::fingerprint(&json!({"number": 1}));

    let mut conn = db.store.pool().acquire().await.expect("acquire");
    let row = tasks::find_by_descriptor(&mut conn, pipeline_id, &descriptor)
        .await
        .expect("query")
        .expect("row");
    assert_eq!(row.job_descriptor, descriptor);
    assert_eq!(row.definition, json!({"number": 1}));

    let missing = tasks::find_by_descriptor(&mut conn, pipeline_id, "0".repeat(64).as_str())
        .await
        .expect("query");
    assert!(missing.is_none());
    db.finish().await;
}

#[tokio::test]
async fn events_come_back_in_insertion_order() {
    let Some(db) = TestDb::new().await else { return };
    let pipeline_id = seed_tasks(&db, "p1", 1).await;
    let descriptor = identity::fingerprint(&json!({"number": 1}));

    let mut conn = db.store.pool().acquire().await.expect("acquire");
    let row = tasks::find_by_descriptor(&mut conn, pipeline_id, &descriptor)
        .await
        .expect("query")
        .expect("row");
    let token_id = tokens::insert(&mut conn, pipeline_id, "feedfacefeedfacefeedfacefeedface", "t")
        .await
        .expect("token");

    for change in ["Created", "Task claimed", "Task changed, new status DONE"] {
        events::append(&mut conn, row.task_id, token_id, change)
            .await
            .expect("append");
    }

    let recorded = events::for_descriptor(&mut conn, &descriptor)
        .await
        .expect("events");
    let changes: Vec<&str> = recorded.iter().map(|e| e.change.as_str()).collect();
    assert_eq!(
        changes,
        vec!["Created", "Task claimed", "Task changed, new status DONE"]
    );
    db.finish().await;
}

#[tokio::test]
async fn revocation_is_idempotent_and_keeps_the_first_timestamp() {
    let Some(db) = TestDb::new().await else { return };
    db.create_pipeline("p1").await;
    let bearer = db.seed_pipeline_token("p1").await;

    let mut conn = db.store.pool().acquire().await.expect("acquire");
    tokens::revoke(&mut conn, &bearer).await.expect("revoke");
    let first = tokens::find(&mut conn, &bearer)
        .await
        .expect("find")
        .expect("row")
        .date_revoked
        .expect("revoked");

    tokens::revoke(&mut conn, &bearer).await.expect("re-revoke");
    let second = tokens::find(&mut conn, &bearer)
        .await
        .expect("find")
        .expect("row")
        .date_revoked
        .expect("revoked");
    assert_eq!(first, second);
    db.finish().await;
}

#[tokio::test]
async fn duplicate_descriptor_inserts_violate_the_unique_constraint() {
    let Some(db) = TestDb::new().await else { return };
    let pipeline_id = seed_tasks(&db, "p1", 1).await;
    let input = json!({"number": 1});

    let mut conn = db.store.pool().acquire().await.expect("acquire");
    let err = tasks::insert_pending(
        &mut conn,
        pipeline_id,
        &identity::fingerprint(&input),
        &input,
    )
    .await
    .expect_err("duplicate");
    assert!(porch::error::is_unique_violation(&err));
    db.finish().await;
}
