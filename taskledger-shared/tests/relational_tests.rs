/// Integration tests for the relational data layer
///
/// These tests require a running PostgreSQL database.
/// Run with: cargo test --test relational_tests -- --test-threads=1
///
/// Connection settings come from environment variables, defaulting to a
/// local server:
/// export TASKLEDGER_TEST_PG_HOST=localhost
/// export TASKLEDGER_TEST_PG_PORT=5432
/// export TASKLEDGER_TEST_PG_DATABASE=taskledger_test
/// export TASKLEDGER_TEST_PG_USER=taskledger
/// export TASKLEDGER_TEST_PG_PASSWORD=taskledger

use futures::FutureExt;
use serde_json::json;
use std::env;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use taskledger_shared::config::PostgresConfig;
use taskledger_shared::db::executor::WriteOutcome;
use taskledger_shared::db::schema::{ensure_schema, schema_status, ReferentialAction};
use taskledger_shared::db::session::{with_session, RelationalSession};
use taskledger_shared::db::statement::Statement;
use taskledger_shared::error::DataError;
use taskledger_shared::models::status::{NewStatus, Status, STATUS_NEW};
use taskledger_shared::models::task::{NewTask, Task};
use taskledger_shared::models::user::{NewUser, User};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Helper to build the test database config from the environment
fn get_test_config() -> PostgresConfig {
    PostgresConfig {
        host: env::var("TASKLEDGER_TEST_PG_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: env::var("TASKLEDGER_TEST_PG_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432),
        database: env::var("TASKLEDGER_TEST_PG_DATABASE").unwrap_or_else(|_| "taskledger_test".to_string()),
        user: env::var("TASKLEDGER_TEST_PG_USER").unwrap_or_else(|_| "taskledger".to_string()),
        password: env::var("TASKLEDGER_TEST_PG_PASSWORD").unwrap_or_else(|_| "taskledger".to_string()),
    }
}

/// Suffix that keeps rows of concurrent tests apart
fn unique(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{}-{}-{}-{}", prefix, std::process::id(), nanos, COUNTER.fetch_add(1, Ordering::SeqCst))
}

async fn open_session() -> RelationalSession {
    let mut session = RelationalSession::connect(&get_test_config())
        .await
        .expect("Failed to connect to test database");
    ensure_schema(&mut session).await.expect("Failed to ensure schema");
    session
}

async fn create_user(session: &mut RelationalSession, name: &str) -> User {
    User::create(
        session,
        NewUser {
            fullname: name.to_string(),
            email: format!("{}@example.com", unique("user")),
        },
    )
    .await
    .expect("Failed to create user")
}

async fn create_status(session: &mut RelationalSession, prefix: &str) -> Status {
    Status::create(session, NewStatus { name: unique(prefix) })
        .await
        .expect("Failed to create status")
}

fn new_task(title: &str, status_id: i32, user_id: i32) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: None,
        status_id,
        user_id,
    }
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let mut session = open_session().await;

    ensure_schema(&mut session).await.expect("Second ensure_schema failed");
    ensure_schema(&mut session).await.expect("Third ensure_schema failed");

    let status = schema_status(&mut session).await.expect("Failed to read schema status");
    assert!(status.is_complete(), "Missing tables: {:?}", status.existing_tables);
    assert!(status.has_expected_rules(), "Unexpected rules: {:?}", status.task_foreign_keys);

    let fk = status.foreign_key("status_id").expect("status_id foreign key");
    assert_eq!(fk.on_delete, ReferentialAction::Restrict);
    assert_eq!(fk.on_update, ReferentialAction::Cascade);

    session.close().await;
}

#[tokio::test]
async fn test_deleting_user_cascades_to_tasks() {
    let mut session = open_session().await;

    let ann = create_user(&mut session, "Ann").await;
    let bob = create_user(&mut session, "Bob").await;
    let new = Status::create(
        &mut session,
        NewStatus {
            name: STATUS_NEW.to_string(),
        },
    )
    .await
    .expect("Failed to ensure New status");
    let task = Task::create(&mut session, new_task("T1", new.id, ann.id))
        .await
        .expect("Failed to create task");
    let other = Task::create(&mut session, new_task("T2", new.id, bob.id))
        .await
        .expect("Failed to create task");

    let outcome = User::delete(&mut session, ann.id).await.expect("Delete failed");
    assert_eq!(outcome, WriteOutcome { rows_affected: 1 });

    assert!(Task::find_by_id(&mut session, task.id).await.unwrap().is_none());
    assert!(Task::list_by_user(&mut session, ann.id).await.unwrap().is_empty());

    // Only the deleted user's tasks go
    let kept = Task::find_by_id(&mut session, other.id)
        .await
        .unwrap()
        .expect("Other user's task must survive");
    assert_eq!(kept.user_id, bob.id);
    assert_eq!(kept.title, "T2");

    User::delete(&mut session, bob.id).await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn test_deleting_referenced_status_is_restricted() {
    let mut session = open_session().await;

    let user = create_user(&mut session, "Restricted Owner").await;
    let status = create_status(&mut session, "restricted").await;
    Task::create(&mut session, new_task("Blocked", status.id, user.id))
        .await
        .expect("Failed to create task");

    let err = Status::delete(&mut session, status.id)
        .await
        .expect_err("Deleting a referenced status must fail");
    assert!(matches!(err, DataError::QueryError { .. }), "Unexpected error: {:?}", err);
    assert!(err.is_foreign_key_violation());

    // The failed statement was rolled back and the session is still usable
    let still_there = Status::find_by_id(&mut session, status.id).await.unwrap();
    assert_eq!(still_there, Some(status.clone()));

    User::delete(&mut session, user.id).await.unwrap();
    let outcome = Status::delete(&mut session, status.id).await.unwrap();
    assert!(outcome.applied());

    session.close().await;
}

#[tokio::test]
async fn test_updating_ids_cascades_to_tasks() {
    let mut session = open_session().await;

    let user = create_user(&mut session, "Renumbered").await;
    let status = create_status(&mut session, "renumbered").await;
    let task = Task::create(&mut session, new_task("Follow me", status.id, user.id))
        .await
        .unwrap();

    let new_user_id = user.id + 1_000_000;
    let new_status_id = status.id + 1_000_000;
    assert!(User::update_id(&mut session, user.id, new_user_id).await.unwrap().applied());
    assert!(Status::update_id(&mut session, status.id, new_status_id).await.unwrap().applied());

    let moved = Task::find_by_id(&mut session, task.id).await.unwrap().expect("task exists");
    assert_eq!(moved.user_id, new_user_id);
    assert_eq!(moved.status_id, new_status_id);

    User::delete(&mut session, new_user_id).await.unwrap();
    Status::delete(&mut session, new_status_id).await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn test_task_with_missing_references_is_rejected() {
    let mut session = open_session().await;

    let err = Task::create(&mut session, new_task("Orphan", -1, -1))
        .await
        .expect_err("Insert with dangling references must fail");
    assert!(err.is_foreign_key_violation());

    session.close().await;
}

#[tokio::test]
async fn test_read_returns_ordered_records() {
    let mut session = open_session().await;

    let empty = session
        .read(&Statement::new("SELECT id, fullname FROM users WHERE id = -1"))
        .await
        .unwrap();
    assert!(empty.is_empty());

    let user = create_user(&mut session, "Column Order").await;
    let rows = session
        .read(&Statement::new("SELECT email, fullname, id FROM users WHERE id = $1").bind(user.id))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    let columns: Vec<&str> = rows[0].columns().collect();
    assert_eq!(columns, ["email", "fullname", "id"]);
    assert_eq!(rows[0].get("fullname"), Some(&json!("Column Order")));
    assert_eq!(rows[0].get("id"), Some(&json!(user.id)));

    User::delete(&mut session, user.id).await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn test_write_miss_is_not_an_error() {
    let mut session = open_session().await;

    let outcome = User::update_fullname(&mut session, -1, "Nobody").await.unwrap();
    assert!(outcome.is_miss());

    let outcome = Task::delete(&mut session, -1).await.unwrap();
    assert_eq!(outcome.rows_affected, 0);

    session.close().await;
}

#[tokio::test]
async fn test_failed_statement_leaves_session_usable() {
    let mut session = open_session().await;

    let err = session
        .write(&Statement::new("UPDATE no_such_table SET x = 1"))
        .await
        .expect_err("Statement against a missing table must fail");
    assert!(matches!(err, DataError::QueryError { .. }));

    session.health_check().await.expect("Session should remain usable");
    session.close().await;
}

#[tokio::test]
async fn test_duplicate_email_is_unique_violation() {
    let mut session = open_session().await;

    let email = format!("{}@example.com", unique("dup"));
    let first = User::create(
        &mut session,
        NewUser {
            fullname: "First".to_string(),
            email: email.clone(),
        },
    )
    .await
    .unwrap();

    let err = User::create(
        &mut session,
        NewUser {
            fullname: "Second".to_string(),
            email,
        },
    )
    .await
    .expect_err("Duplicate email must fail");
    assert!(err.is_unique_violation());

    User::delete(&mut session, first.id).await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn test_batch_insert_commits_each_item() {
    let mut session = open_session().await;

    // Item 2 repeats item 0's email, so the batch stops after two commits
    let mut emails: Vec<String> = (0..4).map(|_| format!("{}@example.com", unique("batch"))).collect();
    emails[2] = emails[0].clone();

    let err = session
        .batch_insert(4, |index| NewUser {
            fullname: format!("Batch {}", index),
            email: emails[index].clone(),
        })
        .await
        .expect_err("Batch should stop at the duplicate");

    match &err {
        DataError::BatchInterrupted { entity, committed, .. } => {
            assert_eq!(*entity, "users");
            assert_eq!(*committed, 2);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    assert!(err.is_unique_violation());

    let survivor = User::find_by_email(&mut session, &emails[0]).await.unwrap();
    assert_eq!(survivor.map(|u| u.fullname), Some("Batch 0".to_string()));
    assert!(User::find_by_email(&mut session, &emails[3]).await.unwrap().is_none());

    for email in &emails[..2] {
        let user = User::find_by_email(&mut session, email)
            .await
            .unwrap()
            .expect("Committed batch user");
        User::delete(&mut session, user.id).await.unwrap();
    }

    session.close().await;
}

#[tokio::test]
async fn test_read_decodes_numeric_temporal_and_uuid_columns() {
    let mut session = open_session().await;
    let user = create_user(&mut session, "Typed Columns").await;

    let rows = session
        .read(
            &Statement::new(
                r#"
                SELECT AVG(id) AS avg_id,
                       now() AS at,
                       1.5 AS ratio,
                       CAST(NULL AS NUMERIC) AS missing,
                       DATE '2024-02-29' AS day,
                       TIMESTAMP '2024-02-29 13:45:00' AS local_at,
                       TIME '07:30:00' AS alarm,
                       CAST('a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11' AS UUID) AS token
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(user.id),
        )
        .await
        .expect("Typed columns must decode");

    assert_eq!(rows.len(), 1);
    let row = &rows[0];

    let avg = row.get("avg_id").and_then(|v| v.as_str()).expect("avg_id as text");
    assert_eq!(avg.parse::<f64>().unwrap(), f64::from(user.id));
    assert_eq!(row.get("ratio"), Some(&json!("1.5")));
    assert_eq!(row.get("missing"), Some(&serde_json::Value::Null));

    let at = row.get("at").and_then(|v| v.as_str()).expect("at as text");
    assert!(at.contains('T'), "Expected RFC 3339 timestamp, got {}", at);

    assert_eq!(row.get("day"), Some(&json!("2024-02-29")));
    assert_eq!(row.get("local_at"), Some(&json!("2024-02-29 13:45:00")));
    assert_eq!(row.get("alarm"), Some(&json!("07:30:00")));
    assert_eq!(row.get("token"), Some(&json!("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11")));

    User::delete(&mut session, user.id).await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn test_invalid_entity_never_reaches_database() {
    let mut session = open_session().await;

    let err = User::create(
        &mut session,
        NewUser {
            fullname: "Bad Email".to_string(),
            email: "not-an-email".to_string(),
        },
    )
    .await
    .expect_err("Invalid email must be rejected");
    assert!(matches!(err, DataError::ValidationError(_)));

    session.close().await;
}

#[tokio::test]
async fn test_with_session_returns_closure_result() {
    let count = with_session(&get_test_config(), |session| {
        async move {
            ensure_schema(session).await?;
            User::count(session).await
        }
        .boxed()
    })
    .await
    .expect("Scoped session failed");

    assert!(count >= 0);
}

#[tokio::test]
async fn test_with_session_propagates_closure_error() {
    let result: Result<(), DataError> = with_session(&get_test_config(), |session| {
        async move {
            session.read(&Statement::new("SELECT * FROM no_such_table")).await?;
            Ok(())
        }
        .boxed()
    })
    .await;

    assert!(matches!(result, Err(DataError::QueryError { .. })));
}

#[tokio::test]
async fn test_connect_with_bad_credentials() {
    let config = PostgresConfig {
        password: "definitely-wrong".to_string(),
        user: "no_such_user".to_string(),
        ..get_test_config()
    };

    let result = RelationalSession::connect(&config).await;
    assert!(matches!(result, Err(DataError::ConnectionError(_))));
}
