/// Status model and database operations
///
/// Statuses form a small fixed vocabulary ([`DEFAULT_STATUSES`]). A status
/// cannot be deleted while any task references it (`ON DELETE RESTRICT`);
/// the attempt fails with a `QueryError` whose
/// [`is_foreign_key_violation`](crate::error::DataError::is_foreign_key_violation)
/// is true.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE status (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(50) UNIQUE NOT NULL
/// );
/// ```

use crate::db::executor::{Insertable, WriteOutcome};
use crate::db::session::RelationalSession;
use crate::db::statement::Statement;
use crate::error::DataResult;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

/// Status assigned to freshly created tasks
pub const STATUS_NEW: &str = "New";

/// Status for tasks being worked on
pub const STATUS_IN_PROGRESS: &str = "In Progress";

/// Status for finished tasks
pub const STATUS_COMPLETED: &str = "Completed";

/// The default vocabulary, in display order
pub const DEFAULT_STATUSES: [&str; 3] = [STATUS_NEW, STATUS_IN_PROGRESS, STATUS_COMPLETED];

/// Status row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Status {
    pub id: i32,
    pub name: String,
}

/// Input for creating a status
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewStatus {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

impl Insertable for NewStatus {
    const ENTITY: &'static str = "status";

    // The no-op update makes RETURNING yield the existing id on conflict
    fn insert_statement(&self) -> Statement {
        Statement::new(
            "INSERT INTO status (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id",
        )
        .bind(self.name.as_str())
    }
}

impl Status {
    /// Creates a status, or returns the existing one with the same name
    pub async fn create(session: &mut RelationalSession, data: NewStatus) -> DataResult<Self> {
        let id = session.insert(&data).await?;
        Ok(Self { id, name: data.name })
    }

    /// Ensures every status in [`DEFAULT_STATUSES`] exists
    ///
    /// Safe to run repeatedly; returns the rows in vocabulary order.
    pub async fn seed_defaults(session: &mut RelationalSession) -> DataResult<Vec<Self>> {
        let mut statuses = Vec::with_capacity(DEFAULT_STATUSES.len());
        for name in DEFAULT_STATUSES {
            statuses.push(
                Self::create(
                    session,
                    NewStatus {
                        name: name.to_string(),
                    },
                )
                .await?,
            );
        }
        info!(count = statuses.len(), "Default statuses in place");
        Ok(statuses)
    }

    /// Finds a status by ID
    pub async fn find_by_id(session: &mut RelationalSession, id: i32) -> DataResult<Option<Self>> {
        session
            .fetch_optional_as(&Statement::new("SELECT id, name FROM status WHERE id = $1").bind(id))
            .await
    }

    /// Finds a status by its unique name
    pub async fn find_by_name(session: &mut RelationalSession, name: &str) -> DataResult<Option<Self>> {
        session
            .fetch_optional_as(&Statement::new("SELECT id, name FROM status WHERE name = $1").bind(name))
            .await
    }

    /// Lists all statuses by id
    pub async fn list(session: &mut RelationalSession) -> DataResult<Vec<Self>> {
        session
            .fetch_as(&Statement::new("SELECT id, name FROM status ORDER BY id"))
            .await
    }

    /// Changes a status identifier; referencing tasks follow (`ON UPDATE CASCADE`)
    pub async fn update_id(session: &mut RelationalSession, id: i32, new_id: i32) -> DataResult<WriteOutcome> {
        session
            .write(&Statement::new("UPDATE status SET id = $2 WHERE id = $1").bind(id).bind(new_id))
            .await
    }

    /// Deletes a status
    ///
    /// # Errors
    ///
    /// Returns `QueryError` (foreign-key violation) while any task still
    /// references the status; nothing is changed in that case.
    pub async fn delete(session: &mut RelationalSession, id: i32) -> DataResult<WriteOutcome> {
        session
            .write(&Statement::new("DELETE FROM status WHERE id = $1").bind(id))
            .await
    }
}
