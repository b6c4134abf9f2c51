/// Task model and database operations
///
/// Every task has exactly one status and exactly one owning user at all
/// times. Both references are foreign keys checked by PostgreSQL, so an
/// insert or update pointing at a missing row fails with a `QueryError`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id SERIAL PRIMARY KEY,
///     title VARCHAR(100) NOT NULL,
///     description TEXT,
///     status_id INTEGER NOT NULL REFERENCES status (id)
///         ON DELETE RESTRICT ON UPDATE CASCADE,
///     user_id INTEGER NOT NULL REFERENCES users (id)
///         ON DELETE CASCADE ON UPDATE CASCADE
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskledger_shared::db::session::RelationalSession;
/// use taskledger_shared::models::task::{NewTask, Task};
///
/// # async fn example(session: &mut RelationalSession) -> Result<(), taskledger_shared::error::DataError> {
/// let task = Task::create(session, NewTask {
///     title: "Report".to_string(),
///     description: Some("Print the report in three copies".to_string()),
///     status_id: 1,
///     user_id: 60,
/// })
/// .await?;
///
/// let outcome = Task::update_status(session, task.id, "In Progress").await?;
/// assert!(outcome.applied());
/// # Ok(())
/// # }
/// ```

use crate::db::executor::{Insertable, WriteOutcome};
use crate::db::session::RelationalSession;
use crate::db::statement::Statement;
use crate::error::DataResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

const TASK_COLUMNS: &str = "id, title, description, status_id, user_id";

/// Task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: i32,
    pub title: String,

    /// Free text; may be absent or blank
    pub description: Option<String>,

    pub status_id: i32,
    pub user_id: i32,
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTask {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    pub description: Option<String>,
    pub status_id: i32,
    pub user_id: i32,
}

impl Insertable for NewTask {
    const ENTITY: &'static str = "tasks";

    fn insert_statement(&self) -> Statement {
        Statement::new(
            "INSERT INTO tasks (title, description, status_id, user_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(self.title.as_str())
        .bind(self.description.as_deref())
        .bind(self.status_id)
        .bind(self.user_id)
    }
}

impl Task {
    /// Creates a task
    ///
    /// # Errors
    ///
    /// Returns `QueryError` (foreign-key violation) if the status or user
    /// does not exist.
    pub async fn create(session: &mut RelationalSession, data: NewTask) -> DataResult<Self> {
        let id = session.insert(&data).await?;
        Ok(Self {
            id,
            title: data.title,
            description: data.description,
            status_id: data.status_id,
            user_id: data.user_id,
        })
    }

    /// Finds a task by ID
    pub async fn find_by_id(session: &mut RelationalSession, id: i32) -> DataResult<Option<Self>> {
        session
            .fetch_optional_as(
                &Statement::new(format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS)).bind(id),
            )
            .await
    }

    /// Tasks owned by a user, by id
    pub async fn list_by_user(session: &mut RelationalSession, user_id: i32) -> DataResult<Vec<Self>> {
        session
            .fetch_as(
                &Statement::new(format!(
                    "SELECT {} FROM tasks WHERE user_id = $1 ORDER BY id",
                    TASK_COLUMNS
                ))
                .bind(user_id),
            )
            .await
    }

    /// Tasks whose status has the given name
    pub async fn list_by_status_name(session: &mut RelationalSession, status: &str) -> DataResult<Vec<Self>> {
        session
            .fetch_as(
                &Statement::new(
                    r#"
                    SELECT t.id, t.title, t.description, t.status_id, t.user_id
                    FROM tasks t
                    JOIN status s ON s.id = t.status_id
                    WHERE s.name = $1
                    ORDER BY t.id
                    "#,
                )
                .bind(status),
            )
            .await
    }

    /// Counts the tasks owned by a user
    pub async fn count_for_user(session: &mut RelationalSession, user_id: i32) -> DataResult<i64> {
        let rows: Vec<(i64,)> = session
            .fetch_as(&Statement::new("SELECT COUNT(*) FROM tasks WHERE user_id = $1").bind(user_id))
            .await?;
        Ok(rows.first().map(|(n,)| *n).unwrap_or(0))
    }

    /// Moves a task to the status with the given name
    ///
    /// A missing task is a logical miss. An unknown status name resolves to
    /// NULL and is refused by the `NOT NULL` constraint (`QueryError`).
    pub async fn update_status(
        session: &mut RelationalSession,
        id: i32,
        status: &str,
    ) -> DataResult<WriteOutcome> {
        session
            .write(
                &Statement::new(
                    "UPDATE tasks SET status_id = (SELECT id FROM status WHERE name = $2) WHERE id = $1",
                )
                .bind(id)
                .bind(status),
            )
            .await
    }

    /// Deletes a task
    pub async fn delete(session: &mut RelationalSession, id: i32) -> DataResult<WriteOutcome> {
        session
            .write(&Statement::new("DELETE FROM tasks WHERE id = $1").bind(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::statement::SqlParam;

    #[test]
    fn test_missing_description_binds_null() {
        let task = NewTask {
            title: "T1".to_string(),
            description: None,
            status_id: 1,
            user_id: 2,
        };
        let stmt = task.insert_statement();
        assert_eq!(
            stmt.params(),
            &[
                SqlParam::Text("T1".to_string()),
                SqlParam::Null,
                SqlParam::Int(1),
                SqlParam::Int(2),
            ]
        );
    }

    #[test]
    fn test_title_is_required() {
        let task = NewTask {
            title: String::new(),
            description: Some("body".to_string()),
            status_id: 1,
            user_id: 1,
        };
        assert!(task.validate().is_err());
    }
}
