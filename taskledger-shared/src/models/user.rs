/// User model and database operations
///
/// A user owns zero or more tasks. Deleting a user deletes every task it
/// owns; changing a user's `id` rewrites `tasks.user_id` for those tasks.
/// Both rules are enforced by PostgreSQL, not here.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id SERIAL PRIMARY KEY,
///     fullname VARCHAR(100) NOT NULL,
///     email VARCHAR(100) UNIQUE NOT NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskledger_shared::db::session::RelationalSession;
/// use taskledger_shared::models::user::{NewUser, User};
///
/// # async fn example(session: &mut RelationalSession) -> Result<(), taskledger_shared::error::DataError> {
/// let user = User::create(session, NewUser {
///     fullname: "Ann Smith".to_string(),
///     email: "ann@example.org".to_string(),
/// })
/// .await?;
///
/// let found = User::find_by_email(session, "ann@example.org").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use crate::db::executor::{Insertable, WriteOutcome};
use crate::db::session::RelationalSession;
use crate::db::statement::Statement;
use crate::error::DataResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Generated identifier
    pub id: i32,

    /// Full name
    pub fullname: String,

    /// Email address, unique across all users
    pub email: String,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 100))]
    pub fullname: String,

    #[validate(email, length(max = 100))]
    pub email: String,
}

impl Insertable for NewUser {
    const ENTITY: &'static str = "users";

    fn insert_statement(&self) -> Statement {
        Statement::new("INSERT INTO users (fullname, email) VALUES ($1, $2) RETURNING id")
            .bind(self.fullname.as_str())
            .bind(self.email.as_str())
    }
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the name is empty or the email malformed
    /// - `QueryError` if the email already exists (unique violation)
    pub async fn create(session: &mut RelationalSession, data: NewUser) -> DataResult<Self> {
        let id = session.insert(&data).await?;
        Ok(Self {
            id,
            fullname: data.fullname,
            email: data.email,
        })
    }

    /// Finds a user by ID
    pub async fn find_by_id(session: &mut RelationalSession, id: i32) -> DataResult<Option<Self>> {
        session
            .fetch_optional_as(&Statement::new("SELECT id, fullname, email FROM users WHERE id = $1").bind(id))
            .await
    }

    /// Finds a user by email address
    pub async fn find_by_email(session: &mut RelationalSession, email: &str) -> DataResult<Option<Self>> {
        session
            .fetch_optional_as(
                &Statement::new("SELECT id, fullname, email FROM users WHERE email = $1").bind(email),
            )
            .await
    }

    /// Lists users ordered by id
    pub async fn list(session: &mut RelationalSession, limit: i64, offset: i64) -> DataResult<Vec<Self>> {
        session
            .fetch_as(
                &Statement::new("SELECT id, fullname, email FROM users ORDER BY id LIMIT $1 OFFSET $2")
                    .bind(limit)
                    .bind(offset),
            )
            .await
    }

    /// Returns every user id, in id order
    pub async fn ids(session: &mut RelationalSession) -> DataResult<Vec<i32>> {
        let rows: Vec<(i32,)> = session
            .fetch_as(&Statement::new("SELECT id FROM users ORDER BY id"))
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Counts users
    pub async fn count(session: &mut RelationalSession) -> DataResult<i64> {
        let rows: Vec<(i64,)> = session
            .fetch_as(&Statement::new("SELECT COUNT(*) FROM users"))
            .await?;
        Ok(rows.first().map(|(n,)| *n).unwrap_or(0))
    }

    /// Users that own no tasks
    pub async fn list_without_tasks(session: &mut RelationalSession) -> DataResult<Vec<Self>> {
        session
            .fetch_as(&Statement::new(
                r#"
                SELECT u.id, u.fullname, u.email
                FROM users u
                WHERE NOT EXISTS (SELECT 1 FROM tasks t WHERE t.user_id = u.id)
                ORDER BY u.id
                "#,
            ))
            .await
    }

    /// Renames a user
    ///
    /// A missing user is a logical miss (`rows_affected == 0`).
    pub async fn update_fullname(
        session: &mut RelationalSession,
        id: i32,
        fullname: &str,
    ) -> DataResult<WriteOutcome> {
        session
            .write(&Statement::new("UPDATE users SET fullname = $2 WHERE id = $1").bind(id).bind(fullname))
            .await
    }

    /// Changes a user's identifier
    ///
    /// Tasks owned by the user follow the new id (`ON UPDATE CASCADE`).
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if `new_id` is already taken.
    pub async fn update_id(session: &mut RelationalSession, id: i32, new_id: i32) -> DataResult<WriteOutcome> {
        session
            .write(&Statement::new("UPDATE users SET id = $2 WHERE id = $1").bind(id).bind(new_id))
            .await
    }

    /// Deletes a user and, through `ON DELETE CASCADE`, all of its tasks
    pub async fn delete(session: &mut RelationalSession, id: i32) -> DataResult<WriteOutcome> {
        session
            .write(&Statement::new("DELETE FROM users WHERE id = $1").bind(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::statement::SqlParam;

    #[test]
    fn test_new_user_validation() {
        let valid = NewUser {
            fullname: "Ann Smith".to_string(),
            email: "ann@x.org".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = NewUser {
            fullname: "Ann Smith".to_string(),
            email: "not-an-email".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let empty_name = NewUser {
            fullname: String::new(),
            email: "ann@x.org".to_string(),
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_insert_statement_returns_id() {
        let user = NewUser {
            fullname: "Ann".to_string(),
            email: "ann@x.org".to_string(),
        };
        let stmt = user.insert_statement();
        assert!(stmt.sql().ends_with("RETURNING id"));
        assert_eq!(
            stmt.params(),
            &[SqlParam::Text("Ann".to_string()), SqlParam::Text("ann@x.org".to_string())]
        );
    }

    // Database round trips are covered in tests/relational_tests.rs
}
