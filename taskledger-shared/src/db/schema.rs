/// Relational schema definition
///
/// Three tables with store-enforced referential integrity:
///
/// ```text
/// users (1) ──< tasks >── (1) status
///   ON DELETE CASCADE          ON DELETE RESTRICT
///   ON UPDATE CASCADE          ON UPDATE CASCADE
/// ```
///
/// Deleting a user removes that user's tasks; deleting a status is refused
/// while any task still references it. Changing either parent's `id` is
/// propagated into `tasks`.
///
/// [`ensure_schema`] is idempotent: it can be called on every start.
use super::session::RelationalSession;
use crate::error::{DataError, DataResult};
use serde::Serialize;
use sqlx::{Connection, Executor};
use std::fmt;
use tracing::{debug, info, warn};

/// Table names in creation order
pub const TABLES: [&str; 3] = ["users", "status", "tasks"];

/// `users` table
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    fullname VARCHAR(100) NOT NULL,
    email VARCHAR(100) UNIQUE NOT NULL
)
"#;

/// `status` table
pub const CREATE_STATUS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS status (
    id SERIAL PRIMARY KEY,
    name VARCHAR(50) UNIQUE NOT NULL
)
"#;

/// `tasks` table with both foreign keys and their cascade policy
pub const CREATE_TASKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id SERIAL PRIMARY KEY,
    title VARCHAR(100) NOT NULL,
    description TEXT,
    status_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    FOREIGN KEY (status_id) REFERENCES status (id)
        ON DELETE RESTRICT
        ON UPDATE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users (id)
        ON DELETE CASCADE
        ON UPDATE CASCADE
)
"#;

/// Referential action declared on a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Parses the single-letter code stored in `pg_constraint`
    pub fn from_pg_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(Self::NoAction),
            "r" => Some(Self::Restrict),
            "c" => Some(Self::Cascade),
            "n" => Some(Self::SetNull),
            "d" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        };
        f.write_str(text)
    }
}

/// A foreign key declared on `tasks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyRule {
    pub column: String,
    pub referenced_table: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

/// What currently exists in the database
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaStatus {
    /// Which of [`TABLES`] exist in the current schema
    pub existing_tables: Vec<String>,

    /// Foreign keys declared on `tasks`
    pub task_foreign_keys: Vec<ForeignKeyRule>,
}

impl SchemaStatus {
    /// True when all three tables exist
    pub fn is_complete(&self) -> bool {
        TABLES
            .iter()
            .all(|table| self.existing_tables.iter().any(|t| t == table))
    }

    /// Foreign key on `tasks.<column>`, if declared
    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKeyRule> {
        self.task_foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// True when both foreign keys carry exactly the expected cascade policy
    pub fn has_expected_rules(&self) -> bool {
        let status_ok = self.foreign_key("status_id").is_some_and(|fk| {
            fk.referenced_table == "status"
                && fk.on_delete == ReferentialAction::Restrict
                && fk.on_update == ReferentialAction::Cascade
        });
        let user_ok = self.foreign_key("user_id").is_some_and(|fk| {
            fk.referenced_table == "users"
                && fk.on_delete == ReferentialAction::Cascade
                && fk.on_update == ReferentialAction::Cascade
        });
        status_ok && user_ok
    }
}

/// Creates `users`, `status` and `tasks` if they do not exist yet
///
/// All three statements run in one transaction, in dependency order.
///
/// # Errors
///
/// Returns `SchemaError` if PostgreSQL rejects a definition (for instance a
/// conflicting object with the same name). The transaction is rolled back.
pub async fn ensure_schema(session: &mut RelationalSession) -> DataResult<()> {
    info!("Ensuring relational schema");

    let mut tx = session.conn.begin().await.map_err(DataError::schema)?;

    for (table, ddl) in TABLES
        .iter()
        .zip([CREATE_USERS_TABLE, CREATE_STATUS_TABLE, CREATE_TASKS_TABLE])
    {
        debug!(table, "Creating table if absent");
        let result = (&mut *tx).execute(ddl).await;
        if let Err(err) = result {
            warn!(table, error = %err, "Schema definition rejected");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback after schema failure failed");
            }
            return Err(DataError::schema(err));
        }
    }

    tx.commit().await.map_err(DataError::schema)?;
    info!("Relational schema is in place");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ForeignKeyRow {
    column_name: String,
    referenced_table: String,
    on_update: String,
    on_delete: String,
}

/// Reports which tables exist and the foreign keys declared on `tasks`
///
/// # Errors
///
/// Returns `QueryError` if the catalog queries fail.
pub async fn schema_status(session: &mut RelationalSession) -> DataResult<SchemaStatus> {
    let tables: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = current_schema()
          AND table_name::text = ANY($1)
        ORDER BY table_name
        "#,
    )
    .bind(&TABLES[..])
    .fetch_all(&mut session.conn)
    .await
    .map_err(|e| DataError::query("schema_status", e))?;

    let rows: Vec<ForeignKeyRow> = sqlx::query_as(
        r#"
        SELECT a.attname::text AS column_name,
               target.relname::text AS referenced_table,
               c.confupdtype::text AS on_update,
               c.confdeltype::text AS on_delete
        FROM pg_constraint c
        JOIN pg_class rel ON rel.oid = c.conrelid
        JOIN pg_namespace ns ON ns.oid = rel.relnamespace
        JOIN pg_class target ON target.oid = c.confrelid
        JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = c.conkey[1]
        WHERE c.contype = 'f'
          AND rel.relname = 'tasks'
          AND ns.nspname = current_schema()
        ORDER BY a.attname
        "#,
    )
    .fetch_all(&mut session.conn)
    .await
    .map_err(|e| DataError::query("schema_status", e))?;

    let mut task_foreign_keys = Vec::with_capacity(rows.len());
    for row in rows {
        let parse = |code: &str| {
            ReferentialAction::from_pg_code(code).ok_or_else(|| {
                DataError::SchemaError {
                    message: format!("unknown referential action code '{}'", code),
                    source: None,
                }
            })
        };
        task_foreign_keys.push(ForeignKeyRule {
            on_delete: parse(&row.on_delete)?,
            on_update: parse(&row.on_update)?,
            column: row.column_name,
            referenced_table: row.referenced_table,
        });
    }

    Ok(SchemaStatus {
        existing_tables: tables.into_iter().map(|(name,)| name).collect(),
        task_foreign_keys,
    })
}
