/// Relational data layer for TaskLedger
///
/// # Modules
///
/// - `session`: one PostgreSQL connection with rollback-then-close release
/// - `schema`: idempotent creation of `users`, `status`, `tasks` and their cascade rules
/// - `statement`: parameterized statements and ordered result records
/// - `executor`: read / write / insert / batch insert, each its own transaction
/// - Typed models are in the `models` module at crate root level
///
/// # Example
///
/// ```no_run
/// use taskledger_shared::config::PostgresConfig;
/// use taskledger_shared::db::session::RelationalSession;
/// use taskledger_shared::db::statement::Statement;
///
/// # async fn example(config: PostgresConfig) -> Result<(), taskledger_shared::error::DataError> {
/// let mut session = RelationalSession::connect(&config).await?;
/// let rows = session
///     .read(&Statement::new("SELECT id, fullname FROM users WHERE id = $1").bind(1))
///     .await?;
/// println!("{} rows", rows.len());
/// session.close().await;
/// # Ok(())
/// # }
/// ```

pub mod executor;
pub mod schema;
pub mod session;
pub mod statement;
