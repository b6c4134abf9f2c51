/// Relational connection management
///
/// A [`RelationalSession`] owns exactly one PostgreSQL connection. It is not
/// pooled and not shareable: every operation takes `&mut self`, so one
/// session serves one logical unit of work.
///
/// Releasing a session always rolls back first and then closes the
/// connection. [`with_session`] guarantees that release on every exit path of
/// the closure it runs; a session dropped without [`RelationalSession::close`]
/// closes its socket and the server rolls back whatever was in flight.
///
/// # Example
///
/// ```no_run
/// use taskledger_shared::config::PostgresConfig;
/// use taskledger_shared::db::session::with_session;
/// use taskledger_shared::db::schema::ensure_schema;
///
/// # async fn example(config: PostgresConfig) -> Result<(), taskledger_shared::error::DataError> {
/// with_session(&config, |session| {
///     Box::pin(async move {
///         ensure_schema(session).await?;
///         session.health_check().await
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
use crate::config::PostgresConfig;
use crate::error::{DataError, DataResult};
use futures::future::BoxFuture;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How long to wait for the server before giving up on a connect
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A single PostgreSQL connection with rollback-then-close release
pub struct RelationalSession {
    pub(crate) conn: PgConnection,
}

impl RelationalSession {
    /// Opens a connection using [`DEFAULT_CONNECT_TIMEOUT`]
    ///
    /// # Errors
    ///
    /// - `ConnectionError` if the server is unreachable, the timeout elapses,
    ///   or authentication fails
    /// - `ConfigurationError` if the options are rejected by the driver
    pub async fn connect(config: &PostgresConfig) -> DataResult<Self> {
        Self::connect_with_timeout(config, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Opens a connection, failing after `timeout`
    pub async fn connect_with_timeout(config: &PostgresConfig, timeout: Duration) -> DataResult<Self> {
        let started_at = Instant::now();
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Opening PostgreSQL session"
        );

        let options = connect_options(config);

        let conn = match tokio::time::timeout(timeout, PgConnection::connect_with(&options)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => {
                warn!(
                    duration_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "PostgreSQL connection failed"
                );
                return Err(DataError::connect(err));
            }
            Err(_) => {
                warn!(timeout_seconds = timeout.as_secs(), "PostgreSQL connection timed out");
                return Err(DataError::ConnectionError(format!(
                    "timed out after {}s connecting to {}:{}",
                    timeout.as_secs(),
                    config.host,
                    config.port
                )));
            }
        };

        info!(
            duration_ms = started_at.elapsed().as_millis() as u64,
            "PostgreSQL session opened"
        );
        Ok(Self { conn })
    }

    /// Runs `SELECT 1` to verify the connection is alive
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the round trip fails.
    pub async fn health_check(&mut self) -> DataResult<()> {
        debug!("Performing database health check");

        let (value,): (i32,) = sqlx::query_as("SELECT 1")
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        if value == 1 {
            debug!("Database health check passed");
            Ok(())
        } else {
            warn!("Database health check returned unexpected value: {}", value);
            Err(DataError::ConnectionError(
                "health check returned unexpected value".to_string(),
            ))
        }
    }

    /// Rolls back any in-flight transaction, then closes the connection
    ///
    /// A failed rollback is logged and the close still happens; a failed
    /// close is logged as well. Releasing never fails from the caller's
    /// point of view.
    pub async fn close(mut self) {
        debug!("Rolling back before closing PostgreSQL session");
        if let Err(err) = self.conn.execute("ROLLBACK").await {
            warn!(error = %err, "Rollback before close failed");
        }

        if let Err(err) = self.conn.close().await {
            warn!(error = %err, "Closing PostgreSQL session failed");
        } else {
            info!("PostgreSQL session closed");
        }
    }
}

/// Acquires a session, runs `f`, and releases the session on every path
///
/// The closure's result is returned unchanged after the session has been
/// rolled back and closed. Values the closure needs must be moved in.
///
/// # Errors
///
/// Connection failures from [`RelationalSession::connect`], or whatever `f`
/// returns.
pub async fn with_session<T, F>(config: &PostgresConfig, f: F) -> DataResult<T>
where
    F: for<'s> FnOnce(&'s mut RelationalSession) -> BoxFuture<'s, DataResult<T>>,
{
    let mut session = RelationalSession::connect(config).await?;
    let result = f(&mut session).await;
    session.close().await;
    result
}

fn connect_options(config: &PostgresConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
        .application_name("taskledger")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> PostgresConfig {
        PostgresConfig {
            host: "db.internal".to_string(),
            database: "ledger".to_string(),
            user: "ledger_app".to_string(),
            password: "secret".to_string(),
            port: 6543,
        }
    }

    #[test]
    fn test_connect_options_use_every_field() {
        let options = connect_options(&sample_config());
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "ledger_app");
        assert_eq!(options.get_database(), Some("ledger"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let config = PostgresConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..sample_config()
        };

        let result = RelationalSession::connect_with_timeout(&config, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(DataError::ConnectionError(_))));
    }
}
