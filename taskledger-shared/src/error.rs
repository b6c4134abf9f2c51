/// Error types shared by both storage backends
///
/// Every fallible operation in this crate returns [`DataResult`]. Expected
/// absence ("no such user", "no matching document") is never an error: it is
/// reported through `Option`, `bool` or a zero-row [`WriteOutcome`].
///
/// | Variant | Raised when | Recoverable |
/// |---|---|---|
/// | `ConfigurationError` | config file/section/field missing or malformed | no |
/// | `ConnectionError` | backend unreachable or authentication failed | retry per attempt |
/// | `SchemaError` | DDL rejected by PostgreSQL | no |
/// | `QueryError` | bad statement or constraint violation | yes, session stays usable |
/// | `StoreError` | document-store fault | yes |
/// | `ValidationError` | entity rejected before reaching the store | yes |
/// | `BatchInterrupted` | a per-item batch insert failed part-way | resume from `committed` |
///
/// [`WriteOutcome`]: crate::db::executor::WriteOutcome
use thiserror::Error;

/// Result alias used throughout the crate
pub type DataResult<T> = Result<T, DataError>;

/// Unified data-access error
#[derive(Debug, Error)]
pub enum DataError {
    /// Configuration source missing or malformed
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Backend could not be reached or rejected the credentials
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Schema definition rejected by the relational store
    #[error("Schema error: {message}")]
    SchemaError {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// A single statement failed and was rolled back
    #[error("Query error in {operation}: {message}")]
    QueryError {
        operation: String,
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Document store operation failed
    #[error("Store error: {0}")]
    StoreError(String),

    /// Entity failed validation before any statement was sent
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Per-item batch insert stopped; earlier items remain committed
    #[error("Batch insert of {entity} interrupted after {committed} committed items: {source}")]
    BatchInterrupted {
        entity: &'static str,
        committed: usize,
        #[source]
        source: Box<DataError>,
    },
}

impl DataError {
    /// Wraps a sqlx failure raised while running `operation`
    pub fn query(operation: impl Into<String>, err: sqlx::Error) -> Self {
        DataError::QueryError {
            operation: operation.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Wraps a sqlx failure raised while defining the schema
    pub fn schema(err: sqlx::Error) -> Self {
        DataError::SchemaError {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Maps a failure while opening a relational connection
    ///
    /// Authentication and network failures become `ConnectionError`;
    /// malformed connection options become `ConfigurationError`.
    pub fn connect(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => DataError::ConfigurationError(e.to_string()),
            other => DataError::ConnectionError(other.to_string()),
        }
    }

    /// Returns the SQLSTATE code of the underlying database error, if any
    pub fn sql_state(&self) -> Option<String> {
        match self.database_error() {
            Some(db) => db.code().map(|c| c.into_owned()),
            None => None,
        }
    }

    /// True when the statement was refused by a foreign-key constraint
    ///
    /// This is how a restricted delete (e.g. removing a `status` row that
    /// tasks still reference) surfaces.
    pub fn is_foreign_key_violation(&self) -> bool {
        self.database_error()
            .map(|db| db.is_foreign_key_violation())
            .unwrap_or(false)
    }

    /// True when the statement was refused by a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        self.database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    }

    fn database_error(&self) -> Option<&dyn sqlx::error::DatabaseError> {
        match self {
            DataError::QueryError {
                source: Some(sqlx::Error::Database(db)),
                ..
            }
            | DataError::SchemaError {
                source: Some(sqlx::Error::Database(db)),
                ..
            } => Some(&**db),
            DataError::BatchInterrupted { source, .. } => source.database_error(),
            _ => None,
        }
    }
}

impl From<::config::ConfigError> for DataError {
    fn from(err: ::config::ConfigError) -> Self {
        DataError::ConfigurationError(err.to_string())
    }
}

impl From<mongodb::error::Error> for DataError {
    fn from(err: mongodb::error::Error) -> Self {
        DataError::StoreError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for DataError {
    fn from(err: validator::ValidationErrors) -> Self {
        DataError::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_display() {
        let err = DataError::query("read", sqlx::Error::RowNotFound);
        let text = err.to_string();
        assert!(text.starts_with("Query error in read:"));
        assert!(!err.is_foreign_key_violation());
        assert!(err.sql_state().is_none());
    }

    #[test]
    fn test_connect_maps_configuration_errors() {
        let err = DataError::connect(sqlx::Error::Configuration("bad port".into()));
        assert!(matches!(err, DataError::ConfigurationError(_)));

        let err = DataError::connect(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DataError::ConnectionError(_)));
    }

    #[test]
    fn test_batch_interrupted_reports_progress() {
        let err = DataError::BatchInterrupted {
            entity: "users",
            committed: 7,
            source: Box::new(DataError::ValidationError("email: invalid".into())),
        };
        let text = err.to_string();
        assert!(text.contains("users"));
        assert!(text.contains("7 committed"));
    }
}
