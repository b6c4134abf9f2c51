//! # TaskLedger Shared Library
//!
//! Data-access layer used by the `taskledger` command line tool.
//!
//! ## Module Organization
//!
//! - `config`: INI + environment configuration for both stores
//! - `error`: the `DataError` taxonomy shared by both stores
//! - `db`: PostgreSQL sessions, schema and statement execution
//! - `models`: users, statuses and tasks
//! - `reports`: named analytical queries
//! - `documents`: MongoDB client and the cats collection

pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod models;
pub mod reports;

/// Current version of the TaskLedger shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
