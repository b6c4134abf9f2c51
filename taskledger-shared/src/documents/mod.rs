/// Document data layer for TaskLedger
///
/// # Modules
///
/// - `client`: MongoDB client with TLS options, ping on connect and scoped release
/// - `cats`: the cats collection, keyed by name, with set-valued `features`
///
/// This store is independent of the relational one; there are no
/// cross-store transactions.

pub mod cats;
pub mod client;

/// BSON types appearing in [`cats::CatRecord`]
pub use mongodb::bson;
