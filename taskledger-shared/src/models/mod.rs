/// Database models for TaskLedger
///
/// Typed rows and CRUD helpers built on [`RelationalSession`]. Each helper
/// is one atomic statement; lookups return `Option`, updates and deletes
/// return a [`WriteOutcome`] whose zero-row case is a logical miss.
///
/// # Models
///
/// - `user`: task owners (delete cascades to their tasks)
/// - `status`: fixed status vocabulary (delete restricted while referenced)
/// - `task`: tasks referencing one status and one user
///
/// [`RelationalSession`]: crate::db::session::RelationalSession
/// [`WriteOutcome`]: crate::db::executor::WriteOutcome

pub mod status;
pub mod task;
pub mod user;
