/// `taskledger modify`
///
/// Runs a fixed list of single-statement modifications. Each one is its own
/// transaction: a failure is reported and rolled back, and the remaining
/// modifications still run on the same session.
use anyhow::Result;
use clap::Args;
use futures::FutureExt;
use std::fmt;
use std::path::Path;
use taskledger_shared::config::PostgresConfig;
use taskledger_shared::db::executor::WriteOutcome;
use taskledger_shared::db::session::{with_session, RelationalSession};
use taskledger_shared::error::{DataError, DataResult};
use taskledger_shared::models::status::{Status, STATUS_IN_PROGRESS, STATUS_NEW};
use taskledger_shared::models::task::{NewTask, Task};
use taskledger_shared::models::user::User;
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub struct ModifyArgs {
    /// Task whose status is changed
    #[arg(long, default_value_t = 60)]
    pub task_id: i32,

    /// Status the task is moved to
    #[arg(long, default_value = STATUS_IN_PROGRESS)]
    pub status: String,

    /// User who receives the new task and is renamed
    #[arg(long, default_value_t = 60)]
    pub user_id: i32,

    /// Task to delete
    #[arg(long, default_value_t = 150)]
    pub delete_task_id: i32,

    /// New full name for the user
    #[arg(long, default_value = "Kozak Kozachenko")]
    pub fullname: String,
}

/// How one modification ended
#[derive(Debug)]
pub enum ModificationResult {
    Applied(u64),
    Miss,
    Failed(DataError),
}

impl From<DataResult<WriteOutcome>> for ModificationResult {
    fn from(result: DataResult<WriteOutcome>) -> Self {
        match result {
            Ok(outcome) if outcome.is_miss() => Self::Miss,
            Ok(outcome) => Self::Applied(outcome.rows_affected),
            Err(err) => Self::Failed(err),
        }
    }
}

impl fmt::Display for ModificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied(rows) => write!(f, "applied ({} row(s))", rows),
            Self::Miss => f.write_str("no matching row"),
            Self::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

pub async fn run(config_path: &Path, args: ModifyArgs) -> Result<()> {
    let config = PostgresConfig::load(config_path)?;

    let results = with_session(&config, move |session| {
        async move { Ok(apply_all(session, &args).await) }.boxed()
    })
    .await?;

    let mut failures = 0;
    for (name, result) in &results {
        if matches!(result, ModificationResult::Failed(_)) {
            failures += 1;
        }
        println!("{}: {}", name, result);
    }

    if failures > 0 {
        anyhow::bail!("{} of {} modifications failed", failures, results.len());
    }
    Ok(())
}

async fn apply_all(session: &mut RelationalSession, args: &ModifyArgs) -> Vec<(&'static str, ModificationResult)> {
    let mut results = Vec::with_capacity(4);

    results.push((
        "Update task status",
        Task::update_status(session, args.task_id, &args.status).await.into(),
    ));
    results.push(("Add task", add_task(session, args.user_id).await));
    results.push((
        "Delete task",
        Task::delete(session, args.delete_task_id).await.into(),
    ));
    results.push((
        "Rename user",
        User::update_fullname(session, args.user_id, &args.fullname).await.into(),
    ));

    for (name, result) in &results {
        if let ModificationResult::Failed(err) = result {
            warn!(modification = %name, error = %err, "Modification failed");
        }
    }
    results
}

async fn add_task(session: &mut RelationalSession, user_id: i32) -> ModificationResult {
    let status = match Status::find_by_name(session, STATUS_NEW).await {
        Ok(Some(status)) => status,
        Ok(None) => return ModificationResult::Miss,
        Err(err) => return ModificationResult::Failed(err),
    };

    let task = NewTask {
        title: "Report".to_string(),
        description: Some("Print the report in three copies".to_string()),
        status_id: status.id,
        user_id,
    };
    match Task::create(session, task).await {
        Ok(_) => ModificationResult::Applied(1),
        Err(err) => ModificationResult::Failed(err),
    }
}
