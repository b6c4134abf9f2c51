/// `taskledger report`
///
/// Runs every report of the catalog (or one, with `--only`) on a single
/// session and writes each non-empty result to `<out>/<name>.csv`.
use crate::export::write_report;
use anyhow::{Context, Result};
use clap::Args;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use taskledger_shared::config::PostgresConfig;
use taskledger_shared::db::session::with_session;
use taskledger_shared::db::statement::Record;
use taskledger_shared::models::status::{STATUS_COMPLETED, STATUS_IN_PROGRESS, STATUS_NEW};
use taskledger_shared::reports::{find_report, standard_reports, NamedReport, ReportParams};
use tracing::info;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Directory receiving the CSV files
    #[arg(long, default_value = "reports")]
    pub out: PathBuf,

    /// Run a single report by name
    #[arg(long)]
    pub only: Option<String>,

    /// User for `user_tasks`
    #[arg(long, default_value_t = 1)]
    pub user_id: i32,

    /// Status for `tasks_by_status`
    #[arg(long, default_value = STATUS_NEW)]
    pub status: String,

    /// Status for `in_progress_status_tasks`
    #[arg(long, default_value = STATUS_IN_PROGRESS)]
    pub active_status: String,

    /// Status excluded by `uncompleted_tasks`
    #[arg(long, default_value = STATUS_COMPLETED)]
    pub completed_status: String,

    /// Email domain for `users_by_email`
    #[arg(long, default_value = "example.org")]
    pub user_domain: String,

    /// Email domain for `tasks_by_user_email_domain`
    #[arg(long, default_value = "example.com")]
    pub task_domain: String,
}

impl ReportArgs {
    fn params(&self) -> ReportParams {
        ReportParams {
            user_id: self.user_id,
            status: self.status.clone(),
            active_status: self.active_status.clone(),
            completed_status: self.completed_status.clone(),
            user_email_domain: self.user_domain.clone(),
            task_email_domain: self.task_domain.clone(),
        }
    }

    fn selected(&self) -> Result<Vec<NamedReport>> {
        let params = self.params();
        match &self.only {
            Some(name) => {
                let report = find_report(&params, name)
                    .with_context(|| format!("Unknown report {:?}", name))?;
                Ok(vec![report])
            }
            None => Ok(standard_reports(&params)),
        }
    }
}

pub async fn run(config_path: &Path, args: ReportArgs) -> Result<()> {
    let reports = args.selected()?;
    let config = PostgresConfig::load(config_path)?;

    let results: Vec<(&'static str, Vec<Record>)> = with_session(&config, move |session| {
        async move {
            let mut results = Vec::with_capacity(reports.len());
            for report in reports {
                let rows = session.read(&report.statement).await?;
                info!(report = report.name, rows = rows.len(), "Report executed");
                results.push((report.name, rows));
            }
            Ok(results)
        }
        .boxed()
    })
    .await?;

    for (name, rows) in &results {
        match write_report(&args.out, name, rows)? {
            Some(path) => println!("{}: {} rows -> {}", name, rows.len(), path.display()),
            None => println!("{}: no rows, nothing written", name),
        }
    }
    Ok(())
}
