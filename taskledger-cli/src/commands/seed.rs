/// `taskledger seed`
///
/// Statuses first, then users, then tasks referencing random existing users
/// and statuses. Users and tasks are inserted with per-item commits: when a
/// batch stops, everything before the failing item stays in the database
/// and the error says how many items made it.
use crate::fake::{self, TaskRefs};
use anyhow::{Context, Result};
use clap::Args;
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use taskledger_shared::config::PostgresConfig;
use taskledger_shared::db::schema::ensure_schema;
use taskledger_shared::db::session::{with_session, RelationalSession};
use taskledger_shared::error::DataResult;
use taskledger_shared::models::status::Status;
use taskledger_shared::models::user::User;
use tracing::info;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Number of users to create
    #[arg(long, default_value_t = 100)]
    pub users: usize,

    /// Number of tasks to create
    #[arg(long, default_value_t = 300)]
    pub tasks: usize,

    /// RNG seed for a reproducible data set
    #[arg(long)]
    pub seed: Option<u64>,
}

/// What a seeding run inserted
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub statuses: usize,
    pub users: usize,
    pub tasks: usize,
}

pub async fn run(config_path: &Path, args: SeedArgs) -> Result<()> {
    let config = PostgresConfig::load(config_path)?;
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (users, tasks) = (args.users, args.tasks);

    let summary = with_session(&config, move |session| {
        async move {
            ensure_schema(session).await?;
            seed(session, rng, users, tasks).await
        }
        .boxed()
    })
    .await
    .context("Seeding stopped")?;

    println!(
        "Seeded {} statuses, {} users, {} tasks",
        summary.statuses, summary.users, summary.tasks
    );
    Ok(())
}

async fn seed(session: &mut RelationalSession, mut rng: StdRng, users: usize, tasks: usize) -> DataResult<SeedSummary> {
    let statuses = Status::seed_defaults(session).await?;

    let user_ids = session.batch_insert(users, |index| fake::user(&mut rng, index)).await?;
    info!(count = user_ids.len(), "Users added");

    let inserted_tasks = if tasks == 0 {
        0
    } else {
        let status_ids = Status::list(session).await?.into_iter().map(|s| s.id).collect();
        let owner_ids = User::ids(session).await?;

        match TaskRefs::new(status_ids, owner_ids) {
            Some(refs) => {
                let ids = session.batch_insert(tasks, |_| fake::task(&mut rng, &refs)).await?;
                info!(count = ids.len(), "Tasks added");
                ids.len()
            }
            None => {
                info!("No users to own tasks; skipping tasks");
                0
            }
        }
    };

    Ok(SeedSummary {
        statuses: statuses.len(),
        users: user_ids.len(),
        tasks: inserted_tasks,
    })
}
