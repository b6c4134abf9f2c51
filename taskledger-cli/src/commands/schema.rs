/// `taskledger schema`
use anyhow::Result;
use clap::Args;
use futures::FutureExt;
use std::path::Path;
use taskledger_shared::config::PostgresConfig;
use taskledger_shared::db::schema::{ensure_schema, schema_status, SchemaStatus, TABLES};
use taskledger_shared::db::session::with_session;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Only report what exists; do not create anything
    #[arg(long)]
    pub check: bool,
}

pub async fn run(config_path: &Path, args: SchemaArgs) -> Result<()> {
    let config = PostgresConfig::load(config_path)?;
    let check_only = args.check;

    let status = with_session(&config, move |session| {
        async move {
            if !check_only {
                ensure_schema(session).await?;
            }
            schema_status(session).await
        }
        .boxed()
    })
    .await?;

    println!("{}", render(&status));

    if !status.is_complete() || !status.has_expected_rules() {
        anyhow::bail!("schema is incomplete or carries unexpected foreign key rules");
    }
    Ok(())
}

fn render(status: &SchemaStatus) -> String {
    let mut lines = Vec::new();
    for table in TABLES {
        let present = status.existing_tables.iter().any(|t| t == table);
        lines.push(format!("table {:<8} {}", table, if present { "present" } else { "missing" }));
    }
    for fk in &status.task_foreign_keys {
        lines.push(format!(
            "tasks.{} -> {} ON DELETE {} ON UPDATE {}",
            fk.column, fk.referenced_table, fk.on_delete, fk.on_update
        ));
    }
    lines.join("\n")
}
