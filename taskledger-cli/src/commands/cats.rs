/// `taskledger cats ...`
///
/// One-shot subcommands for each collection operation plus `menu`, an
/// interactive loop over the same operations. Every subcommand opens its
/// own client and closes it before returning.
use anyhow::{Context, Result};
use clap::Subcommand;
use futures::{FutureExt, StreamExt};
use std::io::Write;
use std::path::Path;
use taskledger_shared::config::MongoConfig;
use taskledger_shared::documents::cats::{CatCollection, CatRecord, UpdateOutcome};
use taskledger_shared::documents::client::{with_document_store, DocumentStore};
use taskledger_shared::error::DataResult;
use taskledger_shared::documents::bson::Bson;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Subcommand, Debug)]
pub enum CatsCommand {
    /// Show every cat
    List,
    /// Show one cat by name
    Find { name: String },
    /// Change a cat's age
    SetAge { name: String, age: i32 },
    /// Add a feature to a cat (no duplicates)
    AddFeature { name: String, feature: String },
    /// Delete one cat by name
    Delete { name: String },
    /// Delete every cat
    DeleteAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Insert a cat
    Insert {
        name: String,
        age: i32,
        /// Features, one per argument
        features: Vec<String>,
    },
    /// List databases visible to the configured user
    Databases,
    /// Interactive menu
    Menu,
}

pub async fn run(config_path: &Path, command: CatsCommand) -> Result<()> {
    let config = MongoConfig::load(config_path)?;

    match command {
        CatsCommand::Menu => {
            let store = DocumentStore::connect(&config).await?;
            let result = menu(&store.cats()).await;
            store.close().await;
            result
        }
        CatsCommand::DeleteAll { yes: false } => {
            let mut input = BufReader::new(tokio::io::stdin()).lines();
            if confirm(&mut input).await? {
                run_one(&config, CatsCommand::DeleteAll { yes: true }).await
            } else {
                println!("Cancelled");
                Ok(())
            }
        }
        command => run_one(&config, command).await,
    }
}

async fn run_one(config: &MongoConfig, command: CatsCommand) -> Result<()> {
    let output = with_document_store(config, move |store| {
        async move {
            if let CatsCommand::Databases = command {
                return Ok(store.list_database_names().await?.join("\n"));
            }
            execute(&store.cats(), command).await
        }
        .boxed()
    })
    .await?;

    println!("{}", output);
    Ok(())
}

/// Runs one collection command and renders its result
async fn execute(cats: &CatCollection, command: CatsCommand) -> DataResult<String> {
    let text = match command {
        CatsCommand::List => {
            let mut stream = cats.find_all().await?;
            let mut blocks = Vec::new();
            while let Some(cat) = stream.next().await {
                blocks.push(render_cat(&cat?));
            }
            if blocks.is_empty() {
                "The collection is empty".to_string()
            } else {
                blocks.join("\n\n")
            }
        }
        CatsCommand::Find { name } => match cats.find_one(&name).await? {
            Some(cat) => render_cat(&cat),
            None => format!("No cat named {}", name),
        },
        CatsCommand::SetAge { name, age } => {
            let outcome = cats.update_age(&name, age).await?;
            render_update(&name, outcome, &format!("age set to {}", age))
        }
        CatsCommand::AddFeature { name, feature } => {
            let outcome = cats.add_feature(&name, &feature).await?;
            render_update(&name, outcome, &format!("feature {:?} added", feature))
        }
        CatsCommand::Delete { name } => {
            if cats.delete_one(&name).await? {
                format!("{} deleted", name)
            } else {
                format!("No cat named {}", name)
            }
        }
        CatsCommand::DeleteAll { .. } => format!("Deleted {} records", cats.delete_all().await?),
        CatsCommand::Insert { name, age, features } => {
            let id = cats.insert_one(&CatRecord::new(name.clone(), age, features)).await?;
            format!("{} inserted with id {}", name, id)
        }
        CatsCommand::Databases | CatsCommand::Menu => String::new(),
    };
    Ok(text)
}

fn render_cat(cat: &CatRecord) -> String {
    let age = match (cat.age_value(), &cat.age) {
        (Some(age), _) => age.to_string(),
        (None, Some(Bson::String(text))) => text.clone(),
        (None, Some(other)) => other.to_string(),
        (None, None) => "unknown".to_string(),
    };
    format!("Name: {}\nAge: {}\nFeatures: {}", cat.name, age, cat.features.join(", "))
}

fn render_update(name: &str, outcome: UpdateOutcome, change: &str) -> String {
    match outcome {
        UpdateOutcome { matched: false, .. } => format!("No cat named {}", name),
        UpdateOutcome { modified: false, .. } => format!("{}: nothing to change", name),
        UpdateOutcome { .. } => format!("{}: {}", name, change),
    }
}

const MENU: &str = "
Choose an operation:
1. Show all cats
2. Find a cat by name
3. Update a cat's age
4. Add a feature to a cat
5. Delete a cat
6. Delete all cats
0. Exit";

async fn menu(cats: &CatCollection) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!("{}", MENU);
        let Some(choice) = prompt(&mut input, "Your choice: ").await? else {
            break;
        };

        let command = match choice.trim() {
            "1" => CatsCommand::List,
            "2" => CatsCommand::Find {
                name: prompt_or_exit(&mut input, "Cat name: ").await?,
            },
            "3" => {
                let name = prompt_or_exit(&mut input, "Cat name: ").await?;
                let age = prompt_or_exit(&mut input, "New age: ").await?;
                match age.trim().parse() {
                    Ok(age) => CatsCommand::SetAge { name, age },
                    Err(_) => {
                        println!("Age must be a whole number");
                        continue;
                    }
                }
            }
            "4" => CatsCommand::AddFeature {
                name: prompt_or_exit(&mut input, "Cat name: ").await?,
                feature: prompt_or_exit(&mut input, "New feature: ").await?,
            },
            "5" => CatsCommand::Delete {
                name: prompt_or_exit(&mut input, "Cat name: ").await?,
            },
            "6" => {
                if !confirm(&mut input).await? {
                    continue;
                }
                CatsCommand::DeleteAll { yes: true }
            }
            "0" => break,
            _ => {
                println!("Unknown choice, try again");
                continue;
            }
        };

        // Store faults end the operation, not the session
        match execute(cats, command).await {
            Ok(text) => println!("\n{}", text),
            Err(err) => println!("\nError: {}", err),
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn confirm(input: &mut Lines<BufReader<Stdin>>) -> Result<bool> {
    let answer = prompt(input, "Are you sure? (y/n): ").await?;
    Ok(answer.is_some_and(|a| a.trim().eq_ignore_ascii_case("y")))
}

/// Prints `label` and reads one line; `None` at end of input
async fn prompt(input: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    print!("{}", label);
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

async fn prompt_or_exit(input: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<String> {
    prompt(input, label).await?.context("Input closed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_cat() {
        let cat = CatRecord::new("Tom", 3, ["fluffy", "likes milk"]);
        assert_eq!(render_cat(&cat), "Name: Tom\nAge: 3\nFeatures: fluffy, likes milk");
    }

    #[test]
    fn test_render_cat_with_irregular_age() {
        let mut cat = CatRecord::new("Barsik", 0, Vec::<String>::new());
        cat.age = Some(Bson::Double(4.0));
        assert_eq!(render_cat(&cat), "Name: Barsik\nAge: 4\nFeatures: ");

        cat.age = Some(Bson::String("seven".to_string()));
        assert_eq!(render_cat(&cat), "Name: Barsik\nAge: seven\nFeatures: ");

        cat.age = None;
        assert_eq!(render_cat(&cat), "Name: Barsik\nAge: unknown\nFeatures: ");
    }

    #[test]
    fn test_render_update_distinguishes_miss_and_noop() {
        let miss = UpdateOutcome::default();
        assert_eq!(render_update("Tom", miss, "x"), "No cat named Tom");

        let noop = UpdateOutcome {
            matched: true,
            modified: false,
        };
        assert_eq!(render_update("Tom", noop, "x"), "Tom: nothing to change");

        let changed = UpdateOutcome {
            matched: true,
            modified: true,
        };
        assert_eq!(render_update("Tom", changed, "age set to 4"), "Tom: age set to 4");
    }
}
