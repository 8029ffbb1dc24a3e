//! nq CLI - drive a persistent work queue from the shell.

use chrono::Utc;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use nvqueue::{QueueConfig, QueueItem, generate_uid, timestamp_now};
use std::fs;

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = nvqueue::config::data_dir().join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("nvqueue.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn get_config(cli: &Cli) -> QueueConfig {
    let config = QueueConfig::new().namespace(cli.namespace.clone());
    match &cli.db {
        Some(path) => config.db_path(path.clone()),
        None => config,
    }
}

fn format_reserved(reserved: bool) -> ColoredString {
    if reserved { "reserved".yellow() } else { "ready".green() }
}

fn print_item(item: &QueueItem) {
    println!(
        "{} {} {} {}",
        format_reserved(item.reserved),
        item.uid.cyan(),
        item.number,
        item.timestamp.dimmed()
    );
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = get_config(&cli);
    let mut queue = config.open_queue()?;

    match cli.command {
        Command::Add {
            number,
            uid,
            timestamp,
            if_new,
        } => {
            let now = Utc::now();
            let uid = uid.unwrap_or_else(|| generate_uid(now));
            let timestamp = timestamp.unwrap_or_else(|| timestamp_now(now));

            if if_new {
                let added = queue
                    .add_if_new(&uid, &timestamp, number)
                    .context("Failed to add item")?;
                if cli.json {
                    print_json(&serde_json::json!({ "uid": uid, "added": added }))?;
                } else if added {
                    println!("{} Added: {}", "✓".green(), uid.cyan());
                } else {
                    println!("{} Already queued: {}", "→".blue(), uid.cyan());
                }
            } else {
                let item = queue
                    .add(&uid, &timestamp, number)
                    .context("Failed to add item")?;
                if cli.json {
                    print_json(&item)?;
                } else {
                    println!("{} Added: {}", "✓".green(), item.uid.cyan());
                }
            }
        }

        Command::Remove { uid } => {
            let removed = queue.remove_by_uid(&uid).context("Failed to remove item")?;
            if cli.json {
                print_json(&serde_json::json!({ "uid": uid, "removed": removed }))?;
            } else {
                println!("{} Removed {} item(s) with UID {}", "✓".green(), removed, uid.cyan());
            }
        }

        Command::Reserve { uid } => {
            let reserved = queue.reserve_uid(&uid).context("Failed to reserve item")?;
            if cli.json {
                print_json(&serde_json::json!({ "uid": uid, "reserved": reserved }))?;
            } else if reserved {
                println!("{} Reserved: {}", "✓".green(), uid.cyan());
            } else {
                eprintln!("{} Item not found: {}", "✗".red(), uid);
                std::process::exit(1);
            }
        }

        Command::Peek => match queue.peek() {
            Some(item) if cli.json => print_json(&item)?,
            Some(item) => print_item(&item),
            None if cli.json => println!("null"),
            None => println!("{}", "No unreserved items".dimmed()),
        },

        Command::Exists { uid } => {
            let exists = queue.exists(&uid);
            if cli.json {
                print_json(&serde_json::json!({ "uid": uid, "exists": exists }))?;
            } else if exists {
                println!("{} {} is queued", "✓".green(), uid.cyan());
            } else {
                println!("{} {} is not queued", "✗".red(), uid.cyan());
            }
            if !exists {
                std::process::exit(1);
            }
        }

        Command::List => {
            if cli.json {
                print_json(&queue.items())?;
            } else if queue.is_empty() {
                println!("{}", "Queue is empty".dimmed());
            } else {
                queue.print();
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
