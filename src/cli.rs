//! CLI argument parsing for nq.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "nq",
    about = "A persistent, reservable work queue",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/nvqueue/logs/nvqueue.log"
)]
pub struct Cli {
    /// Path to the queue store file (default: ~/.local/share/nvqueue/queue.db)
    #[arg(short = 'd', long, global = true)]
    pub db: Option<PathBuf>,

    /// Namespace inside the store
    #[arg(short = 'n', long, global = true, default_value = "queue")]
    pub namespace: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Append an item to the queue
    Add {
        /// Integer payload
        #[arg(allow_hyphen_values = true)]
        number: i32,

        /// Item UID (generated if omitted)
        #[arg(short, long)]
        uid: Option<String>,

        /// Item timestamp (current UTC time if omitted)
        #[arg(short, long)]
        timestamp: Option<String>,

        /// Skip the add if an item with this UID is already queued
        #[arg(long)]
        if_new: bool,
    },

    /// Remove all items with a UID
    Remove {
        /// Item UID
        uid: String,
    },

    /// Reserve the first item with a UID
    Reserve {
        /// Item UID
        uid: String,
    },

    /// Show the first unreserved item
    Peek,

    /// Check whether an item with a UID is queued (exit code 1 if not)
    Exists {
        /// Item UID
        uid: String,
    },

    /// List all items in queue order
    List,
}
