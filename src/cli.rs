use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::env;
use std::path::PathBuf;

use crate::tracker::{DEFAULT_COMPLETED_FIELD, DEFAULT_RAW_FIELD};

/// Where replayed beacons are delivered
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkArg {
    /// Store in the beacon database (default)
    Db,
    /// Write to the application log
    Log,
    /// Print as JSON lines on stdout
    Stdout,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines event log through the query tracker
    Replay {
        /// Event log to replay ("-" for stdin)
        file: PathBuf,

        /// Query-value key holding the text the user typed
        #[arg(long, default_value = DEFAULT_RAW_FIELD)]
        raw_field: String,

        /// Query-value key holding the autocompleted text
        #[arg(long, default_value = DEFAULT_COMPLETED_FIELD)]
        completed_field: String,

        #[arg(long, value_enum, default_value = "db")]
        sink: SinkArg,

        /// Don't unload the session when the log ends
        #[arg(long)]
        no_unload: bool,
    },
    /// Print the most recently stored beacons
    Recent {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Internal development and debugging commands
    Internal {
        #[command(subcommand)]
        command: InternalCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum InternalCommands {
    /// Count stored beacons by kind
    SummarizeBeacons,
    /// Print the application log file
    PrintLog,
    /// Delete the current application log file
    ClearLog,
}

/// Replays search sessions and reports what users were looking for.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory for the beacon database and log (default: ~/.local/share/querytrail)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_default_data_dir(),
        }
    }
}

/// Get the default data directory (~/.local/share/querytrail)
pub fn get_default_data_dir() -> Result<PathBuf> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("querytrail"))
}

pub fn get_log_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("app.log")
}
