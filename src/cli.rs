//! Command-line argument parsing for tenant-forge.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Output format for execution results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One human-readable line per target.
    #[default]
    Text,
    /// JSON array of result objects.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Run one SQL script against a fleet of PostgreSQL databases concurrently.
#[derive(Parser, Debug)]
#[command(name = "tenant-forge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a SQL script against a set of connections
    Run(RunArgs),

    /// Parse a connection block and report the targets found, without connecting
    Check(CheckArgs),

    /// Manage saved projects
    #[command(subcommand)]
    Project(ProjectCommand),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// SQL script file to execute
    #[arg(short = 's', long, value_name = "PATH", conflicts_with = "sql")]
    pub script: Option<PathBuf>,

    /// Inline SQL to execute
    #[arg(long, value_name = "SQL")]
    pub sql: Option<String>,

    /// Connection block file (env format)
    #[arg(short = 'e', long, value_name = "PATH", conflicts_with = "project")]
    pub env: Option<PathBuf>,

    /// Use the connection block (and script, unless overridden) of a saved project
    #[arg(short = 'p', long, value_name = "NAME")]
    pub project: Option<String>,

    /// Comma-separated connection ids to run against (default: all)
    #[arg(long, value_name = "IDS")]
    pub only: Option<String>,

    /// Per-target statement timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Per-target connect timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout_secs: Option<u64>,

    /// Maximum targets running at once
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Output format (text or json)
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub format: String,
}

impl RunArgs {
    /// Parses the `--only` filter into a list of ids.
    pub fn only_ids(&self) -> Option<Vec<String>> {
        self.only.as_ref().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Connection block file (env format)
    #[arg(value_name = "PATH")]
    pub env: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a new project
    Create {
        /// Project name
        name: String,
        /// Project description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Tags (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// List all projects
    List,
    /// Show a project, including its connection block and script
    Show {
        /// Project name
        name: String,
    },
    /// Save a connection block and/or script into a project
    Save {
        /// Project name
        name: String,
        /// Connection block file (env format)
        #[arg(short, long, value_name = "PATH")]
        env: Option<PathBuf>,
        /// SQL script file
        #[arg(short, long, value_name = "PATH")]
        script: Option<PathBuf>,
    },
    /// Delete a project
    Delete {
        /// Project name
        name: String,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::Config::default_path)
    }
}
