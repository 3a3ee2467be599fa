//! CLI argument definitions using clap derive

use crate::http::{Destination, Method};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// shellcache - offline cache layer for a single-origin web app
///
/// Installs a versioned snapshot of the app's static manifest, activates it
/// on request and serves fetches cache-first, network-first or
/// stale-while-revalidate.
#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELLCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .shellcache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Log output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        env = "SHELLCACHE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the static manifest into a new static partition
    Install,

    /// Skip waiting and evict partitions of older versions
    Activate,

    /// Deliver a raw control message, e.g. '{"type":"SKIP_WAITING"}'
    Message(MessageArgs),

    /// Serve a request through the cache layer
    Fetch(FetchArgs),

    /// List cache partitions
    Partitions(PartitionsArgs),

    /// Show lifecycle state and configuration summary
    Status,

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the message command
#[derive(Parser, Debug)]
pub struct MessageArgs {
    /// JSON message payload
    pub payload: String,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Absolute URL or path relative to the configured origin
    pub target: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: Method,

    /// Request destination (document, script, style, image, font, manifest, empty)
    #[arg(short, long, default_value = "empty")]
    pub destination: Destination,

    /// Mark the request as a top-level navigation
    #[arg(short, long)]
    pub navigate: bool,

    /// Write the body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print response status and headers to stderr
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the partitions command
#[derive(Parser, Debug)]
pub struct PartitionsArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
