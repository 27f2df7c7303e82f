use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `cogpipe` - inspect cognitive pipeline configuration and graphs.
#[derive(Parser, Debug)]
#[command(name = "cogpipe")]
#[command(version)]
#[command(about = "Validate cognitive pipeline configs and node graphs.", long_about = None)]
pub struct Cli {
    /// Log filter, e.g. `debug` or `cognitive_pipeline=trace`
    #[arg(long, global = true, env = "COGPIPE_LOG", default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate a config, then list enabled units per mode
    Check {
        /// Config file (default: ~/.cogpipe/config.toml, created if missing)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate a graph definition and print its execution order
    Graph {
        /// JSON graph definition
        file: PathBuf,
    },
}
