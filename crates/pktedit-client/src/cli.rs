//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pktedit - craft and edit packets through a remote packet service
#[derive(Debug, Parser)]
#[command(name = "pktedit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "PKTEDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Packet service endpoint
    #[arg(long, short, env = "PKTEDIT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Per-exchange timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the negotiated service version and handle
    Version,

    /// Build a packet from a JSON description file
    Build {
        /// JSON packet description
        input: PathBuf,
    },

    /// Decode the first packet of a capture file
    Decode {
        /// Capture file
        input: PathBuf,
    },

    /// Build a JSON description and write it as a capture file
    Encode {
        /// JSON packet description
        input: PathBuf,

        /// Capture file to write
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Print the protocol metadata tree
    Tree,

    /// Manage packet templates
    Templates {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Template actions.
#[derive(Debug, Subcommand)]
pub enum TemplateAction {
    /// List user and service templates
    List,

    /// Print a template as a JSON description
    Show {
        /// Template name (user templates take precedence)
        name: String,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
