//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::config::OutputFormat;

/// Hierarchical tree store: load layered config sources, validate them against a schema
#[derive(Parser, Debug)]
#[command(name = "treestore")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level (-d: info, -dd: debug, -ddd: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file layered over the global one
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Sources plus the options shared by every loading command.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Files (.ini, .json, .toml, .yaml) or ENV:PREFIX, lowest precedence first
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Environment prefix loaded after the sources
    #[arg(long = "env", value_name = "PREFIX")]
    pub env_prefix: Option<String>,

    /// Override a value, highest precedence (repeatable, dotted keys nest)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Skip source files that do not exist
    #[arg(long)]
    pub skip_missing: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge sources into a tree and print it
    Show {
        #[command(flatten)]
        source: SourceArgs,

        /// Schema file with allowed children and cardinalities
        #[arg(long, value_hint = ValueHint::FilePath)]
        schema: Option<PathBuf>,

        /// Output format (default from settings)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Validate merged sources against a schema
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Schema file (default from settings)
        #[arg(long, value_hint = ValueHint::FilePath)]
        schema: Option<PathBuf>,
    },

    /// Print merged sources as flat key=value lines
    Flatten {
        #[command(flatten)]
        source: SourceArgs,

        /// Key separator (default from settings)
        #[arg(long)]
        separator: Option<String>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Print a commented template
    Template,
    /// Print the global config location
    Path,
}
