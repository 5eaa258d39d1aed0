//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::domain::MemberId;

/// Genealogy tree builder and commission engine for MLM compensation plans
#[derive(Parser, Debug)]
#[command(name = "downline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Directory holding a local .downline.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Scenario selection shared by all commands that run a simulation.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Scenario file (TOML)
    #[arg(value_hint = ValueHint::FilePath)]
    pub scenario: PathBuf,

    /// Random seed, overrides scenario and settings
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulation and print summary and cycle report
    Simulate {
        #[command(flatten)]
        run: RunArgs,

        /// Also write the full result as JSON to this file
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Run a simulation and evaluate the scenario's commission rules
    Commissions {
        #[command(flatten)]
        run: RunArgs,

        /// Number of top earners listed in text output
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Print the genealogy tree
    Tree {
        #[command(flatten)]
        run: RunArgs,

        /// Levels to show below the root (default: settings tree_depth)
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Show one member: upline, downline, volumes and commissions
    Member {
        #[command(flatten)]
        run: RunArgs,

        /// Member id: root, user_<n> or <n>
        id: MemberId,
    },

    /// Validate a scenario without running it
    Validate {
        /// Scenario file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
    },

    /// Show the plan rule table and its self-check
    Plans,

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
    /// Show merged config
    Show,

    /// Print a config template
    Template,

    /// Show config paths
    Path,
}
