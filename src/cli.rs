//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default manifest file name, resolved against the working directory.
pub const DEFAULT_MANIFEST: &str = "telegraf-conf.toml";

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "telegraf-conf",
    about = "Reconcile Telegraf plugin configuration fragments",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Shared options.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Manifest declaring the agent and its plugins
    #[arg(short, long, global = true, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Override OS family detection (linux, darwin, freebsd, windows)
    #[arg(long, global = true)]
    pub os_family: Option<String>,

    /// Override the fragment directory
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show what each plugin reconciles to
    Plan(PlanOpts),
    /// Write and remove fragments on disk
    Apply(ApplyOpts),
    /// Print one plugin's rendered fragment
    Render(RenderOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name, used to name the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Plan(_) => "plan",
            Self::Apply(_) => "apply",
            Self::Render(_) => "render",
            Self::Version => "version",
        }
    }
}

/// Options for the `plan` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct PlanOpts {
    /// Print reconciliations as JSON
    #[arg(long)]
    pub json: bool,
}

/// Options for the `apply` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ApplyOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Do not restart the agent after fragments change
    #[arg(long)]
    pub no_restart: bool,

    /// Apply only the named plugins
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
}

/// Options for the `render` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RenderOpts {
    /// Plugin name
    pub name: String,
}
