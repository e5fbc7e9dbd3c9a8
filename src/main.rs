//! `telegraf-conf` binary: reconcile Telegraf plugin fragments from a manifest.
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use telegraf_conf::cli::{Cli, Command};
use telegraf_conf::commands;
use telegraf_conf::logging::{self, Logger};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();
    logging::init_subscriber(args.verbose, name);
    let log = Arc::new(Logger::new(name));

    match &args.command {
        Command::Plan(opts) => commands::plan::run(&args.global, opts, log.as_ref()),
        Command::Apply(opts) => commands::apply::run(&args.global, opts, &log),
        Command::Render(opts) => commands::render::run(&args.global, opts, log.as_ref()),
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
