mod catalog;
mod cli;
mod commands;
mod config;
mod error;
mod host;
mod pipeline;
mod provision;
mod remote;
mod resolve;
mod select;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Config;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::List(args) => commands::list::run(&ctx, &config, args.source.as_deref()),
        Command::Deploy(args) => commands::deploy::single(&ctx, &config, &args),
        Command::DeployAll(args) => commands::deploy::all(&ctx, &config, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sitefleet", &mut io::stdout());
            Ok(())
        }
    }
}
