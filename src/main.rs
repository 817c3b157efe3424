mod cli;
mod commands;
mod config;
mod document;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
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
        config: cli.config,
    };
    log::trace!("verbosity {}", ctx.verbose);

    match cli.command {
        Command::Observe(args) => commands::call::observe(&ctx, args),
        Command::Create(args) => commands::call::create(&ctx, args),
        Command::Update(args) => commands::call::update(&ctx, args),
        Command::Delete(args) => commands::call::delete(&ctx, args),
        Command::Reconcile(args) => commands::reconcile::run(&ctx, args),
        Command::State(args) => commands::state::run(&ctx, args),
        Command::Plan(args) => commands::plan::run(&ctx, args),
        Command::Config => commands::config::show(&ctx),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "tfjet", &mut io::stdout());
            Ok(())
        }
    }
}
