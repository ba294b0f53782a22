mod backend;
mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub json: bool,
}

impl Context {
    /// Whether human-oriented output (text, prompts, progress) is shown
    pub fn interactive(&self) -> bool {
        !self.quiet && !self.json
    }
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
        json: cli.json,
    };

    match cli.command {
        Command::Validate(args) => commands::graph::validate(&ctx, &args.graph),
        Command::Preview(args) => commands::graph::preview(&ctx, &args.graph),
        Command::Apply(args) => commands::provision::apply(&ctx, &args),
        Command::Destroy(args) => commands::provision::destroy(&ctx, &args),
        Command::Kinds => commands::kinds::run(&ctx),
        Command::Health => commands::health::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "irforge", &mut io::stdout());
            Ok(())
        }
    }
}
