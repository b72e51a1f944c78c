mod cli;
mod commands;
mod config;
mod defaults;
mod policy;
mod progress;
mod resource;
mod runner;
mod ui;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Config;
use convergence::CancelToken;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<ExitCode> {
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

    match cli.command {
        Command::Wait(args) => {
            let config = Config::load(cli.config.as_deref())?;
            let cancel = interrupt_token()?;
            commands::wait::run(&ctx, &config, &args, &cancel)
        }
        Command::Describe(args) => {
            let config = Config::load(cli.config.as_deref())?;
            let cancel = interrupt_token()?;
            commands::describe::run(&ctx, &config, &args, &cancel)
        }
        Command::Diff(args) => commands::diff::run(&args).map(|()| ExitCode::SUCCESS),
        Command::Classify(args) => {
            let config = Config::load(cli.config.as_deref())?;
            commands::classify::run(&ctx, &config, &args).map(|()| ExitCode::SUCCESS)
        }
        Command::Families(args) => commands::families::run(&args).map(|()| ExitCode::SUCCESS),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "settle", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Cancellation token cancelled by Ctrl-C
fn interrupt_token() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::debug!("interrupt received, cancelling");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(cancel)
}
