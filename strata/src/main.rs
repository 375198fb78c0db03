// strata/src/main.rs
use std::fs;
use std::process;

use clap::Parser;
use colored::Colorize;
use strata_common::config::Config;
use strata_common::error::Result as StrataResult;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;
mod pipeline;
use cli::CliArgs;

#[tokio::main]
async fn main() -> StrataResult<()> {
    let cli_args = CliArgs::parse();

    let mut config = Config::load()?;
    if let Some(recipe) = &cli_args.recipe {
        config.recipe_path = recipe.clone();
    }

    let level_filter = match cli_args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::INFO);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("STRATA_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if cli_args.verbose > 0 {
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!(
                "{} Failed to create log directory {}: {}",
                "Warning:".yellow().bold(),
                log_dir.display(),
                e
            );
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .without_time()
                .try_init();
        } else {
            let file_appender = tracing_appender::rolling::daily(&log_dir, "strata.log");
            let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

            // For verbose mode, show debug/trace logs on stderr too
            let stderr_writer = std::io::stderr.with_max_level(max_log_level);
            let file_writer = non_blocking_appender.with_max_level(max_log_level);

            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(stderr_writer.and(file_writer))
                .with_ansi(true)
                .without_time()
                .try_init();

            Box::leak(Box::new(guard)); // Keep guard alive

            debug!(
                "Verbose logging enabled. Writing logs to: {}/strata.log",
                log_dir.display()
            );
        }
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
    }

    if let Err(e) = cli_args.command.run(&config).await {
        error!("Command failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }

    debug!("Command completed successfully.");
    Ok(())
}
