//! WebScraper AI CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Reply failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod render;

use commands::{Cli, Commands};

/// Script-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const REPLY_FAILURE: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // RUST_LOG wins over the flags when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scraper={level},scraper_chat={level},warn")));

    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let ctx = match commands::Context::new(cli.data_dir) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            return ExitCode::from(ExitCodes::GENERAL_ERROR);
        }
    };

    let result = match cli.command {
        Commands::Chat(args) => commands::chat::execute(&ctx, args).await,
        Commands::Send(args) => commands::send::execute(&ctx, args).await,
        Commands::Sessions(args) => commands::sessions::execute(&ctx, args).await,
        Commands::Show(args) => commands::show::execute(&ctx, args).await,
        Commands::Switch(args) => commands::switch::execute(&ctx, args).await,
        Commands::Delete(args) => commands::delete::execute(&ctx, args).await,
        Commands::Clear(args) => commands::clear::execute(&ctx, args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let msg = format!("{:#}", e).to_lowercase();

    if msg.contains("reply") || msg.contains("gemini_api_key") {
        ExitCodes::REPLY_FAILURE
    } else if msg.contains("not found") || msg.contains("ambiguous") || msg.contains("argument") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
