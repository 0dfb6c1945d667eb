//! issue-preview: live preview for GitHub issue form templates.
//!
//! # Usage
//!
//! ```text
//! issue-preview serve <yaml_file> [--port 8000] [--host 127.0.0.1] [--browser <exe>] [--no-open]
//!                     [--poll-interval-ms 250] [--debounce-ms 200] [--templates <dir>]
//! issue-preview render <yaml_file> [--output <file.html>] [--templates <dir>]
//! issue-preview check <yaml_file>
//! ```

mod browser;
mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{check::CheckArgs, render::RenderArgs, serve::ServeArgs};
use issue_preview_server::ServerError;

/// Exit status when the preview server cannot bind its port.
pub const EXIT_BIND_FAILURE: u8 = 3;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "issue-preview",
    version,
    about = "Preview GitHub issue form templates with live reload",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve a live preview that reloads whenever the file changes.
    Serve(ServeArgs),

    /// Render the preview once to an HTML file.
    Render(RenderArgs),

    /// Validate a template without rendering it.
    Check(CheckArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve(args) => args.run(),
        Commands::Render(args) => args.run(),
        Commands::Check(args) => args.run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    let bind_failure = err.chain().any(|cause| {
        cause
            .downcast_ref::<ServerError>()
            .is_some_and(ServerError::is_bind_failure)
    });
    if bind_failure {
        EXIT_BIND_FAILURE
    } else {
        1
    }
}
