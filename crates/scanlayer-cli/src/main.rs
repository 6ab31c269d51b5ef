// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanlayer: adaptive OCR for image-only PDFs.
//
// Entry point. Initialises logging, wires Ctrl-C to cooperative
// cancellation, runs the subcommand, and maps errors to an exit code.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scanlayer_core::error::ScanlayerError;
use scanlayer_core::human_errors::humanize_error;
use scanlayer_pipeline::CancelToken;

use cli::{Cli, Commands};
use commands::Job;

/// Exit status for a run stopped by Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let result = match cli.command {
        Commands::Convert { input, output, ocr } => {
            commands::run_ocr(Job::Convert, &input, &output, None, &ocr, cancel).await
        }
        Commands::Extract {
            input,
            output,
            separator,
            ocr,
        } => commands::run_ocr(Job::Extract, &input, &output, separator, &ocr, cancel).await,
        Commands::Unlock {
            input,
            output,
            password,
        } => commands::run_unlock(input, output, password).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_error(&err),
    }
}

fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

fn report_error(err: &ScanlayerError) -> ExitCode {
    let human = humanize_error(err);
    eprintln!("error[{}]: {err}", err.kind());
    eprintln!("  {}", human.message);
    eprintln!("  hint: {}", human.suggestion);
    match err {
        ScanlayerError::Cancelled { .. } => ExitCode::from(EXIT_CANCELLED),
        _ => ExitCode::FAILURE,
    }
}
