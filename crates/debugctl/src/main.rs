//! Debug Rails Control - read, summarize and correlate debug files
//!
//! Diagnostics go to stderr (`RUST_LOG`, default `warn`) so stdout carries
//! only the requested output.

use clap::Parser;
use debug_rails::CountingAllocator;
use debugctl::cli::Cli;
use debugctl::commands;
use debugctl::errors::EXIT_GENERAL_ERROR;
use std::io::{self, IsTerminal, Write};
use tracing_subscriber::EnvFilter;

// MEMORY entries written by debugctl report allocator byte counts
#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let color = !cli.no_color && io::stdout().is_terminal();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let code = match commands::run(cli, &mut out, color) {
        Ok(code) => code,
        Err(err) => {
            let _ = out.flush();
            eprintln!("Error: {:#}", err);
            EXIT_GENERAL_ERROR
        }
    };
    let _ = out.flush();
    std::process::exit(code);
}
