//! Vessel Container Runtime CLI
//!
//! A minimal container runtime: tarball-staged root filesystems,
//! six-namespace isolation via a re-executed child, and a bridged
//! veth network between host and container.

use clap::Parser;
use std::process;
use tracing::Level;

mod cli;
mod init;
mod run;

use cli::{Cli, Commands};

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Execute the command
    let result = match cli.command {
        Commands::Run(args) => run::execute(args),
        // The hidden re-exec entry point; replaces the process image
        // with the container shell on success
        Commands::Init(args) => init::execute(args).map(|()| 0),
    };

    // Handle errors; `run` propagates the container's exit code
    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            process::exit(1);
        }
    }
}
