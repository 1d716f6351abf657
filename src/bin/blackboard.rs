//! Blackboard inspection binary.
//!
//! # Environment Variables
//!
//! - `BLACKBOARD_PATH`: snapshot file (default: `.blackboard/blackboard.json`)
//! - `RUST_LOG`: Tracing filter (default: "warn")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin blackboard -- stats
//! cargo run --bin blackboard -- query --tags url,reachable --max 10
//! ```

use std::io::Write;

use agent_blackboard::cli::{self, Cli};
use anyhow::Context;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize tracing; also captures `log` records from the library.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let cli = Cli::parse();
    tracing::debug!(
        "inspecting blackboard at {:?}",
        cli.config().storage_path
    );

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(cli::run(&cli).as_bytes())
        .and_then(|()| stdout.flush())
        .context("failed to write output")?;
    Ok(())
}
