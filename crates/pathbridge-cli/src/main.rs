//! # pathbridge: path virtualization CLI
//!
//! Normalizes host paths, inspects and applies the mapping table, and sets
//! up in-place FUSE overlays at container start.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
