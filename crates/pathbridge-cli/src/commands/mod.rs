//! CLI command definitions and dispatch.

pub mod canonical;
pub mod mappings;
pub mod overlay;
pub mod translate;

use clap::{Parser, Subcommand};
use pathbridge_common::constants;

/// pathbridge: cross-environment path virtualization.
#[derive(Parser, Debug)]
#[command(name = constants::APP_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Mapping table (`host:container;...`) used by `translate` and `mappings`.
    #[arg(long, global = true, env = constants::ENV_PATH_MAPPINGS)]
    pub mappings: Option<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set up in-place FUSE overlays over the configured roots.
    Overlay(overlay::OverlayArgs),
    /// Print the canonical mount form of host paths.
    Canonical(canonical::CanonicalArgs),
    /// Translate paths through the mapping table.
    Translate(translate::TranslateArgs),
    /// Show the parsed mapping table and any skipped entries.
    Mappings(mappings::MappingsArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let table = cli.mappings.unwrap_or_default();
    match cli.command {
        Command::Overlay(args) => overlay::execute(args),
        Command::Canonical(args) => canonical::execute(&args),
        Command::Translate(args) => translate::execute(&args, &table),
        Command::Mappings(args) => mappings::execute(&args, &table),
    }
}
