//! `pathbridge translate`: Translate paths through the mapping table.

use clap::{ArgGroup, Args};
use pathbridge_core::MappingTable;

/// Arguments for the `translate` command.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("direction").required(true).args(["forward", "backward"])))]
pub struct TranslateArgs {
    /// Host form to container form.
    #[arg(long)]
    pub forward: bool,

    /// Container form to host form.
    #[arg(long)]
    pub backward: bool,

    /// Paths to translate.
    #[arg(required = true)]
    pub paths: Vec<String>,
}

/// Executes the `translate` command.
///
/// Prints one line per input; unmatched paths are printed unchanged, the
/// same way the preload library passes them through.
///
/// # Errors
///
/// Never fails once arguments are parsed.
pub fn execute(args: &TranslateArgs, mappings: &str) -> anyhow::Result<()> {
    let table = MappingTable::parse(mappings);
    if table.is_empty() {
        tracing::warn!("mapping table is empty, paths pass through unchanged");
    }

    for path in &args.paths {
        println!("{}", translate(&table, args.forward, path));
    }
    Ok(())
}

fn translate(table: &MappingTable, forward: bool, path: &str) -> String {
    let translated = if forward {
        table.translate_forward(path)
    } else {
        table.translate_backward(path)
    };
    translated.unwrap_or_else(|| path.to_string())
}
