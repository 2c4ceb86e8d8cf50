//! `pathbridge mappings`: Show the parsed mapping table.

use clap::Args;
use pathbridge_core::MappingTable;

use crate::output;

/// Arguments for the `mappings` command.
#[derive(Args, Debug)]
pub struct MappingsArgs {
    /// Print the table and skipped entries as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `mappings` command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(args: &MappingsArgs, mappings: &str) -> anyhow::Result<()> {
    let (table, warnings) = MappingTable::parse_with_warnings(mappings);

    if args.json {
        let skipped: Vec<_> = warnings
            .iter()
            .map(|w| serde_json::json!({ "entry": w.entry, "reason": w.reason }))
            .collect();
        let report = serde_json::json!({ "entries": table, "skipped": skipped });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if table.is_empty() {
        println!("No mappings configured.");
    } else {
        for line in output::mapping_table(&table) {
            println!("{line}");
        }
    }
    for warning in &warnings {
        println!("skipped {:?}: {}", warning.entry, warning.reason);
    }
    Ok(())
}
