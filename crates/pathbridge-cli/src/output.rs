//! Formatted output helpers for CLI commands.

use pathbridge_core::MappingTable;
use pathbridge_overlay::OverlayMount;

/// Header line matching [`mount_row`].
#[must_use]
pub fn mount_header() -> String {
    format!("{:<14} {:<8} {:<40} {}", "STATE", "PID", "TARGET", "DETAIL")
}

/// One overlay root as a table row.
#[must_use]
pub fn mount_row(mount: &OverlayMount) -> String {
    format!(
        "{:<14} {:<8} {:<40} {}",
        mount.state().to_string(),
        mount
            .daemon_pid()
            .map_or_else(|| "-".to_string(), |p| p.to_string()),
        mount.target().display().to_string(),
        mount.failure().map_or_else(String::new, ToString::to_string),
    )
    .trim_end()
    .to_string()
}

/// The mapping table as aligned `#  HOST  CONTAINER` rows, in match order.
#[must_use]
pub fn mapping_table(table: &MappingTable) -> Vec<String> {
    let width = table
        .entries()
        .iter()
        .map(|e| e.host_prefix().len())
        .max()
        .unwrap_or(0)
        .max("HOST".len());

    let mut lines = vec![format!("{:<3} {:<width$} CONTAINER", "#", "HOST")];
    for (i, entry) in table.entries().iter().enumerate() {
        lines.push(format!(
            "{:<3} {:<width$} {}",
            i + 1,
            entry.host_prefix(),
            entry.container_prefix()
        ));
    }
    lines
}
