//! The ordered, immutable table of prefix pairs.

use std::fmt;

use pathbridge_common::constants;
use pathbridge_common::error::MappingParseWarning;
use serde::Serialize;

use super::MappingEntry;
use crate::path;

/// Ordered prefix pairs, tried in declaration order; the first entry whose
/// prefix matches on a path boundary wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    /// Creates a table from already-validated entries.
    #[must_use]
    pub const fn new(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    /// Parses `host1:container1;host2:container2;...`, logging and skipping
    /// malformed entries.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let (table, warnings) = Self::parse_with_warnings(value);
        for warning in &warnings {
            tracing::warn!(
                entry = %warning.entry,
                reason = %warning.reason,
                "skipping mapping entry"
            );
        }
        table
    }

    /// Parses the environment format and returns the skipped entries
    /// alongside the table.
    pub fn parse_with_warnings(value: &str) -> (Self, Vec<MappingParseWarning>) {
        let mut entries = Vec::new();
        let mut warnings = Vec::new();

        for raw in value.split(constants::LIST_SEPARATOR) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let Some((host, container)) = split_pair(raw) else {
                warnings.push(MappingParseWarning {
                    entry: raw.to_string(),
                    reason: format!(
                        "missing '{}' between host and container",
                        constants::PAIR_SEPARATOR
                    ),
                });
                continue;
            };
            match MappingEntry::new(host, container) {
                Ok(entry) => entries.push(entry),
                Err(e) => warnings.push(MappingParseWarning {
                    entry: raw.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        tracing::debug!(entries = entries.len(), skipped = warnings.len(), "parsed mapping table");
        (Self { entries }, warnings)
    }

    /// Parses the table carried in `PATHBRIDGE_PATH_MAPPINGS`; empty when unset.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(constants::ENV_PATH_MAPPINGS)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    /// Returns a table with `entry` appended after the existing entries.
    #[must_use]
    pub fn with_entry(mut self, entry: MappingEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Entries in match order.
    #[must_use]
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries, making translation a no-op.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites a host path into its container form, or `None` if no entry
    /// matches.
    #[must_use]
    pub fn translate_forward(&self, path: &str) -> Option<String> {
        self.entries.iter().find_map(|entry| entry.forward(path))
    }

    /// Rewrites a container path into its host form, or `None` if no entry
    /// matches.
    #[must_use]
    pub fn translate_backward(&self, path: &str) -> Option<String> {
        self.entries.iter().find_map(|entry| entry.backward(path))
    }

    /// Forward translation into a reusable buffer; returns whether an entry
    /// matched. `out` is untouched on a miss.
    pub fn translate_forward_into(&self, path: &str, out: &mut String) -> bool {
        self.entries.iter().any(|entry| entry.forward_into(path, out))
    }

    /// Backward translation into a reusable buffer; returns whether an entry
    /// matched. `out` is untouched on a miss.
    pub fn translate_backward_into(&self, path: &str, out: &mut String) -> bool {
        self.entries.iter().any(|entry| entry.backward_into(path, out))
    }
}

/// Renders the table back into the environment format.
impl fmt::Display for MappingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", constants::LIST_SEPARATOR)?;
            }
            write!(
                f,
                "{}{}{}",
                entry.host_prefix(),
                constants::PAIR_SEPARATOR,
                entry.container_prefix()
            )?;
        }
        Ok(())
    }
}

/// Splits on the first `:` that is not the colon of a leading drive letter,
/// so `D:/path:E:/other` yields `("D:/path", "E:/other")`.
fn split_pair(raw: &str) -> Option<(&str, &str)> {
    let start = if path::split_drive(raw).is_some() { 2 } else { 0 };
    let offset = raw[start..].find(constants::PAIR_SEPARATOR)?;
    let at = start + offset;
    Some((&raw[..at], &raw[at + 1..]))
}
