//! Settings for the preload library and the overlay orchestrator.
//!
//! Both are read from the process environment; the overlay settings can
//! additionally be loaded from a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{PathbridgeError, Result};

/// Settings consumed by the overlay orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Directories to overlay in place.
    pub roots: Vec<PathBuf>,
    /// Directory under which bind aliases are created.
    pub scratch_dir: PathBuf,
    /// FUSE daemon binary name or path.
    pub fuse_binary: String,
    /// Bounded wait for mount activation, in milliseconds.
    pub timeout_ms: u64,
    /// Interval between readiness checks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Pass `allow_other` to the daemon.
    pub allow_other: bool,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            scratch_dir: constants::default_scratch_dir(),
            fuse_binary: constants::DEFAULT_FUSE_BINARY.to_string(),
            timeout_ms: constants::DEFAULT_OVERLAY_TIMEOUT_MS,
            poll_interval_ms: constants::DEFAULT_OVERLAY_POLL_MS,
            allow_other: false,
        }
    }
}

impl OverlaySettings {
    /// Reads settings from the process environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(roots) = lookup(constants::ENV_OVERLAY_ROOTS) {
            settings.roots = split_list(&roots).map(PathBuf::from).collect();
        }
        if let Some(dir) = non_empty(lookup(constants::ENV_SCRATCH_DIR)) {
            settings.scratch_dir = PathBuf::from(dir);
        }
        if let Some(binary) = non_empty(lookup(constants::ENV_FUSE_BINARY)) {
            settings.fuse_binary = binary;
        }
        if let Some(raw) = non_empty(lookup(constants::ENV_OVERLAY_TIMEOUT_MS)) {
            settings.timeout_ms = parse_millis(constants::ENV_OVERLAY_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(constants::ENV_OVERLAY_POLL_MS)) {
            settings.poll_interval_ms = parse_millis(constants::ENV_OVERLAY_POLL_MS, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(constants::ENV_ALLOW_OTHER)) {
            settings.allow_other = parse_flag(constants::ENV_ALLOW_OTHER, &raw)?;
        }
        settings.check()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| PathbridgeError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Self = serde_json::from_str(&raw)?;
        settings.check()?;
        Ok(settings)
    }

    /// Bounded wait for mount activation.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Interval between readiness checks.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn check(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(PathbridgeError::Config {
                message: "poll_interval_ms must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Settings consumed by the preload library at initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadSettings {
    /// Raw mapping table string.
    pub mappings: Option<String>,
    /// Legacy Windows-original path paired with the working directory.
    pub original_path: Option<String>,
    /// `tracing` filter directive; diagnostics stay off when absent.
    pub log_filter: Option<String>,
}

impl PreloadSettings {
    /// Reads settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            mappings: non_empty(lookup(constants::ENV_PATH_MAPPINGS)),
            original_path: non_empty(lookup(constants::ENV_ORIGINAL_PATH)),
            log_filter: non_empty(lookup(constants::ENV_PRELOAD_LOG)),
        }
    }

    /// Whether any mapping source is configured at all.
    #[must_use]
    pub const fn has_mappings(&self) -> bool {
        self.mappings.is_some() || self.original_path.is_some()
    }
}

/// Splits a `;`-separated list, skipping blank items.
pub fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(constants::LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_millis(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse().map_err(|_| PathbridgeError::Config {
        message: format!("{key} must be a number of milliseconds, got {raw:?}"),
    })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PathbridgeError::Config {
            message: format!("{key} must be a boolean, got {raw:?}"),
        }),
    }
}
