//! Environment variable names and default values.

use std::path::PathBuf;

/// Full mapping table: `host1:container1;host2:container2;...`.
pub const ENV_PATH_MAPPINGS: &str = "PATHBRIDGE_PATH_MAPPINGS";

/// Legacy single-pair variable: one Windows-original path, paired with the
/// process working directory at initialization.
pub const ENV_ORIGINAL_PATH: &str = "PATHBRIDGE_ORIGINAL_PATH";

/// Optional `tracing` filter directive for diagnostics inside the preload library.
pub const ENV_PRELOAD_LOG: &str = "PATHBRIDGE_LOG";

/// `;`-separated list of directories to overlay at startup.
pub const ENV_OVERLAY_ROOTS: &str = "PATHBRIDGE_OVERLAY_ROOTS";

/// Name or path of the FUSE overlay daemon.
pub const ENV_FUSE_BINARY: &str = "PATHBRIDGE_FUSE_BIN";

/// Directory under which bind aliases are created.
pub const ENV_SCRATCH_DIR: &str = "PATHBRIDGE_SCRATCH_DIR";

/// Upper bound on the wait for a FUSE mount to become active, in milliseconds.
pub const ENV_OVERLAY_TIMEOUT_MS: &str = "PATHBRIDGE_OVERLAY_TIMEOUT_MS";

/// Interval between mount readiness checks, in milliseconds.
pub const ENV_OVERLAY_POLL_MS: &str = "PATHBRIDGE_OVERLAY_POLL_MS";

/// Whether the daemon receives `allow_other` (`1`/`true`/`yes` to enable).
pub const ENV_ALLOW_OTHER: &str = "PATHBRIDGE_ALLOW_OTHER";

/// Separator between entries of the mapping table and the overlay root list.
pub const LIST_SEPARATOR: char = ';';

/// Separator between the host and container side of a mapping entry.
pub const PAIR_SEPARATOR: char = ':';

/// Default FUSE daemon binary name, resolved through `PATH`.
pub const DEFAULT_FUSE_BINARY: &str = "pathbridge-fuse";

/// Default bounded wait for mount activation.
pub const DEFAULT_OVERLAY_TIMEOUT_MS: u64 = 5_000;

/// Default interval between readiness checks.
pub const DEFAULT_OVERLAY_POLL_MS: u64 = 100;

/// Returns the default scratch root for bind aliases.
///
/// Scoped to the current process id so two orchestrators never share aliases.
pub fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("pathbridge-{}", std::process::id()))
}

/// Application name used in CLI output.
pub const APP_NAME: &str = "pathbridge";
