//! Private alias locations for bind-mounted directories.

use std::path::{Path, PathBuf};

/// Flattens a target path into a single file name by replacing every `/`
/// with `-`, so `/home/n/.config` becomes `-home-n-.config`.
#[must_use]
pub fn encode(target: &Path) -> String {
    target.to_string_lossy().replace('/', "-")
}

/// The alias directory for `target` under `scratch`.
#[must_use]
pub fn alias_path(scratch: &Path, target: &Path) -> PathBuf {
    scratch.join(encode(target))
}
