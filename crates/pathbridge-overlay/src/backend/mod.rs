//! Platform operations behind the overlay state machine.

pub mod linux;

use std::path::{Path, PathBuf};

use pathbridge_common::error::Result;

use crate::daemon::{DaemonHandle, DaemonSpec};

/// The privileged operations the orchestrator needs.
///
/// Implementors perform the mount syscalls and process management; the
/// orchestrator owns sequencing, polling, and rollback.
pub trait OverlayBackend: Send + Sync {
    /// Resolves the daemon binary before anything is mounted.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary cannot be found.
    fn preflight(&self, binary: &str) -> Result<PathBuf>;

    /// Bind-mounts `target` (recursively) onto `alias`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mount is refused.
    fn bind(&self, target: &Path, alias: &Path) -> Result<()>;

    /// Lazily detaches the mount at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmount is refused.
    fn unbind(&self, path: &Path) -> Result<()>;

    /// Starts the daemon described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn spawn_daemon(&self, spec: &DaemonSpec) -> Result<DaemonHandle>;

    /// Whether `path` is the root of a mount.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` or its parent cannot be queried.
    fn is_mount_point(&self, path: &Path) -> Result<bool>;

    /// Device id of the filesystem containing `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be queried.
    fn device_id(&self, path: &Path) -> Result<u64>;
}
