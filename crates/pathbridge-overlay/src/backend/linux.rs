//! Linux backend using `mount(2)`, `umount2(2)` and `stat(2)` directly.

use std::path::{Path, PathBuf};

use nix::mount::{MntFlags, MsFlags};
use nix::sys::stat::{FileStat, stat};
use pathbridge_common::error::{PathbridgeError, Result};

use super::OverlayBackend;
use crate::daemon::{DaemonHandle, DaemonSpec};

/// Backend that talks to the Linux kernel directly.
///
/// Binding and unmounting need `CAP_SYS_ADMIN` in the current mount
/// namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxOverlayBackend;

impl LinuxOverlayBackend {
    /// Creates a new Linux backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl OverlayBackend for LinuxOverlayBackend {
    fn preflight(&self, binary: &str) -> Result<PathBuf> {
        which::which(binary).map_err(|e| PathbridgeError::Config {
            message: format!("FUSE daemon {binary:?} not found: {e}"),
        })
    }

    fn bind(&self, target: &Path, alias: &Path) -> Result<()> {
        nix::mount::mount(
            Some(target),
            alias,
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REC,
            None::<&str>,
        )
        .map_err(|e| PathbridgeError::Io {
            path: alias.to_path_buf(),
            source: e.into(),
        })?;
        tracing::debug!(target = %target.display(), alias = %alias.display(), "bind alias mounted");
        Ok(())
    }

    fn unbind(&self, path: &Path) -> Result<()> {
        nix::mount::umount2(path, MntFlags::MNT_DETACH).map_err(|e| PathbridgeError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        tracing::debug!(path = %path.display(), "mount detached");
        Ok(())
    }

    fn spawn_daemon(&self, spec: &DaemonSpec) -> Result<DaemonHandle> {
        tracing::info!(
            binary = %spec.binary.display(),
            target = %spec.target.display(),
            "spawning FUSE daemon"
        );
        spec.command()
            .spawn()
            .map(DaemonHandle::new)
            .map_err(|e| PathbridgeError::Io {
                path: spec.binary.clone(),
                source: e,
            })
    }

    fn is_mount_point(&self, path: &Path) -> Result<bool> {
        let own = query(path)?;
        let parent = query(path.parent().unwrap_or_else(|| Path::new("/")))?;
        Ok(own.st_dev != parent.st_dev || own.st_ino == parent.st_ino)
    }

    fn device_id(&self, path: &Path) -> Result<u64> {
        Ok(query(path)?.st_dev)
    }
}

fn query(path: &Path) -> Result<FileStat> {
    stat(path).map_err(|e| PathbridgeError::Io {
        path: path.to_path_buf(),
        source: e.into(),
    })
}
