//! Domain primitive types shared across the pathbridge workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an in-place overlay over one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MountState {
    /// Nothing is mounted; the directory is a plain, non-virtualized path.
    Unmounted,
    /// The directory is bind-mounted onto its private alias.
    BindAliased,
    /// The FUSE daemon serves the directory at its original path.
    FuseActive,
    /// Rollback could not fully undo a failed setup.
    Failed,
}

impl MountState {
    /// Whether the overlay is serving requests.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::FuseActive)
    }
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmounted => write!(f, "unmounted"),
            Self::BindAliased => write!(f, "bind-aliased"),
            Self::FuseActive => write!(f, "fuse-active"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
