//! Per-root overlay record.

use std::fmt;
use std::path::{Path, PathBuf};

use pathbridge_common::error::PathbridgeError;
use pathbridge_common::types::MountState;

use crate::daemon::DaemonHandle;

/// Outcome of setting up one overlay root.
#[derive(Debug)]
pub struct OverlayMount {
    target: PathBuf,
    alias: PathBuf,
    state: MountState,
    daemon: Option<DaemonHandle>,
    failure: Option<PathbridgeError>,
}

impl OverlayMount {
    /// A fresh, unmounted record.
    #[must_use]
    pub const fn new(target: PathBuf, alias: PathBuf) -> Self {
        Self {
            target,
            alias,
            state: MountState::Unmounted,
            daemon: None,
            failure: None,
        }
    }

    /// The directory being virtualized.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The private bind alias of the target.
    #[must_use]
    pub fn alias(&self) -> &Path {
        &self.alias
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> MountState {
        self.state
    }

    /// Whether the FUSE daemon is serving the target.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Why setup did not reach `FuseActive`, if it did not.
    #[must_use]
    pub const fn failure(&self) -> Option<&PathbridgeError> {
        self.failure.as_ref()
    }

    /// Process id of the daemon while one is attached.
    #[must_use]
    pub fn daemon_pid(&self) -> Option<u32> {
        self.daemon.as_ref().map(DaemonHandle::id)
    }

    /// Detaches the daemon handle, e.g. to supervise it elsewhere.
    pub fn take_daemon(&mut self) -> Option<DaemonHandle> {
        self.daemon.take()
    }

    pub(crate) fn set_state(&mut self, state: MountState) {
        tracing::debug!(
            target = %self.target.display(),
            from = %self.state,
            to = %state,
            "overlay state"
        );
        self.state = state;
    }

    pub(crate) fn attach_daemon(&mut self, daemon: DaemonHandle) {
        self.daemon = Some(daemon);
    }

    pub(crate) fn daemon_mut(&mut self) -> Option<&mut DaemonHandle> {
        self.daemon.as_mut()
    }

    pub(crate) fn record_failure(mut self, error: PathbridgeError) -> Self {
        tracing::warn!(
            target = %self.target.display(),
            state = %self.state,
            error = %error,
            "overlay not established, directory left as is"
        );
        self.failure = Some(error);
        self
    }
}

/// One report line: `<target>: <state>` plus the failure, if any.
impl fmt::Display for OverlayMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target.display(), self.state)?;
        if let Some(ref failure) = self.failure {
            write!(f, " ({failure})")?;
        }
        Ok(())
    }
}
