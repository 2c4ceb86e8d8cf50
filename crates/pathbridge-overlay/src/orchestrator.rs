//! The per-root setup state machine.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Instant;

use pathbridge_common::config::OverlaySettings;
use pathbridge_common::error::{PathbridgeError, Result};
use pathbridge_common::types::MountState;

use crate::alias;
use crate::backend::OverlayBackend;
use crate::daemon::DaemonSpec;
use crate::mount::OverlayMount;

/// Sets up in-place overlays at process start.
///
/// Every root is independent: one root failing, hanging, or being
/// misconfigured never affects another, and no failure is returned to the
/// caller. Inspect each [`OverlayMount`] for the outcome.
#[derive(Debug)]
pub struct Orchestrator<B> {
    backend: B,
    settings: OverlaySettings,
}

impl<B: OverlayBackend> Orchestrator<B> {
    /// Creates an orchestrator over `backend`.
    #[must_use]
    pub const fn new(backend: B, settings: OverlaySettings) -> Self {
        Self { backend, settings }
    }

    /// The settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    /// The backend in use.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Sets up every configured root.
    #[must_use]
    pub fn setup_all(&self) -> Vec<OverlayMount> {
        self.setup_roots(&self.settings.roots)
    }

    /// Sets up `roots` concurrently, one scoped thread per root.
    ///
    /// Results come back in the order of `roots`. A root whose alias would
    /// collide with an earlier root's alias is refused during preflight.
    #[must_use]
    pub fn setup_roots(&self, roots: &[PathBuf]) -> Vec<OverlayMount> {
        let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
        let mut collisions = HashMap::new();
        for root in roots {
            let alias = alias::alias_path(&self.settings.scratch_dir, root);
            match claimed.get(&alias) {
                Some(owner) => {
                    let _ = collisions.insert(root.as_path(), owner.to_path_buf());
                }
                None => {
                    let _ = claimed.insert(alias, root.as_path());
                }
            }
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = roots
                .iter()
                .map(|root| {
                    let owner = collisions.get(root.as_path());
                    scope.spawn(move || match owner {
                        Some(owner) => self.refuse(
                            root,
                            setup_error(
                                root,
                                "preflight",
                                format!("alias collides with {}", owner.display()),
                            ),
                        ),
                        None => self.setup_root(root),
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(roots)
                .map(|(handle, root)| {
                    handle.join().unwrap_or_else(|_| {
                        let mut mount = self.refuse(
                            root,
                            setup_error(root, "setup", "setup thread panicked"),
                        );
                        mount.set_state(MountState::Failed);
                        mount
                    })
                })
                .collect()
        })
    }

    /// Drives one root through `Unmounted → BindAliased → FuseActive`,
    /// rolling back to `Unmounted` on any failure.
    #[must_use]
    pub fn setup_root(&self, target: &Path) -> OverlayMount {
        let alias = alias::alias_path(&self.settings.scratch_dir, target);
        let mut mount = OverlayMount::new(target.to_path_buf(), alias);
        tracing::info!(
            target = %target.display(),
            alias = %mount.alias().display(),
            "setting up overlay"
        );

        let binary = match self.preflight(target) {
            Ok(binary) => binary,
            Err(e) => return mount.record_failure(e),
        };
        if let Err(e) = self.bind_alias(&mut mount) {
            return mount.record_failure(e);
        }
        let baseline = match self.backend.device_id(target) {
            Ok(device) => device,
            Err(e) => {
                self.rollback(&mut mount, None);
                return mount.record_failure(setup_error(target, "fuse", e));
            }
        };
        if let Err(e) = self.start_fuse(&mut mount, &binary, baseline) {
            self.rollback(&mut mount, Some(baseline));
            return mount.record_failure(e);
        }

        tracing::info!(
            target = %target.display(),
            pid = mount.daemon_pid(),
            "overlay active"
        );
        mount
    }

    fn refuse(&self, target: &Path, error: PathbridgeError) -> OverlayMount {
        let alias = alias::alias_path(&self.settings.scratch_dir, target);
        OverlayMount::new(target.to_path_buf(), alias).record_failure(error)
    }

    /// Checks the target and resolves the daemon before touching any mount.
    fn preflight(&self, target: &Path) -> Result<PathBuf> {
        let text = target
            .to_str()
            .ok_or_else(|| setup_error(target, "preflight", "path is not valid UTF-8"))?;
        pathbridge_core::path::validate(text).map_err(|e| setup_error(target, "preflight", e))?;
        if !target.is_absolute() {
            return Err(setup_error(target, "preflight", "path is not absolute"));
        }
        if !target.is_dir() {
            return Err(setup_error(target, "preflight", "not an existing directory"));
        }
        self.backend
            .preflight(&self.settings.fuse_binary)
            .map_err(|e| setup_error(target, "preflight", e))
    }

    /// `Unmounted → BindAliased`. On failure the alias directory is removed.
    fn bind_alias(&self, mount: &mut OverlayMount) -> Result<()> {
        let target = mount.target().to_path_buf();
        let alias = mount.alias().to_path_buf();
        std::fs::create_dir_all(&alias).map_err(|e| setup_error(&target, "bind", e))?;

        if let Err(e) = self.backend.bind(&target, &alias) {
            if let Err(rm) = std::fs::remove_dir(&alias) {
                tracing::warn!(
                    alias = %alias.display(),
                    error = %rm,
                    "failed to remove alias directory"
                );
            }
            return Err(setup_error(&target, "bind", e));
        }
        mount.set_state(MountState::BindAliased);
        Ok(())
    }

    /// `BindAliased → FuseActive`: spawn the daemon and wait for its mount.
    ///
    /// `baseline` is the target's device id before the daemon starts.
    fn start_fuse(&self, mount: &mut OverlayMount, binary: &Path, baseline: u64) -> Result<()> {
        let target = mount.target().to_path_buf();
        let spec = DaemonSpec::new(binary, mount.alias(), &target, self.settings.allow_other);
        let daemon = self
            .backend
            .spawn_daemon(&spec)
            .map_err(|e| setup_error(&target, "fuse", e))?;
        tracing::debug!(target = %target.display(), pid = daemon.id(), "daemon started");
        mount.attach_daemon(daemon);

        self.wait_until_ready(mount, baseline)?;
        mount.set_state(MountState::FuseActive);
        Ok(())
    }

    /// Polls until the target becomes a new mount, the daemon exits, or the
    /// timeout elapses.
    ///
    /// Ready means the target is a mount point whose device differs from
    /// `baseline`, so a target that already was a mount point does not
    /// count as served before the daemon has actually mounted.
    fn wait_until_ready(&self, mount: &mut OverlayMount, baseline: u64) -> Result<()> {
        let target = mount.target().to_path_buf();
        let deadline = Instant::now() + self.settings.timeout();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(self.settings.poll_interval().min(remaining));
            if self.is_served(&target, baseline) {
                return Ok(());
            }
            if let Some(status) = mount.daemon_mut().and_then(|d| d.exit_status()) {
                return Err(setup_error(
                    &target,
                    "fuse",
                    format!("daemon exited before mounting ({status})"),
                ));
            }
        }

        Err(setup_error(
            &target,
            "fuse",
            format!("not mounted within {} ms", self.settings.timeout_ms),
        ))
    }

    fn is_served(&self, target: &Path, baseline: u64) -> bool {
        self.backend.is_mount_point(target).unwrap_or(false)
            && self
                .backend
                .device_id(target)
                .is_ok_and(|device| device != baseline)
    }

    /// Undoes a partial setup: detach a mount that landed on the target,
    /// stop the daemon, detach the alias, remove the alias directory.
    ///
    /// The target is checked again once the daemon is gone, since a mount
    /// can still appear while it shuts down. Every step runs even if an
    /// earlier one fails; the root ends `Unmounted`, or `Failed` if
    /// anything was left behind.
    fn rollback(&self, mount: &mut OverlayMount, baseline: Option<u64>) {
        let mut clean = true;

        if let Some(mut daemon) = mount.take_daemon() {
            clean &= self.detach_late_mount(mount.target(), baseline);
            daemon.terminate();
            clean &= self.detach_late_mount(mount.target(), baseline);
        }
        if mount.state() == MountState::BindAliased {
            if let Err(e) = self.backend.unbind(mount.alias()) {
                tracing::warn!(
                    alias = %mount.alias().display(),
                    error = %e,
                    "failed to detach alias"
                );
                clean = false;
            }
        }
        match std::fs::remove_dir(mount.alias()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    alias = %mount.alias().display(),
                    error = %e,
                    "failed to remove alias directory"
                );
                clean = false;
            }
        }

        mount.set_state(if clean {
            MountState::Unmounted
        } else {
            MountState::Failed
        });
    }

    /// Lazily unmounts the target if a new mount sits on it. Returns `false`
    /// only when such a mount could not be detached.
    fn detach_late_mount(&self, target: &Path, baseline: Option<u64>) -> bool {
        if !baseline.is_some_and(|device| self.is_served(target, device)) {
            return true;
        }
        tracing::warn!(target = %target.display(), "mount appeared after the deadline, detaching");
        match self.backend.unbind(target) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(target = %target.display(), error = %e, "failed to detach target");
                false
            }
        }
    }
}

fn setup_error(target: &Path, stage: &'static str, cause: impl Display) -> PathbridgeError {
    PathbridgeError::MountSetup {
        target: target.to_path_buf(),
        stage,
        message: cause.to_string(),
    }
}
