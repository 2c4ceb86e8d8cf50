//! Integration tests for the overlay setup state machine.
//!
//! A fake backend stands in for the kernel: it records mount calls and
//! spawns real short-lived processes as daemons, so the timeout, early-exit,
//! and rollback paths run for real without privileges.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use pathbridge_common::config::OverlaySettings;
use pathbridge_common::error::{PathbridgeError, Result};
use pathbridge_common::types::MountState;
use pathbridge_overlay::{
    DaemonHandle, DaemonSpec, LinuxOverlayBackend, Orchestrator, OverlayBackend, alias,
};
use tempfile::TempDir;

/// Polls after which a non-hung target reports its new mount.
const READY_AFTER: usize = 3;

#[derive(Default)]
struct FakeBackend {
    hung: HashSet<PathBuf>,
    /// Targets whose mount only shows up once their daemon is gone.
    late: HashSet<PathBuf>,
    exits_early: bool,
    fail_bind: bool,
    polls: Mutex<HashMap<PathBuf, usize>>,
    unbound: Mutex<Vec<PathBuf>>,
    detached: Mutex<HashSet<PathBuf>>,
    spawned: Mutex<Vec<u32>>,
    daemons: Mutex<HashMap<PathBuf, u32>>,
}

impl FakeBackend {
    fn mounted(&self, path: &Path) -> bool {
        if self.hung.contains(path) || self.detached.lock().unwrap().contains(path) {
            return false;
        }
        if self.late.contains(path) {
            return self
                .daemons
                .lock()
                .unwrap()
                .get(path)
                .is_some_and(|&pid| !is_running(pid));
        }
        self.polls.lock().unwrap().get(path).copied().unwrap_or(0) >= READY_AFTER
    }
}

impl OverlayBackend for FakeBackend {
    fn preflight(&self, binary: &str) -> Result<PathBuf> {
        Ok(PathBuf::from(binary))
    }

    fn bind(&self, _target: &Path, alias: &Path) -> Result<()> {
        if self.fail_bind {
            return Err(PathbridgeError::Io {
                path: alias.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        Ok(())
    }

    fn unbind(&self, path: &Path) -> Result<()> {
        self.unbound.lock().unwrap().push(path.to_path_buf());
        let _ = self.detached.lock().unwrap().insert(path.to_path_buf());
        Ok(())
    }

    fn spawn_daemon(&self, spec: &DaemonSpec) -> Result<DaemonHandle> {
        let mut cmd = if self.exits_early {
            Command::new("false")
        } else {
            let mut cmd = Command::new("sleep");
            let _ = cmd.arg("30");
            cmd
        };
        let child = cmd.spawn().expect("spawn stand-in daemon");
        self.spawned.lock().unwrap().push(child.id());
        let _ = self
            .daemons
            .lock()
            .unwrap()
            .insert(spec.target.clone(), child.id());
        Ok(DaemonHandle::new(child))
    }

    fn is_mount_point(&self, path: &Path) -> Result<bool> {
        *self
            .polls
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default() += 1;
        Ok(self.mounted(path))
    }

    fn device_id(&self, path: &Path) -> Result<u64> {
        Ok(if self.mounted(path) { 99 } else { 1 })
    }
}

fn settings(scratch: &TempDir, timeout_ms: u64) -> OverlaySettings {
    OverlaySettings {
        scratch_dir: scratch.path().to_path_buf(),
        fuse_binary: "fake-fuse".into(),
        timeout_ms,
        poll_interval_ms: 20,
        ..OverlaySettings::default()
    }
}

fn root_dir(parent: &TempDir, name: &str) -> PathBuf {
    let root = parent.path().join(name);
    std::fs::create_dir_all(&root).expect("create root");
    root
}

fn pid(raw: u32) -> Pid {
    Pid::from_raw(i32::try_from(raw).expect("pid fits"))
}

fn is_running(raw: u32) -> bool {
    kill(pid(raw), None).is_ok()
}

fn assert_reaped(raw: u32) {
    assert_eq!(kill(pid(raw), None), Err(Errno::ESRCH), "daemon {raw} still exists");
}

fn stage_of(error: Option<&PathbridgeError>) -> &'static str {
    match error {
        Some(PathbridgeError::MountSetup { stage, .. }) => *stage,
        other => panic!("expected a setup failure, got {other:?}"),
    }
}

// ── Success ─────────────────────────────────────────────────────────

#[test]
fn daemon_that_mounts_reaches_fuse_active() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = root_dir(&roots, "cfg");

    let orchestrator = Orchestrator::new(FakeBackend::default(), settings(&scratch, 2_000));
    let mut mount = orchestrator.setup_root(&target);

    assert_eq!(mount.state(), MountState::FuseActive);
    assert!(mount.failure().is_none());
    assert!(mount.alias().is_dir());
    assert!(orchestrator.backend().unbound.lock().unwrap().is_empty());

    let mut daemon = mount.take_daemon().expect("daemon attached");
    daemon.terminate();
}

// ── Hung daemon ─────────────────────────────────────────────────────

#[test]
fn hung_daemon_times_out_and_rolls_back() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = root_dir(&roots, "cfg");

    let backend = FakeBackend {
        hung: HashSet::from([target.clone()]),
        ..FakeBackend::default()
    };
    let orchestrator = Orchestrator::new(backend, settings(&scratch, 300));

    let started = Instant::now();
    let mount = orchestrator.setup_root(&target);
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    assert_eq!(mount.state(), MountState::Unmounted);
    assert_eq!(stage_of(mount.failure()), "fuse");
    assert!(mount.daemon_pid().is_none());
    assert!(!mount.alias().exists(), "alias directory left behind");

    let backend = orchestrator.backend();
    assert_eq!(*backend.unbound.lock().unwrap(), vec![mount.alias().to_path_buf()]);
    let spawned = backend.spawned.lock().unwrap();
    assert_eq!(spawned.len(), 1);
    assert_reaped(spawned[0]);
}

#[test]
fn wait_stops_at_the_deadline_not_the_next_poll() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = root_dir(&roots, "cfg");

    let backend = FakeBackend {
        hung: HashSet::from([target.clone()]),
        ..FakeBackend::default()
    };
    let mut settings = settings(&scratch, 300);
    settings.poll_interval_ms = 1_000;
    let orchestrator = Orchestrator::new(backend, settings);

    let started = Instant::now();
    let mount = orchestrator.setup_root(&target);
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "returned after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(900), "overshot to {elapsed:?}");
    assert_eq!(stage_of(mount.failure()), "fuse");
}

#[test]
fn mount_landing_after_the_deadline_is_detached() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = root_dir(&roots, "cfg");

    let backend = FakeBackend {
        late: HashSet::from([target.clone()]),
        ..FakeBackend::default()
    };
    let orchestrator = Orchestrator::new(backend, settings(&scratch, 200));
    let mount = orchestrator.setup_root(&target);

    assert_eq!(mount.state(), MountState::Unmounted);
    assert_eq!(stage_of(mount.failure()), "fuse");
    assert!(!mount.alias().exists());

    let backend = orchestrator.backend();
    assert!(
        !backend.is_mount_point(&target).expect("query target"),
        "target left mounted behind a dead daemon"
    );
    assert_eq!(
        *backend.unbound.lock().unwrap(),
        vec![target.clone(), mount.alias().to_path_buf()]
    );
    assert_reaped(backend.spawned.lock().unwrap()[0]);
}

#[test]
fn early_daemon_exit_fails_fast() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = root_dir(&roots, "cfg");

    let backend = FakeBackend {
        hung: HashSet::from([target.clone()]),
        exits_early: true,
        ..FakeBackend::default()
    };
    let orchestrator = Orchestrator::new(backend, settings(&scratch, 10_000));

    let started = Instant::now();
    let mount = orchestrator.setup_root(&target);

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(mount.state(), MountState::Unmounted);
    assert!(mount.failure().expect("failure").to_string().contains("exited"));
    assert!(!mount.alias().exists());
}

// ── Bind and preflight failures ─────────────────────────────────────

#[test]
fn bind_failure_removes_alias_and_skips_daemon() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = root_dir(&roots, "cfg");

    let backend = FakeBackend {
        fail_bind: true,
        ..FakeBackend::default()
    };
    let orchestrator = Orchestrator::new(backend, settings(&scratch, 300));
    let mount = orchestrator.setup_root(&target);

    assert_eq!(mount.state(), MountState::Unmounted);
    assert_eq!(stage_of(mount.failure()), "bind");
    assert!(!mount.alias().exists());
    assert!(orchestrator.backend().spawned.lock().unwrap().is_empty());
}

#[test]
fn missing_target_fails_preflight() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = roots.path().join("absent");

    let orchestrator = Orchestrator::new(FakeBackend::default(), settings(&scratch, 300));
    let mount = orchestrator.setup_root(&target);

    assert_eq!(mount.state(), MountState::Unmounted);
    assert_eq!(stage_of(mount.failure()), "preflight");
    assert!(!mount.alias().exists());
}

#[test]
fn traversal_target_fails_preflight() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = roots.path().join("a").join("..").join("b");

    let orchestrator = Orchestrator::new(FakeBackend::default(), settings(&scratch, 300));
    let mount = orchestrator.setup_root(&target);

    assert_eq!(stage_of(mount.failure()), "preflight");
    assert!(mount.failure().expect("failure").to_string().contains(".."));
}

#[test]
fn missing_fuse_binary_degrades_to_plain_directory() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = root_dir(&roots, "cfg");
    std::fs::write(target.join("file.txt"), "still here").expect("write file");

    let mut settings = settings(&scratch, 300);
    settings.fuse_binary = "pathbridge-fuse-not-installed".into();
    let orchestrator = Orchestrator::new(LinuxOverlayBackend::new(), settings);
    let mount = orchestrator.setup_root(&target);

    assert_eq!(mount.state(), MountState::Unmounted);
    assert_eq!(stage_of(mount.failure()), "preflight");
    assert!(!mount.alias().exists());
    assert_eq!(
        std::fs::read_to_string(target.join("file.txt")).expect("read file"),
        "still here"
    );
}

// ── Multiple roots ──────────────────────────────────────────────────

#[test]
fn roots_are_independent() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let good = root_dir(&roots, "good");
    let hung = root_dir(&roots, "hung");
    let absent = roots.path().join("absent");

    let backend = FakeBackend {
        hung: HashSet::from([hung.clone()]),
        ..FakeBackend::default()
    };
    let orchestrator = Orchestrator::new(backend, settings(&scratch, 300));
    let mut mounts = orchestrator.setup_roots(&[good.clone(), hung.clone(), absent.clone()]);

    assert_eq!(mounts.len(), 3);
    assert_eq!(mounts[0].target(), good);
    assert_eq!(mounts[0].state(), MountState::FuseActive);
    assert_eq!(mounts[1].target(), hung);
    assert_eq!(mounts[1].state(), MountState::Unmounted);
    assert_eq!(stage_of(mounts[1].failure()), "fuse");
    assert_eq!(mounts[2].target(), absent);
    assert_eq!(stage_of(mounts[2].failure()), "preflight");

    mounts[0].take_daemon().expect("daemon attached").terminate();
}

#[test]
fn colliding_aliases_refuse_the_later_root() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let dashed = root_dir(&roots, "a-b");
    let nested = root_dir(&roots, "a/b");
    assert_eq!(
        alias::alias_path(scratch.path(), &dashed),
        alias::alias_path(scratch.path(), &nested)
    );

    let orchestrator = Orchestrator::new(FakeBackend::default(), settings(&scratch, 2_000));
    let mut mounts = orchestrator.setup_roots(&[dashed, nested]);

    assert_eq!(mounts[0].state(), MountState::FuseActive);
    assert_eq!(mounts[1].state(), MountState::Unmounted);
    assert!(
        mounts[1]
            .failure()
            .expect("failure")
            .to_string()
            .contains("collides")
    );

    mounts[0].take_daemon().expect("daemon attached").terminate();
}

#[test]
fn no_roots_is_a_no_op() {
    let scratch = tempfile::tempdir().expect("scratch");
    let orchestrator = Orchestrator::new(FakeBackend::default(), settings(&scratch, 300));
    assert!(orchestrator.setup_all().is_empty());
}

// ── Real kernel ─────────────────────────────────────────────────────

/// Needs root, FUSE, and a daemon named by `PATHBRIDGE_FUSE_BIN`.
#[test]
#[ignore = "requires root and a FUSE daemon"]
fn live_overlay_serves_original_path() {
    let scratch = tempfile::tempdir().expect("scratch");
    let roots = tempfile::tempdir().expect("roots");
    let target = root_dir(&roots, "cfg");
    std::fs::write(target.join("served.txt"), "served").expect("write file");

    let mut settings = OverlaySettings::from_env().expect("settings");
    settings.scratch_dir = scratch.path().to_path_buf();
    let orchestrator = Orchestrator::new(LinuxOverlayBackend::new(), settings);
    let mut mount = orchestrator.setup_root(&target);

    assert_eq!(mount.state(), MountState::FuseActive, "{mount}");
    let backend = LinuxOverlayBackend::new();
    assert!(backend.is_mount_point(&target).expect("stat target"));
    assert_eq!(
        std::fs::read_to_string(target.join("served.txt")).expect("read through overlay"),
        "served"
    );

    std::fs::write(target.join("down.txt"), "down").expect("write through overlay");
    assert_eq!(
        std::fs::read_to_string(mount.alias().join("down.txt")).expect("read via alias"),
        "down"
    );
    std::fs::write(mount.alias().join("up.txt"), "up").expect("write via alias");
    assert_eq!(
        std::fs::read_to_string(target.join("up.txt")).expect("read through overlay"),
        "up"
    );

    backend.unbind(&target).expect("detach overlay");
    mount.take_daemon().expect("daemon").terminate();
    backend.unbind(mount.alias()).expect("detach alias");
}
