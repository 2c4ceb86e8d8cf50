//! The FUSE daemon child process.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// How long a daemon gets to exit after `SIGTERM` before it is killed.
const STOP_GRACE: Duration = Duration::from_millis(500);
const STOP_POLL: Duration = Duration::from_millis(10);

/// How to launch the daemon for one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSpec {
    /// Resolved daemon binary.
    pub binary: PathBuf,
    /// Bind alias the daemon reads from.
    pub source: PathBuf,
    /// Directory the daemon mounts over.
    pub target: PathBuf,
    /// Owner reported for served files.
    pub uid: u32,
    /// Group reported for served files.
    pub gid: u32,
    /// Let users other than the mounter access the mount.
    pub allow_other: bool,
}

impl DaemonSpec {
    /// Builds a spec owned by the current user.
    #[must_use]
    pub fn new(binary: &Path, source: &Path, target: &Path, allow_other: bool) -> Self {
        Self {
            binary: binary.to_path_buf(),
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
            allow_other,
        }
    }

    /// The `-o` option string.
    #[must_use]
    pub fn options(&self) -> String {
        let mut options = format!(
            "source={},uid={},gid={}",
            self.source.display(),
            self.uid,
            self.gid
        );
        if self.allow_other {
            options.push_str(",allow_other");
        }
        options
    }

    /// Full argument list: foreground, options, then the mount point.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "-f".into(),
            "-o".into(),
            self.options().into(),
            self.target.clone().into_os_string(),
        ]
    }

    /// A command with stdio detached from the orchestrator.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        let _ = cmd
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

/// A running (or exited) daemon.
///
/// Dropping the handle leaves the process running.
#[derive(Debug)]
pub struct DaemonHandle {
    child: Child,
}

impl DaemonHandle {
    /// Wraps a spawned child.
    #[must_use]
    pub const fn new(child: Child) -> Self {
        Self { child }
    }

    /// Process id of the daemon.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Exit status if the daemon has already exited, without blocking.
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    /// Stops and reaps the daemon: `SIGTERM`, a bounded wait, then `SIGKILL`.
    /// An already-exited daemon is not an error.
    pub fn terminate(&mut self) {
        if self.exit_status().is_none() && !self.stop_gracefully() {
            tracing::debug!(pid = self.child.id(), "daemon ignored SIGTERM, killing");
            let _ = self.child.kill();
        }
        match self.child.wait() {
            Ok(status) => tracing::debug!(pid = self.child.id(), %status, "daemon reaped"),
            Err(e) => tracing::warn!(pid = self.child.id(), error = %e, "failed to reap daemon"),
        }
    }

    /// Sends `SIGTERM` and waits up to [`STOP_GRACE`] for the exit.
    fn stop_gracefully(&mut self) -> bool {
        let Ok(raw) = i32::try_from(self.child.id()) else {
            return false;
        };
        if signal::kill(Pid::from_raw(raw), Signal::SIGTERM).is_err() {
            return false;
        }
        let deadline = Instant::now() + STOP_GRACE;
        while Instant::now() < deadline {
            if self.exit_status().is_some() {
                return true;
            }
            std::thread::sleep(STOP_POLL);
        }
        self.exit_status().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(allow_other: bool) -> DaemonSpec {
        DaemonSpec {
            binary: PathBuf::from("/usr/bin/pathbridge-fuse"),
            source: PathBuf::from("/tmp/scratch/-cfg"),
            target: PathBuf::from("/cfg"),
            uid: 1000,
            gid: 100,
            allow_other,
        }
    }

    #[test]
    fn options_carry_source_and_owner() {
        assert_eq!(spec(false).options(), "source=/tmp/scratch/-cfg,uid=1000,gid=100");
        assert!(spec(true).options().ends_with(",allow_other"));
    }

    #[test]
    fn args_are_foreground_then_mount_point() {
        let args = spec(false).args();
        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "-o");
        assert_eq!(args[3], "/cfg");
    }

    #[test]
    fn terminate_tolerates_exited_process() {
        let child = Command::new("true").spawn().expect("spawn true");
        let mut handle = DaemonHandle::new(child);
        std::thread::sleep(Duration::from_millis(50));
        handle.terminate();
        handle.terminate();
    }

    #[test]
    fn exit_status_reports_running_daemon_as_none() {
        let child = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
        let mut handle = DaemonHandle::new(child);
        assert!(handle.exit_status().is_none());
        handle.terminate();
        assert!(handle.exit_status().is_some());
    }

    #[test]
    fn terminate_asks_politely_first() {
        use std::os::unix::process::ExitStatusExt;

        let child = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
        let mut handle = DaemonHandle::new(child);
        handle.terminate();
        let status = handle.exit_status().expect("reaped");
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[test]
    fn terminate_kills_daemon_ignoring_sigterm() {
        use std::os::unix::process::ExitStatusExt;

        let child = Command::new("sh")
            .args(["-c", "trap '' TERM; exec sleep 30"])
            .spawn()
            .expect("spawn sh");
        let mut handle = DaemonHandle::new(child);
        std::thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        handle.terminate();
        assert!(started.elapsed() >= STOP_GRACE);
        let status = handle.exit_status().expect("reaped");
        assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
    }
}
