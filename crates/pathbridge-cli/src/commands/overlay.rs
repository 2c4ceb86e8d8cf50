//! `pathbridge overlay`: Set up in-place FUSE overlays at container start.

use std::path::PathBuf;

use clap::Args;
use pathbridge_common::config::OverlaySettings;
use pathbridge_overlay::{LinuxOverlayBackend, Orchestrator};

use crate::output;

/// Arguments for the `overlay` command.
#[derive(Args, Debug)]
pub struct OverlayArgs {
    /// Directories to overlay; defaults to `PATHBRIDGE_OVERLAY_ROOTS`.
    pub roots: Vec<PathBuf>,

    /// JSON settings file, used instead of the environment.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bounded wait for each mount, in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Directory under which bind aliases are created.
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// FUSE daemon binary name or path.
    #[arg(long)]
    pub fuse_binary: Option<String>,
}

impl OverlayArgs {
    /// Loads the base settings and applies command-line overrides.
    fn settings(&self) -> anyhow::Result<OverlaySettings> {
        let mut settings = match self.config {
            Some(ref path) => OverlaySettings::load(path)?,
            None => OverlaySettings::from_env()?,
        };
        if !self.roots.is_empty() {
            settings.roots.clone_from(&self.roots);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(ref dir) = self.scratch_dir {
            settings.scratch_dir.clone_from(dir);
        }
        if let Some(ref binary) = self.fuse_binary {
            settings.fuse_binary.clone_from(binary);
        }
        Ok(settings)
    }
}

/// Executes the `overlay` command.
///
/// Roots that cannot be overlaid are reported and left as plain
/// directories; only unreadable settings make the command fail.
///
/// # Errors
///
/// Returns an error if the settings cannot be loaded.
pub fn execute(args: OverlayArgs) -> anyhow::Result<()> {
    let settings = args.settings()?;
    tracing::info!(
        roots = settings.roots.len(),
        scratch = %settings.scratch_dir.display(),
        "starting overlay setup"
    );

    let orchestrator = Orchestrator::new(LinuxOverlayBackend::new(), settings);
    let mounts = orchestrator.setup_all();
    if mounts.is_empty() {
        println!("No overlay roots configured.");
        return Ok(());
    }

    println!("{}", output::mount_header());
    for mount in &mounts {
        println!("{}", output::mount_row(mount));
    }

    let active = mounts.iter().filter(|m| m.is_active()).count();
    tracing::info!(active, degraded = mounts.len() - active, "overlay setup finished");
    Ok(())
}
