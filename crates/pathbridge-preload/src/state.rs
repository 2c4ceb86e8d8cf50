//! The process-wide mapping state.
//!
//! Built exactly once, on the first hooked call, from the process
//! environment. Until it exists every hook passes straight through.

use std::cell::Cell;
use std::sync::OnceLock;

use pathbridge_common::config::PreloadSettings;
use pathbridge_core::{MappingEntry, MappingTable};
use tracing_subscriber::EnvFilter;

static STATE: OnceLock<PreloadState> = OnceLock::new();

thread_local! {
    static BUILDING: Cell<bool> = const { Cell::new(false) };
}

/// Translation state shared by every hook in the process.
#[derive(Debug, Default)]
pub struct PreloadState {
    table: MappingTable,
}

impl PreloadState {
    /// Builds the state from settings.
    ///
    /// The legacy `PATHBRIDGE_ORIGINAL_PATH` value is paired with the working
    /// directory reported by `cwd` and appended after the configured entries.
    pub fn from_settings(
        settings: &PreloadSettings,
        cwd: impl FnOnce() -> Option<String>,
    ) -> Self {
        if !settings.has_mappings() {
            tracing::debug!("no mappings configured, passing through");
            return Self::default();
        }

        let mut table = settings
            .mappings
            .as_deref()
            .map(MappingTable::parse)
            .unwrap_or_default();

        if let Some(original) = settings.original_path.as_deref() {
            match cwd() {
                Some(cwd) => match MappingEntry::new(&cwd, original) {
                    Ok(entry) => table = table.with_entry(entry),
                    Err(e) => tracing::warn!(error = %e, "ignoring legacy original path"),
                },
                None => {
                    tracing::warn!("working directory unavailable, ignoring legacy original path");
                }
            }
        }

        tracing::debug!(entries = table.len(), "preload mapping table ready");
        Self { table }
    }

    /// The table in match order.
    #[must_use]
    pub const fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Whether every call passes through unchanged.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.table.is_empty()
    }

    /// Rewrites a path supplied by the process (container form) into the
    /// host form the kernel sees. `out` is untouched on a miss.
    pub fn inbound_into(&self, path: &str, out: &mut String) -> bool {
        let hit = self.table.translate_backward_into(path, out);
        if hit {
            tracing::trace!(from = path, to = out.as_str(), "inbound");
        }
        hit
    }

    /// Rewrites a path reported by the kernel (host form) into the form the
    /// process expects.
    #[must_use]
    pub fn outbound(&self, path: &str) -> Option<String> {
        let out = self.table.translate_forward(path);
        if let Some(ref to) = out {
            tracing::trace!(from = path, to = to.as_str(), "outbound");
        }
        out
    }
}

/// Returns the shared state, building it on first use.
///
/// Returns `None` while the calling thread is itself building the state, so
/// libc calls made during initialization reach the real functions.
pub fn get() -> Option<&'static PreloadState> {
    if let Some(state) = STATE.get() {
        return Some(state);
    }
    if BUILDING.try_with(Cell::get).unwrap_or(true) {
        return None;
    }

    let _ = BUILDING.try_with(|flag| flag.set(true));
    let state = STATE.get_or_init(|| {
        let settings = PreloadSettings::from_env();
        if let Some(filter) = settings.log_filter.as_deref() {
            init_logging(filter);
        }
        PreloadState::from_settings(&settings, crate::ffi::real_cwd)
    });
    let _ = BUILDING.try_with(|flag| flag.set(false));
    Some(state)
}

/// Installs a stderr subscriber for diagnostics inside the host process.
///
/// Does nothing if the process already installed its own.
fn init_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
