//! # pathbridge-overlay
//!
//! Places a FUSE filesystem directly over an existing directory so that
//! every access to its original path is served by a user-space daemon.
//!
//! The daemon cannot read through its own mount, so the directory is first
//! bind-mounted onto a private alias and the daemon is pointed at that alias:
//!
//! ```text
//! Unmounted ──bind──▶ BindAliased ──spawn + wait──▶ FuseActive
//!     ▲                    │
//!     └──── rollback ◀─────┘  (bind failure, early exit, or timeout)
//! ```
//!
//! Setup failures never propagate: a root that cannot be overlaid stays a
//! plain directory and its [`OverlayMount`] records why.

pub mod alias;
pub mod backend;
pub mod daemon;
pub mod mount;
pub mod orchestrator;

pub use backend::OverlayBackend;
pub use backend::linux::LinuxOverlayBackend;
pub use daemon::{DaemonHandle, DaemonSpec};
pub use mount::OverlayMount;
pub use orchestrator::Orchestrator;
