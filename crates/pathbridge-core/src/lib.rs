//! # pathbridge-core
//!
//! Pure path algebra shared by the preload library and the overlay
//! orchestrator:
//! - **Path normalization**: dialect detection (Windows drive, WSL mount,
//!   UNC, POSIX) and conversion to the canonical mount dialect.
//! - **Mapping table**: the `host:container;...` environment protocol and
//!   boundary-checked prefix translation in both directions.
//!
//! Nothing in this crate touches the filesystem.

pub mod mapping;
pub mod path;

pub use mapping::{MappingEntry, MappingTable};
pub use path::{CanonicalPath, PathDialect, detect_dialect, to_canonical};
