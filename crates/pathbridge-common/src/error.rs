//! Unified error types for the pathbridge workspace.
//!
//! Translation-layer failures degrade to pass-through; only structurally
//! invalid paths are actionable, and only for the call that carried them.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Structural defect that makes a path unusable after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathViolation {
    /// A `..` segment survived normalization (possible traversal).
    ParentTraversal,
    /// The path contains an embedded NUL byte.
    NulByte,
}

impl fmt::Display for PathViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentTraversal => write!(f, "contains a '..' segment"),
            Self::NulByte => write!(f, "contains a NUL byte"),
        }
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum PathbridgeError {
    /// A path failed validation after normalization.
    #[error("invalid path {path:?}: {violation}")]
    PathValidation {
        /// The offending path, as supplied.
        path: String,
        /// What made it invalid.
        violation: PathViolation,
    },

    /// A bind mount or FUSE overlay could not be established for a root.
    #[error("overlay setup for {} failed during {stage}: {message}", target.display())]
    MountSetup {
        /// Directory that was being virtualized.
        target: PathBuf,
        /// State-machine step that failed.
        stage: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// A rewritten output path does not fit in the caller's buffer.
    #[error("rewritten path needs {required} bytes but the buffer holds {capacity}")]
    BufferOverflow {
        /// Bytes needed, including the terminating NUL where applicable.
        required: usize,
        /// Bytes available in the caller's buffer.
        capacity: usize,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// A malformed mapping-table entry that was skipped during parsing.
///
/// Never fatal: the table is built from whatever entries remain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skipping mapping entry {entry:?}: {reason}")]
pub struct MappingParseWarning {
    /// The raw entry text between `;` separators.
    pub entry: String,
    /// Why the entry was rejected.
    pub reason: String,
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PathbridgeError>;
