//! Path normalization across host dialects.
//!
//! Converts Windows drive, WSL mount, UNC, and POSIX paths into the single
//! canonical form accepted by the container mount layer.

mod dialect;
mod normalize;

use std::fmt;

use pathbridge_common::error::{PathViolation, PathbridgeError, Result};
use serde::Serialize;

pub use dialect::{PathDialect, detect_dialect};
pub use normalize::{normalize_separators, windows_to_canonical, wsl_to_canonical};

pub(crate) use dialect::split_drive;
pub(crate) use normalize::unc_to_slashes;

/// A path in the canonical mount dialect.
///
/// Never contains a `..` segment or a NUL byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// Returns the canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts any supported dialect into its canonical form.
///
/// Windows paths become `D:/rest`, WSL mounts become `/d/rest`, UNC and
/// POSIX paths pass through.
///
/// # Errors
///
/// Returns [`PathbridgeError::PathValidation`] if the result contains a
/// `..` segment or a NUL byte.
pub fn to_canonical(path: &str) -> Result<CanonicalPath> {
    let canonical = match detect_dialect(path) {
        PathDialect::WindowsDrive => windows_to_canonical(path),
        PathDialect::WslMount => wsl_to_canonical(&normalize_separators(path)),
        PathDialect::Unc | PathDialect::Posix => path.to_string(),
    };
    if let Some(violation) = find_violation(&canonical) {
        return Err(PathbridgeError::PathValidation {
            path: path.to_string(),
            violation,
        });
    }
    Ok(CanonicalPath(canonical))
}

/// Rejects paths with a `..` segment or an embedded NUL byte.
///
/// `..` is checked per segment, so a name like `a..b` is accepted.
///
/// # Errors
///
/// Returns [`PathbridgeError::PathValidation`] naming the violation.
pub fn validate(path: &str) -> Result<()> {
    match find_violation(path) {
        Some(violation) => Err(PathbridgeError::PathValidation {
            path: path.to_string(),
            violation,
        }),
        None => Ok(()),
    }
}

fn find_violation(path: &str) -> Option<PathViolation> {
    if path.contains('\0') {
        Some(PathViolation::NulByte)
    } else if path.split(['/', '\\']).any(|segment| segment == "..") {
        Some(PathViolation::ParentTraversal)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_windows_path() {
        let canonical = to_canonical("D:\\GitHub\\Proj").expect("valid path");
        assert_eq!(canonical.as_str(), "D:/GitHub/Proj");
    }

    #[test]
    fn canonical_wsl_path() {
        let canonical = to_canonical("/mnt/c/Users/n/app").expect("valid path");
        assert_eq!(canonical.as_str(), "/c/Users/n/app");
    }

    #[test]
    fn canonical_wsl_path_with_doubled_separators() {
        let canonical = to_canonical("/mnt/c//Users/").expect("valid path");
        assert_eq!(canonical.as_str(), "/c/Users");
    }

    #[test]
    fn unc_and_posix_pass_through() {
        assert_eq!(
            to_canonical("\\\\server\\share\\x").expect("valid").as_str(),
            "\\\\server\\share\\x"
        );
        assert_eq!(to_canonical("/usr//lib/").expect("valid").as_str(), "/usr//lib/");
    }

    #[test]
    fn traversal_is_rejected() {
        let err = to_canonical("D:\\proj\\..\\secret");
        assert!(matches!(
            err,
            Err(PathbridgeError::PathValidation {
                violation: PathViolation::ParentTraversal,
                ..
            })
        ));
    }

    #[test]
    fn nul_byte_is_rejected() {
        let err = to_canonical("/d/proj\0/x");
        assert!(matches!(
            err,
            Err(PathbridgeError::PathValidation {
                violation: PathViolation::NulByte,
                ..
            })
        ));
    }

    #[test]
    fn dots_inside_a_name_are_allowed() {
        assert!(validate("/d/a..b/c").is_ok());
        assert!(validate("/d/./c").is_ok());
        assert!(validate("..").is_err());
    }

    #[test]
    fn error_reports_original_input() {
        match to_canonical("C:\\a\\..") {
            Err(PathbridgeError::PathValidation { path, .. }) => assert_eq!(path, "C:\\a\\.."),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
