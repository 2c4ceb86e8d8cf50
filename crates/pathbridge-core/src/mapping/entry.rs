//! A single `(host, container)` prefix pair.

use std::borrow::Cow;

use pathbridge_common::error::{PathbridgeError, Result};
use serde::Serialize;

use crate::path::{self, PathDialect};

/// One validated prefix pair of the mapping table.
///
/// Both sides are stored without trailing separators (roots excepted), so
/// `host_len` and `container_len` are the byte lengths matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    host_prefix: String,
    container_prefix: String,
    host_len: usize,
    container_len: usize,
    #[serde(skip)]
    host_folds_case: bool,
    #[serde(skip)]
    container_folds_case: bool,
}

impl MappingEntry {
    /// Builds an entry, normalizing both sides.
    ///
    /// Windows sides take their canonical `D:/rest` form, UNC sides use
    /// forward slashes, and every other side is separator-normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if either side is empty or contains a `..` segment
    /// or NUL byte.
    pub fn new(host: &str, container: &str) -> Result<Self> {
        let host_prefix = normalize_side("host", host)?;
        let container_prefix = normalize_side("container", container)?;
        Ok(Self {
            host_len: host_prefix.len(),
            container_len: container_prefix.len(),
            host_folds_case: path::detect_dialect(&host_prefix).folds_case(),
            container_folds_case: path::detect_dialect(&container_prefix).folds_case(),
            host_prefix,
            container_prefix,
        })
    }

    /// The host-side prefix.
    #[must_use]
    pub fn host_prefix(&self) -> &str {
        &self.host_prefix
    }

    /// The container-side prefix.
    #[must_use]
    pub fn container_prefix(&self) -> &str {
        &self.container_prefix
    }

    /// Byte length of the host-side prefix.
    #[must_use]
    pub const fn host_len(&self) -> usize {
        self.host_len
    }

    /// Byte length of the container-side prefix.
    #[must_use]
    pub const fn container_len(&self) -> usize {
        self.container_len
    }

    /// Rewrites a host path under this entry into its container form.
    #[must_use]
    pub fn forward(&self, path: &str) -> Option<String> {
        let mut out = String::new();
        self.forward_into(path, &mut out).then_some(out)
    }

    /// Rewrites a container path under this entry into its host form.
    #[must_use]
    pub fn backward(&self, path: &str) -> Option<String> {
        let mut out = String::new();
        self.backward_into(path, &mut out).then_some(out)
    }

    /// Like [`forward`](Self::forward), writing into a reusable buffer.
    ///
    /// `out` is only modified when the entry matches.
    pub fn forward_into(&self, path: &str, out: &mut String) -> bool {
        let subject = comparable(path);
        let Some(rest) = strip_at_boundary(
            &subject,
            &self.host_prefix,
            self.host_len,
            self.host_folds_case,
        ) else {
            return false;
        };
        join_into(&self.container_prefix, rest, out);
        true
    }

    /// Like [`backward`](Self::backward), writing into a reusable buffer.
    ///
    /// `out` is only modified when the entry matches.
    pub fn backward_into(&self, path: &str, out: &mut String) -> bool {
        let subject = comparable(path);
        let Some(rest) = strip_at_boundary(
            &subject,
            &self.container_prefix,
            self.container_len,
            self.container_folds_case,
        ) else {
            return false;
        };
        join_into(&self.host_prefix, rest, out);
        true
    }
}

fn normalize_side(side: &str, raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PathbridgeError::Config {
            message: format!("empty {side} side"),
        });
    }
    let normalized = match path::detect_dialect(raw) {
        PathDialect::WindowsDrive => path::windows_to_canonical(raw),
        PathDialect::Unc => path::unc_to_slashes(raw),
        PathDialect::WslMount | PathDialect::Posix => path::normalize_separators(raw),
    };
    path::validate(&normalized)?;
    Ok(normalized)
}

/// Puts Windows and UNC inputs into the same shape as stored prefixes.
fn comparable(path: &str) -> Cow<'_, str> {
    match path::detect_dialect(path) {
        PathDialect::WindowsDrive => Cow::Owned(path::windows_to_canonical(path)),
        PathDialect::Unc => Cow::Owned(path::unc_to_slashes(path)),
        PathDialect::WslMount | PathDialect::Posix => Cow::Borrowed(path),
    }
}

/// Returns the remainder after `prefix` only if the match ends on a path
/// boundary: `/d/proj` matches `/d/proj/x` and `/d/proj`, never `/d/proj2`.
fn strip_at_boundary<'a>(
    path: &'a str,
    prefix: &str,
    len: usize,
    folds_case: bool,
) -> Option<&'a str> {
    if path.len() < len || !path.is_char_boundary(len) {
        return None;
    }
    let (head, rest) = path.split_at(len);
    let matched = if folds_case {
        head.eq_ignore_ascii_case(prefix)
    } else {
        head == prefix
    };
    if !matched {
        return None;
    }
    if rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn join_into(prefix: &str, rest: &str, out: &mut String) {
    out.clear();
    out.push_str(prefix);
    if rest.is_empty() {
        return;
    }
    match (prefix.ends_with('/'), rest.strip_prefix('/')) {
        (true, Some(tail)) => out.push_str(tail),
        (false, None) => {
            out.push('/');
            out.push_str(rest);
        }
        _ => out.push_str(rest),
    }
}
