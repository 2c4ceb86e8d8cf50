//! Dialect conversions into the canonical mount dialect.
//!
//! Every function here is total: input that does not have the expected
//! structure is returned unchanged.

use super::dialect;

/// Converts backslashes to `/`, collapses runs of `/`, and strips one
/// trailing `/` unless that would leave the path empty.
pub fn normalize_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_was_separator = false;
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        let _ = out.pop();
    }
    out
}

/// `d:\GitHub\Proj\` becomes `D:/GitHub/Proj`; a drive root becomes `D:/`.
pub fn windows_to_canonical(path: &str) -> String {
    let Some((letter, rest)) = dialect::split_drive(path) else {
        return path.to_string();
    };
    let drive = letter.to_ascii_uppercase();
    let rest = normalize_separators(rest);
    if rest.is_empty() || rest == "/" {
        format!("{drive}:/")
    } else {
        format!("{drive}:{rest}")
    }
}

/// `/mnt/c/Users` becomes `/c/Users`; `/mnt/c` becomes `/c`.
pub fn wsl_to_canonical(path: &str) -> String {
    match dialect::split_wsl_mount(path) {
        Some((letter, rest)) => format!("/{letter}{rest}"),
        None => path.to_string(),
    }
}

/// UNC paths keep their leading `//`; only backslashes and trailing
/// separators are rewritten.
pub(crate) fn unc_to_slashes(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let trimmed = slashed.trim_end_matches('/');
    trimmed.to_string()
}
