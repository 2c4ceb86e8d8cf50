//! Structural dialect detection using `nom`.
//!
//! Each recognizer only inspects the leading characters of a path; nothing
//! here consults the filesystem.

use std::fmt;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, one_of, satisfy},
    combinator::{eof, peek, value},
};

/// Host path notation recognized by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathDialect {
    /// `C:\...`, `C:/...` or a bare `C:`.
    WindowsDrive,
    /// `/mnt/<lowercase letter>` followed by `/` or end of path.
    WslMount,
    /// `//server/...` or `\\server\...`.
    Unc,
    /// Anything else.
    Posix,
}

impl PathDialect {
    /// Whether prefixes in this dialect compare case-insensitively.
    #[must_use]
    pub const fn folds_case(self) -> bool {
        matches!(self, Self::WindowsDrive | Self::Unc)
    }
}

impl fmt::Display for PathDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowsDrive => write!(f, "windows-drive"),
            Self::WslMount => write!(f, "wsl-mount"),
            Self::Unc => write!(f, "unc"),
            Self::Posix => write!(f, "posix"),
        }
    }
}

/// Classifies a path by its leading structure.
///
/// UNC is checked before the drive form so that `\\server` is never read as
/// a relative Windows path.
pub fn detect_dialect(path: &str) -> PathDialect {
    if unc_prefix(path).is_ok() {
        PathDialect::Unc
    } else if drive_prefix(path).is_ok() {
        PathDialect::WindowsDrive
    } else if wsl_mount_prefix(path).is_ok() {
        PathDialect::WslMount
    } else {
        PathDialect::Posix
    }
}

/// Splits `C:\rest` into the drive letter and `\rest`.
pub(crate) fn split_drive(path: &str) -> Option<(char, &str)> {
    drive_prefix(path).ok().map(|(rest, letter)| (letter, rest))
}

/// Splits `/mnt/c/rest` into the mount letter and `/rest`.
pub(crate) fn split_wsl_mount(path: &str) -> Option<(char, &str)> {
    wsl_mount_prefix(path).ok().map(|(rest, letter)| (letter, rest))
}

fn separator(input: &str) -> IResult<&str, char> {
    one_of("/\\")(input)
}

/// Succeeds without consuming when the input is at a separator or at its end.
fn at_boundary(input: &str) -> IResult<&str, ()> {
    let (_, ()) = alt((value((), peek(separator)), value((), eof))).parse(input)?;
    Ok((input, ()))
}

/// `X:` followed by a separator or end of input.
fn drive_prefix(input: &str) -> IResult<&str, char> {
    let (input, letter) = satisfy(|c| c.is_ascii_alphabetic())(input)?;
    let (input, _) = char(':')(input)?;
    let (input, ()) = at_boundary(input)?;
    Ok((input, letter))
}

/// `/mnt/x` followed by `/` or end of input.
fn wsl_mount_prefix(input: &str) -> IResult<&str, char> {
    let (input, _) = tag("/mnt/")(input)?;
    let (input, letter) = satisfy(|c| c.is_ascii_lowercase())(input)?;
    let (_, ()) = alt((value((), peek(char('/'))), value((), eof))).parse(input)?;
    Ok((input, letter))
}

/// Two identical separators followed by a server name character.
fn unc_prefix(input: &str) -> IResult<&str, &str> {
    let (input, lead) = alt((tag("//"), tag("\\\\"))).parse(input)?;
    let (_, _) = peek(satisfy(|c| c != '/' && c != '\\')).parse(input)?;
    Ok((input, lead))
}
