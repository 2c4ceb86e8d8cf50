//! The raw-pointer boundary.
//!
//! Everything that reads a C string, writes into a caller buffer, allocates
//! with `malloc`, or sets `errno` lives here. Translation itself is done on
//! `&str` by [`PreloadState`].

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::ptr;

use libc::{c_char, c_int, mode_t, size_t, ssize_t};
use pathbridge_common::error::{PathbridgeError, Result};

use crate::state::PreloadState;
use crate::symbols::{Getcwd, PathOp, RealSymbol, Realpath};

/// Linux `PATH_MAX`, the size of every intermediate read buffer.
pub const PATH_BUF: usize = 4096;

type GetcwdFn = <Getcwd as PathOp>::Signature;
type RealpathFn = <Realpath as PathOp>::Signature;

thread_local! {
    static SCRATCH: [RefCell<String>; 2] =
        const { [RefCell::new(String::new()), RefCell::new(String::new())] };
}

/// Which thread-local buffer holds a rewritten input path.
///
/// Calls taking two paths rewrite them into different slots so both stay
/// alive for the duration of the real call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The first (or only) path argument.
    First,
    /// The second path argument.
    Second,
}

impl Slot {
    const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

/// Reads a C string as UTF-8; `None` for NULL or non-UTF-8 input.
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string that outlives `'a`.
pub unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Runs `call` with `path` rewritten from container form to host form, or
/// with the caller's pointer untouched when nothing matches.
///
/// The rewritten string lives in a thread-local buffer for the duration of
/// `call`. If that buffer is unavailable (thread teardown, or already in use
/// by a nested hook on this thread) a heap copy is used instead.
pub fn with_inbound<R>(
    state: Option<&PreloadState>,
    slot: Slot,
    path: *const c_char,
    call: impl FnOnce(*const c_char) -> R,
) -> R {
    let Some(state) = state.filter(|state| !state.is_passthrough()) else {
        return call(path);
    };
    // SAFETY: hooked functions receive NULL or a NUL-terminated path.
    let Some(original) = (unsafe { c_str(path) }) else {
        return call(path);
    };

    let mut call = Some(call);
    let scratched = SCRATCH
        .try_with(|slots| {
            let mut buf = slots[slot.index()].try_borrow_mut().ok()?;
            let call = call.take()?;
            if !state.inbound_into(original, &mut buf) {
                return Some(call(path));
            }
            buf.push('\0');
            Some(call(buf.as_ptr().cast()))
        })
        .ok()
        .flatten();
    if let Some(result) = scratched {
        return result;
    }

    let Some(call) = call else {
        unreachable!("scratch path consumed the call without a result");
    };
    let mut rewritten = String::new();
    if !state.inbound_into(original, &mut rewritten) {
        return call(path);
    }
    match CString::new(rewritten) {
        Ok(rewritten) => call(rewritten.as_ptr()),
        Err(_) => call(path),
    }
}

/// The creation mode of an `open`-family call.
///
/// The exported hooks take the variadic third argument as a fixed `mode_t`;
/// its value is only meaningful when the flags ask for file creation.
pub const fn creation_mode(flags: c_int, raw: mode_t) -> Option<mode_t> {
    if flags & libc::O_CREAT != 0 || flags & libc::O_TMPFILE == libc::O_TMPFILE {
        Some(raw)
    } else {
        None
    }
}

/// Sets the calling thread's `errno`.
pub fn set_errno(code: c_int) {
    // SAFETY: __errno_location returns this thread's errno slot.
    unsafe { *libc::__errno_location() = code };
}

/// Fails a call whose next definition could not be resolved.
pub fn unresolved<T>(symbol: &RealSymbol, fallback: T) -> T {
    tracing::warn!(symbol = ?symbol.name(), "next definition not found");
    set_errno(libc::ENOSYS);
    fallback
}

/// The working directory as reported by the real `getcwd`, bypassing the
/// hook.
pub fn real_cwd() -> Option<String> {
    let real = Getcwd::real()?;
    let mut raw = [0 as c_char; PATH_BUF];
    // SAFETY: buffer pointer and length match.
    let current = unsafe { real(raw.as_mut_ptr(), raw.len()) };
    if current.is_null() {
        return None;
    }
    // SAFETY: getcwd NUL-terminated the buffer on success.
    unsafe { c_str(raw.as_ptr()) }.map(str::to_string)
}

/// Checks that `len` bytes, plus a NUL when `terminated`, fit `capacity`.
///
/// # Errors
///
/// Returns [`PathbridgeError::BufferOverflow`] when they do not.
pub fn fit(len: usize, capacity: usize, terminated: bool) -> Result<usize> {
    let required = if terminated { len + 1 } else { len };
    if required > capacity {
        Err(PathbridgeError::BufferOverflow { required, capacity })
    } else {
        Ok(required)
    }
}

/// Copies `bytes` and a terminating NUL into `buf`.
///
/// # Errors
///
/// Returns [`PathbridgeError::BufferOverflow`] without writing anything when
/// the string does not fit.
///
/// # Safety
///
/// `buf` must be valid for `capacity` bytes of writes.
pub unsafe fn copy_terminated(bytes: &[u8], buf: *mut c_char, capacity: usize) -> Result<()> {
    let _ = fit(bytes.len(), capacity, true)?;
    // SAFETY: the string and its NUL fit in `capacity`.
    unsafe { write_terminated(bytes, buf) };
    Ok(())
}

/// Copies `bytes` into `buf` without a terminator, as `readlink` does.
///
/// # Errors
///
/// Returns [`PathbridgeError::BufferOverflow`] without writing anything when
/// the bytes do not fit.
///
/// # Safety
///
/// `buf` must be valid for `capacity` bytes of writes.
pub unsafe fn copy_unterminated(bytes: &[u8], buf: *mut c_char, capacity: usize) -> Result<usize> {
    let written = fit(bytes.len(), capacity, false)?;
    // SAFETY: `written <= capacity`.
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), written) };
    Ok(written)
}

/// `getcwd` with the reported directory rewritten to container form.
///
/// # Safety
///
/// `buf` must be NULL or valid for `size` bytes of writes.
pub unsafe fn getcwd(
    state: Option<&PreloadState>,
    real: GetcwdFn,
    buf: *mut c_char,
    size: size_t,
) -> *mut c_char {
    let Some(state) = active(state) else {
        // SAFETY: caller's arguments forwarded unchanged.
        return unsafe { real(buf, size) };
    };

    let mut raw = [0 as c_char; PATH_BUF];
    // SAFETY: buffer pointer and length match.
    let current = unsafe { real(raw.as_mut_ptr(), raw.len()) };
    // SAFETY: on success getcwd NUL-terminated `raw`.
    let rewritten = if current.is_null() {
        None
    } else {
        unsafe { c_str(raw.as_ptr()) }.and_then(|cwd| state.outbound(cwd))
    };
    let Some(rewritten) = rewritten else {
        // SAFETY: caller's arguments forwarded unchanged.
        return unsafe { real(buf, size) };
    };

    if buf.is_null() {
        let capacity = if size == 0 { rewritten.len() + 1 } else { size };
        return match fit(rewritten.len(), capacity, true) {
            Ok(_) => malloc_c_string(rewritten.as_bytes(), capacity),
            Err(e) => overflow(&e, libc::ERANGE, ptr::null_mut()),
        };
    }
    if size == 0 {
        set_errno(libc::EINVAL);
        return ptr::null_mut();
    }
    // SAFETY: `buf` is valid for `size` bytes per the caller's contract.
    match unsafe { copy_terminated(rewritten.as_bytes(), buf, size) } {
        Ok(()) => buf,
        Err(e) => overflow(&e, libc::ERANGE, ptr::null_mut()),
    }
}

/// `get_current_dir_name` with the result rewritten to container form.
///
/// # Safety
///
/// `current` must be the `malloc`ed result of the real call, or NULL.
pub unsafe fn rewrite_allocated(state: Option<&PreloadState>, current: *mut c_char) -> *mut c_char {
    let Some(state) = active(state) else {
        return current;
    };
    // SAFETY: NULL or a NUL-terminated libc allocation.
    let Some(rewritten) = (unsafe { c_str(current) }).and_then(|cwd| state.outbound(cwd)) else {
        return current;
    };
    // SAFETY: `current` came from malloc and is not used again.
    unsafe { libc::free(current.cast()) };
    malloc_c_string(rewritten.as_bytes(), rewritten.len() + 1)
}

/// `realpath` with the input rewritten to host form and the resolved path
/// rewritten back to container form.
///
/// # Safety
///
/// `path` must be NULL or NUL-terminated; `resolved` must be NULL or valid
/// for `PATH_MAX` bytes of writes.
pub unsafe fn realpath(
    state: Option<&PreloadState>,
    real: RealpathFn,
    path: *const c_char,
    resolved: *mut c_char,
) -> *mut c_char {
    with_inbound(state, Slot::First, path, |path| {
        let Some(state) = active(state) else {
            // SAFETY: caller's arguments forwarded unchanged.
            return unsafe { real(path, resolved) };
        };
        // SAFETY: NULL asks libc to allocate a result of any length.
        let full = unsafe { real(path, ptr::null_mut()) };
        if full.is_null() {
            return full;
        }
        // SAFETY: non-null results are NUL-terminated allocations.
        let reported = unsafe { CStr::from_ptr(full) };
        let rewritten = reported.to_str().ok().and_then(|p| state.outbound(p));
        if rewritten.is_none() && resolved.is_null() {
            return full;
        }

        let bytes = rewritten.as_ref().map_or(reported.to_bytes(), String::as_bytes);
        let out = if resolved.is_null() {
            Ok(malloc_c_string(bytes, bytes.len() + 1))
        } else {
            // SAFETY: `resolved` holds PATH_MAX bytes per the realpath contract.
            unsafe { copy_terminated(bytes, resolved, PATH_BUF) }.map(|()| resolved)
        };
        // SAFETY: `full` came from malloc and `bytes` is no longer used.
        unsafe { libc::free(full.cast()) };
        out.unwrap_or_else(|e| overflow(&e, libc::ENAMETOOLONG, ptr::null_mut()))
    })
}

/// `readlink`/`readlinkat` with the link target rewritten to container form.
///
/// `read` performs the real call for a (possibly rewritten) path. Unmatched
/// targets keep the usual silent truncation to `bufsiz`; rewritten targets
/// that do not fit fail with `ERANGE`.
///
/// # Safety
///
/// `buf` must be valid for `bufsiz` bytes of writes.
pub unsafe fn readlink_with(
    state: Option<&PreloadState>,
    path: *const c_char,
    buf: *mut c_char,
    bufsiz: size_t,
    read: impl Fn(*const c_char, *mut c_char, size_t) -> ssize_t,
) -> ssize_t {
    with_inbound(state, Slot::First, path, |path| {
        let Some(state) = active(state).filter(|_| bufsiz > 0) else {
            return read(path, buf, bufsiz);
        };
        let mut raw = [0_u8; PATH_BUF];
        let n = read(path, raw.as_mut_ptr().cast(), raw.len());
        let Ok(len) = usize::try_from(n) else {
            return n;
        };
        if len >= raw.len() {
            return read(path, buf, bufsiz);
        }

        let target = &raw[..len];
        match std::str::from_utf8(target).ok().and_then(|t| state.outbound(t)) {
            Some(rewritten) => {
                // SAFETY: `buf` is valid for `bufsiz` bytes.
                match unsafe { copy_unterminated(rewritten.as_bytes(), buf, bufsiz) } {
                    Ok(written) => byte_count(written),
                    Err(e) => overflow(&e, libc::ERANGE, -1),
                }
            }
            None => {
                let written = len.min(bufsiz);
                // SAFETY: `written <= bufsiz` and `written <= len`.
                unsafe { ptr::copy_nonoverlapping(raw.as_ptr(), buf.cast::<u8>(), written) };
                byte_count(written)
            }
        }
    })
}

fn active(state: Option<&PreloadState>) -> Option<&PreloadState> {
    state.filter(|state| !state.is_passthrough())
}

fn overflow<T>(error: &PathbridgeError, errno: c_int, fallback: T) -> T {
    tracing::debug!(%error, "rewritten path does not fit");
    set_errno(errno);
    fallback
}

fn byte_count(n: usize) -> ssize_t {
    ssize_t::try_from(n).unwrap_or(ssize_t::MAX)
}

/// Allocates `capacity` bytes with `malloc` and stores `bytes` plus a NUL.
///
/// The caller guarantees `capacity > bytes.len()`.
fn malloc_c_string(bytes: &[u8], capacity: usize) -> *mut c_char {
    // SAFETY: plain allocation, checked for NULL below.
    let out = unsafe { libc::malloc(capacity) }.cast::<c_char>();
    if out.is_null() {
        set_errno(libc::ENOMEM);
        return out;
    }
    // SAFETY: `out` holds at least `bytes.len() + 1` bytes.
    unsafe { write_terminated(bytes, out) };
    out
}

unsafe fn write_terminated(bytes: &[u8], buf: *mut c_char) {
    // SAFETY: the caller guarantees room for `bytes.len() + 1` bytes.
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), bytes.len());
        *buf.add(bytes.len()) = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;

    use pathbridge_common::config::PreloadSettings;

    use super::*;
    use crate::symbols::Readlink;

    fn state(mappings: &str) -> PreloadState {
        let settings = PreloadSettings {
            mappings: Some(mappings.to_string()),
            ..PreloadSettings::default()
        };
        PreloadState::from_settings(&settings, || None)
    }

    fn errno() -> Option<i32> {
        std::io::Error::last_os_error().raw_os_error()
    }

    fn read_back(ptr: *const c_char) -> String {
        // SAFETY: test pointers are NUL-terminated.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    #[test]
    fn creation_mode_only_with_create_flags() {
        assert_eq!(creation_mode(libc::O_RDONLY, 0o644), None);
        assert_eq!(creation_mode(libc::O_WRONLY | libc::O_CREAT, 0o644), Some(0o644));
        assert_eq!(creation_mode(libc::O_TMPFILE | libc::O_RDWR, 0o600), Some(0o600));
        assert_eq!(creation_mode(libc::O_DIRECTORY, 0o600), None);
    }

    #[test]
    fn fit_reports_required_and_capacity() {
        assert_eq!(fit(3, 4, true).expect("fits"), 4);
        assert_eq!(fit(4, 4, false).expect("fits"), 4);
        match fit(4, 4, true) {
            Err(PathbridgeError::BufferOverflow { required, capacity }) => {
                assert_eq!((required, capacity), (5, 4));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn copy_terminated_refuses_to_truncate() {
        let mut buf = [b'x' as c_char; 4];
        // SAFETY: buffer length matches.
        let result = unsafe { copy_terminated(b"abcd", buf.as_mut_ptr(), buf.len()) };
        assert!(result.is_err());
        assert_eq!(buf[0], b'x' as c_char);

        // SAFETY: buffer length matches.
        unsafe { copy_terminated(b"abc", buf.as_mut_ptr(), buf.len()) }.expect("fits");
        assert_eq!(read_back(buf.as_ptr()), "abc");
    }

    #[test]
    fn inbound_rewrites_matching_path() {
        let state = state("/host/dir:/workspace");
        let path = CString::new("/workspace/a.txt").expect("no NUL");
        let seen = with_inbound(Some(&state), Slot::First, path.as_ptr(), read_back);
        assert_eq!(seen, "/host/dir/a.txt");
    }

    #[test]
    fn inbound_passes_original_pointer_on_miss() {
        let state = state("/host/dir:/workspace");
        let path = CString::new("/etc/hosts").expect("no NUL");
        let seen = with_inbound(Some(&state), Slot::First, path.as_ptr(), |p| p);
        assert_eq!(seen, path.as_ptr());
    }

    #[test]
    fn inbound_passes_null_and_uninitialized_state() {
        let state = state("/host/dir:/workspace");
        assert!(with_inbound(Some(&state), Slot::First, ptr::null(), |p| p).is_null());
        let path = CString::new("/workspace/x").expect("no NUL");
        assert_eq!(with_inbound(None, Slot::First, path.as_ptr(), |p| p), path.as_ptr());
    }

    #[test]
    fn two_slots_hold_both_paths() {
        let state = state("/host/dir:/workspace");
        let from = CString::new("/workspace/old").expect("no NUL");
        let to = CString::new("/workspace/new").expect("no NUL");
        let (a, b) = with_inbound(Some(&state), Slot::First, from.as_ptr(), |from| {
            with_inbound(Some(&state), Slot::Second, to.as_ptr(), |to| {
                (read_back(from), read_back(to))
            })
        });
        assert_eq!(a, "/host/dir/old");
        assert_eq!(b, "/host/dir/new");
    }

    #[test]
    fn nested_use_of_same_slot_falls_back_to_heap() {
        let state = state("/host/dir:/workspace");
        let outer = CString::new("/workspace/outer").expect("no NUL");
        let inner = CString::new("/workspace/inner").expect("no NUL");
        let (a, b) = with_inbound(Some(&state), Slot::First, outer.as_ptr(), |outer| {
            with_inbound(Some(&state), Slot::First, inner.as_ptr(), |inner| {
                (read_back(outer), read_back(inner))
            })
        });
        assert_eq!(a, "/host/dir/outer");
        assert_eq!(b, "/host/dir/inner");
    }

    #[test]
    fn getcwd_reports_container_form() {
        let cwd = real_cwd().expect("cwd readable");
        let state = state(&format!("{cwd}:C:/Session"));
        let real = Getcwd::real().expect("getcwd resolves");

        let mut buf = [0 as c_char; PATH_BUF];
        // SAFETY: buffer length matches.
        let out = unsafe { getcwd(Some(&state), real, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(read_back(out), "C:/Session");

        let mut small = [0 as c_char; 4];
        // SAFETY: buffer length matches.
        let out = unsafe { getcwd(Some(&state), real, small.as_mut_ptr(), small.len()) };
        assert!(out.is_null());
        assert_eq!(errno(), Some(libc::ERANGE));

        // SAFETY: NULL buffer asks for a malloc'd result.
        let out = unsafe { getcwd(Some(&state), real, ptr::null_mut(), 0) };
        assert_eq!(read_back(out), "C:/Session");
        // SAFETY: allocated by malloc_c_string.
        unsafe { libc::free(out.cast()) };
    }

    #[test]
    fn realpath_round_trips_through_mapping() {
        let dir = tempfile::tempdir().expect("temp dir");
        let host = std::fs::canonicalize(dir.path()).expect("canonical temp dir");
        let host = host.to_str().expect("utf-8 temp dir");
        let state = state(&format!("{host}:C:/Temp"));
        let real = Realpath::real().expect("realpath resolves");

        let input = CString::new("C:\\Temp").expect("no NUL");
        // SAFETY: NULL resolved buffer asks for an allocation.
        let out = unsafe { realpath(Some(&state), real, input.as_ptr(), ptr::null_mut()) };
        assert_eq!(read_back(out), "C:/Temp");
        // SAFETY: allocated by malloc_c_string.
        unsafe { libc::free(out.cast()) };

        let mut resolved = [0 as c_char; PATH_BUF];
        // SAFETY: resolved holds PATH_MAX bytes.
        let out = unsafe { realpath(Some(&state), real, input.as_ptr(), resolved.as_mut_ptr()) };
        assert_eq!(out, resolved.as_mut_ptr());
        assert_eq!(read_back(out), "C:/Temp");
    }

    #[test]
    fn readlink_rewrites_or_truncates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mapped = dir.path().join("mapped");
        let plain = dir.path().join("plain");
        symlink("/d/proj/file.txt", &mapped).expect("symlink");
        symlink("/elsewhere/file.txt", &plain).expect("symlink");

        let state = state("/d/proj:/workspace");
        let real = Readlink::real().expect("readlink resolves");
        // SAFETY: arguments forwarded from readlink_with.
        let read = |p: *const c_char, b: *mut c_char, n: size_t| unsafe { real(p, b, n) };

        let mapped = CString::new(mapped.to_str().expect("utf-8")).expect("no NUL");
        let mut buf = [0 as c_char; 64];
        // SAFETY: buffer length matches.
        let n = unsafe {
            readlink_with(Some(&state), mapped.as_ptr(), buf.as_mut_ptr(), buf.len(), read)
        };
        let n = usize::try_from(n).expect("success");
        let bytes: Vec<u8> = buf[..n].iter().map(|&c| c as u8).collect();
        assert_eq!(bytes, b"/workspace/file.txt");

        let mut small = [0 as c_char; 8];
        // SAFETY: buffer length matches.
        let n = unsafe {
            readlink_with(Some(&state), mapped.as_ptr(), small.as_mut_ptr(), small.len(), read)
        };
        assert_eq!(n, -1);
        assert_eq!(errno(), Some(libc::ERANGE));

        let plain = CString::new(plain.to_str().expect("utf-8")).expect("no NUL");
        // SAFETY: buffer length matches.
        let n = unsafe {
            readlink_with(Some(&state), plain.as_ptr(), small.as_mut_ptr(), small.len(), read)
        };
        assert_eq!(n, 8);
        let bytes: Vec<u8> = small.iter().map(|&c| c as u8).collect();
        assert_eq!(bytes, b"/elsewhe");
    }

    #[test]
    fn rewrite_allocated_replaces_matching_result() {
        let state = state("/d/proj:/workspace");
        let original = malloc_c_string(b"/d/proj/sub", 12);
        // SAFETY: `original` is a malloc'd C string.
        let out = unsafe { rewrite_allocated(Some(&state), original) };
        assert_eq!(read_back(out), "/workspace/sub");
        // SAFETY: allocated by malloc_c_string.
        unsafe { libc::free(out.cast()) };
    }
}
