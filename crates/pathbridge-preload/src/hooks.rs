//! Exported libc entry points.
//!
//! Each export resolves the next definition of its symbol, rewrites its
//! path arguments through [`ffi::with_inbound`], and forwards every other
//! argument untouched.
//!
//! `open`-family exports declare the variadic mode as a fixed `mode_t`
//! parameter; on the supported Linux ABIs it occupies the same register or
//! stack slot, and [`ffi::creation_mode`] decides whether it is forwarded.

use libc::{DIR, FILE, c_char, c_int, gid_t, mode_t, off_t, size_t, ssize_t, uid_t};

use crate::ffi::{self, Slot};
use crate::state;
use crate::symbols::{
    Access, Chdir, Chmod, Chown, Creat, Execve, FaccessAt, FchmodAt, FchownAt, Fopen, Freopen,
    Getcwd, Lchown, Link, LinkAt, Lstat, Mkdir, MkdirAt, Open, OpenAt, Opendir, PathOp, Readlink,
    ReadlinkAt, Realpath, Rename, RenameAt, Rmdir, Stat, Symlink, SymlinkAt, Truncate, Unlink,
    UnlinkAt,
};
#[cfg(target_env = "gnu")]
use crate::symbols::{
    Creat64, Fopen64, Freopen64, GetCurrentDirName, Lstat64, Lxstat, Open64, OpenAt64, Stat64,
    Xstat,
};

/// Defines exports that take exactly one path argument, marked `[path]`.
macro_rules! inbound_hooks {
    ($(
        $(#[$meta:meta])*
        fn $name:ident = $op:ident(
            $($pre:ident: $pre_ty:ty,)* [$path:ident] $(, $arg:ident: $ty:ty)*
        ) -> $ret:ty, $fail:expr;
    )*) => {
        $(
            $(#[$meta])*
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name(
                $($pre: $pre_ty,)* $path: *const c_char $(, $arg: $ty)*
            ) -> $ret {
                let Some(real) = $op::real() else {
                    return ffi::unresolved($op::symbol(), $fail);
                };
                ffi::with_inbound(state::get(), Slot::First, $path, |$path| {
                    // SAFETY: caller's arguments forwarded with only the path rewritten.
                    unsafe { real($($pre,)* $path $(, $arg)*) }
                })
            }
        )*
    };
}

inbound_hooks! {
    fn creat = Creat([path], mode: mode_t) -> c_int, -1;
    #[cfg(target_env = "gnu")]
    fn creat64 = Creat64([path], mode: mode_t) -> c_int, -1;
    fn fopen = Fopen([path], mode: *const c_char) -> *mut FILE, std::ptr::null_mut();
    #[cfg(target_env = "gnu")]
    fn fopen64 = Fopen64([path], mode: *const c_char) -> *mut FILE, std::ptr::null_mut();
    fn freopen = Freopen([path], mode: *const c_char, stream: *mut FILE)
        -> *mut FILE, std::ptr::null_mut();
    #[cfg(target_env = "gnu")]
    fn freopen64 = Freopen64([path], mode: *const c_char, stream: *mut FILE)
        -> *mut FILE, std::ptr::null_mut();

    fn stat = Stat([path], buf: *mut libc::stat) -> c_int, -1;
    fn lstat = Lstat([path], buf: *mut libc::stat) -> c_int, -1;
    #[cfg(target_env = "gnu")]
    fn stat64 = Stat64([path], buf: *mut libc::stat64) -> c_int, -1;
    #[cfg(target_env = "gnu")]
    fn lstat64 = Lstat64([path], buf: *mut libc::stat64) -> c_int, -1;
    #[cfg(target_env = "gnu")]
    fn __xstat = Xstat(ver: c_int, [path], buf: *mut libc::stat) -> c_int, -1;
    #[cfg(target_env = "gnu")]
    fn __lxstat = Lxstat(ver: c_int, [path], buf: *mut libc::stat) -> c_int, -1;

    fn access = Access([path], mode: c_int) -> c_int, -1;
    fn faccessat = FaccessAt(dirfd: c_int, [path], mode: c_int, flags: c_int) -> c_int, -1;
    fn chdir = Chdir([path]) -> c_int, -1;
    fn mkdir = Mkdir([path], mode: mode_t) -> c_int, -1;
    fn mkdirat = MkdirAt(dirfd: c_int, [path], mode: mode_t) -> c_int, -1;
    fn rmdir = Rmdir([path]) -> c_int, -1;
    fn unlink = Unlink([path]) -> c_int, -1;
    fn unlinkat = UnlinkAt(dirfd: c_int, [path], flags: c_int) -> c_int, -1;
    fn chmod = Chmod([path], mode: mode_t) -> c_int, -1;
    fn fchmodat = FchmodAt(dirfd: c_int, [path], mode: mode_t, flags: c_int) -> c_int, -1;
    fn chown = Chown([path], owner: uid_t, group: gid_t) -> c_int, -1;
    fn lchown = Lchown([path], owner: uid_t, group: gid_t) -> c_int, -1;
    fn fchownat = FchownAt(dirfd: c_int, [path], owner: uid_t, group: gid_t, flags: c_int)
        -> c_int, -1;
    fn truncate = Truncate([path], length: off_t) -> c_int, -1;
    fn opendir = Opendir([path]) -> *mut DIR, std::ptr::null_mut();
    fn execve = Execve([path], argv: *const *const c_char, envp: *const *const c_char)
        -> c_int, -1;
}

// ── open family ─────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(real) = Open::real() else {
        return ffi::unresolved(Open::symbol(), -1);
    };
    let mode = ffi::creation_mode(flags, mode);
    ffi::with_inbound(state::get(), Slot::First, path, |path| match mode {
        // SAFETY: flags and mode forwarded as received.
        Some(mode) => unsafe { real(path, flags, mode) },
        // SAFETY: flags forwarded as received.
        None => unsafe { real(path, flags) },
    })
}

#[cfg(target_env = "gnu")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let Some(real) = Open64::real() else {
        return ffi::unresolved(Open64::symbol(), -1);
    };
    let mode = ffi::creation_mode(flags, mode);
    ffi::with_inbound(state::get(), Slot::First, path, |path| match mode {
        // SAFETY: flags and mode forwarded as received.
        Some(mode) => unsafe { real(path, flags, mode) },
        // SAFETY: flags forwarded as received.
        None => unsafe { real(path, flags) },
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn openat(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    let Some(real) = OpenAt::real() else {
        return ffi::unresolved(OpenAt::symbol(), -1);
    };
    let mode = ffi::creation_mode(flags, mode);
    ffi::with_inbound(state::get(), Slot::First, path, |path| match mode {
        // SAFETY: flags and mode forwarded as received.
        Some(mode) => unsafe { real(dirfd, path, flags, mode) },
        // SAFETY: flags forwarded as received.
        None => unsafe { real(dirfd, path, flags) },
    })
}

#[cfg(target_env = "gnu")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn openat64(
    dirfd: c_int,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    let Some(real) = OpenAt64::real() else {
        return ffi::unresolved(OpenAt64::symbol(), -1);
    };
    let mode = ffi::creation_mode(flags, mode);
    ffi::with_inbound(state::get(), Slot::First, path, |path| match mode {
        // SAFETY: flags and mode forwarded as received.
        Some(mode) => unsafe { real(dirfd, path, flags, mode) },
        // SAFETY: flags forwarded as received.
        None => unsafe { real(dirfd, path, flags) },
    })
}

// ── two-path calls ──────────────────────────────────────────────────

/// Rewrites two paths into separate scratch slots and runs `call` with both.
fn with_two_paths<R>(
    first: *const c_char,
    second: *const c_char,
    call: impl FnOnce(*const c_char, *const c_char) -> R,
) -> R {
    let state = state::get();
    ffi::with_inbound(state, Slot::First, first, |first| {
        ffi::with_inbound(state, Slot::Second, second, |second| call(first, second))
    })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rename(from: *const c_char, to: *const c_char) -> c_int {
    let Some(real) = Rename::real() else {
        return ffi::unresolved(Rename::symbol(), -1);
    };
    // SAFETY: both paths rewritten, nothing else to forward.
    with_two_paths(from, to, |from, to| unsafe { real(from, to) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn renameat(
    from_dirfd: c_int,
    from: *const c_char,
    to_dirfd: c_int,
    to: *const c_char,
) -> c_int {
    let Some(real) = RenameAt::real() else {
        return ffi::unresolved(RenameAt::symbol(), -1);
    };
    // SAFETY: directory descriptors forwarded as received.
    with_two_paths(from, to, |from, to| unsafe { real(from_dirfd, from, to_dirfd, to) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn symlink(target: *const c_char, link: *const c_char) -> c_int {
    let Some(real) = Symlink::real() else {
        return ffi::unresolved(Symlink::symbol(), -1);
    };
    // SAFETY: both paths rewritten, nothing else to forward.
    with_two_paths(target, link, |target, link| unsafe { real(target, link) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn symlinkat(
    target: *const c_char,
    dirfd: c_int,
    link: *const c_char,
) -> c_int {
    let Some(real) = SymlinkAt::real() else {
        return ffi::unresolved(SymlinkAt::symbol(), -1);
    };
    // SAFETY: directory descriptor forwarded as received.
    with_two_paths(target, link, |target, link| unsafe { real(target, dirfd, link) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn link(from: *const c_char, to: *const c_char) -> c_int {
    let Some(real) = Link::real() else {
        return ffi::unresolved(Link::symbol(), -1);
    };
    // SAFETY: both paths rewritten, nothing else to forward.
    with_two_paths(from, to, |from, to| unsafe { real(from, to) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn linkat(
    from_dirfd: c_int,
    from: *const c_char,
    to_dirfd: c_int,
    to: *const c_char,
    flags: c_int,
) -> c_int {
    let Some(real) = LinkAt::real() else {
        return ffi::unresolved(LinkAt::symbol(), -1);
    };
    // SAFETY: descriptors and flags forwarded as received.
    with_two_paths(from, to, |from, to| unsafe {
        real(from_dirfd, from, to_dirfd, to, flags)
    })
}

// ── calls returning paths ───────────────────────────────────────────

#[unsafe(no_mangle)]
pub unsafe extern "C" fn getcwd(buf: *mut c_char, size: size_t) -> *mut c_char {
    let Some(real) = Getcwd::real() else {
        return ffi::unresolved(Getcwd::symbol(), std::ptr::null_mut());
    };
    // SAFETY: the caller's buffer contract is passed on unchanged.
    unsafe { ffi::getcwd(state::get(), real, buf, size) }
}

#[cfg(target_env = "gnu")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_current_dir_name() -> *mut c_char {
    let Some(real) = GetCurrentDirName::real() else {
        return ffi::unresolved(GetCurrentDirName::symbol(), std::ptr::null_mut());
    };
    // SAFETY: takes no arguments; the result is NULL or malloc'd.
    let current = unsafe { real() };
    // SAFETY: `current` is the malloc'd result of the real call.
    unsafe { ffi::rewrite_allocated(state::get(), current) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn realpath(path: *const c_char, resolved: *mut c_char) -> *mut c_char {
    let Some(real) = Realpath::real() else {
        return ffi::unresolved(Realpath::symbol(), std::ptr::null_mut());
    };
    // SAFETY: the caller's buffer contract is passed on unchanged.
    unsafe { ffi::realpath(state::get(), real, path, resolved) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn readlink(
    path: *const c_char,
    buf: *mut c_char,
    bufsiz: size_t,
) -> ssize_t {
    let Some(real) = Readlink::real() else {
        return ffi::unresolved(Readlink::symbol(), -1);
    };
    // SAFETY: `read` forwards to the next definition with buffers owned by
    // the caller or by `readlink_with`.
    unsafe {
        ffi::readlink_with(state::get(), path, buf, bufsiz, |path, buf, len| {
            real(path, buf, len)
        })
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn readlinkat(
    dirfd: c_int,
    path: *const c_char,
    buf: *mut c_char,
    bufsiz: size_t,
) -> ssize_t {
    let Some(real) = ReadlinkAt::real() else {
        return ffi::unresolved(ReadlinkAt::symbol(), -1);
    };
    // SAFETY: as for `readlink`, with the directory descriptor forwarded.
    unsafe {
        ffi::readlink_with(state::get(), path, buf, bufsiz, |path, buf, len| {
            real(dirfd, path, buf, len)
        })
    }
}
