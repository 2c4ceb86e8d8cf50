//! Next-in-chain definitions of the hooked libc functions.
//!
//! Each hooked function has a zero-sized marker type implementing
//! [`PathOp`]. The address behind it is looked up with
//! `dlsym(RTLD_NEXT, ..)` on first use and cached for the life of the
//! process.

use std::ffi::CStr;
use std::sync::OnceLock;

use libc::{DIR, FILE, c_char, c_int, gid_t, mode_t, off_t, size_t, ssize_t, uid_t};

/// A lazily resolved symbol address.
#[derive(Debug)]
pub struct RealSymbol {
    name: &'static CStr,
    address: OnceLock<usize>,
}

impl RealSymbol {
    /// Creates an unresolved symbol.
    #[must_use]
    pub const fn new(name: &'static CStr) -> Self {
        Self {
            name,
            address: OnceLock::new(),
        }
    }

    /// The symbol name.
    #[must_use]
    pub const fn name(&self) -> &'static CStr {
        self.name
    }

    /// Address of the next definition after this library, or `None` when
    /// no later object in the link chain defines the symbol.
    pub fn address(&self) -> Option<usize> {
        let address = *self.address.get_or_init(|| {
            // SAFETY: `name` is NUL-terminated; RTLD_NEXT skips this object.
            unsafe { libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr()) as usize }
        });
        (address != 0).then_some(address)
    }
}

/// A hooked libc function and its C signature.
pub trait PathOp {
    /// Function pointer type of the real definition.
    type Signature: Copy;

    /// The shared, lazily resolved symbol.
    fn symbol() -> &'static RealSymbol;

    /// The real definition, if one could be resolved.
    fn real() -> Option<Self::Signature> {
        let address = Self::symbol().address()?;
        debug_assert_eq!(
            size_of::<Self::Signature>(),
            size_of::<usize>(),
            "signature must be a function pointer"
        );
        // SAFETY: `Signature` is the function pointer type matching the C
        // prototype of the named symbol, and `address` is non-null.
        Some(unsafe { std::mem::transmute_copy::<usize, Self::Signature>(&address) })
    }
}

macro_rules! path_ops {
    ($( $(#[$meta:meta])* $op:ident = $name:literal : $sig:ty; )*) => {
        $(
            $(#[$meta])*
            #[doc = concat!("Marker for `", stringify!($op), "`.")]
            #[derive(Debug)]
            pub struct $op;

            $(#[$meta])*
            impl PathOp for $op {
                type Signature = $sig;

                fn symbol() -> &'static RealSymbol {
                    static SYMBOL: RealSymbol = RealSymbol::new($name);
                    &SYMBOL
                }
            }
        )*
    };
}

path_ops! {
    Open = c"open": unsafe extern "C" fn(*const c_char, c_int, ...) -> c_int;
    #[cfg(target_env = "gnu")]
    Open64 = c"open64": unsafe extern "C" fn(*const c_char, c_int, ...) -> c_int;
    OpenAt = c"openat": unsafe extern "C" fn(c_int, *const c_char, c_int, ...) -> c_int;
    #[cfg(target_env = "gnu")]
    OpenAt64 = c"openat64": unsafe extern "C" fn(c_int, *const c_char, c_int, ...) -> c_int;
    Creat = c"creat": unsafe extern "C" fn(*const c_char, mode_t) -> c_int;
    #[cfg(target_env = "gnu")]
    Creat64 = c"creat64": unsafe extern "C" fn(*const c_char, mode_t) -> c_int;
    Fopen = c"fopen": unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
    #[cfg(target_env = "gnu")]
    Fopen64 = c"fopen64": unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
    Freopen = c"freopen":
        unsafe extern "C" fn(*const c_char, *const c_char, *mut FILE) -> *mut FILE;
    #[cfg(target_env = "gnu")]
    Freopen64 = c"freopen64":
        unsafe extern "C" fn(*const c_char, *const c_char, *mut FILE) -> *mut FILE;
    Stat = c"stat": unsafe extern "C" fn(*const c_char, *mut libc::stat) -> c_int;
    Lstat = c"lstat": unsafe extern "C" fn(*const c_char, *mut libc::stat) -> c_int;
    #[cfg(target_env = "gnu")]
    Stat64 = c"stat64": unsafe extern "C" fn(*const c_char, *mut libc::stat64) -> c_int;
    #[cfg(target_env = "gnu")]
    Lstat64 = c"lstat64": unsafe extern "C" fn(*const c_char, *mut libc::stat64) -> c_int;
    #[cfg(target_env = "gnu")]
    Xstat = c"__xstat": unsafe extern "C" fn(c_int, *const c_char, *mut libc::stat) -> c_int;
    #[cfg(target_env = "gnu")]
    Lxstat = c"__lxstat": unsafe extern "C" fn(c_int, *const c_char, *mut libc::stat) -> c_int;
    Access = c"access": unsafe extern "C" fn(*const c_char, c_int) -> c_int;
    FaccessAt = c"faccessat": unsafe extern "C" fn(c_int, *const c_char, c_int, c_int) -> c_int;
    Chdir = c"chdir": unsafe extern "C" fn(*const c_char) -> c_int;
    Mkdir = c"mkdir": unsafe extern "C" fn(*const c_char, mode_t) -> c_int;
    MkdirAt = c"mkdirat": unsafe extern "C" fn(c_int, *const c_char, mode_t) -> c_int;
    Rmdir = c"rmdir": unsafe extern "C" fn(*const c_char) -> c_int;
    Unlink = c"unlink": unsafe extern "C" fn(*const c_char) -> c_int;
    UnlinkAt = c"unlinkat": unsafe extern "C" fn(c_int, *const c_char, c_int) -> c_int;
    Rename = c"rename": unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
    RenameAt = c"renameat":
        unsafe extern "C" fn(c_int, *const c_char, c_int, *const c_char) -> c_int;
    Symlink = c"symlink": unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
    SymlinkAt = c"symlinkat": unsafe extern "C" fn(*const c_char, c_int, *const c_char) -> c_int;
    Link = c"link": unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
    LinkAt = c"linkat":
        unsafe extern "C" fn(c_int, *const c_char, c_int, *const c_char, c_int) -> c_int;
    Chmod = c"chmod": unsafe extern "C" fn(*const c_char, mode_t) -> c_int;
    FchmodAt = c"fchmodat": unsafe extern "C" fn(c_int, *const c_char, mode_t, c_int) -> c_int;
    Chown = c"chown": unsafe extern "C" fn(*const c_char, uid_t, gid_t) -> c_int;
    Lchown = c"lchown": unsafe extern "C" fn(*const c_char, uid_t, gid_t) -> c_int;
    FchownAt = c"fchownat":
        unsafe extern "C" fn(c_int, *const c_char, uid_t, gid_t, c_int) -> c_int;
    Truncate = c"truncate": unsafe extern "C" fn(*const c_char, off_t) -> c_int;
    Opendir = c"opendir": unsafe extern "C" fn(*const c_char) -> *mut DIR;
    Execve = c"execve": unsafe extern "C" fn(
        *const c_char,
        *const *const c_char,
        *const *const c_char,
    ) -> c_int;
    Getcwd = c"getcwd": unsafe extern "C" fn(*mut c_char, size_t) -> *mut c_char;
    #[cfg(target_env = "gnu")]
    GetCurrentDirName = c"get_current_dir_name": unsafe extern "C" fn() -> *mut c_char;
    Realpath = c"realpath": unsafe extern "C" fn(*const c_char, *mut c_char) -> *mut c_char;
    Readlink = c"readlink": unsafe extern "C" fn(*const c_char, *mut c_char, size_t) -> ssize_t;
    ReadlinkAt = c"readlinkat":
        unsafe extern "C" fn(c_int, *const c_char, *mut c_char, size_t) -> ssize_t;
}
