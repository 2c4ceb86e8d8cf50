//! # pathbridge-preload
//!
//! A shared library loaded through `LD_PRELOAD` into every process started
//! inside the container. It exports libc-compatible definitions of the
//! path-taking functions, rewrites container-side paths to their host form
//! before forwarding to the next definition in the link chain, and rewrites
//! host-side results back to the container form on the way out.
//!
//! The library never fails a call on its own account: an empty or missing
//! mapping table, a non-UTF-8 path, or an unmatched path all pass through
//! unchanged. The only errors it originates are `ERANGE`/`ENAMETOOLONG` when
//! a rewritten result does not fit the caller's buffer, and `ENOSYS` when the
//! next definition of a symbol cannot be resolved.
//!
//! Module layout:
//! - [`symbols`]: lazily resolved next definitions of each hooked symbol
//! - [`state`]: the process-wide mapping table, built once from the environment
//! - [`ffi`]: the only place raw C pointers are read or written
//! - `hooks`: the exported `#[unsafe(no_mangle)]` entry points

#![allow(unsafe_code)]

pub mod ffi;
pub mod state;
pub mod symbols;

#[cfg(all(target_os = "linux", not(test)))]
mod hooks;
