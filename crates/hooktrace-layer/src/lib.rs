//! # hooktrace
//!
//! `LD_PRELOAD` layer that records process, file and identity calls of an
//! unmodified program to `syscall_hook.log` and forwards every call to the
//! original libc implementation.
//!
//! ```bash
//! LD_PRELOAD=target/release/libhooktrace.so make
//! ```
//!
//! Nothing in here may trace itself: every trace write happens while the
//! calling thread holds the recursion guard, and every interposed call made
//! by that write (`open64`, `write`, `close`, `getpid`) only forwards.

// Allow unsafe FFI functions without safety docs - these are inherently unsafe C ABI
#![allow(clippy::missing_safety_doc)]

pub(crate) mod context;
#[cfg(target_os = "linux")]
pub mod interpose;
pub mod syscalls;
