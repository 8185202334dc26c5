//! # hooktrace-core
//!
//! The building blocks of the hooktrace preload layer that do not depend on
//! being preloaded:
//!
//! - [`reals`]: lazy, once-per-process resolution of the original libc
//!   implementations (`dlsym(RTLD_NEXT, ..)`)
//! - [`guard`]: the per-thread recursion guard around trace emission
//! - [`sink`]: the append-only trace log plus its console mirror
//! - [`env`]: environment merging that keeps the layer injected across
//!   `execve`/`posix_spawn`
//! - [`detail`]: rendering of the human-readable event details

// Allow unsafe FFI functions without safety docs - these are inherently unsafe C ABI
#![allow(clippy::missing_safety_doc)]

pub mod carray;
pub mod detail;
pub mod env;
pub mod errno;
pub mod guard;
pub mod reals;
pub mod sink;

pub use carray::{CStrArray, PtrArray};
pub use env::EnvSnapshot;
pub use errno::SavedErrno;
pub use guard::{GuardToken, RecursionGuard};
pub use reals::{RealSymbol, ResolveError};
pub use sink::{SinkError, TraceEvent, TraceSink};
