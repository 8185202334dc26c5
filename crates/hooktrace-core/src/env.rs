//! Environment propagation for process-replacement calls.
//!
//! A traced program may hand `execve`/`posix_spawn` an environment that lacks
//! the loader injection variable. The merged snapshot built here is what the
//! original call receives instead, so the new image keeps loading the layer.
//!
//! Precedence is first-writer-wins: additions, then the calling process's own
//! environment, then the caller-supplied entries. Every name appears once and
//! relative order within each source is kept.

use crate::carray::{CStrArray, PtrArray};
use libc::c_char;
use std::collections::HashSet;
use std::ffi::{CStr, CString};

extern "C" {
    static mut environ: *const *const c_char;
}

/// The calling process's current environment.
///
/// # Safety
///
/// The returned view is invalidated by `setenv`/`putenv`/`unsetenv`.
pub unsafe fn current_environ<'a>() -> CStrArray<'a> {
    CStrArray::from_ptr(environ_ptr())
}

/// Raw `environ`, for calls that take an explicit `envp`.
pub unsafe fn environ_ptr() -> *const *const c_char {
    environ
}

/// `NAME` part of a `NAME=VALUE` entry; `None` for malformed entries.
pub fn entry_name(entry: &[u8]) -> Option<&[u8]> {
    entry
        .iter()
        .position(|&b| b == b'=')
        .map(|eq| &entry[..eq])
}

/// Build a `NAME=VALUE` entry. `None` if either part contains a NUL byte.
pub fn make_entry(name: &str, value: &str) -> Option<CString> {
    CString::new(format!("{}={}", name, value)).ok()
}

/// Ordered, name-unique environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    entries: Vec<CString>,
}

impl EnvSnapshot {
    /// Merge three sources into one snapshot.
    ///
    /// Entries without `=` are dropped.
    pub fn merge<'a, A, C, S>(additions: A, current: C, supplied: S) -> Self
    where
        A: IntoIterator<Item = &'a CStr>,
        C: IntoIterator<Item = &'a CStr>,
        S: IntoIterator<Item = &'a CStr>,
    {
        let mut seen: HashSet<&'a [u8]> = HashSet::new();
        let mut entries = Vec::new();

        for entry in additions.into_iter().chain(current).chain(supplied) {
            let Some(name) = entry_name(entry.to_bytes()) else {
                continue;
            };
            if seen.insert(name) {
                entries.push(entry.to_owned());
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[CString] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.iter().find_map(|entry| {
            let bytes = entry.to_bytes();
            match entry_name(bytes) {
                Some(n) if n == name.as_bytes() => Some(&bytes[n.len() + 1..]),
                _ => None,
            }
        })
    }

    /// How many entries carry `name`. Always 0 or 1 for a merged snapshot.
    pub fn count(&self, name: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry_name(entry.to_bytes()) == Some(name.as_bytes()))
            .count()
    }

    /// Null-terminated `envp` table borrowing this snapshot.
    pub fn to_envp(&self) -> PtrArray<'_> {
        PtrArray::new(self.entries.iter().map(CString::as_c_str))
    }
}
