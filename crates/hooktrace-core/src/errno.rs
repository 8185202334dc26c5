//! Platform-agnostic errno access.

use libc::c_int;
use nix::errno::Errno;

#[cfg(target_os = "linux")]
unsafe fn errno_location() -> *mut c_int {
    libc::__errno_location()
}

#[cfg(target_os = "macos")]
unsafe fn errno_location() -> *mut c_int {
    libc::__error()
}

pub fn errno() -> c_int {
    unsafe { *errno_location() }
}

pub fn set_errno(e: c_int) {
    unsafe { *errno_location() = e }
}

/// errno captured right after an original call returned.
///
/// Trace I/O between the call and the interceptor's return clobbers errno;
/// [`restore`](Self::restore) puts the caller-visible value back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedErrno(c_int);

impl SavedErrno {
    pub fn capture() -> Self {
        Self(errno())
    }

    pub fn value(self) -> c_int {
        self.0
    }

    pub fn restore(self) {
        set_errno(self.0)
    }
}

/// `errno=<n> (<description>)`
pub fn describe(e: c_int) -> String {
    format!("errno={} ({})", e, Errno::from_raw(e).desc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_and_restore() {
        set_errno(libc::ENOENT);
        let saved = SavedErrno::capture();
        set_errno(libc::EBADF);
        saved.restore();
        assert_eq!(errno(), libc::ENOENT);
        assert_eq!(saved.value(), libc::ENOENT);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(libc::ENOENT), "errno=2 (No such file or directory)");
    }
}
