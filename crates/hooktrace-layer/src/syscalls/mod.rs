// Interceptor implementations, grouped the way libc groups them
pub mod io;
pub mod misc;
pub mod process;

use libc::c_char;
use std::ffi::CStr;

/// Borrow a C string argument that may be null.
#[inline]
pub(crate) unsafe fn opt_cstr<'a>(p: *const c_char) -> Option<&'a CStr> {
    if p.is_null() {
        None
    } else {
        Some(CStr::from_ptr(p))
    }
}

/// Borrow a C string argument, substituting `(null)` for a null pointer.
#[inline]
pub(crate) unsafe fn cstr_or_null<'a>(p: *const c_char) -> &'a CStr {
    opt_cstr(p).unwrap_or(c"(null)")
}
