//! Real Symbol Storage
//!
//! Resolves the implementation an interposed symbol shadows: the next
//! definition after this object in the loader's search order (`RTLD_NEXT`).
//! Each symbol is resolved at most once per process and cached for its
//! lifetime.

use libc::c_void;
use std::ffi::CStr;
use std::marker::PhantomData;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no next definition of `{0}` in the loader search order")]
    NotFound(String),
}

/// Cached binding from a symbol name to the libc definition it shadows.
///
/// `F` is the function pointer type of the original, e.g.
/// `unsafe extern "C" fn() -> libc::pid_t`.
pub struct RealSymbol<F> {
    name: &'static CStr,
    addr: OnceLock<usize>,
    _sig: PhantomData<F>,
}

impl<F: Copy> RealSymbol<F> {
    pub const fn new(name: &'static CStr) -> Self {
        Self {
            name,
            addr: OnceLock::new(),
            _sig: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name.to_str().unwrap_or("?")
    }

    pub fn is_resolved(&self) -> bool {
        self.addr.get().is_some()
    }

    /// Get the shadowed definition, resolving it on first use.
    ///
    /// Aborts the process when the symbol has no next definition: an
    /// interceptor without its original cannot stay transparent.
    pub unsafe fn get(&self) -> F {
        let addr = *self.addr.get_or_init(|| match lookup_next(self.name) {
            Ok(p) => p as usize,
            Err(e) => abort_unresolved(&e),
        });
        cast_addr(addr)
    }

}

unsafe fn cast_addr<F: Copy>(addr: usize) -> F {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());
    std::mem::transmute_copy::<usize, F>(&addr)
}

/// Ask the loader for the next definition of `name` after this object.
///
/// Runs inside `OnceLock::get_or_init`, so it must not call anything that
/// is itself interposed: no diagnostics here.
pub fn lookup_next(name: &CStr) -> Result<*mut c_void, ResolveError> {
    let p = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr()) };
    if p.is_null() {
        return Err(ResolveError::NotFound(name.to_string_lossy().into_owned()));
    }
    Ok(p)
}

/// Report an unresolvable symbol on fd 2 and abort.
///
/// Uses the raw `write` syscall: the libc `write` may itself be interposed
/// and unresolved.
pub fn abort_unresolved(err: &ResolveError) -> ! {
    let msg = format!("hooktrace: fatal: {}\n", err);
    unsafe {
        libc::syscall(
            libc::SYS_write,
            2 as libc::c_long,
            msg.as_ptr() as libc::c_long,
            msg.len() as libc::c_long,
        );
        libc::abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type GetpidFn = unsafe extern "C" fn() -> libc::pid_t;

    #[test]
    fn test_resolves_libc_symbol_once() {
        static REAL_GETPID: RealSymbol<GetpidFn> = RealSymbol::new(c"getpid");
        assert!(!REAL_GETPID.is_resolved());

        let pid = unsafe { REAL_GETPID.get()() };
        assert_eq!(pid as u32, std::process::id());
        assert!(REAL_GETPID.is_resolved());

        let first = unsafe { REAL_GETPID.get() } as usize;
        let second = unsafe { REAL_GETPID.get() } as usize;
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_symbol_is_an_error() {
        let err = lookup_next(c"hooktrace_no_such_symbol").unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFound("hooktrace_no_such_symbol".to_string())
        );
    }

    #[test]
    fn test_name() {
        let sym: RealSymbol<GetpidFn> = RealSymbol::new(c"execve");
        assert_eq!(sym.name(), "execve");
    }
}
