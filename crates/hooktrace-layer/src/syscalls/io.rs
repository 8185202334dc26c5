//! Byte-stream interceptors: `open`, `open64`, `write`, `close`.
//!
//! Activity on the trace log itself and on stdout/stderr is never traced.

use crate::context::{context, OpenFn};
use crate::syscalls::opt_cstr;
use hooktrace_core::detail::{close_detail, open_detail, open_takes_mode, preview, write_detail};
use hooktrace_core::{RealSymbol, SavedErrno};
use libc::{c_char, c_int, c_uint, c_void, mode_t, size_t, ssize_t};

pub unsafe fn open_hook(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    open_with(&context().reals.open, "open", path, flags, mode)
}

pub unsafe fn open64_hook(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    open_with(&context().reals.open64, "open64", path, flags, mode)
}

unsafe fn open_with(
    real: &RealSymbol<OpenFn>,
    op: &str,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    let ctx = context();
    let real = real.get();
    // The mode slot is only meaningful (and only read) with O_CREAT/O_TMPFILE.
    let mode = if open_takes_mode(flags) { mode } else { 0 };
    let fd = real(path, flags, mode as c_uint);
    let saved = SavedErrno::capture();

    ctx.trace_with(op, |settings| {
        let path = opt_cstr(path)?;
        if settings.sink.is_log_path(path.to_bytes()) {
            return None;
        }
        Some(open_detail(path, flags, mode, fd))
    });

    saved.restore();
    fd
}

pub unsafe fn write_hook(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    let ctx = context();
    let real = ctx.reals.write.get();
    let written = real(fd, buf, count);
    let saved = SavedErrno::capture();

    if fd != libc::STDOUT_FILENO && fd != libc::STDERR_FILENO {
        ctx.trace_with("write", |settings| {
            // Only bytes the kernel actually consumed are known to be readable.
            let readable = if buf.is_null() || written <= 0 {
                0
            } else {
                written as usize
            };
            let len = readable.min(settings.preview_len);
            let content = if len == 0 {
                String::new()
            } else {
                preview(std::slice::from_raw_parts(buf.cast::<u8>(), len), len)
            };
            Some(write_detail(fd, count, written, &content))
        });
    }

    saved.restore();
    written
}

pub unsafe fn close_hook(fd: c_int) -> c_int {
    let ctx = context();
    let real = ctx.reals.close.get();
    let ret = real(fd);
    let saved = SavedErrno::capture();
    ctx.trace("close", || close_detail(fd, ret));
    saved.restore();
    ret
}
