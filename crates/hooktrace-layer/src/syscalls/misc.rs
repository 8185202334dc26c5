//! Identity, working directory, permission check, delay and removal.

use crate::context::context;
use crate::syscalls::{cstr_or_null, opt_cstr};
use hooktrace_core::detail::{access_detail, getcwd_detail, unlink_detail};
use hooktrace_core::SavedErrno;
use libc::{c_char, c_int, c_uint, pid_t, size_t, uid_t};

/// The trace sink stamps every event with the pid, so this runs inside the
/// guard on every emission and must stay silent there.
pub unsafe fn getpid_hook() -> pid_t {
    let ctx = context();
    let real = ctx.reals.getpid.get();
    let pid = real();
    if !ctx.guard.is_active() {
        let saved = SavedErrno::capture();
        ctx.trace("getpid", || format!("返回进程ID = {}", pid));
        saved.restore();
    }
    pid
}

pub unsafe fn getuid_hook() -> uid_t {
    let ctx = context();
    let real = ctx.reals.getuid.get();
    let uid = real();
    let saved = SavedErrno::capture();
    ctx.trace("getuid", || format!("返回用户ID = {}", uid));
    saved.restore();
    uid
}

pub unsafe fn getcwd_hook(buf: *mut c_char, size: size_t) -> *mut c_char {
    let ctx = context();
    let real = ctx.reals.getcwd.get();
    let ret = real(buf, size);
    let saved = SavedErrno::capture();
    ctx.trace("getcwd", || getcwd_detail(opt_cstr(ret), size));
    saved.restore();
    ret
}

pub unsafe fn access_hook(path: *const c_char, mode: c_int) -> c_int {
    let ctx = context();
    let real = ctx.reals.access.get();
    let ret = real(path, mode);
    let saved = SavedErrno::capture();
    ctx.trace("access", || access_detail(cstr_or_null(path), mode, ret));
    saved.restore();
    ret
}

pub unsafe fn sleep_hook(seconds: c_uint) -> c_uint {
    let ctx = context();
    let real = ctx.reals.sleep.get();
    ctx.trace("sleep", || format!("开始睡眠 {} 秒", seconds));

    let remaining = real(seconds);
    let saved = SavedErrno::capture();
    ctx.trace("sleep", || {
        format!("睡眠结束，剩余未完成的秒数: {}", remaining)
    });
    saved.restore();
    remaining
}

pub unsafe fn unlink_hook(path: *const c_char) -> c_int {
    let ctx = context();
    let real = ctx.reals.unlink.get();
    let ret = real(path);
    let saved = SavedErrno::capture();
    ctx.trace("unlink", || unlink_detail(cstr_or_null(path), ret, saved.value()));
    saved.restore();
    ret
}
