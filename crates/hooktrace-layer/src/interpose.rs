//! Exported libc symbols.
//!
//! On Linux the loader binds every caller in the traced process to these
//! definitions once the library is in `LD_PRELOAD`. Each one hands off to its
//! interceptor in [`crate::syscalls`]; the originals are reached through
//! `dlsym(RTLD_NEXT)`.

use crate::syscalls::io::{close_hook, open64_hook, open_hook, write_hook};
use crate::syscalls::misc::{
    access_hook, getcwd_hook, getpid_hook, getuid_hook, sleep_hook, unlink_hook,
};
use crate::syscalls::process::{
    execv_hook, execve_hook, execvp_hook, execvpe_hook, fork_hook, posix_spawn_hook,
    posix_spawnp_hook, system_hook, wait_hook,
};
use libc::{c_char, c_int, c_uint, c_void, mode_t, pid_t, size_t, ssize_t, uid_t};

// ---------------------------------------------------------------------------
// Process creation and replacement
// ---------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn fork() -> pid_t {
    fork_hook()
}

#[no_mangle]
pub unsafe extern "C" fn execv(path: *const c_char, argv: *const *const c_char) -> c_int {
    execv_hook(path, argv)
}

#[no_mangle]
pub unsafe extern "C" fn execve(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    execve_hook(path, argv, envp)
}

#[no_mangle]
pub unsafe extern "C" fn execvp(file: *const c_char, argv: *const *const c_char) -> c_int {
    execvp_hook(file, argv)
}

#[no_mangle]
pub unsafe extern "C" fn execvpe(
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    execvpe_hook(file, argv, envp)
}

#[no_mangle]
pub unsafe extern "C" fn system(command: *const c_char) -> c_int {
    system_hook(command)
}

#[no_mangle]
pub unsafe extern "C" fn posix_spawn(
    pid: *mut pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    posix_spawn_hook(pid, path, file_actions, attrp, argv, envp)
}

#[no_mangle]
pub unsafe extern "C" fn posix_spawnp(
    pid: *mut pid_t,
    file: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    posix_spawnp_hook(pid, file, file_actions, attrp, argv, envp)
}

#[no_mangle]
pub unsafe extern "C" fn wait(status: *mut c_int) -> pid_t {
    wait_hook(status)
}

// ---------------------------------------------------------------------------
// execl family
//
// The argument list is variadic, which Rust cannot define. Each export is a
// bare jump into a C collector (built by build.rs) that gathers the list into
// argv and calls back into `hooktrace_*_collected`. The jump leaves argument
// registers and the stack untouched.
// ---------------------------------------------------------------------------

extern "C" {
    fn hooktrace_execl_va(path: *const c_char, arg: *const c_char, ...) -> c_int;
    fn hooktrace_execlp_va(file: *const c_char, arg: *const c_char, ...) -> c_int;
    fn hooktrace_execle_va(path: *const c_char, arg: *const c_char, ...) -> c_int;
}

#[cfg(target_arch = "x86_64")]
macro_rules! tail_jump {
    () => {
        "jmp {target}@PLT"
    };
}

#[cfg(target_arch = "aarch64")]
macro_rules! tail_jump {
    () => {
        "b {target}"
    };
}

macro_rules! variadic_trampoline {
    ($export:ident => $collector:ident) => {
        #[no_mangle]
        #[unsafe(naked)]
        pub unsafe extern "C" fn $export(_path: *const c_char, _arg: *const c_char) -> c_int {
            core::arch::naked_asm!(tail_jump!(), target = sym $collector)
        }
    };
}

variadic_trampoline!(execl => hooktrace_execl_va);
variadic_trampoline!(execlp => hooktrace_execlp_va);
variadic_trampoline!(execle => hooktrace_execle_va);

// ---------------------------------------------------------------------------
// Byte streams
// ---------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    open_hook(path, flags, mode)
}

#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    open64_hook(path, flags, mode)
}

#[no_mangle]
pub unsafe extern "C" fn write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    write_hook(fd, buf, count)
}

#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    close_hook(fd)
}

// ---------------------------------------------------------------------------
// Identity, directory, permissions, delay, removal
// ---------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn getpid() -> pid_t {
    getpid_hook()
}

#[no_mangle]
pub unsafe extern "C" fn getuid() -> uid_t {
    getuid_hook()
}

#[no_mangle]
pub unsafe extern "C" fn getcwd(buf: *mut c_char, size: size_t) -> *mut c_char {
    getcwd_hook(buf, size)
}

#[no_mangle]
pub unsafe extern "C" fn access(path: *const c_char, mode: c_int) -> c_int {
    access_hook(path, mode)
}

#[no_mangle]
pub unsafe extern "C" fn sleep(seconds: c_uint) -> c_uint {
    sleep_hook(seconds)
}

#[no_mangle]
pub unsafe extern "C" fn unlink(path: *const c_char) -> c_int {
    unlink_hook(path)
}
