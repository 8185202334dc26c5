//! Process creation, replacement and reaping.
//!
//! Every `exec*` entry point ends in [`replace_image`], which applies the
//! environment augmentation and calls the original `execve` or `execvpe`.

use crate::context::{context, InterceptContext};
use crate::syscalls::cstr_or_null;
use hooktrace_core::detail::{
    command_line, exec_failure, fork_result, search_label, spawn_result, system_result,
    wait_result,
};
use hooktrace_core::env::environ_ptr;
use hooktrace_core::{CStrArray, SavedErrno};
use libc::{c_char, c_int, pid_t};

/// How the new image is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// `path` is used as given.
    Path,
    /// `file` is searched in `PATH` when it has no slash.
    Search,
}

/// Pre-call event: the reconstructed command line.
unsafe fn announce(
    ctx: &InterceptContext,
    op: &str,
    label: &str,
    target: *const c_char,
    argv: *const *const c_char,
) {
    ctx.trace(op, || {
        command_line(label, cstr_or_null(target), CStrArray::from_ptr(argv))
    });
}

/// Call the original replacement with the augmented environment.
///
/// `envp` is `None` for entry points that inherit `environ`. Only returns on
/// failure; the failure is traced under `op`.
unsafe fn replace_image(
    ctx: &InterceptContext,
    op: &str,
    lookup: Lookup,
    target: *const c_char,
    argv: *const *const c_char,
    envp: Option<*const *const c_char>,
) -> c_int {
    let supplied = envp.unwrap_or_else(|| environ_ptr());
    let snapshot = ctx.augmented_env(supplied);
    let table = snapshot.as_ref().map(|s| s.to_envp());
    let effective = table.as_ref().map_or(supplied, |t| t.as_ptr());

    let real = match lookup {
        Lookup::Path => ctx.reals.execve.get(),
        Lookup::Search => ctx.reals.execvpe.get(),
    };
    let ret = real(target, argv, effective);

    let saved = SavedErrno::capture();
    ctx.trace(op, || exec_failure(saved.value()));
    saved.restore();
    ret
}

pub unsafe fn fork_hook() -> pid_t {
    let ctx = context();
    let real = ctx.reals.fork.get();
    ctx.trace("fork", || "准备创建子进程".to_string());

    let pid = real();
    let saved = SavedErrno::capture();
    ctx.trace("fork", || fork_result(pid, saved.value()));
    saved.restore();
    pid
}

pub unsafe fn execv_hook(path: *const c_char, argv: *const *const c_char) -> c_int {
    let ctx = context();
    announce(ctx, "execv", "执行命令", path, argv);
    replace_image(ctx, "execv", Lookup::Path, path, argv, None)
}

pub unsafe fn execve_hook(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let ctx = context();
    announce(ctx, "execve", "执行命令", path, argv);
    replace_image(ctx, "execve", Lookup::Path, path, argv, Some(envp))
}

pub unsafe fn execvp_hook(file: *const c_char, argv: *const *const c_char) -> c_int {
    let ctx = context();
    announce(ctx, "execvp", search_label(cstr_or_null(file)), file, argv);
    replace_image(ctx, "execvp", Lookup::Search, file, argv, None)
}

pub unsafe fn execvpe_hook(
    file: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let ctx = context();
    announce(ctx, "execvpe", "执行命令(PATH+ENV)", file, argv);
    replace_image(ctx, "execvpe", Lookup::Search, file, argv, Some(envp))
}

// Targets of the C collectors. The exported execl* symbols reach these after
// the argument list has been gathered into argv.

#[no_mangle]
pub unsafe extern "C" fn hooktrace_execl_collected(
    path: *const c_char,
    argv: *const *const c_char,
) -> c_int {
    let ctx = context();
    announce(ctx, "execl", "执行命令", path, argv);
    replace_image(ctx, "execl", Lookup::Path, path, argv, None)
}

#[no_mangle]
pub unsafe extern "C" fn hooktrace_execlp_collected(
    file: *const c_char,
    argv: *const *const c_char,
) -> c_int {
    let ctx = context();
    announce(ctx, "execlp", search_label(cstr_or_null(file)), file, argv);
    replace_image(ctx, "execlp", Lookup::Search, file, argv, None)
}

#[no_mangle]
pub unsafe extern "C" fn hooktrace_execle_collected(
    path: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let ctx = context();
    announce(ctx, "execle", "执行命令(带环境变量)", path, argv);
    replace_image(ctx, "execle", Lookup::Path, path, argv, Some(envp))
}

pub unsafe fn system_hook(command: *const c_char) -> c_int {
    let ctx = context();
    let real = ctx.reals.system.get();
    ctx.trace("system", || {
        format!("执行系统命令: {}", cstr_or_null(command).to_string_lossy())
    });

    let status = real(command);
    let saved = SavedErrno::capture();
    ctx.trace("system", || system_result(status, saved.value()));
    saved.restore();
    status
}

pub unsafe fn posix_spawn_hook(
    pid: *mut pid_t,
    path: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    spawn(context(), Lookup::Path, pid, path, file_actions, attrp, argv, envp)
}

pub unsafe fn posix_spawnp_hook(
    pid: *mut pid_t,
    file: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    spawn(context(), Lookup::Search, pid, file, file_actions, attrp, argv, envp)
}

#[allow(clippy::too_many_arguments)]
unsafe fn spawn(
    ctx: &InterceptContext,
    lookup: Lookup,
    pid: *mut pid_t,
    target: *const c_char,
    file_actions: *const libc::posix_spawn_file_actions_t,
    attrp: *const libc::posix_spawnattr_t,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let (op, label, real) = match lookup {
        Lookup::Path => ("posix_spawn", "执行命令(POSIX spawn)", ctx.reals.posix_spawn.get()),
        Lookup::Search => ("posix_spawnp", "执行命令(POSIX spawnp)", ctx.reals.posix_spawnp.get()),
    };
    announce(ctx, op, label, target, argv);

    let snapshot = ctx.augmented_env(envp);
    let table = snapshot.as_ref().map(|s| s.to_envp());
    let effective = table.as_ref().map_or(envp, |t| t.as_ptr());

    let ret = real(pid, target, file_actions, attrp, argv, effective);
    let saved = SavedErrno::capture();
    let child = (ret == 0 && !pid.is_null()).then(|| *pid);
    ctx.trace(op, || spawn_result(ret, child));
    saved.restore();
    ret
}

pub unsafe fn wait_hook(status: *mut c_int) -> pid_t {
    let ctx = context();
    let real = ctx.reals.wait.get();
    ctx.trace("wait", || "等待子进程结束".to_string());

    let pid = real(status);
    let saved = SavedErrno::capture();
    let decoded = (pid > 0 && !status.is_null()).then(|| *status);
    ctx.trace("wait", || wait_result(pid, decoded, saved.value()));
    saved.restore();
    pid
}
