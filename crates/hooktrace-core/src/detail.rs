//! Human-readable detail strings for trace events.
//!
//! The wording matches the log format existing readers of `syscall_hook.log`
//! already parse, so labels stay as they are.

use crate::errno::describe;
use libc::{c_int, mode_t};
use nix::sys::signal::Signal;
use std::ffi::CStr;
use std::fmt::Write;

/// Cap for reconstructed command lines.
pub const MAX_COMMAND_LEN: usize = 10240;

/// Default cap for `write` content previews.
pub const DEFAULT_PREVIEW_LEN: usize = 100;

/// `<label>: <target> <argv...>`, capped at [`MAX_COMMAND_LEN`].
///
/// When an argument no longer fits, ` ...` is appended and the rest dropped.
pub fn command_line<'a, I>(label: &str, target: &CStr, argv: I) -> String
where
    I: IntoIterator<Item = &'a CStr>,
{
    let mut out = format!("{}: {}", label, target.to_string_lossy());
    for arg in argv {
        let arg = arg.to_string_lossy();
        if out.len() + 1 + arg.len() > MAX_COMMAND_LEN {
            out.push_str(" ...");
            break;
        }
        out.push(' ');
        out.push_str(&arg);
    }
    out
}

/// Label for a path-search execution, flagging toolchain stages.
pub fn search_label(file: &CStr) -> &'static str {
    let name = file.to_bytes();
    let contains = |needle: &[u8]| name.windows(needle.len()).any(|w| w == needle);
    if contains(b"gcc") || contains(b"g++") || contains(b"clang") {
        "🔥 MAKE调用编译器"
    } else if contains(b"as") {
        "🔧 编译器调用汇编器"
    } else if contains(b"ld") {
        "🔗 编译器调用链接器"
    } else {
        "执行命令(PATH查找)"
    }
}

pub fn fork_result(pid: libc::pid_t, err: c_int) -> String {
    match pid {
        0 => "子进程创建成功，当前在子进程中".to_string(),
        p if p > 0 => format!("父进程中,子进程PID = {}", p),
        p => format!("fork失败,返回 {}, {}", p, describe(err)),
    }
}

/// `exit=<n>`, `signal=<n>(<name>)` or `raw=<n>` for a wait status.
pub fn wait_status(status: c_int) -> String {
    if libc::WIFEXITED(status) {
        format!("exit={}", libc::WEXITSTATUS(status))
    } else if libc::WIFSIGNALED(status) {
        let sig = libc::WTERMSIG(status);
        match Signal::try_from(sig) {
            Ok(s) => format!("signal={}({})", sig, s.as_str()),
            Err(_) => format!("signal={}", sig),
        }
    } else if libc::WIFSTOPPED(status) {
        format!("stopped={}", libc::WSTOPSIG(status))
    } else {
        format!("raw={}", status)
    }
}

pub fn wait_result(pid: libc::pid_t, status: Option<c_int>, err: c_int) -> String {
    if pid > 0 {
        match status {
            Some(s) => format!("子进程 {} 结束，退出状态: {} ({})", pid, s, wait_status(s)),
            None => format!("子进程 {} 结束，退出状态: -1", pid),
        }
    } else {
        format!("wait失败，返回 {}, {}", pid, describe(err))
    }
}

pub fn system_result(status: c_int, err: c_int) -> String {
    if status == -1 {
        format!("系统命令执行结果: -1, {}", describe(err))
    } else {
        format!("系统命令执行结果: {} ({})", status, wait_status(status))
    }
}

pub fn exec_failure(err: c_int) -> String {
    format!("执行失败, 返回 -1, {}", describe(err))
}

/// `posix_spawn` reports failure through its return value, not errno.
pub fn spawn_result(ret: c_int, pid: Option<libc::pid_t>) -> String {
    if ret == 0 {
        match pid {
            Some(p) => format!("spawn成功, 子进程PID = {}", p),
            None => "spawn成功".to_string(),
        }
    } else {
        format!("spawn失败, 返回 {}, {}", ret, describe(ret))
    }
}

/// Access mode plus the creation/behavior flags worth showing.
pub fn open_flags(flags: c_int) -> String {
    let mut out = String::new();
    match flags & libc::O_ACCMODE {
        libc::O_RDONLY => out.push_str("O_RDONLY "),
        libc::O_WRONLY => out.push_str("O_WRONLY "),
        libc::O_RDWR => out.push_str("O_RDWR "),
        _ => {}
    }
    for (bit, name) in [
        (libc::O_CREAT, "O_CREAT "),
        (libc::O_EXCL, "O_EXCL "),
        (libc::O_TRUNC, "O_TRUNC "),
        (libc::O_APPEND, "O_APPEND "),
        (libc::O_CLOEXEC, "O_CLOEXEC "),
    ] {
        if flags & bit != 0 {
            out.push_str(name);
        }
    }
    out
}

/// Whether `open` reads a mode argument for these flags.
pub fn open_takes_mode(flags: c_int) -> bool {
    #[cfg(target_os = "linux")]
    if flags & libc::O_TMPFILE == libc::O_TMPFILE {
        return true;
    }
    flags & libc::O_CREAT != 0
}

pub fn open_detail(path: &CStr, flags: c_int, mode: mode_t, fd: c_int) -> String {
    let mode = if open_takes_mode(flags) { mode } else { 0 };
    format!(
        "打开文件 '{}', 标志:[{}], 模式:0{:o}, 文件描述符={}",
        path.to_string_lossy(),
        open_flags(flags),
        mode,
        fd
    )
}

pub fn close_detail(fd: c_int, result: c_int) -> String {
    format!("关闭文件描述符={}, 结果={}", fd, result)
}

/// Printable-ASCII preview of written bytes; everything else becomes `.`.
pub fn preview(buf: &[u8], limit: usize) -> String {
    buf.iter()
        .take(limit)
        .map(|&b| if (32..=126).contains(&b) { b as char } else { '.' })
        .collect()
}

pub fn write_detail(fd: c_int, count: usize, written: isize, preview: &str) -> String {
    format!(
        "写入fd={}, 字节数={}, 实际写入={}, 内容:'{}'",
        fd, count, written, preview
    )
}

pub fn access_mode(mode: c_int) -> String {
    if mode == libc::F_OK {
        return "F_OK".to_string();
    }
    let mut out = String::new();
    for (bit, name) in [
        (libc::R_OK, "R_OK "),
        (libc::W_OK, "W_OK "),
        (libc::X_OK, "X_OK "),
    ] {
        if mode & bit != 0 {
            out.push_str(name);
        }
    }
    out
}

fn outcome(result: c_int) -> &'static str {
    if result == 0 {
        "(成功)"
    } else {
        "(失败)"
    }
}

pub fn access_detail(path: &CStr, mode: c_int, result: c_int) -> String {
    format!(
        "检查文件 '{}', 模式:[{}], 结果={} {}",
        path.to_string_lossy(),
        access_mode(mode),
        result,
        outcome(result)
    )
}

pub fn unlink_detail(path: &CStr, result: c_int, err: c_int) -> String {
    let mut out = format!(
        "删除文件 '{}', 结果={} {}",
        path.to_string_lossy(),
        result,
        outcome(result)
    );
    if result != 0 {
        let _ = write!(out, ", {}", describe(err));
    }
    out
}

pub fn getcwd_detail(result: Option<&CStr>, size: usize) -> String {
    let cwd = result
        .map(|c| c.to_string_lossy().into_owned())
        .unwrap_or_else(|| "NULL".to_string());
    format!("获取当前目录 = {} (缓冲区大小:{})", cwd, size)
}
