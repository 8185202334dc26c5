//! Trace log sink.
//!
//! Every event is appended to the trace log (opened, written and closed per
//! event) and mirrored to stdout. Failures on the file side are tolerated: the
//! traced program must never notice the tracer.

use crate::guard::{GuardToken, RecursionGuard};
use hooktrace_config::{log_sink_warn, LogConfig};
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("cannot open trace log {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write trace log {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One trace line. Ordering is the append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent<'a> {
    pub pid: u32,
    pub operation: &'a str,
    pub detail: &'a str,
}

impl<'a> TraceEvent<'a> {
    /// Stamp an event with the calling process id.
    ///
    /// Only call this while holding the recursion guard: the pid query is
    /// itself interposed.
    pub fn stamped(operation: &'a str, detail: &'a str) -> Self {
        Self {
            pid: std::process::id(),
            operation,
            detail,
        }
    }

    /// `[PID:<n>] <operation>: <detail>\n`
    pub fn log_line(&self) -> String {
        format!("[PID:{}] {}: {}\n", self.pid, self.operation, self.detail)
    }

    /// `HOOK <operation>: <detail>\n`
    pub fn console_line(&self) -> String {
        format!("HOOK {}: {}\n", self.operation, self.detail)
    }
}

#[derive(Debug, Clone)]
pub struct TraceSink {
    log_path: PathBuf,
    console: bool,
}

impl TraceSink {
    pub fn new(log_path: impl Into<PathBuf>, console: bool) -> Self {
        Self {
            log_path: log_path.into(),
            console,
        }
    }

    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(config.path.clone(), config.console)
    }

    /// True if `path` names the trace log exactly as configured.
    pub fn is_log_path(&self, path: &[u8]) -> bool {
        self.log_path.as_os_str().as_bytes() == path
    }

    /// Emit one event unless this thread is already emitting.
    ///
    /// Returns whether the event was recorded.
    pub fn emit(&self, guard: &RecursionGuard, operation: &str, detail: &str) -> bool {
        let Some(token) = guard.enter() else {
            return false;
        };
        self.record(&token, &TraceEvent::stamped(operation, detail));
        true
    }

    /// Write an event while the caller holds the guard.
    pub fn record(&self, _token: &GuardToken, event: &TraceEvent<'_>) {
        if let Err(e) = self.append(event) {
            log_sink_warn!("trace log unavailable", error = tracing::field::display(&e));
        }
        if self.console {
            self.mirror(event);
        }
    }

    /// Append one line to the trace log, creating it if needed.
    pub fn append(&self, event: &TraceEvent<'_>) -> Result<(), SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(&self.log_path)
            .map_err(|source| SinkError::Open {
                path: self.log_path.clone(),
                source,
            })?;
        file.write_all(event.log_line().as_bytes())
            .map_err(|source| SinkError::Write {
                path: self.log_path.clone(),
                source,
            })
    }

    fn mirror(&self, event: &TraceEvent<'_>) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(event.console_line().as_bytes());
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_line_formats() {
        let event = TraceEvent {
            pid: 1234,
            operation: "unlink",
            detail: "删除文件 'a', 结果=0 (成功)",
        };
        assert_eq!(event.log_line(), "[PID:1234] unlink: 删除文件 'a', 结果=0 (成功)\n");
        assert_eq!(event.console_line(), "HOOK unlink: 删除文件 'a', 结果=0 (成功)\n");
    }

    #[test]
    fn test_emit_appends_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.log");
        let sink = TraceSink::new(&path, false);
        let guard = RecursionGuard::new();

        assert!(sink.emit(&guard, "fork", "准备创建子进程"));
        assert!(sink.emit(&guard, "wait", "等待子进程结束"));
        assert!(!guard.is_active());

        let pid = std::process::id();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            format!(
                "[PID:{pid}] fork: 准备创建子进程\n[PID:{pid}] wait: 等待子进程结束\n"
            )
        );
    }

    #[test]
    fn test_emit_is_noop_while_guarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.log");
        let sink = TraceSink::new(&path, false);
        let guard = RecursionGuard::new();

        let token = guard.enter().unwrap();
        assert!(!sink.emit(&guard, "getpid", "返回进程ID = 1"));
        drop(token);

        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_log_is_tolerated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("trace.log");
        let sink = TraceSink::new(&path, false);
        let guard = RecursionGuard::new();

        assert!(sink.emit(&guard, "close", "关闭文件描述符=3, 结果=0"));
        assert!(!guard.is_active());
        assert!(matches!(
            sink.append(&TraceEvent::stamped("close", "x")),
            Err(SinkError::Open { .. })
        ));
    }

    #[test]
    fn test_is_log_path() {
        let sink = TraceSink::new("syscall_hook.log", true);
        assert!(sink.is_log_path(b"syscall_hook.log"));
        assert!(!sink.is_log_path(b"./syscall_hook.log"));
    }
}
