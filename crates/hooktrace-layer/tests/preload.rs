//! The built `libhooktrace.so` preloaded into a small C program.
//!
//! Each test compiles `fixtures/traced_program.c`, runs one scenario under
//! `LD_PRELOAD` with the trace log in a tempdir, and checks both what the
//! program observed and what ended up in the log.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// `target/<profile>/libhooktrace.so`, next to the `deps/` dir holding this test.
fn layer_path() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let profile_dir = exe.parent().and_then(Path::parent).unwrap();
    let lib = profile_dir.join("libhooktrace.so");
    assert!(lib.exists(), "{} has not been built", lib.display());
    lib
}

struct Traced {
    dir: TempDir,
    program: PathBuf,
    log: PathBuf,
}

impl Traced {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source =
            Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/traced_program.c");
        let program = dir.path().join("traced_program");
        let status = std::process::Command::new("cc")
            .arg(&source)
            .arg("-o")
            .arg(&program)
            .status()
            .expect("Failed to run the C compiler");
        assert!(status.success(), "traced_program.c did not compile");
        let log = dir.path().join("syscall_hook.log");
        Self { dir, program, log }
    }

    fn command(&self, scenario: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(scenario)
            .current_dir(self.dir.path())
            .env("LD_PRELOAD", layer_path())
            .env("HOOKTRACE_LOG", &self.log)
            .env("HOOKTRACE_CONSOLE", "0")
            .env("HOOKTRACE_CONFIG", self.dir.path().join("absent.toml"))
            .env_remove("HOOKTRACE_DEBUG")
            .env_remove("HOOKTRACE_PRELOAD")
            .env_remove("HOOKTRACE_PROPAGATE")
            .timeout(Duration::from_secs(30));
        cmd
    }

    fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

fn count(lines: &[String], needle: &str) -> usize {
    lines.iter().filter(|l| l.contains(needle)).count()
}

/// Value following `key` in a `KEY=value` / `KEY value` stdout token stream.
fn field(stdout: &str, key: &str) -> String {
    stdout
        .split_whitespace()
        .skip_while(|t| *t != key)
        .nth(1)
        .unwrap_or_else(|| panic!("{key} missing from output:\n{stdout}"))
        .to_string()
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

#[test]
fn test_passive_calls_are_traced_and_transparent() {
    let traced = Traced::new();
    let assert = traced
        .command("basics")
        .assert()
        .success()
        .stdout(predicate::str::contains("FILE ret=5"))
        .stdout(predicate::str::contains("WRITE ret=-1 errno=9"))
        .stdout(predicate::str::contains("UNLINK ret=-1 errno=2"))
        .stdout(predicate::str::contains("to-stdout"));
    let stdout = stdout_of(&assert);
    let pid = field(&stdout, "PID");
    let uid = field(&stdout, "UID");

    let lines = traced.log_lines();
    let prefix = format!("[PID:{pid}] ");
    assert!(lines.iter().all(|l| l.starts_with(&prefix)), "{lines:#?}");

    assert_eq!(count(&lines, &format!("getuid: 返回用户ID = {uid}")), 1);
    assert_eq!(count(&lines, "打开文件 'out.txt', 标志:[O_WRONLY O_CREAT O_TRUNC ], 模式:0644"), 1);
    assert_eq!(count(&lines, "字节数=5, 实际写入=5, 内容:'hello'"), 1);
    assert_eq!(count(&lines, "close: 关闭文件描述符="), 1);

    // The rejected write is reported without reading its buffer.
    assert_eq!(count(&lines, "写入fd=999, 字节数=5, 实际写入=-1, 内容:''"), 1);

    // stdout/stderr and the trace log itself are never traced.
    assert_eq!(count(&lines, "写入fd=1,"), 0);
    assert_eq!(count(&lines, "写入fd=2,"), 0);
    assert_eq!(count(&lines, "syscall_hook.log"), 0);

    // One failed removal, one event.
    assert_eq!(count(&lines, "] unlink: "), 1);
    assert_eq!(count(&lines, "删除文件 'missing.txt', 结果=-1 (失败), errno=2"), 1);

    // Every event is stamped through getpid; only the program's own call shows.
    assert_eq!(count(&lines, "] getpid: "), 1);
    assert_eq!(count(&lines, &format!("getpid: 返回进程ID = {pid}")), 1);
}

#[test]
fn test_debug_diagnostics_do_not_stall_the_program() {
    // getuid installs the stderr subscriber before write is first resolved.
    let traced = Traced::new();
    traced
        .command("basics")
        .env("HOOKTRACE_DEBUG", "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("WRITE ret=-1 errno=9"))
        .stdout(predicate::str::contains("UNLINK ret=-1 errno=2"));

    let lines = traced.log_lines();
    assert_eq!(count(&lines, "字节数=5, 实际写入=5, 内容:'hello'"), 1);
    assert_eq!(count(&lines, "] unlink: "), 1);
}

#[test]
fn test_failed_exec_reports_one_pre_and_one_post_event() {
    let traced = Traced::new();
    traced
        .command("exec-fail")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXECL ret=-1 errno=2"))
        .stdout(predicate::str::contains("EXECVP ret=-1 errno=2"));

    let lines = traced.log_lines();
    assert_eq!(
        count(
            &lines,
            "execl: 执行命令: /nonexistent/hooktrace-missing hooktrace-missing -v"
        ),
        1
    );
    assert_eq!(count(&lines, "execl: 执行失败, 返回 -1, errno=2"), 1);
    assert_eq!(
        count(
            &lines,
            "execvp: 执行命令(PATH查找): hooktrace-no-such-command hooktrace-no-such-command"
        ),
        1
    );
    assert_eq!(count(&lines, "execvp: 执行失败, 返回 -1, errno=2"), 1);
    assert_eq!(count(&lines, "] execl: "), 2);
    assert_eq!(count(&lines, "] execvp: "), 2);
}

#[test]
fn test_replaced_and_spawned_images_get_preload_once() {
    let traced = Traced::new();
    let layer = std::fs::canonicalize(layer_path()).unwrap();
    let layer = layer.to_string_lossy();

    traced
        .command("spawn-env")
        .assert()
        .success()
        .stdout(predicate::str::contains("SPAWN rc=0"))
        .stdout(predicate::str::contains("EXECVE child status=0"))
        .stdout(predicate::str::contains(format!(
            "CHILD mark=spawned preload_count=1 preload={layer}\n"
        )))
        .stdout(predicate::str::contains(format!(
            "CHILD mark=execve preload_count=1 preload={layer}\n"
        )));

    let lines = traced.log_lines();
    assert_eq!(count(&lines, "posix_spawn: 执行命令(POSIX spawn): "), 1);
    assert_eq!(count(&lines, "posix_spawn: spawn成功, 子进程PID = "), 1);
    assert_eq!(count(&lines, "fork: 准备创建子进程"), 1);
    assert_eq!(count(&lines, "execve: 执行命令: "), 1);
    assert_eq!(count(&lines, "execve: 执行失败"), 0);
    assert_eq!(count(&lines, "退出状态: 0 (exit=0)"), 2);
}
