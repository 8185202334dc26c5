//! Interception context: the one process-wide value every interceptor uses.
//!
//! It owns the original-symbol bindings, the recursion guard and the lazily
//! loaded settings (trace sink, preview length, propagation additions).
//! Settings are only ever initialized from inside the guard, so the file I/O
//! of loading them is never traced and never re-enters initialization.

use hooktrace_config::{log_layer_debug, log_propagation_debug, log_resolver_debug, HookConfig};
use hooktrace_core::env::{current_environ, make_entry};
use hooktrace_core::{CStrArray, EnvSnapshot, RealSymbol, RecursionGuard, TraceEvent, TraceSink};
use libc::{c_char, c_int, c_uint, c_void, pid_t, size_t, ssize_t, uid_t};
use std::ffi::{CStr, CString};
use std::sync::OnceLock;

pub(crate) type ForkFn = unsafe extern "C" fn() -> pid_t;
pub(crate) type ExecveFn =
    unsafe extern "C" fn(*const c_char, *const *const c_char, *const *const c_char) -> c_int;
pub(crate) type SystemFn = unsafe extern "C" fn(*const c_char) -> c_int;
pub(crate) type PosixSpawnFn = unsafe extern "C" fn(
    *mut pid_t,
    *const c_char,
    *const libc::posix_spawn_file_actions_t,
    *const libc::posix_spawnattr_t,
    *const *const c_char,
    *const *const c_char,
) -> c_int;
pub(crate) type WaitFn = unsafe extern "C" fn(*mut c_int) -> pid_t;
pub(crate) type GetpidFn = unsafe extern "C" fn() -> pid_t;
pub(crate) type GetuidFn = unsafe extern "C" fn() -> uid_t;
pub(crate) type GetcwdFn = unsafe extern "C" fn(*mut c_char, size_t) -> *mut c_char;
pub(crate) type OpenFn = unsafe extern "C" fn(*const c_char, c_int, ...) -> c_int;
pub(crate) type WriteFn = unsafe extern "C" fn(c_int, *const c_void, size_t) -> ssize_t;
pub(crate) type CloseFn = unsafe extern "C" fn(c_int) -> c_int;
pub(crate) type AccessFn = unsafe extern "C" fn(*const c_char, c_int) -> c_int;
pub(crate) type SleepFn = unsafe extern "C" fn(c_uint) -> c_uint;
pub(crate) type UnlinkFn = unsafe extern "C" fn(*const c_char) -> c_int;

/// Originals the interceptors forward to.
///
/// The `exec*` entry points without an explicit environment, and the `execl`
/// family, all land on `execve` or `execvpe`.
pub(crate) struct RealTable {
    pub fork: RealSymbol<ForkFn>,
    pub execve: RealSymbol<ExecveFn>,
    pub execvpe: RealSymbol<ExecveFn>,
    pub system: RealSymbol<SystemFn>,
    pub posix_spawn: RealSymbol<PosixSpawnFn>,
    pub posix_spawnp: RealSymbol<PosixSpawnFn>,
    pub wait: RealSymbol<WaitFn>,
    pub getpid: RealSymbol<GetpidFn>,
    pub getuid: RealSymbol<GetuidFn>,
    pub getcwd: RealSymbol<GetcwdFn>,
    pub open: RealSymbol<OpenFn>,
    pub open64: RealSymbol<OpenFn>,
    pub write: RealSymbol<WriteFn>,
    pub close: RealSymbol<CloseFn>,
    pub access: RealSymbol<AccessFn>,
    pub sleep: RealSymbol<SleepFn>,
    pub unlink: RealSymbol<UnlinkFn>,
}

impl RealTable {
    /// Resolve every original the trace write itself goes through.
    ///
    /// Must run before a diagnostic subscriber is installed: the subscriber
    /// writes to stderr through the interposed `write`.
    unsafe fn prime_sink_path(&self) {
        self.write.get();
        self.open.get();
        self.open64.get();
        self.close.get();
        self.getpid.get();
    }

    const fn new() -> Self {
        Self {
            fork: RealSymbol::new(c"fork"),
            execve: RealSymbol::new(c"execve"),
            execvpe: RealSymbol::new(c"execvpe"),
            system: RealSymbol::new(c"system"),
            posix_spawn: RealSymbol::new(c"posix_spawn"),
            posix_spawnp: RealSymbol::new(c"posix_spawnp"),
            wait: RealSymbol::new(c"wait"),
            getpid: RealSymbol::new(c"getpid"),
            getuid: RealSymbol::new(c"getuid"),
            getcwd: RealSymbol::new(c"getcwd"),
            open: RealSymbol::new(c"open"),
            open64: RealSymbol::new(c"open64"),
            write: RealSymbol::new(c"write"),
            close: RealSymbol::new(c"close"),
            access: RealSymbol::new(c"access"),
            sleep: RealSymbol::new(c"sleep"),
            unlink: RealSymbol::new(c"unlink"),
        }
    }
}

/// Everything derived from configuration.
pub(crate) struct Settings {
    pub sink: TraceSink,
    pub preview_len: usize,
    /// `LD_PRELOAD=<this library>`; empty when propagation is off.
    pub additions: Vec<CString>,
}

impl Settings {
    fn load(reals: &RealTable) -> Self {
        unsafe { reals.prime_sink_path() };
        if hooktrace_config::logging::init_from_env() {
            log_resolver_debug!("sink originals resolved before subscriber install");
        }
        let config = HookConfig::load_or_default();
        log_layer_debug!(
            "hooktrace settings loaded",
            log = tracing::field::debug(&config.log.path),
            console = config.log.console
        );

        let additions = if config.propagation.enabled {
            config
                .propagation
                .preload_path
                .clone()
                .or_else(module_path)
                .and_then(|path| make_entry(&config.propagation.variable, &path))
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };

        Self {
            sink: TraceSink::from_config(&config.log),
            preview_len: config.log.preview_len,
            additions,
        }
    }
}

/// Path of this shared object, as the loader mapped it.
fn module_path() -> Option<String> {
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    let anchor = module_path as fn() -> Option<String> as *const c_void;
    if unsafe { libc::dladdr(anchor, &mut info) } == 0 || info.dli_fname.is_null() {
        log_propagation_debug!("dladdr could not locate the layer");
        return None;
    }
    let raw = unsafe { CStr::from_ptr(info.dli_fname) }
        .to_string_lossy()
        .into_owned();
    // A relative LD_PRELOAD would break as soon as a child changes directory.
    let path = std::fs::canonicalize(&raw)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or(raw);
    log_propagation_debug!("propagating layer", path = path.as_str());
    Some(path)
}

pub(crate) struct InterceptContext {
    pub reals: RealTable,
    pub guard: RecursionGuard,
    settings: OnceLock<Settings>,
}

pub(crate) static CONTEXT: InterceptContext = InterceptContext {
    reals: RealTable::new(),
    guard: RecursionGuard::new(),
    settings: OnceLock::new(),
};

#[inline]
pub(crate) fn context() -> &'static InterceptContext {
    &CONTEXT
}

impl InterceptContext {
    /// Run `f` with the settings, inside the guard.
    ///
    /// `None` when this thread is already inside the guard.
    pub fn with_settings<R>(&self, f: impl FnOnce(&Settings) -> R) -> Option<R> {
        let _token = self.guard.enter()?;
        Some(f(self.settings.get_or_init(|| Settings::load(&self.reals))))
    }

    /// Emit one event whose detail is built inside the guard.
    ///
    /// `detail` may return `None` to suppress the event.
    pub fn trace_with(&self, operation: &str, detail: impl FnOnce(&Settings) -> Option<String>) {
        let Some(token) = self.guard.enter() else {
            return;
        };
        let settings = self.settings.get_or_init(|| Settings::load(&self.reals));
        if let Some(detail) = detail(settings) {
            settings
                .sink
                .record(&token, &TraceEvent::stamped(operation, &detail));
        }
    }

    pub fn trace(&self, operation: &str, detail: impl FnOnce() -> String) {
        self.trace_with(operation, |_| Some(detail()))
    }

    /// Environment to hand a replacing or spawned image.
    ///
    /// `None` means "pass the caller's `envp` through unchanged": propagation
    /// is off, or this thread is already inside the guard.
    pub unsafe fn augmented_env(&self, supplied: *const *const c_char) -> Option<EnvSnapshot> {
        self.with_settings(|settings| {
            if settings.additions.is_empty() {
                return None;
            }
            Some(EnvSnapshot::merge(
                settings.additions.iter().map(CString::as_c_str),
                current_environ(),
                CStrArray::from_ptr(supplied),
            ))
        })
        .flatten()
    }
}
