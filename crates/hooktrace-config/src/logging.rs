//! Diagnostic logging for hooktrace components.
//!
//! This is the layer's own debug output, separate from the trace log. Nothing
//! is installed unless `HOOKTRACE_DEBUG` is set.
//!
//! # Usage
//!
//! ```ignore
//! use hooktrace_config::log_layer_debug;
//!
//! log_layer_debug!("Resolved original symbol", symbol = "execve");
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const LAYER: &'static str = "LAYER";
    pub const SINK: &'static str = "SINK";
    pub const RESOLVER: &'static str = "RESOLVER";
    pub const PROPAGATION: &'static str = "PROPAGATION";
}

// === LAYER logging macros ===

#[macro_export]
macro_rules! log_layer_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "LAYER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_layer_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "LAYER", $($key = $value,)* $msg)
    };
}

// === SINK logging macros ===

#[macro_export]
macro_rules! log_sink_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "SINK", $($key = $value,)* $msg)
    };
}

// === RESOLVER logging macros ===

#[macro_export]
macro_rules! log_resolver_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "RESOLVER", $($key = $value,)* $msg)
    };
}

// === PROPAGATION logging macros ===

#[macro_export]
macro_rules! log_propagation_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "PROPAGATION", $($key = $value,)* $msg)
    };
}

/// Translate a `HOOKTRACE_DEBUG` value into a filter directive.
///
/// `1`, `true` and an empty value mean `debug`; anything else is taken as an
/// `EnvFilter` directive verbatim.
pub fn filter_directive(value: &str) -> &str {
    match value.trim() {
        "" | "1" | "true" | "on" => "debug",
        other => other,
    }
}

/// Install a stderr subscriber if `HOOKTRACE_DEBUG` is set.
///
/// Returns `true` when a subscriber was installed by this call. A host program
/// that already set a global subscriber keeps it.
pub fn init_from_env() -> bool {
    use tracing_subscriber::EnvFilter;

    let value = match std::env::var(crate::ENV_DEBUG) {
        Ok(v) => v,
        Err(_) => return false,
    };

    let env_filter = EnvFilter::try_new(filter_directive(&value))
        .unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
