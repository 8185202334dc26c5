//! # hooktrace-config
//!
//! Configuration management for the hooktrace preload layer.
//!
//! Loads configuration from:
//! 1. `$HOOKTRACE_CONFIG` if set, otherwise `~/.hooktrace/config.toml` (global)
//! 2. Environment variables (highest priority)
//!
//! The layer loads this lazily, from inside its recursion guard, the first
//! time it needs to write a trace event.

pub mod logging;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG: &str = "HOOKTRACE_CONFIG";
/// Overrides `log.path`.
pub const ENV_LOG: &str = "HOOKTRACE_LOG";
/// Overrides `log.console`.
pub const ENV_CONSOLE: &str = "HOOKTRACE_CONSOLE";
/// Overrides `log.preview_len`.
pub const ENV_PREVIEW_LEN: &str = "HOOKTRACE_PREVIEW_LEN";
/// Overrides `propagation.enabled`.
pub const ENV_PROPAGATE: &str = "HOOKTRACE_PROPAGATE";
/// Overrides `propagation.preload_path`.
pub const ENV_PRELOAD: &str = "HOOKTRACE_PRELOAD";
/// Enables diagnostic logging; the value is an `EnvFilter` directive.
pub const ENV_DEBUG: &str = "HOOKTRACE_DEBUG";

/// Default trace log file, relative to the traced process's working directory.
pub const DEFAULT_LOG_PATH: &str = "syscall_hook.log";
/// Default loader injection variable.
pub const DEFAULT_PRELOAD_VARIABLE: &str = "LD_PRELOAD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub log: LogConfig,
    pub propagation: PropagationConfig,
}

impl HookConfig {
    /// Load config from standard locations.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                debug!("Loading hooktrace config from {:?}", path);
                Self::from_file(&path)?
            }
            _ => HookConfig::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config, falling back to defaults (plus env overrides) on any error.
    ///
    /// The preload layer must never fail because of configuration.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                crate::log_layer_warn!(
                    "hooktrace config unusable, using defaults",
                    error = tracing::field::display(&e)
                );
                let mut config = HookConfig::default();
                // Malformed overrides are skipped one by one.
                config.apply_env_overrides_lenient(|key| std::env::var(key).ok());
                config
            }
        }
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// `$HOOKTRACE_CONFIG`, else `~/.hooktrace/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        match std::env::var_os(ENV_CONFIG) {
            Some(p) if !p.is_empty() => Some(PathBuf::from(p)),
            _ => Self::global_config_path(),
        }
    }

    /// Global config path: ~/.hooktrace/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".hooktrace/config.toml"))
    }

    /// Apply environment variable overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_LOG).filter(|p| !p.is_empty()) {
            self.log.path = PathBuf::from(path);
        }
        if let Some(v) = lookup(ENV_CONSOLE) {
            self.log.console = parse_switch(ENV_CONSOLE, &v)?;
        }
        if let Some(v) = lookup(ENV_PREVIEW_LEN) {
            self.log.preview_len = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PREVIEW_LEN,
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup(ENV_PROPAGATE) {
            self.propagation.enabled = parse_switch(ENV_PROPAGATE, &v)?;
        }
        if let Some(path) = lookup(ENV_PRELOAD).filter(|p| !p.is_empty()) {
            self.propagation.preload_path = Some(path);
        }
        Ok(())
    }

    fn apply_env_overrides_lenient<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in [ENV_LOG, ENV_CONSOLE, ENV_PREVIEW_LEN, ENV_PROPAGATE, ENV_PRELOAD] {
            let single = |k: &str| if k == key { lookup(k) } else { None };
            if let Err(e) = self.apply_env_overrides(single) {
                debug!("ignoring override: {}", e);
            }
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&HookConfig::default()).unwrap_or_default()
    }
}

/// Trace log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Trace log file, opened in append mode for every event
    pub path: PathBuf,
    /// Mirror every event to stdout as `HOOK <op>: <detail>`
    pub console: bool,
    /// Maximum number of written bytes shown in a `write` event
    pub preview_len: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_PATH),
            console: true,
            preview_len: 100,
        }
    }
}

/// Re-injection of the layer into replaced and spawned images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub enabled: bool,
    /// Loader variable carrying the layer path
    pub variable: String,
    /// Explicit layer path; discovered at runtime when unset
    pub preload_path: Option<String>,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            variable: DEFAULT_PRELOAD_VARIABLE.to_string(),
            preload_path: None,
        }
    }
}

fn parse_switch(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = HookConfig::default();
        assert_eq!(config.log.path, PathBuf::from("syscall_hook.log"));
        assert!(config.log.console);
        assert_eq!(config.log.preview_len, 100);
        assert!(config.propagation.enabled);
        assert_eq!(config.propagation.variable, "LD_PRELOAD");
        assert!(config.propagation.preload_path.is_none());
    }

    #[test]
    fn test_default_toml_roundtrips() {
        let toml_str = HookConfig::default_toml();
        assert!(toml_str.contains("[log]"));
        let parsed: HookConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, HookConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = HookConfig::default();
        config
            .apply_env_overrides(lookup_from(&[
                (ENV_LOG, "/tmp/trace.log"),
                (ENV_CONSOLE, "off"),
                (ENV_PREVIEW_LEN, "16"),
                (ENV_PRELOAD, "/opt/libhooktrace.so"),
            ]))
            .unwrap();
        assert_eq!(config.log.path, PathBuf::from("/tmp/trace.log"));
        assert!(!config.log.console);
        assert_eq!(config.log.preview_len, 16);
        assert_eq!(
            config.propagation.preload_path.as_deref(),
            Some("/opt/libhooktrace.so")
        );
    }

    #[test]
    fn test_empty_log_override_is_ignored() {
        let mut config = HookConfig::default();
        config
            .apply_env_overrides(lookup_from(&[(ENV_LOG, "")]))
            .unwrap();
        assert_eq!(config.log.path, PathBuf::from(DEFAULT_LOG_PATH));
    }

    #[test]
    fn test_invalid_switch_is_rejected() {
        let mut config = HookConfig::default();
        let err = config
            .apply_env_overrides(lookup_from(&[(ENV_CONSOLE, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == ENV_CONSOLE));
    }

    #[test]
    fn test_lenient_overrides_skip_only_bad_values() {
        let mut config = HookConfig::default();
        config.apply_env_overrides_lenient(lookup_from(&[
            (ENV_PREVIEW_LEN, "lots"),
            (ENV_LOG, "/tmp/x.log"),
        ]));
        assert_eq!(config.log.preview_len, 100);
        assert_eq!(config.log.path, PathBuf::from("/tmp/x.log"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: HookConfig = toml::from_str("[log]\nconsole = false\n").unwrap();
        assert!(!config.log.console);
        assert_eq!(config.log.path, PathBuf::from(DEFAULT_LOG_PATH));
        assert!(config.propagation.enabled);
    }
}
