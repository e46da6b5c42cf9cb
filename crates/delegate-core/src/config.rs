//! Configuration resolution for delegate.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/delegate/settings.json)
//! 3. Project config (.delegate/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)
//!
//! Values are carried raw; range normalization happens when a
//! [`SubagentManager`](crate::subagent::SubagentManager) is built from them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::subagent::manager::{normalize_max_subagents, normalize_timeout_secs};
use crate::subagent::{DEFAULT_MAX_SUBAGENTS, DEFAULT_TIMEOUT_SECS};

/// Complete delegate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub subagents: SubagentSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Subagent supervision limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubagentSettings {
    /// Maximum number of tracked subagents (clamped to `1..=20`).
    pub max_subagents: i64,
    /// Per-subagent wall clock budget in seconds (clamped to `1..=3600`).
    pub subagent_timeout: i64,
}

impl Default for SubagentSettings {
    #[allow(clippy::cast_possible_wrap)]
    fn default() -> Self {
        Self {
            max_subagents: DEFAULT_MAX_SUBAGENTS as i64,
            subagent_timeout: DEFAULT_TIMEOUT_SECS as i64,
        }
    }
}

impl SubagentSettings {
    /// Copy with out-of-range values replaced by their clamped equivalents.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            max_subagents: i64::try_from(normalize_max_subagents(self.max_subagents))
                .unwrap_or(self.max_subagents),
            subagent_timeout: i64::try_from(normalize_timeout_secs(self.subagent_timeout))
                .unwrap_or(self.subagent_timeout),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_level: String,
    pub log_json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// On-disk settings file. Every key is optional so that a project file only
/// overrides what it names.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    max_subagents: Option<i64>,
    subagent_timeout: Option<i64>,
    log_level: Option<String>,
    log_json: Option<bool>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    load_config_from(
        global_config_path().as_deref(),
        project_dir,
        |key| std::env::var(key).ok(),
    )
}

/// Load configuration from explicit sources.
///
/// `env` is consulted for `DELEGATE_*` overrides; [`load_config`] passes the
/// process environment.
pub fn load_config_from(
    global_path: Option<&Path>,
    project_dir: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            let global = load_config_file(global_path)?;
            merge_config(&mut config, global);
        }
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".delegate").join("settings.json");
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    apply_env_overrides(&mut config, env);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/delegate/settings.json"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("delegate").join("settings.json"))
    }
}

fn load_config_file(path: &Path) -> Result<SettingsFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: SettingsFile) {
    if let Some(n) = overlay.max_subagents {
        base.subagents.max_subagents = n;
    }
    if let Some(n) = overlay.subagent_timeout {
        base.subagents.subagent_timeout = n;
    }
    if let Some(level) = overlay.log_level {
        base.logging.log_level = level;
    }
    if let Some(json) = overlay.log_json {
        base.logging.log_json = json;
    }
}

fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    if let Some(val) = env("DELEGATE_MAX_SUBAGENTS") {
        if let Ok(n) = val.trim().parse() {
            config.subagents.max_subagents = n;
        }
    }
    if let Some(val) = env("DELEGATE_SUBAGENT_TIMEOUT") {
        if let Ok(n) = val.trim().parse() {
            config.subagents.subagent_timeout = n;
        }
    }
    if let Some(val) = env("DELEGATE_LOG_LEVEL") {
        config.logging.log_level = val;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_matches_subagent_defaults() {
        let config = Config::default();
        assert_eq!(config.subagents.max_subagents, 5);
        assert_eq!(config.subagents.subagent_timeout, 300);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            load_config_from(Some(&dir.path().join("nope.json")), Some(dir.path()), no_env)
                .unwrap();
        assert_eq!(config.subagents, SubagentSettings::default());
    }

    #[test]
    fn project_overrides_global_key_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.json");
        std::fs::write(&global, r#"{"max_subagents": 8, "subagent_timeout": 60}"#).unwrap();

        let project = dir.path().join("proj");
        std::fs::create_dir_all(project.join(".delegate")).unwrap();
        std::fs::write(
            project.join(".delegate").join("settings.json"),
            r#"{"subagent_timeout": 120}"#,
        )
        .unwrap();

        let config = load_config_from(Some(&global), Some(&project), no_env).unwrap();
        assert_eq!(config.subagents.max_subagents, 8);
        assert_eq!(config.subagents.subagent_timeout, 120);
    }

    #[test]
    fn env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.json");
        std::fs::write(&global, r#"{"max_subagents": 8}"#).unwrap();

        let config = load_config_from(Some(&global), None, |key| match key {
            "DELEGATE_MAX_SUBAGENTS" => Some("3".to_string()),
            "DELEGATE_SUBAGENT_TIMEOUT" => Some("not-a-number".to_string()),
            "DELEGATE_LOG_LEVEL" => Some("debug".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.subagents.max_subagents, 3);
        assert_eq!(config.subagents.subagent_timeout, 300);
        assert_eq!(config.logging.log_level, "debug");
    }

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let settings = SubagentSettings {
            max_subagents: 0,
            subagent_timeout: 99_999,
        }
        .normalized();
        assert_eq!(settings.max_subagents, 5);
        assert_eq!(settings.subagent_timeout, 3600);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.json");
        std::fs::write(&global, "{ not json").unwrap();

        let err = load_config_from(Some(&global), None, no_env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
