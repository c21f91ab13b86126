//! Configuration file discovery and loading.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::{ConfigError, ContextRetrievalConfig, RawContextRetrievalConfig};
use crate::utils::Settings;

/// File name looked up at every tier.
pub const CONFIG_FILE_NAME: &str = "context.yaml";

/// Environment variable naming the context directory.
pub const CONTEXT_DIR_ENV: &str = "REVIEW_CONTEXT_DIR";

/// Overrides `enabled`.
pub const ENABLED_ENV: &str = "REVIEW_CONTEXT_ENABLED";

/// Overrides `strategyTimeoutSeconds`.
pub const STRATEGY_TIMEOUT_ENV: &str = "REVIEW_CONTEXT_STRATEGY_TIMEOUT_SECONDS";

/// Overrides `rollout.percentage`.
pub const ROLLOUT_PERCENTAGE_ENV: &str = "REVIEW_CONTEXT_ROLLOUT_PERCENTAGE";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Passed with `--config`.
    Explicit(PathBuf),
    /// Found in `{dir}/local/context.yaml`.
    LocalOverride(PathBuf),
    /// Found in `{dir}/context.yaml`.
    Project(PathBuf),
    /// Found in `$XDG_CONFIG_HOME/review-context/context.yaml`.
    Xdg(PathBuf),
    /// Found in `$HOME/.review-context/context.yaml`.
    Global(PathBuf),
    /// No file found; built-in defaults.
    Defaults,
}

impl ConfigSource {
    /// The file backing this source, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(p)
            | Self::LocalOverride(p)
            | Self::Project(p)
            | Self::Xdg(p)
            | Self::Global(p) => Some(p),
            Self::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(p) => write!(f, "Explicit: {}", p.display()),
            Self::LocalOverride(p) => write!(f, "Local override: {}", p.display()),
            Self::Project(p) => write!(f, "Project: {}", p.display()),
            Self::Xdg(p) => write!(f, "Global (XDG): {}", p.display()),
            Self::Global(p) => write!(f, "Global: {}", p.display()),
            Self::Defaults => write!(f, "(built-in defaults)"),
        }
    }
}

/// Returns `$XDG_CONFIG_HOME/review-context`, defaulting to `$HOME/.config/review-context`.
fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_home.is_empty() {
            return Some(PathBuf::from(xdg_home).join("review-context"));
        }
    }
    dirs::home_dir().map(|home| home.join(".config").join("review-context"))
}

/// Finds the configuration file for a context directory.
///
/// Priority:
/// 1. `{dir}/local/context.yaml`
/// 2. `{dir}/context.yaml`
/// 3. `$XDG_CONFIG_HOME/review-context/context.yaml`
/// 4. `$HOME/.review-context/context.yaml`
pub fn resolve_config_file(dir: &Path) -> ConfigSource {
    let local_path = dir.join("local").join(CONFIG_FILE_NAME);
    if local_path.exists() {
        return ConfigSource::LocalOverride(local_path);
    }

    let project_path = dir.join(CONFIG_FILE_NAME);
    if project_path.exists() {
        return ConfigSource::Project(project_path);
    }

    if let Some(xdg_dir) = xdg_config_dir() {
        let xdg_path = xdg_dir.join(CONFIG_FILE_NAME);
        if xdg_path.exists() {
            return ConfigSource::Xdg(xdg_path);
        }
    }

    if let Some(home_dir) = dirs::home_dir() {
        let home_path = home_dir.join(".review-context").join(CONFIG_FILE_NAME);
        if home_path.exists() {
            return ConfigSource::Global(home_path);
        }
    }

    ConfigSource::Defaults
}

/// Resolves the context directory.
///
/// Priority: `override_dir` (`--context-dir`), then `REVIEW_CONTEXT_DIR`,
/// then `.review-context`.
pub fn resolve_context_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }

    if let Ok(env_dir) = std::env::var(CONTEXT_DIR_ENV) {
        if !env_dir.is_empty() {
            return PathBuf::from(env_dir);
        }
    }

    PathBuf::from(".review-context")
}

/// Loads the effective configuration.
///
/// An explicit path must exist. Otherwise the discovery chain of
/// [`resolve_config_file`] is used and defaults apply when nothing is found.
/// Environment overrides (with `settings.json` fallback) are applied before
/// validation.
pub fn load_config(
    explicit: Option<&Path>,
    context_dir: &Path,
) -> Result<(ContextRetrievalConfig, ConfigSource)> {
    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable settings: {e:#}");
        Settings::default()
    });
    load_config_with(explicit, context_dir, |key| settings.get_env_var(key))
}

/// [`load_config`] with an injectable variable lookup.
pub fn load_config_with(
    explicit: Option<&Path>,
    context_dir: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(ContextRetrievalConfig, ConfigSource)> {
    let source = match explicit {
        Some(path) => ConfigSource::Explicit(path.to_path_buf()),
        None => resolve_config_file(context_dir),
    };

    let mut raw = match source.path() {
        Some(path) => read_raw_config(path)?,
        None => RawContextRetrievalConfig::default(),
    };
    apply_env_overrides(&mut raw, lookup)?;

    let config = ContextRetrievalConfig::try_from(raw)
        .with_context(|| format!("Invalid context retrieval configuration ({source})"))?;
    debug!(%source, "Loaded context retrieval configuration");
    Ok((config, source))
}

fn read_raw_config(path: &Path) -> Result<RawContextRetrievalConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(RawContextRetrievalConfig::default());
    }
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn apply_env_overrides(
    raw: &mut RawContextRetrievalConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(ENABLED_ENV) {
        raw.enabled = parse_bool(ENABLED_ENV, &value)?;
    }
    if let Some(value) = lookup(STRATEGY_TIMEOUT_ENV) {
        raw.strategy_timeout_seconds = parse_int(STRATEGY_TIMEOUT_ENV, &value)?;
    }
    if let Some(value) = lookup(ROLLOUT_PERCENTAGE_ENV) {
        raw.rollout.percentage = parse_int(ROLLOUT_PERCENTAGE_ENV, &value)?;
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid_override(key, value)),
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_override(key, value))
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use tempfile::TempDir;

    static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn local_override_wins() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let base = dir.path();
        fs::create_dir_all(base.join("local"))?;
        fs::write(base.join("local").join(CONFIG_FILE_NAME), "enabled: false")?;
        fs::write(base.join(CONFIG_FILE_NAME), "enabled: true")?;

        assert_eq!(
            resolve_config_file(base),
            ConfigSource::LocalOverride(base.join("local").join(CONFIG_FILE_NAME))
        );
        Ok(())
    }

    #[test]
    fn project_file_is_used_without_local() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join(CONFIG_FILE_NAME), "strategyTimeoutSeconds: 9")?;

        let (config, source) = load_config_with(None, dir.path(), no_env)?;
        assert_eq!(source, ConfigSource::Project(dir.path().join(CONFIG_FILE_NAME)));
        assert_eq!(config.strategy_timeout(), Duration::from_secs(9));
        Ok(())
    }

    #[test]
    fn xdg_config_is_found() -> anyhow::Result<()> {
        let _lock = ENV_MUTEX.lock().unwrap();

        let xdg_dir = TempDir::new()?;
        let xdg_app = xdg_dir.path().join("review-context");
        fs::create_dir_all(&xdg_app)?;
        fs::write(xdg_app.join(CONFIG_FILE_NAME), "enabled: false")?;

        std::env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        let project_dir = TempDir::new()?;
        let resolved = resolve_config_file(project_dir.path());
        std::env::remove_var("XDG_CONFIG_HOME");

        assert_eq!(resolved, ConfigSource::Xdg(xdg_app.join(CONFIG_FILE_NAME)));
        Ok(())
    }

    #[test]
    fn context_dir_priority() {
        let _lock = ENV_MUTEX.lock().unwrap();

        std::env::set_var(CONTEXT_DIR_ENV, "/from/env");
        assert_eq!(
            resolve_context_dir(Some(Path::new("/from/flag"))),
            PathBuf::from("/from/flag")
        );
        assert_eq!(resolve_context_dir(None), PathBuf::from("/from/env"));

        std::env::set_var(CONTEXT_DIR_ENV, "");
        assert_eq!(resolve_context_dir(None), PathBuf::from(".review-context"));
        std::env::remove_var(CONTEXT_DIR_ENV);
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = load_config_with(Some(&missing), dir.path(), no_env).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }

    #[test]
    fn empty_file_yields_defaults() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("empty.yaml");
        fs::write(&path, "\n")?;

        let (config, source) = load_config_with(Some(&path), dir.path(), no_env)?;
        assert_eq!(config, ContextRetrievalConfig::default());
        assert_eq!(source, ConfigSource::Explicit(path));
        Ok(())
    }

    #[test]
    fn env_overrides_apply_before_validation() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("context.yaml");
        fs::write(&path, "enabled: true\nrollout:\n  percentage: 100\n")?;

        let lookup = env_from(&[
            (ENABLED_ENV, "false"),
            (STRATEGY_TIMEOUT_ENV, "12"),
            (ROLLOUT_PERCENTAGE_ENV, "40"),
        ]);
        let (config, _) = load_config_with(Some(&path), dir.path(), lookup)?;
        assert!(!config.enabled());
        assert_eq!(config.strategy_timeout(), Duration::from_secs(12));
        assert_eq!(config.rollout().percentage(), 40);

        let lookup = env_from(&[(STRATEGY_TIMEOUT_ENV, "0")]);
        let err = load_config_with(Some(&path), dir.path(), lookup).unwrap_err();
        assert!(format!("{err:#}").contains("strategyTimeoutSeconds must be greater than 0"));
        Ok(())
    }

    #[test]
    fn unparsable_override_is_reported() {
        let dir = TempDir::new().unwrap();
        let lookup = env_from(&[(ENABLED_ENV, "maybe")]);
        let err = load_config_with(None, dir.path(), lookup).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidEnvOverride { key, .. }) if key == ENABLED_ENV
        ));
    }

    #[test]
    fn invalid_file_reports_source() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("context.yaml");
        fs::write(&path, "rollout:\n  percentage: 250\n")?;

        let err = load_config_with(Some(&path), dir.path(), no_env).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Invalid context retrieval configuration"));
        assert!(message.contains("rollout.percentage must be between 0 and 100, got 250"));
        Ok(())
    }
}
