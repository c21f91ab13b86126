//! Context retrieval policy.
//!
//! [`ContextRetrievalConfig`] is validated once, when it is built or
//! deserialized, and is immutable afterwards. YAML uses camelCase keys.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod discovery;

pub use discovery::{load_config, resolve_config_file, resolve_context_dir, ConfigSource};

/// Default per-strategy timeout in seconds.
pub const DEFAULT_STRATEGY_TIMEOUT_SECONDS: u64 = 30;

/// Default changed-line limit above which retrieval is skipped.
pub const DEFAULT_MAX_DIFF_LINES: usize = 2000;

/// Default number of commits examined per changed file.
pub const DEFAULT_MAX_COMMITS_PER_FILE: usize = 50;

/// Errors raised while building or loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The strategy timeout is not positive.
    #[error("strategyTimeoutSeconds must be greater than 0, got {0}")]
    InvalidStrategyTimeout(i64),

    /// The rollout percentage is outside `0..=100`.
    #[error("rollout.percentage must be between 0 and 100, got {0}")]
    InvalidRolloutPercentage(i64),

    /// The large-diff threshold is not positive.
    #[error("rollout.maxDiffLines must be greater than 0, got {0}")]
    InvalidMaxDiffLines(i64),

    /// The per-file commit window is not positive.
    #[error("history.maxCommitsPerFile must be greater than 0, got {0}")]
    InvalidHistoryWindow(i64),

    /// The lookback period is not positive.
    #[error("history.lookbackDays must be greater than 0, got {0}")]
    InvalidLookbackDays(i64),

    /// The co-change threshold is below 1.
    #[error("history.minCoChangeCount must be at least 1, got {0}")]
    InvalidMinCoChangeCount(i64),

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidEnvOverride {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

/// Validated, immutable context retrieval policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawContextRetrievalConfig", into = "RawContextRetrievalConfig")]
pub struct ContextRetrievalConfig {
    enabled: bool,
    strategy_timeout_seconds: u64,
    enabled_strategies: BTreeSet<String>,
    rollout: RolloutPolicy,
    history: HistorySettings,
    metadata: MetadataSettings,
}

impl ContextRetrievalConfig {
    /// Starts a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> ContextRetrievalConfigBuilder {
        ContextRetrievalConfigBuilder::default()
    }

    /// Whether retrieval runs at all.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Time budget for each strategy task.
    #[must_use]
    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_secs(self.strategy_timeout_seconds)
    }

    /// Names of the strategies allowed to run.
    #[must_use]
    pub fn enabled_strategies(&self) -> &BTreeSet<String> {
        &self.enabled_strategies
    }

    /// Returns true if the strategy called `name` is enabled.
    #[must_use]
    pub fn is_strategy_enabled(&self, name: &str) -> bool {
        self.enabled_strategies.contains(name)
    }

    /// Admission sub-policy.
    #[must_use]
    pub fn rollout(&self) -> &RolloutPolicy {
        &self.rollout
    }

    /// History strategy settings.
    #[must_use]
    pub fn history(&self) -> &HistorySettings {
        &self.history
    }

    /// Metadata strategy settings.
    #[must_use]
    pub fn metadata(&self) -> &MetadataSettings {
        &self.metadata
    }
}

impl Default for ContextRetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy_timeout_seconds: DEFAULT_STRATEGY_TIMEOUT_SECONDS,
            enabled_strategies: default_strategy_names().into_iter().collect(),
            rollout: RolloutPolicy::default(),
            history: HistorySettings::default(),
            metadata: MetadataSettings::default(),
        }
    }
}

fn default_strategy_names() -> Vec<String> {
    vec!["history".to_string(), "metadata".to_string()]
}

/// Admission control: rollout percentage and large-diff skipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutPolicy {
    percentage: u32,
    skip_large_diffs: bool,
    max_diff_lines: usize,
}

impl RolloutPolicy {
    /// Creates a validated rollout policy.
    pub fn new(
        percentage: u32,
        skip_large_diffs: bool,
        max_diff_lines: usize,
    ) -> Result<Self, ConfigError> {
        if percentage > 100 {
            return Err(ConfigError::InvalidRolloutPercentage(i64::from(percentage)));
        }
        if max_diff_lines == 0 {
            return Err(ConfigError::InvalidMaxDiffLines(0));
        }
        Ok(Self {
            percentage,
            skip_large_diffs,
            max_diff_lines,
        })
    }

    /// Share of repositories admitted, `0..=100`.
    #[must_use]
    pub fn percentage(&self) -> u32 {
        self.percentage
    }

    /// Whether diffs above [`max_diff_lines`](Self::max_diff_lines) are skipped.
    #[must_use]
    pub fn skip_large_diffs(&self) -> bool {
        self.skip_large_diffs
    }

    /// Changed-line threshold for large diffs.
    #[must_use]
    pub fn max_diff_lines(&self) -> usize {
        self.max_diff_lines
    }

    /// Returns true if `repository` falls inside the rollout.
    #[must_use]
    pub fn admits(&self, repository: &str) -> bool {
        u32::from(crate::retrieval::rollout_bucket(repository)) < self.percentage
    }
}

impl Default for RolloutPolicy {
    fn default() -> Self {
        Self {
            percentage: 100,
            skip_large_diffs: true,
            max_diff_lines: DEFAULT_MAX_DIFF_LINES,
        }
    }
}

/// Commit window and filtering for the history strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySettings {
    max_commits_per_file: usize,
    lookback_days: Option<u32>,
    min_co_change_count: usize,
}

impl HistorySettings {
    /// Creates validated history settings.
    pub fn new(
        max_commits_per_file: usize,
        lookback_days: Option<u32>,
        min_co_change_count: usize,
    ) -> Result<Self, ConfigError> {
        if max_commits_per_file == 0 {
            return Err(ConfigError::InvalidHistoryWindow(0));
        }
        if lookback_days == Some(0) {
            return Err(ConfigError::InvalidLookbackDays(0));
        }
        if min_co_change_count == 0 {
            return Err(ConfigError::InvalidMinCoChangeCount(0));
        }
        Ok(Self {
            max_commits_per_file,
            lookback_days,
            min_co_change_count,
        })
    }

    /// Most commits fetched per changed file.
    #[must_use]
    pub fn max_commits_per_file(&self) -> usize {
        self.max_commits_per_file
    }

    /// How far back history is considered, if bounded.
    #[must_use]
    pub fn lookback_days(&self) -> Option<u32> {
        self.lookback_days
    }

    /// Fewest co-changes for a file to be reported.
    #[must_use]
    pub fn min_co_change_count(&self) -> usize {
        self.min_co_change_count
    }

    /// Oldest commit time considered, computed from now.
    #[must_use]
    pub fn since(&self) -> Option<DateTime<FixedOffset>> {
        self.lookback_days
            .map(|days| (Utc::now() - chrono::Duration::days(i64::from(days))).fixed_offset())
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_commits_per_file: DEFAULT_MAX_COMMITS_PER_FILE,
            lookback_days: None,
            min_co_change_count: 1,
        }
    }
}

/// Settings for the metadata strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataSettings {
    /// Checkout used to confirm candidate files exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
}

/// Builder for [`ContextRetrievalConfig`].
///
/// Validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ContextRetrievalConfigBuilder {
    raw: RawContextRetrievalConfig,
}

impl ContextRetrievalConfigBuilder {
    /// Enables or disables retrieval.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.raw.enabled = enabled;
        self
    }

    /// Sets the per-strategy timeout.
    #[must_use]
    pub fn strategy_timeout_seconds(mut self, seconds: i64) -> Self {
        self.raw.strategy_timeout_seconds = seconds;
        self
    }

    /// Replaces the set of enabled strategy names.
    #[must_use]
    pub fn enabled_strategies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw.enabled_strategies = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the rollout policy.
    #[must_use]
    pub fn rollout(mut self, rollout: RolloutPolicy) -> Self {
        self.raw.rollout = rollout.into();
        self
    }

    /// Sets the history settings.
    #[must_use]
    pub fn history(mut self, history: HistorySettings) -> Self {
        self.raw.history = history.into();
        self
    }

    /// Sets the metadata settings.
    #[must_use]
    pub fn metadata(mut self, metadata: MetadataSettings) -> Self {
        self.raw.metadata = metadata;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<ContextRetrievalConfig, ConfigError> {
        ContextRetrievalConfig::try_from(self.raw)
    }
}

/// Unvalidated configuration as written in YAML.
///
/// Integer fields are signed so negative input reaches validation instead
/// of failing as a type error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RawContextRetrievalConfig {
    pub(crate) enabled: bool,
    pub(crate) strategy_timeout_seconds: i64,
    pub(crate) enabled_strategies: Vec<String>,
    pub(crate) rollout: RawRolloutPolicy,
    pub(crate) history: RawHistorySettings,
    pub(crate) metadata: MetadataSettings,
}

impl Default for RawContextRetrievalConfig {
    fn default() -> Self {
        ContextRetrievalConfig::default().into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RawRolloutPolicy {
    pub(crate) percentage: i64,
    pub(crate) skip_large_diffs: bool,
    pub(crate) max_diff_lines: i64,
}

impl Default for RawRolloutPolicy {
    fn default() -> Self {
        RolloutPolicy::default().into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RawHistorySettings {
    pub(crate) max_commits_per_file: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) lookback_days: Option<i64>,
    pub(crate) min_co_change_count: i64,
}

impl Default for RawHistorySettings {
    fn default() -> Self {
        HistorySettings::default().into()
    }
}

fn saturating_i64(value: impl TryInto<i64>) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

impl From<ContextRetrievalConfig> for RawContextRetrievalConfig {
    fn from(config: ContextRetrievalConfig) -> Self {
        Self {
            enabled: config.enabled,
            strategy_timeout_seconds: saturating_i64(config.strategy_timeout_seconds),
            enabled_strategies: config.enabled_strategies.into_iter().collect(),
            rollout: config.rollout.into(),
            history: config.history.into(),
            metadata: config.metadata,
        }
    }
}

impl From<RolloutPolicy> for RawRolloutPolicy {
    fn from(policy: RolloutPolicy) -> Self {
        Self {
            percentage: i64::from(policy.percentage),
            skip_large_diffs: policy.skip_large_diffs,
            max_diff_lines: saturating_i64(policy.max_diff_lines),
        }
    }
}

impl From<HistorySettings> for RawHistorySettings {
    fn from(settings: HistorySettings) -> Self {
        Self {
            max_commits_per_file: saturating_i64(settings.max_commits_per_file),
            lookback_days: settings.lookback_days.map(i64::from),
            min_co_change_count: saturating_i64(settings.min_co_change_count),
        }
    }
}

impl TryFrom<RawContextRetrievalConfig> for ContextRetrievalConfig {
    type Error = ConfigError;

    fn try_from(raw: RawContextRetrievalConfig) -> Result<Self, Self::Error> {
        let strategy_timeout_seconds = u64::try_from(raw.strategy_timeout_seconds)
            .ok()
            .filter(|s| *s > 0)
            .ok_or(ConfigError::InvalidStrategyTimeout(raw.strategy_timeout_seconds))?;

        Ok(Self {
            enabled: raw.enabled,
            strategy_timeout_seconds,
            enabled_strategies: raw
                .enabled_strategies
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            rollout: RolloutPolicy::try_from(raw.rollout)?,
            history: HistorySettings::try_from(raw.history)?,
            metadata: raw.metadata,
        })
    }
}

impl TryFrom<RawRolloutPolicy> for RolloutPolicy {
    type Error = ConfigError;

    fn try_from(raw: RawRolloutPolicy) -> Result<Self, Self::Error> {
        let percentage = u32::try_from(raw.percentage)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or(ConfigError::InvalidRolloutPercentage(raw.percentage))?;
        let max_diff_lines = positive(raw.max_diff_lines)
            .ok_or(ConfigError::InvalidMaxDiffLines(raw.max_diff_lines))?;
        Self::new(percentage, raw.skip_large_diffs, max_diff_lines)
    }
}

impl TryFrom<RawHistorySettings> for HistorySettings {
    type Error = ConfigError;

    fn try_from(raw: RawHistorySettings) -> Result<Self, Self::Error> {
        let max_commits = positive(raw.max_commits_per_file)
            .ok_or(ConfigError::InvalidHistoryWindow(raw.max_commits_per_file))?;
        let lookback_days = match raw.lookback_days {
            None => None,
            Some(days) => Some(
                u32::try_from(days)
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or(ConfigError::InvalidLookbackDays(days))?,
            ),
        };
        let min_count = positive(raw.min_co_change_count)
            .ok_or(ConfigError::InvalidMinCoChangeCount(raw.min_co_change_count))?;
        Self::new(max_commits, lookback_days, min_count)
    }
}

fn positive(value: i64) -> Option<usize> {
    usize::try_from(value).ok().filter(|v| *v > 0)
}
