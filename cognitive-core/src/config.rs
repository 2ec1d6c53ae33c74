// config.rs - Layered settings for the observability layer

use cognitive_common::error::ConfigurationError;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::alerting::{AlertRule, AlertSeverity, Comparator, MetricKind, DEFAULT_MAX_HISTORY};
use crate::metrics::{Tags, DEFAULT_HISTOGRAM_CAPACITY};
use crate::recording::{RecorderLimits, DEFAULT_MAX_EVENTS_PER_RECORDING, DEFAULT_MAX_RECORDINGS};

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Samples retained per histogram
    #[serde(default = "default_histogram_capacity")]
    pub histogram_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            histogram_capacity: default_histogram_capacity(),
        }
    }
}

fn default_histogram_capacity() -> usize {
    DEFAULT_HISTOGRAM_CAPACITY
}

/// Alert rule as written in a configuration file.
///
/// Keys are snake_case so they survive the config crate's key handling.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuleConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub metric: String,
    pub metric_type: MetricKind,
    pub operator: Comparator,
    pub threshold: f64,
    #[serde(default)]
    pub percentile: Option<f64>,
    #[serde(default = "default_rule_severity")]
    pub severity: AlertSeverity,
    #[serde(default = "default_rule_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Option<Tags>,
}

fn default_rule_severity() -> AlertSeverity {
    AlertSeverity::Warning
}
fn default_rule_cooldown_ms() -> u64 {
    crate::alerting::DEFAULT_COOLDOWN_MS
}
fn default_true() -> bool {
    true
}

impl From<RuleConfig> for AlertRule {
    fn from(c: RuleConfig) -> Self {
        let mut rule = AlertRule::new(c.id, c.name, c.metric, c.metric_type, c.operator, c.threshold)
            .with_description(c.description)
            .with_severity(c.severity)
            .with_cooldown(Duration::from_millis(c.cooldown_ms));
        rule.percentile = c.percentile;
        rule.enabled = c.enabled;
        rule.tags = c.tags;
        rule
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AlertingConfig {
    /// Run the periodic evaluation task
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Evaluation interval in seconds
    #[serde(default = "default_alert_interval_secs")]
    pub interval_secs: u64,
    /// Alerts kept in history
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Seed the baseline rule set at startup
    #[serde(default = "default_true")]
    pub load_default_rules: bool,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_alert_interval_secs(),
            max_history: default_max_history(),
            load_default_rules: true,
            rules: Vec::new(),
        }
    }
}

impl AlertingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_alert_interval_secs() -> u64 {
    10
}
fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RecordingConfig {
    #[serde(default = "default_max_recordings")]
    pub max_recordings: usize,
    #[serde(default = "default_max_events_per_recording")]
    pub max_events_per_recording: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_recordings: default_max_recordings(),
            max_events_per_recording: default_max_events_per_recording(),
        }
    }
}

impl RecordingConfig {
    pub fn limits(&self) -> RecorderLimits {
        RecorderLimits {
            max_recordings: self.max_recordings,
            max_events_per_recording: self.max_events_per_recording,
        }
    }
}

fn default_max_recordings() -> usize {
    DEFAULT_MAX_RECORDINGS
}
fn default_max_events_per_recording() -> usize {
    DEFAULT_MAX_EVENTS_PER_RECORDING
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Speed used when a replay does not ask for one
    #[serde(default = "default_replay_speed")]
    pub default_speed: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            default_speed: default_replay_speed(),
        }
    }
}

fn default_replay_speed() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub alerting: AlertingConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("COGNITIVE")
    }

    /// Load settings with a custom environment variable prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = Self::config_dir();

        Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Local overrides (not checked into git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // e.g. COGNITIVE__ALERTING__MAX_HISTORY=500
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load settings from a single file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            .build()?
            .try_deserialize()
    }

    fn config_dir() -> String {
        std::env::var("COGNITIVE_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Reject values the components cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.metrics.histogram_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "metrics.histogram_capacity",
                "must be at least 1",
            ));
        }
        if self.alerting.max_history == 0 {
            return Err(ConfigurationError::invalid_value(
                "alerting.max_history",
                "must be at least 1",
            ));
        }
        if self.alerting.enabled && self.alerting.interval_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "alerting.interval_secs",
                "must be positive when alerting is enabled",
            ));
        }
        if self.recording.max_recordings == 0 {
            return Err(ConfigurationError::invalid_value(
                "recording.max_recordings",
                "must be at least 1",
            ));
        }
        if self.recording.max_events_per_recording == 0 {
            return Err(ConfigurationError::invalid_value(
                "recording.max_events_per_recording",
                "must be at least 1",
            ));
        }
        let speed = self.replay.default_speed;
        if !(speed.is_finite() && speed > 0.0) {
            return Err(ConfigurationError::invalid_value(
                "replay.default_speed",
                format!("must be a positive number, got {}", speed),
            ));
        }
        for rule in &self.alerting.rules {
            AlertRule::from(rule.clone()).validate().map_err(|e| {
                ConfigurationError::invalid_value(format!("alerting.rules.{}", rule.id), e.to_string())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.metrics.histogram_capacity, 1000);
        assert_eq!(settings.alerting.max_history, 100);
        assert!(settings.alerting.load_default_rules);
        assert_eq!(settings.recording.max_recordings, 50);
        assert_eq!(settings.recording.max_events_per_recording, 10_000);
        assert_eq!(settings.replay.default_speed, 1.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let file = toml_file(
            r#"
            [metrics]
            histogram_capacity = 64

            [replay]
            default_speed = 4.0
            "#,
        );

        let settings = Settings::from_file(file.path()).unwrap();

        assert_eq!(settings.metrics.histogram_capacity, 64);
        assert_eq!(settings.replay.default_speed, 4.0);
        assert_eq!(settings.alerting, AlertingConfig::default());
    }

    #[test]
    fn test_rules_from_file() {
        let file = toml_file(
            r#"
            [alerting]
            load_default_rules = false

            [[alerting.rules]]
            id = "errors_high"
            name = "Errors high"
            metric = "errors"
            metric_type = "counter"
            operator = ">"
            threshold = 5
            severity = "critical"
            cooldown_ms = 1000

            [[alerting.rules]]
            id = "slow"
            name = "Slow"
            metric = "latency_ms"
            metric_type = "percentile"
            operator = "gte"
            threshold = 250
            percentile = 99
            "#,
        );

        let settings = Settings::from_file(file.path()).unwrap();
        assert!(settings.validate().is_ok());

        let rules: Vec<AlertRule> = settings.alerting.rules.into_iter().map(Into::into).collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].severity, AlertSeverity::Critical);
        assert_eq!(rules[0].cooldown_ms, 1000);
        assert_eq!(rules[1].operator, Comparator::Gte);
        assert_eq!(rules[1].percentile, Some(99.0));
        assert_eq!(rules[1].severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Settings::from_file("/definitely/not/here.toml").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.replay.default_speed = 0.0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("replay.default_speed"));

        let mut settings = Settings::default();
        settings.recording.max_recordings = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.alerting.rules.push(RuleConfig {
            id: "p".to_string(),
            name: "P".to_string(),
            description: String::new(),
            metric: "latency".to_string(),
            metric_type: MetricKind::Percentile,
            operator: Comparator::Gt,
            threshold: 1.0,
            percentile: None,
            severity: AlertSeverity::Info,
            cooldown_ms: 0,
            enabled: true,
            tags: None,
        });
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("COGNITIVE_CFG_TEST__REPLAY__DEFAULT_SPEED", "2.5");
        std::env::set_var("COGNITIVE_CFG_TEST__ALERTING__MAX_HISTORY", "7");

        let settings = Settings::load_with_prefix("COGNITIVE_CFG_TEST").unwrap();

        std::env::remove_var("COGNITIVE_CFG_TEST__REPLAY__DEFAULT_SPEED");
        std::env::remove_var("COGNITIVE_CFG_TEST__ALERTING__MAX_HISTORY");

        assert_eq!(settings.replay.default_speed, 2.5);
        assert_eq!(settings.alerting.max_history, 7);
    }
}
