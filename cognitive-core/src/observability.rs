// observability.rs - Registry, alert engine, recorder and replayer wired from Settings

use cognitive_common::error::{ConfigurationError, EntityError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alerting::{spawn_alert_monitor, AlertEngine, AlertHandler, AlertRule, LogAlertHandler};
use crate::clock::{Clock, TokioClock};
use crate::config::Settings;
use crate::metrics::MetricRegistry;
use crate::recording::{
    EventRecorder, EventSink, LogEventSink, ReplayOptions, ReplayReport, ReplayResult, Replayer,
};

/// The three observability components sharing one clock.
///
/// Each instance owns its own stores, so independent instances can coexist.
#[derive(Debug)]
pub struct Observability {
    settings: Settings,
    metrics: Arc<MetricRegistry>,
    alerts: Arc<AlertEngine>,
    recorder: Arc<EventRecorder>,
    replayer: Arc<Replayer>,
}

/// Optional collaborators for [`Observability::with_parts`]
pub struct Parts {
    pub clock: Arc<dyn Clock>,
    pub alert_handler: Arc<dyn AlertHandler>,
    pub replay_sink: Arc<dyn EventSink>,
}

impl Default for Parts {
    fn default() -> Self {
        Self {
            clock: Arc::new(TokioClock),
            alert_handler: Arc::new(LogAlertHandler::new()),
            replay_sink: Arc::new(LogEventSink),
        }
    }
}

impl Observability {
    /// Build with logging handlers and the tokio clock
    pub fn new(settings: Settings) -> Result<Self, ConfigurationError> {
        Self::with_parts(settings, Parts::default())
    }

    /// Build with caller-supplied clock, alert handler and replay sink.
    ///
    /// Configured rules are installed first, then the default rules if enabled.
    pub fn with_parts(settings: Settings, parts: Parts) -> Result<Self, ConfigurationError> {
        settings.validate()?;

        let metrics = Arc::new(MetricRegistry::new(settings.metrics.histogram_capacity));
        let alerts = Arc::new(AlertEngine::new(
            metrics.clone(),
            parts.alert_handler,
            parts.clock.clone(),
            settings.alerting.max_history,
        ));
        let recorder = Arc::new(EventRecorder::new(
            parts.clock.clone(),
            settings.recording.limits(),
        ));
        let replayer = Arc::new(Replayer::new(parts.clock, parts.replay_sink));

        for rule in settings.alerting.rules.iter().cloned() {
            let id = rule.id.clone();
            alerts.add_rule(AlertRule::from(rule)).map_err(|e| {
                ConfigurationError::invalid_value(format!("alerting.rules.{}", id), e.to_string())
            })?;
        }
        let defaults = if settings.alerting.load_default_rules {
            alerts.load_default_rules()
        } else {
            0
        };

        info!(
            configured_rules = settings.alerting.rules.len(),
            default_rules = defaults,
            histogram_capacity = settings.metrics.histogram_capacity,
            "Observability initialized"
        );

        Ok(Self {
            settings,
            metrics,
            alerts,
            recorder,
            replayer,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<MetricRegistry> {
        &self.metrics
    }

    pub fn alerts(&self) -> &Arc<AlertEngine> {
        &self.alerts
    }

    pub fn recorder(&self) -> &Arc<EventRecorder> {
        &self.recorder
    }

    pub fn replayer(&self) -> &Arc<Replayer> {
        &self.replayer
    }

    /// Periodic evaluation at the configured interval, or `None` when
    /// alerting is disabled
    pub fn spawn_alert_monitor(&self) -> Option<JoinHandle<()>> {
        if !self.settings.alerting.enabled {
            warn!("Alerting disabled, no monitor started");
            return None;
        }
        Some(spawn_alert_monitor(
            self.alerts.clone(),
            self.settings.alerting.interval(),
        ))
    }

    /// Replay options preset with the configured default speed
    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions::default().with_speed(self.settings.replay.default_speed)
    }

    /// Replay a catalogued recording by id
    pub async fn replay_recording(
        &self,
        recording_id: &str,
        options: ReplayOptions,
    ) -> ReplayResult<ReplayReport> {
        let recording = self
            .recorder
            .get_recording(recording_id)
            .ok_or_else(|| EntityError::not_found("Recording", recording_id))?;
        self.replayer.replay(&recording, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::alerting::{Comparator, MetricKind};
    use crate::recording::ReplayError;

    #[test]
    fn test_new_loads_default_rules() {
        let obs = Observability::new(Settings::default()).unwrap();

        assert!(obs.alerts().stats().total_rules > 0);
        assert_eq!(obs.metrics().histogram_capacity(), 1000);
    }

    #[test]
    fn test_configured_rules_without_defaults() {
        let mut settings = Settings::default();
        settings.alerting.load_default_rules = false;
        settings.alerting.rules.push(RuleConfig {
            id: "errors_high".to_string(),
            name: "Errors high".to_string(),
            description: String::new(),
            metric: "errors".to_string(),
            metric_type: MetricKind::Counter,
            operator: Comparator::Gt,
            threshold: 5.0,
            percentile: None,
            severity: crate::alerting::AlertSeverity::Error,
            cooldown_ms: 60_000,
            enabled: true,
            tags: None,
        });

        let obs = Observability::new(settings).unwrap();
        let rules = obs.alerts().rules();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "errors_high");
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let mut settings = Settings::default();
        settings.metrics.histogram_capacity = 0;

        assert!(Observability::new(settings).is_err());
    }

    #[test]
    fn test_independent_instances() {
        let a = Observability::new(Settings::default()).unwrap();
        let b = Observability::new(Settings::default()).unwrap();

        a.metrics().increment("errors", 3.0, None).unwrap();

        assert_eq!(a.metrics().counter("errors", None), Some(3.0));
        assert_eq!(b.metrics().counter("errors", None), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_recording_by_id() {
        let obs = Observability::new(Settings::default()).unwrap();

        let err = obs
            .replay_recording("missing", obs.replay_options())
            .await
            .unwrap_err();
        assert!(matches!(err, ReplayError::Entity(_)));

        obs.recorder().start_recording(Some("r")).unwrap();
        obs.recorder().capture("thought", "{}");
        let rec = obs.recorder().stop_recording().unwrap();

        let report = obs
            .replay_recording(&rec.id, obs.replay_options().dry_run(true))
            .await
            .unwrap();
        assert_eq!(report.played, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_respects_enabled_flag() {
        let mut settings = Settings::default();
        settings.alerting.enabled = false;
        let obs = Observability::new(settings).unwrap();

        assert!(obs.spawn_alert_monitor().is_none());
    }
}
