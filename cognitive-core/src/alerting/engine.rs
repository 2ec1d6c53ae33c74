// alerting/engine.rs - Rule set, alert lifecycle and evaluation passes

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::defaults::default_rules;
use super::errors::{AlertError, AlertResult};
use super::{AlertHandler, AlertRule, AlertSeverity, LogAlertHandler, TriggeredAlert};
use crate::clock::{Clock, TokioClock};
use crate::metrics::MetricRegistry;
use crate::telemetry;

/// Alerts retained in history unless configured otherwise
pub const DEFAULT_MAX_HISTORY: usize = 100;

#[derive(Debug, Default)]
struct EngineState {
    rules: Vec<Arc<AlertRule>>,
    active: Vec<Arc<TriggeredAlert>>,
    /// Oldest first
    history: VecDeque<Arc<TriggeredAlert>>,
    /// Monotonic instant each rule last opened an alert
    last_triggered: HashMap<String, Instant>,
    total_alerts: u64,
    last_evaluated_at: Option<DateTime<Utc>>,
}

impl EngineState {
    fn rule_index(&self, rule_id: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.id == rule_id)
    }

    /// Record an alert, evicting the oldest history entries beyond `max_history`
    fn push_history(&mut self, alert: Arc<TriggeredAlert>, max_history: usize) {
        self.history.push_back(alert);
        while self.history.len() > max_history {
            self.history.pop_front();
        }
    }

    /// Swap the history record with the same id, if it is still retained
    fn replace_in_history(&mut self, alert: &Arc<TriggeredAlert>) {
        if let Some(slot) = self.history.iter_mut().find(|a| a.id == alert.id) {
            *slot = alert.clone();
        }
    }

    /// Close the active alert for `rule_id`, returning the resolved record
    fn retire(&mut self, rule_id: &str, at: DateTime<Utc>) -> Option<Arc<TriggeredAlert>> {
        let idx = self.active.iter().position(|a| a.rule_id == rule_id)?;
        let open = self.active.remove(idx);
        let closed = Arc::new(open.resolved(at));
        self.replace_in_history(&closed);
        Some(closed)
    }
}

/// Active alert counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub info: usize,
    pub warning: usize,
    pub error: usize,
    pub critical: usize,
}

impl SeverityCounts {
    fn add(&mut self, severity: AlertSeverity) {
        match severity {
            AlertSeverity::Info => self.info += 1,
            AlertSeverity::Warning => self.warning += 1,
            AlertSeverity::Error => self.error += 1,
            AlertSeverity::Critical => self.critical += 1,
        }
    }

    pub fn get(&self, severity: AlertSeverity) -> usize {
        match severity {
            AlertSeverity::Info => self.info,
            AlertSeverity::Warning => self.warning,
            AlertSeverity::Error => self.error,
            AlertSeverity::Critical => self.critical,
        }
    }
}

/// Summary counters of the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    pub total_rules: usize,
    pub enabled_rules: usize,
    pub active_alerts: usize,
    /// Alerts ever opened, unaffected by history eviction or clearing
    pub total_alerts: u64,
    pub by_severity: SeverityCounts,
    pub evaluations: u64,
    pub evaluation_errors: u64,
    pub last_evaluated_at: Option<DateTime<Utc>>,
}

/// Outcome of a single evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub rules_evaluated: usize,
    pub opened: usize,
    pub resolved: usize,
    pub errors: usize,
}

/// Evaluates threshold rules against registry snapshots.
///
/// All state sits behind one lock. Handlers are invoked only after the lock
/// is released, in the order alerts were opened or closed.
pub struct AlertEngine {
    registry: Arc<MetricRegistry>,
    handler: Arc<dyn AlertHandler>,
    clock: Arc<dyn Clock>,
    max_history: usize,
    state: RwLock<EngineState>,
    evaluations: AtomicU64,
    evaluation_errors: AtomicU64,
}

impl std::fmt::Debug for AlertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEngine")
            .field("max_history", &self.max_history)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl AlertEngine {
    /// Create an engine reading from `registry` and notifying `handler`
    pub fn new(
        registry: Arc<MetricRegistry>,
        handler: Arc<dyn AlertHandler>,
        clock: Arc<dyn Clock>,
        max_history: usize,
    ) -> Self {
        Self {
            registry,
            handler,
            clock,
            max_history: max_history.max(1),
            state: RwLock::new(EngineState::default()),
            evaluations: AtomicU64::new(0),
            evaluation_errors: AtomicU64::new(0),
        }
    }

    /// Engine that logs alerts and runs on the tokio clock
    pub fn with_log_handler(registry: Arc<MetricRegistry>) -> Self {
        Self::new(
            registry,
            Arc::new(LogAlertHandler::new()),
            Arc::new(TokioClock),
            DEFAULT_MAX_HISTORY,
        )
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Rule management
    // ------------------------------------------------------------------------

    /// Add a rule, replacing any rule with the same id.
    ///
    /// A replaced rule keeps its cooldown timestamp and any active alert.
    pub fn add_rule(&self, rule: AlertRule) -> AlertResult<()> {
        rule.validate()?;

        let mut state = self.state.write();
        match state.rule_index(&rule.id) {
            Some(idx) => {
                info!(rule = %rule.id, "Replacing alert rule");
                state.rules[idx] = Arc::new(rule);
            }
            None => {
                info!(rule = %rule.id, metric = %rule.metric, "Adding alert rule");
                state.rules.push(Arc::new(rule));
            }
        }
        Ok(())
    }

    /// Remove a rule and forget its cooldown. Its active alert, if any, is resolved.
    pub fn remove_rule(&self, rule_id: &str) -> AlertResult<AlertRule> {
        let (removed, closed) = {
            let mut state = self.state.write();
            let idx = state
                .rule_index(rule_id)
                .ok_or_else(|| AlertError::RuleNotFound(rule_id.to_string()))?;
            let removed = state.rules.remove(idx);
            state.last_triggered.remove(rule_id);
            let closed = state.retire(rule_id, self.clock.wall_time());
            (removed, closed)
        };

        info!(rule = %rule_id, "Removed alert rule");
        if let Some(alert) = closed {
            self.notify_resolved(&alert);
        }
        Ok(Arc::try_unwrap(removed).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Enable or disable a rule.
    ///
    /// Disabling resolves the rule's active alert but keeps its cooldown.
    pub fn toggle_rule(&self, rule_id: &str, enabled: bool) -> AlertResult<()> {
        let closed = {
            let mut state = self.state.write();
            let idx = state
                .rule_index(rule_id)
                .ok_or_else(|| AlertError::RuleNotFound(rule_id.to_string()))?;

            if state.rules[idx].enabled != enabled {
                let mut updated = (*state.rules[idx]).clone();
                updated.enabled = enabled;
                state.rules[idx] = Arc::new(updated);
            }

            if enabled {
                None
            } else {
                state.retire(rule_id, self.clock.wall_time())
            }
        };

        info!(rule = %rule_id, enabled, "Toggled alert rule");
        if let Some(alert) = closed {
            self.notify_resolved(&alert);
        }
        Ok(())
    }

    /// Install the baseline rule set, skipping ids already present.
    ///
    /// Returns the number of rules added.
    pub fn load_default_rules(&self) -> usize {
        let mut state = self.state.write();
        let mut added = 0;
        for rule in default_rules() {
            if state.rule_index(&rule.id).is_none() {
                state.rules.push(Arc::new(rule));
                added += 1;
            }
        }
        debug!(added, "Loaded default alert rules");
        added
    }

    pub fn rule(&self, rule_id: &str) -> Option<AlertRule> {
        let state = self.state.read();
        state
            .rule_index(rule_id)
            .map(|idx| (*state.rules[idx]).clone())
    }

    /// All rules in insertion order
    pub fn rules(&self) -> Vec<AlertRule> {
        self.state.read().rules.iter().map(|r| (**r).clone()).collect()
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Evaluate every enabled rule against one registry snapshot.
    ///
    /// A rule whose metric cannot be resolved is logged, counted and treated
    /// as not violated; it never aborts the pass.
    pub fn evaluate_now(&self) -> EvaluationSummary {
        let timer = telemetry::ALERT_EVALUATION_DURATION.start_timer();
        let snapshot = self.registry.snapshot();
        let rules: Vec<Arc<AlertRule>> = self
            .state
            .read()
            .rules
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect();

        let mut summary = EvaluationSummary {
            rules_evaluated: rules.len(),
            ..Default::default()
        };

        let readings: Vec<(Arc<AlertRule>, Option<f64>)> = rules
            .into_iter()
            .map(|rule| match rule.current_value(&snapshot) {
                Ok(value) => (rule, Some(value)),
                Err(e) => {
                    debug!(rule = %rule.id, error = %e, "Alert rule could not be evaluated");
                    summary.errors += 1;
                    (rule, None)
                }
            })
            .collect();

        let now = self.clock.now();
        let wall = self.clock.wall_time();
        let mut opened = Vec::new();
        let mut resolved = Vec::new();

        {
            let mut state = self.state.write();
            for (rule, value) in readings {
                // Skip rules removed or disabled since the snapshot was taken
                if !state
                    .rule_index(&rule.id)
                    .map_or(false, |idx| state.rules[idx].enabled)
                {
                    continue;
                }

                let violation = value.filter(|v| rule.is_violated_by(*v));
                let is_active = state.active.iter().any(|a| a.rule_id == rule.id);

                match (violation, is_active) {
                    (Some(value), false) => {
                        let cooling_down = state
                            .last_triggered
                            .get(&rule.id)
                            .map_or(false, |t| now.duration_since(*t) < rule.cooldown());
                        if cooling_down {
                            continue;
                        }

                        let alert = Arc::new(TriggeredAlert::new(&rule, value, wall));
                        state.active.push(alert.clone());
                        state.push_history(alert.clone(), self.max_history);
                        state.last_triggered.insert(rule.id.clone(), now);
                        state.total_alerts += 1;
                        opened.push(alert);
                    }
                    (None, true) => {
                        if let Some(closed) = state.retire(&rule.id, wall) {
                            resolved.push(closed);
                        }
                    }
                    // Still violated with an open alert, or still healthy
                    _ => {}
                }
            }
            state.last_evaluated_at = Some(wall);
        }

        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.evaluation_errors
            .fetch_add(summary.errors as u64, Ordering::Relaxed);
        telemetry::ALERT_EVALUATIONS_TOTAL.inc();
        telemetry::ALERT_EVALUATION_ERRORS_TOTAL.inc_by(summary.errors as u64);
        timer.observe_duration();

        summary.opened = opened.len();
        summary.resolved = resolved.len();

        for alert in &opened {
            telemetry::ALERTS_FIRED_TOTAL.inc();
            self.handler.on_alert(alert);
        }
        for alert in &resolved {
            self.notify_resolved(alert);
        }

        if summary.opened > 0 || summary.resolved > 0 {
            info!(
                opened = summary.opened,
                resolved = summary.resolved,
                errors = summary.errors,
                "Alert evaluation pass changed alert state"
            );
        }
        summary
    }

    fn notify_resolved(&self, alert: &TriggeredAlert) {
        telemetry::ALERTS_RESOLVED_TOTAL.inc();
        self.handler.on_resolve(alert);
    }

    // ------------------------------------------------------------------------
    // Alert lifecycle
    // ------------------------------------------------------------------------

    /// Mark an active alert as acknowledged. The alert stays open.
    pub fn acknowledge(&self, alert_id: &str) -> AlertResult<()> {
        let mut state = self.state.write();
        let idx = state
            .active
            .iter()
            .position(|a| a.id == alert_id)
            .ok_or_else(|| AlertError::AlertNotFound(alert_id.to_string()))?;

        if !state.active[idx].acknowledged {
            let acked = Arc::new(state.active[idx].acknowledged());
            state.replace_in_history(&acked);
            state.active[idx] = acked;
        }
        Ok(())
    }

    /// Acknowledge every active alert, returning how many changed
    pub fn acknowledge_all(&self) -> usize {
        let mut state = self.state.write();
        let pending: Vec<usize> = state
            .active
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.acknowledged)
            .map(|(idx, _)| idx)
            .collect();

        for &idx in &pending {
            let acked = Arc::new(state.active[idx].acknowledged());
            state.replace_in_history(&acked);
            state.active[idx] = acked;
        }
        pending.len()
    }

    /// Open alerts in the order they were raised
    pub fn active_alerts(&self) -> Vec<TriggeredAlert> {
        self.state
            .read()
            .active
            .iter()
            .map(|a| (**a).clone())
            .collect()
    }

    /// Retained alerts, oldest first, including resolved ones
    pub fn history(&self) -> Vec<TriggeredAlert> {
        self.state
            .read()
            .history
            .iter()
            .map(|a| (**a).clone())
            .collect()
    }

    /// Drop the history. Active alerts, cooldowns and totals are untouched.
    pub fn clear_history(&self) -> usize {
        let mut state = self.state.write();
        let cleared = state.history.len();
        state.history.clear();
        warn!(cleared, "Alert history cleared");
        cleared
    }

    pub fn stats(&self) -> AlertStats {
        let state = self.state.read();
        let mut by_severity = SeverityCounts::default();
        for alert in &state.active {
            by_severity.add(alert.severity);
        }

        AlertStats {
            total_rules: state.rules.len(),
            enabled_rules: state.rules.iter().filter(|r| r.enabled).count(),
            active_alerts: state.active.len(),
            total_alerts: state.total_alerts,
            by_severity,
            evaluations: self.evaluations.load(Ordering::Relaxed),
            evaluation_errors: self.evaluation_errors.load(Ordering::Relaxed),
            last_evaluated_at: state.last_evaluated_at,
        }
    }
}
