use crate::error::{AlarmError, Result};
use crate::lifecycle::{self, Transition};
use crate::snapshot::SnapshotSource;
use crate::eval;
use chrono::Utc;
use fabmon_common::types::{
    AlarmConfig, AlarmEvent, AlarmOccurrence, AlarmResult, AlarmType, ThresholdRule,
};
use fabmon_storage::AlarmStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Acknowledgment action recorded on the bulk path.
pub const MASS_ACK_ACTION: &str = "Auto Mass Acknowledged";

/// A configuration the sweep could not transition this cycle (id space
/// exhausted or a storage failure). The cycle still returns everything it
/// could evaluate.
#[derive(Debug, Clone)]
pub struct PollFailure {
    pub config_id: String,
    pub config_name: String,
    pub error: String,
}

/// Outcome of one poll cycle: the currently-firing results, in config
/// iteration order, plus per-config failures.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub results: Vec<AlarmResult>,
    pub failures: Vec<PollFailure>,
}

/// The alarm engine. Stateless between cycles: all occurrence and rollup
/// state lives in the store, so concurrent cycles against the same store
/// are safe (the open path is an atomic conditional insert).
pub struct AlarmEngine {
    store: Arc<dyn AlarmStore>,
    source: Box<dyn SnapshotSource>,
}

impl AlarmEngine {
    pub fn new(store: Arc<dyn AlarmStore>, source: Box<dyn SnapshotSource>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Arc<dyn AlarmStore> {
        &self.store
    }

    /// Runs one poll cycle: fetch a snapshot, evaluate every configuration
    /// against it, drive open/update/close transitions, then reconcile
    /// events whose configuration did not fire this cycle.
    ///
    /// A snapshot failure aborts the whole cycle before any evaluation.
    pub async fn run_poll_cycle(&self) -> Result<PollOutcome> {
        let snapshot = self.source.fetch().await?;
        let configs = self.store.list_alarm_configs()?;
        tracing::debug!(configs = configs.len(), tags = snapshot.len(), "Poll cycle started");

        let mut active: HashSet<String> = HashSet::new();
        let mut outcome = PollOutcome::default();

        for (config, alarm_type) in &configs {
            // Exact tag match only; a config whose parameter is absent from
            // the snapshot keeps whatever state it had.
            let Some(value) = snapshot.lookup(&config.parameter) else {
                continue;
            };
            let now = Utc::now();

            let Some(rule) = eval::triggered_threshold(value, &config.rules) else {
                // Eager close, within this iteration.
                if let Err(e) = lifecycle::close_if_open(self.store.as_ref(), &config.id, now) {
                    tracing::error!(config_id = %config.id, error = %e, "Close failed");
                    outcome.failures.push(failure(config, &e));
                }
                continue;
            };

            active.insert(config.id.clone());
            match lifecycle::open_or_update(self.store.as_ref(), config, value, rule, now) {
                Ok(transition) => {
                    if let Some(occurrence) = transition.occurrence() {
                        outcome
                            .results
                            .push(make_result(config, alarm_type, occurrence, value, rule));
                    }
                }
                Err(e @ AlarmError::IdExhausted { .. }) => {
                    tracing::warn!(config_id = %config.id, "Occurrence id space exhausted, skipping config");
                    outcome.failures.push(failure(config, &e));
                }
                Err(e) => {
                    tracing::error!(config_id = %config.id, error = %e, "Open-or-update failed");
                    outcome.failures.push(failure(config, &e));
                }
            }
        }

        // Reconciliation pass, strictly after the sweep: any event whose
        // config did not fire this cycle must not be left with an open
        // occurrence (covers configs deleted or renamed mid-cycle, and
        // parameters that vanished from the snapshot).
        for event in self.store.list_events()? {
            if active.contains(&event.config_id) {
                continue;
            }
            if let Some(latest) = self.store.latest_occurrence(&event.config_id)? {
                if latest.open {
                    tracing::info!(config_id = %event.config_id, occurrence_id = %latest.id,
                        "Reconciliation closing stale occurrence");
                    self.store.close_occurrence(&latest.id, Utc::now())?;
                }
            }
        }

        tracing::debug!(
            firing = outcome.results.len(),
            failed = outcome.failures.len(),
            "Poll cycle finished"
        );
        Ok(outcome)
    }

    /// Acknowledges a single occurrence. The recorded delay is the elapsed
    /// time from open to acknowledgment.
    pub fn acknowledge_one(
        &self,
        occurrence_id: &str,
        action: &str,
        actor: &str,
    ) -> Result<AlarmOccurrence> {
        if action.trim().is_empty() || actor.trim().is_empty() {
            return Err(AlarmError::Validation(
                "action and actor are required".to_string(),
            ));
        }
        let occurrence = self.get_occurrence_or_not_found(occurrence_id)?;
        if occurrence.ack_status == fabmon_common::types::AckStatus::Acknowledged {
            return Err(AlarmError::AlreadyAcknowledged(occurrence_id.to_string()));
        }
        let now = Utc::now();
        let delay = (now - occurrence.opened_at).num_seconds().max(0);
        if !self
            .store
            .acknowledge(occurrence_id, action, actor, delay, now)?
        {
            // Raced with another acknowledger.
            return Err(AlarmError::AlreadyAcknowledged(occurrence_id.to_string()));
        }
        self.store.recount_acknowledged(&occurrence.config_id)?;
        tracing::info!(occurrence_id, actor, action, "Occurrence acknowledged");
        self.get_occurrence_or_not_found(occurrence_id)
    }

    /// Bulk acknowledgment: idempotent on already-acknowledged rows, delay
    /// fixed at 0, action fixed to [`MASS_ACK_ACTION`]. Returns the
    /// post-update occurrence for every requested id that exists.
    pub fn acknowledge_many(
        &self,
        occurrence_ids: &[String],
        actor: &str,
    ) -> Result<Vec<AlarmOccurrence>> {
        if occurrence_ids.is_empty() {
            return Err(AlarmError::Validation(
                "occurrence_ids must not be empty".to_string(),
            ));
        }
        if actor.trim().is_empty() {
            return Err(AlarmError::Validation("actor is required".to_string()));
        }
        let now = Utc::now();
        let mut touched_configs: HashSet<String> = HashSet::new();
        let mut updated = Vec::new();
        for id in occurrence_ids {
            let Some(occurrence) = self.store.get_occurrence(id)? else {
                continue;
            };
            if occurrence.ack_status != fabmon_common::types::AckStatus::Acknowledged
                && self.store.acknowledge(id, MASS_ACK_ACTION, actor, 0, now)?
            {
                touched_configs.insert(occurrence.config_id.clone());
            }
            updated.push(self.get_occurrence_or_not_found(id)?);
        }
        // One recount per distinct event, from a fresh read.
        for config_id in &touched_configs {
            self.store.recount_acknowledged(config_id)?;
        }
        tracing::info!(
            requested = occurrence_ids.len(),
            acknowledged = touched_configs.len(),
            actor,
            "Bulk acknowledgment finished"
        );
        Ok(updated)
    }

    /// Bulk snooze field set, regardless of open/acknowledged state.
    /// Returns the number of occurrences updated.
    pub fn snooze(
        &self,
        occurrence_ids: &[String],
        snooze: bool,
        duration_secs: Option<i64>,
        at: Option<chrono::DateTime<Utc>>,
    ) -> Result<usize> {
        if occurrence_ids.is_empty() {
            return Err(AlarmError::Validation(
                "occurrence_ids must not be empty".to_string(),
            ));
        }
        let matched = self
            .store
            .set_snooze(occurrence_ids, snooze, duration_secs, at, Utc::now())?;
        if matched == 0 {
            return Err(AlarmError::NothingUpdated);
        }
        Ok(matched)
    }

    /// Deduplicated union of all configs' permitted acknowledgment actions.
    pub fn ack_actions(&self) -> Result<Vec<String>> {
        Ok(self.store.list_ack_actions()?)
    }

    pub fn list_events(&self) -> Result<Vec<AlarmEvent>> {
        Ok(self.store.list_events()?)
    }

    fn get_occurrence_or_not_found(&self, occurrence_id: &str) -> Result<AlarmOccurrence> {
        self.store
            .get_occurrence(occurrence_id)?
            .ok_or_else(|| AlarmError::NotFound {
                entity: "alarm_occurrence",
                id: occurrence_id.to_string(),
            })
    }
}

fn failure(config: &AlarmConfig, error: &AlarmError) -> PollFailure {
    PollFailure {
        config_id: config.id.clone(),
        config_name: config.name.clone(),
        error: error.to_string(),
    }
}

fn make_result(
    config: &AlarmConfig,
    alarm_type: &AlarmType,
    occurrence: &AlarmOccurrence,
    value: f64,
    rule: &ThresholdRule,
) -> AlarmResult {
    AlarmResult {
        occurrence_id: occurrence.id.clone(),
        ack_status: occurrence.ack_status,
        config_id: config.id.clone(),
        config_name: config.name.clone(),
        location: config.location.clone(),
        sub_location: config.sub_location.clone(),
        device: config.device.clone(),
        parameter: config.parameter.clone(),
        value,
        threshold_value: rule.value,
        threshold_operator: rule.operator.clone(),
        snooze: occurrence.snooze,
        snooze_at: occurrence.snooze_at,
        type_name: alarm_type.name.clone(),
        type_priority: alarm_type.priority,
        type_color: alarm_type.color.clone(),
        type_code: alarm_type.code.clone(),
    }
}
