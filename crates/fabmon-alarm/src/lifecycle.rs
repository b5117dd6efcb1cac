//! Per-configuration occurrence state machine.
//!
//! A configuration is always in one of two states: no active occurrence,
//! or exactly one open occurrence. Opening goes through the store's atomic
//! conditional insert; losing the open race degrades to the update path.

use crate::error::{AlarmError, Result};
use chrono::{DateTime, Utc};
use fabmon_common::types::{AlarmConfig, AlarmOccurrence, ThresholdRule};
use fabmon_storage::error::StorageError;
use fabmon_storage::{AlarmStore, OpenAttempt};

/// Outcome of driving one configuration through one poll cycle.
#[derive(Debug)]
pub enum Transition {
    /// A new occurrence was created (config entered breach).
    Opened(AlarmOccurrence),
    /// The existing open occurrence was updated in place (still breaching).
    Updated(AlarmOccurrence),
    /// The open occurrence was closed (breach ended).
    Closed(AlarmOccurrence),
    /// Nothing to do (not breaching, nothing open).
    Idle,
}

impl Transition {
    pub fn occurrence(&self) -> Option<&AlarmOccurrence> {
        match self {
            Transition::Opened(occ) | Transition::Updated(occ) | Transition::Closed(occ) => {
                Some(occ)
            }
            Transition::Idle => None,
        }
    }
}

/// Fires-this-cycle path: update the open occurrence if one exists,
/// otherwise open a new one. Acknowledgment state survives updates.
pub fn open_or_update(
    store: &dyn AlarmStore,
    config: &AlarmConfig,
    value: f64,
    rule: &ThresholdRule,
    now: DateTime<Utc>,
) -> Result<Transition> {
    if let Some(open) = store.find_open_occurrence(&config.id)? {
        let occurrence = store.refresh_occurrence(&open.id, value, rule, now)?;
        return Ok(Transition::Updated(occurrence));
    }
    match store.open_occurrence(&config.id, value, rule, now) {
        Ok(OpenAttempt::Opened(occurrence)) => Ok(Transition::Opened(occurrence)),
        Ok(OpenAttempt::OpenRace(existing)) => {
            // A concurrent poller opened first; fall through to update.
            tracing::debug!(config_id = %config.id, occurrence_id = %existing.id,
                "Lost occurrence-open race, updating instead");
            let occurrence = store.refresh_occurrence(&existing.id, value, rule, now)?;
            Ok(Transition::Updated(occurrence))
        }
        Err(StorageError::IdExhausted(_)) => Err(AlarmError::IdExhausted {
            config_id: config.id.clone(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Stopped-firing path: close the open occurrence if there is one.
pub fn close_if_open(
    store: &dyn AlarmStore,
    config_id: &str,
    now: DateTime<Utc>,
) -> Result<Transition> {
    match store.find_open_occurrence(config_id)? {
        Some(open) => Ok(Transition::Closed(store.close_occurrence(&open.id, now)?)),
        None => Ok(Transition::Idle),
    }
}
