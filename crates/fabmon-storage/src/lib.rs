//! Persistence layer for the alarm catalog and engine-owned documents.
//!
//! The default implementation ([`store::SqliteAlarmStore`]) is a single
//! SQLite database in WAL mode behind one connection. Occurrence-open is an
//! atomic conditional insert guarded by a partial unique index over
//! `(config_id) WHERE open = 1`, which is what upholds the at-most-one-open
//! invariant even when two pollers race.

pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use error::Result;
use fabmon_common::types::{
    AlarmConfig, AlarmEvent, AlarmOccurrence, AlarmType, ThresholdRule,
};

/// Outcome of an attempt to open a new occurrence for a configuration.
#[derive(Debug)]
pub enum OpenAttempt {
    /// A new occurrence was created and the event rollup updated.
    Opened(AlarmOccurrence),
    /// A concurrent opener already holds the open slot for this config.
    /// Callers fall through to the update path with the returned row.
    OpenRace(AlarmOccurrence),
}

/// Persistence backend for alarm configuration and occurrence state.
///
/// Implementations must be safe to share across threads (`Send + Sync`);
/// the store is reached from concurrent poll cycles and acknowledgment
/// calls. Every mutation of an occurrence together with its event rollup
/// must be atomic, so an aborted poll cycle can never leave the pair
/// half-updated.
pub trait AlarmStore: Send + Sync {
    // ---- catalog ----

    fn insert_alarm_type(&self, ty: &AlarmType) -> Result<()>;
    fn get_alarm_type(&self, id: &str) -> Result<Option<AlarmType>>;
    fn list_alarm_types(&self) -> Result<Vec<AlarmType>>;
    /// Fails with a conflict while any configuration references the type.
    fn delete_alarm_type(&self, id: &str) -> Result<()>;

    fn insert_alarm_config(&self, config: &AlarmConfig) -> Result<()>;
    /// Rewrites the config row in place, including its owned rule set.
    fn update_alarm_config(&self, config: &AlarmConfig) -> Result<()>;
    fn get_alarm_config(&self, id: &str) -> Result<Option<AlarmConfig>>;
    /// All configurations joined with their alarm type, in insertion order.
    fn list_alarm_configs(&self) -> Result<Vec<(AlarmConfig, AlarmType)>>;
    /// Fails with a conflict while the config's event has occurrences.
    fn delete_alarm_config(&self, id: &str) -> Result<()>;
    fn count_alarm_configs(&self) -> Result<u64>;
    /// Deduplicated union of every config's permitted acknowledgment
    /// actions, in first-seen order.
    fn list_ack_actions(&self) -> Result<Vec<String>>;

    // ---- occurrences ----

    /// Allocates the next sequential id and inserts an open occurrence,
    /// updating the event rollup, all in one transaction. A uniqueness
    /// violation on the open slot is reported as [`OpenAttempt::OpenRace`],
    /// never as an error; id exhaustion is
    /// [`error::StorageError::IdExhausted`].
    fn open_occurrence(
        &self,
        config_id: &str,
        value: f64,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<OpenAttempt>;

    /// Update-in-place while the occurrence keeps breaching: new value,
    /// fired threshold, and recomputed duration. Acknowledgment and snooze
    /// state are untouched.
    fn refresh_occurrence(
        &self,
        occurrence_id: &str,
        value: f64,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<AlarmOccurrence>;

    /// Closes the occurrence: `open = false`, duration frozen at
    /// `now - opened_at`, event `last_occurrence` touched.
    fn close_occurrence(&self, occurrence_id: &str, now: DateTime<Utc>) -> Result<AlarmOccurrence>;

    fn find_open_occurrence(&self, config_id: &str) -> Result<Option<AlarmOccurrence>>;
    fn get_occurrence(&self, occurrence_id: &str) -> Result<Option<AlarmOccurrence>>;
    fn list_occurrences(
        &self,
        config_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AlarmOccurrence>>;
    /// The most recently created occurrence for a config, open or not.
    fn latest_occurrence(&self, config_id: &str) -> Result<Option<AlarmOccurrence>>;

    // ---- events ----

    fn get_event(&self, config_id: &str) -> Result<Option<AlarmEvent>>;
    fn list_events(&self) -> Result<Vec<AlarmEvent>>;

    // ---- acknowledgment & snooze ----

    /// Conditionally flips an occurrence to `Acknowledged`. Returns `false`
    /// when the row was already acknowledged (the update matched nothing).
    fn acknowledge(
        &self,
        occurrence_id: &str,
        action: &str,
        actor: &str,
        delay_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Recomputes the event's acknowledged count from a fresh read of the
    /// occurrence set and returns the new value.
    fn recount_acknowledged(&self, config_id: &str) -> Result<i64>;

    /// Unconditional bulk snooze field set, regardless of open or
    /// acknowledgment state. Returns the number of rows that matched.
    fn set_snooze(
        &self,
        occurrence_ids: &[String],
        snooze: bool,
        duration_secs: Option<i64>,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<usize>;
}
