use crate::error::{Result, StorageError};
use crate::{AlarmStore, OpenAttempt};
use chrono::{DateTime, Utc};
use fabmon_common::ident;
use fabmon_common::types::{
    AckStatus, AlarmConfig, AlarmEvent, AlarmOccurrence, AlarmType, RuleSet, ThresholdRule,
};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alarm_types (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    priority INTEGER NOT NULL,
    color TEXT NOT NULL,
    code TEXT NOT NULL,
    ack_mode TEXT NOT NULL,
    UNIQUE (name, priority)
);
CREATE TABLE IF NOT EXISTS alarm_configs (
    id TEXT PRIMARY KEY,
    type_id TEXT NOT NULL REFERENCES alarm_types(id),
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    sub_location TEXT NOT NULL DEFAULT '',
    device TEXT NOT NULL,
    parameter TEXT NOT NULL,
    ack_actions TEXT NOT NULL DEFAULT '[]',
    rules TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS alarm_events (
    config_id TEXT PRIMARY KEY,
    occurrence_count INTEGER NOT NULL DEFAULT 0,
    acknowledged_count INTEGER NOT NULL DEFAULT 0,
    first_occurrence INTEGER NOT NULL,
    last_occurrence INTEGER NOT NULL,
    occurrence_ids TEXT NOT NULL DEFAULT '[]'
);
CREATE TABLE IF NOT EXISTS alarm_occurrences (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    config_id TEXT NOT NULL,
    opened_at INTEGER NOT NULL,
    open INTEGER NOT NULL,
    last_value REAL NOT NULL,
    threshold_value REAL NOT NULL,
    threshold_operator TEXT NOT NULL,
    ack_status TEXT NOT NULL,
    ack_by TEXT,
    ack_action TEXT,
    ack_delay_secs INTEGER,
    duration_secs INTEGER NOT NULL DEFAULT 0,
    snooze INTEGER NOT NULL DEFAULT 0,
    snooze_at INTEGER,
    snooze_duration_secs INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_occurrences_one_open
    ON alarm_occurrences(config_id) WHERE open = 1;
CREATE INDEX IF NOT EXISTS idx_occurrences_config
    ON alarm_occurrences(config_id);
";

const OCC_COLUMNS: &str = "id, config_id, opened_at, open, last_value, threshold_value, \
    threshold_operator, ack_status, ack_by, ack_action, ack_delay_secs, duration_secs, \
    snooze, snooze_at, snooze_duration_secs, created_at, updated_at";

/// SQLite-backed [`AlarmStore`].
///
/// One connection behind a `Mutex` keeps writers serialized in-process,
/// which also serializes sequential id allocation; across processes the
/// partial unique index on the open slot still upholds the invariant.
pub struct SqliteAlarmStore {
    conn: Mutex<Connection>,
}

impl SqliteAlarmStore {
    /// Opens (creating if needed) `alarms.db` under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Self::from_connection(Connection::open(data_dir.join("alarms.db"))?)
    }

    /// An in-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn dt(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_occurrence(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlarmOccurrence> {
    let ack: String = row.get(7)?;
    Ok(AlarmOccurrence {
        id: row.get(0)?,
        config_id: row.get(1)?,
        opened_at: dt(row.get(2)?),
        open: row.get(3)?,
        last_value: row.get(4)?,
        threshold_value: row.get(5)?,
        threshold_operator: row.get(6)?,
        ack_status: ack.parse().unwrap_or(AckStatus::Unacknowledged),
        ack_by: row.get(8)?,
        ack_action: row.get(9)?,
        ack_delay_secs: row.get(10)?,
        duration_secs: row.get(11)?,
        snooze: row.get(12)?,
        snooze_at: row.get::<_, Option<i64>>(13)?.map(dt),
        snooze_duration_secs: row.get(14)?,
        created_at: dt(row.get(15)?),
        updated_at: dt(row.get(16)?),
    })
}

fn row_to_type(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlarmType> {
    let ack_mode: String = row.get(5)?;
    Ok(AlarmType {
        id: row.get(0)?,
        name: row.get(1)?,
        priority: row.get(2)?,
        color: row.get(3)?,
        code: row.get(4)?,
        ack_mode: ack_mode.parse().unwrap_or(fabmon_common::types::AckMode::Single),
    })
}

fn query_occurrence(conn: &Connection, id: &str) -> Result<Option<AlarmOccurrence>> {
    let sql = format!("SELECT {OCC_COLUMNS} FROM alarm_occurrences WHERE id = ?1");
    Ok(conn
        .query_row(&sql, [id], row_to_occurrence)
        .optional()?)
}

fn query_open_occurrence(conn: &Connection, config_id: &str) -> Result<Option<AlarmOccurrence>> {
    let sql = format!("SELECT {OCC_COLUMNS} FROM alarm_occurrences WHERE config_id = ?1 AND open = 1");
    Ok(conn
        .query_row(&sql, [config_id], row_to_occurrence)
        .optional()?)
}

fn config_from_parts(
    id: String,
    type_id: String,
    name: String,
    location: String,
    sub_location: String,
    device: String,
    parameter: String,
    ack_actions_json: String,
    rules_json: String,
) -> Result<AlarmConfig> {
    let ack_actions: Vec<String> = serde_json::from_str(&ack_actions_json)?;
    let rules: RuleSet = serde_json::from_str(&rules_json)?;
    Ok(AlarmConfig {
        id,
        type_id,
        name,
        location,
        sub_location,
        device,
        parameter,
        ack_actions,
        rules,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlarmEvent> {
    let ids_json: String = row.get(5)?;
    Ok(AlarmEvent {
        config_id: row.get(0)?,
        occurrence_count: row.get(1)?,
        acknowledged_count: row.get(2)?,
        first_occurrence: dt(row.get(3)?),
        last_occurrence: dt(row.get(4)?),
        occurrence_ids: serde_json::from_str(&ids_json).unwrap_or_default(),
    })
}

/// Folds a freshly opened occurrence into the config's event rollup:
/// `last_occurrence` touched, `first_occurrence` insert-only, id appended
/// with set semantics, counter incremented only for the new row.
fn upsert_event_on_open(
    tx: &rusqlite::Transaction<'_>,
    config_id: &str,
    occurrence_id: &str,
    now_ms: i64,
) -> Result<()> {
    let existing: Option<String> = tx
        .query_row(
            "SELECT occurrence_ids FROM alarm_events WHERE config_id = ?1",
            [config_id],
            |r| r.get(0),
        )
        .optional()?;
    match existing {
        Some(ids_json) => {
            let mut ids: Vec<String> = serde_json::from_str(&ids_json).unwrap_or_default();
            if !ids.iter().any(|i| i == occurrence_id) {
                ids.push(occurrence_id.to_string());
            }
            tx.execute(
                "UPDATE alarm_events SET occurrence_count = occurrence_count + 1,
                     last_occurrence = ?2, occurrence_ids = ?3 WHERE config_id = ?1",
                rusqlite::params![config_id, now_ms, serde_json::to_string(&ids)?],
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO alarm_events (config_id, occurrence_count, acknowledged_count,
                     first_occurrence, last_occurrence, occurrence_ids)
                 VALUES (?1, 1, 0, ?2, ?2, ?3)",
                rusqlite::params![config_id, now_ms, serde_json::to_string(&[occurrence_id])?],
            )?;
        }
    }
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl AlarmStore for SqliteAlarmStore {
    fn insert_alarm_type(&self, ty: &AlarmType) -> Result<()> {
        let conn = self.lock_conn();
        let res = conn.execute(
            "INSERT INTO alarm_types (id, name, priority, color, code, ack_mode)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                ty.id,
                ty.name,
                ty.priority,
                ty.color,
                ty.code,
                ty.ack_mode.to_string()
            ],
        );
        match res {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(StorageError::Conflict(format!(
                "alarm type ({}, priority {}) already exists",
                ty.name, ty.priority
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn get_alarm_type(&self, id: &str) -> Result<Option<AlarmType>> {
        let conn = self.lock_conn();
        Ok(conn
            .query_row(
                "SELECT id, name, priority, color, code, ack_mode FROM alarm_types WHERE id = ?1",
                [id],
                row_to_type,
            )
            .optional()?)
    }

    fn list_alarm_types(&self) -> Result<Vec<AlarmType>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, priority, color, code, ack_mode FROM alarm_types
             ORDER BY priority ASC, name ASC",
        )?;
        let rows = stmt.query_map([], row_to_type)?;
        let mut types = Vec::new();
        for row in rows {
            types.push(row?);
        }
        Ok(types)
    }

    fn delete_alarm_type(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let dependents: i64 = tx.query_row(
            "SELECT COUNT(*) FROM alarm_configs WHERE type_id = ?1",
            [id],
            |r| r.get(0),
        )?;
        if dependents > 0 {
            return Err(StorageError::Conflict(format!(
                "alarm type {id} is referenced by {dependents} configuration(s)"
            )));
        }
        let deleted = tx.execute("DELETE FROM alarm_types WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(StorageError::NotFound {
                entity: "alarm_type",
                id: id.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_alarm_config(&self, config: &AlarmConfig) -> Result<()> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO alarm_configs (id, type_id, name, location, sub_location, device,
                 parameter, ack_actions, rules)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                config.id,
                config.type_id,
                config.name,
                config.location,
                config.sub_location,
                config.device,
                config.parameter,
                serde_json::to_string(&config.ack_actions)?,
                serde_json::to_string(&config.rules)?,
            ],
        )?;
        Ok(())
    }

    fn update_alarm_config(&self, config: &AlarmConfig) -> Result<()> {
        let conn = self.lock_conn();
        let updated = conn.execute(
            "UPDATE alarm_configs SET type_id = ?2, name = ?3, location = ?4,
                 sub_location = ?5, device = ?6, parameter = ?7, ack_actions = ?8, rules = ?9
             WHERE id = ?1",
            rusqlite::params![
                config.id,
                config.type_id,
                config.name,
                config.location,
                config.sub_location,
                config.device,
                config.parameter,
                serde_json::to_string(&config.ack_actions)?,
                serde_json::to_string(&config.rules)?,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "alarm_config",
                id: config.id.clone(),
            });
        }
        Ok(())
    }

    fn get_alarm_config(&self, id: &str) -> Result<Option<AlarmConfig>> {
        let conn = self.lock_conn();
        let parts = conn
            .query_row(
                "SELECT id, type_id, name, location, sub_location, device, parameter,
                     ack_actions, rules
                 FROM alarm_configs WHERE id = ?1",
                [id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                        r.get::<_, String>(6)?,
                        r.get::<_, String>(7)?,
                        r.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;
        match parts {
            Some((id, type_id, name, location, sub_location, device, parameter, actions, rules)) => {
                Ok(Some(config_from_parts(
                    id, type_id, name, location, sub_location, device, parameter, actions, rules,
                )?))
            }
            None => Ok(None),
        }
    }

    fn list_alarm_configs(&self) -> Result<Vec<(AlarmConfig, AlarmType)>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT c.id, c.type_id, c.name, c.location, c.sub_location, c.device, c.parameter,
                    c.ack_actions, c.rules,
                    t.id, t.name, t.priority, t.color, t.code, t.ack_mode
             FROM alarm_configs c JOIN alarm_types t ON t.id = c.type_id
             ORDER BY c.rowid ASC",
        )?;
        let rows = stmt.query_map([], |r| {
            let ack_mode: String = r.get(14)?;
            Ok((
                (
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, String>(7)?,
                    r.get::<_, String>(8)?,
                ),
                AlarmType {
                    id: r.get(9)?,
                    name: r.get(10)?,
                    priority: r.get(11)?,
                    color: r.get(12)?,
                    code: r.get(13)?,
                    ack_mode: ack_mode
                        .parse()
                        .unwrap_or(fabmon_common::types::AckMode::Single),
                },
            ))
        })?;
        let mut configs = Vec::new();
        for row in rows {
            let ((id, type_id, name, location, sub_location, device, parameter, actions, rules), ty) =
                row?;
            configs.push((
                config_from_parts(
                    id, type_id, name, location, sub_location, device, parameter, actions, rules,
                )?,
                ty,
            ));
        }
        Ok(configs)
    }

    fn delete_alarm_config(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let occurrences: i64 = tx.query_row(
            "SELECT COUNT(*) FROM alarm_occurrences WHERE config_id = ?1",
            [id],
            |r| r.get(0),
        )?;
        if occurrences > 0 {
            return Err(StorageError::Conflict(format!(
                "alarm config {id} has {occurrences} recorded occurrence(s)"
            )));
        }
        let deleted = tx.execute("DELETE FROM alarm_configs WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(StorageError::NotFound {
                entity: "alarm_config",
                id: id.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn count_alarm_configs(&self) -> Result<u64> {
        let conn = self.lock_conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM alarm_configs", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    fn list_ack_actions(&self) -> Result<Vec<String>> {
        let conn = self.lock_conn();
        let mut stmt =
            conn.prepare_cached("SELECT ack_actions FROM alarm_configs ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut seen = HashSet::new();
        let mut actions = Vec::new();
        for row in rows {
            let parsed: Vec<String> = serde_json::from_str(&row?).unwrap_or_default();
            for action in parsed {
                if seen.insert(action.clone()) {
                    actions.push(action);
                }
            }
        }
        Ok(actions)
    }

    fn open_occurrence(
        &self,
        config_id: &str,
        value: f64,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<OpenAttempt> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        // `seq` is AUTOINCREMENT, so the highest seq is the most recently
        // created occurrence across all configs.
        let last: Option<String> = tx
            .query_row(
                "SELECT id FROM alarm_occurrences ORDER BY seq DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        let id = ident::next_id(last.as_deref())?;
        let now_ms = ms(now);
        let inserted = tx.execute(
            "INSERT INTO alarm_occurrences (id, config_id, opened_at, open, last_value,
                 threshold_value, threshold_operator, ack_status, duration_secs, snooze,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7, 0, 0, ?3, ?3)",
            rusqlite::params![
                id,
                config_id,
                now_ms,
                value,
                rule.value,
                rule.operator,
                AckStatus::Unacknowledged.to_string()
            ],
        );
        match inserted {
            Ok(_) => {
                upsert_event_on_open(&tx, config_id, &id, now_ms)?;
                let occurrence =
                    query_occurrence(&tx, &id)?.ok_or_else(|| StorageError::NotFound {
                        entity: "alarm_occurrence",
                        id: id.clone(),
                    })?;
                tx.commit()?;
                tracing::debug!(occurrence_id = %occurrence.id, config_id, "Opened occurrence");
                Ok(OpenAttempt::Opened(occurrence))
            }
            Err(e) if is_constraint_violation(&e) => {
                // Another opener won the open slot between our evaluation
                // and this insert. Roll back and hand back the winner.
                drop(tx);
                let existing = query_open_occurrence(&conn, config_id)?.ok_or_else(|| {
                    StorageError::Conflict(format!(
                        "open slot for config {config_id} contended but no open occurrence found"
                    ))
                })?;
                Ok(OpenAttempt::OpenRace(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn refresh_occurrence(
        &self,
        occurrence_id: &str,
        value: f64,
        rule: &ThresholdRule,
        now: DateTime<Utc>,
    ) -> Result<AlarmOccurrence> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let occurrence =
            query_occurrence(&tx, occurrence_id)?.ok_or_else(|| StorageError::NotFound {
                entity: "alarm_occurrence",
                id: occurrence_id.to_string(),
            })?;
        let duration = (now - occurrence.opened_at).num_seconds().max(0);
        tx.execute(
            "UPDATE alarm_occurrences SET last_value = ?2, threshold_value = ?3,
                 threshold_operator = ?4, duration_secs = ?5, updated_at = ?6
             WHERE id = ?1",
            rusqlite::params![occurrence_id, value, rule.value, rule.operator, duration, ms(now)],
        )?;
        let updated =
            query_occurrence(&tx, occurrence_id)?.ok_or_else(|| StorageError::NotFound {
                entity: "alarm_occurrence",
                id: occurrence_id.to_string(),
            })?;
        tx.commit()?;
        Ok(updated)
    }

    fn close_occurrence(&self, occurrence_id: &str, now: DateTime<Utc>) -> Result<AlarmOccurrence> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let occurrence =
            query_occurrence(&tx, occurrence_id)?.ok_or_else(|| StorageError::NotFound {
                entity: "alarm_occurrence",
                id: occurrence_id.to_string(),
            })?;
        let duration = (now - occurrence.opened_at).num_seconds().max(0);
        tx.execute(
            "UPDATE alarm_occurrences SET open = 0, duration_secs = ?2, updated_at = ?3
             WHERE id = ?1",
            rusqlite::params![occurrence_id, duration, ms(now)],
        )?;
        tx.execute(
            "UPDATE alarm_events SET last_occurrence = ?2 WHERE config_id = ?1",
            rusqlite::params![occurrence.config_id, ms(now)],
        )?;
        let updated =
            query_occurrence(&tx, occurrence_id)?.ok_or_else(|| StorageError::NotFound {
                entity: "alarm_occurrence",
                id: occurrence_id.to_string(),
            })?;
        tx.commit()?;
        tracing::debug!(occurrence_id, duration, "Closed occurrence");
        Ok(updated)
    }

    fn find_open_occurrence(&self, config_id: &str) -> Result<Option<AlarmOccurrence>> {
        let conn = self.lock_conn();
        query_open_occurrence(&conn, config_id)
    }

    fn get_occurrence(&self, occurrence_id: &str) -> Result<Option<AlarmOccurrence>> {
        let conn = self.lock_conn();
        query_occurrence(&conn, occurrence_id)
    }

    fn list_occurrences(
        &self,
        config_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AlarmOccurrence>> {
        let conn = self.lock_conn();
        let mut occurrences = Vec::new();
        match config_id {
            Some(config_id) => {
                let sql = format!(
                    "SELECT {OCC_COLUMNS} FROM alarm_occurrences WHERE config_id = ?1
                     ORDER BY seq DESC LIMIT ?2 OFFSET ?3"
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(
                    rusqlite::params![config_id, limit as i64, offset as i64],
                    row_to_occurrence,
                )?;
                for row in rows {
                    occurrences.push(row?);
                }
            }
            None => {
                let sql = format!(
                    "SELECT {OCC_COLUMNS} FROM alarm_occurrences
                     ORDER BY seq DESC LIMIT ?1 OFFSET ?2"
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(
                    rusqlite::params![limit as i64, offset as i64],
                    row_to_occurrence,
                )?;
                for row in rows {
                    occurrences.push(row?);
                }
            }
        }
        Ok(occurrences)
    }

    fn latest_occurrence(&self, config_id: &str) -> Result<Option<AlarmOccurrence>> {
        let conn = self.lock_conn();
        let sql = format!(
            "SELECT {OCC_COLUMNS} FROM alarm_occurrences WHERE config_id = ?1
             ORDER BY seq DESC LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, [config_id], row_to_occurrence)
            .optional()?)
    }

    fn get_event(&self, config_id: &str) -> Result<Option<AlarmEvent>> {
        let conn = self.lock_conn();
        Ok(conn
            .query_row(
                "SELECT config_id, occurrence_count, acknowledged_count, first_occurrence,
                     last_occurrence, occurrence_ids
                 FROM alarm_events WHERE config_id = ?1",
                [config_id],
                row_to_event,
            )
            .optional()?)
    }

    fn list_events(&self) -> Result<Vec<AlarmEvent>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT config_id, occurrence_count, acknowledged_count, first_occurrence,
                 last_occurrence, occurrence_ids
             FROM alarm_events ORDER BY last_occurrence DESC",
        )?;
        let rows = stmt.query_map([], row_to_event)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    fn acknowledge(
        &self,
        occurrence_id: &str,
        action: &str,
        actor: &str,
        delay_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock_conn();
        let updated = conn.execute(
            "UPDATE alarm_occurrences SET ack_status = ?2, ack_action = ?3, ack_by = ?4,
                 ack_delay_secs = ?5, updated_at = ?6
             WHERE id = ?1 AND ack_status <> ?2",
            rusqlite::params![
                occurrence_id,
                AckStatus::Acknowledged.to_string(),
                action,
                actor,
                delay_secs,
                ms(now)
            ],
        )?;
        Ok(updated > 0)
    }

    fn recount_acknowledged(&self, config_id: &str) -> Result<i64> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE alarm_events SET acknowledged_count =
                 (SELECT COUNT(*) FROM alarm_occurrences
                  WHERE config_id = ?1 AND ack_status = ?2)
             WHERE config_id = ?1",
            rusqlite::params![config_id, AckStatus::Acknowledged.to_string()],
        )?;
        let count: Option<i64> = tx
            .query_row(
                "SELECT acknowledged_count FROM alarm_events WHERE config_id = ?1",
                [config_id],
                |r| r.get(0),
            )
            .optional()?;
        tx.commit()?;
        Ok(count.unwrap_or(0))
    }

    fn set_snooze(
        &self,
        occurrence_ids: &[String],
        snooze: bool,
        duration_secs: Option<i64>,
        at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let mut matched = 0;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE alarm_occurrences SET snooze = ?2, snooze_at = ?3,
                     snooze_duration_secs = ?4, updated_at = ?5
                 WHERE id = ?1",
            )?;
            for id in occurrence_ids {
                matched += stmt.execute(rusqlite::params![
                    id,
                    snooze,
                    at.map(ms),
                    duration_secs,
                    ms(now)
                ])?;
            }
        }
        tx.commit()?;
        Ok(matched)
    }
}
