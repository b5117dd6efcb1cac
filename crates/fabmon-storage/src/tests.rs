use crate::error::StorageError;
use crate::store::SqliteAlarmStore;
use crate::{AlarmStore, OpenAttempt};
use chrono::{Duration, Utc};
use fabmon_common::types::{
    AckMode, AckStatus, AlarmConfig, AlarmType, ConditionType, RuleSet, ThresholdRule,
};
use tempfile::TempDir;

fn setup() -> (TempDir, SqliteAlarmStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteAlarmStore::open(dir.path()).unwrap();
    (dir, store)
}

fn make_type(id: &str, name: &str, priority: i32) -> AlarmType {
    AlarmType {
        id: id.to_string(),
        name: name.to_string(),
        priority,
        color: "#d32f2f".to_string(),
        code: "PRC".to_string(),
        ack_mode: AckMode::Both,
    }
}

fn make_config(id: &str, type_id: &str, parameter: &str) -> AlarmConfig {
    AlarmConfig {
        id: id.to_string(),
        type_id: type_id.to_string(),
        name: format!("config {id}"),
        location: "Plant A".to_string(),
        sub_location: "Line 1".to_string(),
        device: "Furnace".to_string(),
        parameter: parameter.to_string(),
        ack_actions: vec!["Inspected".to_string(), "Escalated".to_string()],
        rules: RuleSet {
            rules: vec![ThresholdRule {
                value: 80.0,
                operator: ">".to_string(),
            }],
            condition_type: ConditionType::FirstOnly,
            persistence_time: Some(30),
            occurs_count: None,
            occurs_within: None,
        },
    }
}

fn seed_config(store: &SqliteAlarmStore, config_id: &str) {
    store
        .insert_alarm_type(&make_type("ty-1", "Process", 1))
        .unwrap();
    store
        .insert_alarm_config(&make_config(config_id, "ty-1", "TEMP"))
        .unwrap();
}

fn rule(value: f64, operator: &str) -> ThresholdRule {
    ThresholdRule {
        value,
        operator: operator.to_string(),
    }
}

#[test]
fn config_round_trips_rule_set() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");

    let loaded = store.get_alarm_config("cfg-1").unwrap().unwrap();
    assert_eq!(loaded.parameter, "TEMP");
    assert_eq!(loaded.rules.rules[0].operator, ">");
    assert_eq!(loaded.rules.persistence_time, Some(30));

    let configs = store.list_alarm_configs().unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].1.name, "Process");
}

#[test]
fn duplicate_type_name_priority_conflicts() {
    let (_dir, store) = setup();
    store
        .insert_alarm_type(&make_type("ty-1", "Process", 1))
        .unwrap();
    let err = store
        .insert_alarm_type(&make_type("ty-2", "Process", 1))
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[test]
fn type_delete_blocked_while_referenced() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");

    let err = store.delete_alarm_type("ty-1").unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));

    store.delete_alarm_config("cfg-1").unwrap();
    store.delete_alarm_type("ty-1").unwrap();
}

#[test]
fn config_delete_blocked_while_occurrences_exist() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");
    store
        .open_occurrence("cfg-1", 85.0, &rule(80.0, ">"), Utc::now())
        .unwrap();

    let err = store.delete_alarm_config("cfg-1").unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[test]
fn open_allocates_sequential_ids_and_updates_event() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");
    let now = Utc::now();

    let first = match store.open_occurrence("cfg-1", 85.0, &rule(80.0, ">"), now).unwrap() {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };
    assert_eq!(first.id, "ALM01-001");
    assert!(first.open);
    assert_eq!(first.ack_status, AckStatus::Unacknowledged);
    assert_eq!(first.duration_secs, 0);
    assert!(!first.snooze);

    store.close_occurrence(&first.id, now + Duration::seconds(5)).unwrap();
    let second = match store
        .open_occurrence("cfg-1", 90.0, &rule(80.0, ">"), now + Duration::seconds(10))
        .unwrap()
    {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };
    assert_eq!(second.id, "ALM01-002");

    let event = store.get_event("cfg-1").unwrap().unwrap();
    assert_eq!(event.occurrence_count, 2);
    assert_eq!(event.occurrence_ids, vec!["ALM01-001", "ALM01-002"]);
    assert!(event.first_occurrence <= event.last_occurrence);
}

#[test]
fn second_open_hits_the_open_slot() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");
    let now = Utc::now();

    let first = match store.open_occurrence("cfg-1", 85.0, &rule(80.0, ">"), now).unwrap() {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };

    // A second open while the slot is held reports the race, not an error,
    // and must not bump the rollup counter.
    match store.open_occurrence("cfg-1", 99.0, &rule(80.0, ">"), now).unwrap() {
        OpenAttempt::OpenRace(existing) => assert_eq!(existing.id, first.id),
        other => panic!("expected OpenRace, got {other:?}"),
    }
    let event = store.get_event("cfg-1").unwrap().unwrap();
    assert_eq!(event.occurrence_count, 1);
}

#[test]
fn refresh_updates_value_and_duration_only() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");
    let now = Utc::now();

    let occ = match store.open_occurrence("cfg-1", 85.0, &rule(80.0, ">"), now).unwrap() {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };
    let refreshed = store
        .refresh_occurrence(&occ.id, 92.5, &rule(80.0, ">"), now + Duration::seconds(30))
        .unwrap();
    assert!(refreshed.open);
    assert_eq!(refreshed.last_value, 92.5);
    assert_eq!(refreshed.duration_secs, 30);
    assert_eq!(refreshed.ack_status, AckStatus::Unacknowledged);

    let event = store.get_event("cfg-1").unwrap().unwrap();
    assert_eq!(event.occurrence_count, 1);
}

#[test]
fn close_freezes_duration() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");
    let now = Utc::now();

    let occ = match store.open_occurrence("cfg-1", 85.0, &rule(80.0, ">"), now).unwrap() {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };
    let closed = store
        .close_occurrence(&occ.id, now + Duration::seconds(120))
        .unwrap();
    assert!(!closed.open);
    assert_eq!(closed.duration_secs, 120);
    assert!(store.find_open_occurrence("cfg-1").unwrap().is_none());
}

#[test]
fn acknowledge_is_conditional() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");
    let now = Utc::now();

    let occ = match store.open_occurrence("cfg-1", 85.0, &rule(80.0, ">"), now).unwrap() {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };

    assert!(store.acknowledge(&occ.id, "Inspected", "user-7", 42, now).unwrap());
    assert!(!store.acknowledge(&occ.id, "Inspected", "user-8", 0, now).unwrap());

    let acked = store.get_occurrence(&occ.id).unwrap().unwrap();
    assert_eq!(acked.ack_status, AckStatus::Acknowledged);
    assert_eq!(acked.ack_by.as_deref(), Some("user-7"));
    assert_eq!(acked.ack_delay_secs, Some(42));

    assert_eq!(store.recount_acknowledged("cfg-1").unwrap(), 1);
    let event = store.get_event("cfg-1").unwrap().unwrap();
    assert_eq!(event.acknowledged_count, 1);
}

#[test]
fn snooze_is_unconditional_and_counts_matches() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");
    let now = Utc::now();

    let occ = match store.open_occurrence("cfg-1", 85.0, &rule(80.0, ">"), now).unwrap() {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };
    store.close_occurrence(&occ.id, now).unwrap();

    // Closed occurrences can still be snoozed.
    let matched = store
        .set_snooze(
            &[occ.id.clone(), "ALM99-999".to_string()],
            true,
            Some(600),
            Some(now),
            now,
        )
        .unwrap();
    assert_eq!(matched, 1);

    let snoozed = store.get_occurrence(&occ.id).unwrap().unwrap();
    assert!(snoozed.snooze);
    assert_eq!(snoozed.snooze_duration_secs, Some(600));
    assert!(snoozed.snooze_at.is_some());
}

#[test]
fn ack_actions_are_deduplicated_union() {
    let (_dir, store) = setup();
    store
        .insert_alarm_type(&make_type("ty-1", "Process", 1))
        .unwrap();
    store
        .insert_alarm_config(&make_config("cfg-1", "ty-1", "TEMP"))
        .unwrap();
    let mut second = make_config("cfg-2", "ty-1", "PRESSURE");
    second.ack_actions = vec!["Escalated".to_string(), "Logged".to_string()];
    store.insert_alarm_config(&second).unwrap();

    assert_eq!(
        store.list_ack_actions().unwrap(),
        vec!["Inspected", "Escalated", "Logged"]
    );
}

#[test]
fn latest_occurrence_follows_creation_order() {
    let (_dir, store) = setup();
    seed_config(&store, "cfg-1");
    let now = Utc::now();

    let first = match store.open_occurrence("cfg-1", 85.0, &rule(80.0, ">"), now).unwrap() {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };
    store.close_occurrence(&first.id, now).unwrap();
    let second = match store
        .open_occurrence("cfg-1", 88.0, &rule(80.0, ">"), now + Duration::seconds(60))
        .unwrap()
    {
        OpenAttempt::Opened(occ) => occ,
        other => panic!("expected Opened, got {other:?}"),
    };

    let latest = store.latest_occurrence("cfg-1").unwrap().unwrap();
    assert_eq!(latest.id, second.id);

    let page = store.list_occurrences(Some("cfg-1"), 10, 0).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, second.id);
}
