//! Alarm catalog seeding: built-in alarm types on first start, and a
//! JSON seed file loaded by the `init-alarms` subcommand.

use crate::config::SeedFile;
use fabmon_common::types::{AckMode, AlarmConfig, AlarmType};
use fabmon_storage::AlarmStore;
use std::collections::HashMap;

/// Built-in alarm type definitions for first-time startup.
struct TypeDef {
    name: &'static str,
    priority: i32,
    color: &'static str,
    code: &'static str,
    ack_mode: AckMode,
}

const DEFAULT_TYPES: &[TypeDef] = &[
    TypeDef {
        name: "Critical",
        priority: 1,
        color: "#d32f2f",
        code: "CRT",
        ack_mode: AckMode::Single,
    },
    TypeDef {
        name: "Warning",
        priority: 2,
        color: "#f57c00",
        code: "WRN",
        ack_mode: AckMode::Both,
    },
    TypeDef {
        name: "Advisory",
        priority: 3,
        color: "#1976d2",
        code: "ADV",
        ack_mode: AckMode::Both,
    },
];

/// Initialize built-in alarm types if the store has none yet.
///
/// Only seeds when the type table is empty, so seed files and manual
/// inserts take priority.
pub fn init_default_types(store: &dyn AlarmStore) -> anyhow::Result<usize> {
    let existing = store.list_alarm_types()?;
    if !existing.is_empty() {
        tracing::debug!(
            existing = existing.len(),
            "Alarm types already exist, skipping seed initialization"
        );
        return Ok(0);
    }

    let mut inserted = 0usize;
    for def in DEFAULT_TYPES {
        let ty = AlarmType {
            id: uuid::Uuid::new_v4().to_string(),
            name: def.name.to_string(),
            priority: def.priority,
            color: def.color.to_string(),
            code: def.code.to_string(),
            ack_mode: def.ack_mode,
        };
        match store.insert_alarm_type(&ty) {
            Ok(()) => {
                inserted += 1;
                tracing::info!(name = %def.name, code = %def.code, "Seeded alarm type");
            }
            Err(e) => {
                tracing::warn!(name = %def.name, error = %e, "Failed to seed alarm type");
            }
        }
    }

    tracing::info!(inserted, total = DEFAULT_TYPES.len(), "Default alarm types initialized");
    Ok(inserted)
}

/// Load alarm types and configurations from a JSON seed file. Entries
/// whose name already exists in the store are skipped. Config entries
/// reference their type by name, resolved against both the file and the
/// store.
pub fn init_from_seed_file(store: &dyn AlarmStore, seed_path: &str) -> anyhow::Result<()> {
    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: SeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    apply_seed(store, &seed)
}

pub fn apply_seed(store: &dyn AlarmStore, seed: &SeedFile) -> anyhow::Result<()> {
    let mut type_ids: HashMap<String, String> = store
        .list_alarm_types()?
        .into_iter()
        .map(|ty| (ty.name.clone(), ty.id))
        .collect();

    let mut types_created = 0u32;
    let mut types_skipped = 0u32;
    for ty in &seed.alarm_types {
        if type_ids.contains_key(&ty.name) {
            tracing::warn!(name = %ty.name, "Alarm type already exists, skipping");
            types_skipped += 1;
            continue;
        }
        let ack_mode: AckMode = ty
            .ack_mode
            .parse()
            .map_err(|e| anyhow::anyhow!("Alarm type '{}': {}", ty.name, e))?;
        let row = AlarmType {
            id: uuid::Uuid::new_v4().to_string(),
            name: ty.name.clone(),
            priority: ty.priority,
            color: ty.color.clone(),
            code: ty.code.clone(),
            ack_mode,
        };
        match store.insert_alarm_type(&row) {
            Ok(()) => {
                tracing::info!(name = %ty.name, id = %row.id, "Alarm type created");
                type_ids.insert(row.name.clone(), row.id.clone());
                types_created += 1;
            }
            Err(e) => {
                tracing::error!(name = %ty.name, error = %e, "Failed to create alarm type");
            }
        }
    }

    let existing_config_names: std::collections::HashSet<String> = store
        .list_alarm_configs()?
        .into_iter()
        .map(|(config, _)| config.name)
        .collect();

    let mut configs_created = 0u32;
    let mut configs_skipped = 0u32;
    for config in &seed.alarm_configs {
        if existing_config_names.contains(&config.name) {
            tracing::warn!(name = %config.name, "Alarm config already exists, skipping");
            configs_skipped += 1;
            continue;
        }
        let Some(type_id) = type_ids.get(&config.type_name) else {
            tracing::error!(
                name = %config.name,
                type_name = %config.type_name,
                "Unknown alarm type for config, skipping"
            );
            continue;
        };
        let row = AlarmConfig {
            id: uuid::Uuid::new_v4().to_string(),
            type_id: type_id.clone(),
            name: config.name.clone(),
            location: config.location.clone(),
            sub_location: config.sub_location.clone(),
            device: config.device.clone(),
            parameter: config.parameter.clone(),
            ack_actions: config.ack_actions.clone(),
            rules: config.rules.clone(),
        };
        match store.insert_alarm_config(&row) {
            Ok(()) => {
                tracing::info!(name = %config.name, id = %row.id, "Alarm config created");
                configs_created += 1;
            }
            Err(e) => {
                tracing::error!(name = %config.name, error = %e, "Failed to create alarm config");
            }
        }
    }

    tracing::info!(
        types_created,
        types_skipped,
        configs_created,
        configs_skipped,
        "init-alarms completed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabmon_storage::store::SqliteAlarmStore;

    fn seed_fixture() -> SeedFile {
        serde_json::from_str(
            r#"{
                "alarm_types": [
                    {"name": "Process", "priority": 1, "code": "PRC"}
                ],
                "alarm_configs": [
                    {
                        "type_name": "Process",
                        "name": "Furnace temperature",
                        "location": "Plant A",
                        "device": "Furnace",
                        "parameter": "TEMP",
                        "rules": {"rules": [{"value": 80.0, "operator": ">"}]}
                    },
                    {
                        "type_name": "Ghost",
                        "name": "Dangling config",
                        "location": "Plant A",
                        "device": "Pump",
                        "parameter": "FLOW",
                        "rules": {"rules": []}
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn apply_seed_round_trips_and_skips_unknown_types() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        apply_seed(&store, &seed_fixture()).unwrap();

        let types = store.list_alarm_types().unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].code, "PRC");

        let configs = store.list_alarm_configs().unwrap();
        assert_eq!(configs.len(), 1);
        let (config, ty) = &configs[0];
        assert_eq!(config.parameter, "TEMP");
        assert_eq!(config.type_id, ty.id);
        assert_eq!(config.rules.rules[0].operator, ">");
    }

    #[test]
    fn apply_seed_is_idempotent_by_name() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        let seed = seed_fixture();
        apply_seed(&store, &seed).unwrap();
        apply_seed(&store, &seed).unwrap();
        assert_eq!(store.list_alarm_types().unwrap().len(), 1);
        assert_eq!(store.list_alarm_configs().unwrap().len(), 1);
    }

    #[test]
    fn default_types_seed_only_into_an_empty_store() {
        let store = SqliteAlarmStore::open_in_memory().unwrap();
        assert_eq!(init_default_types(&store).unwrap(), DEFAULT_TYPES.len());
        assert_eq!(init_default_types(&store).unwrap(), 0);
    }
}
