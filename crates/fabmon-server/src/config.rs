use fabmon_common::types::RuleSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// CORS allowed origins; empty means allow all (development mode).
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Endpoint returning the current telemetry snapshot as a flat JSON
    /// object of tag name to number.
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,
    #[serde(default = "default_snapshot_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Run poll cycles on a timer in addition to the HTTP trigger.
    #[serde(default = "default_poll_enabled")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

// ---- Seed file types (used by the `init-alarms` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub alarm_types: Vec<SeedAlarmType>,
    #[serde(default)]
    pub alarm_configs: Vec<SeedAlarmConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAlarmType {
    pub name: String,
    pub priority: i32,
    #[serde(default = "default_seed_color")]
    pub color: String,
    pub code: String,
    #[serde(default = "default_seed_ack_mode")]
    pub ack_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAlarmConfig {
    /// Name of an alarm type from this file or already in the store.
    pub type_name: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub sub_location: String,
    pub device: String,
    pub parameter: String,
    #[serde(default)]
    pub ack_actions: Vec<String>,
    pub rules: RuleSet,
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_snapshot_url() -> String {
    "http://127.0.0.1:8090/v1/snapshot".to_string()
}

fn default_snapshot_timeout_secs() -> u64 {
    5
}

fn default_poll_enabled() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_seed_color() -> String {
    "#d32f2f".to_string()
}

fn default_seed_ack_mode() -> String {
    "Both".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            snapshot_url: default_snapshot_url(),
            timeout_secs: default_snapshot_timeout_secs(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            enabled: default_poll_enabled(),
            interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gets_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.database.data_dir, "data");
        assert_eq!(config.telemetry.timeout_secs, 5);
        assert!(config.poll.enabled);
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn sections_override_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            http_port = 9000
            [telemetry]
            snapshot_url = "http://historian:9999/live"
            [poll]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.telemetry.snapshot_url, "http://historian:9999/live");
        assert_eq!(config.telemetry.timeout_secs, 5);
        assert!(!config.poll.enabled);
    }

    #[test]
    fn seed_file_defaults_apply() {
        let seed: SeedFile = serde_json::from_str(
            r#"{
                "alarm_types": [{"name": "Process", "priority": 1, "code": "PRC"}],
                "alarm_configs": [{
                    "type_name": "Process",
                    "name": "Furnace temperature",
                    "location": "Plant A",
                    "device": "Furnace",
                    "parameter": "TEMP",
                    "rules": {"rules": [{"value": 80.0, "operator": ">"}]}
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(seed.alarm_types[0].ack_mode, "Both");
        assert_eq!(seed.alarm_configs[0].sub_location, "");
        assert!(seed.alarm_configs[0].ack_actions.is_empty());
    }
}
