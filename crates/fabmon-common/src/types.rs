use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How occurrences of an alarm type may be acknowledged: individually, or
/// both individually and through the bulk path.
///
/// # Examples
///
/// ```
/// use fabmon_common::types::AckMode;
///
/// let mode: AckMode = "Both".parse().unwrap();
/// assert_eq!(mode, AckMode::Both);
/// assert_eq!(mode.to_string(), "Both");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckMode {
    Single,
    Both,
}

impl std::fmt::Display for AckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AckMode::Single => write!(f, "Single"),
            AckMode::Both => write!(f, "Both"),
        }
    }
}

impl std::str::FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Single" => Ok(AckMode::Single),
            "Both" => Ok(AckMode::Both),
            _ => Err(format!("unknown acknowledgment mode: {s}")),
        }
    }
}

/// Acknowledgment state of a single occurrence. An occurrence starts
/// `Unacknowledged` and can only move forward to `Acknowledged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckStatus {
    Unacknowledged,
    Acknowledged,
}

impl std::fmt::Display for AckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AckStatus::Unacknowledged => write!(f, "Unacknowledged"),
            AckStatus::Acknowledged => write!(f, "Acknowledged"),
        }
    }
}

impl std::str::FromStr for AckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unacknowledged" => Ok(AckStatus::Unacknowledged),
            "Acknowledged" => Ok(AckStatus::Acknowledged),
            _ => Err(format!("unknown acknowledgment status: {s}")),
        }
    }
}

/// Boolean combinator for a rule set, stored in its wire form (`"&&"`,
/// `"||"`, or the empty string meaning "first rule only").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    #[serde(rename = "&&")]
    All,
    #[serde(rename = "||")]
    Any,
    #[default]
    #[serde(rename = "")]
    FirstOnly,
}

/// A single comparison threshold. The operator is kept as the persisted
/// string; an operator that does not parse to a known comparison never
/// matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub value: f64,
    pub operator: String,
}

/// An ordered list of threshold rules owned by exactly one [`AlarmConfig`].
///
/// The debounce fields (`persistence_time`, `occurs_count`, `occurs_within`)
/// are persisted round-trip but not consulted by evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<ThresholdRule>,
    #[serde(default)]
    pub condition_type: ConditionType,
    #[serde(default)]
    pub persistence_time: Option<i64>,
    #[serde(default)]
    pub occurs_count: Option<i64>,
    #[serde(default)]
    pub occurs_within: Option<i64>,
}

/// Alarm category metadata. `(name, priority)` is unique; deletion is
/// blocked while any configuration references the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmType {
    pub id: String,
    pub name: String,
    pub priority: i32,
    pub color: String,
    pub code: String,
    pub ack_mode: AckMode,
}

/// A monitored point: a (location, device, parameter) triple bound to an
/// alarm type and a rule set. `parameter` is matched case-insensitively
/// against telemetry tag names, exact match only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmConfig {
    pub id: String,
    pub type_id: String,
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

/// One continuous episode of an alarm condition being true for a config.
///
/// At most one occurrence per config may have `open = true` at any time;
/// the storage layer enforces this with a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmOccurrence {
    /// Sequential human-readable id, `ALM{major:02}-{minor:03}`.
    pub id: String,
    pub config_id: String,
    pub opened_at: DateTime<Utc>,
    pub open: bool,
    /// Most recently observed value while the occurrence was breaching.
    pub last_value: f64,
    pub threshold_value: f64,
    pub threshold_operator: String,
    pub ack_status: AckStatus,
    pub ack_by: Option<String>,
    pub ack_action: Option<String>,
    /// Seconds from open to acknowledgment (0 on the bulk path).
    pub ack_delay_secs: Option<i64>,
    /// Seconds the occurrence has been (or was, once closed) in breach.
    pub duration_secs: i64,
    pub snooze: bool,
    pub snooze_at: Option<DateTime<Utc>>,
    pub snooze_duration_secs: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-config rollup of all occurrences, created lazily on first trigger
/// and never deleted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub config_id: String,
    pub occurrence_count: i64,
    /// Count of acknowledged occurrences, always recomputed by full
    /// recount rather than incremented.
    pub acknowledged_count: i64,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    /// Ordered set of occurrence ids belonging to this event.
    pub occurrence_ids: Vec<String>,
}

/// One currently-firing alarm as reported by a poll cycle, flattened for
/// display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmResult {
    pub occurrence_id: String,
    pub ack_status: AckStatus,
    pub config_id: String,
    pub config_name: String,
    pub location: String,
    pub sub_location: String,
    pub device: String,
    pub parameter: String,
    pub value: f64,
    pub threshold_value: f64,
    pub threshold_operator: String,
    pub snooze: bool,
    pub snooze_at: Option<DateTime<Utc>>,
    pub type_name: String,
    pub type_priority: i32,
    pub type_color: String,
    pub type_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_type_round_trips_wire_strings() {
        assert_eq!(
            serde_json::to_string(&ConditionType::All).unwrap(),
            "\"&&\""
        );
        assert_eq!(
            serde_json::from_str::<ConditionType>("\"||\"").unwrap(),
            ConditionType::Any
        );
        assert_eq!(
            serde_json::from_str::<ConditionType>("\"\"").unwrap(),
            ConditionType::FirstOnly
        );
    }

    #[test]
    fn rule_set_defaults_apply() {
        let rs: RuleSet =
            serde_json::from_str(r#"{"rules":[{"value":80.0,"operator":">"}]}"#).unwrap();
        assert_eq!(rs.condition_type, ConditionType::FirstOnly);
        assert_eq!(rs.persistence_time, None);
        assert_eq!(rs.rules.len(), 1);
    }
}
