//! Telemetry snapshot source.
//!
//! A snapshot is one flat map of tag name to numeric value. The HTTP
//! source enforces a request timeout and rejects payloads that are not a
//! JSON object of numbers — values are never coerced.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Transport failure or timeout talking to the telemetry endpoint.
    #[error("telemetry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The payload is not a JSON object (e.g. an array or a scalar).
    #[error("snapshot payload is not a JSON object")]
    NotAnObject,

    /// A tag carried a non-numeric value.
    #[error("snapshot tag '{tag}' is not numeric")]
    NonNumericTag { tag: String },
}

/// One telemetry snapshot: tag name → value.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    tags: HashMap<String, f64>,
}

impl Snapshot {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, SnapshotError> {
        let object = value.as_object().ok_or(SnapshotError::NotAnObject)?;
        let mut tags = HashMap::with_capacity(object.len());
        for (tag, raw) in object {
            let value = raw.as_f64().ok_or_else(|| SnapshotError::NonNumericTag {
                tag: tag.clone(),
            })?;
            tags.insert(tag.clone(), value);
        }
        Ok(Self { tags })
    }

    /// Case-insensitive exact lookup of a parameter name against the tag
    /// keys. Substring matches do not count.
    pub fn lookup(&self, parameter: &str) -> Option<f64> {
        self.tags
            .iter()
            .find(|(tag, _)| tag.eq_ignore_ascii_case(parameter))
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<(String, f64)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

/// Where poll cycles get their snapshot from. The engine holds a trait
/// object so tests can script snapshots without a live endpoint.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot, SnapshotError>;
}

/// Fetches snapshots from a remote HTTP endpoint returning a flat JSON
/// object of tag → number.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self, SnapshotError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<Snapshot, SnapshotError> {
        let payload: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Snapshot::from_json(&payload)
    }
}
