// Metrics data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::router::Body;

/// One custom metric sample, as appended to metrics.jsonl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    /// Model that emitted the sample, if scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub name: String,
    pub value: f64,
}

impl MetricRecord {
    pub fn new(model: Option<String>, name: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            model,
            name: name.into(),
            value,
        }
    }
}

/// Stable short hash of a request body, for correlating log lines
pub fn hash_body(body: &Body) -> String {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}
