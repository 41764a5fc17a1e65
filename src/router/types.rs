// Route result types shared by model servers, the merger and the orchestrator

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Open request/response body: field sets vary per deployment
pub type Body = Map<String, Value>;

/// Per-route prediction outcome
///
/// Serialized as `{"id", "model_name", "outputs"}`; `name` and `output`
/// are accepted as aliases when decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Request identifier shared by all routes of one fan-out
    pub id: String,

    /// Model / source name the merged output is keyed by
    #[serde(rename = "model_name", alias = "name")]
    pub name: String,

    /// Prediction payload (commonly a list of labels or class indices)
    #[serde(rename = "outputs", alias = "output")]
    pub output: Value,
}

impl RouteResult {
    pub fn new(id: impl Into<String>, name: impl Into<String>, output: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            output,
        }
    }
}

/// Route key -> outcome. Ordered by route key, which fixes the tie-break order.
pub type MergeInput = BTreeMap<String, RouteResult>;

/// Model name -> output
pub type MergedOutput = Map<String, Value>;
