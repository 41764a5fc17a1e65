// Prediction formatting: class index -> human-readable label

use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::artifact::ArtifactMetadata;
use crate::errors::{ServingError, ServingResult};
use crate::router::RouteResult;

/// Class index -> label
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMapping(BTreeMap<u32, String>);

impl ClassMapping {
    pub fn new(labels: BTreeMap<u32, String>) -> Self {
        Self(labels)
    }

    /// setosa / versicolor / virginica
    pub fn iris() -> Self {
        Self(BTreeMap::from([
            (0, "setosa".to_string()),
            (1, "versicolor".to_string()),
            (2, "virginica".to_string()),
        ]))
    }

    /// Labels from an artifact's metadata, falling back to iris
    pub fn from_metadata(metadata: Option<&ArtifactMetadata>) -> Self {
        match metadata {
            Some(meta) if !meta.labels.is_empty() => Self(meta.labels.clone()),
            _ => Self::iris(),
        }
    }

    pub fn label(&self, class: u32) -> Option<&str> {
        self.0.get(&class).map(String::as_str)
    }
}

impl Default for ClassMapping {
    fn default() -> Self {
        Self::iris()
    }
}

/// `{"model_name", "prediction"}` using the label of the first output
pub fn format_prediction(result: &RouteResult, mapping: &ClassMapping) -> ServingResult<Value> {
    let first = result
        .output
        .as_array()
        .and_then(|outputs| outputs.first())
        .ok_or_else(|| {
            ServingError::MalformedResult(format!("'{}' returned no outputs", result.name))
        })?;

    let class = first
        .as_u64()
        .and_then(|c| u32::try_from(c).ok())
        .ok_or_else(|| {
            ServingError::MalformedResult(format!("'{}' output {} is not a class index", result.name, first))
        })?;

    let label = mapping.label(class).ok_or_else(|| {
        ServingError::MalformedResult(format!("unknown class {} from '{}'", class, result.name))
    })?;

    Ok(json!({
        "model_name": result.name,
        "prediction": label,
    }))
}
