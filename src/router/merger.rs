// Result merging for parallel routes
//
// Duplicate names resolve last-write-wins in ascending route-key order.

use serde_json::Value;

use super::types::{Body, MergeInput, MergedOutput, RouteResult};
use crate::errors::{ServingError, ServingResult};

/// Combines the outcomes of all routes of one request into a single body
pub trait Merger: Send + Sync {
    /// Merge collected route results. `body` is the request body as received.
    fn merge(&self, body: &Body, results: &MergeInput) -> ServingResult<MergedOutput>;
}

/// Default merger: keys each output by the route's model name
#[derive(Debug, Clone, Default)]
pub struct NameMerger {
    require_results: bool,
}

impl NameMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with `EmptyInput` instead of returning `{}` when no routes reported
    pub fn require_results(mut self, require: bool) -> Self {
        self.require_results = require;
        self
    }
}

impl Merger for NameMerger {
    fn merge(&self, _body: &Body, results: &MergeInput) -> ServingResult<MergedOutput> {
        if self.require_results && results.is_empty() {
            return Err(ServingError::EmptyInput);
        }
        merge(results)
    }
}

/// Map each route result's name to its output
pub fn merge(results: &MergeInput) -> ServingResult<MergedOutput> {
    tracing::debug!(routes = results.len(), input = ?results, "Merger in");

    let mut merged = MergedOutput::new();
    for (key, result) in results {
        if result.name.is_empty() {
            return Err(ServingError::MalformedResult(format!(
                "route '{}' reported an empty model name",
                key
            )));
        }
        if merged
            .insert(result.name.clone(), result.output.clone())
            .is_some()
        {
            tracing::warn!(
                route = %key,
                model_name = %result.name,
                "Duplicate model name, keeping the later route's output"
            );
        }
    }

    tracing::debug!(output = ?merged, "Merger out");
    Ok(merged)
}

/// Merge raw route outcomes as they arrive over the wire
///
/// Each entry must be an object with `name`/`model_name` and
/// `output`/`outputs`; `id` is optional here.
pub fn merge_value(results: &Value) -> ServingResult<MergedOutput> {
    merge(&parse_results(results)?)
}

/// Decode raw route outcomes into a `MergeInput` keyed by route key
pub fn parse_results(results: &Value) -> ServingResult<MergeInput> {
    let entries = results.as_object().ok_or_else(|| {
        ServingError::MalformedResult("route results must be a JSON object".to_string())
    })?;

    let mut input = MergeInput::new();
    for (key, entry) in entries {
        input.insert(key.clone(), parse_route_result(key, entry)?);
    }
    Ok(input)
}

fn parse_route_result(key: &str, entry: &Value) -> ServingResult<RouteResult> {
    let fields = entry.as_object().ok_or_else(|| {
        ServingError::MalformedResult(format!("route '{}' is not an object", key))
    })?;

    let name = fields
        .get("model_name")
        .or_else(|| fields.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ServingError::MalformedResult(format!("route '{}' is missing a model name", key))
        })?;

    let output = fields
        .get("outputs")
        .or_else(|| fields.get("output"))
        .ok_or_else(|| {
            ServingError::MalformedResult(format!("route '{}' is missing outputs", key))
        })?;

    let id = match fields.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };

    Ok(RouteResult::new(id, name, output.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(entries: &[(&str, &str, Value)]) -> MergeInput {
        entries
            .iter()
            .map(|(key, name, output)| {
                (key.to_string(), RouteResult::new("1", *name, output.clone()))
            })
            .collect()
    }

    #[test]
    fn test_distinct_names_are_kept() {
        let results = input(&[
            ("champion", "sepal_length_cm", json!([0, 2])),
            ("challenger", "petal_width_cm", json!([0, 2])),
        ]);
        let merged = merge(&results).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["sepal_length_cm"], json!([0, 2]));
        assert_eq!(merged["petal_width_cm"], json!([0, 2]));
    }

    #[test]
    fn test_duplicate_name_last_route_key_wins() {
        let results = input(&[("b", "m", json!([2])), ("a", "m", json!([1]))]);
        let merged = merge(&results).unwrap();
        assert_eq!(Value::Object(merged), json!({"m": [2]}));
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        assert!(merge(&MergeInput::new()).unwrap().is_empty());
    }

    #[test]
    fn test_require_results_rejects_empty_input() {
        let merger = NameMerger::new().require_results(true);
        let err = merger.merge(&Body::new(), &MergeInput::new()).unwrap_err();
        assert!(matches!(err, ServingError::EmptyInput));
    }

    #[test]
    fn test_empty_name_is_malformed() {
        let results = input(&[("a", "", json!([1]))]);
        assert!(matches!(
            merge(&results),
            Err(ServingError::MalformedResult(_))
        ));
    }

    #[test]
    fn test_merge_value_requires_name() {
        let raw = json!({"a": {"id": "1", "outputs": [1]}});
        let err = merge_value(&raw).unwrap_err();
        assert!(err.to_string().contains("missing a model name"));
    }

    #[test]
    fn test_merge_value_requires_outputs() {
        let raw = json!({"a": {"id": "1", "model_name": "m"}});
        assert!(matches!(
            merge_value(&raw),
            Err(ServingError::MalformedResult(_))
        ));
    }
}
