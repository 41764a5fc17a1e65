// Linear classifier model server
//
// Artifact format: {"weights": [[f64; n_features]; n_classes], "bias": [f64; n_classes]}.
// Predictions are argmax(X · Wᵀ + b) per input row.

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::artifact::{read_json, ArtifactLoader, ArtifactMetadata};
use super::kpi::Kpi;
use super::server::ModelServer;
use crate::config::PreprocessMode;
use crate::errors::{ServingError, ServingResult};
use crate::metrics::MetricEmitter;
use crate::router::Body;

/// Serialized form of a linear classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

/// Weights ready for inference
#[derive(Debug, Clone)]
struct LoadedModel {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl TryFrom<LinearModel> for LoadedModel {
    type Error = String;

    fn try_from(model: LinearModel) -> Result<Self, Self::Error> {
        let n_classes = model.weights.len();
        if n_classes == 0 {
            return Err("model has no classes".to_string());
        }
        if model.bias.len() != n_classes {
            return Err(format!(
                "bias has {} entries for {} classes",
                model.bias.len(),
                n_classes
            ));
        }
        let n_features = model.weights[0].len();
        if model.weights.iter().any(|row| row.len() != n_features) {
            return Err("weight rows have different lengths".to_string());
        }

        let flat: Vec<f64> = model.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((n_classes, n_features), flat)
            .map_err(|e| e.to_string())?;
        Ok(Self {
            weights,
            bias: Array1::from(model.bias),
        })
    }
}

impl LoadedModel {
    fn n_features(&self) -> usize {
        self.weights.ncols()
    }

    fn predict(&self, features: &Array2<f64>) -> Vec<usize> {
        let scores = features.dot(&self.weights.t()) + &self.bias;
        scores
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (idx, &score)| {
                        if score > best.1 {
                            (idx, score)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect()
    }
}

/// Classifier served from a JSON linear-model artifact
pub struct ClassifierModel {
    name: String,
    artifact: String,
    suffix: String,
    preprocess: PreprocessMode,
    model: Option<LoadedModel>,
    metadata: Option<ArtifactMetadata>,
    kpi: Option<Kpi>,
    metrics: MetricEmitter,
}

impl ClassifierModel {
    pub fn new(name: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact: artifact.into(),
            suffix: ".json".to_string(),
            preprocess: PreprocessMode::default(),
            model: None,
            metadata: None,
            kpi: None,
            metrics: MetricEmitter::disabled(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_preprocess(mut self, mode: PreprocessMode) -> Self {
        self.preprocess = mode;
        self
    }

    /// Record `kpi` through `metrics` after every prediction
    pub fn with_kpi(mut self, kpi: Kpi, metrics: &MetricEmitter) -> Self {
        self.kpi = Some(kpi);
        self.metrics = metrics.for_model(&self.name);
        self
    }

    /// Metadata sidecar found at load time, if any
    pub fn metadata(&self) -> Option<&ArtifactMetadata> {
        self.metadata.as_ref()
    }

    fn loaded(&self) -> ServingResult<&LoadedModel> {
        self.model.as_ref().ok_or_else(|| {
            ServingError::PredictionError(format!("model '{}' is not loaded", self.name))
        })
    }
}

/// Convert `inputs` into a 2-D feature matrix
fn feature_matrix(inputs: &Value, n_features: usize) -> ServingResult<Array2<f64>> {
    let rows = inputs
        .as_array()
        .ok_or_else(|| ServingError::PredictionError("'inputs' must be a list of rows".into()))?;

    let mut flat = Vec::with_capacity(rows.len() * n_features);
    for (idx, row) in rows.iter().enumerate() {
        let row = row.as_array().ok_or_else(|| {
            ServingError::PredictionError(format!("input row {} is not a list", idx))
        })?;
        if row.len() != n_features {
            return Err(ServingError::PredictionError(format!(
                "input row {} has {} features, model expects {}",
                idx,
                row.len(),
                n_features
            )));
        }
        for value in row {
            flat.push(value.as_f64().ok_or_else(|| {
                ServingError::PredictionError(format!("input row {} has a non-numeric value", idx))
            })?);
        }
    }

    Array2::from_shape_vec((rows.len(), n_features), flat)
        .map_err(|e| ServingError::PredictionError(e.to_string()))
}

#[async_trait]
impl ModelServer for ClassifierModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self, loader: &dyn ArtifactLoader) -> ServingResult<()> {
        let (model_file, metadata) = loader.get_model(&self.artifact, &self.suffix)?;
        let linear: LinearModel = read_json(&model_file)?;
        let loaded = LoadedModel::try_from(linear).map_err(|reason| {
            ServingError::DeserializationError {
                path: model_file.clone(),
                source: serde::de::Error::custom(reason),
            }
        })?;

        tracing::info!(
            model = %self.name,
            file = %model_file.display(),
            classes = loaded.weights.nrows(),
            features = loaded.n_features(),
            "Loaded model"
        );
        self.model = Some(loaded);
        self.metadata = metadata;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    fn preprocess(&self, mut body: Body) -> ServingResult<Body> {
        if self.preprocess == PreprocessMode::Flatten {
            let row: Vec<Value> = body
                .iter()
                .filter(|(key, _)| key.as_str() != "inputs")
                .map(|(_, value)| value.clone())
                .collect();
            body.insert("inputs".to_string(), Value::Array(vec![Value::Array(row)]));
        }
        Ok(body)
    }

    async fn predict(&self, body: &Body) -> ServingResult<Vec<Value>> {
        let model = self.loaded()?;
        let inputs = body
            .get("inputs")
            .ok_or_else(|| ServingError::PredictionError("missing 'inputs'".into()))?;
        let features = feature_matrix(inputs, model.n_features())?;

        let outputs: Vec<Value> = model
            .predict(&features)
            .into_iter()
            .map(|class| Value::from(class as u64))
            .collect();

        if let Some(kpi) = &self.kpi {
            if let Some(value) = (kpi.compute)(body, &outputs) {
                self.metrics.emit(&kpi.name, value);
            }
        }

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KpiSource;
    use crate::metrics::{spawn_telemetry, ServingMetrics};
    use crate::models::artifact::{save_artifact, FsArtifactLoader};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Three classes over two features; each class wins on its own axis
    fn fixture() -> LinearModel {
        LinearModel {
            weights: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, -1.0]],
            bias: vec![0.0, 0.0, 0.5],
        }
    }

    fn loaded_classifier(dir: &TempDir, mode: PreprocessMode) -> ClassifierModel {
        save_artifact(&dir.path().join("iris.json"), &fixture(), None).unwrap();
        let mut model = ClassifierModel::new("iris", "iris.json").with_preprocess(mode);
        model.load(&FsArtifactLoader::new(dir.path())).unwrap();
        model
    }

    #[tokio::test]
    async fn test_argmax_per_row() {
        let dir = TempDir::new().unwrap();
        let model = loaded_classifier(&dir, PreprocessMode::Passthrough);
        let body = json!({"inputs": [[3.0, 1.0], [0.5, 2.0], [0.0, 0.0]]});
        let outputs = model.predict(body.as_object().unwrap()).await.unwrap();
        assert_eq!(outputs, vec![json!(0), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_flatten_builds_single_row() {
        let dir = TempDir::new().unwrap();
        let model = loaded_classifier(&dir, PreprocessMode::Flatten);
        let body = json!({"sepal_length": 0.1, "sepal_width": 4.0});
        let result = model
            .infer("req-1", body.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(result.output, json!([1]));
    }

    #[tokio::test]
    async fn test_wrong_feature_count_is_prediction_error() {
        let dir = TempDir::new().unwrap();
        let model = loaded_classifier(&dir, PreprocessMode::Passthrough);
        let body = json!({"inputs": [[1.0, 2.0, 3.0]]});
        let err = model.predict(body.as_object().unwrap()).await.unwrap_err();
        assert!(matches!(err, ServingError::PredictionError(_)));
    }

    #[tokio::test]
    async fn test_unloaded_model_is_not_ready() {
        let model = ClassifierModel::new("iris", "iris.json");
        assert!(!model.is_ready());
        let body = json!({"inputs": [[1.0, 2.0]]});
        assert!(model.predict(body.as_object().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn test_each_prediction_emits_kpi() {
        let dir = TempDir::new().unwrap();
        save_artifact(&dir.path().join("iris.json"), &fixture(), None).unwrap();
        let sink = dir.path().join("telemetry");

        let metrics = Arc::new(ServingMetrics::new().unwrap());
        let (emitter, worker) = spawn_telemetry(Arc::clone(&metrics), Some(sink.clone()));
        let mut model = ClassifierModel::new("iris", "iris.json").with_kpi(
            Kpi::from_source("mean_class", &KpiSource::OutputMean),
            &emitter,
        );
        model.load(&FsArtifactLoader::new(dir.path())).unwrap();

        let first = json!({"inputs": [[3.0, 1.0]]});
        model
            .infer("req-1", first.as_object().unwrap().clone())
            .await
            .unwrap();
        let second = json!({"inputs": [[3.0, 1.0], [0.5, 2.0], [0.0, 0.0]]});
        let result = model
            .infer("req-2", second.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(result.output, json!([0, 1, 2]));

        drop(model);
        drop(emitter);
        worker.await.unwrap();

        assert_eq!(metrics.custom_value(Some("iris"), "mean_class"), 1.0);
        let samples = std::fs::read_to_string(sink.join("metrics.jsonl")).unwrap();
        assert_eq!(samples.lines().count(), 2);
    }

    #[test]
    fn test_ragged_weights_rejected() {
        let model = LinearModel {
            weights: vec![vec![1.0, 0.0], vec![1.0]],
            bias: vec![0.0, 0.0],
        };
        assert!(LoadedModel::try_from(model).is_err());
    }

    #[test]
    fn test_non_json_artifact_is_deserialization_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("iris.json"), "not a model").unwrap();
        let mut model = ClassifierModel::new("iris", "iris.json");
        let err = model.load(&FsArtifactLoader::new(dir.path())).unwrap_err();
        assert!(matches!(err, ServingError::DeserializationError { .. }));
    }
}
