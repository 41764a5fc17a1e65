// Model server hooks
//
// A model server implements only the hooks it needs; `infer` drives the
// pipeline: preprocess -> validate -> predict -> postprocess.

use async_trait::async_trait;
use serde_json::Value;

use super::artifact::ArtifactLoader;
use crate::errors::{ServingError, ServingResult};
use crate::router::{Body, RouteResult};

/// Trait for servable models
///
/// Models are immutable after `load` and shared across concurrent requests,
/// hence Send + Sync.
#[async_trait]
pub trait ModelServer: Send + Sync {
    /// Name reported in route results (e.g., "sepal_length_cm")
    fn name(&self) -> &str;

    /// Load and initialize the model and any auxiliary state
    fn load(&mut self, _loader: &dyn ArtifactLoader) -> ServingResult<()> {
        Ok(())
    }

    /// Whether `load` has completed successfully
    fn is_ready(&self) -> bool {
        true
    }

    /// Reshape the request body before validation and prediction
    fn preprocess(&self, body: Body) -> ServingResult<Body> {
        Ok(body)
    }

    /// Check the (preprocessed) body; the default requires an `inputs` field
    fn validate(&self, body: Body) -> ServingResult<Body> {
        if !body.contains_key("inputs") {
            return Err(ServingError::InvalidRequest(
                "request body is missing 'inputs'".to_string(),
            ));
        }
        Ok(body)
    }

    /// Generate predictions for the body's features
    async fn predict(&self, body: &Body) -> ServingResult<Vec<Value>>;

    /// Adjust raw predictions before they are returned
    fn postprocess(&self, outputs: Vec<Value>) -> ServingResult<Vec<Value>> {
        Ok(outputs)
    }

    /// Run the full hook pipeline for one request
    async fn infer(&self, request_id: &str, body: Body) -> ServingResult<RouteResult> {
        let body = self.preprocess(body)?;
        let body = self.validate(body)?;
        let outputs = self.predict(&body).await?;
        let outputs = self.postprocess(outputs)?;
        Ok(RouteResult::new(
            request_id,
            self.name(),
            Value::Array(outputs),
        ))
    }
}
