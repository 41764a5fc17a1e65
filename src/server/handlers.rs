// HTTP request handlers

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::ModelServingServer;
use crate::errors::ServingError;
use crate::models::format_prediction;
use crate::router::{Body, MergedOutput, RouteResult};

/// Create the main application router
pub fn create_router(server: Arc<ModelServingServer>) -> Router {
    Router::new()
        .route("/v2/models", get(list_models))
        .route("/v2/models/:name/infer", post(infer_model))
        .route("/v2/models/:name/predict", post(predict_label))
        .route("/v2/infer", post(infer_parallel))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .with_state(server)
}

/// Handle POST /v2/models/:name/infer - Single model inference
async fn infer_model(
    State(server): State<Arc<ModelServingServer>>,
    Path(name): Path<String>,
    Json(body): Json<Body>,
) -> Result<Json<RouteResult>, AppError> {
    let model = server.registry().get(&name)?;
    let request_id = Uuid::new_v4().to_string();

    let started = Instant::now();
    let outcome = model.infer(&request_id, body).await;
    server
        .metrics()
        .observe_route(&name, outcome.is_ok(), started.elapsed());

    let result = outcome?;
    tracing::info!(request_id = %request_id, model = %name, "Served prediction");
    Ok(Json(result))
}

/// Handle POST /v2/models/:name/predict - Inference with class labels
async fn predict_label(
    State(server): State<Arc<ModelServingServer>>,
    Path(name): Path<String>,
    Json(body): Json<Body>,
) -> Result<Json<serde_json::Value>, AppError> {
    let model = server.registry().get(&name)?;
    let labels = server.registry().labels(&name)?;
    let request_id = Uuid::new_v4().to_string();

    let started = Instant::now();
    let outcome = model.infer(&request_id, body).await;
    server
        .metrics()
        .observe_route(&name, outcome.is_ok(), started.elapsed());

    let result = outcome?;
    tracing::info!(request_id = %request_id, model = %name, "Served labelled prediction");
    Ok(Json(format_prediction(&result, &labels)?))
}

/// Handle POST /v2/infer - Parallel inference across all routes
async fn infer_parallel(
    State(server): State<Arc<ModelServingServer>>,
    Json(body): Json<Body>,
) -> Result<Json<MergedOutput>, AppError> {
    let merged = server.router().run(body).await?;
    Ok(Json(merged))
}

/// Loaded model description
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub ready: bool,
}

/// Model listing response
#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<ModelInfo>,
    pub routes: Vec<String>,
}

/// Handle GET /v2/models - List loaded models and parallel routes
async fn list_models(
    State(server): State<Arc<ModelServingServer>>,
) -> Result<Json<ModelList>, AppError> {
    let mut models = vec![];
    for name in server.registry().names() {
        let ready = server.registry().get(&name)?.is_ready();
        models.push(ModelInfo { name, ready });
    }

    let routes = server
        .router()
        .route_keys()
        .into_iter()
        .map(str::to_string)
        .collect();

    Ok(Json(ModelList { models, routes }))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    pub models: usize,
}

/// Handle GET /health - Health check endpoint
pub async fn health_check(
    State(server): State<Arc<ModelServingServer>>,
) -> Result<Json<HealthStatus>, AppError> {
    let status = HealthStatus {
        status: "healthy".to_string(),
        uptime_seconds: server.uptime_seconds(),
        models: server.registry().len(),
    };

    Ok(Json(status))
}

/// Handle GET /metrics - Prometheus metrics endpoint
pub async fn metrics_endpoint(
    State(server): State<Arc<ModelServingServer>>,
) -> Result<Response, AppError> {
    let body = server.metrics().render()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Application error wrapper for proper HTTP error responses
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self.0.downcast_ref::<ServingError>() {
            Some(ServingError::ModelNotFound(_)) => (StatusCode::NOT_FOUND, "model_not_found"),
            Some(err) if err.is_client_error() => (StatusCode::BAD_REQUEST, err.kind()),
            Some(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.kind()),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "api_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::warn!(error = %self.0, "Request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "message": self.0.to_string(),
                "type": error_type
            }
        });

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
