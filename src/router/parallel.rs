// Parallel route orchestration
//
// Every registered route receives the same request body; once all routes
// have finished, their results are merged exactly once.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::merger::{Merger, NameMerger};
use super::types::{Body, MergeInput, MergedOutput, RouteResult};
use crate::errors::{ServingError, ServingResult};
use crate::metrics::{hash_body, ServingMetrics};
use crate::models::ModelServer;

/// One parallel branch (e.g., "champion" or "challenger")
#[derive(Clone)]
pub struct Route {
    pub key: String,
    pub server: Arc<dyn ModelServer>,
}

/// Fans a request out to all routes and merges their results
pub struct ParallelRouter {
    routes: Vec<Route>,
    merger: Box<dyn Merger>,
    metrics: Option<Arc<ServingMetrics>>,
}

impl ParallelRouter {
    pub fn new(merger: Box<dyn Merger>) -> Self {
        Self {
            routes: vec![],
            merger,
            metrics: None,
        }
    }

    /// Record per-route outcomes and latency
    pub fn with_metrics(mut self, metrics: Arc<ServingMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a route; keys must be unique
    pub fn add_route(
        &mut self,
        key: impl Into<String>,
        server: Arc<dyn ModelServer>,
    ) -> ServingResult<()> {
        let key = key.into();
        if self.routes.iter().any(|r| r.key == key) {
            return Err(ServingError::InvalidConfig(format!(
                "duplicate route key '{}'",
                key
            )));
        }
        self.routes.push(Route { key, server });
        Ok(())
    }

    pub fn route_keys(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.key.as_str()).collect()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Invoke all routes and return the merged result
    pub async fn run(&self, body: Body) -> ServingResult<MergedOutput> {
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let results = self.collect(&request_id, &body).await?;
        let merged = self.merger.merge(&body, &results)?;

        tracing::info!(
            request_id = %request_id,
            body_hash = %hash_body(&body),
            routes = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Merged parallel routes"
        );
        Ok(merged)
    }

    /// Invoke all routes concurrently and collect their results by route key
    ///
    /// Fails with the error of the lowest failing route key if any route fails.
    pub async fn collect(&self, request_id: &str, body: &Body) -> ServingResult<MergeInput> {
        let tasks = self.routes.iter().map(|route| {
            let key = route.key.clone();
            let server = Arc::clone(&route.server);
            let body = body.clone();
            let request_id = request_id.to_string();
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                let started = Instant::now();
                let outcome = server.infer(&request_id, body).await;
                if let Some(metrics) = &metrics {
                    metrics.observe_route(&key, outcome.is_ok(), started.elapsed());
                }
                outcome
            })
        });

        let keys: Vec<String> = self.routes.iter().map(|r| r.key.clone()).collect();
        let joined = join_all(tasks).await;

        let mut results = MergeInput::new();
        let mut failures: Vec<(String, ServingError)> = vec![];
        for (key, joined) in keys.into_iter().zip(joined) {
            let outcome: ServingResult<RouteResult> = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(ServingError::RouteAborted {
                    route: key.clone(),
                    reason: e.to_string(),
                }),
            };
            match outcome {
                Ok(result) => {
                    results.insert(key, result);
                }
                Err(e) => {
                    tracing::warn!(request_id = %request_id, route = %key, error = %e, "Route failed");
                    failures.push((key, e));
                }
            }
        }

        if let Some((_, err)) = failures.into_iter().min_by(|a, b| a.0.cmp(&b.0)) {
            return Err(err);
        }
        Ok(results)
    }
}

impl Default for ParallelRouter {
    fn default() -> Self {
        Self::new(Box::new(NameMerger::new()))
    }
}
