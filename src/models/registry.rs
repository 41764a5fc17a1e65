// Loaded model registry shared by HTTP handlers

use dashmap::DashMap;
use std::sync::Arc;

use super::format::ClassMapping;
use super::server::ModelServer;
use crate::errors::{ServingError, ServingResult};

struct Entry {
    server: Arc<dyn ModelServer>,
    labels: ClassMapping,
}

/// Concurrent name -> model map
#[derive(Default)]
pub struct ModelRegistry {
    models: DashMap<String, Entry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded model under its own name, replacing any previous one
    pub fn register(&self, server: Arc<dyn ModelServer>, labels: ClassMapping) {
        let name = server.name().to_string();
        if self
            .models
            .insert(name.clone(), Entry { server, labels })
            .is_some()
        {
            tracing::warn!(model = %name, "Replaced registered model");
        }
    }

    pub fn get(&self, name: &str) -> ServingResult<Arc<dyn ModelServer>> {
        self.models
            .get(name)
            .map(|entry| Arc::clone(&entry.server))
            .ok_or_else(|| ServingError::ModelNotFound(name.to_string()))
    }

    /// Class labels for a registered model
    pub fn labels(&self, name: &str) -> ServingResult<ClassMapping> {
        self.models
            .get(name)
            .map(|entry| entry.labels.clone())
            .ok_or_else(|| ServingError::ModelNotFound(name.to_string()))
    }

    /// Registered model names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
