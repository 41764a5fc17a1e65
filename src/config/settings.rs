// Configuration structs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::errors::{ServingError, ServingResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory relative artifact locators are resolved against
    pub model_root: PathBuf,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Merge behaviour for the parallel router
    pub merge: MergeConfig,

    /// Metric emission settings
    pub metrics: MetricsConfig,

    /// Model routes, invoked in parallel for `/v2/infer`
    pub routes: Vec<RouteEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_root: PathBuf::from("models"),
            server: ServerConfig::default(),
            merge: MergeConfig::default(),
            metrics: MetricsConfig::default(),
            routes: vec![],
        }
    }
}

impl Config {
    /// Champion/challenger layout written by `modelserve init-config`
    pub fn example() -> Self {
        Self {
            routes: vec![
                RouteEntry::new("champion", "sepal_length_cm", "champion"),
                RouteEntry::new("challenger", "petal_width_cm", "challenger"),
            ],
            ..Self::default()
        }
    }

    /// Reject route tables the router cannot serve unambiguously
    pub fn validate(&self) -> ServingResult<()> {
        let mut keys = HashSet::new();
        for route in &self.routes {
            if route.key.is_empty() {
                return Err(ServingError::InvalidConfig(
                    "route entry with an empty key".to_string(),
                ));
            }
            if route.model_name.is_empty() {
                return Err(ServingError::InvalidConfig(format!(
                    "route '{}' has an empty model_name",
                    route.key
                )));
            }
            if !keys.insert(route.key.as_str()) {
                return Err(ServingError::InvalidConfig(format!(
                    "duplicate route key '{}'",
                    route.key
                )));
            }
            if let Some(KpiConfig {
                source: KpiSource::Uniform { min, max },
                ..
            }) = &route.kpi
            {
                if !(min.is_finite() && max.is_finite() && min <= max) {
                    return Err(ServingError::InvalidConfig(format!(
                        "route '{}': uniform KPI needs finite bounds with min <= max, got [{}, {}]",
                        route.key, min, max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a route entry by key
    pub fn route(&self, key: &str) -> Option<&RouteEntry> {
        self.routes.iter().find(|r| r.key == key)
    }
}

/// Configuration for the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Allow cross-origin requests
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            cors_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Fail with EmptyInput rather than returning `{}` when no routes reported
    pub require_results: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record custom metrics at all
    pub enabled: bool,
    /// Append metric samples as JSONL under this directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_dir: Option<PathBuf>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metrics_dir: None,
        }
    }
}

/// One model route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Route key (e.g., "champion")
    pub key: String,
    /// Name reported in route results and used as the merged output key
    pub model_name: String,
    /// Artifact file or directory, relative to `model_root` unless absolute
    pub artifact: String,
    /// File suffix used to pick the artifact inside a directory
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default)]
    pub preprocess: PreprocessMode,
    /// Optional custom KPI recorded after every prediction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi: Option<KpiConfig>,
}

fn default_suffix() -> String {
    ".json".to_string()
}

impl RouteEntry {
    pub fn new(key: &str, model_name: &str, artifact: &str) -> Self {
        Self {
            key: key.to_string(),
            model_name: model_name.to_string(),
            artifact: artifact.to_string(),
            suffix: default_suffix(),
            preprocess: PreprocessMode::default(),
            kpi: None,
        }
    }
}

/// How a request body becomes model features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessMode {
    /// Use the body's `inputs` field as-is
    #[default]
    Passthrough,
    /// Flatten every body value into a single feature row
    Flatten,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiConfig {
    /// Metric name (e.g., "my_kpi")
    pub name: String,
    pub source: KpiSource,
}

/// Where a route's KPI value comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KpiSource {
    /// Uniform random sample in [min, max]; a stand-in for a real KPI
    Uniform { min: f64, max: f64 },
    /// Mean of the numeric prediction outputs
    OutputMean,
}
