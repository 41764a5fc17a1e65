// Custom KPI sources evaluated after each prediction

use rand::Rng;
use serde_json::Value;
use std::sync::Arc;

use crate::config::KpiSource;
use crate::router::Body;

/// Computes a KPI from the request body and the prediction outputs
pub type KpiFn = Arc<dyn Fn(&Body, &[Value]) -> Option<f64> + Send + Sync>;

/// A named KPI attached to a model
#[derive(Clone)]
pub struct Kpi {
    pub name: String,
    pub compute: KpiFn,
}

impl Kpi {
    pub fn new(name: impl Into<String>, compute: KpiFn) -> Self {
        Self {
            name: name.into(),
            compute,
        }
    }

    pub fn from_source(name: impl Into<String>, source: &KpiSource) -> Self {
        Self::new(name, kpi_fn(source))
    }
}

impl std::fmt::Debug for Kpi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kpi").field("name", &self.name).finish()
    }
}

/// Build the compute function for a configured source
pub fn kpi_fn(source: &KpiSource) -> KpiFn {
    match *source {
        KpiSource::Uniform { min, max } => {
            Arc::new(move |_, _| Some(rand::thread_rng().gen_range(min..=max)))
        }
        KpiSource::OutputMean => Arc::new(|_, outputs| {
            let values: Vec<f64> = outputs.iter().filter_map(Value::as_f64).collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        }),
    }
}
