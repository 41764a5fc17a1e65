// Metrics module
// Custom KPI emission and Prometheus exposition

mod emitter;
mod registry;
mod types;

pub use emitter::{spawn_telemetry, MetricEmitter};
pub use registry::ServingMetrics;
pub use types::{hash_body, MetricRecord};
