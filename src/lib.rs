// modelserve - model serving with parallel champion/challenger routes
// Library exports

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models; // Model server hooks, artifacts, classifier
pub mod router; // Parallel fan-out and result merging
pub mod server; // HTTP front

pub use errors::{ServingError, ServingResult};
pub use router::{merge, Body, MergeInput, MergedOutput, RouteResult};
