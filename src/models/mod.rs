// Model servers
// Hooks, artifact loading and the built-in linear classifier

pub mod artifact;
pub mod classifier;
pub mod factory;
pub mod format;
pub mod kpi;
pub mod registry;
pub mod server;

pub use artifact::{save_artifact, ArtifactLoader, ArtifactMetadata, FsArtifactLoader};
pub use classifier::{ClassifierModel, LinearModel};
pub use factory::{build_routes, create_model};
pub use format::{format_prediction, ClassMapping};
pub use kpi::{kpi_fn, Kpi, KpiFn};
pub use registry::ModelRegistry;
pub use server::ModelServer;
