// Model factory
//
// Creates and loads model servers from route configuration

use std::sync::Arc;

use super::artifact::{ArtifactLoader, FsArtifactLoader};
use super::classifier::ClassifierModel;
use super::format::ClassMapping;
use super::kpi::Kpi;
use super::registry::ModelRegistry;
use super::server::ModelServer;
use crate::config::{Config, RouteEntry};
use crate::errors::ServingResult;
use crate::metrics::{MetricEmitter, ServingMetrics};
use crate::router::{NameMerger, ParallelRouter};

/// Create and load the model for one route entry
pub fn create_model(
    entry: &RouteEntry,
    loader: &dyn ArtifactLoader,
    metrics: &MetricEmitter,
) -> ServingResult<ClassifierModel> {
    let mut model = ClassifierModel::new(&entry.model_name, &entry.artifact)
        .with_suffix(&entry.suffix)
        .with_preprocess(entry.preprocess);

    if let Some(kpi) = &entry.kpi {
        model = model.with_kpi(Kpi::from_source(&kpi.name, &kpi.source), metrics);
    }

    model.load(loader)?;
    Ok(model)
}

/// Load every configured route into a registry and a parallel router
///
/// Any load failure is fatal: a route that cannot load is never served.
pub fn build_routes(
    config: &Config,
    emitter: &MetricEmitter,
    metrics: Arc<ServingMetrics>,
) -> ServingResult<(ModelRegistry, ParallelRouter)> {
    config.validate()?;

    let loader = FsArtifactLoader::new(&config.model_root);
    let registry = ModelRegistry::new();
    let merger = NameMerger::new().require_results(config.merge.require_results);
    let mut router = ParallelRouter::new(Box::new(merger)).with_metrics(metrics);

    for entry in &config.routes {
        let model = create_model(entry, &loader, emitter)?;
        let labels = ClassMapping::from_metadata(model.metadata());
        let model: Arc<dyn ModelServer> = Arc::new(model);

        registry.register(Arc::clone(&model), labels);
        router.add_route(&entry.key, model)?;
        tracing::info!(route = %entry.key, model = %entry.model_name, "Route ready");
    }

    Ok((registry, router))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KpiConfig, KpiSource};
    use crate::errors::ServingError;
    use crate::models::artifact::save_artifact;
    use crate::models::classifier::LinearModel;
    use tempfile::TempDir;

    fn write_model(dir: &TempDir, name: &str) {
        let model = LinearModel {
            weights: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            bias: vec![0.0, 0.0],
        };
        save_artifact(&dir.path().join(name).join("model.json"), &model, None).unwrap();
    }

    #[test]
    fn test_build_routes_from_example_config() {
        let dir = TempDir::new().unwrap();
        write_model(&dir, "champion");
        write_model(&dir, "challenger");

        let mut config = Config::example();
        config.model_root = dir.path().to_path_buf();
        config.routes[0].kpi = Some(KpiConfig {
            name: "my_kpi".to_string(),
            source: KpiSource::OutputMean,
        });

        let metrics = Arc::new(ServingMetrics::new().unwrap());
        let (registry, router) =
            build_routes(&config, &MetricEmitter::disabled(), metrics).unwrap();
        assert_eq!(registry.names(), vec!["petal_width_cm", "sepal_length_cm"]);
        assert_eq!(router.route_keys(), vec!["champion", "challenger"]);
        assert!(registry.get("sepal_length_cm").unwrap().is_ready());
    }

    #[test]
    fn test_missing_artifact_fails_startup() {
        let dir = TempDir::new().unwrap();
        write_model(&dir, "champion");

        let mut config = Config::example();
        config.model_root = dir.path().to_path_buf();

        let metrics = Arc::new(ServingMetrics::new().unwrap());
        let result = build_routes(&config, &MetricEmitter::disabled(), metrics);
        assert!(matches!(result, Err(ServingError::ArtifactNotFound(_))));
    }
}
