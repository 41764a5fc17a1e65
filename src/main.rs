// modelserve - model serving runtime
// Main entry point

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

use modelserve::config::{default_config_path, load_config, write_config, Config};
use modelserve::errors::{
    artifact_not_found_error, model_loading_error, wrap_error_with_suggestion, ServingError,
    UserFriendlyError,
};
use modelserve::metrics::{spawn_telemetry, MetricEmitter, ServingMetrics};
use modelserve::models::{
    build_routes, create_model, format_prediction, ClassMapping, FsArtifactLoader, ModelServer,
};
use modelserve::router::{parse_results, Body, Merger, NameMerger};
use modelserve::server::ModelServingServer;

#[derive(Parser, Debug)]
#[command(name = "modelserve")]
#[command(about = "Model serving with parallel champion/challenger routes", version)]
struct Args {
    /// Config file (default: $MODELSERVE_CONFIG or ~/.modelserve/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the HTTP model server
    Serve {
        /// Bind address (overrides server.bind_address)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run a single route on a JSON body and print its result
    Predict {
        /// Route key from the config
        #[arg(long)]
        route: String,
        /// Request body, e.g. '{"inputs": [[5.1, 3.5, 1.4, 0.2]]}'
        #[arg(long)]
        body: String,
        /// Print the class label instead of the raw route result
        #[arg(long)]
        label: bool,
    },
    /// Merge route results read from stdin and print the merged output
    Merge,
    /// Write a champion/challenger config template
    InitConfig {
        /// Destination (default: ~/.modelserve/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    match args.command {
        Command::Serve { bind } => run_serve(args.config, bind).await,
        Command::Predict { route, body, label } => {
            run_predict(args.config, &route, &body, label).await
        }
        Command::Merge => run_merge(args.config),
        Command::InitConfig { path, force } => run_init_config(path, force),
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Turn load-time failures into actionable messages
fn startup_error(err: ServingError) -> anyhow::Error {
    match err {
        ServingError::ArtifactNotFound(path) => {
            anyhow!(artifact_not_found_error(&path.display().to_string()))
        }
        ServingError::DeserializationError { path, source } => anyhow!(model_loading_error(
            &path.display().to_string(),
            &source.to_string()
        )),
        ServingError::ArtifactIo { path, source } => anyhow!(model_loading_error(
            &path.display().to_string(),
            &source.to_string()
        )),
        other => anyhow!(other),
    }
}

async fn run_serve(config_path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }
    if config.routes.is_empty() {
        tracing::warn!("No routes configured; only /health and /metrics will respond usefully");
    }

    let metrics = Arc::new(ServingMetrics::new()?);
    let emitter = if config.metrics.enabled {
        let (emitter, _worker) =
            spawn_telemetry(Arc::clone(&metrics), config.metrics.metrics_dir.clone());
        emitter
    } else {
        MetricEmitter::disabled()
    };

    let (registry, router) =
        build_routes(&config, &emitter, Arc::clone(&metrics)).map_err(startup_error)?;

    ModelServingServer::new(config.server.clone(), registry, router, metrics)
        .serve()
        .await
        .user_context_with_suggestion(
            "Model server exited with an error",
            "check that the bind address is free and valid",
        )
}

async fn run_predict(
    config_path: Option<PathBuf>,
    route: &str,
    body: &str,
    label: bool,
) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let entry = config.route(route).ok_or_else(|| {
        anyhow!(wrap_error_with_suggestion(
            format!("Unknown route '{}'", route),
            &format!("configured routes: {:?}", route_keys(&config)),
        ))
    })?;

    let loader = FsArtifactLoader::new(&config.model_root);
    let model =
        create_model(entry, &loader, &MetricEmitter::disabled()).map_err(startup_error)?;

    let body: Body = serde_json::from_str(body).context("Request body must be a JSON object")?;
    let request_id = uuid::Uuid::new_v4().to_string();
    let result = model.infer(&request_id, body).await?;

    let output = if label {
        let mapping = ClassMapping::from_metadata(model.metadata());
        format_prediction(&result, &mapping)?
    } else {
        serde_json::to_value(&result)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_merge(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let merger = NameMerger::new().require_results(config.merge.require_results);

    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read route results from stdin")?;

    let results: serde_json::Value =
        serde_json::from_str(&input).context("Route results must be JSON")?;
    let merged = merger.merge(&Body::new(), &parse_results(&results)?)?;
    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(())
}

fn run_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => default_config_path().context("Could not determine home directory")?,
    };
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    write_config(&Config::example(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn route_keys(config: &Config) -> Vec<&str> {
    config.routes.iter().map(|r| r.key.as_str()).collect()
}
