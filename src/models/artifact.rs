// Model artifact retrieval
//
// An artifact is a serialized model file plus an optional `<stem>.meta.json`
// sidecar holding auxiliary metadata.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::{ServingError, ServingResult};

const META_SUFFIX: &str = ".meta.json";

/// Metadata saved alongside a model artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Model type identifier (e.g., "linear_classifier")
    #[serde(default)]
    pub model_type: Option<String>,
    /// Class index -> label
    #[serde(default)]
    pub labels: BTreeMap<u32, String>,
    /// Feature names in column order
    #[serde(default)]
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    /// Anything else the exporter attached
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_format_version() -> u32 {
    1
}

/// Resolves artifact locators to model files
pub trait ArtifactLoader: Send + Sync {
    /// Locate the model file for `locator`, picking the first file ending in
    /// `suffix` when the locator is a directory.
    fn get_model(
        &self,
        locator: &str,
        suffix: &str,
    ) -> ServingResult<(PathBuf, Option<ArtifactMetadata>)>;
}

/// Loads artifacts from a local model directory
#[derive(Debug, Clone)]
pub struct FsArtifactLoader {
    root: PathBuf,
}

impl FsArtifactLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        let path = Path::new(locator);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ArtifactLoader for FsArtifactLoader {
    fn get_model(
        &self,
        locator: &str,
        suffix: &str,
    ) -> ServingResult<(PathBuf, Option<ArtifactMetadata>)> {
        let path = self.resolve(locator);

        let model_file = if path.is_file() {
            path
        } else if path.is_dir() {
            find_by_suffix(&path, suffix).ok_or(ServingError::ArtifactNotFound(path))?
        } else {
            return Err(ServingError::ArtifactNotFound(path));
        };

        let meta_path = metadata_path(&model_file);
        let metadata = if meta_path.is_file() {
            Some(read_json::<ArtifactMetadata>(&meta_path)?)
        } else {
            None
        };

        tracing::debug!(
            locator = %locator,
            file = %model_file.display(),
            has_metadata = metadata.is_some(),
            "Resolved model artifact"
        );
        Ok((model_file, metadata))
    }
}

fn find_by_suffix(dir: &Path, suffix: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .find(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.ends_with(suffix) && !name.ends_with(META_SUFFIX)
        })
}

/// `<dir>/<stem>.meta.json` for `<dir>/<stem>.<ext>`
pub fn metadata_path(model_file: &Path) -> PathBuf {
    let stem = model_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model");
    model_file.with_file_name(format!("{}{}", stem, META_SUFFIX))
}

/// Read and decode a JSON artifact file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> ServingResult<T> {
    let contents = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ServingError::ArtifactNotFound(path.to_path_buf()),
        _ => ServingError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        },
    })?;
    serde_json::from_str(&contents).map_err(|source| ServingError::DeserializationError {
        path: path.to_path_buf(),
        source,
    })
}

/// Save a model artifact with optional metadata
///
/// Creates `path` and, when metadata is given, `<stem>.meta.json` next to it.
pub fn save_artifact<T: Serialize>(
    path: &Path,
    model: &T,
    metadata: Option<&ArtifactMetadata>,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(model).context("Failed to serialize model")?;
    fs::write(path, json).with_context(|| format!("Failed to write model to {:?}", path))?;

    if let Some(metadata) = metadata {
        let meta_path = metadata_path(path);
        let json = serde_json::to_string_pretty(metadata)
            .context("Failed to serialize model metadata")?;
        fs::write(&meta_path, json)
            .with_context(|| format!("Failed to write metadata to {:?}", meta_path))?;
    }

    tracing::info!(path = %path.display(), "Saved model artifact");
    Ok(())
}
