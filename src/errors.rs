// Error types and user-friendly error messages
//
// ServingError is the typed error raised at the serving seams (merge, load,
// predict). The helpers below turn startup failures into actionable messages.

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;

/// Errors raised by the serving core
#[derive(Debug, thiserror::Error)]
pub enum ServingError {
    /// A route result is missing its name or output
    #[error("malformed route result: {0}")]
    MalformedResult(String),

    /// The merger was configured to require at least one route result
    #[error("no route results to merge")]
    EmptyInput,

    /// No artifact exists at the given locator
    #[error("model artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    /// The artifact exists but could not be read
    #[error("failed to read model artifact {}: {source}", .path.display())]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact (or its metadata sidecar) could not be decoded
    #[error("failed to deserialize {}: {source}", .path.display())]
    DeserializationError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The model rejected the feature input
    #[error("prediction failed: {0}")]
    PredictionError(String),

    /// The request body did not pass validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No model registered under this name
    #[error("model '{0}' not found")]
    ModelNotFound(String),

    /// A route task panicked or was cancelled before reporting
    #[error("route '{route}' aborted: {reason}")]
    RouteAborted { route: String, reason: String },

    /// Route or server configuration is inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServingError {
    /// Short machine-readable kind, used in HTTP error bodies and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            ServingError::MalformedResult(_) => "malformed_result",
            ServingError::EmptyInput => "empty_input",
            ServingError::ArtifactNotFound(_) => "artifact_not_found",
            ServingError::ArtifactIo { .. } => "artifact_io",
            ServingError::DeserializationError { .. } => "deserialization_error",
            ServingError::PredictionError(_) => "prediction_error",
            ServingError::InvalidRequest(_) => "invalid_request",
            ServingError::ModelNotFound(_) => "model_not_found",
            ServingError::RouteAborted { .. } => "route_aborted",
            ServingError::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Whether the caller (not the server) is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServingError::MalformedResult(_)
                | ServingError::EmptyInput
                | ServingError::PredictionError(_)
                | ServingError::InvalidRequest(_)
                | ServingError::ModelNotFound(_)
        )
    }
}

/// Result alias for the serving core
pub type ServingResult<T> = std::result::Result<T, ServingError>;

/// Wrap an error with user-friendly context
pub trait UserFriendlyError {
    /// Add user-friendly context to this error
    fn user_context(self, message: &str) -> Self;

    /// Add user-friendly context with a suggestion
    fn user_context_with_suggestion(self, problem: &str, suggestion: &str) -> Self;
}

impl<T> UserFriendlyError for Result<T> {
    fn user_context(self, message: &str) -> Self {
        self.with_context(|| message.to_string())
    }

    fn user_context_with_suggestion(self, problem: &str, suggestion: &str) -> Self {
        self.with_context(|| {
            format!("{}\n\n\x1b[1;33mSuggestion:\x1b[0m {}", problem, suggestion)
        })
    }
}

/// Format a missing artifact error with helpful suggestions
pub fn artifact_not_found_error(locator: &str) -> String {
    format!(
        "Model artifact not found: {}\n\n\
        \x1b[1;33mPossible causes:\x1b[0m\n\
        • Artifact path is relative to a different model root\n\
        • Directory contains no file with the configured suffix\n\
        • Artifact was never exported\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. List the model directory:\n\
           \x1b[36mls -la {}\x1b[0m\n\n\
        2. Check the route entry in your config:\n\
           \x1b[36mcat ~/.modelserve/config.toml\x1b[0m",
        locator, locator
    )
}

/// Format a config parse error with helpful suggestions
pub fn config_parse_error(error: &str) -> String {
    format!(
        "Failed to parse config file\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check config file syntax:\n\
           \x1b[36mcat ~/.modelserve/config.toml\x1b[0m\n\n\
        2. Regenerate a default config:\n\
           \x1b[36mmodelserve init-config\x1b[0m\n\n\
        3. Common mistakes:\n\
           • Missing quotes around strings\n\
           • [[routes]] entries without a key\n\
           • Unknown preprocess mode (use \"passthrough\" or \"flatten\")",
        error
    )
}

/// Format a model loading error with helpful suggestions
pub fn model_loading_error(model_name: &str, error: &str) -> String {
    format!(
        "Failed to load model '{}'\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;33mPossible causes:\x1b[0m\n\
        • Artifact is not a JSON linear model (weights + bias)\n\
        • Weight rows have different lengths\n\
        • Metadata sidecar is malformed",
        model_name, error
    )
}

/// Wrap a generic error with suggestions
pub fn wrap_error_with_suggestion(error: impl fmt::Display, suggestion: &str) -> String {
    format!(
        "{}\n\n\
        \x1b[1;33mSuggestion:\x1b[0m {}",
        error, suggestion
    )
}
