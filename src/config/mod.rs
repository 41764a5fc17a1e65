// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{default_config_path, load_config, write_config, CONFIG_ENV};
pub use settings::{
    Config, KpiConfig, KpiSource, MergeConfig, MetricsConfig, PreprocessMode, RouteEntry,
    ServerConfig,
};
