//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > CLI > defaults

mod app;
mod builder;
mod env;
mod file;

pub use app::{AppConfig, AppConfigHolder, ServerSettings};
pub use builder::{AdminBootstrap, Config, ConfigBuilder, ProviderSettings, TelemetryConfig};

use crate::Result;

/// Load configuration with precedence: env > file > defaults
pub fn load_config() -> Result<ConfigBuilder> {
    load_config_onto(ConfigBuilder::new())
}

/// Layer file and environment settings over an existing builder (CLI values)
pub fn load_config_onto(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    // Load from config file if exists
    if let Some(path) = file::find_config_file() {
        tracing::info!("Loading configuration from {}", path.display());
        builder = file::load_from_file(&path, builder)?;
    }

    // Override with environment variables
    env::load_from_env(builder)
}

/// Load configuration from a specific file path
pub fn load_config_from_path(path: &std::path::Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let builder = file::load_from_file(path, builder)?;
    env::load_from_env(builder)
}
