use std::fs;
use std::path::Path;

use log::debug;
use thiserror::Error;

// Re-export types
pub use self::types::{
    Config, GenerationBounds, ResetBehavior, ResetSettings, SenderType, SerializerType,
    SimulationSettings, TransportConfig,
};
mod types;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

// --- Loading ---

/// Reads configuration files. The format follows the file extension:
/// `.toml` for TOML, `.json` (or none) for JSON.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        debug!("Parsing config {} (extension {:?})", path.display(), extension);

        match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") | None => Self::from_json_str(&content),
            Some(other) => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Config, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Rejects settings the engine cannot run with. Generation bounds are not
    /// checked here: the generator clamps them.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let simulation = &config.simulation;
        if !(simulation.fixed_delta_time > 0.0) {
            return Err(ConfigError::Validation(
                "Fixed delta time must be greater than 0".to_string(),
            ));
        }
        if !(simulation.time_scale >= 0.0) {
            return Err(ConfigError::Validation("Time scale cannot be negative".to_string()));
        }
        if !(simulation.particle_radius >= 0.0) {
            return Err(ConfigError::Validation(
                "Particle radius cannot be negative".to_string(),
            ));
        }
        if !(simulation.field_radius > 0.0) {
            return Err(ConfigError::Validation(
                "Field radius must be greater than 0".to_string(),
            ));
        }
        if simulation.max_substeps == 0 {
            return Err(ConfigError::Validation(
                "Max substeps must be greater than 0".to_string(),
            ));
        }

        if !(config.reset.reset_time >= 0.0) {
            return Err(ConfigError::Validation("Reset time cannot be negative".to_string()));
        }

        if config.transport.output_frequency == 0 {
            return Err(ConfigError::Validation(
                "Output frequency must be greater than 0".to_string(),
            ));
        }
        if config.transport.sender == SenderType::File && config.transport.output_path.is_none() {
            return Err(ConfigError::Validation(
                "File sender requires an output_path".to_string(),
            ));
        }

        Ok(())
    }
}

/// Loads and validates a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let config = ConfigLoader::from_file(path)?;
    ConfigLoader::validate(&config)?;
    Ok(config)
}
