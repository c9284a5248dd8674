//! Configuration Loader
//!
//! Environment-aware loading: built-in defaults, then an optional TOML file,
//! then `TRAVERSAL_*` environment variables. The merged result is validated
//! before it is handed out.

use super::ActorsConfig;
use crate::constants::system::{ENV_NESTING_SEPARATOR, ENV_PREFIX};
use crate::error::Result;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Environment variable naming the file to load when none is given
pub const CONFIG_PATH_VAR: &str = "TRAVERSAL_CONFIG_PATH";

#[derive(Debug)]
pub struct ConfigManager {
    config: ActorsConfig,
    environment: String,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load with environment auto-detection; the file comes from
    /// `TRAVERSAL_CONFIG_PATH` when set
    pub fn load() -> Result<Arc<ConfigManager>> {
        Self::load_from_file(env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from))
    }

    pub fn load_from_file(path: Option<PathBuf>) -> Result<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_with_env(path, &environment)
    }

    /// Load with an explicit environment name
    pub fn load_with_env(path: Option<PathBuf>, environment: &str) -> Result<Arc<ConfigManager>> {
        Self::build(path, environment, Self::environment_source(None))
    }

    /// Load with a fixed set of override variables instead of the process
    /// environment. Useful in tests.
    pub fn load_with_overrides(
        path: Option<PathBuf>,
        environment: &str,
        overrides: HashMap<String, String>,
    ) -> Result<Arc<ConfigManager>> {
        Self::build(path, environment, Self::environment_source(Some(overrides)))
    }

    fn environment_source(overrides: Option<HashMap<String, String>>) -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_NESTING_SEPARATOR)
            .try_parsing(true)
            .source(overrides)
    }

    fn build(
        path: Option<PathBuf>,
        environment: &str,
        overrides: Environment,
    ) -> Result<Arc<ConfigManager>> {
        debug!(
            "Loading configuration for environment '{}' from {}",
            environment,
            path.as_deref()
                .map(Path::display)
                .map(|p| p.to_string())
                .unwrap_or_else(|| "defaults".to_string())
        );

        let mut builder = Config::builder().add_source(Config::try_from(&ActorsConfig::default())?);
        if let Some(path) = &path {
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        let config: ActorsConfig = builder.add_source(overrides).build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            system_name = %config.system_name,
            batch_size = config.mailbox.batch_size,
            timeout_ms = ?config.job.timeout_ms,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            source: path,
        }))
    }

    pub fn config(&self) -> &ActorsConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The file this configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn detect_environment() -> String {
        env::var("TRAVERSAL_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
