//! Configuration Loader
//!
//! Assembles [`OrchestratorConfig`] from an optional settings file and the
//! environment, then loads and validates the recipe catalog it points at.
//!
//! Environment variables use the `SBOM_ORCHESTRATOR` prefix with `__` as the
//! nesting separator, e.g. `SBOM_ORCHESTRATOR__DATABASE__URL` or
//! `SBOM_ORCHESTRATOR__RECIPES__REQUIRED_TARGET_TYPES=RPM,CONTAINER_IMAGE`.

use super::error::ConfigResult;
use super::{OrchestratorConfig, RecipeCatalog};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "SBOM_ORCHESTRATOR";
const SETTINGS_PATH_VAR: &str = "SBOM_ORCHESTRATOR_CONFIG";
const DEFAULT_SETTINGS_PATH: &str = "config/orchestrator.toml";

/// Loaded, validated configuration shared by the process
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: OrchestratorConfig,
    recipes: RecipeCatalog,
    settings_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `SBOM_ORCHESTRATOR_CONFIG` or the default settings path
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        match std::env::var(SETTINGS_PATH_VAR) {
            Ok(path) => Self::load_from_file(Some(Path::new(&path))),
            Err(_) => Self::load_from_file(None),
        }
    }

    /// Load configuration from an explicit settings file.
    ///
    /// With `None` the default path is consulted but may be absent, in which
    /// case defaults plus environment overrides apply.
    pub fn load_from_file(settings_path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let config = Self::load_settings(settings_path)?;
        let recipes = RecipeCatalog::load_from_path(&config.recipes.path)?;
        let manager = Self::from_parts(config, recipes)?;

        Ok(Arc::new(ConfigManager {
            settings_path: settings_path.map(Path::to_path_buf),
            ..manager
        }))
    }

    /// Validate already-materialised settings and catalog together
    pub fn from_parts(config: OrchestratorConfig, recipes: RecipeCatalog) -> ConfigResult<ConfigManager> {
        config.validate()?;
        recipes.validate(&config.recipes.required_target_types)?;

        info!(
            environment = %config.environment,
            api_version = %recipes.api_version,
            recipe_count = recipes.recipes.len(),
            target_types = ?recipes.target_types(),
            "Loaded recipe configuration"
        );

        Ok(ConfigManager {
            config,
            recipes,
            settings_path: None,
        })
    }

    /// Resolve service settings alone, without loading the catalog
    pub fn load_settings(settings_path: Option<&Path>) -> ConfigResult<OrchestratorConfig> {
        let file_source = match settings_path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::from(Path::new(DEFAULT_SETTINGS_PATH)).required(false),
        };

        let settings = ::config::Config::builder()
            .add_source(file_source)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("recipes.required_target_types"),
            )
            .build()?;

        let config: OrchestratorConfig = settings.try_deserialize()?;
        debug!(
            settings_path = ?settings_path,
            recipes_path = %config.recipes.path.display(),
            "Resolved orchestrator settings"
        );
        Ok(config)
    }

    /// Get the loaded service settings
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Get the validated recipe catalog
    pub fn recipes(&self) -> &RecipeCatalog {
        &self.recipes
    }

    /// Settings file this manager was loaded from, if any
    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }
}
