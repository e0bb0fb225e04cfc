//! # Orchestrator Configuration
//!
//! Two configuration sources are loaded once, at process start:
//!
//! - **Service settings** ([`OrchestratorConfig`]): database connection and the
//!   location of the recipe catalog, layered from an optional TOML file and
//!   `SBOM_ORCHESTRATOR__*` environment variables.
//! - **Recipe catalog** ([`RecipeCatalog`]): the versioned target-type to
//!   generator/enhancer mapping, read from YAML.
//!
//! Both are validated eagerly. A process must not serve traffic with an invalid
//! or missing recipe catalog, so every failure here is fatal.
//!
//! ```rust,no_run
//! use sbom_orchestrator::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let rpm = manager.recipes().recipe_for("rpm");
//! println!("database: {}", manager.config().database.url);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;
pub mod recipes;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;
pub use recipes::{normalize_target_type, RecipeCatalog, RecipeConfig, ToolConfig};

/// Root service settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Deployment environment name (development, test, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Database connection and pooling configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Recipe catalog location and deployment requirements
    #[serde(default)]
    pub recipes: RecipeSourceConfig,
}

/// Database connection and pooling configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

/// Where the recipe catalog lives and which target types it must cover
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecipeSourceConfig {
    pub path: PathBuf,
    /// Target types this deployment intends to accept
    pub required_target_types: Vec<String>,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            database: DatabaseConfig::default(),
            recipes: RecipeSourceConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/sbom_orchestrator_development".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

impl Default for RecipeSourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/recipes.yaml"),
            required_target_types: vec!["CONTAINER_IMAGE".to_string(), "RPM".to_string()],
        }
    }
}

impl OrchestratorConfig {
    /// Validate settings that do not depend on other files
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "database.url",
                "orchestrator settings",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "pool must allow at least one connection",
            ));
        }
        if self.recipes.path.as_os_str().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "recipes.path",
                "orchestrator settings",
            ));
        }
        Ok(())
    }
}
