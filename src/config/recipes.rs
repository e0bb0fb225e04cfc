//! # Recipe Catalog
//!
//! Versioned mapping from target type to the generator and ordered enhancer
//! chain that processes it. The catalog is read from a YAML document once at
//! startup and validated eagerly:
//!
//! ```yaml
//! apiVersion: v1
//! recipes:
//!   - type: RPM
//!     generator:
//!       name: cyclonedx-maven-plugin
//!       version: 2.7.9
//!       options:
//!         outputFormat: json
//!     enhancers:
//!       - name: rpm-enhancer
//!         version: 1.0.0
//! ```

use super::error::{ConfigResult, ConfigurationError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Option maps accept any YAML scalar and store its string form, so
/// `includeSystemScope: true` and `includeSystemScope: "true"` are equivalent.
fn deserialize_scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut options = BTreeMap::new();

    for (key, value) in raw.unwrap_or_default() {
        let rendered = match value {
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            _ => {
                return Err(D::Error::custom(format!(
                    "option '{key}' must be a scalar value"
                )))
            }
        };
        options.insert(key, rendered);
    }

    Ok(options)
}

/// Root of the recipe configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeCatalog {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub recipes: Vec<RecipeConfig>,
}

/// Recipe for a single target type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeConfig {
    #[serde(rename = "type", default)]
    pub target_type: String,
    pub generator: Option<ToolConfig>,
    #[serde(default)]
    pub enhancers: Vec<ToolConfig>,
}

/// Generator or enhancer descriptor as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    pub options: BTreeMap<String, String>,
}

impl RecipeCatalog {
    /// Parse a catalog from YAML text. `source` names the origin for error messages.
    pub fn from_yaml_str(contents: &str, source: &str) -> ConfigResult<Self> {
        serde_yaml::from_str(contents).map_err(|e| ConfigurationError::invalid_yaml(source, e))
    }

    /// Read and parse a catalog file
    pub fn load_from_path(path: &Path) -> ConfigResult<Self> {
        if !path.is_file() {
            return Err(ConfigurationError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        let catalog = Self::from_yaml_str(&contents, &path.display().to_string())?;
        debug!(
            path = %path.display(),
            recipe_count = catalog.recipes.len(),
            "Parsed recipe catalog"
        );
        Ok(catalog)
    }

    /// Validate structure and make sure every required target type has a recipe
    pub fn validate(&self, required_target_types: &[String]) -> ConfigResult<()> {
        if self.api_version.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "apiVersion",
                "recipe catalog",
            ));
        }

        if self.recipes.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "recipes",
                "recipe catalog",
            ));
        }

        let mut seen = HashSet::new();
        for recipe in &self.recipes {
            if recipe.target_type.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "type",
                    "recipe entry",
                ));
            }

            if !seen.insert(normalize_target_type(&recipe.target_type)) {
                return Err(ConfigurationError::DuplicateRecipe {
                    target_type: recipe.target_type.clone(),
                });
            }

            let context = format!("recipe '{}'", recipe.target_type);
            let generator = recipe
                .generator
                .as_ref()
                .ok_or_else(|| ConfigurationError::missing_required_field("generator", &context))?;
            generator.validate("generator", &context)?;

            for (index, enhancer) in recipe.enhancers.iter().enumerate() {
                enhancer.validate(&format!("enhancers[{index}]"), &context)?;
            }
        }

        for required in required_target_types {
            if !seen.contains(&normalize_target_type(required)) {
                return Err(ConfigurationError::MissingRecipe {
                    target_type: required.clone(),
                });
            }
        }

        Ok(())
    }

    /// Case-insensitive recipe lookup
    pub fn recipe_for(&self, target_type: &str) -> Option<&RecipeConfig> {
        let wanted = normalize_target_type(target_type);
        self.recipes
            .iter()
            .find(|recipe| normalize_target_type(&recipe.target_type) == wanted)
    }

    /// Configured target types in declaration order
    pub fn target_types(&self) -> Vec<&str> {
        self.recipes
            .iter()
            .map(|recipe| recipe.target_type.as_str())
            .collect()
    }
}

impl ToolConfig {
    fn validate(&self, field: &str, context: &str) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                format!("{field}.name"),
                context,
            ));
        }
        if self.version.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                format!("{field}.version"),
                context,
            ));
        }
        Ok(())
    }
}

/// Lookup key for a target type
pub fn normalize_target_type(target_type: &str) -> String {
    target_type.trim().to_ascii_uppercase()
}
