//! # Recipe Resolver
//!
//! Maps a target type to its [`Recipe`]. The resolver is a lookup table keyed
//! by normalised (trimmed, upper-cased) target type, built once from the
//! validated recipe catalog. Resolution is pure: the same input always yields
//! a structurally identical recipe.

use crate::config::{normalize_target_type, RecipeCatalog};
use crate::error::{OrchestratorError, Result};
use crate::models::Recipe;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct RecipeResolver {
    recipes: HashMap<String, Recipe>,
}

impl RecipeResolver {
    /// Build from a catalog that has already passed validation
    pub fn from_catalog(catalog: &RecipeCatalog) -> Result<Self> {
        let mut recipes = HashMap::with_capacity(catalog.recipes.len());
        for config in &catalog.recipes {
            let recipe = Recipe::from_config(config).ok_or_else(|| {
                OrchestratorError::ConfigurationInvalid(format!(
                    "recipe '{}' has no generator",
                    config.target_type
                ))
            })?;
            recipes.insert(normalize_target_type(&config.target_type), recipe);
        }

        debug!(recipe_count = recipes.len(), "Recipe resolver ready");
        Ok(Self { recipes })
    }

    /// Case-insensitive lookup. Empty and unconfigured types are `UnknownTargetType`.
    pub fn resolve(&self, target_type: &str) -> Result<Recipe> {
        let key = normalize_target_type(target_type);
        if key.is_empty() {
            return Err(OrchestratorError::UnknownTargetType(String::new()));
        }
        self.recipes
            .get(&key)
            .cloned()
            .ok_or(OrchestratorError::UnknownTargetType(key))
    }

    pub fn supports(&self, target_type: &str) -> bool {
        self.recipes.contains_key(&normalize_target_type(target_type))
    }

    /// Configured target types, sorted
    pub fn target_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.recipes.keys().cloned().collect();
        types.sort();
        types
    }
}
