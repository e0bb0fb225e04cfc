//! Recipe values. A recipe is never persisted on its own: it is resolved from
//! configuration when a generation is created and reconstructed from the
//! persisted generation and its enhancements when work is dispatched again.

use crate::config::{RecipeConfig, ToolConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generator or enhancer descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

pub type GeneratorSpec = ToolSpec;
pub type EnhancerSpec = ToolSpec;

impl ToolSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl From<&ToolConfig> for ToolSpec {
    fn from(config: &ToolConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            options: config.options.clone(),
        }
    }
}

/// Generator plus ordered enhancer chain for one target type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub generator: GeneratorSpec,
    /// Execution order; position is the enhancement index
    #[serde(default)]
    pub enhancers: Vec<EnhancerSpec>,
}

impl Recipe {
    /// Build from a validated catalog entry. `None` when the entry has no generator.
    pub fn from_config(config: &RecipeConfig) -> Option<Self> {
        let generator = config.generator.as_ref()?;
        Some(Self {
            generator: ToolSpec::from(generator),
            enhancers: config.enhancers.iter().map(ToolSpec::from).collect(),
        })
    }
}

/// The entity a generation produces an artifact for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(rename = "type")]
    pub target_type: String,
    pub identifier: String,
}

impl Target {
    pub fn new(target_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            identifier: identifier.into(),
        }
    }
}

/// Generation identity plus the target it processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequestSpec {
    pub generation_id: String,
    pub target: Target,
}
