//! # Hierarchy Builder
//!
//! Builds the complete Request → Generation → Enhancement value graph for an
//! incoming batch, entirely in memory. Nothing is written here: the caller
//! persists the finished [`RequestGraph`] in one transactional call, so a
//! batch that fails to build (for example on an unknown target type) leaves
//! no trace in the store.
//!
//! Every entity gets a freshly minted identifier from the injected
//! [`IdGenerator`]. Enhancement indices follow the recipe's enhancer order
//! starting at zero.

use crate::error::{OrchestratorError, Result};
use crate::models::{
    EnhancementRecord, GenerationRecord, PublisherRecord, RequestGraph, RequestRecord,
};
use crate::orchestration::identifiers::IdGenerator;
use crate::orchestration::option_merger::merge_options;
use crate::orchestration::recipe_resolver::RecipeResolver;
use crate::state_machine::{EnhancementStatus, GenerationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// One target of an incoming batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTarget {
    pub target_type: String,
    pub identifier: String,
    /// Caller options, merged into the generator and every enhancer
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl GenerationTarget {
    pub fn new(target_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            identifier: identifier.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Caller-submitted batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSubmission {
    pub targets: Vec<GenerationTarget>,
    #[serde(default)]
    pub publishers: Vec<PublisherRecord>,
}

impl BatchSubmission {
    pub fn new(targets: Vec<GenerationTarget>) -> Self {
        Self {
            targets,
            publishers: Vec::new(),
        }
    }

    pub fn with_publisher(mut self, publisher: PublisherRecord) -> Self {
        self.publishers.push(publisher);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    resolver: Arc<RecipeResolver>,
    ids: Arc<dyn IdGenerator>,
}

impl HierarchyBuilder {
    pub fn new(resolver: Arc<RecipeResolver>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { resolver, ids }
    }

    pub fn resolver(&self) -> &RecipeResolver {
        &self.resolver
    }

    /// Build one generation, with its enhancement chain, for `request_id`
    pub fn build_generation(
        &self,
        target: &GenerationTarget,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<GenerationRecord> {
        if target.identifier.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "target identifier must not be blank".to_string(),
            ));
        }

        let recipe = self.resolver.resolve(&target.target_type)?;
        let generation_id = self.ids.next_id();
        let caller_options = Some(&target.options);

        let enhancements = recipe
            .enhancers
            .iter()
            .enumerate()
            .map(|(index, enhancer)| -> Result<EnhancementRecord> {
                let index = u32::try_from(index).map_err(|_| {
                    OrchestratorError::InvalidInput("enhancer chain too long".to_string())
                })?;
                Ok(EnhancementRecord {
                    enhancement_id: self.ids.next_id(),
                    generation_id: Some(generation_id.clone()),
                    request_id: request_id.to_string(),
                    index,
                    enhancer_name: enhancer.name.clone(),
                    enhancer_version: enhancer.version.clone(),
                    enhancer_options: merge_options(Some(&enhancer.options), caller_options),
                    status: EnhancementStatus::New,
                    result: None,
                    reason: None,
                    created: now,
                    updated: now,
                    finished: None,
                    artifact_urls: BTreeSet::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            generation_id = %generation_id,
            request_id = %request_id,
            target_type = %target.target_type,
            enhancers = enhancements.len(),
            "Built generation"
        );

        Ok(GenerationRecord {
            generation_id,
            request_id: request_id.to_string(),
            // Stored as submitted; lookups normalise
            target_type: target.target_type.clone(),
            target_identifier: target.identifier.clone(),
            generator_name: recipe.generator.name.clone(),
            generator_version: recipe.generator.version.clone(),
            generator_options: merge_options(Some(&recipe.generator.options), caller_options),
            status: GenerationStatus::New,
            result: None,
            reason: None,
            created: now,
            updated: now,
            finished: None,
            artifact_urls: BTreeSet::new(),
            enhancements,
        })
    }

    /// Build the whole request graph. Fails without side effects if any target
    /// cannot be built.
    pub fn build_request(&self, submission: &BatchSubmission, now: DateTime<Utc>) -> Result<RequestGraph> {
        if submission.targets.is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "batch must contain at least one target".to_string(),
            ));
        }

        let request_id = self.ids.next_id();
        let generations = submission
            .targets
            .iter()
            .map(|target| self.build_generation(target, &request_id, now))
            .collect::<Result<Vec<_>>>()?;

        let mut request = RequestRecord::new(request_id, now);
        request.publishers = submission.publishers.clone();

        Ok(RequestGraph {
            request,
            generations,
        })
    }
}
