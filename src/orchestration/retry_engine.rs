//! # Retry Engine
//!
//! Explicit, caller-initiated retry of `FAILED` generations and enhancements.
//!
//! ## Flow
//!
//! 1. Load the entity (`NotFound` if absent)
//! 2. Check the transition table: only `FAILED` accepts a retry
//! 3. For enhancements, resolve the parent and the input artifacts
//! 4. Persist the reset with a compare-and-set against `FAILED`. The reset
//!    touches status, result, reason and the timestamps only.
//! 5. Rebuild the work item from the stored record and dispatch it
//!
//! The compare-and-set in step 4 serialises concurrent retries: of two
//! callers racing on the same entity exactly one write lands and the other
//! gets `InvalidState`, so at most one work item is dispatched.
//!
//! Parent and predecessor lookups happen before the reset is written, so an
//! enhancement that cannot be re-dispatched stays `FAILED`.

use crate::constants::entities;
use crate::error::{OrchestratorError, Result};
use crate::logging::{log_enhancement_operation, log_generation_operation};
use crate::messaging::{EnhancementCreated, GenerationCreated, WorkDispatcher, WorkEvent};
use crate::models::{EnhancementRecord, GenerationRecord};
use crate::orchestration::event_mapper;
use crate::repository::StatusRepository;
use crate::state_machine::{determine_target_state, StatusEvent};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct RetryEngine {
    repository: Arc<dyn StatusRepository>,
    dispatcher: Arc<dyn WorkDispatcher>,
}

impl RetryEngine {
    pub fn new(repository: Arc<dyn StatusRepository>, dispatcher: Arc<dyn WorkDispatcher>) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    /// Reset a failed generation to `NEW` and dispatch it again
    #[instrument(skip(self))]
    pub async fn retry_generation(&self, generation_id: &str) -> Result<GenerationCreated> {
        let generation = self
            .repository
            .find_generation(generation_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::GENERATION, generation_id))?;

        determine_target_state(&generation.status, &StatusEvent::Retry)?;

        if !self
            .repository
            .reset_generation_for_retry(generation_id, Utc::now())
            .await?
        {
            return Err(lost_race(entities::GENERATION, generation_id));
        }

        let stored = self.reload_generation(generation_id).await?;
        let event = event_mapper::generation_created(&stored);
        self.dispatcher
            .dispatch(WorkEvent::Generation(event.clone()))
            .await?;

        log_generation_operation(
            "retry",
            &stored.generation_id,
            Some(&stored.request_id),
            stored.status.as_str(),
            Some(&format!("event_id={}", event.context.event_id)),
        );
        Ok(event)
    }

    /// Reset a failed enhancement to `NEW` and dispatch it with the output of
    /// the step before it
    #[instrument(skip(self))]
    pub async fn retry_enhancement(&self, enhancement_id: &str) -> Result<EnhancementCreated> {
        let enhancement = self
            .repository
            .find_enhancement(enhancement_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::ENHANCEMENT, enhancement_id))?;

        determine_target_state(&enhancement.status, &StatusEvent::Retry)?;

        let parent = self.parent_of(&enhancement).await?;
        let inputs = input_artifact_urls(&enhancement, &parent)?;

        if !self
            .repository
            .reset_enhancement_for_retry(enhancement_id, Utc::now())
            .await?
        {
            return Err(lost_race(entities::ENHANCEMENT, enhancement_id));
        }

        let stored = self
            .repository
            .find_enhancement(enhancement_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::ENHANCEMENT, enhancement_id))?;
        let event = event_mapper::enhancement_created(&stored, &parent, inputs);
        self.dispatcher
            .dispatch(WorkEvent::Enhancement(event.clone()))
            .await?;

        log_enhancement_operation(
            "retry",
            &stored.enhancement_id,
            Some(&parent.generation_id),
            stored.index,
            stored.status.as_str(),
            Some(&format!("inputs={}", event.data.input_artifact_urls.len())),
        );
        Ok(event)
    }

    async fn reload_generation(&self, generation_id: &str) -> Result<GenerationRecord> {
        self.repository
            .find_generation(generation_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::GENERATION, generation_id))
    }

    async fn parent_of(&self, enhancement: &EnhancementRecord) -> Result<GenerationRecord> {
        let parent = match enhancement.generation_id.as_deref() {
            Some(generation_id) => self.repository.find_generation(generation_id).await?,
            None => None,
        };
        parent.ok_or_else(|| {
            OrchestratorError::invalid_state(format!(
                "Cannot retry enhancement {}: parent missing",
                enhancement.enhancement_id
            ))
        })
    }
}

/// Input artifacts for `enhancement`: the parent's output at index zero,
/// otherwise the output of the sibling one step earlier.
///
/// The predecessor only has to exist. Whether it has finished is not checked.
pub fn input_artifact_urls(
    enhancement: &EnhancementRecord,
    parent: &GenerationRecord,
) -> Result<BTreeSet<String>> {
    if enhancement.index == 0 {
        return Ok(parent.artifact_urls.clone());
    }
    parent
        .enhancement_at(enhancement.index - 1)
        .map(|predecessor| predecessor.artifact_urls.clone())
        .ok_or_else(|| {
            OrchestratorError::invalid_state(format!(
                "Cannot retry enhancement {}: missing predecessor at index {}",
                enhancement.enhancement_id,
                enhancement.index - 1
            ))
        })
}

fn lost_race(entity: &str, id: &str) -> OrchestratorError {
    info!(entity = %entity, id = %id, "Retry lost to a concurrent status change");
    OrchestratorError::invalid_state(format!(
        "{entity} {id} is no longer FAILED; it was changed concurrently"
    ))
}
