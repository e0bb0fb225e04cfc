//! # Completion Aggregation
//!
//! Queries the external completion notifier consults before moving a request
//! on. The rules are pure functions over loaded records; [`AggregationEngine`]
//! wraps them with repository lookups.

use crate::constants::entities;
use crate::error::{OrchestratorError, Result};
use crate::models::GenerationRecord;
use crate::repository::StatusRepository;
use crate::state_machine::Lifecycle;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Finished itself, and every enhancement (if any) finished too
pub fn is_generation_complete(generation: &GenerationRecord) -> bool {
    generation.status.is_finished()
        && generation
            .enhancements
            .iter()
            .all(|enhancement| enhancement.status.is_finished())
}

/// At least one generation, and every one of them complete
pub fn is_request_complete(generations: &[GenerationRecord]) -> bool {
    !generations.is_empty() && generations.iter().all(is_generation_complete)
}

/// Output of the last step that finished.
///
/// The highest-index finished enhancement wins; with no enhancements, or
/// none finished, the generation's own output is returned. Completion is
/// assumed, not checked.
pub fn final_artifact_urls(generation: &GenerationRecord) -> BTreeSet<String> {
    generation
        .enhancements
        .iter()
        .filter(|enhancement| enhancement.status.is_finished())
        .max_by_key(|enhancement| enhancement.index)
        .map(|enhancement| enhancement.artifact_urls.clone())
        .unwrap_or_else(|| generation.artifact_urls.clone())
}

#[derive(Debug, Clone)]
pub struct AggregationEngine {
    repository: Arc<dyn StatusRepository>,
}

impl AggregationEngine {
    pub fn new(repository: Arc<dyn StatusRepository>) -> Self {
        Self { repository }
    }

    async fn load_generation(&self, generation_id: &str) -> Result<GenerationRecord> {
        self.repository
            .find_generation(generation_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::GENERATION, generation_id))
    }

    pub async fn is_generation_complete(&self, generation_id: &str) -> Result<bool> {
        let generation = self.load_generation(generation_id).await?;
        Ok(is_generation_complete(&generation))
    }

    pub async fn is_request_complete(&self, request_id: &str) -> Result<bool> {
        if self.repository.find_request(request_id).await?.is_none() {
            return Err(OrchestratorError::not_found(entities::REQUEST, request_id));
        }
        let generations = self.repository.find_generations_by_request(request_id).await?;
        let complete = is_request_complete(&generations);
        debug!(
            request_id = %request_id,
            generations = generations.len(),
            complete,
            "Evaluated request completion"
        );
        Ok(complete)
    }

    pub async fn final_artifact_urls(&self, generation_id: &str) -> Result<BTreeSet<String>> {
        let generation = self.load_generation(generation_id).await?;
        Ok(final_artifact_urls(&generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnhancementRecord;
    use crate::state_machine::{EnhancementStatus, GenerationStatus};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn urls(tag: &str) -> BTreeSet<String> {
        BTreeSet::from([format!("https://artifacts.test/{tag}.json")])
    }

    fn enhancement(index: u32, status: EnhancementStatus) -> EnhancementRecord {
        let now = Utc::now();
        EnhancementRecord {
            enhancement_id: format!("E{index}"),
            generation_id: Some("G1".to_string()),
            request_id: "R1".to_string(),
            index,
            enhancer_name: "enhancer".to_string(),
            enhancer_version: "1".to_string(),
            enhancer_options: BTreeMap::new(),
            status,
            result: None,
            reason: None,
            created: now,
            updated: now,
            finished: None,
            artifact_urls: urls(&format!("e{index}")),
        }
    }

    fn generation(status: GenerationStatus, enhancements: Vec<EnhancementRecord>) -> GenerationRecord {
        let now = Utc::now();
        GenerationRecord {
            generation_id: "G1".to_string(),
            request_id: "R1".to_string(),
            target_type: "RPM".to_string(),
            target_identifier: "bash".to_string(),
            generator_name: "gen".to_string(),
            generator_version: "1".to_string(),
            generator_options: BTreeMap::new(),
            status,
            result: None,
            reason: None,
            created: now,
            updated: now,
            finished: None,
            artifact_urls: urls("base"),
            enhancements,
        }
    }

    #[test]
    fn test_generation_completion() {
        let pending = generation(
            GenerationStatus::Finished,
            vec![enhancement(0, EnhancementStatus::New)],
        );
        assert!(!is_generation_complete(&pending));

        let done = generation(
            GenerationStatus::Finished,
            vec![enhancement(0, EnhancementStatus::Finished)],
        );
        assert!(is_generation_complete(&done));

        assert!(is_generation_complete(&generation(GenerationStatus::Finished, vec![])));
        assert!(!is_generation_complete(&generation(GenerationStatus::Failed, vec![])));
    }

    #[test]
    fn test_empty_request_is_never_complete() {
        assert!(!is_request_complete(&[]));
        assert!(is_request_complete(&[generation(GenerationStatus::Finished, vec![])]));
        assert!(!is_request_complete(&[
            generation(GenerationStatus::Finished, vec![]),
            generation(GenerationStatus::New, vec![]),
        ]));
    }

    #[test]
    fn test_final_urls_use_last_finished_step() {
        let record = generation(
            GenerationStatus::Finished,
            vec![
                enhancement(2, EnhancementStatus::Failed),
                enhancement(0, EnhancementStatus::Finished),
                enhancement(1, EnhancementStatus::Finished),
            ],
        );
        assert_eq!(final_artifact_urls(&record), urls("e1"));
    }

    #[test]
    fn test_final_urls_fall_back_to_generation() {
        let none_finished = generation(
            GenerationStatus::Finished,
            vec![enhancement(0, EnhancementStatus::Failed)],
        );
        assert_eq!(final_artifact_urls(&none_finished), urls("base"));
        assert_eq!(
            final_artifact_urls(&generation(GenerationStatus::Finished, vec![])),
            urls("base")
        );
    }
}
