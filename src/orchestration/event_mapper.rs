//! Builds outbound events from persisted records.
//!
//! Generation work is always reconstructed from the stored generation and its
//! stored enhancement chain, never from the input that created it. Initial
//! dispatch and retry therefore go through the same function and produce the
//! same payload for the same stored state.

use crate::constants::events;
use crate::messaging::{
    CompletedGeneration, EnhancementCreated, EnhancementData, EventContext, GenerationCreated,
    GenerationData, PublisherSpec, RequestsFinished, RequestsFinishedData,
};
use crate::models::{
    EnhancementRecord, GenerationRecord, GenerationRequestSpec, Recipe, RequestRecord, ToolSpec,
};
use crate::orchestration::aggregation::final_artifact_urls;
use chrono::Utc;
use std::collections::BTreeSet;

pub fn generation_request_spec(generation: &GenerationRecord) -> GenerationRequestSpec {
    GenerationRequestSpec {
        generation_id: generation.generation_id.clone(),
        target: generation.target(),
    }
}

/// Recipe as currently stored: generator fields plus enhancers by index
pub fn stored_recipe(generation: &GenerationRecord) -> Recipe {
    Recipe {
        generator: generation.generator(),
        enhancers: generation
            .sorted_enhancements()
            .into_iter()
            .map(EnhancementRecord::enhancer)
            .collect(),
    }
}

/// Generation work item. The context timestamp is the generation's creation
/// time and the correlation id is its request id.
pub fn generation_created(generation: &GenerationRecord) -> GenerationCreated {
    GenerationCreated {
        context: EventContext::new(
            events::GENERATION_CREATED,
            &generation.request_id,
            generation.created,
        ),
        data: GenerationData {
            request_id: generation.request_id.clone(),
            generation_request: generation_request_spec(generation),
            recipe: stored_recipe(generation),
        },
    }
}

/// Enhancement work item consuming `input_artifact_urls`
pub fn enhancement_created(
    enhancement: &EnhancementRecord,
    parent: &GenerationRecord,
    input_artifact_urls: BTreeSet<String>,
) -> EnhancementCreated {
    EnhancementCreated {
        context: EventContext::new(
            events::ENHANCEMENT_CREATED,
            &enhancement.request_id,
            Utc::now(),
        ),
        data: EnhancementData {
            enhancement_id: enhancement.enhancement_id.clone(),
            generation_id: parent.generation_id.clone(),
            request_id: enhancement.request_id.clone(),
            enhancer: enhancement.enhancer(),
            generation_request: generation_request_spec(parent),
            input_artifact_urls,
        },
    }
}

/// Completion summary with each generation's final artifacts
pub fn requests_finished(request: &RequestRecord, generations: &[GenerationRecord]) -> RequestsFinished {
    RequestsFinished {
        context: EventContext::new(events::REQUESTS_FINISHED, &request.request_id, Utc::now()),
        data: RequestsFinishedData {
            request_id: request.request_id.clone(),
            completed_generations: generations
                .iter()
                .map(|generation| CompletedGeneration {
                    generation_request: generation_request_spec(generation),
                    final_artifact_urls: final_artifact_urls(generation),
                })
                .collect(),
            publishers: request
                .publishers
                .iter()
                .map(|publisher| PublisherSpec {
                    name: publisher.name.clone(),
                    version: publisher.version.clone(),
                    options: publisher.options.clone(),
                })
                .collect::<Vec<ToolSpec>>(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PublisherRecord;
    use crate::state_machine::{EnhancementStatus, GenerationStatus};
    use std::collections::BTreeMap;

    fn generation_with_chain() -> GenerationRecord {
        let created = Utc::now() - chrono::Duration::hours(1);
        let chain = ["late", "early"]
            .iter()
            .enumerate()
            .map(|(position, name)| EnhancementRecord {
                enhancement_id: format!("E-{name}"),
                generation_id: Some("G1".to_string()),
                request_id: "R1".to_string(),
                index: if position == 0 { 1 } else { 0 },
                enhancer_name: name.to_string(),
                enhancer_version: "1".to_string(),
                enhancer_options: BTreeMap::new(),
                status: EnhancementStatus::New,
                result: None,
                reason: None,
                created,
                updated: created,
                finished: None,
                artifact_urls: BTreeSet::new(),
            })
            .collect();

        GenerationRecord {
            generation_id: "G1".to_string(),
            request_id: "R1".to_string(),
            target_type: "RPM".to_string(),
            target_identifier: "bash".to_string(),
            generator_name: "cyclonedx-maven-plugin".to_string(),
            generator_version: "2.7.9".to_string(),
            generator_options: BTreeMap::from([("outputFormat".to_string(), "json".to_string())]),
            status: GenerationStatus::New,
            result: None,
            reason: None,
            created,
            updated: created,
            finished: None,
            artifact_urls: BTreeSet::new(),
            enhancements: chain,
        }
    }

    #[test]
    fn test_generation_event_mirrors_record() {
        let record = generation_with_chain();
        let event = generation_created(&record);

        assert_eq!(event.context.event_type, "GenerationCreated");
        assert_eq!(event.context.correlation_id, "R1");
        assert_eq!(event.context.timestamp, record.created);
        assert_eq!(event.data.recipe.generator.name, "cyclonedx-maven-plugin");
        let names: Vec<&str> = event.data.recipe.enhancers.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
        assert_eq!(event.data.generation_request.target.identifier, "bash");
    }

    #[test]
    fn test_same_record_same_payload() {
        let record = generation_with_chain();
        let first = generation_created(&record);
        let second = generation_created(&record);
        assert_eq!(first.data, second.data);
        assert_ne!(first.context.event_id, second.context.event_id);
    }

    #[test]
    fn test_requests_finished_carries_publishers() {
        let mut request = RequestRecord::new("R1", Utc::now());
        request.publishers.push(PublisherRecord::new("atlas", "1.0"));
        let event = requests_finished(&request, &[generation_with_chain()]);

        assert_eq!(event.data.publishers[0].name, "atlas");
        assert_eq!(event.data.completed_generations.len(), 1);
        assert_eq!(event.context.correlation_id, "R1");
    }
}
