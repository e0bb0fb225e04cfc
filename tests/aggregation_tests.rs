mod common;

use chrono::Utc;
use common::TestHarness;
use sbom_orchestrator::models::PublisherRecord;
use sbom_orchestrator::orchestration::{BatchSubmission, GenerationTarget};
use sbom_orchestrator::repository::StatusRepository;
use sbom_orchestrator::{OrchestratorError, RequestGraph, RequestRecord};
use std::collections::BTreeSet;

fn urls(url: &str) -> BTreeSet<String> {
    BTreeSet::from([url.to_string()])
}

#[tokio::test]
async fn test_generation_completes_only_with_its_chain() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("RPM", "bash").await;
    let generation = harness.only_generation(&request_id).await;
    let admin = harness.system.administration();

    harness
        .finish_generation(&generation.generation_id, "https://a.test/generated.json")
        .await;
    assert!(!admin.is_generation_complete(&generation.generation_id).await.unwrap());
    assert!(!admin.is_request_complete(&request_id).await.unwrap());

    harness
        .finish_enhancement(&generation.enhancements[0].enhancement_id, "https://a.test/enhanced.json")
        .await;
    assert!(admin.is_generation_complete(&generation.generation_id).await.unwrap());
    assert!(admin.is_request_complete(&request_id).await.unwrap());
    assert_eq!(
        admin.final_artifact_urls(&generation.generation_id).await.unwrap(),
        urls("https://a.test/enhanced.json")
    );
}

#[tokio::test]
async fn test_failed_generation_is_not_complete() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("CONTAINER_IMAGE", "quay.io/org/app:1").await;
    let generation = harness.only_generation(&request_id).await;

    harness.fail_generation(&generation.generation_id).await;

    let admin = harness.system.administration();
    assert!(!admin.is_generation_complete(&generation.generation_id).await.unwrap());
    assert!(!admin.is_request_complete(&request_id).await.unwrap());
}

#[tokio::test]
async fn test_request_without_generations_is_never_complete() {
    let harness = TestHarness::new();
    harness
        .repository
        .save_request(&RequestGraph {
            request: RequestRecord::new("EMPTY", Utc::now()),
            generations: Vec::new(),
        })
        .await
        .unwrap();

    assert!(!harness
        .system
        .administration()
        .is_request_complete("EMPTY")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_final_urls_pick_last_finished_enhancement() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("CHAIN", "pkg").await;
    let generation = harness.only_generation(&request_id).await;
    let chain = &generation.enhancements;

    harness.finish_generation(&generation.generation_id, "g").await;
    harness.finish_enhancement(&chain[0].enhancement_id, "e0").await;
    harness.finish_enhancement(&chain[1].enhancement_id, "e1").await;
    harness.fail_enhancement(&chain[2].enhancement_id).await;

    let admin = harness.system.administration();
    assert_eq!(
        admin.final_artifact_urls(&generation.generation_id).await.unwrap(),
        urls("e1")
    );
    assert!(!admin.is_generation_complete(&generation.generation_id).await.unwrap());
}

#[tokio::test]
async fn test_requests_finished_event_requires_completion() {
    let harness = TestHarness::new();
    let submission = BatchSubmission::new(vec![GenerationTarget::new("CONTAINER_IMAGE", "img")])
        .with_publisher(PublisherRecord::new("atlas", "1.0"));
    let request_id = harness.system.requests().submit(submission).await.unwrap();
    let generation = harness.only_generation(&request_id).await;
    let admin = harness.system.administration();

    let err = admin.requests_finished_event(&request_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState(_)));

    harness.finish_generation(&generation.generation_id, "https://a.test/img.json").await;
    let event = admin.requests_finished_event(&request_id).await.unwrap();

    assert_eq!(event.context.event_type, "RequestsFinished");
    assert_eq!(event.data.request_id, request_id);
    assert_eq!(event.data.publishers[0].name, "atlas");
    assert_eq!(
        event.data.completed_generations[0].final_artifact_urls,
        urls("https://a.test/img.json")
    );
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let harness = TestHarness::new();
    let admin = harness.system.administration();

    assert!(matches!(
        admin.is_generation_complete("missing").await,
        Err(OrchestratorError::NotFound { .. })
    ));
    assert!(matches!(
        admin.is_request_complete("missing").await,
        Err(OrchestratorError::NotFound { .. })
    ));
    assert!(matches!(
        admin.final_artifact_urls("missing").await,
        Err(OrchestratorError::NotFound { .. })
    ));
}
