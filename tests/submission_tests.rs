mod common;

use common::TestHarness;
use sbom_orchestrator::models::PublisherRecord;
use sbom_orchestrator::orchestration::{BatchSubmission, GenerationTarget};
use sbom_orchestrator::{EnhancementStatus, GenerationStatus, OrchestratorError, RequestStatus};

#[tokio::test]
async fn test_container_image_batch_creates_single_generation() {
    let harness = TestHarness::new();
    let mut work = harness.dispatcher.subscribe();

    let request_id = harness.submit_one("CONTAINER_IMAGE", "quay.io/org/app:1.0").await;

    let request = harness
        .system
        .administration()
        .get_request(&request_id)
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Received);

    let generation = harness.only_generation(&request_id).await;
    assert_eq!(generation.status, GenerationStatus::New);
    assert!(generation.enhancements.is_empty());
    assert_eq!(generation.generator_name, "syft-generator");

    let event = work.recv().await.unwrap();
    let created = event.as_generation().expect("generation work item");
    assert_eq!(created.data.request_id, request_id);
    assert_eq!(created.data.generation_request.generation_id, generation.generation_id);
    assert_eq!(created.context.correlation_id, request_id);
}

#[tokio::test]
async fn test_rpm_batch_creates_enhancement_at_index_zero() {
    let harness = TestHarness::new();

    let request_id = harness.submit_one("rpm", "bash-5.2.15-1.el9").await;
    let generation = harness.only_generation(&request_id).await;

    assert_eq!(generation.enhancements.len(), 1);
    let enhancement = &generation.enhancements[0];
    assert_eq!(enhancement.index, 0);
    assert_eq!(enhancement.status, EnhancementStatus::New);
    assert_eq!(enhancement.enhancer_name, "rpm-enhancer");
    assert_eq!(enhancement.request_id, request_id);
    assert_eq!(
        enhancement.generation_id.as_deref(),
        Some(generation.generation_id.as_str())
    );
}

#[tokio::test]
async fn test_caller_options_reach_every_tool() {
    let harness = TestHarness::new();
    let submission = BatchSubmission::new(vec![
        GenerationTarget::new("RPM", "bash").with_option("arch", "x86_64")
    ]);

    let request_id = harness.system.requests().submit(submission).await.unwrap();
    let generation = harness.only_generation(&request_id).await;

    assert_eq!(generation.generator_options["handler-arch"], "x86_64");
    assert_eq!(generation.generator_options["outputFormat"], "json");
    let enhancer_options = &generation.enhancements[0].enhancer_options;
    assert_eq!(enhancer_options["handler-arch"], "x86_64");
    assert_eq!(enhancer_options["enrichMetadata"], "true");
}

#[tokio::test]
async fn test_chain_indices_are_contiguous() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("CHAIN", "pkg").await;
    let generation = harness.only_generation(&request_id).await;

    let indices: Vec<u32> = generation.enhancements.iter().map(|e| e.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_unknown_type_persists_nothing() {
    let harness = TestHarness::new();
    let submission = BatchSubmission::new(vec![
        GenerationTarget::new("RPM", "bash"),
        GenerationTarget::new("UNKNOWN", "x"),
    ]);

    let err = harness.system.requests().submit(submission).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownTargetType(_)));

    let admin = harness.system.administration();
    let requests = admin.fetch_requests(Default::default()).await.unwrap();
    assert_eq!(requests.total_hits, 0);
    let generations = admin.fetch_generations(Default::default()).await.unwrap();
    assert_eq!(generations.total_hits, 0);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let harness = TestHarness::new();
    let err = harness
        .system
        .requests()
        .submit(BatchSubmission::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidInput(_)));
}

#[tokio::test]
async fn test_multi_target_batch_with_publishers() {
    let harness = TestHarness::new();
    let mut work = harness.dispatcher.subscribe();
    let submission = BatchSubmission::new(vec![
        GenerationTarget::new("CONTAINER_IMAGE", "quay.io/org/a:1"),
        GenerationTarget::new("RPM", "bash"),
        GenerationTarget::new("CONTAINER_IMAGE", "quay.io/org/b:1"),
    ])
    .with_publisher(PublisherRecord::new("atlas", "1.0"));

    let request_id = harness.system.requests().submit(submission).await.unwrap();

    let admin = harness.system.administration();
    let generations = admin.get_generations_for_request(&request_id).await.unwrap();
    assert_eq!(generations.len(), 3);
    assert_eq!(admin.get_request(&request_id).await.unwrap().publishers.len(), 1);

    let mut dispatched = Vec::new();
    while let Ok(event) = work.try_recv() {
        dispatched.push(event.entity_id().to_string());
    }
    assert_eq!(dispatched.len(), 3);
    for generation in &generations {
        assert!(dispatched.contains(&generation.generation_id));
    }
}
