mod common;

use common::TestHarness;
use sbom_orchestrator::repository::StatusRepository;
use sbom_orchestrator::{EnhancementStatus, GenerationStatus, OrchestratorError};
use std::sync::Arc;

#[tokio::test]
async fn test_retry_resets_failed_generation() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("RPM", "bash").await;
    let generation = harness.only_generation(&request_id).await;
    harness.fail_generation(&generation.generation_id).await;

    let failed = harness.only_generation(&request_id).await;
    assert_eq!(failed.status, GenerationStatus::Failed);
    assert!(failed.finished.is_some());

    let mut work = harness.dispatcher.subscribe();
    let event = harness
        .system
        .administration()
        .retry_generation(&generation.generation_id)
        .await
        .unwrap();

    let reset = harness.only_generation(&request_id).await;
    assert_eq!(reset.status, GenerationStatus::New);
    assert_eq!(reset.result, None);
    assert_eq!(reset.reason, None);
    assert_eq!(reset.finished, None);
    assert!(reset.updated >= failed.updated);

    assert_eq!(event.context.timestamp, reset.created);
    assert_eq!(event.data.recipe.generator.name, reset.generator_name);
    assert_eq!(event.data.recipe.generator.options, reset.generator_options);
    assert_eq!(event.data.recipe.enhancers.len(), 1);

    let dispatched = work.recv().await.unwrap();
    assert_eq!(dispatched.entity_id(), generation.generation_id);
}

#[tokio::test]
async fn test_retry_rejects_non_failed_generation() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("CONTAINER_IMAGE", "img").await;
    let before = harness.only_generation(&request_id).await;
    let mut work = harness.dispatcher.subscribe();

    let err = harness
        .system
        .administration()
        .retry_generation(&before.generation_id)
        .await
        .unwrap_err();

    match err {
        OrchestratorError::InvalidState(message) => assert!(message.contains("NEW")),
        other => panic!("expected InvalidState, got {other:?}"),
    }
    assert_eq!(harness.only_generation(&request_id).await, before);
    assert!(work.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retries_dispatch_once() {
    let harness = Arc::new(TestHarness::new());
    let request_id = harness.submit_one("CONTAINER_IMAGE", "img").await;
    let generation_id = harness.only_generation(&request_id).await.generation_id;
    harness.fail_generation(&generation_id).await;

    let mut work = harness.dispatcher.subscribe();
    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let harness = Arc::clone(&harness);
            let generation_id = generation_id.clone();
            tokio::spawn(async move {
                harness
                    .system
                    .administration()
                    .retry_generation(&generation_id)
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(attempts).await;
    let outcomes: Vec<_> = results.into_iter().map(|joined| joined.unwrap()).collect();

    let succeeded = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let rejected = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(OrchestratorError::InvalidState(_))))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 1);

    let mut dispatched = 0;
    while work.try_recv().is_ok() {
        dispatched += 1;
    }
    assert_eq!(dispatched, 1);
}

#[tokio::test]
async fn test_retry_first_enhancement_uses_generation_output() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("RPM", "bash").await;
    let generation = harness.only_generation(&request_id).await;
    let enhancement_id = generation.enhancements[0].enhancement_id.clone();

    harness
        .finish_generation(&generation.generation_id, "https://a.test/generated.json")
        .await;
    harness.fail_enhancement(&enhancement_id).await;

    let event = harness
        .system
        .administration()
        .retry_enhancement(&enhancement_id)
        .await
        .unwrap();

    assert_eq!(event.data.enhancement_id, enhancement_id);
    assert_eq!(event.data.generation_id, generation.generation_id);
    assert_eq!(event.data.enhancer.name, "rpm-enhancer");
    assert!(event
        .data
        .input_artifact_urls
        .contains("https://a.test/generated.json"));

    let stored = harness.repository.find_enhancement(&enhancement_id).await.unwrap().unwrap();
    assert_eq!(stored.status, EnhancementStatus::New);
    assert_eq!(stored.reason, None);
}

#[tokio::test]
async fn test_retry_later_enhancement_uses_predecessor_output() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("CHAIN", "pkg").await;
    let generation = harness.only_generation(&request_id).await;
    let chain = &generation.enhancements;

    harness.finish_generation(&generation.generation_id, "g").await;
    harness.finish_enhancement(&chain[0].enhancement_id, "e0").await;
    harness.fail_enhancement(&chain[1].enhancement_id).await;

    let event = harness
        .system
        .administration()
        .retry_enhancement(&chain[1].enhancement_id)
        .await
        .unwrap();

    assert_eq!(event.data.input_artifact_urls.len(), 1);
    assert!(event.data.input_artifact_urls.contains("e0"));
}

#[tokio::test]
async fn test_retry_rejects_finished_enhancement() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("RPM", "bash").await;
    let generation = harness.only_generation(&request_id).await;
    let enhancement_id = generation.enhancements[0].enhancement_id.clone();
    harness.finish_generation(&generation.generation_id, "g").await;
    harness.finish_enhancement(&enhancement_id, "e").await;

    let err = harness
        .system
        .administration()
        .retry_enhancement(&enhancement_id)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState(_)));
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn test_retry_unknown_ids_are_not_found() {
    let harness = TestHarness::new();
    let admin = harness.system.administration();
    let err = admin.retry_generation("missing").await.unwrap_err();
    assert_eq!(err.http_status(), 404);
    assert!(matches!(
        admin.retry_enhancement("missing").await,
        Err(OrchestratorError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_stale_status_write_keeps_reconciled_options() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("RPM", "bash").await;
    let generation_id = harness.only_generation(&request_id).await.generation_id;
    harness.fail_generation(&generation_id).await;

    // A worker read the record before an operator edited its options
    let mut stale = harness.only_generation(&request_id).await;

    let mut edited = stale.clone();
    edited
        .generator_options
        .insert("handler-arch".to_string(), "aarch64".to_string());
    harness
        .system
        .administration()
        .update_generation(edited)
        .await
        .unwrap();

    stale.reset_for_retry(chrono::Utc::now());
    assert!(harness
        .repository
        .update_generation_if_status(&stale, &GenerationStatus::Failed)
        .await
        .unwrap());

    let stored = harness.only_generation(&request_id).await;
    assert_eq!(stored.status, GenerationStatus::New);
    assert_eq!(
        stored.generator_options.get("handler-arch").map(String::as_str),
        Some("aarch64")
    );
}

#[tokio::test]
async fn test_retry_dispatches_reconciled_state() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("RPM", "bash").await;
    let generation_id = harness.only_generation(&request_id).await.generation_id;
    harness.fail_generation(&generation_id).await;

    let mut edited = harness.only_generation(&request_id).await;
    edited
        .generator_options
        .insert("handler-arch".to_string(), "aarch64".to_string());
    edited.enhancements[0].enhancer_version = "1.1.0".to_string();
    harness
        .system
        .administration()
        .update_generation(edited)
        .await
        .unwrap();

    let event = harness
        .system
        .administration()
        .retry_generation(&generation_id)
        .await
        .unwrap();

    let stored = harness.only_generation(&request_id).await;
    assert_eq!(stored.status, GenerationStatus::New);
    assert_eq!(
        stored.generator_options.get("handler-arch").map(String::as_str),
        Some("aarch64")
    );
    assert_eq!(event.data.recipe.generator.options, stored.generator_options);
    assert_eq!(event.data.recipe.enhancers[0].version, "1.1.0");
}

#[tokio::test]
async fn test_enhancement_reset_keeps_reconciled_fields() {
    let harness = TestHarness::new();
    let request_id = harness.submit_one("CHAIN", "pkg").await;
    let generation = harness.only_generation(&request_id).await;
    harness.finish_generation(&generation.generation_id, "https://a.test/g.json").await;
    let first_id = generation.enhancements[0].enhancement_id.clone();
    harness.fail_enhancement(&first_id).await;

    let mut edited = harness.only_generation(&request_id).await;
    edited.enhancements[0]
        .enhancer_options
        .insert("handler-depth".to_string(), "full".to_string());
    harness
        .system
        .administration()
        .update_generation(edited)
        .await
        .unwrap();

    assert!(harness
        .repository
        .reset_enhancement_for_retry(&first_id, chrono::Utc::now())
        .await
        .unwrap());
    assert!(!harness
        .repository
        .reset_enhancement_for_retry(&first_id, chrono::Utc::now())
        .await
        .unwrap());

    let stored = harness.repository.find_enhancement(&first_id).await.unwrap().unwrap();
    assert_eq!(stored.status, EnhancementStatus::New);
    assert_eq!(stored.result, None);
    assert_eq!(stored.finished, None);
    assert_eq!(
        stored.enhancer_options.get("handler-depth").map(String::as_str),
        Some("full")
    );
}
