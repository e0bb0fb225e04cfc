#![allow(dead_code)]

pub mod strategies;

use sbom_orchestrator::config::{ConfigManager, OrchestratorConfig, RecipeCatalog};
use sbom_orchestrator::messaging::BroadcastWorkDispatcher;
use sbom_orchestrator::orchestration::{
    BatchSubmission, GenerationTarget, OrchestrationSystem, SequentialIdGenerator, StatusReport,
};
use sbom_orchestrator::repository::InMemoryStatusRepository;
use sbom_orchestrator::GenerationRecord;
use std::sync::Arc;

/// Production catalog plus a three-step chain for chain tests
pub const TEST_RECIPES: &str = r#"
apiVersion: v1
recipes:
  - type: CONTAINER_IMAGE
    generator:
      name: syft-generator
      version: 1.5.0
      options:
        format: cyclonedx-json
        scope: all-layers
  - type: RPM
    generator:
      name: cyclonedx-maven-plugin
      version: 2.7.9
      options:
        includeSystemScope: "true"
        outputFormat: json
    enhancers:
      - name: rpm-enhancer
        version: 1.0.0
        options:
          enrichMetadata: "true"
          validateLicenses: "false"
  - type: CHAIN
    generator:
      name: chain-generator
      version: 0.1.0
    enhancers:
      - { name: first-enhancer, version: 0.1.0 }
      - { name: second-enhancer, version: 0.1.0 }
      - { name: third-enhancer, version: 0.1.0 }
"#;

pub fn test_catalog() -> RecipeCatalog {
    RecipeCatalog::from_yaml_str(TEST_RECIPES, "test-recipes").expect("test catalog parses")
}

pub fn test_config_manager() -> Arc<ConfigManager> {
    let config = OrchestratorConfig {
        environment: "test".to_string(),
        ..OrchestratorConfig::default()
    };
    Arc::new(ConfigManager::from_parts(config, test_catalog()).expect("test catalog validates"))
}

/// Fully wired system over the in-memory store with deterministic ids
pub struct TestHarness {
    pub system: OrchestrationSystem,
    pub repository: Arc<InMemoryStatusRepository>,
    pub dispatcher: Arc<BroadcastWorkDispatcher>,
}

impl TestHarness {
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryStatusRepository::new());
        let dispatcher = Arc::new(BroadcastWorkDispatcher::new(256));
        let system = OrchestrationSystem::new(
            test_config_manager(),
            repository.clone(),
            dispatcher.clone(),
            Arc::new(SequentialIdGenerator::new("T")),
        )
        .expect("system assembles");

        Self {
            system,
            repository,
            dispatcher,
        }
    }

    /// Submit a single-target batch and return the request id
    pub async fn submit_one(&self, target_type: &str, identifier: &str) -> String {
        self.system
            .requests()
            .submit(BatchSubmission::new(vec![GenerationTarget::new(
                target_type,
                identifier,
            )]))
            .await
            .expect("submission succeeds")
    }

    pub async fn only_generation(&self, request_id: &str) -> GenerationRecord {
        let mut generations = self
            .system
            .administration()
            .get_generations_for_request(request_id)
            .await
            .expect("request exists");
        assert_eq!(generations.len(), 1);
        generations.remove(0)
    }

    /// Drive a generation to FAILED through the worker report path
    pub async fn fail_generation(&self, generation_id: &str) {
        self.system
            .results()
            .report_generation(generation_id, StatusReport::failed(2, "generator crashed"))
            .await
            .expect("failure report applies");
    }

    pub async fn finish_generation(&self, generation_id: &str, url: &str) {
        self.system
            .results()
            .report_generation(generation_id, StatusReport::finished([url]))
            .await
            .expect("finish report applies");
    }

    pub async fn finish_enhancement(&self, enhancement_id: &str, url: &str) {
        self.system
            .results()
            .report_enhancement(enhancement_id, StatusReport::finished([url]))
            .await
            .expect("finish report applies");
    }

    pub async fn fail_enhancement(&self, enhancement_id: &str) {
        self.system
            .results()
            .report_enhancement(enhancement_id, StatusReport::failed(1, "enhancer crashed"))
            .await
            .expect("failure report applies");
    }
}
