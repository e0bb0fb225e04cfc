//! # Administration Facade
//!
//! The read and retry surface an API layer sits on. Methods named `fetch_*`
//! return pages, `get_*` return a single record or an unpaged list and fail
//! with `NotFound` when the parent id does not resolve.

use crate::constants::entities;
use crate::error::{OrchestratorError, Result};
use crate::messaging::{EnhancementCreated, GenerationCreated, RequestsFinished};
use crate::models::{EnhancementRecord, GenerationRecord, Page, PageRequest, RequestRecord};
use crate::orchestration::aggregation::{self, AggregationEngine};
use crate::orchestration::event_mapper;
use crate::orchestration::reconciliation::EnhancementReconciler;
use crate::orchestration::retry_engine::RetryEngine;
use crate::repository::StatusRepository;
use crate::state_machine::{EnhancementStatus, GenerationStatus};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct AdministrationService {
    repository: Arc<dyn StatusRepository>,
    retry_engine: RetryEngine,
    reconciler: EnhancementReconciler,
    aggregation: AggregationEngine,
}

impl AdministrationService {
    pub fn new(
        repository: Arc<dyn StatusRepository>,
        retry_engine: RetryEngine,
        reconciler: EnhancementReconciler,
    ) -> Self {
        Self {
            aggregation: AggregationEngine::new(repository.clone()),
            repository,
            retry_engine,
            reconciler,
        }
    }

    // Requests

    pub async fn fetch_requests(&self, page: PageRequest) -> Result<Page<RequestRecord>> {
        self.repository.find_all_requests(page).await
    }

    pub async fn get_request(&self, request_id: &str) -> Result<RequestRecord> {
        self.repository
            .find_request(request_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::REQUEST, request_id))
    }

    // Generations

    pub async fn fetch_generations_for_request(
        &self,
        request_id: &str,
        page: PageRequest,
    ) -> Result<Page<GenerationRecord>> {
        self.get_request(request_id).await?;
        self.repository
            .find_generations_by_request_paged(request_id, page)
            .await
    }

    pub async fn get_generations_for_request(&self, request_id: &str) -> Result<Vec<GenerationRecord>> {
        self.get_request(request_id).await?;
        self.repository.find_generations_by_request(request_id).await
    }

    pub async fn fetch_generations(&self, page: PageRequest) -> Result<Page<GenerationRecord>> {
        self.repository.find_all_generations(page).await
    }

    pub async fn get_generation(&self, generation_id: &str) -> Result<GenerationRecord> {
        self.repository
            .find_generation(generation_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::GENERATION, generation_id))
    }

    pub async fn find_generations_by_status(
        &self,
        status: &GenerationStatus,
    ) -> Result<Vec<GenerationRecord>> {
        self.repository.find_generations_by_status(status).await
    }

    // Enhancements

    pub async fn get_enhancement(&self, enhancement_id: &str) -> Result<EnhancementRecord> {
        self.repository
            .find_enhancement(enhancement_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::ENHANCEMENT, enhancement_id))
    }

    pub async fn get_enhancements_for_generation(
        &self,
        generation_id: &str,
    ) -> Result<Vec<EnhancementRecord>> {
        self.get_generation(generation_id).await?;
        self.repository
            .find_enhancements_by_generation(generation_id)
            .await
    }

    pub async fn fetch_enhancements(&self, page: PageRequest) -> Result<Page<EnhancementRecord>> {
        self.repository.find_all_enhancements(page).await
    }

    pub async fn find_enhancements_by_status(
        &self,
        status: &EnhancementStatus,
    ) -> Result<Vec<EnhancementRecord>> {
        self.repository.find_enhancements_by_status(status).await
    }

    // Mutations

    pub async fn retry_generation(&self, generation_id: &str) -> Result<GenerationCreated> {
        self.retry_engine.retry_generation(generation_id).await
    }

    pub async fn retry_enhancement(&self, enhancement_id: &str) -> Result<EnhancementCreated> {
        self.retry_engine.retry_enhancement(enhancement_id).await
    }

    /// Persist generation fields and reconcile its enhancement list
    pub async fn update_generation(&self, generation: GenerationRecord) -> Result<GenerationRecord> {
        self.reconciler.update_generation(generation).await
    }

    // Aggregation

    pub async fn is_generation_complete(&self, generation_id: &str) -> Result<bool> {
        self.aggregation.is_generation_complete(generation_id).await
    }

    pub async fn is_request_complete(&self, request_id: &str) -> Result<bool> {
        self.aggregation.is_request_complete(request_id).await
    }

    pub async fn final_artifact_urls(&self, generation_id: &str) -> Result<BTreeSet<String>> {
        self.aggregation.final_artifact_urls(generation_id).await
    }

    /// Completion summary for the notifier. Fails with `InvalidState` while
    /// any generation of the request is still incomplete.
    #[instrument(skip(self))]
    pub async fn requests_finished_event(&self, request_id: &str) -> Result<RequestsFinished> {
        let request = self.get_request(request_id).await?;
        let generations = self.repository.find_generations_by_request(request_id).await?;
        if !aggregation::is_request_complete(&generations) {
            return Err(OrchestratorError::invalid_state(format!(
                "Request {request_id} is not complete"
            )));
        }
        Ok(event_mapper::requests_finished(&request, &generations))
    }
}
