//! # Persistence Contract
//!
//! [`StatusRepository`] is everything the orchestration core needs from the
//! store: point lookups and paginated listings by business identifier,
//! status-filtered listings, whole-graph inserts and the update operations
//! used by result processing, retry and reconciliation.
//!
//! Every write executes in a single transactional scope. The
//! `update_*_if_status` and `reset_*_for_retry` operations are
//! compare-and-set: they write only when the stored status still equals the
//! expected one, which is what serialises concurrent retries and reports on
//! the same entity. They touch status-owned fields only, so a reconciliation
//! that lands between a read and the conditional write is never reverted.
//!
//! Listings are ordered by insertion.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::{
    EnhancementRecord, GenerationRecord, Page, PageRequest, RequestGraph, RequestRecord,
};
use crate::state_machine::{EnhancementStatus, GenerationStatus, RequestStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::InMemoryStatusRepository;
pub use postgres::PgStatusRepository;

#[async_trait]
pub trait StatusRepository: Send + Sync + std::fmt::Debug {
    // Requests

    /// Insert a request with its whole generation and enhancement graph.
    /// Fails with `InvalidInput` when the request id is already taken.
    async fn save_request(&self, graph: &RequestGraph) -> Result<()>;

    async fn find_request(&self, request_id: &str) -> Result<Option<RequestRecord>>;

    async fn find_all_requests(&self, page: PageRequest) -> Result<Page<RequestRecord>>;

    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()>;

    // Generations

    /// Insert a generation and its enhancements; a no-op when the id exists
    async fn save_generation(&self, generation: &GenerationRecord) -> Result<()>;

    async fn find_generation(&self, generation_id: &str) -> Result<Option<GenerationRecord>>;

    async fn find_all_generations(&self, page: PageRequest) -> Result<Page<GenerationRecord>>;

    async fn find_generations_by_request(&self, request_id: &str) -> Result<Vec<GenerationRecord>>;

    async fn find_generations_by_request_paged(
        &self,
        request_id: &str,
        page: PageRequest,
    ) -> Result<Page<GenerationRecord>>;

    async fn find_generations_by_status(
        &self,
        status: &GenerationStatus,
    ) -> Result<Vec<GenerationRecord>>;

    /// Update generation fields and reconcile its enhancement list in one
    /// transaction. Every incoming enhancement must carry an id. Returns the
    /// generation as now stored.
    async fn update_generation(&self, generation: &GenerationRecord) -> Result<GenerationRecord>;

    /// Write the status-owned fields (status, result, reason, artifact URLs,
    /// updated, finished) only if the stored status equals `expected`.
    /// `Ok(false)` means another writer got there first.
    async fn update_generation_if_status(
        &self,
        generation: &GenerationRecord,
        expected: &GenerationStatus,
    ) -> Result<bool>;

    /// Move a `FAILED` generation back to `NEW`, clearing result, reason and
    /// finished. `Ok(false)` when it is no longer `FAILED`.
    async fn reset_generation_for_retry(&self, generation_id: &str, now: DateTime<Utc>)
        -> Result<bool>;

    // Enhancements

    /// Insert an enhancement; a no-op when the id exists
    async fn save_enhancement(&self, enhancement: &EnhancementRecord) -> Result<()>;

    async fn find_enhancement(&self, enhancement_id: &str) -> Result<Option<EnhancementRecord>>;

    async fn find_all_enhancements(&self, page: PageRequest) -> Result<Page<EnhancementRecord>>;

    /// Enhancements currently linked to the generation, ordered by index
    async fn find_enhancements_by_generation(
        &self,
        generation_id: &str,
    ) -> Result<Vec<EnhancementRecord>>;

    async fn find_enhancements_by_status(
        &self,
        status: &EnhancementStatus,
    ) -> Result<Vec<EnhancementRecord>>;

    async fn update_enhancement(&self, enhancement: &EnhancementRecord) -> Result<()>;

    /// Status-owned counterpart of [`Self::update_generation_if_status`]
    async fn update_enhancement_if_status(
        &self,
        enhancement: &EnhancementRecord,
        expected: &EnhancementStatus,
    ) -> Result<bool>;

    async fn reset_enhancement_for_retry(&self, enhancement_id: &str, now: DateTime<Utc>)
        -> Result<bool>;
}
