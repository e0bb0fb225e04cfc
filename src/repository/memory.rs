//! In-process [`StatusRepository`].
//!
//! The whole store sits behind one `parking_lot::RwLock`. Every write runs
//! under a single write guard, so each operation is atomic and conditional
//! status updates are serialised. Suitable for tests, tooling and
//! single-process deployments.

use super::StatusRepository;
use crate::constants::entities;
use crate::error::{OrchestratorError, Result};
use crate::models::{
    EnhancementRecord, GenerationRecord, Page, PageRequest, RequestGraph, RequestRecord,
};
use crate::orchestration::reconciliation::{plan_reconciliation, ReconcileAction};
use crate::state_machine::{EnhancementStatus, GenerationStatus, Lifecycle, RequestStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct Store {
    next_seq: u64,
    requests: HashMap<String, Row<RequestRecord>>,
    /// Stored with an empty `enhancements` list; chains are assembled on read
    generations: HashMap<String, Row<GenerationRecord>>,
    enhancements: HashMap<String, Row<EnhancementRecord>>,
}

impl Store {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn insert_generation(&mut self, generation: &GenerationRecord) {
        let mut row = generation.clone();
        let chain = std::mem::take(&mut row.enhancements);
        let seq = self.next_seq();
        self.generations
            .insert(row.generation_id.clone(), Row { seq, value: row });
        for enhancement in chain {
            self.insert_enhancement(enhancement);
        }
    }

    fn insert_enhancement(&mut self, enhancement: EnhancementRecord) {
        let seq = self.next_seq();
        self.enhancements
            .insert(enhancement.enhancement_id.clone(), Row { seq, value: enhancement });
    }

    /// Reject enhancement ids that are already stored or repeated in `chain`
    fn check_new_enhancements<'a>(
        &self,
        chain: impl IntoIterator<Item = &'a EnhancementRecord>,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        for enhancement in chain {
            if self.enhancements.contains_key(&enhancement.enhancement_id)
                || !seen.insert(enhancement.enhancement_id.as_str())
            {
                return Err(OrchestratorError::InvalidInput(format!(
                    "enhancement {} already exists",
                    enhancement.enhancement_id
                )));
            }
        }
        Ok(())
    }

    fn chain_of(&self, generation_id: &str) -> Vec<EnhancementRecord> {
        let mut chain: Vec<EnhancementRecord> = self
            .enhancements
            .values()
            .filter(|row| row.value.generation_id.as_deref() == Some(generation_id))
            .map(|row| row.value.clone())
            .collect();
        chain.sort_by_key(|enhancement| enhancement.index);
        chain
    }

    fn assemble(&self, row: &GenerationRecord) -> GenerationRecord {
        let mut generation = row.clone();
        generation.enhancements = self.chain_of(&generation.generation_id);
        generation
    }

    fn generations_where(&self, keep: impl Fn(&GenerationRecord) -> bool) -> Vec<GenerationRecord> {
        let mut rows: Vec<&Row<GenerationRecord>> =
            self.generations.values().filter(|row| keep(&row.value)).collect();
        rows.sort_by_key(|row| row.seq);
        rows.into_iter().map(|row| self.assemble(&row.value)).collect()
    }

    fn enhancements_where(
        &self,
        keep: impl Fn(&EnhancementRecord) -> bool,
    ) -> Vec<EnhancementRecord> {
        ordered(self.enhancements.values().filter(|row| keep(&row.value)))
    }
}

fn ordered<'a, T: Clone + 'a>(rows: impl Iterator<Item = &'a Row<T>>) -> Vec<T> {
    let mut rows: Vec<&Row<T>> = rows.collect();
    rows.sort_by_key(|row| row.seq);
    rows.into_iter().map(|row| row.value.clone()).collect()
}

fn write_generation_fields(stored: &mut GenerationRecord, incoming: &GenerationRecord) {
    stored.generator_name = incoming.generator_name.clone();
    stored.generator_version = incoming.generator_version.clone();
    stored.generator_options = incoming.generator_options.clone();
    stored.status = incoming.status.clone();
    stored.result = incoming.result;
    stored.reason = incoming.reason.clone();
    stored.updated = incoming.updated;
    stored.finished = incoming.finished;
    stored.artifact_urls = incoming.artifact_urls.clone();
}

#[derive(Debug, Default)]
pub struct InMemoryStatusRepository {
    store: RwLock<Store>,
}

impl InMemoryStatusRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusRepository for InMemoryStatusRepository {
    async fn save_request(&self, graph: &RequestGraph) -> Result<()> {
        let mut store = self.store.write();
        let request_id = graph.request_id();
        if store.requests.contains_key(request_id) {
            return Err(OrchestratorError::InvalidInput(format!(
                "request {request_id} already exists"
            )));
        }
        for generation in &graph.generations {
            if store.generations.contains_key(&generation.generation_id) {
                return Err(OrchestratorError::InvalidInput(format!(
                    "generation {} already exists",
                    generation.generation_id
                )));
            }
        }
        store.check_new_enhancements(graph.generations.iter().flat_map(|g| &g.enhancements))?;

        let seq = store.next_seq();
        store.requests.insert(
            request_id.to_string(),
            Row {
                seq,
                value: graph.request.clone(),
            },
        );
        for generation in &graph.generations {
            store.insert_generation(generation);
        }

        debug!(
            request_id = %request_id,
            generations = graph.generations.len(),
            enhancements = graph.enhancement_count(),
            "Stored request graph"
        );
        Ok(())
    }

    async fn find_request(&self, request_id: &str) -> Result<Option<RequestRecord>> {
        Ok(self
            .store
            .read()
            .requests
            .get(request_id)
            .map(|row| row.value.clone()))
    }

    async fn find_all_requests(&self, page: PageRequest) -> Result<Page<RequestRecord>> {
        let store = self.store.read();
        let all = ordered(store.requests.values());
        Ok(Page::from_slice(&all, page))
    }

    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()> {
        let mut store = self.store.write();
        let row = store
            .requests
            .get_mut(request_id)
            .ok_or_else(|| OrchestratorError::not_found(entities::REQUEST, request_id))?;
        row.value.status = status;
        Ok(())
    }

    async fn save_generation(&self, generation: &GenerationRecord) -> Result<()> {
        let mut store = self.store.write();
        if store.generations.contains_key(&generation.generation_id) {
            return Ok(());
        }
        store.check_new_enhancements(&generation.enhancements)?;
        store.insert_generation(generation);
        Ok(())
    }

    async fn find_generation(&self, generation_id: &str) -> Result<Option<GenerationRecord>> {
        let store = self.store.read();
        Ok(store
            .generations
            .get(generation_id)
            .map(|row| store.assemble(&row.value)))
    }

    async fn find_all_generations(&self, page: PageRequest) -> Result<Page<GenerationRecord>> {
        let all = self.store.read().generations_where(|_| true);
        Ok(Page::from_slice(&all, page))
    }

    async fn find_generations_by_request(&self, request_id: &str) -> Result<Vec<GenerationRecord>> {
        Ok(self
            .store
            .read()
            .generations_where(|generation| generation.request_id == request_id))
    }

    async fn find_generations_by_request_paged(
        &self,
        request_id: &str,
        page: PageRequest,
    ) -> Result<Page<GenerationRecord>> {
        let all = self.find_generations_by_request(request_id).await?;
        Ok(Page::from_slice(&all, page))
    }

    async fn find_generations_by_status(
        &self,
        status: &GenerationStatus,
    ) -> Result<Vec<GenerationRecord>> {
        Ok(self
            .store
            .read()
            .generations_where(|generation| &generation.status == status))
    }

    async fn update_generation(&self, generation: &GenerationRecord) -> Result<GenerationRecord> {
        let mut store = self.store.write();
        let generation_id = generation.generation_id.as_str();
        if !store.generations.contains_key(generation_id) {
            return Err(OrchestratorError::not_found(entities::GENERATION, generation_id));
        }

        let linked = store.chain_of(generation_id);
        let elsewhere: HashMap<String, EnhancementRecord> = generation
            .enhancements
            .iter()
            .filter_map(|incoming| store.enhancements.get(&incoming.enhancement_id))
            .map(|row| (row.value.enhancement_id.clone(), row.value.clone()))
            .collect();

        let request_id = store
            .generations
            .get(generation_id)
            .map(|row| row.value.request_id.clone())
            .unwrap_or_default();
        // Planning can fail, so nothing is written before it succeeds
        let plan = plan_reconciliation(
            generation_id,
            &request_id,
            &linked,
            &generation.enhancements,
            &elsewhere,
        )?;

        if let Some(row) = store.generations.get_mut(generation_id) {
            write_generation_fields(&mut row.value, generation);
        }
        for detached in &plan.detached {
            if let Some(row) = store.enhancements.get_mut(detached) {
                row.value.generation_id = None;
            }
        }
        for action in plan.actions {
            match action {
                ReconcileAction::Update(record) | ReconcileAction::Adopt { record, .. } => {
                    if let Some(row) = store.enhancements.get_mut(&record.enhancement_id) {
                        row.value = record;
                    }
                }
                ReconcileAction::Create(record) => store.insert_enhancement(record),
            }
        }

        store
            .generations
            .get(generation_id)
            .map(|row| store.assemble(&row.value))
            .ok_or_else(|| OrchestratorError::not_found(entities::GENERATION, generation_id))
    }

    async fn update_generation_if_status(
        &self,
        generation: &GenerationRecord,
        expected: &GenerationStatus,
    ) -> Result<bool> {
        let mut store = self.store.write();
        let row = store
            .generations
            .get_mut(&generation.generation_id)
            .ok_or_else(|| {
                OrchestratorError::not_found(entities::GENERATION, &generation.generation_id)
            })?;
        if &row.value.status != expected {
            return Ok(false);
        }
        row.value.apply_status_fields(generation);
        Ok(true)
    }

    async fn reset_generation_for_retry(
        &self,
        generation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut store = self.store.write();
        let row = store
            .generations
            .get_mut(generation_id)
            .ok_or_else(|| OrchestratorError::not_found(entities::GENERATION, generation_id))?;
        if !row.value.status.is_failed() {
            return Ok(false);
        }
        row.value.reset_for_retry(now);
        Ok(true)
    }

    async fn save_enhancement(&self, enhancement: &EnhancementRecord) -> Result<()> {
        if !enhancement.has_id() {
            return Err(OrchestratorError::InvalidInput(
                "enhancement id must be assigned before saving".to_string(),
            ));
        }
        let mut store = self.store.write();
        if store.enhancements.contains_key(&enhancement.enhancement_id) {
            return Ok(());
        }
        store.insert_enhancement(enhancement.clone());
        Ok(())
    }

    async fn find_enhancement(&self, enhancement_id: &str) -> Result<Option<EnhancementRecord>> {
        Ok(self
            .store
            .read()
            .enhancements
            .get(enhancement_id)
            .map(|row| row.value.clone()))
    }

    async fn find_all_enhancements(&self, page: PageRequest) -> Result<Page<EnhancementRecord>> {
        let all = self.store.read().enhancements_where(|_| true);
        Ok(Page::from_slice(&all, page))
    }

    async fn find_enhancements_by_generation(
        &self,
        generation_id: &str,
    ) -> Result<Vec<EnhancementRecord>> {
        Ok(self.store.read().chain_of(generation_id))
    }

    async fn find_enhancements_by_status(
        &self,
        status: &EnhancementStatus,
    ) -> Result<Vec<EnhancementRecord>> {
        Ok(self
            .store
            .read()
            .enhancements_where(|enhancement| &enhancement.status == status))
    }

    async fn update_enhancement(&self, enhancement: &EnhancementRecord) -> Result<()> {
        let mut store = self.store.write();
        let row = store
            .enhancements
            .get_mut(&enhancement.enhancement_id)
            .ok_or_else(|| {
                OrchestratorError::not_found(entities::ENHANCEMENT, &enhancement.enhancement_id)
            })?;
        row.value.apply_update(enhancement);
        Ok(())
    }

    async fn update_enhancement_if_status(
        &self,
        enhancement: &EnhancementRecord,
        expected: &EnhancementStatus,
    ) -> Result<bool> {
        let mut store = self.store.write();
        let row = store
            .enhancements
            .get_mut(&enhancement.enhancement_id)
            .ok_or_else(|| {
                OrchestratorError::not_found(entities::ENHANCEMENT, &enhancement.enhancement_id)
            })?;
        if &row.value.status != expected {
            return Ok(false);
        }
        row.value.apply_status_fields(enhancement);
        Ok(true)
    }

    async fn reset_enhancement_for_retry(
        &self,
        enhancement_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut store = self.store.write();
        let row = store
            .enhancements
            .get_mut(enhancement_id)
            .ok_or_else(|| OrchestratorError::not_found(entities::ENHANCEMENT, enhancement_id))?;
        if !row.value.status.is_failed() {
            return Ok(false);
        }
        row.value.reset_for_retry(now);
        Ok(true)
    }
}
