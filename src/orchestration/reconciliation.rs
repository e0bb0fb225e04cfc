//! # Enhancement Reconciliation
//!
//! Merges an incoming enhancement list into a generation's persisted chain,
//! matching records by business identifier:
//!
//! - id linked to this generation: update the linked record in place
//! - id stored but linked elsewhere (or detached): adopt it into this generation
//! - no id, or an id unknown to the store: create a new record
//!
//! Afterwards the chain is exactly the incoming set. Previously linked
//! records missing from it are detached, not deleted.
//!
//! Planning is pure ([`plan_reconciliation`]); each store applies the plan
//! inside the same transaction as the generation's own field update.

use crate::constants::entities;
use crate::error::{OrchestratorError, Result};
use crate::logging::log_generation_operation;
use crate::models::{EnhancementRecord, GenerationRecord};
use crate::orchestration::identifiers::IdGenerator;
use crate::repository::StatusRepository;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// What happens to one incoming enhancement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Linked record updated in place
    Update(EnhancementRecord),
    /// Record found elsewhere in the store, re-linked to this generation
    Adopt {
        previous_generation_id: Option<String>,
        record: EnhancementRecord,
    },
    /// New record
    Create(EnhancementRecord),
}

impl ReconcileAction {
    /// The record as it will be stored
    pub fn record(&self) -> &EnhancementRecord {
        match self {
            Self::Update(record) | Self::Create(record) => record,
            Self::Adopt { record, .. } => record,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Adopt { .. } => "adopt",
            Self::Create(_) => "create",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub actions: Vec<ReconcileAction>,
    /// Previously linked ids absent from the incoming set
    pub detached: Vec<String>,
}

impl ReconciliationPlan {
    /// The generation's chain once the plan is applied, ordered by index
    pub fn enhancements(&self) -> Vec<EnhancementRecord> {
        let mut records: Vec<EnhancementRecord> =
            self.actions.iter().map(|action| action.record().clone()).collect();
        records.sort_by_key(|record| record.index);
        records
    }

    pub fn count(&self, kind: &str) -> usize {
        self.actions.iter().filter(|action| action.kind() == kind).count()
    }
}

/// Decide how each incoming enhancement is stored.
///
/// `linked` are the records currently owned by the generation;
/// `stored_elsewhere` holds any other stored records whose ids appear in
/// `incoming`. Incoming records must already carry ids, be unique by id and
/// be unique by index.
pub fn plan_reconciliation(
    generation_id: &str,
    request_id: &str,
    linked: &[EnhancementRecord],
    incoming: &[EnhancementRecord],
    stored_elsewhere: &HashMap<String, EnhancementRecord>,
) -> Result<ReconciliationPlan> {
    let mut seen_ids = HashSet::new();
    let mut seen_indices = HashSet::new();
    for record in incoming {
        if !record.has_id() {
            return Err(OrchestratorError::InvalidInput(
                "enhancement id must be assigned before reconciliation".to_string(),
            ));
        }
        if !seen_ids.insert(record.enhancement_id.as_str()) {
            return Err(OrchestratorError::InvalidInput(format!(
                "enhancement {} listed more than once",
                record.enhancement_id
            )));
        }
        if !seen_indices.insert(record.index) {
            return Err(OrchestratorError::InvalidInput(format!(
                "enhancement index {} listed more than once",
                record.index
            )));
        }
    }

    let linked_by_id: HashMap<&str, &EnhancementRecord> = linked
        .iter()
        .map(|record| (record.enhancement_id.as_str(), record))
        .collect();

    let actions = incoming
        .iter()
        .map(|record| {
            if let Some(current) = linked_by_id.get(record.enhancement_id.as_str()) {
                let mut updated = (*current).clone();
                updated.apply_update(record);
                ReconcileAction::Update(updated)
            } else if let Some(stored) = stored_elsewhere.get(&record.enhancement_id) {
                let mut adopted = stored.clone();
                adopted.apply_update(record);
                adopted.generation_id = Some(generation_id.to_string());
                adopted.request_id = request_id.to_string();
                ReconcileAction::Adopt {
                    previous_generation_id: stored.generation_id.clone(),
                    record: adopted,
                }
            } else {
                let mut created = record.clone();
                created.generation_id = Some(generation_id.to_string());
                created.request_id = request_id.to_string();
                ReconcileAction::Create(created)
            }
        })
        .collect();

    let detached = linked
        .iter()
        .filter(|record| !seen_ids.contains(record.enhancement_id.as_str()))
        .map(|record| record.enhancement_id.clone())
        .collect();

    Ok(ReconciliationPlan { actions, detached })
}

/// Generation update entry point: mints ids for new enhancements and hands
/// the whole update to the store as one transaction.
#[derive(Debug, Clone)]
pub struct EnhancementReconciler {
    repository: Arc<dyn StatusRepository>,
    ids: Arc<dyn IdGenerator>,
}

impl EnhancementReconciler {
    pub fn new(repository: Arc<dyn StatusRepository>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { repository, ids }
    }

    /// Replace `generation`'s enhancement chain with `incoming` and persist
    /// the generation's other fields alongside. Returns the chain as stored.
    #[instrument(skip(self, generation, incoming), fields(generation_id = %generation.generation_id))]
    pub async fn reconcile(
        &self,
        mut generation: GenerationRecord,
        incoming: Vec<EnhancementRecord>,
    ) -> Result<Vec<EnhancementRecord>> {
        generation.enhancements = incoming;
        let stored = self.update_generation(generation).await?;
        Ok(stored.enhancements)
    }

    /// Persist a generation whose `enhancements` field is the desired chain
    #[instrument(skip(self, generation), fields(generation_id = %generation.generation_id))]
    pub async fn update_generation(&self, mut generation: GenerationRecord) -> Result<GenerationRecord> {
        if self
            .repository
            .find_generation(&generation.generation_id)
            .await?
            .is_none()
        {
            return Err(OrchestratorError::not_found(
                entities::GENERATION,
                generation.generation_id,
            ));
        }

        let mut minted = 0usize;
        for enhancement in &mut generation.enhancements {
            if !enhancement.has_id() {
                enhancement.enhancement_id = self.ids.next_id();
                minted += 1;
            }
        }
        debug!(
            incoming = generation.enhancements.len(),
            minted, "Reconciling enhancement chain"
        );

        let stored = self.repository.update_generation(&generation).await?;

        log_generation_operation(
            "update",
            &stored.generation_id,
            Some(&stored.request_id),
            stored.status.as_str(),
            Some(&format!("enhancements={}", stored.enhancements.len())),
        );
        Ok(stored)
    }
}
