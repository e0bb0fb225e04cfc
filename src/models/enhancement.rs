//! # Enhancement Model
//!
//! One step in a generation's post-processing chain. Step `n` consumes the
//! output of step `n - 1`, and step `0` consumes the generation's own output.
//!
//! Maps to the `enhancements` table. `generation_db_id` is nullable: a
//! reconciliation that drops an enhancement from its generation detaches it
//! rather than deleting it.

use crate::models::recipe::ToolSpec;
use crate::state_machine::EnhancementStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementRecord {
    /// Business identifier. Empty on records that reconciliation should create.
    #[serde(default)]
    pub enhancement_id: String,
    /// Owning generation; `None` once detached
    pub generation_id: Option<String>,
    pub request_id: String,
    /// Zero-based position in the owning generation's chain
    pub index: u32,
    pub enhancer_name: String,
    pub enhancer_version: String,
    #[serde(default)]
    pub enhancer_options: BTreeMap<String, String>,
    pub status: EnhancementStatus,
    pub result: Option<i32>,
    pub reason: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    /// Artifacts produced by this step
    #[serde(default)]
    pub artifact_urls: BTreeSet<String>,
}

impl EnhancementRecord {
    /// Enhancer descriptor as persisted
    pub fn enhancer(&self) -> ToolSpec {
        ToolSpec {
            name: self.enhancer_name.clone(),
            version: self.enhancer_version.clone(),
            options: self.enhancer_options.clone(),
        }
    }

    pub fn has_id(&self) -> bool {
        !self.enhancement_id.trim().is_empty()
    }

    /// Clear the outcome of a failed run so it can be dispatched again
    pub fn reset_for_retry(&mut self, now: DateTime<Utc>) {
        self.status = EnhancementStatus::New;
        self.reason = None;
        self.result = None;
        self.finished = None;
        self.updated = now;
    }

    /// Copy every mutable field from `incoming`, keeping identity and linkage
    pub fn apply_update(&mut self, incoming: &EnhancementRecord) {
        self.index = incoming.index;
        self.enhancer_name = incoming.enhancer_name.clone();
        self.enhancer_version = incoming.enhancer_version.clone();
        self.enhancer_options = incoming.enhancer_options.clone();
        self.status = incoming.status.clone();
        self.result = incoming.result;
        self.reason = incoming.reason.clone();
        self.created = incoming.created;
        self.updated = incoming.updated;
        self.finished = incoming.finished;
        self.artifact_urls = incoming.artifact_urls.clone();
    }

    /// Copy the fields a status report owns
    pub fn apply_status_fields(&mut self, incoming: &EnhancementRecord) {
        self.status = incoming.status.clone();
        self.result = incoming.result;
        self.reason = incoming.reason.clone();
        self.artifact_urls = incoming.artifact_urls.clone();
        self.updated = incoming.updated;
        self.finished = incoming.finished;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> EnhancementRecord {
        let now = Utc::now();
        EnhancementRecord {
            enhancement_id: id.to_string(),
            generation_id: Some("G1".to_string()),
            request_id: "R1".to_string(),
            index: 0,
            enhancer_name: "rpm-enhancer".to_string(),
            enhancer_version: "1.0.0".to_string(),
            enhancer_options: BTreeMap::new(),
            status: EnhancementStatus::Failed,
            result: Some(3),
            reason: Some("boom".to_string()),
            created: now,
            updated: now,
            finished: Some(now),
            artifact_urls: BTreeSet::new(),
        }
    }

    #[test]
    fn test_reset_for_retry_clears_outcome() {
        let mut record = sample("E1");
        let later = record.updated + chrono::Duration::seconds(5);
        record.reset_for_retry(later);

        assert_eq!(record.status, EnhancementStatus::New);
        assert_eq!(record.result, None);
        assert_eq!(record.reason, None);
        assert_eq!(record.finished, None);
        assert_eq!(record.updated, later);
    }

    #[test]
    fn test_apply_update_keeps_identity() {
        let mut current = sample("E1");
        let mut incoming = sample("E1");
        incoming.generation_id = Some("OTHER".to_string());
        incoming.index = 2;
        incoming.status = EnhancementStatus::Finished;
        incoming.artifact_urls.insert("https://example.test/e1.json".to_string());

        current.apply_update(&incoming);

        assert_eq!(current.generation_id.as_deref(), Some("G1"));
        assert_eq!(current.index, 2);
        assert_eq!(current.status, EnhancementStatus::Finished);
        assert_eq!(current.artifact_urls.len(), 1);
    }

    #[test]
    fn test_blank_id_means_create() {
        assert!(!sample("  ").has_id());
        assert!(sample("E1").has_id());
    }
}
