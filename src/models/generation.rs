//! # Generation Model
//!
//! One generator run for a single (request, target) pair, together with the
//! ordered enhancement chain seeded from the target type's recipe.
//!
//! ## Overview
//!
//! A generation is created `NEW` by the hierarchy builder and then mutated in
//! place by worker status reports and by retry resets. Its enhancement chain
//! is fixed at creation: indices are contiguous from zero and never
//! reassigned. The only operation that changes chain membership afterwards is
//! reconciliation.
//!
//! ## Database Schema
//!
//! Maps to the `generations` table:
//! ```sql
//! CREATE TABLE generations (
//!   db_id BIGSERIAL PRIMARY KEY,
//!   generation_id TEXT NOT NULL UNIQUE,
//!   request_db_id BIGINT REFERENCES requests(db_id) ON DELETE CASCADE,
//!   target_type TEXT NOT NULL,
//!   target_identifier TEXT NOT NULL,
//!   generator_name TEXT NOT NULL,
//!   generator_version TEXT NOT NULL,
//!   generator_options JSONB NOT NULL DEFAULT '{}',
//!   status TEXT NOT NULL,
//!   result INTEGER,
//!   reason TEXT,
//!   artifact_urls TEXT[] NOT NULL DEFAULT '{}',
//!   -- created / updated / finished timestamps
//! );
//! ```

use crate::models::enhancement::EnhancementRecord;
use crate::models::recipe::{Target, ToolSpec};
use crate::state_machine::GenerationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Persisted generation with its enhancement chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation_id: String,
    pub request_id: String,
    pub target_type: String,
    pub target_identifier: String,
    pub generator_name: String,
    pub generator_version: String,
    /// Tool defaults merged with `handler-` prefixed caller options
    #[serde(default)]
    pub generator_options: BTreeMap<String, String>,
    pub status: GenerationStatus,
    pub result: Option<i32>,
    pub reason: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    /// Artifacts produced by the generator itself
    #[serde(default)]
    pub artifact_urls: BTreeSet<String>,
    #[serde(default)]
    pub enhancements: Vec<EnhancementRecord>,
}

impl GenerationRecord {
    pub fn target(&self) -> Target {
        Target::new(&self.target_type, &self.target_identifier)
    }

    /// Generator descriptor as persisted
    pub fn generator(&self) -> ToolSpec {
        ToolSpec {
            name: self.generator_name.clone(),
            version: self.generator_version.clone(),
            options: self.generator_options.clone(),
        }
    }

    /// Enhancements ordered by step index
    pub fn sorted_enhancements(&self) -> Vec<&EnhancementRecord> {
        let mut sorted: Vec<&EnhancementRecord> = self.enhancements.iter().collect();
        sorted.sort_by_key(|enhancement| enhancement.index);
        sorted
    }

    pub fn enhancement_at(&self, index: u32) -> Option<&EnhancementRecord> {
        self.enhancements
            .iter()
            .find(|enhancement| enhancement.index == index)
    }

    pub fn has_enhancements(&self) -> bool {
        !self.enhancements.is_empty()
    }

    /// Clear the outcome of a failed run so it can be dispatched again
    pub fn reset_for_retry(&mut self, now: DateTime<Utc>) {
        self.status = GenerationStatus::New;
        self.reason = None;
        self.result = None;
        self.finished = None;
        self.updated = now;
    }

    /// Copy the fields a status report owns, leaving configuration untouched
    pub fn apply_status_fields(&mut self, incoming: &GenerationRecord) {
        self.status = incoming.status.clone();
        self.result = incoming.result;
        self.reason = incoming.reason.clone();
        self.artifact_urls = incoming.artifact_urls.clone();
        self.updated = incoming.updated;
        self.finished = incoming.finished;
    }
}
