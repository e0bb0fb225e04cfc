//! # Request Model
//!
//! One caller-submitted batch. A request owns its generations and the
//! publisher descriptors that are notified once every generation has
//! completed.
//!
//! ## Database Schema
//!
//! Maps to the `requests` and `publishers` tables:
//! ```sql
//! CREATE TABLE requests (
//!   db_id BIGSERIAL PRIMARY KEY,
//!   request_id TEXT NOT NULL UNIQUE,
//!   status TEXT NOT NULL,
//!   creation_date TIMESTAMPTZ NOT NULL
//! );
//! ```

use crate::models::generation::GenerationRecord;
use crate::state_machine::RequestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Post-completion notification target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherRecord {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl PublisherRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_options(mut self, options: BTreeMap<String, String>) -> Self {
        self.options = options;
        self
    }
}

/// Persisted request row, without its generations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Externally visible business identifier, immutable once assigned
    pub request_id: String,
    pub status: RequestStatus,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub publishers: Vec<PublisherRecord>,
}

impl RequestRecord {
    pub fn new(request_id: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            request_id: request_id.into(),
            status: RequestStatus::Received,
            creation_date: created,
            publishers: Vec::new(),
        }
    }
}

/// Complete request hierarchy as built in memory before its single
/// transactional write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGraph {
    pub request: RequestRecord,
    pub generations: Vec<GenerationRecord>,
}

impl RequestGraph {
    pub fn request_id(&self) -> &str {
        &self.request.request_id
    }

    /// Total number of enhancements across all generations
    pub fn enhancement_count(&self) -> usize {
        self.generations
            .iter()
            .map(|generation| generation.enhancements.len())
            .sum()
    }
}
