//! # Outbound Event Payloads
//!
//! Work items sent to generator and enhancer workers, and the completion
//! summary handed to publishers. Every payload carries an [`EventContext`]
//! envelope. Field names are camelCase on the wire.

use crate::constants::{COMPONENT_NAME, EVENT_VERSION};
use crate::models::{EnhancerSpec, GenerationRequestSpec, Recipe, ToolSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Publisher descriptor as sent on the wire
pub type PublisherSpec = ToolSpec;

/// Envelope metadata shared by every outbound event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    /// Fresh per emitted event, never reused across retries
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    /// Request id the event belongs to
    pub correlation_id: String,
    pub event_version: String,
    pub timestamp: DateTime<Utc>,
}

impl EventContext {
    pub fn new(
        event_type: &str,
        correlation_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            source: COMPONENT_NAME.to_string(),
            correlation_id: correlation_id.into(),
            event_version: EVENT_VERSION.to_string(),
            timestamp,
        }
    }
}

/// Generation work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationCreated {
    pub context: EventContext,
    pub data: GenerationData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationData {
    pub request_id: String,
    pub generation_request: GenerationRequestSpec,
    pub recipe: Recipe,
}

/// Enhancement work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementCreated {
    pub context: EventContext,
    pub data: EnhancementData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementData {
    pub enhancement_id: String,
    pub generation_id: String,
    pub request_id: String,
    pub enhancer: EnhancerSpec,
    pub generation_request: GenerationRequestSpec,
    /// Output of the preceding step
    pub input_artifact_urls: BTreeSet<String>,
}

/// Completion summary for publishers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestsFinished {
    pub context: EventContext,
    pub data: RequestsFinishedData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestsFinishedData {
    pub request_id: String,
    pub completed_generations: Vec<CompletedGeneration>,
    pub publishers: Vec<PublisherSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedGeneration {
    pub generation_request: GenerationRequestSpec,
    pub final_artifact_urls: BTreeSet<String>,
}

/// Anything the orchestrator hands to the work transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event")]
pub enum WorkEvent {
    Generation(GenerationCreated),
    Enhancement(EnhancementCreated),
}

impl WorkEvent {
    pub fn context(&self) -> &EventContext {
        match self {
            Self::Generation(event) => &event.context,
            Self::Enhancement(event) => &event.context,
        }
    }

    /// Identifier of the entity this work item is for
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Generation(event) => &event.data.generation_request.generation_id,
            Self::Enhancement(event) => &event.data.enhancement_id,
        }
    }

    pub fn as_generation(&self) -> Option<&GenerationCreated> {
        match self {
            Self::Generation(event) => Some(event),
            Self::Enhancement(_) => None,
        }
    }

    pub fn as_enhancement(&self) -> Option<&EnhancementCreated> {
        match self {
            Self::Enhancement(event) => Some(event),
            Self::Generation(_) => None,
        }
    }
}

impl From<GenerationCreated> for WorkEvent {
    fn from(event: GenerationCreated) -> Self {
        Self::Generation(event)
    }
}

impl From<EnhancementCreated> for WorkEvent {
    fn from(event: EnhancementCreated) -> Self {
        Self::Enhancement(event)
    }
}
