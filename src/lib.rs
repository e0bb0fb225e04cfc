#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # SBOM Orchestrator
//!
//! Orchestration core for Software Bill of Materials generation.
//!
//! ## Overview
//!
//! A caller submits a batch of build targets. For every target the core picks
//! a recipe (one generator tool plus an ordered chain of enhancer tools),
//! records a Request → Generation → Enhancement hierarchy and dispatches work
//! items to external workers. Worker status reports move generations and
//! enhancements through their lifecycle; failed steps are retried only on
//! explicit request.
//!
//! ## Module Organization
//!
//! - [`config`] - Service settings and the recipe catalog
//! - [`state_machine`] - Status enums and the shared transition table
//! - [`models`] - Request, generation, enhancement and recipe values
//! - [`messaging`] - Outbound work events and the dispatch seam
//! - [`repository`] - Persistence contract with in-memory and PostgreSQL stores
//! - [`database`] - Pool construction and embedded migrations
//! - [`orchestration`] - Resolver, builder, aggregation, retry, reconciliation
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured `tracing` setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sbom_orchestrator::config::ConfigManager;
//! use sbom_orchestrator::messaging::BroadcastWorkDispatcher;
//! use sbom_orchestrator::orchestration::{BatchSubmission, GenerationTarget, OrchestrationSystem};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let dispatcher = Arc::new(BroadcastWorkDispatcher::default());
//! let system = OrchestrationSystem::in_memory(config, dispatcher.clone())?;
//!
//! let mut work = dispatcher.subscribe();
//! let request_id = system
//!     .requests()
//!     .submit(BatchSubmission::new(vec![GenerationTarget::new("RPM", "bash-5.2")]))
//!     .await?;
//!
//! let event = work.recv().await?;
//! println!("request {request_id} dispatched {}", event.entity_id());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live next to the code; integration tests under `tests/` run
//! against the in-memory repository and a broadcast dispatcher.

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod repository;
pub mod state_machine;

pub use config::{ConfigManager, OrchestratorConfig, RecipeCatalog};
pub use error::{OrchestratorError, Result};
pub use messaging::{BroadcastWorkDispatcher, WorkDispatcher, WorkEvent};
pub use models::{
    EnhancementRecord, GenerationRecord, Page, PageRequest, Recipe, RequestGraph, RequestRecord,
};
pub use orchestration::{
    AdministrationService, BatchSubmission, GenerationTarget, OrchestrationSystem, RequestProcessor,
    ResultProcessor, RetryEngine, StatusReport,
};
pub use repository::{InMemoryStatusRepository, PgStatusRepository, StatusRepository};
pub use state_machine::{EnhancementStatus, GenerationStatus, RequestStatus, StatusEvent};
