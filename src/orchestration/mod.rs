//! # Orchestration Core
//!
//! Turns caller batches into Request → Generation → Enhancement graphs,
//! tracks their status and re-dispatches failed work on request.
//!
//! ## Core Components
//!
//! - **RecipeResolver**: target type → generator plus ordered enhancer chain
//! - **merge_options**: overlays `handler-` prefixed caller options on tool defaults
//! - **HierarchyBuilder**: builds the whole request graph in memory
//! - **RequestProcessor**: persists a built graph and dispatches generation work
//! - **ResultProcessor**: applies worker status reports and advances enhancement chains
//! - **AggregationEngine**: completion queries and final artifact selection
//! - **RetryEngine**: `FAILED` → `NEW` reset followed by re-dispatch
//! - **EnhancementReconciler**: merge-on-update of a generation's enhancement list
//! - **AdministrationService**: read and retry surface for an API layer
//! - **OrchestrationSystem**: wiring from a loaded [`ConfigManager`](crate::config::ConfigManager)
//!
//! Status rules live in [`crate::state_machine`]; nothing here re-implements
//! a transition check.

pub mod administration;
pub mod aggregation;
pub mod event_mapper;
pub mod hierarchy_builder;
pub mod identifiers;
pub mod option_merger;
pub mod recipe_resolver;
pub mod reconciliation;
pub mod request_processor;
pub mod result_processor;
pub mod retry_engine;
pub mod system;

pub use administration::AdministrationService;
pub use aggregation::{
    final_artifact_urls, is_generation_complete, is_request_complete, AggregationEngine,
};
pub use hierarchy_builder::{BatchSubmission, GenerationTarget, HierarchyBuilder};
pub use identifiers::{IdGenerator, SequentialIdGenerator, TimeOrderedIdGenerator};
pub use option_merger::merge_options;
pub use recipe_resolver::RecipeResolver;
pub use reconciliation::{plan_reconciliation, EnhancementReconciler, ReconcileAction, ReconciliationPlan};
pub use request_processor::RequestProcessor;
pub use result_processor::{ReportOutcome, ResultProcessor, StatusReport};
pub use retry_engine::RetryEngine;
pub use system::OrchestrationSystem;
