//! # Data Models
//!
//! Value types for the request hierarchy and its supporting descriptors.
//!
//! - [`RequestRecord`] owns its [`GenerationRecord`]s and [`PublisherRecord`]s
//! - [`GenerationRecord`] owns its ordered [`EnhancementRecord`]s
//! - [`Recipe`] is a derived value, never persisted on its own
//!
//! Back-references (generation to request, enhancement to generation and
//! request) are carried as business identifiers for query convenience only.

pub mod enhancement;
pub mod generation;
pub mod page;
pub mod recipe;
pub mod request;

pub use enhancement::EnhancementRecord;
pub use generation::GenerationRecord;
pub use page::{Page, PageRequest};
pub use recipe::{EnhancerSpec, GenerationRequestSpec, GeneratorSpec, Recipe, Target, ToolSpec};
pub use request::{PublisherRecord, RequestGraph, RequestRecord};
