//! # Status State Machines
//!
//! Generation and enhancement statuses share one shape (`NEW`, worker-defined
//! in-progress labels, `FINISHED`, `FAILED`) and one transition table. Requests
//! carry a separate, coarser status that this crate only ever sets to
//! `RECEIVED`.

pub mod events;
pub mod states;
pub mod transitions;

pub use events::StatusEvent;
pub use states::{EnhancementStatus, GenerationStatus, Lifecycle, RequestStatus};
pub use transitions::{determine_target_state, ensure_retryable, TransitionOutcome};
