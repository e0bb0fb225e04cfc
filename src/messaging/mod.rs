//! # Work Dispatch
//!
//! Outbound event payloads and the [`WorkDispatcher`] seam that hands them to
//! the external transport.

pub mod dispatcher;
pub mod message;

pub use dispatcher::{BroadcastWorkDispatcher, WorkDispatcher};
pub use message::{
    CompletedGeneration, EnhancementCreated, EnhancementData, EventContext, GenerationCreated,
    GenerationData, PublisherSpec, RequestsFinished, RequestsFinishedData, WorkEvent,
};
