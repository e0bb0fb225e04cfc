//! # System Constants
//!
//! Names and defaults shared by the orchestration core, the outbound event
//! payloads and the persistence layer.

/// Name this component stamps into the `source` field of every event it emits.
pub const COMPONENT_NAME: &str = "sbom-orchestrator";

/// Version of the outbound event envelope.
pub const EVENT_VERSION: &str = "1.0";

/// Prefix applied to caller-supplied option keys when merged with tool defaults.
pub const HANDLER_OPTION_PREFIX: &str = "handler-";

/// Event type names carried in [`crate::messaging::EventContext::event_type`].
pub mod events {
    pub const GENERATION_CREATED: &str = "GenerationCreated";
    pub const ENHANCEMENT_CREATED: &str = "EnhancementCreated";
    pub const REQUESTS_FINISHED: &str = "RequestsFinished";
}

/// Paging defaults for listing operations.
pub mod paging {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 500;
}

/// Entity names used in `NotFound` errors and log fields.
pub mod entities {
    pub const REQUEST: &str = "Request";
    pub const GENERATION: &str = "Generation";
    pub const ENHANCEMENT: &str = "Enhancement";
}
