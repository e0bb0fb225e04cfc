//! # Batch Intake
//!
//! Turns a caller batch into a persisted request graph and dispatches the
//! first work item of every generation.
//!
//! The request id is returned only after the whole graph is stored. Dispatch
//! happens afterwards; a failed dispatch is logged and leaves the generation
//! `NEW`, from where it can be dispatched again.

use crate::error::Result;
use crate::logging::log_request_operation;
use crate::messaging::{WorkDispatcher, WorkEvent};
use crate::orchestration::event_mapper;
use crate::orchestration::hierarchy_builder::{BatchSubmission, HierarchyBuilder};
use crate::repository::StatusRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::{instrument, warn};

#[derive(Debug, Clone)]
pub struct RequestProcessor {
    builder: HierarchyBuilder,
    repository: Arc<dyn StatusRepository>,
    dispatcher: Arc<dyn WorkDispatcher>,
}

impl RequestProcessor {
    pub fn new(
        builder: HierarchyBuilder,
        repository: Arc<dyn StatusRepository>,
        dispatcher: Arc<dyn WorkDispatcher>,
    ) -> Self {
        Self {
            builder,
            repository,
            dispatcher,
        }
    }

    /// Build, persist and dispatch a batch. Returns the new request id.
    #[instrument(skip(self, submission), fields(targets = submission.targets.len()))]
    pub async fn submit(&self, submission: BatchSubmission) -> Result<String> {
        let graph = self.builder.build_request(&submission, Utc::now())?;
        self.repository.save_request(&graph).await?;

        let request_id = graph.request_id().to_string();
        log_request_operation(
            "create",
            &request_id,
            &graph.request.status.to_string(),
            Some(&format!(
                "generations={} enhancements={}",
                graph.generations.len(),
                graph.enhancement_count()
            )),
        );

        let stored = self.repository.find_generations_by_request(&request_id).await?;
        let mut dispatched = 0usize;
        for generation in &stored {
            let event = event_mapper::generation_created(generation);
            match self.dispatcher.dispatch(WorkEvent::Generation(event)).await {
                Ok(()) => dispatched += 1,
                Err(error) => warn!(
                    request_id = %request_id,
                    generation_id = %generation.generation_id,
                    error = %error,
                    "Failed to dispatch generation; it stays NEW"
                ),
            }
        }

        log_request_operation(
            "dispatch",
            &request_id,
            &graph.request.status.to_string(),
            Some(&format!("dispatched={dispatched}/{}", stored.len())),
        );
        Ok(request_id)
    }
}
