//! # Result Processing
//!
//! Applies status reports from generator and enhancer workers and advances
//! enhancement chains.
//!
//! Every report goes through the shared transition table. A report that does
//! not change the status (a repeated `FINISHED`, a late progress update on a
//! terminal entity) is absorbed without a write. A changing report is written
//! with a compare-and-set on the status that was read, so two workers racing
//! on the same entity cannot both win.
//!
//! When a generation finishes, the enhancement at index 0 is dispatched with
//! the generation's artifacts. When an enhancement finishes, the one at the
//! next index is dispatched with its artifacts.

use crate::constants::entities;
use crate::error::{OrchestratorError, Result};
use crate::logging::{log_enhancement_operation, log_generation_operation};
use crate::messaging::{WorkDispatcher, WorkEvent};
use crate::models::{EnhancementRecord, GenerationRecord};
use crate::orchestration::{aggregation, event_mapper};
use crate::repository::StatusRepository;
use crate::state_machine::{
    determine_target_state, EnhancementStatus, GenerationStatus, Lifecycle, StatusEvent,
    TransitionOutcome,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A worker's report about one generation or enhancement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub event: StatusEvent,
    /// Tool exit code
    pub result: Option<i32>,
    pub reason: Option<String>,
    /// Produced artifacts; only stored when non-empty
    #[serde(default)]
    pub artifact_urls: BTreeSet<String>,
}

impl StatusReport {
    pub fn new(event: StatusEvent) -> Self {
        Self {
            event,
            result: None,
            reason: None,
            artifact_urls: BTreeSet::new(),
        }
    }

    pub fn progress(label: impl Into<String>) -> Self {
        Self::new(StatusEvent::Progress(label.into()))
    }

    pub fn finished<I, U>(artifact_urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        Self {
            result: Some(0),
            artifact_urls: artifact_urls.into_iter().map(Into::into).collect(),
            ..Self::new(StatusEvent::Finish)
        }
    }

    pub fn failed(result: i32, reason: impl Into<String>) -> Self {
        Self {
            result: Some(result),
            reason: Some(reason.into()),
            ..Self::new(StatusEvent::Fail)
        }
    }
}

/// What a report did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome<S> {
    /// Status after the report
    pub status: S,
    /// Whether anything was written
    pub changed: bool,
    /// Whether the owning request is now complete
    pub request_complete: bool,
}

#[derive(Debug, Clone)]
pub struct ResultProcessor {
    repository: Arc<dyn StatusRepository>,
    dispatcher: Arc<dyn WorkDispatcher>,
}

impl ResultProcessor {
    pub fn new(repository: Arc<dyn StatusRepository>, dispatcher: Arc<dyn WorkDispatcher>) -> Self {
        Self {
            repository,
            dispatcher,
        }
    }

    #[instrument(skip(self, report), fields(event = report.event.event_type()))]
    pub async fn report_generation(
        &self,
        generation_id: &str,
        report: StatusReport,
    ) -> Result<ReportOutcome<GenerationStatus>> {
        reject_retry(&report)?;
        let mut generation = self
            .repository
            .find_generation(generation_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::GENERATION, generation_id))?;

        let (observed, target) = match determine_target_state(&generation.status, &report.event)? {
            TransitionOutcome::Unchanged(status) => {
                debug!(generation_id = %generation_id, status = %status, "Report absorbed");
                return Ok(ReportOutcome {
                    status,
                    changed: false,
                    request_complete: self.request_complete(&generation.request_id).await?,
                });
            }
            TransitionOutcome::Applied { from, to } => (from, to),
        };

        let now = Utc::now();
        generation.status = target;
        generation.updated = now;
        apply_report(
            &report,
            &mut generation.result,
            &mut generation.reason,
            &mut generation.artifact_urls,
        );
        if generation.status.is_terminal() {
            generation.finished = Some(now);
        }

        if !self
            .repository
            .update_generation_if_status(&generation, &observed)
            .await?
        {
            return Err(concurrent_change(entities::GENERATION, generation_id));
        }
        let generation = self
            .repository
            .find_generation(generation_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::GENERATION, generation_id))?;

        log_generation_operation(
            "report",
            &generation.generation_id,
            Some(&generation.request_id),
            generation.status.as_str(),
            Some(&format!("from={observed}")),
        );

        if generation.status.is_finished() {
            if let Some(first) = generation.enhancement_at(0) {
                let event =
                    event_mapper::enhancement_created(first, &generation, generation.artifact_urls.clone());
                self.dispatch_next(WorkEvent::Enhancement(event)).await;
            }
        }

        Ok(ReportOutcome {
            request_complete: self.request_complete(&generation.request_id).await?,
            status: generation.status,
            changed: true,
        })
    }

    #[instrument(skip(self, report), fields(event = report.event.event_type()))]
    pub async fn report_enhancement(
        &self,
        enhancement_id: &str,
        report: StatusReport,
    ) -> Result<ReportOutcome<EnhancementStatus>> {
        reject_retry(&report)?;
        let mut enhancement = self
            .repository
            .find_enhancement(enhancement_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(entities::ENHANCEMENT, enhancement_id))?;

        let (observed, target) = match determine_target_state(&enhancement.status, &report.event)? {
            TransitionOutcome::Unchanged(status) => {
                debug!(enhancement_id = %enhancement_id, status = %status, "Report absorbed");
                return Ok(ReportOutcome {
                    status,
                    changed: false,
                    request_complete: self.request_complete(&enhancement.request_id).await?,
                });
            }
            TransitionOutcome::Applied { from, to } => (from, to),
        };

        let now = Utc::now();
        enhancement.status = target;
        enhancement.updated = now;
        apply_report(
            &report,
            &mut enhancement.result,
            &mut enhancement.reason,
            &mut enhancement.artifact_urls,
        );
        if enhancement.status.is_terminal() {
            enhancement.finished = Some(now);
        }

        if !self
            .repository
            .update_enhancement_if_status(&enhancement, &observed)
            .await?
        {
            return Err(concurrent_change(entities::ENHANCEMENT, enhancement_id));
        }

        log_enhancement_operation(
            "report",
            &enhancement.enhancement_id,
            enhancement.generation_id.as_deref(),
            enhancement.index,
            enhancement.status.as_str(),
            Some(&format!("from={observed}")),
        );

        if enhancement.status.is_finished() {
            self.advance_chain(&enhancement).await?;
        }

        Ok(ReportOutcome {
            request_complete: self.request_complete(&enhancement.request_id).await?,
            status: enhancement.status,
            changed: true,
        })
    }

    /// Dispatch the step after `finished`, if there is one
    async fn advance_chain(&self, finished: &EnhancementRecord) -> Result<()> {
        let Some(generation_id) = finished.generation_id.as_deref() else {
            debug!(enhancement_id = %finished.enhancement_id, "Detached enhancement; nothing to advance");
            return Ok(());
        };
        let Some(parent) = self.repository.find_generation(generation_id).await? else {
            return Ok(());
        };

        let Some(next_index) = finished.index.checked_add(1) else {
            return Ok(());
        };
        if let Some(next) = parent.enhancement_at(next_index) {
            let event =
                event_mapper::enhancement_created(next, &parent, finished.artifact_urls.clone());
            self.dispatch_next(WorkEvent::Enhancement(event)).await;
        }
        Ok(())
    }

    async fn dispatch_next(&self, event: WorkEvent) {
        let entity_id = event.entity_id().to_string();
        if let Err(error) = self.dispatcher.dispatch(event).await {
            warn!(
                enhancement_id = %entity_id,
                error = %error,
                "Failed to dispatch next chain step; it stays NEW"
            );
        }
    }

    async fn request_complete(&self, request_id: &str) -> Result<bool> {
        let generations: Vec<GenerationRecord> =
            self.repository.find_generations_by_request(request_id).await?;
        Ok(aggregation::is_request_complete(&generations))
    }
}

fn reject_retry(report: &StatusReport) -> Result<()> {
    if matches!(report.event, StatusEvent::Retry) {
        return Err(OrchestratorError::InvalidInput(
            "retries are requested through the retry API, not status reports".to_string(),
        ));
    }
    Ok(())
}

fn apply_report(
    report: &StatusReport,
    result: &mut Option<i32>,
    reason: &mut Option<String>,
    artifact_urls: &mut BTreeSet<String>,
) {
    if report.result.is_some() {
        *result = report.result;
    }
    if report.reason.is_some() {
        reason.clone_from(&report.reason);
    }
    if !report.artifact_urls.is_empty() {
        artifact_urls.clone_from(&report.artifact_urls);
    }
}

fn concurrent_change(entity: &str, id: &str) -> OrchestratorError {
    OrchestratorError::invalid_state(format!("{entity} {id} was changed concurrently"))
}
