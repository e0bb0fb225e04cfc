//! Transition table shared by generations and enhancements.
//!
//! This is the only place that decides whether a status change is legal.
//! Terminal statuses absorb repeated worker reports as no-ops so that status
//! updates stay idempotent; a terminal entity only moves again through an
//! explicit retry, and only `FAILED` accepts one.

use super::events::StatusEvent;
use super::states::{is_reserved_label, Lifecycle};
use crate::error::{OrchestratorError, Result};

/// Result of applying an event to a status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome<S> {
    /// The status changes and must be persisted
    Applied { from: S, to: S },
    /// The event was absorbed; nothing to write
    Unchanged(S),
}

impl<S: Clone> TransitionOutcome<S> {
    /// Status after the event
    pub fn status(&self) -> &S {
        match self {
            Self::Applied { to, .. } => to,
            Self::Unchanged(current) => current,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Determine the status an entity moves to when `event` arrives
pub fn determine_target_state<S: Lifecycle>(
    current: &S,
    event: &StatusEvent,
) -> Result<TransitionOutcome<S>> {
    let target = match event {
        StatusEvent::Retry => {
            ensure_retryable(current)?;
            S::new_status()
        }
        _ if current.is_terminal() => return Ok(TransitionOutcome::Unchanged(current.clone())),
        StatusEvent::Progress(label) => S::in_progress(validate_progress_label(label)?),
        StatusEvent::Finish => S::finished(),
        StatusEvent::Fail => S::failed(),
    };

    if &target == current {
        return Ok(TransitionOutcome::Unchanged(target));
    }

    Ok(TransitionOutcome::Applied {
        from: current.clone(),
        to: target,
    })
}

/// Retry precondition: only `FAILED` entities may be reset
pub fn ensure_retryable<S: Lifecycle>(current: &S) -> Result<()> {
    if current.is_retryable() {
        return Ok(());
    }
    Err(OrchestratorError::invalid_state(format!(
        "Cannot retry {entity} in status: {current}. Only FAILED {entity}s can be retried.",
        entity = S::ENTITY
    )))
}

fn validate_progress_label(label: &str) -> Result<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(OrchestratorError::InvalidInput(
            "in-progress status label must not be blank".to_string(),
        ));
    }
    if is_reserved_label(label) {
        return Err(OrchestratorError::InvalidInput(format!(
            "'{label}' is not an in-progress status"
        )));
    }
    Ok(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::states::{EnhancementStatus, GenerationStatus};

    fn progress(label: &str) -> StatusEvent {
        StatusEvent::Progress(label.to_string())
    }

    #[test]
    fn test_new_to_terminal() {
        let outcome = determine_target_state(&GenerationStatus::New, &StatusEvent::Finish).unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                from: GenerationStatus::New,
                to: GenerationStatus::Finished
            }
        );

        let outcome = determine_target_state(&EnhancementStatus::New, &StatusEvent::Fail).unwrap();
        assert_eq!(outcome.status(), &EnhancementStatus::Failed);
    }

    #[test]
    fn test_progress_labels_pass_through() {
        let outcome = determine_target_state(&GenerationStatus::New, &progress("GENERATING")).unwrap();
        assert_eq!(
            outcome.status(),
            &GenerationStatus::InProgress("GENERATING".to_string())
        );

        let current = GenerationStatus::InProgress("GENERATING".to_string());
        let outcome = determine_target_state(&current, &progress("GENERATING")).unwrap();
        assert!(!outcome.is_applied());

        let outcome = determine_target_state(&current, &StatusEvent::Finish).unwrap();
        assert_eq!(outcome.status(), &GenerationStatus::Finished);
    }

    #[test]
    fn test_reserved_progress_label_rejected() {
        let err = determine_target_state(&GenerationStatus::New, &progress("FINISHED")).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));

        let err = determine_target_state(&GenerationStatus::New, &progress("  ")).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidInput(_)));
    }

    #[test]
    fn test_terminal_statuses_absorb_reports() {
        for event in [StatusEvent::Finish, StatusEvent::Fail, progress("GENERATING")] {
            let outcome = determine_target_state(&GenerationStatus::Finished, &event).unwrap();
            assert_eq!(outcome, TransitionOutcome::Unchanged(GenerationStatus::Finished));

            let outcome = determine_target_state(&EnhancementStatus::Failed, &event).unwrap();
            assert_eq!(outcome, TransitionOutcome::Unchanged(EnhancementStatus::Failed));
        }
    }

    #[test]
    fn test_retry_only_from_failed() {
        let outcome = determine_target_state(&GenerationStatus::Failed, &StatusEvent::Retry).unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Applied {
                from: GenerationStatus::Failed,
                to: GenerationStatus::New
            }
        );

        for current in [
            GenerationStatus::New,
            GenerationStatus::Finished,
            GenerationStatus::InProgress("GENERATING".to_string()),
        ] {
            let err = determine_target_state(&current, &StatusEvent::Retry).unwrap_err();
            assert!(matches!(err, OrchestratorError::InvalidState(_)));
        }
    }

    #[test]
    fn test_retry_error_names_current_status() {
        let err = ensure_retryable(&EnhancementStatus::Finished).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state: Cannot retry enhancement in status: FINISHED. Only FAILED enhancements can be retried."
        );
    }
}
