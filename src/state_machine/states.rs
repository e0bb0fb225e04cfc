use serde::{Deserialize, Serialize};
use std::fmt;

/// Status shape shared by generations and enhancements.
///
/// `New`, `Finished` and `Failed` are owned by the orchestrator. Workers may
/// report any other label while they execute; those are carried verbatim as
/// `InProgress` and are opaque to the orchestration rules.
pub trait Lifecycle: Clone + PartialEq + fmt::Display + fmt::Debug + Send + Sync {
    /// Lower-case entity name used in messages ("generation", "enhancement")
    const ENTITY: &'static str;

    fn new_status() -> Self;
    fn finished() -> Self;
    fn failed() -> Self;
    fn in_progress(label: String) -> Self;

    fn is_new(&self) -> bool;
    fn is_finished(&self) -> bool;
    fn is_failed(&self) -> bool;

    /// Terminal states only leave through an explicit retry
    fn is_terminal(&self) -> bool {
        self.is_finished() || self.is_failed()
    }

    /// Only failed entities may be retried
    fn is_retryable(&self) -> bool {
        self.is_failed()
    }
}

const NEW: &str = "NEW";
const FINISHED: &str = "FINISHED";
const FAILED: &str = "FAILED";

/// Whether `label` collides with a status the orchestrator owns
pub fn is_reserved_label(label: &str) -> bool {
    matches!(label, NEW | FINISHED | FAILED)
}

macro_rules! lifecycle_status {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(into = "String", from = "String")]
        pub enum $name {
            /// Created or reset by retry, waiting for a worker
            #[default]
            New,
            /// Worker-reported intermediate state
            InProgress(String),
            /// Produced its output successfully
            Finished,
            /// Failed; may be retried
            Failed,
        }

        impl Lifecycle for $name {
            const ENTITY: &'static str = $entity;

            fn new_status() -> Self {
                Self::New
            }

            fn finished() -> Self {
                Self::Finished
            }

            fn failed() -> Self {
                Self::Failed
            }

            fn in_progress(label: String) -> Self {
                Self::InProgress(label)
            }

            fn is_new(&self) -> bool {
                matches!(self, Self::New)
            }

            fn is_finished(&self) -> bool {
                matches!(self, Self::Finished)
            }

            fn is_failed(&self) -> bool {
                matches!(self, Self::Failed)
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    Self::New => NEW,
                    Self::InProgress(label) => label.as_str(),
                    Self::Finished => FINISHED,
                    Self::Failed => FAILED,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.as_str() {
                    NEW => Self::New,
                    FINISHED => Self::Finished,
                    FAILED => Self::Failed,
                    _ => Self::InProgress(value),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from(value.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }
    };
}

lifecycle_status!(
    /// Status of a single generator run
    GenerationStatus,
    "generation"
);

lifecycle_status!(
    /// Status of a single enhancement step
    EnhancementStatus,
    "enhancement"
);

/// Request lifecycle. The orchestrator only ever produces `Received`; the
/// completion notifier moves requests on once the aggregation queries agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Received,
    Finished,
    Failed,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "RECEIVED"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVED" => Ok(Self::Received),
            "FINISHED" => Ok(Self::Finished),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid request status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(GenerationStatus::Finished.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
        assert!(!GenerationStatus::New.is_terminal());
        assert!(!GenerationStatus::InProgress("GENERATING".into()).is_terminal());
        assert!(EnhancementStatus::Failed.is_retryable());
        assert!(!EnhancementStatus::Finished.is_retryable());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(GenerationStatus::from("FINISHED"), GenerationStatus::Finished);
        assert_eq!(
            EnhancementStatus::from("ENHANCING"),
            EnhancementStatus::InProgress("ENHANCING".into())
        );
        assert_eq!(GenerationStatus::InProgress("GENERATING".into()).to_string(), "GENERATING");
        assert_eq!("RECEIVED".parse::<RequestStatus>().unwrap(), RequestStatus::Received);
        assert!("received".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&GenerationStatus::Failed).unwrap();
        assert_eq!(json, "\"FAILED\"");

        let parsed: EnhancementStatus = serde_json::from_str("\"SCANNING\"").unwrap();
        assert_eq!(parsed, EnhancementStatus::InProgress("SCANNING".into()));

        let json = serde_json::to_string(&RequestStatus::Received).unwrap();
        assert_eq!(json, "\"RECEIVED\"");
    }

    #[test]
    fn test_reserved_labels() {
        assert!(is_reserved_label("NEW"));
        assert!(is_reserved_label("FAILED"));
        assert!(!is_reserved_label("GENERATING"));
    }
}
