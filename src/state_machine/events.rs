use serde::{Deserialize, Serialize};

/// Events that drive generation and enhancement status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StatusEvent {
    /// Worker reports an intermediate, worker-defined state
    Progress(String),
    /// Worker produced its output
    Finish,
    /// Worker gave up
    Fail,
    /// Caller-initiated reset of a failed entity
    Retry,
}

impl StatusEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Finish => "finish",
            Self::Fail => "fail",
            Self::Retry => "retry",
        }
    }

    /// Check if this event moves an entity into a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish | Self::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_shape() {
        let json = serde_json::to_value(StatusEvent::Progress("GENERATING".into())).unwrap();
        assert_eq!(json["type"], "Progress");
        assert_eq!(json["data"], "GENERATING");

        let parsed: StatusEvent = serde_json::from_str(r#"{"type":"Finish"}"#).unwrap();
        assert_eq!(parsed, StatusEvent::Finish);
    }

    #[test]
    fn test_terminal_events() {
        assert!(StatusEvent::Finish.is_terminal());
        assert!(StatusEvent::Fail.is_terminal());
        assert!(!StatusEvent::Retry.is_terminal());
        assert_eq!(StatusEvent::Retry.event_type(), "retry");
    }
}
