//! Event type definitions for the notification bus.
//!
//! Four kinds of notifications reach the UI: `FILE`, `OPERATION`, `ERROR`
//! and `INFO`. Events are cloneable and serializable for logging/replay.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::data::{OperationPhase, PartId};

/// Root event enum for all UI notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PnpEvent {
    /// Catalog content changed
    File(FileEvent),
    /// An operation phase started
    Operation(OperationEvent),
    /// Something went wrong
    Error(ErrorEvent),
    /// Informational message
    Info(InfoEvent),
}

impl PnpEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            PnpEvent::File(_) => EventCategory::File,
            PnpEvent::Operation(_) => EventCategory::Operation,
            PnpEvent::Error(_) => EventCategory::Error,
            PnpEvent::Info(_) => EventCategory::Info,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            PnpEvent::File(e) => format!("Catalog: {} parts", e.part_count()),
            PnpEvent::Operation(e) => format!("Operation: {} part {}", e.phase.as_str(), e.part),
            PnpEvent::Error(e) => match e.part {
                Some(part) => format!("Error: {} (part {})", e.message, part),
                None => format!("Error: {}", e.message),
            },
            PnpEvent::Info(e) => format!("Info: {}", e.message),
        }
    }

    /// Payload in the shape the UI expects for this kind
    pub fn payload(&self) -> Value {
        match self {
            PnpEvent::File(e) => json!({
                "partCount": e.part_count(),
                "parts": e.parts,
            }),
            PnpEvent::Operation(e) => json!({
                "type": e.phase.as_str(),
                "part": e.part,
            }),
            PnpEvent::Error(e) => {
                let mut data = json!({ "type": e.message });
                if let Some(part) = e.part {
                    data["part"] = json!(part);
                }
                data
            }
            PnpEvent::Info(e) => json!({ "type": e.message }),
        }
    }

    /// Full UI message `{"event": KIND, "data": payload}`
    pub fn to_message(&self) -> Value {
        json!({
            "event": self.category().to_string(),
            "data": self.payload(),
        })
    }

    /// Shorthand for an operation notification
    pub fn operation(phase: OperationPhase, part: PartId) -> Self {
        PnpEvent::Operation(OperationEvent { phase, part })
    }

    /// Shorthand for an error notification
    pub fn error(message: impl Into<String>, part: Option<PartId>) -> Self {
        PnpEvent::Error(ErrorEvent {
            message: message.into(),
            part,
        })
    }

    /// Shorthand for an info notification
    pub fn info(message: impl Into<String>) -> Self {
        PnpEvent::Info(InfoEvent {
            message: message.into(),
        })
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Catalog events.
    File,
    /// Operation progress events.
    Operation,
    /// Error events.
    Error,
    /// Informational events.
    Info,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::File => write!(f, "FILE"),
            EventCategory::Operation => write!(f, "OPERATION"),
            EventCategory::Error => write!(f, "ERROR"),
            EventCategory::Info => write!(f, "INFO"),
        }
    }
}

/// One part as listed in a `FILE` notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSummary {
    /// Part identifier.
    pub id: PartId,
    /// Display name.
    pub name: String,
    /// Assigned tray slot, if any.
    pub slot: Option<usize>,
    /// Shape descriptor.
    pub shape: String,
    /// Part type.
    #[serde(rename = "type")]
    pub part_type: String,
    /// Thread size.
    pub thread: f64,
}

/// Catalog content after a load or unload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FileEvent {
    /// Parts in catalog order; empty when nothing is loaded.
    pub parts: Vec<PartSummary>,
}

impl FileEvent {
    /// Number of parts listed
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

/// An operation entered a new phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEvent {
    /// The phase that started.
    pub phase: OperationPhase,
    /// The part being handled.
    pub part: PartId,
}

/// Error notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Human-readable message.
    pub message: String,
    /// Part being handled when the error occurred.
    pub part: Option<PartId>,
}

/// Informational notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoEvent {
    /// Human-readable message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_category() {
        let event = PnpEvent::operation(OperationPhase::Picking, 3);
        assert_eq!(event.category(), EventCategory::Operation);
        assert_eq!(event.category().to_string(), "OPERATION");
    }

    #[test]
    fn test_empty_file_message() {
        let event = PnpEvent::File(FileEvent::default());
        let message = event.to_message();
        assert_eq!(message["event"], "FILE");
        assert_eq!(message["data"]["partCount"], 0);
        assert_eq!(message["data"]["parts"], json!([]));
    }

    #[test]
    fn test_file_message_lists_parts() {
        let event = PnpEvent::File(FileEvent {
            parts: vec![PartSummary {
                id: 7,
                name: "nut".to_string(),
                slot: Some(2),
                shape: "hex".to_string(),
                part_type: "hexnut".to_string(),
                thread: 3.0,
            }],
        });
        let data = event.payload();
        assert_eq!(data["partCount"], 1);
        assert_eq!(data["parts"][0]["id"], 7);
        assert_eq!(data["parts"][0]["type"], "hexnut");
        assert_eq!(data["parts"][0]["slot"], 2);
    }

    #[test]
    fn test_operation_and_error_payloads() {
        let data = PnpEvent::operation(OperationPhase::Aligning, 42).payload();
        assert_eq!(data, json!({"type": "align", "part": 42}));

        let data = PnpEvent::error("Unknown part 42", Some(42)).payload();
        assert_eq!(data, json!({"type": "Unknown part 42", "part": 42}));

        let data = PnpEvent::error("bad file", None).payload();
        assert_eq!(data, json!({"type": "bad file"}));

        let data = PnpEvent::info("corrected").payload();
        assert_eq!(data, json!({"type": "corrected"}));
    }

    #[test]
    fn test_event_serialization() {
        let event = PnpEvent::operation(OperationPhase::Placing, 9);
        let text = serde_json::to_string(&event).expect("Should serialize");
        let parsed: PnpEvent = serde_json::from_str(&text).expect("Should deserialize");
        assert_eq!(parsed, event);
    }
}
