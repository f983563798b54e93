//! Error handling for MagnetPnP
//!
//! Provides error types for every layer of the pick-and-place core:
//! - Operation errors (request parsing, state machine violations, lookups)
//! - Allocation errors (tray slot assignment)
//! - Catalog errors (part description parsing)
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::data::{OperationPhase, PartId};
use thiserror::Error;

/// Operation error type
///
/// Raised while driving a pick-and-place operation. None of these ever
/// leave a stream-interception callback: the controller logs them and
/// surfaces them as `ERROR` notifications instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    /// The operation-request carried no usable part argument
    #[error("Malformed operation request '{command}': missing or non-numeric part argument")]
    MalformedRequest {
        /// The offending command line.
        command: String,
    },

    /// An operation-request arrived while another operation was in flight
    #[error("Operation request for part {requested} rejected while {phase} part {current:?}")]
    InvalidStateRequest {
        /// The part the new request asked for.
        requested: PartId,
        /// The phase the controller was in.
        phase: OperationPhase,
        /// The part currently being handled.
        current: Option<PartId>,
    },

    /// The part id is not present in the catalog
    #[error("Unknown part {part}")]
    UnknownPart {
        /// The part that was looked up.
        part: PartId,
    },

    /// The part exists but has no destination
    #[error("Part {part} has no destination")]
    MissingDestination {
        /// The part that was looked up.
        part: PartId,
    },

    /// The part was never assigned a tray slot
    #[error("Part {part} has no tray slot assigned")]
    NoTraySlot {
        /// The part that was looked up.
        part: PartId,
    },
}

/// Tray slot allocation error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    /// No unused slot matches the part's classification
    #[error("No free tray slot for part {part} (thread {thread_size}, type '{part_type}')")]
    AllocationExhausted {
        /// The part left without a slot.
        part: PartId,
        /// The part's thread size.
        thread_size: f64,
        /// The part's type.
        part_type: String,
    },
}

impl AllocationError {
    /// The part this error belongs to
    pub fn part(&self) -> PartId {
        match self {
            AllocationError::AllocationExhausted { part, .. } => *part,
        }
    }
}

/// Catalog error type
///
/// Represents failures while loading a part description.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// The description could not be parsed
    #[error("Catalog parse error: {reason}")]
    CatalogParseError {
        /// The parser message.
        reason: String,
    },

    /// Two parts share an identifier
    #[error("Duplicate part id {0}")]
    DuplicatePart(PartId),

    /// Part identifiers must be positive
    #[error("Invalid part id {0}: ids must be positive")]
    InvalidPartId(PartId),
}

/// Main error type for MagnetPnP
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Operation error
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// Allocation error
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is an operation error
    pub fn is_operation_error(&self) -> bool {
        matches!(self, Error::Operation(_))
    }

    /// Check if this is a catalog lookup failure that stalls an operation
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Error::Operation(
                OperationError::UnknownPart { .. }
                    | OperationError::MissingDestination { .. }
                    | OperationError::NoTraySlot { .. }
            )
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_display() {
        let err = OperationError::MalformedRequest {
            command: "M361".to_string(),
        };
        assert!(err.to_string().contains("M361"));

        let err = OperationError::InvalidStateRequest {
            requested: 7,
            phase: OperationPhase::Aligning,
            current: Some(3),
        };
        assert_eq!(
            err.to_string(),
            "Operation request for part 7 rejected while Aligning part Some(3)"
        );

        let err = OperationError::UnknownPart { part: 42 };
        assert_eq!(err.to_string(), "Unknown part 42");
    }

    #[test]
    fn test_allocation_error_part() {
        let err = AllocationError::AllocationExhausted {
            part: 5,
            thread_size: 3.0,
            part_type: "hexnut".to_string(),
        };
        assert_eq!(err.part(), 5);
        assert!(err.to_string().contains("hexnut"));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = OperationError::MissingDestination { part: 1 }.into();
        assert!(err.is_operation_error());
        assert!(err.is_lookup_failure());

        let err: Error = OperationError::MalformedRequest {
            command: "M361 Px".to_string(),
        }
        .into();
        assert!(!err.is_lookup_failure());

        let err: Error = CatalogError::DuplicatePart(2).into();
        assert!(matches!(err, Error::Catalog(_)));

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
