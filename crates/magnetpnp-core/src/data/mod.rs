//! Data models for parts and operation state
//!
//! Parts are owned by the catalog and read-only to the rest of the system.
//! Coordinates are in the controller's native length units (mm).

pub mod catalog;

use serde::{Deserialize, Serialize};

pub use catalog::{extract_embedded_description, InMemoryPartCatalog, PartCatalog};

/// Unique positive part identifier
pub type PartId = u32;

/// Where a part has to end up on the workpiece
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Destination {
    /// X coordinate in mm.
    pub x: f64,
    /// Y coordinate in mm.
    pub y: f64,
    /// Z coordinate in mm (surface the part rests on).
    pub z: f64,
    /// Rotation around the nozzle axis in degrees.
    #[serde(default)]
    pub orientation: f64,
}

impl Destination {
    /// Create a new destination
    pub fn new(x: f64, y: f64, z: f64, orientation: f64) -> Self {
        Self {
            x,
            y,
            z,
            orientation,
        }
    }
}

/// Classification used to match parts against tray slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Thread size, e.g. 3.0 for an M3 nut.
    #[serde(rename = "thread")]
    pub thread_size: f64,
    /// Part type, e.g. "hexnut" or "squarenut".
    #[serde(rename = "type")]
    pub part_type: String,
}

impl Classification {
    /// Create a new classification
    pub fn new(thread_size: f64, part_type: impl Into<String>) -> Self {
        Self {
            thread_size,
            part_type: part_type.into(),
        }
    }

    /// Check whether another classification describes the same bucket
    ///
    /// Thread sizes compare within `tolerance`, types compare exactly.
    pub fn matches(&self, other: &Classification, tolerance: f64) -> bool {
        (self.thread_size - other.thread_size).abs() <= tolerance
            && self.part_type == other.part_type
    }
}

/// A discrete part to be placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Unique positive identifier.
    pub id: PartId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Shape descriptor as given by the input file.
    #[serde(default)]
    pub shape: String,
    /// Height of the part in mm.
    pub height: f64,
    /// Slot matching attributes.
    #[serde(flatten)]
    pub classification: Classification,
    /// Target position on the workpiece, if known.
    #[serde(default)]
    pub destination: Option<Destination>,
}

/// Phase of the pick-and-place state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OperationPhase {
    /// No operation in flight
    #[default]
    Idle,
    /// Waiting for the barrier ahead of the pick motion
    Picking,
    /// Waiting for the barrier ahead of the rotation
    Aligning,
    /// Waiting for the barrier ahead of the place motion
    Placing,
    /// Driven by a collaborator outside the command stream
    External,
}

impl OperationPhase {
    /// Lowercase name used in UI notifications
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Picking => "pick",
            Self::Aligning => "align",
            Self::Placing => "place",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Picking => write!(f, "Picking"),
            Self::Aligning => write!(f, "Aligning"),
            Self::Placing => write!(f, "Placing"),
            Self::External => write!(f, "External"),
        }
    }
}
