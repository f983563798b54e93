//! # MagnetPnP Placement
//!
//! The pick-and-place core: tray slot allocation, G-code sequencing for the
//! pick, align and place phases, and the controller that walks those phases
//! from inside a buffered command stream.

pub mod controller;
pub mod sequencer;
pub mod tray;

pub use controller::{OperationState, PickPlaceController};
pub use sequencer::{format_number, GCodeSequencer, PlacementCorrection};
pub use tray::{SlotAssignment, TrayOffset, TraySlotAllocator};
