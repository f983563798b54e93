//! Tray slot allocation
//!
//! Parts wait in a tray of equally sized boxes before they are placed. Each
//! box (slot) is tagged with the thread size and type it holds. Slots are
//! numbered from 0 in row-major order.

use magnetpnp_core::{AllocationError, Classification, Part, PartId};
use magnetpnp_settings::{PnpConfig, SlotSettings, TrayLayout, TraySettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physical position of a tray slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TrayOffset {
    /// X coordinate in mm.
    pub x: f64,
    /// Y coordinate in mm.
    pub y: f64,
    /// Z coordinate in mm.
    pub z: f64,
}

impl TrayOffset {
    /// Create a new offset
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Result of one allocation run
///
/// Each slot index is used by at most one part.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlotAssignment {
    by_part: BTreeMap<PartId, usize>,
    errors: Vec<AllocationError>,
}

impl SlotAssignment {
    /// Slot assigned to a part
    pub fn slot_of(&self, part: PartId) -> Option<usize> {
        self.by_part.get(&part).copied()
    }

    /// Number of assigned parts
    pub fn len(&self) -> usize {
        self.by_part.len()
    }

    /// Whether no part got a slot
    pub fn is_empty(&self) -> bool {
        self.by_part.is_empty()
    }

    /// Parts left without a slot
    pub fn errors(&self) -> &[AllocationError] {
        &self.errors
    }

    /// Part to slot pairs, ordered by part id
    pub fn iter(&self) -> impl Iterator<Item = (PartId, usize)> + '_ {
        self.by_part.iter().map(|(part, slot)| (*part, *slot))
    }
}

/// Assigns parts to classification-tagged tray slots
#[derive(Debug, Clone)]
pub struct TraySlotAllocator {
    tray: TraySettings,
    slots: Vec<Classification>,
    tolerance: f64,
}

impl TraySlotAllocator {
    /// Create an allocator for a tray and its slot table
    pub fn new(tray: TraySettings, slots: &[SlotSettings], tolerance: f64) -> Self {
        Self {
            tray,
            slots: slots
                .iter()
                .map(|slot| Classification::new(slot.thread, slot.part_type.clone()))
                .collect(),
            tolerance,
        }
    }

    /// Create an allocator from the full configuration
    pub fn from_config(config: &PnpConfig) -> Self {
        Self::new(config.tray.clone(), &config.slots, config.sync.thread_tolerance)
    }

    /// Number of classified slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Classification of a slot
    pub fn slot(&self, index: usize) -> Option<&Classification> {
        self.slots.get(index)
    }

    /// Assign every part (in catalog order) to the first free matching slot
    ///
    /// A part without a match is recorded as an error; later parts are
    /// still processed.
    pub fn allocate(&self, parts: &[&Part]) -> SlotAssignment {
        let mut used = vec![false; self.slots.len()];
        let mut assignment = SlotAssignment::default();

        for part in parts {
            let free = self
                .slots
                .iter()
                .enumerate()
                .find(|(index, slot)| !used[*index] && slot.matches(&part.classification, self.tolerance))
                .map(|(index, _)| index);

            match free {
                Some(index) => {
                    used[index] = true;
                    assignment.by_part.insert(part.id, index);
                    tracing::debug!("Part {} assigned to slot {}", part.id, index);
                }
                None => {
                    let error = AllocationError::AllocationExhausted {
                        part: part.id,
                        thread_size: part.classification.thread_size,
                        part_type: part.classification.part_type.clone(),
                    };
                    tracing::warn!("{}", error);
                    assignment.errors.push(error);
                }
            }
        }

        assignment
    }

    /// Row and column (both 0-based) of a slot
    pub fn grid_position(&self, index: usize) -> (usize, usize) {
        let columns = self.tray.columns.max(1) as usize;
        (index / columns, index % columns)
    }

    /// Physical position of a slot for the configured layout
    ///
    /// `Corner` addresses the box corner: `col * box + tray_x`.
    /// `Centered` addresses the box center including rims:
    /// `col * box + box / 2 + (col + 1) * rim + tray_x`.
    pub fn slot_offset(&self, index: usize) -> TrayOffset {
        let (row, col) = self.grid_position(index);
        let (row, col) = (row as f64, col as f64);
        let pitch = self.tray.box_size;

        match self.tray.layout {
            TrayLayout::Corner => TrayOffset::new(
                col * pitch + self.tray.x,
                row * pitch + self.tray.y,
                self.tray.z,
            ),
            TrayLayout::Centered => {
                let rim = self.tray.rim_size;
                TrayOffset::new(
                    col * pitch + pitch / 2.0 + (col + 1.0) * rim + self.tray.x,
                    row * pitch + pitch / 2.0 + (row + 1.0) * rim + self.tray.y,
                    self.tray.z,
                )
            }
        }
    }
}
