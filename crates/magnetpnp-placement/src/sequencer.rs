//! G-code sequences for the pick, align and place phases
//!
//! Everything here is a pure function of the configuration and explicit
//! inputs; lookups and state live in the controller.

use magnetpnp_core::Destination;
use magnetpnp_settings::{HeadSettings, PnpConfig, SyncSettings};
use serde::{Deserialize, Serialize};

use crate::tray::TrayOffset;

/// Measured deviations for one operation
///
/// Zero unless a closed-loop collaborator supplies a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PlacementCorrection {
    /// Rotation of the held part relative to the reference, subtracted by align.
    pub reference_offset: f64,
    /// Rotation still measured after align, undone by place.
    pub residual_offset: f64,
    /// XY displacement in mm.
    pub displacement: (f64, f64),
}

impl PlacementCorrection {
    /// Whether the residual rotation is large enough to correct
    pub fn needs_reorientation(&self, threshold: f64) -> bool {
        self.residual_offset.abs() > threshold
    }
}

/// Builds the command lists for each phase
#[derive(Debug, Clone)]
pub struct GCodeSequencer {
    head: HeadSettings,
    sync: SyncSettings,
}

impl GCodeSequencer {
    /// Create a sequencer for a head and sync configuration
    pub fn new(head: HeadSettings, sync: SyncSettings) -> Self {
        Self { head, sync }
    }

    /// Create a sequencer from the full configuration
    pub fn from_config(config: &PnpConfig) -> Self {
        Self::new(config.head.clone(), config.sync.clone())
    }

    /// Flush barrier, optionally followed by the phase-advance sentinel
    ///
    /// flush, dwell, flush, then `buffer_clearance_cycles` more dwells so the
    /// second flush has left the transport buffer before the sentinel is
    /// looked at.
    pub fn barrier(&self, with_sentinel: bool) -> Vec<String> {
        let flush = self.sync.flush_command.trim().to_string();
        let dwell = format!("G4 P{}", self.sync.clearance_dwell_ms);

        let mut commands = vec![flush.clone(), dwell.clone(), flush];
        commands.extend(std::iter::repeat_n(
            dwell,
            self.sync.buffer_clearance_cycles as usize,
        ));
        if with_sentinel {
            commands.push(self.sync.sentinel_command.trim().to_string());
        }
        commands
    }

    /// Expand an actuator template (grip, release, lower or lift)
    ///
    /// Empty templates expand to nothing.
    pub fn actuator(&self, template: &str) -> Vec<String> {
        let lines: Vec<String> = template
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let flush = self.sync.flush_command.trim().to_string();
        let dwell = self.actuator_dwell();

        let mut commands = Vec::with_capacity(lines.len() + 4);
        commands.push(flush.clone());
        commands.push(flush);
        commands.push(dwell.clone());
        commands.extend(lines);
        commands.push(dwell);
        commands
    }

    /// Grip sequence
    pub fn grip(&self) -> Vec<String> {
        self.actuator(&self.head.grip_gcode)
    }

    /// Release sequence
    pub fn release(&self) -> Vec<String> {
        self.actuator(&self.head.release_gcode)
    }

    /// Pick a part of `height` from the slot at `slot`
    pub fn pick(&self, height: f64, slot: TrayOffset) -> Vec<String> {
        let x = slot.x - self.head.x;
        let y = slot.y - self.head.y;
        let z = slot.z + height - self.head.z_pressure;

        let mut commands = vec![
            format!("T{}", self.head.tool_index),
            format!(
                "G1 X{} Y{} F{}",
                format_number(x),
                format_number(y),
                format_number(self.head.travel_feed_rate)
            ),
            self.travel_z(z + self.head.approach_height),
        ];
        commands.extend(self.release());
        if let Some(lower) = &self.head.lower_gcode {
            commands.extend(self.actuator(lower));
        }
        commands.push(self.plunge_z(z));
        commands.extend(self.grip());
        commands.push(self.actuator_dwell());
        commands.push(self.plunge_z(z + self.head.pick_lift_height));
        commands
    }

    /// Rotate the held part to its destination orientation
    pub fn align(&self, destination: &Destination, correction: &PlacementCorrection) -> Vec<String> {
        vec![
            "G92 E0".to_string(),
            format!(
                "G1 E{} F{}",
                format_number(destination.orientation - correction.reference_offset),
                format_number(self.head.travel_feed_rate)
            ),
        ]
    }

    /// Put the held part of `height` down at `destination`
    pub fn place(
        &self,
        height: f64,
        destination: &Destination,
        correction: &PlacementCorrection,
    ) -> Vec<String> {
        let mut commands = Vec::new();

        if correction.needs_reorientation(self.sync.orientation_threshold) {
            commands.push("G92 E0".to_string());
            commands.push(format!(
                "G1 E{} F{}",
                format_number(-correction.residual_offset),
                format_number(self.head.travel_feed_rate)
            ));
        }

        let z = destination.z + height - self.head.z_pressure;
        let x = destination.x - self.head.x + correction.displacement.0;
        let y = destination.y - self.head.y + correction.displacement.1;

        commands.push(self.travel_z(z + self.head.approach_height));
        commands.push(format!(
            "G1 X{} Y{} F{}",
            format_number(x),
            format_number(y),
            format_number(self.head.travel_feed_rate)
        ));
        commands.push(self.plunge_z(z));
        commands.extend(self.release());
        commands.push(self.actuator_dwell());
        commands.push(self.travel_z(z + self.head.approach_height));
        if let Some(lift) = &self.head.lift_gcode {
            commands.extend(self.actuator(lift));
        }
        commands
    }

    fn actuator_dwell(&self) -> String {
        format!("G4 P{}", self.head.actuator_dwell_ms)
    }

    fn travel_z(&self, z: f64) -> String {
        format!(
            "G1 Z{} F{}",
            format_number(z),
            format_number(self.head.travel_feed_rate)
        )
    }

    fn plunge_z(&self, z: f64) -> String {
        format!(
            "G1 Z{} F{}",
            format_number(z),
            format_number(self.head.plunge_feed_rate)
        )
    }
}

/// Format a coordinate with at most three decimals and no trailing zeros
pub fn format_number(value: f64) -> String {
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequencer() -> GCodeSequencer {
        GCodeSequencer::from_config(&PnpConfig::default())
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(20.0), "20");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(4000.0), "4000");
        assert_eq!(format_number(-0.0001), "0");
        assert_eq!(format_number(1.23456), "1.235");
        assert_eq!(format_number(-7.25), "-7.25");
    }

    #[test]
    fn test_barrier() {
        let barrier = sequencer().barrier(true);
        assert_eq!(barrier.len(), 14);
        assert_eq!(&barrier[..3], &["M400", "G4 P1", "M400"]);
        assert!(barrier[3..13].iter().all(|c| c == "G4 P1"));
        assert_eq!(barrier[13], "M362 OctoMagnetPNP");

        let barrier = sequencer().barrier(false);
        assert_eq!(barrier.len(), 13);
        assert_eq!(barrier.last().map(String::as_str), Some("G4 P1"));
    }

    #[test]
    fn test_barrier_uses_clearance_cycles() {
        let mut config = PnpConfig::default();
        config.sync.buffer_clearance_cycles = 2;
        let barrier = GCodeSequencer::from_config(&config).barrier(true);
        assert_eq!(
            barrier,
            vec!["M400", "G4 P1", "M400", "G4 P1", "G4 P1", "M362 OctoMagnetPNP"]
        );
    }

    #[test]
    fn test_actuator_expansion() {
        let commands = sequencer().actuator("  M42 P48 S255 \n\nM42 P49 S0\n");
        assert_eq!(
            commands,
            vec!["M400", "M400", "G4 P500", "M42 P48 S255", "M42 P49 S0", "G4 P500"]
        );
        assert!(sequencer().actuator(" \n ").is_empty());
    }

    #[test]
    fn test_pick_sequence() {
        let mut config = PnpConfig::default();
        config.head.x = 5.0;
        config.head.y = -2.0;
        config.head.z_pressure = 0.5;
        let commands = GCodeSequencer::from_config(&config).pick(2.5, TrayOffset::new(20.0, 10.0, 1.0));

        assert_eq!(
            commands,
            vec![
                "T2",
                "G1 X15 Y12 F4000",
                "G1 Z13 F4000",
                "M400",
                "M400",
                "G4 P500",
                "M42 P48 S0",
                "G4 P500",
                "G1 Z3 F1000",
                "M400",
                "M400",
                "G4 P500",
                "M42 P48 S255",
                "G4 P500",
                "G4 P500",
                "G1 Z8 F1000",
            ]
        );
    }

    #[test]
    fn test_pick_runs_lower_template_before_descending() {
        let mut config = PnpConfig::default();
        config.head.lower_gcode = Some("M280 P0 S90".to_string());
        let commands = GCodeSequencer::from_config(&config).pick(1.0, TrayOffset::default());

        let lower = commands.iter().position(|c| c == "M280 P0 S90").unwrap();
        let descend = commands.iter().position(|c| c == "G1 Z1 F1000").unwrap();
        let release = commands.iter().position(|c| c == "M42 P48 S0").unwrap();
        assert!(release < lower);
        assert!(lower < descend);
    }

    #[test]
    fn test_align_sequence() {
        let destination = Destination::new(0.0, 0.0, 0.0, 90.0);
        let commands = sequencer().align(&destination, &PlacementCorrection::default());
        assert_eq!(commands, vec!["G92 E0", "G1 E90 F4000"]);

        let correction = PlacementCorrection {
            reference_offset: 2.5,
            residual_offset: 4.0,
            ..Default::default()
        };
        let commands = sequencer().align(&destination, &correction);
        assert_eq!(commands[1], "G1 E87.5 F4000");
    }

    #[test]
    fn test_place_sequence() {
        let destination = Destination::new(50.0, 40.0, 3.0, 0.0);
        let commands = sequencer().place(2.0, &destination, &PlacementCorrection::default());

        assert_eq!(
            commands,
            vec![
                "G1 Z15 F4000",
                "G1 X50 Y40 F4000",
                "G1 Z5 F1000",
                "M400",
                "M400",
                "G4 P500",
                "M42 P48 S0",
                "G4 P500",
                "G4 P500",
                "G1 Z15 F4000",
            ]
        );
    }

    #[test]
    fn test_place_applies_correction_above_threshold() {
        let destination = Destination::new(50.0, 40.0, 3.0, 0.0);

        let small = PlacementCorrection {
            reference_offset: 3.0,
            residual_offset: 0.5,
            displacement: (0.25, -0.25),
        };
        let commands = sequencer().place(2.0, &destination, &small);
        assert_eq!(commands[0], "G1 Z15 F4000");
        assert_eq!(commands[1], "G1 X50.25 Y39.75 F4000");

        let large = PlacementCorrection {
            residual_offset: 1.5,
            ..Default::default()
        };
        let commands = sequencer().place(2.0, &destination, &large);
        assert_eq!(&commands[..2], &["G92 E0", "G1 E-1.5 F4000"]);
    }

    #[test]
    fn test_place_runs_lift_template_last() {
        let mut config = PnpConfig::default();
        config.head.lift_gcode = Some("M280 P0 S0".to_string());
        let destination = Destination::new(0.0, 0.0, 0.0, 0.0);
        let commands = GCodeSequencer::from_config(&config).place(1.0, &destination, &Default::default());
        assert_eq!(&commands[commands.len() - 2..], &["M280 P0 S0", "G4 P500"]);
    }
}
