//! Configuration for MagnetPnP
//!
//! Replaces loosely-typed nested key lookups with one validated struct.
//! Supports JSON and TOML files; every field has the stock plugin default,
//! so a config file only needs to name what differs.
//!
//! Configuration is organized into sections:
//! - Tray geometry and layout convention
//! - Gripping head offsets, tool and actuator templates
//! - Slot classification table
//! - Stream synchronisation tunables

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How slot coordinates are derived from the slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrayLayout {
    /// Slot origin at the box corner: `column * pitch + tray_x`
    #[default]
    Corner,
    /// Slot origin at the box center, with a rim between boxes
    Centered,
}

impl std::fmt::Display for TrayLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Corner => write!(f, "corner"),
            Self::Centered => write!(f, "centered"),
        }
    }
}

/// Tray geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraySettings {
    /// Tray origin X in mm
    pub x: f64,
    /// Tray origin Y in mm
    pub y: f64,
    /// Tray surface Z in mm
    pub z: f64,
    /// Number of box rows
    pub rows: u32,
    /// Number of box columns
    pub columns: u32,
    /// Box pitch in mm
    pub box_size: f64,
    /// Rim between boxes in mm (centered layout only)
    pub rim_size: f64,
    /// Layout convention
    pub layout: TrayLayout,
}

impl Default for TraySettings {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            rows: 5,
            columns: 5,
            box_size: 10.0,
            rim_size: 1.0,
            layout: TrayLayout::Corner,
        }
    }
}

impl TraySettings {
    /// Number of boxes on the tray
    pub fn capacity(&self) -> usize {
        self.rows as usize * self.columns as usize
    }
}

/// Gripping head settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadSettings {
    /// Head offset X relative to the machine origin in mm
    pub x: f64,
    /// Head offset Y relative to the machine origin in mm
    pub y: f64,
    /// Extra plunge for contact pressure in mm
    pub z_pressure: f64,
    /// Tool index that selects the gripping head (also drives the rotation axis)
    pub tool_index: u32,
    /// Command lines that energise the magnet
    pub grip_gcode: String,
    /// Command lines that release the magnet
    pub release_gcode: String,
    /// Command lines run before descending to pick a part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_gcode: Option<String>,
    /// Command lines run after the final lift
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lift_gcode: Option<String>,
    /// Feed rate for travel and rotation moves (mm/min)
    pub travel_feed_rate: f64,
    /// Feed rate for descents and lifts close to a part (mm/min)
    pub plunge_feed_rate: f64,
    /// Height above pick/place Z for approach and clearance moves
    pub approach_height: f64,
    /// Height above pick Z after gripping a part
    pub pick_lift_height: f64,
    /// Dwell around actuator commands in ms
    pub actuator_dwell_ms: u32,
}

impl Default for HeadSettings {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z_pressure: 0.0,
            tool_index: 2,
            grip_gcode: "M42 P48 S255".to_string(),
            release_gcode: "M42 P48 S0".to_string(),
            lower_gcode: None,
            lift_gcode: None,
            travel_feed_rate: 4000.0,
            plunge_feed_rate: 1000.0,
            approach_height: 10.0,
            pick_lift_height: 5.0,
            actuator_dwell_ms: 500,
        }
    }
}

/// One entry of the slot classification table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSettings {
    /// Thread size this slot holds
    pub thread: f64,
    /// Part type this slot holds
    #[serde(rename = "type")]
    pub part_type: String,
}

/// Stream synchronisation tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Command token that requests an operation, followed by `P<part>`
    pub request_command: String,
    /// Sentinel literal used for the phase-advance round trip
    pub sentinel_command: String,
    /// Command that blocks until all buffered motion has finished
    pub flush_command: String,
    /// Dwell appended after the barrier, in ms
    pub clearance_dwell_ms: u32,
    /// Number of extra dwells absorbing transport queue latency.
    ///
    /// Tied to the transport's buffer depth: it must cover every command the
    /// transport can hold ahead of physical execution. Lowering it
    /// reintroduces races between buffered and physical completion.
    pub buffer_clearance_cycles: u32,
    /// Thread size tolerance when matching parts to slots
    pub thread_tolerance: f64,
    /// Orientation error (degrees) above which place re-rotates the part
    pub orientation_threshold: f64,
    /// Reset to idle immediately after a lookup failure mid-operation
    pub reset_on_fault: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            request_command: "M361".to_string(),
            sentinel_command: "M362 OctoMagnetPNP".to_string(),
            flush_command: "M400".to_string(),
            clearance_dwell_ms: 1,
            buffer_clearance_cycles: 10,
            thread_tolerance: 1e-3,
            orientation_threshold: 0.5,
            reset_on_fault: false,
        }
    }
}

/// Complete MagnetPnP configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PnpConfig {
    /// Tray geometry
    pub tray: TraySettings,
    /// Gripping head
    pub head: HeadSettings,
    /// Slot classification table, in slot index order
    pub slots: Vec<SlotSettings>,
    /// Stream synchronisation
    pub sync: SyncSettings,
}

impl PnpConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/magnetpnp/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| {
            ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string())
        })?;
        Ok(base.join("magnetpnp").join("config.toml"))
    }

    /// Load config from file (JSON or TOML) and validate it
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(
                    ConfigError::UnsupportedFormat(other.unwrap_or_default().to_string()).into(),
                )
            }
        };

        config.validate()?;
        tracing::info!(
            "Loaded config from {} ({} slots, {} layout)",
            path.display(),
            config.slots.len(),
            config.tray.layout
        );
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| SettingsError::SaveError(e.to_string()))?,
            other => {
                return Err(
                    ConfigError::UnsupportedFormat(other.unwrap_or_default().to_string()).into(),
                )
            }
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tray.rows == 0 {
            return Err(out_of_range("tray.rows", self.tray.rows));
        }
        if self.tray.columns == 0 {
            return Err(out_of_range("tray.columns", self.tray.columns));
        }
        if self.tray.box_size <= 0.0 {
            return Err(out_of_range("tray.box_size", self.tray.box_size));
        }
        if self.tray.rim_size < 0.0 {
            return Err(out_of_range("tray.rim_size", self.tray.rim_size));
        }
        if self.slots.len() > self.tray.capacity() {
            return Err(out_of_range("slots", self.slots.len()));
        }
        if let Some(index) = self.slots.iter().position(|s| s.part_type.trim().is_empty()) {
            return Err(ConfigError::MissingKey(format!("slots[{}].type", index)));
        }

        if self.head.travel_feed_rate <= 0.0 {
            return Err(out_of_range("head.travel_feed_rate", self.head.travel_feed_rate));
        }
        if self.head.plunge_feed_rate <= 0.0 {
            return Err(out_of_range("head.plunge_feed_rate", self.head.plunge_feed_rate));
        }
        if self.head.grip_gcode.trim().is_empty() {
            return Err(ConfigError::MissingKey("head.grip_gcode".to_string()));
        }
        if self.head.release_gcode.trim().is_empty() {
            return Err(ConfigError::MissingKey("head.release_gcode".to_string()));
        }

        if self.sync.request_command.trim().is_empty() {
            return Err(ConfigError::MissingKey("sync.request_command".to_string()));
        }
        if self.sync.sentinel_command.trim().is_empty() {
            return Err(ConfigError::MissingKey("sync.sentinel_command".to_string()));
        }
        if self.sync.flush_command.trim().is_empty() {
            return Err(ConfigError::MissingKey("sync.flush_command".to_string()));
        }
        if self.sync.sentinel_command.trim() == self.sync.request_command.trim() {
            return Err(ConfigError::Conflict(
                "sync.sentinel_command must differ from sync.request_command".to_string(),
            ));
        }
        if self.sync.thread_tolerance < 0.0 {
            return Err(out_of_range("sync.thread_tolerance", self.sync.thread_tolerance));
        }
        if self.sync.orientation_threshold < 0.0 {
            return Err(out_of_range(
                "sync.orientation_threshold",
                self.sync.orientation_threshold,
            ));
        }

        Ok(())
    }
}

fn out_of_range(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
}
