//! MagnetPnP Settings Crate
//!
//! Strongly-typed configuration: tray geometry, gripping head, slot
//! classification table and stream synchronisation tunables. Validated
//! once at load time instead of at the point of use.

pub mod config;
pub mod error;

pub use config::{HeadSettings, PnpConfig, SlotSettings, SyncSettings, TrayLayout, TraySettings};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
