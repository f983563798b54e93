//! # MagnetPnP
//!
//! Pick-and-place sequencing for magnetic parts (nuts, inserts, magnets)
//! embedded into a running print. A buffered G-code stream is intercepted
//! at two points; operation requests (`M361 P<part>`) pause the job and
//! walk the part through pick, align and place, each phase gated by a
//! sentinel round trip that proves the previous motion has physically
//! finished.
//!
//! ## Architecture
//!
//! MagnetPnP is organized as a workspace with multiple crates:
//!
//! 1. **magnetpnp-core** - Parts, catalog, errors, notification events
//! 2. **magnetpnp-settings** - Typed, validated configuration
//! 3. **magnetpnp-communication** - Stream hooks, job control, buffered channel
//! 4. **magnetpnp-placement** - Tray allocation, G-code sequencing, controller
//! 5. **magnetpnp** - Replay binary that integrates all crates

pub mod replay;

pub use magnetpnp_communication::{
    BufferedMotionChannel, CommandInterceptor, HookOutcome, JobControl, JobState, MemoryLink,
    MotionChannelConfig, StreamCommand,
};
pub use magnetpnp_core::{
    EventBus, InMemoryPartCatalog, NotificationSink, OperationPhase, Part, PartCatalog, PartId,
    PnpEvent,
};
pub use magnetpnp_placement::{
    GCodeSequencer, PickPlaceController, PlacementCorrection, TraySlotAllocator,
};
pub use magnetpnp_settings::{PnpConfig, TrayLayout};
pub use replay::{replay_gcode, ReplayReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output on stderr, so stdout stays free for the command stream
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
