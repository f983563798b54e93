//! Offline replay of a G-code file through the pick-and-place controller
//!
//! The file is streamed through a [`BufferedMotionChannel`] with the
//! controller registered on both hooks, exactly as a host would run it.
//! Lines are acknowledged as soon as they are dispatched.

use magnetpnp_communication::{
    BufferedMotionChannel, JobState, MemoryLink, MotionChannelConfig,
};
use magnetpnp_core::{InMemoryPartCatalog, NotificationSink, OperationError, OperationPhase};
use magnetpnp_placement::PickPlaceController;
use magnetpnp_settings::PnpConfig;
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome of a replay
#[derive(Debug, Clone)]
pub struct ReplayReport {
    /// Commands that reached the link, in order
    pub dispatched: Vec<String>,
    /// Parts found in the file
    pub parts: usize,
    /// Parts left without a tray slot
    pub unassigned: usize,
    /// Controller phase when the stream settled
    pub phase: OperationPhase,
    /// Job state when the stream settled
    pub job_state: JobState,
    /// Fault that stopped an operation, if any
    pub fault: Option<OperationError>,
}

impl ReplayReport {
    /// Whether the job ran to the end with no operation left hanging
    pub fn is_complete(&self) -> bool {
        self.job_state == JobState::Finished && self.phase == OperationPhase::Idle
    }
}

/// Replay `gcode` with `config`, sending notifications to `notifier`
pub fn replay_gcode(
    config: PnpConfig,
    gcode: &str,
    channel_config: MotionChannelConfig,
    notifier: Arc<dyn NotificationSink>,
) -> anyhow::Result<ReplayReport> {
    let link = MemoryLink::new();
    let mut channel = BufferedMotionChannel::new(Box::new(link.clone()), channel_config);

    let mut controller = PickPlaceController::new(
        config,
        Box::new(InMemoryPartCatalog::new()),
        Arc::new(channel.handle()),
        notifier,
    )?;
    let parts = controller.on_file_selected(gcode)?;
    let unassigned = controller.assignment().errors().len();

    let controller = Arc::new(Mutex::new(controller));
    channel.register_interceptor(Box::new(Arc::clone(&controller)));
    channel.start_job(gcode.lines())?;
    let count = channel.run_to_completion()?;
    tracing::info!("Replay dispatched {} commands", count);

    let controller = controller.lock();
    Ok(ReplayReport {
        dispatched: link.sent(),
        parts,
        unassigned,
        phase: controller.phase(),
        job_state: channel.job_state(),
        fault: controller.fault().cloned(),
    })
}
