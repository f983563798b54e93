//! Pick-and-place state machine
//!
//! Driven entirely from the two stream hooks:
//!
//! - *queuing*: an operation request (`M361 P<part>`) starts an operation,
//!   pauses the job and injects a barrier followed by the sentinel.
//! - *sending*: every time the sentinel comes up for dispatch, the previous
//!   phase has physically finished. The controller emits the next phase,
//!   re-arms the barrier and swallows the sentinel.
//!
//! ```text
//! Idle ──request──▶ Picking ──sentinel──▶ Aligning ──sentinel──▶ Placing ──sentinel──▶ Idle
//! ```
//!
//! At most one sentinel is in flight per operation. A reset leaves it in the
//! queue; it is counted as stale and swallowed without advancing whatever
//! operation starts next.

use magnetpnp_communication::{CommandInterceptor, HookOutcome, JobControl, StreamCommand};
use magnetpnp_core::{
    extract_embedded_description, CatalogError, Destination, FileEvent, NotificationSink,
    OperationError, OperationPhase, PartCatalog, PartId, PartSummary, PnpEvent,
};
use magnetpnp_settings::{ConfigError, PnpConfig};
use regex::Regex;
use std::sync::Arc;

use super::state::OperationState;
use crate::sequencer::{format_number, GCodeSequencer, PlacementCorrection};
use crate::tray::{SlotAssignment, TrayOffset, TraySlotAllocator};

/// The pick-and-place controller
///
/// Owns the operation state, the catalog and the slot assignment. Errors
/// never leave the hook methods; they are logged and sent to the
/// notification sink.
pub struct PickPlaceController {
    config: PnpConfig,
    catalog: Box<dyn PartCatalog>,
    allocator: TraySlotAllocator,
    sequencer: GCodeSequencer,
    assignment: SlotAssignment,
    job: Arc<dyn JobControl>,
    notifier: Arc<dyn NotificationSink>,
    state: OperationState,
    paused_job: bool,
    fault: Option<OperationError>,
    correction: PlacementCorrection,
    sentinel_armed: bool,
    stale_sentinels: usize,
    request_pattern: Regex,
    argument_pattern: Regex,
}

impl PickPlaceController {
    /// Create a controller
    ///
    /// The configuration is validated here; the slot assignment is built
    /// right away if the catalog already holds parts.
    pub fn new(
        config: PnpConfig,
        catalog: Box<dyn PartCatalog>,
        job: Arc<dyn JobControl>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let request = regex::escape(config.sync.request_command.trim());
        let request_pattern = Regex::new(&format!(r"(?i)^{}(?P<args>[P\s].*)?$", request)).map_err(|e| {
            ConfigError::ValueOutOfRange {
                key: "sync.request_command".to_string(),
                value: e.to_string(),
            }
        })?;
        let argument_pattern =
            Regex::new(r"(?i)(?:^|\s)P(\S*)").map_err(|e| ConfigError::ValueOutOfRange {
                key: "sync.request_command".to_string(),
                value: e.to_string(),
            })?;

        let mut controller = Self {
            allocator: TraySlotAllocator::from_config(&config),
            sequencer: GCodeSequencer::from_config(&config),
            config,
            catalog,
            assignment: SlotAssignment::default(),
            job,
            notifier,
            state: OperationState::default(),
            paused_job: false,
            fault: None,
            correction: PlacementCorrection::default(),
            sentinel_armed: false,
            stale_sentinels: 0,
            request_pattern,
            argument_pattern,
        };
        controller.rebuild_assignment();
        Ok(controller)
    }

    /// Current phase
    pub fn phase(&self) -> OperationPhase {
        self.state.phase()
    }

    /// Part being handled, if any
    pub fn current_part(&self) -> Option<PartId> {
        self.state.current_part()
    }

    /// The lookup failure that stopped the current operation, if any
    pub fn fault(&self) -> Option<&OperationError> {
        self.fault.as_ref()
    }

    /// Current part to slot assignment
    pub fn assignment(&self) -> &SlotAssignment {
        &self.assignment
    }

    /// The catalog in use
    pub fn catalog(&self) -> &dyn PartCatalog {
        self.catalog.as_ref()
    }

    /// The configuration in use
    pub fn config(&self) -> &PnpConfig {
        &self.config
    }

    /// Correction for the operation in flight, or the next one if idle
    ///
    /// Consumed when that operation places its part or is reset.
    pub fn set_correction(&mut self, correction: PlacementCorrection) {
        self.correction = correction;
    }

    /// Tray position of the slot assigned to `part`
    pub fn slot_position(&self, part: PartId) -> Option<TrayOffset> {
        self.assignment
            .slot_of(part)
            .map(|slot| self.allocator.slot_offset(slot))
    }

    /// React to a newly selected input file
    ///
    /// Loads the parts embedded in `gcode`, or unloads the catalog when the
    /// file carries none. Returns the number of parts loaded.
    pub fn on_file_selected(&mut self, gcode: &str) -> Result<usize, CatalogError> {
        match extract_embedded_description(gcode) {
            Some(description) => self.load_catalog(&description),
            None => {
                self.unload_catalog();
                Ok(0)
            }
        }
    }

    /// Replace the catalog with a new description
    ///
    /// On failure the previous catalog and assignment stay in place.
    pub fn load_catalog(&mut self, description: &str) -> Result<usize, CatalogError> {
        if !self.state.is_idle() {
            tracing::warn!(
                "Catalog replaced while {} part {:?}",
                self.state.phase(),
                self.state.current_part()
            );
        }

        match self.catalog.load(description) {
            Ok(count) => {
                self.rebuild_assignment();
                tracing::info!(
                    "Loaded {} parts, {} assigned to tray slots",
                    count,
                    self.assignment.len()
                );
                self.notify_file();
                Ok(count)
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.notifier
                    .notify(PnpEvent::error(e.to_string(), self.state.current_part()));
                Err(e)
            }
        }
    }

    /// Drop all parts
    pub fn unload_catalog(&mut self) {
        self.catalog.unload();
        self.rebuild_assignment();
        tracing::info!("Catalog unloaded");
        self.notify_file();
    }

    /// Run a complete operation outside the command stream
    ///
    /// Pick, align and place are queued back to back, each behind a plain
    /// barrier. All lookups happen before anything is queued, so a failure
    /// leaves the controller `Idle` with nothing sent.
    pub fn run_external(&mut self, part: PartId) -> Result<(), OperationError> {
        if !self.state.is_idle() {
            let error = self.invalid_state(part);
            tracing::error!("{}", error);
            return Err(error);
        }

        self.state.begin(OperationPhase::External, part);
        tracing::info!("External operation for part {}", part);

        let commands = self
            .pick_commands(part)
            .and_then(|pick| Ok((pick, self.align_commands(part)?)))
            .and_then(|(pick, align)| Ok((pick, align, self.place_commands(part)?)));

        let result = match commands {
            Ok((pick, align, place)) => {
                for (phase, commands) in [
                    (OperationPhase::Picking, pick),
                    (OperationPhase::Aligning, align),
                    (OperationPhase::Placing, place),
                ] {
                    self.notifier.notify(PnpEvent::operation(phase, part));
                    self.job.enqueue_all(&commands);
                    self.job.enqueue_all(&self.sequencer.barrier(false));
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.notifier.notify(PnpEvent::error(e.to_string(), Some(part)));
                Err(e)
            }
        };

        self.state.finish();
        self.correction = PlacementCorrection::default();
        result
    }

    /// Abandon the operation in flight
    ///
    /// Returns to `Idle`, resumes the job if this controller paused it and
    /// clears the fault and correction. Returns the fault that was cleared.
    pub fn force_reset(&mut self) -> Option<OperationError> {
        if !self.state.is_idle() {
            tracing::warn!(
                "Resetting from {} part {:?}",
                self.state.phase(),
                self.state.current_part()
            );
        }
        if std::mem::take(&mut self.sentinel_armed) {
            self.stale_sentinels += 1;
        }
        self.state.finish();
        self.correction = PlacementCorrection::default();
        self.resume_job();
        self.fault.take()
    }

    fn rebuild_assignment(&mut self) {
        self.assignment = self.allocator.allocate(&self.catalog.parts());
        for error in self.assignment.errors() {
            tracing::error!("{}", error);
        }
    }

    fn notify_file(&self) {
        let parts = if self.catalog.is_loaded() {
            self.catalog
                .parts()
                .into_iter()
                .map(|part| PartSummary {
                    id: part.id,
                    name: part.name.clone(),
                    slot: self.assignment.slot_of(part.id),
                    shape: part.shape.clone(),
                    part_type: part.classification.part_type.clone(),
                    thread: part.classification.thread_size,
                })
                .collect()
        } else {
            Vec::new()
        };
        self.notifier.notify(PnpEvent::File(FileEvent { parts }));
    }

    /// `None` if `command` is not an operation request at all
    fn parse_request(&self, command: &str) -> Option<Result<PartId, OperationError>> {
        let request = self.request_pattern.captures(command)?;
        let args = request.name("args").map_or("", |m| m.as_str());

        let part = self
            .argument_pattern
            .captures(args)
            .and_then(|caps| caps[1].parse::<PartId>().ok())
            .filter(|part| *part > 0);

        Some(part.ok_or_else(|| OperationError::MalformedRequest {
            command: command.to_string(),
        }))
    }

    fn invalid_state(&self, requested: PartId) -> OperationError {
        OperationError::InvalidStateRequest {
            requested,
            phase: self.state.phase(),
            current: self.state.current_part(),
        }
    }

    fn reject(&self, error: OperationError) -> HookOutcome {
        tracing::error!("{}", error);
        self.notifier
            .notify(PnpEvent::error(error.to_string(), self.state.current_part()));
        HookOutcome::Forward
    }

    fn start(&mut self, part: PartId) -> HookOutcome {
        self.state.begin(OperationPhase::Picking, part);
        tracing::info!("Operation request for part {}", part);

        if self.job.is_printing() || self.job.is_resuming() {
            self.job.pause();
            self.paused_job = true;
        }

        self.notifier
            .notify(PnpEvent::operation(OperationPhase::Picking, part));
        self.job.enqueue_all(&self.sequencer.barrier(true));
        self.sentinel_armed = true;
        HookOutcome::Suppress
    }

    fn advance(&mut self) {
        let Some(part) = self.state.current_part() else {
            tracing::warn!("Sentinel seen with no operation in flight");
            return;
        };
        if self.fault.is_some() {
            tracing::warn!("Sentinel seen while part {} is faulted", part);
            return;
        }

        match self.state.phase() {
            OperationPhase::Picking => match self.pick_commands(part) {
                Ok(commands) => {
                    tracing::info!("Pick part {}", part);
                    self.emit_phase(&commands, true);
                    self.enter(OperationPhase::Aligning, part);
                }
                Err(e) => self.record_fault(e),
            },
            OperationPhase::Aligning => match self.align_commands(part) {
                Ok(commands) => {
                    tracing::info!("Align part {}", part);
                    self.emit_phase(&commands, true);
                    self.enter(OperationPhase::Placing, part);
                }
                Err(e) => self.record_fault(e),
            },
            OperationPhase::Placing => match self.place_commands(part) {
                Ok(commands) => {
                    tracing::info!("Place part {}", part);
                    self.emit_phase(&commands, false);
                    self.state.finish();
                    self.correction = PlacementCorrection::default();
                    self.resume_job();
                    tracing::info!("Finished placing part {}", part);
                }
                Err(e) => self.record_fault(e),
            },
            OperationPhase::External | OperationPhase::Idle => {
                tracing::warn!("Sentinel seen during {} operation", self.state.phase());
            }
        }
    }

    fn enter(&mut self, phase: OperationPhase, part: PartId) {
        self.state.advance(phase);
        self.notifier.notify(PnpEvent::operation(phase, part));
    }

    fn emit_phase(&mut self, commands: &[String], with_sentinel: bool) {
        self.job.enqueue_all(commands);
        self.job.enqueue_all(&self.sequencer.barrier(with_sentinel));
        self.sentinel_armed = with_sentinel;
    }

    fn resume_job(&mut self) {
        if self.paused_job && (self.job.is_paused() || self.job.is_pausing()) {
            self.job.resume();
        }
        self.paused_job = false;
    }

    fn record_fault(&mut self, error: OperationError) {
        tracing::error!(
            "{} during {} of part {:?}",
            error,
            self.state.phase(),
            self.state.current_part()
        );
        self.notifier
            .notify(PnpEvent::error(error.to_string(), self.state.current_part()));

        if self.config.sync.reset_on_fault {
            self.force_reset();
        } else {
            self.fault = Some(error);
        }
    }

    fn pick_commands(&self, part: PartId) -> Result<Vec<String>, OperationError> {
        let height = self
            .catalog
            .height(part)
            .ok_or(OperationError::UnknownPart { part })?;
        let slot = self
            .slot_position(part)
            .ok_or(OperationError::NoTraySlot { part })?;
        tracing::debug!(
            "Part {} at tray X{} Y{} Z{}",
            part,
            format_number(slot.x),
            format_number(slot.y),
            format_number(slot.z)
        );
        Ok(self.sequencer.pick(height, slot))
    }

    fn align_commands(&self, part: PartId) -> Result<Vec<String>, OperationError> {
        let destination = self.destination(part)?;
        Ok(self.sequencer.align(&destination, &self.correction))
    }

    fn place_commands(&self, part: PartId) -> Result<Vec<String>, OperationError> {
        let destination = self.destination(part)?;
        let height = self
            .catalog
            .height(part)
            .ok_or(OperationError::UnknownPart { part })?;

        if self
            .correction
            .needs_reorientation(self.config.sync.orientation_threshold)
        {
            let message = format!(
                "Incorrect alignment, correcting offset of {}°",
                format_number(-self.correction.residual_offset)
            );
            tracing::info!("{}", message);
            self.notifier.notify(PnpEvent::info(message));
        }

        Ok(self.sequencer.place(height, &destination, &self.correction))
    }

    fn destination(&self, part: PartId) -> Result<Destination, OperationError> {
        if self.catalog.part(part).is_none() {
            return Err(OperationError::UnknownPart { part });
        }
        self.catalog
            .destination(part)
            .ok_or(OperationError::MissingDestination { part })
    }
}

impl CommandInterceptor for PickPlaceController {
    fn name(&self) -> &str {
        "magnetpnp"
    }

    fn on_queuing(&mut self, command: &StreamCommand) -> HookOutcome {
        match self.parse_request(command.trimmed()) {
            None => HookOutcome::Forward,
            Some(Err(error)) => self.reject(error),
            Some(Ok(part)) if !self.state.is_idle() => {
                let error = self.invalid_state(part);
                self.reject(error)
            }
            Some(Ok(part)) => self.start(part),
        }
    }

    fn on_sending(&mut self, command: &StreamCommand) -> HookOutcome {
        if command.trimmed() != self.config.sync.sentinel_command.trim() {
            return HookOutcome::Forward;
        }
        if self.stale_sentinels > 0 {
            self.stale_sentinels -= 1;
            tracing::debug!("Stale sentinel from a reset operation swallowed");
            return HookOutcome::Suppress;
        }
        self.sentinel_armed = false;
        self.advance();
        HookOutcome::Suppress
    }
}

impl std::fmt::Debug for PickPlaceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickPlaceController")
            .field("state", &self.state)
            .field("parts", &self.catalog.count())
            .field("assigned", &self.assignment.len())
            .field("paused_job", &self.paused_job)
            .field("fault", &self.fault)
            .field("stale_sentinels", &self.stale_sentinels)
            .finish()
    }
}
