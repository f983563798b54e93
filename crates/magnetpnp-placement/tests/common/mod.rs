#![allow(dead_code)]

use magnetpnp_communication::{JobControl, JobState};
use magnetpnp_core::{
    Classification, Destination, InMemoryPartCatalog, NotificationSink, Part, PartId, PnpEvent,
};
use magnetpnp_settings::{PnpConfig, SlotSettings};
use parking_lot::Mutex;

pub const SENTINEL: &str = "M362 OctoMagnetPNP";
pub const GRIP: &str = "M42 P48 S255";
pub const RELEASE: &str = "M42 P48 S0";

/// Job that settles pause/resume immediately and records injected commands
pub struct MockJob {
    pub state: Mutex<JobState>,
    pub queued: Mutex<Vec<String>>,
}

impl MockJob {
    pub fn new(state: JobState) -> Self {
        Self {
            state: Mutex::new(state),
            queued: Mutex::new(Vec::new()),
        }
    }

    pub fn take_queued(&self) -> Vec<String> {
        std::mem::take(&mut *self.queued.lock())
    }
}

impl JobControl for MockJob {
    fn state(&self) -> JobState {
        *self.state.lock()
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        if matches!(*state, JobState::Printing | JobState::Resuming) {
            *state = JobState::Paused;
        }
    }

    fn resume(&self) {
        let mut state = self.state.lock();
        if matches!(*state, JobState::Paused | JobState::Pausing) {
            *state = JobState::Printing;
        }
    }

    fn enqueue(&self, command: &str) {
        self.queued.lock().push(command.to_string());
    }
}

/// Sink that keeps every notification
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<PnpEvent>>,
}

impl Recorder {
    pub fn take(&self) -> Vec<PnpEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn last(&self) -> Option<PnpEvent> {
        self.events.lock().last().cloned()
    }
}

impl NotificationSink for Recorder {
    fn notify(&self, event: PnpEvent) {
        self.events.lock().push(event);
    }
}

pub fn slot(thread: f64, part_type: &str) -> SlotSettings {
    SlotSettings {
        thread,
        part_type: part_type.to_string(),
    }
}

pub fn config() -> PnpConfig {
    let mut config = PnpConfig::default();
    config.slots = vec![
        slot(3.0, "hexnut"),
        slot(3.0, "hexnut"),
        slot(4.0, "squarenut"),
        slot(3.0, "hexnut"),
    ];
    config
}

pub fn part(id: PartId, part_type: &str, thread: f64, destination: Option<Destination>) -> Part {
    Part {
        id,
        name: format!("part-{}", id),
        shape: "hex".to_string(),
        height: 2.0,
        classification: Classification::new(thread, part_type),
        destination,
    }
}

/// Parts 1, 2 and 42 are hex nuts with destinations; part 3 has none
pub fn catalog() -> InMemoryPartCatalog {
    InMemoryPartCatalog::from_parts(vec![
        part(1, "hexnut", 3.0, Some(Destination::new(50.0, 40.0, 3.0, 90.0))),
        part(2, "hexnut", 3.0, Some(Destination::new(60.0, 40.0, 3.0, 0.0))),
        part(3, "squarenut", 4.0, None),
        part(42, "hexnut", 3.0, Some(Destination::new(10.0, 20.0, 0.0, 45.0))),
    ])
    .unwrap()
}
