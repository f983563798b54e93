//! Print job control
//!
//! The placement core pauses and resumes the running job and injects its own
//! commands through this trait. It never owns the job.

use serde::{Deserialize, Serialize};

/// Lifecycle of the running job as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobState {
    /// No job loaded
    #[default]
    Idle,
    /// Job lines are being fed
    Printing,
    /// Pause requested, not yet settled
    Pausing,
    /// Job lines are held back
    Paused,
    /// Resume requested, not yet settled
    Resuming,
    /// All job lines were dispatched and acknowledged
    Finished,
}

impl JobState {
    /// Whether job lines may still be fed at some point
    pub fn is_active(&self) -> bool {
        !matches!(self, JobState::Idle | JobState::Finished)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "Idle"),
            JobState::Printing => write!(f, "Printing"),
            JobState::Pausing => write!(f, "Pausing"),
            JobState::Paused => write!(f, "Paused"),
            JobState::Resuming => write!(f, "Resuming"),
            JobState::Finished => write!(f, "Finished"),
        }
    }
}

/// Access to the host's job and command queue
///
/// All methods take `&self` and must not block: they are called from inside
/// the stream hooks.
pub trait JobControl: Send + Sync {
    /// Current job state
    fn state(&self) -> JobState;

    /// Pause the job; lines already queued still go out
    fn pause(&self);

    /// Resume a paused job
    fn resume(&self);

    /// Inject a command; it passes the queuing hooks like any other command
    fn enqueue(&self, command: &str);

    /// Inject several commands in order
    fn enqueue_all(&self, commands: &[String]) {
        for command in commands {
            self.enqueue(command);
        }
    }

    /// Job is printing
    fn is_printing(&self) -> bool {
        self.state() == JobState::Printing
    }

    /// Job is resuming
    fn is_resuming(&self) -> bool {
        self.state() == JobState::Resuming
    }

    /// Job is paused
    fn is_paused(&self) -> bool {
        self.state() == JobState::Paused
    }

    /// Job is pausing
    fn is_pausing(&self) -> bool {
        self.state() == JobState::Pausing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FixedJob {
        state: Mutex<JobState>,
        queued: Mutex<Vec<String>>,
    }

    impl JobControl for FixedJob {
        fn state(&self) -> JobState {
            *self.state.lock()
        }

        fn pause(&self) {
            *self.state.lock() = JobState::Paused;
        }

        fn resume(&self) {
            *self.state.lock() = JobState::Printing;
        }

        fn enqueue(&self, command: &str) {
            self.queued.lock().push(command.to_string());
        }
    }

    #[test]
    fn test_state_predicates() {
        let job = FixedJob {
            state: Mutex::new(JobState::Resuming),
            queued: Mutex::new(Vec::new()),
        };
        assert!(job.is_resuming());
        assert!(!job.is_printing());

        job.pause();
        assert!(job.is_paused());
        assert!(!job.is_pausing());

        job.resume();
        assert!(job.is_printing());
    }

    #[test]
    fn test_enqueue_all_keeps_order() {
        let job = FixedJob {
            state: Mutex::new(JobState::Idle),
            queued: Mutex::new(Vec::new()),
        };
        job.enqueue_all(&["M400".to_string(), "G4 P1".to_string()]);
        assert_eq!(*job.queued.lock(), vec!["M400", "G4 P1"]);
    }

    #[test]
    fn test_is_active() {
        assert!(JobState::Paused.is_active());
        assert!(JobState::Printing.is_active());
        assert!(!JobState::Finished.is_active());
        assert!(!JobState::Idle.is_active());
    }
}
