//! Command stream interception
//!
//! The host exposes two hook points on its command stream:
//! - *queuing*: a command is about to enter the transport's buffer
//! - *sending*: a command has left the buffer and is about to be physically
//!   dispatched
//!
//! Interceptors are registered explicitly on an [`InterceptorChain`] and
//! answer every command with a [`HookOutcome`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which hook point a command is passing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandPhase {
    /// About to be queued toward the controller
    Queuing,
    /// About to be physically transmitted
    Sending,
}

impl std::fmt::Display for CommandPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queuing => write!(f, "queuing"),
            Self::Sending => write!(f, "sending"),
        }
    }
}

/// Where a command came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandSource {
    /// A line of the running job
    Job,
    /// Injected through [`crate::JobControl::enqueue`]
    Injected,
}

/// A single command with its hook metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamCommand {
    /// Raw command line
    pub command: String,
    /// Hook point the command is passing
    pub phase: CommandPhase,
    /// Origin of the command
    pub source: CommandSource,
    /// The leading G/M/T word, if any (e.g. `M361`)
    pub gcode: Option<String>,
}

impl StreamCommand {
    /// Create a command, deriving its leading code word
    pub fn new(command: impl Into<String>, phase: CommandPhase, source: CommandSource) -> Self {
        let command = command.into();
        let gcode = leading_code(&command);
        Self {
            command,
            phase,
            source,
            gcode,
        }
    }

    /// The command with surrounding whitespace removed
    pub fn trimmed(&self) -> &str {
        self.command.trim()
    }
}

fn leading_code(command: &str) -> Option<String> {
    let word = command.split_whitespace().next()?;
    let mut chars = word.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !matches!(letter, 'G' | 'M' | 'T') {
        return None;
    }
    let digits = chars.as_str();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Some(format!("{}{}", letter, digits))
}

/// Result of a hook invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HookOutcome {
    /// Let the command through unmodified
    Forward,
    /// Put these commands in its place (in order)
    Replace(Vec<String>),
    /// Drop the command
    Suppress,
}

/// Capability interface for the two stream hook points
///
/// Implementations must never panic or block; they are called synchronously
/// from the host's command-processing loop.
pub trait CommandInterceptor: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Called for each command about to be queued
    fn on_queuing(&mut self, command: &StreamCommand) -> HookOutcome;

    /// Called for each command about to be physically dispatched
    fn on_sending(&mut self, command: &StreamCommand) -> HookOutcome;
}

impl<T: CommandInterceptor> CommandInterceptor for std::sync::Arc<parking_lot::Mutex<T>> {
    fn name(&self) -> &str {
        "shared"
    }

    fn on_queuing(&mut self, command: &StreamCommand) -> HookOutcome {
        self.lock().on_queuing(command)
    }

    fn on_sending(&mut self, command: &StreamCommand) -> HookOutcome {
        self.lock().on_sending(command)
    }
}

/// Handle returned when registering an interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(Uuid);

impl std::fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hook({})", &self.0.to_string()[..8])
    }
}

/// Ordered registry of interceptors
///
/// Interceptors run in registration order. The first one that does not
/// forward decides the outcome; later ones never see that command.
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<(InterceptorId, Box<dyn CommandInterceptor>)>,
}

impl InterceptorChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor at the end of the chain
    pub fn register(&mut self, interceptor: Box<dyn CommandInterceptor>) -> InterceptorId {
        let id = InterceptorId(Uuid::new_v4());
        tracing::debug!("{} registered as {}", interceptor.name(), id);
        self.interceptors.push((id, interceptor));
        id
    }

    /// Remove an interceptor; returns true if it was registered
    pub fn unregister(&mut self, id: InterceptorId) -> bool {
        let before = self.interceptors.len();
        self.interceptors.retain(|(existing, _)| *existing != id);
        before != self.interceptors.len()
    }

    /// Number of registered interceptors
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run a command through the hook matching its phase
    pub fn dispatch(&mut self, command: &StreamCommand) -> HookOutcome {
        for (_, interceptor) in self.interceptors.iter_mut() {
            let outcome = match command.phase {
                CommandPhase::Queuing => interceptor.on_queuing(command),
                CommandPhase::Sending => interceptor.on_sending(command),
            };
            if outcome != HookOutcome::Forward {
                tracing::debug!(
                    "{} hook of {} answered {:?} for '{}'",
                    command.phase,
                    interceptor.name(),
                    outcome,
                    command.trimmed()
                );
                return outcome;
            }
        }
        HookOutcome::Forward
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field(
                "interceptors",
                &self
                    .interceptors
                    .iter()
                    .map(|(_, i)| i.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DropWord(&'static str);

    impl CommandInterceptor for DropWord {
        fn name(&self) -> &str {
            "drop-word"
        }

        fn on_queuing(&mut self, command: &StreamCommand) -> HookOutcome {
            if command.gcode.as_deref() == Some(self.0) {
                HookOutcome::Suppress
            } else {
                HookOutcome::Forward
            }
        }

        fn on_sending(&mut self, _command: &StreamCommand) -> HookOutcome {
            HookOutcome::Forward
        }
    }

    struct Expand;

    impl CommandInterceptor for Expand {
        fn name(&self) -> &str {
            "expand"
        }

        fn on_queuing(&mut self, _command: &StreamCommand) -> HookOutcome {
            HookOutcome::Forward
        }

        fn on_sending(&mut self, command: &StreamCommand) -> HookOutcome {
            if command.trimmed() == "G28" {
                HookOutcome::Replace(vec!["G28 X".to_string(), "G28 Y".to_string()])
            } else {
                HookOutcome::Forward
            }
        }
    }

    #[test]
    fn test_leading_code() {
        let cmd = StreamCommand::new("m361 P42", CommandPhase::Queuing, CommandSource::Job);
        assert_eq!(cmd.gcode.as_deref(), Some("M361"));

        let cmd = StreamCommand::new("G4 P1", CommandPhase::Sending, CommandSource::Injected);
        assert_eq!(cmd.gcode.as_deref(), Some("G4"));

        let cmd = StreamCommand::new("; comment", CommandPhase::Queuing, CommandSource::Job);
        assert_eq!(cmd.gcode, None);

        let cmd = StreamCommand::new("Mx", CommandPhase::Queuing, CommandSource::Job);
        assert_eq!(cmd.gcode, None);
    }

    #[test]
    fn test_chain_dispatches_by_phase() {
        let mut chain = InterceptorChain::new();
        chain.register(Box::new(DropWord("M117")));
        chain.register(Box::new(Expand));
        assert_eq!(chain.len(), 2);

        let queued = StreamCommand::new("M117 hi", CommandPhase::Queuing, CommandSource::Job);
        assert_eq!(chain.dispatch(&queued), HookOutcome::Suppress);

        let sent = StreamCommand::new("M117 hi", CommandPhase::Sending, CommandSource::Job);
        assert_eq!(chain.dispatch(&sent), HookOutcome::Forward);

        let home = StreamCommand::new("G28", CommandPhase::Sending, CommandSource::Job);
        assert!(matches!(chain.dispatch(&home), HookOutcome::Replace(ref c) if c.len() == 2));
    }

    #[test]
    fn test_unregister() {
        let mut chain = InterceptorChain::new();
        let id = chain.register(Box::new(DropWord("M117")));
        assert!(chain.unregister(id));
        assert!(!chain.unregister(id));
        assert!(chain.is_empty());

        let queued = StreamCommand::new("M117 hi", CommandPhase::Queuing, CommandSource::Job);
        assert_eq!(chain.dispatch(&queued), HookOutcome::Forward);
    }
}
