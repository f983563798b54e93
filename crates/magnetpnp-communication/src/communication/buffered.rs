//! Buffered motion channel with interception hooks and a bounded in-flight window
//!
//! Models the host's command path toward the motion controller:
//!
//! ```text
//! job lines / injected ──▶ queuing hooks ──▶ send queue ──▶ sending hooks ──▶ link
//!                                                                  │
//!                                            in-flight window ◀────┘ (drained by acks)
//! ```
//!
//! # Features
//! - Job feeding with pause/resume
//! - Command injection through a cloneable [`MotionChannelHandle`]
//! - Both interception hook points, in order
//! - Flow control over a bounded window of unacknowledged commands
//! - A record of everything physically dispatched

use magnetpnp_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::job::{JobControl, JobState};
use super::stream::{
    CommandInterceptor, CommandPhase, CommandSource, HookOutcome, InterceptorChain,
    InterceptorId, StreamCommand,
};

/// Status of a command in the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Waiting for the sending hooks
    Queued,
    /// Produced by a sending hook replacement; goes straight to the link
    Cleared,
    /// Dispatched and awaiting acknowledgment
    Sent,
    /// Acknowledged by the controller
    Acknowledged,
}

/// A command in the send queue or in flight
#[derive(Debug, Clone)]
pub struct BufferedCommand {
    /// The command string to send
    pub command: String,
    /// Where the command came from
    pub source: CommandSource,
    /// Current status of the command
    pub status: CommandStatus,
}

impl BufferedCommand {
    /// Create a new queued command
    pub fn new(command: String, source: CommandSource) -> Self {
        Self {
            command,
            source,
            status: CommandStatus::Queued,
        }
    }

    fn cleared(command: String, source: CommandSource) -> Self {
        Self {
            command,
            source,
            status: CommandStatus::Cleared,
        }
    }

    /// Mark command as sent
    pub fn mark_sent(&mut self) {
        self.status = CommandStatus::Sent;
    }

    /// Mark command as acknowledged
    pub fn mark_acknowledged(&mut self) {
        self.status = CommandStatus::Acknowledged;
    }
}

/// Configuration for the motion channel
#[derive(Debug, Clone)]
pub struct MotionChannelConfig {
    /// Maximum number of unacknowledged commands
    pub window_size: usize,
    /// Maximum number of commands waiting to be queued or sent
    pub queue_size: usize,
    /// Upper bound on steps taken by [`BufferedMotionChannel::run_to_completion`]
    pub max_steps: usize,
}

impl Default for MotionChannelConfig {
    fn default() -> Self {
        Self {
            window_size: 4,
            queue_size: 1024,
            max_steps: 1_000_000,
        }
    }
}

/// Physical transport to the motion controller
pub trait MotionLink: Send {
    /// Write one command line
    fn transmit(&mut self, command: &str) -> Result<()>;
}

/// Link that keeps everything it transmits in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    sent: Arc<Mutex<Vec<String>>>,
}

impl MemoryLink {
    /// Create an empty link
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything transmitted so far
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl MotionLink for MemoryLink {
    fn transmit(&mut self, command: &str) -> Result<()> {
        self.sent.lock().push(command.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    job_state: JobState,
    job_lines: VecDeque<String>,
    inbox: VecDeque<(String, CommandSource)>,
    send_queue: VecDeque<BufferedCommand>,
    in_flight: VecDeque<BufferedCommand>,
}

impl ChannelState {
    fn pending(&self) -> usize {
        self.inbox.len() + self.send_queue.len()
    }

    fn is_drained(&self) -> bool {
        self.inbox.is_empty() && self.send_queue.is_empty() && self.in_flight.is_empty()
    }
}

/// Cloneable job-control handle onto a [`BufferedMotionChannel`]
///
/// Hooks call this while the channel is processing a command, so every
/// operation only touches the shared queue state and returns immediately.
#[derive(Debug, Clone)]
pub struct MotionChannelHandle {
    state: Arc<Mutex<ChannelState>>,
}

impl JobControl for MotionChannelHandle {
    fn state(&self) -> JobState {
        self.state.lock().job_state
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        if matches!(state.job_state, JobState::Printing | JobState::Resuming) {
            state.job_state = JobState::Pausing;
            tracing::info!("Job pausing");
        }
    }

    fn resume(&self) {
        let mut state = self.state.lock();
        if matches!(state.job_state, JobState::Paused | JobState::Pausing) {
            state.job_state = JobState::Resuming;
            tracing::info!("Job resuming");
        }
    }

    fn enqueue(&self, command: &str) {
        self.state
            .lock()
            .inbox
            .push_back((command.to_string(), CommandSource::Injected));
    }
}

/// Command channel that runs the interception hooks and tracks flow control
pub struct BufferedMotionChannel {
    link: Box<dyn MotionLink>,
    config: MotionChannelConfig,
    state: Arc<Mutex<ChannelState>>,
    interceptors: InterceptorChain,
    dispatched: Vec<String>,
}

impl BufferedMotionChannel {
    /// Create a new channel on top of a link
    pub fn new(link: Box<dyn MotionLink>, config: MotionChannelConfig) -> Self {
        Self {
            link,
            config,
            state: Arc::new(Mutex::new(ChannelState::default())),
            interceptors: InterceptorChain::new(),
            dispatched: Vec::new(),
        }
    }

    /// Handle used by collaborators to pause, resume and inject commands
    pub fn handle(&self) -> MotionChannelHandle {
        MotionChannelHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Register an interceptor on both hook points
    pub fn register_interceptor(&mut self, interceptor: Box<dyn CommandInterceptor>) -> InterceptorId {
        self.interceptors.register(interceptor)
    }

    /// Remove a previously registered interceptor
    pub fn unregister_interceptor(&mut self, id: InterceptorId) -> bool {
        self.interceptors.unregister(id)
    }

    /// Load job lines and start printing
    ///
    /// Comments are stripped and empty lines skipped.
    pub fn start_job<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock();
        if state.job_state.is_active() {
            return Err(Error::other(format!(
                "Cannot start a job while another one is {}",
                state.job_state
            )));
        }

        state.job_lines = lines
            .into_iter()
            .filter_map(|line| strip_comment(line.as_ref()))
            .collect();
        state.job_state = JobState::Printing;
        tracing::info!("Job started with {} lines", state.job_lines.len());
        Ok(())
    }

    /// Submit a command outside the job
    pub fn submit(&self, command: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        if state.pending() >= self.config.queue_size {
            return Err(Error::other("Command queue is full"));
        }
        state
            .inbox
            .push_back((command.into(), CommandSource::Injected));
        Ok(())
    }

    /// Current job state
    pub fn job_state(&self) -> JobState {
        self.state.lock().job_state
    }

    /// Number of commands waiting to be queued or sent
    pub fn queued_commands_count(&self) -> usize {
        self.state.lock().pending()
    }

    /// Number of dispatched commands awaiting acknowledgment
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Every command physically dispatched so far, in order
    pub fn dispatched(&self) -> &[String] {
        &self.dispatched
    }

    /// Get the current configuration
    pub fn config(&self) -> &MotionChannelConfig {
        &self.config
    }

    /// Advance the channel by one round
    ///
    /// Settles pending pause/resume requests, feeds at most one job line,
    /// runs everything waiting through the queuing hooks and dispatches as
    /// much as the window allows. Returns whether anything moved.
    pub fn step(&mut self) -> Result<bool> {
        self.settle_job_state();

        let mut progressed = self.queue_pending();
        progressed |= self.feed_job_line();
        progressed |= self.send_ready()?;

        let mut state = self.state.lock();
        if state.job_state == JobState::Printing && state.job_lines.is_empty() && state.is_drained() {
            state.job_state = JobState::Finished;
            tracing::info!("Job finished");
            progressed = true;
        }

        Ok(progressed)
    }

    /// Handle an acknowledgment for the oldest in-flight command
    ///
    /// Returns false if nothing was in flight.
    pub fn acknowledge(&mut self) -> bool {
        let mut state = self.state.lock();
        match state.in_flight.pop_front() {
            Some(mut command) => {
                command.mark_acknowledged();
                tracing::trace!("ok for '{}'", command.command);
                true
            }
            None => false,
        }
    }

    /// Step and acknowledge until nothing moves any more
    ///
    /// Stops early, without error, when the job is paused and nothing is
    /// left to send. Returns the total number of dispatched commands.
    pub fn run_to_completion(&mut self) -> Result<usize> {
        for _ in 0..self.config.max_steps {
            let progressed = self.step()?;
            let mut acknowledged = false;
            while self.acknowledge() {
                acknowledged = true;
            }
            if !progressed && !acknowledged {
                return Ok(self.dispatched.len());
            }
        }

        Err(Error::other(format!(
            "Channel did not settle within {} steps",
            self.config.max_steps
        )))
    }

    fn settle_job_state(&self) {
        let mut state = self.state.lock();
        match state.job_state {
            JobState::Pausing => {
                state.job_state = JobState::Paused;
                tracing::info!("Job paused");
            }
            JobState::Resuming => {
                state.job_state = JobState::Printing;
                tracing::info!("Job resumed");
            }
            _ => {}
        }
    }

    /// Run injected commands through the queuing hooks
    ///
    /// Hooks may inject more commands; those are picked up in the same call.
    fn queue_pending(&mut self) -> bool {
        let mut progressed = false;
        loop {
            let next = self.state.lock().inbox.pop_front();
            let Some((command, source)) = next else {
                break;
            };
            self.run_queuing_hook(command, source);
            progressed = true;
        }
        progressed
    }

    fn feed_job_line(&mut self) -> bool {
        let line = {
            let mut state = self.state.lock();
            if state.job_state != JobState::Printing || !state.send_queue.is_empty() {
                return false;
            }
            state.job_lines.pop_front()
        };

        match line {
            Some(line) => {
                self.run_queuing_hook(line, CommandSource::Job);
                self.queue_pending();
                true
            }
            None => false,
        }
    }

    fn run_queuing_hook(&mut self, command: String, source: CommandSource) {
        let stream_command = StreamCommand::new(command, CommandPhase::Queuing, source);
        let outcome = self.interceptors.dispatch(&stream_command);

        let mut state = self.state.lock();
        match outcome {
            HookOutcome::Forward => state
                .send_queue
                .push_back(BufferedCommand::new(stream_command.command, source)),
            HookOutcome::Replace(commands) => {
                for command in commands {
                    state.send_queue.push_back(BufferedCommand::new(command, source));
                }
            }
            HookOutcome::Suppress => {
                tracing::debug!("'{}' dropped before queuing", stream_command.trimmed());
            }
        }
    }

    fn send_ready(&mut self) -> Result<bool> {
        let mut progressed = false;
        loop {
            progressed |= self.queue_pending();

            let next = {
                let mut state = self.state.lock();
                if state.in_flight.len() >= self.config.window_size {
                    break;
                }
                state.send_queue.pop_front()
            };
            let Some(command) = next else {
                break;
            };
            progressed = true;

            if command.status == CommandStatus::Cleared {
                self.transmit(command)?;
                continue;
            }

            let stream_command =
                StreamCommand::new(command.command.clone(), CommandPhase::Sending, command.source);
            match self.interceptors.dispatch(&stream_command) {
                HookOutcome::Forward => self.transmit(command)?,
                HookOutcome::Replace(commands) => {
                    let mut state = self.state.lock();
                    for replacement in commands.into_iter().rev() {
                        state
                            .send_queue
                            .push_front(BufferedCommand::cleared(replacement, command.source));
                    }
                }
                HookOutcome::Suppress => {
                    tracing::debug!("'{}' suppressed before dispatch", stream_command.trimmed());
                }
            }
        }
        Ok(progressed)
    }

    fn transmit(&mut self, mut command: BufferedCommand) -> Result<()> {
        self.link.transmit(&command.command).map_err(|e| {
            tracing::error!("Failed to send command: {}", e);
            e
        })?;

        command.mark_sent();
        self.dispatched.push(command.command.clone());
        self.state.lock().in_flight.push_back(command);
        Ok(())
    }
}

impl std::fmt::Debug for BufferedMotionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedMotionChannel")
            .field("config", &self.config)
            .field("interceptors", &self.interceptors)
            .field("dispatched", &self.dispatched.len())
            .finish()
    }
}

fn strip_comment(line: &str) -> Option<String> {
    let code = match line.find(';') {
        Some(index) => &line[..index],
        None => line,
    };
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
