//! # MagnetPnP Communication
//!
//! The command-stream side of MagnetPnP: the two interception hook points,
//! the job-control collaborator and a buffered channel that drives both
//! hooks over a bounded window of unacknowledged commands.

pub mod communication;

pub use communication::{
    BufferedCommand, BufferedMotionChannel, CommandInterceptor, CommandPhase, CommandSource,
    CommandStatus, HookOutcome, InterceptorChain, InterceptorId, JobControl, JobState, MemoryLink,
    MotionChannelConfig, MotionChannelHandle, MotionLink, StreamCommand,
};
