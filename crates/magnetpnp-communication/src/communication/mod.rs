//! Command path between the print job and the motion controller

pub mod buffered;
pub mod job;
pub mod stream;

pub use buffered::{
    BufferedCommand, BufferedMotionChannel, CommandStatus, MemoryLink, MotionChannelConfig,
    MotionChannelHandle, MotionLink,
};
pub use job::{JobControl, JobState};
pub use stream::{
    CommandInterceptor, CommandPhase, CommandSource, HookOutcome, InterceptorChain,
    InterceptorId, StreamCommand,
};
