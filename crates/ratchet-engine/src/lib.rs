pub mod chain;
pub mod command;
pub mod dependency;
pub mod error;
pub mod queue;
mod shield;

pub use chain::{ChainCommand, ChainResponse, ChainSpec, CommandChainBuilder};
pub use command::{Command, CommandHandle, CommandRef};
pub use dependency::{DependencyCheck, DependencyEntry};
pub use error::QueueError;
pub use queue::{
    CommandQueue, DEFAULT_MAX_TOTAL_ITERATIONS, DEFAULT_TIMING_QUEUE_LENGTH, QueueProcessResponse,
};
