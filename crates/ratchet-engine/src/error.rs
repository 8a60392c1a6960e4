use thiserror::Error;

/// Errors produced by queue operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum QueueError {
    /// `process_once`/`process_all` was called while a process call was
    /// already running, typically from inside a hook or callback. Hooks
    /// may submit new commands, but processing is not re-entrant.
    #[error("queue is already processing; re-entrant process calls are not supported")]
    AlreadyProcessing,
}
