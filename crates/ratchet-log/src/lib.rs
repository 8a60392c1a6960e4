pub mod entry;
pub mod log;
pub mod timing;

pub use entry::{CallbackOutcome, LogEntry, PhaseOutcome};
pub use log::CommandLog;
pub use timing::{PhaseTiming, TimingRegistry, TimingStats};
