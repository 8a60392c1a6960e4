pub mod action;
pub mod command_id;
pub mod phase;
pub mod reason;
pub mod response;
pub mod status;
pub mod verdict;

pub use action::DependencyAction;
pub use command_id::CommandId;
pub use phase::LifecyclePhase;
pub use reason::Reason;
pub use response::{CommandResponse, Response};
pub use status::ResponseStatus;
pub use verdict::{CancelVerdict, DeferVerdict, ExecuteVerdict};
