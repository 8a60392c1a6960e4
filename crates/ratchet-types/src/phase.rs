use serde::{Deserialize, Serialize};

/// One step of the fixed per-command evaluation order.
///
/// The engine always evaluates `DependencyCheck`, `ShouldDefer`,
/// `ShouldCancel`, `Execute` in that order; each phase either advances,
/// requeues the command, or terminates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecyclePhase {
    DependencyCheck,
    ShouldDefer,
    ShouldCancel,
    Execute,
}

impl LifecyclePhase {
    /// Returns the variant name as a static string for error messages and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DependencyCheck => "DependencyCheck",
            Self::ShouldDefer => "ShouldDefer",
            Self::ShouldCancel => "ShouldCancel",
            Self::Execute => "Execute",
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
