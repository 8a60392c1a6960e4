use serde::{Deserialize, Serialize};

/// Outcome of evaluating one dependency entry, and the policy knob for
/// non-terminal predecessors.
///
/// Variants are ordered by severity (`Proceed < Defer < Cancel`); the
/// combined action over several dependencies is the maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DependencyAction {
    /// The predecessor does not block the command.
    Proceed,
    /// Requeue the command and check again on a later poll.
    Defer,
    /// Terminate the command as `Canceled`.
    Cancel,
}

impl std::fmt::Display for DependencyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proceed => write!(f, "Proceed"),
            Self::Defer => write!(f, "Defer"),
            Self::Cancel => write!(f, "Cancel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_is_proceed_defer_cancel() {
        assert!(DependencyAction::Proceed < DependencyAction::Defer);
        assert!(DependencyAction::Defer < DependencyAction::Cancel);
    }

    #[test]
    fn max_picks_most_severe() {
        let combined = [
            DependencyAction::Defer,
            DependencyAction::Cancel,
            DependencyAction::Proceed,
        ]
        .into_iter()
        .max();
        assert_eq!(combined, Some(DependencyAction::Cancel));
    }
}
