use serde::{Deserialize, Serialize};

/// Current state of a command's response.
///
/// `Created` and `Pending` are non-terminal. Once a command reaches a
/// terminal status it never transitions again; the engine enforces this at
/// every status write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// Submitted (or constructed) but never processed.
    #[default]
    Created,
    /// Deferred at least once; waiting in the queue for another poll.
    Pending,
    /// Terminal.
    Canceled,
    /// Terminal.
    Failed,
    /// Terminal.
    Completed,
}

impl ResponseStatus {
    /// Whether the command has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Failed | Self::Completed)
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Pending => write!(f, "Pending"),
            Self::Canceled => write!(f, "Canceled"),
            Self::Failed => write!(f, "Failed"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_canceled_failed_completed_are_terminal() {
        assert!(!ResponseStatus::Created.is_terminal());
        assert!(!ResponseStatus::Pending.is_terminal());
        assert!(ResponseStatus::Canceled.is_terminal());
        assert!(ResponseStatus::Failed.is_terminal());
        assert!(ResponseStatus::Completed.is_terminal());
    }

    #[test]
    fn default_is_created() {
        assert_eq!(ResponseStatus::default(), ResponseStatus::Created);
    }

    #[test]
    fn display_matches_variant_names() {
        assert_eq!(ResponseStatus::Pending.to_string(), "Pending");
        assert_eq!(ResponseStatus::Completed.to_string(), "Completed");
    }
}
