use ratchet_types::{DependencyAction, ResponseStatus};

use crate::command::{Command, CommandCell, CommandHandle};

/// How to treat one predecessor command.
///
/// Terminal predecessor statuses decide for themselves (`Completed`
/// proceeds, `Canceled`/`Failed` cancel); the two knobs only apply while
/// the predecessor is still `Created` or `Pending`. Both default to
/// [`DependencyAction::Defer`].
///
/// A bare handle reference converts into an entry with the defaults:
/// `DependencyEntry::from(&previous)`.
pub struct DependencyEntry {
    target: CommandCell,
    on_created: DependencyAction,
    on_pending: DependencyAction,
}

impl DependencyEntry {
    pub fn new<C: Command>(target: &CommandHandle<C>) -> Self {
        Self {
            target: target.erased_cell(),
            on_created: DependencyAction::Defer,
            on_pending: DependencyAction::Defer,
        }
    }

    /// Action when the predecessor has never been processed.
    pub fn on_created(mut self, action: DependencyAction) -> Self {
        self.on_created = action;
        self
    }

    /// Action when the predecessor has deferred and is waiting for a
    /// later poll.
    pub fn on_pending(mut self, action: DependencyAction) -> Self {
        self.on_pending = action;
        self
    }

    fn evaluate_one(&self) -> (DependencyAction, Option<String>) {
        let target = self.target.borrow();
        let status = target.status();
        let summary = format!("{} (status: {})", target.kind(), status);
        match status {
            ResponseStatus::Completed => (DependencyAction::Proceed, None),
            ResponseStatus::Canceled | ResponseStatus::Failed => (
                DependencyAction::Cancel,
                Some(format!("Canceled due to dependency: {summary}")),
            ),
            ResponseStatus::Created => policy_outcome(self.on_created, &summary),
            ResponseStatus::Pending => policy_outcome(self.on_pending, &summary),
        }
    }
}

impl<C: Command> From<&CommandHandle<C>> for DependencyEntry {
    fn from(handle: &CommandHandle<C>) -> Self {
        Self::new(handle)
    }
}

fn policy_outcome(action: DependencyAction, summary: &str) -> (DependencyAction, Option<String>) {
    let reason = match action {
        DependencyAction::Proceed => None,
        DependencyAction::Defer => Some(format!("Waiting on dependency: {summary}")),
        DependencyAction::Cancel => Some(format!("Canceled due to dependency: {summary}")),
    };
    (action, reason)
}

/// Combined result over a command's dependency entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyCheck {
    pub action: DependencyAction,
    pub reason: Option<String>,
}

/// Fold the entries into the most severe individual action.
///
/// Pure over the predecessors' current statuses. The reason is taken from
/// the first entry that raised the combined severity to its final level.
pub(crate) fn evaluate(entries: &[DependencyEntry]) -> DependencyCheck {
    let mut combined = DependencyCheck {
        action: DependencyAction::Proceed,
        reason: None,
    };
    for entry in entries {
        let (action, reason) = entry.evaluate_one();
        if action > combined.action {
            combined = DependencyCheck { action, reason };
        }
    }
    combined
}
