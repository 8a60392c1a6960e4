use crate::entry::LogEntry;
use ratchet_types::CommandId;
use serde::{Deserialize, Serialize};

/// Append-only record of everything the queue did.
///
/// One entry per phase evaluation per command, in evaluation order. The
/// queue owns the log for its whole lifetime; per-call views are cut with
/// [`CommandLog::entries_from`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLog {
    entries: Vec<LogEntry>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry, if any.
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Entries recorded for one command, in append order.
    ///
    /// Scan complexity: O(n).
    pub fn entries_for(&self, id: CommandId) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.command_id == id)
    }

    /// The most recent entry for one command, if any.
    ///
    /// Scan complexity: O(n).
    pub fn last_for(&self, id: CommandId) -> Option<&LogEntry> {
        self.entries.iter().rev().find(|e| e.command_id == id)
    }

    /// Entries appended at or after `start`: the slice a `process_*` call
    /// returns as its own log.
    pub fn entries_from(&self, start: usize) -> &[LogEntry] {
        &self.entries[start.min(self.entries.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PhaseOutcome;
    use ratchet_types::{LifecyclePhase, Reason};

    fn entry(id: usize, phase: LifecyclePhase, reason: Option<&str>) -> LogEntry {
        LogEntry {
            command_id: CommandId::new(id),
            command_kind: "Probe".to_string(),
            phase,
            outcome: PhaseOutcome::Verdict { proceeded: true },
            reason: reason.map(|r| Reason::ByCommandMethod(r.to_string())),
            executed_callbacks: Vec::new(),
            timestamp: std::time::SystemTime::UNIX_EPOCH.into(),
        }
    }

    #[test]
    fn append_preserves_order() {
        let mut log = CommandLog::new();
        log.append(entry(1, LifecyclePhase::ShouldDefer, None));
        log.append(entry(1, LifecyclePhase::ShouldCancel, None));
        log.append(entry(2, LifecyclePhase::Execute, Some("done")));

        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().command_id, CommandId::new(2));
    }

    #[test]
    fn entries_for_filters_by_command() {
        let mut log = CommandLog::new();
        log.append(entry(1, LifecyclePhase::ShouldDefer, None));
        log.append(entry(2, LifecyclePhase::Execute, None));
        log.append(entry(1, LifecyclePhase::Execute, Some("ok")));

        let phases: Vec<_> = log
            .entries_for(CommandId::new(1))
            .map(|e| e.phase)
            .collect();
        similar_asserts::assert_eq!(
            phases,
            vec![LifecyclePhase::ShouldDefer, LifecyclePhase::Execute]
        );
    }

    #[test]
    fn last_for_returns_most_recent() {
        let mut log = CommandLog::new();
        log.append(entry(1, LifecyclePhase::ShouldDefer, Some("wait")));
        log.append(entry(1, LifecyclePhase::Execute, Some("ok")));

        let last = log.last_for(CommandId::new(1)).unwrap();
        assert_eq!(last.reason_text(), Some("ok"));
        assert!(log.last_for(CommandId::new(9)).is_none());
    }

    #[test]
    fn entries_from_cuts_a_suffix() {
        let mut log = CommandLog::new();
        log.append(entry(1, LifecyclePhase::Execute, None));
        log.append(entry(2, LifecyclePhase::Execute, None));

        assert_eq!(log.entries_from(1).len(), 1);
        assert_eq!(log.entries_from(5).len(), 0);
    }
}
