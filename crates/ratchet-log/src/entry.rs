use chrono::{DateTime, Utc};
use ratchet_types::{CommandId, DependencyAction, LifecyclePhase, Reason};
use serde::{Deserialize, Serialize};

/// What a phase evaluation decided.
///
/// Hook phases record the verdict's direction; the dependency phase
/// records the combined action instead, since it produces no verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseOutcome {
    Verdict { proceeded: bool },
    Dependency { action: DependencyAction },
}

/// Result of one user callback invocation.
///
/// A callback either returns normally or panics; a panicking callback is
/// recorded here and the remaining callbacks still run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackOutcome {
    pub name: String,
    pub errored: bool,
}

impl CallbackOutcome {
    pub fn succeeded(&self) -> bool {
        !self.errored
    }
}

/// One record of a phase evaluation for one command.
///
/// Timestamp is wall-clock for debugging only; ordering is carried by the
/// log's append order, not by the clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub command_id: CommandId,
    pub command_kind: String,
    pub phase: LifecyclePhase,
    pub outcome: PhaseOutcome,
    pub reason: Option<Reason>,
    pub executed_callbacks: Vec<CallbackOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// The reason's inner text, if any, regardless of origin tag.
    pub fn reason_text(&self) -> Option<&str> {
        self.reason.as_ref().map(Reason::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LogEntry {
        LogEntry {
            command_id: CommandId::new(0x10),
            command_kind: "SayHello".to_string(),
            phase: LifecyclePhase::Execute,
            outcome: PhaseOutcome::Verdict { proceeded: false },
            reason: Some(Reason::ByCommandMethod(
                "Cannot say hello to no one.".to_string(),
            )),
            executed_callbacks: vec![CallbackOutcome {
                name: "notify".to_string(),
                errored: true,
            }],
            timestamp: std::time::SystemTime::UNIX_EPOCH.into(),
        }
    }

    #[test]
    fn reason_text_strips_origin_tag() {
        assert_eq!(entry().reason_text(), Some("Cannot say hello to no one."));
    }

    #[test]
    fn errored_callback_did_not_succeed() {
        let outcome = CallbackOutcome {
            name: "notify".to_string(),
            errored: true,
        };
        assert!(!outcome.succeeded());
    }

    #[test]
    fn entries_round_trip_through_serde() {
        let entry = entry();
        let json = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        similar_asserts::assert_eq!(back, entry);
    }

    #[test]
    fn serializes_with_tagged_outcome_and_reason() {
        insta::assert_json_snapshot!(entry(), @r###"
        {
          "command_id": 16,
          "command_kind": "SayHello",
          "phase": "Execute",
          "outcome": {
            "Verdict": {
              "proceeded": false
            }
          },
          "reason": {
            "ByCommandMethod": "Cannot say hello to no one."
          },
          "executed_callbacks": [
            {
              "name": "notify",
              "errored": true
            }
          ],
          "timestamp": "1970-01-01T00:00:00Z"
        }
        "###);
    }
}
