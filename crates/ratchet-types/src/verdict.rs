use serde::{Deserialize, Serialize};

/// Returned by a command's `should_defer` hook.
///
/// `DeferVerdict::defer()` requeues the command for a later poll;
/// `DeferVerdict::proceed()` advances to the cancel check. A reason is
/// optional and attached fluently: `DeferVerdict::defer().with_reason(..)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferVerdict {
    proceed: bool,
    reason: Option<String>,
}

impl DeferVerdict {
    /// Do not defer; continue to the next lifecycle phase.
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            reason: None,
        }
    }

    /// Defer the command; it is re-appended to the queue tail.
    pub fn defer() -> Self {
        Self {
            proceed: false,
            reason: None,
        }
    }

    /// Adds or replaces the optional reason. The last value wins.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether the lifecycle advances past this phase.
    pub fn proceeds(&self) -> bool {
        self.proceed
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Returned by a command's `should_cancel` hook.
///
/// `CancelVerdict::cancel()` terminates the command as `Canceled`;
/// `CancelVerdict::proceed()` advances to execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelVerdict {
    proceed: bool,
    reason: Option<String>,
}

impl CancelVerdict {
    /// Do not cancel; continue to the next lifecycle phase.
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            reason: None,
        }
    }

    /// Cancel the command (terminal).
    pub fn cancel() -> Self {
        Self {
            proceed: false,
            reason: None,
        }
    }

    /// Adds or replaces the optional reason. The last value wins.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn proceeds(&self) -> bool {
        self.proceed
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Returned by a command's `execute` hook.
///
/// `success()` completes the command, `failure()` fails it. Payloads do
/// not travel in the verdict; commands write them to their own response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteVerdict {
    proceed: bool,
    reason: Option<String>,
}

impl ExecuteVerdict {
    /// The command executed successfully (terminal, `Completed`).
    pub fn success() -> Self {
        Self {
            proceed: true,
            reason: None,
        }
    }

    /// The command failed (terminal, `Failed`).
    pub fn failure() -> Self {
        Self {
            proceed: false,
            reason: None,
        }
    }

    /// Adds or replaces the optional reason. The last value wins.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn proceeds(&self) -> bool {
        self.proceed
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proceed_constructors_carry_no_reason() {
        assert!(DeferVerdict::proceed().proceeds());
        assert!(CancelVerdict::proceed().proceeds());
        assert!(ExecuteVerdict::success().proceeds());
        assert_eq!(DeferVerdict::proceed().reason(), None);
        assert_eq!(ExecuteVerdict::success().reason(), None);
    }

    #[test]
    fn negative_constructors_do_not_proceed() {
        assert!(!DeferVerdict::defer().proceeds());
        assert!(!CancelVerdict::cancel().proceeds());
        assert!(!ExecuteVerdict::failure().proceeds());
    }

    #[test]
    fn reason_is_optional_and_fluent() {
        let verdict = DeferVerdict::defer().with_reason("waiting on input");
        assert_eq!(verdict.reason(), Some("waiting on input"));

        // Reason stays optional: a bare defer is a valid verdict.
        assert_eq!(DeferVerdict::defer().reason(), None);
    }

    #[test]
    fn with_reason_last_value_wins() {
        let verdict = ExecuteVerdict::failure()
            .with_reason("first")
            .with_reason("second");
        assert_eq!(verdict.reason(), Some("second"));
    }

    #[test]
    fn verdicts_round_trip_through_serde() {
        let verdict = CancelVerdict::cancel().with_reason("external stop");
        let json = serde_json::to_string(&verdict).unwrap();
        let back: CancelVerdict = serde_json::from_str(&json).unwrap();
        similar_asserts::assert_eq!(back, verdict);
    }
}
