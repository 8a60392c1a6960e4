use serde::{Deserialize, Serialize};

/// Cause recorded on a log entry, tagged by origin.
///
/// Equality is by tag plus inner text: a `ByCommandMethod` reason never
/// equals a `ByDependencyCheck` reason with the same text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    /// Free-form text manufactured by the engine (e.g. a panic message).
    Plain(String),
    /// A verdict explicitly returned by one of the command's own hooks.
    ByCommandMethod(String),
    /// Produced by dependency evaluation, not by the command itself.
    ByDependencyCheck(String),
}

impl Reason {
    /// The inner text, regardless of origin tag.
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) | Self::ByCommandMethod(text) | Self::ByDependencyCheck(text) => text,
        }
    }

    /// Returns the origin tag as a static string for logging.
    pub fn origin(&self) -> &'static str {
        match self {
            Self::Plain(_) => "Plain",
            Self::ByCommandMethod(_) => "ByCommandMethod",
            Self::ByDependencyCheck(_) => "ByDependencyCheck",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

impl PartialEq<&str> for Reason {
    fn eq(&self, other: &&str) -> bool {
        self.text() == *other
    }
}
