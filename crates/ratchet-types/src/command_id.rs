use serde::{Deserialize, Serialize};

/// Identity of a command instance.
///
/// Derived from the reference identity of the command's shared cell, so
/// two handles to the same instance carry the same id while two distinct
/// instances never collide while alive. Used for the queue's O(1)
/// membership test and to key log entries.
///
/// Display: lowercase hex of the raw address (`"0x7f3a..."`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(usize);

impl CommandId {
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_hex() {
        assert_eq!(CommandId::new(0xabc).to_string(), "0xabc");
    }

    #[test]
    fn equality_is_by_raw_value() {
        assert_eq!(CommandId::new(7), CommandId::new(7));
        assert_ne!(CommandId::new(7), CommandId::new(8));
    }
}
