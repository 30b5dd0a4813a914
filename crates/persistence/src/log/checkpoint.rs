use crate::key::LogKey;

/// Position of the single logical consumer of one parent's message log.
///
/// `Unset` means the consumer has never been initialized; listing then starts
/// at the beginning of the log. `Set(key)` means every record up to and
/// including `key` has been processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Checkpoint {
    /// No position recorded.
    #[default]
    Unset,
    /// Last processed record.
    Set(LogKey),
}

impl Checkpoint {
    /// Returns true if a position is recorded.
    pub fn is_set(&self) -> bool {
        matches!(self, Checkpoint::Set(_))
    }

    /// Returns the recorded key, if any.
    pub fn key(&self) -> Option<&LogKey> {
        match self {
            Checkpoint::Set(key) => Some(key),
            Checkpoint::Unset => None,
        }
    }
}

impl From<Option<LogKey>> for Checkpoint {
    fn from(key: Option<LogKey>) -> Self {
        key.map_or(Checkpoint::Unset, Checkpoint::Set)
    }
}
