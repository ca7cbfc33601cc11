use crate::ballot::Ballot;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Per-key consensus state. Records are created lazily with version 0 on
/// first access and persist for the lifetime of the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    /// Monotonically non-decreasing; 0 means the key has never been written.
    pub version: u64,
    /// Payload associated with the current version.
    pub value: Bytes,
    /// Highest ballot this key has promised in classic mode.
    pub ballot: Ballot,
    /// A fast option is awaiting its transaction's decision; a second
    /// concurrent fast proposal is refused while this is set.
    pub outstanding: bool,
    /// A classic round is in flight for this key.
    pub outstanding_classic: bool,
    /// The prepare phase has succeeded; accept rounds may proceed without
    /// re-preparing.
    pub prepared: bool,
    /// Version at which the key reverts from classic back to fast mode.
    pub classic_end_version: u64,
}

impl Record {
    pub fn new(key: &str) -> Record {
        Record {
            key: key.to_string(),
            version: 0,
            value: Bytes::new(),
            ballot: Ballot::default(),
            outstanding: false,
            outstanding_classic: false,
            prepared: false,
            classic_end_version: 0,
        }
    }

    /// Read-path projection of the record, returned to clients and
    /// recovery peers.
    pub fn read_value(&self) -> ReadValue {
        ReadValue {
            version: self.version,
            classic_end_version: self.classic_end_version,
            value: self.value.clone(),
        }
    }
}

/// Snapshot of a record's committed state.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct ReadValue {
    pub version: u64,
    pub classic_end_version: u64,
    pub value: Bytes,
}

/// A proposed change for one key, pending its transaction's commit or
/// abort. `old_version` is the version observed when the option was
/// accepted; a commit bumps the record to exactly `old_version + 1`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct WriteOption {
    pub key: String,
    pub value: Bytes,
    pub old_version: u64,
    pub classic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record() {
        let record = Record::new("users:1");
        assert_eq!(0, record.version);
        assert!(record.value.is_empty());
        assert_eq!(Ballot::Fast, record.ballot);
        assert!(!record.outstanding);
        assert!(!record.outstanding_classic);
        assert!(!record.prepared);
    }

    #[test]
    fn read_value_projection() {
        let mut record = Record::new("users:1");
        record.version = 3;
        record.classic_end_version = 7;
        record.value = Bytes::from("v");
        assert_eq!(
            ReadValue { version: 3, classic_end_version: 7, value: Bytes::from("v") },
            record.read_value()
        );
    }
}
