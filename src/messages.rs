use crate::ballot::Ballot;
use crate::record::{ReadValue, WriteOption};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `PREPARE` opens a classic round: the key's leader asks every member to
/// promise away ballots below `ballot` and to adopt the round's classic
/// window.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Prepare {
    pub key: String,
    pub ballot: Ballot,
    pub classic_end_version: u64,
}

/// `ACCEPT` proposes a value for a key, optimistically (fast ballot) or
/// on behalf of a classic round.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub struct Accept {
    pub txn_id: String,
    pub key: String,
    /// Version the proposer believes is current for the key.
    pub old_version: u64,
    pub ballot: Ballot,
    pub value: Bytes,
}

impl Accept {
    /// Accept message carrying a classic round's option.
    pub fn classic(txn_id: &str, ballot: Ballot, option: &WriteOption) -> Accept {
        Accept {
            txn_id: txn_id.to_string(),
            key: option.key.clone(),
            old_version: option.old_version,
            ballot,
            value: option.value.clone(),
        }
    }
}

/// Inbound RPC surface of a storage node.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub enum Request {
    Ping,
    Prepare(Prepare),
    Accept(Accept),
    Decide { txn_id: String, commit: bool },
    Read { key: String },
    Recover { versions: HashMap<String, u64> },
    /// A forwarded classic round, handed to the key's leader.
    Classic { txn_id: String, option: WriteOption },
}

/// Replies mirror the request surface. Every handler resolves to one of
/// these; errors never cross the RPC boundary.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
pub enum Reply {
    Flag(bool),
    Value(ReadValue),
    Recovery(HashMap<String, ReadValue>),
    Empty,
}
