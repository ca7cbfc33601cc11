use crate::ballot::Ballot;
use crate::communicator::Communicator;
use crate::config::Configuration;
use crate::messages::{Accept, Prepare};
use crate::record::{ReadValue, WriteOption};
use crate::storage::Storage;
use crate::votes::{gather_recovery, gather_votes, VoteCounter};
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// Number of accept rounds one prepare phase is amortized over: a
/// prepared key keeps running classic rounds until its version reaches
/// the window end, then reverts to fast mode.
const CLASSIC_WINDOW: u64 = 4;

/// Per-key lock registry. A guard covers a record's read-modify-write and
/// is released before any outbound call.
#[derive(Default)]
struct LockTable {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LockTable {
    async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// The consensus core of a storage node: owns the record store and the
/// transaction index, implements the accept/prepare/decide/read/recover
/// handlers, and drives classic rounds for keys it leads.
pub struct Agent<S, C> {
    config: Configuration,
    db: S,
    communicator: C,
    /// transaction id -> options accepted under it, in key order
    transactions: Mutex<HashMap<String, BTreeMap<String, WriteOption>>>,
    locks: LockTable,
    vote_timeout: Duration,
    recovery_timeout: Duration,
}

impl<S: Storage, C: Communicator> Agent<S, C> {
    pub fn new(config: Configuration, db: S, communicator: C) -> Agent<S, C> {
        Agent {
            config,
            db,
            communicator,
            transactions: Mutex::new(HashMap::new()),
            locks: LockTable::default(),
            vote_timeout: Duration::from_secs(3),
            recovery_timeout: Duration::from_secs(10),
        }
    }

    /// Overrides the vote and recovery wait bounds.
    pub fn timeouts(mut self, vote: Duration, recovery: Duration) -> Agent<S, C> {
        self.vote_timeout = vote;
        self.recovery_timeout = recovery;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Liveness probe.
    pub fn ping(&self) -> bool {
        true
    }

    /// Fast- and classic-mode accept handler.
    ///
    /// An option is accepted iff the proposer's observed version is still
    /// current and, for classic ballots, the ballot is at least as fresh
    /// as the record's promise. A fast proposal is additionally refused
    /// while another option is outstanding on the key; that flag is the
    /// whole of fast-mode conflict detection.
    pub async fn on_accept(&self, accept: Accept) -> bool {
        debug!("received accept on '{}' (txn {})", accept.key, accept.txn_id);
        let _guard = self.locks.lock(&accept.key).await;

        let mut record = self.db.get(&accept.key);
        if accept.ballot.is_fast() && record.outstanding {
            warn!("outstanding option on '{}', denying the new option", accept.key);
            return false;
        }

        let fresh = accept.ballot.is_fast() || accept.ballot >= record.ballot;
        if record.version != accept.old_version || !fresh {
            warn!(
                "option denied on '{}' (version {}, proposed against {})",
                accept.key, record.version, accept.old_version
            );
            return false;
        }

        record.outstanding = true;
        let base_version = record.version;
        self.db.put(record);

        let option = WriteOption {
            key: accept.key.clone(),
            value: accept.value,
            old_version: base_version,
            classic: false,
        };
        self.transactions
            .lock()
            .unwrap()
            .entry(accept.txn_id)
            .or_default()
            .entry(accept.key)
            .or_insert(option);

        info!("option accepted");
        true
    }

    /// Applies or discards a transaction's options.
    ///
    /// A commit bumps each record to exactly the version observed at
    /// accept time plus one; both outcomes release the keys' outstanding
    /// flags. The option set is consumed either way, so a duplicate
    /// decide is a no-op.
    pub async fn on_decide(&self, txn_id: &str, commit: bool) {
        if commit {
            info!("received commit decision on txn {}", txn_id);
        } else {
            info!("received abort on txn {}", txn_id);
        }

        let options = match self.transactions.lock().unwrap().remove(txn_id) {
            Some(options) => options,
            None => return,
        };

        for (key, option) in options {
            let _guard = self.locks.lock(&key).await;
            let mut record = self.db.get(&key);
            if commit {
                record.version = option.old_version + 1;
                record.value = option.value;
            }
            record.outstanding = false;
            record.outstanding_classic = false;
            self.db.put(record);
        }
    }

    /// Snapshot of a key's committed state. A never-written key reads as
    /// version 0 with an empty value.
    pub fn on_read(&self, key: &str) -> ReadValue {
        self.db.get(key).read_value()
    }

    /// Classic prepare handler: the promise rule. The record adopts the
    /// offered ballot and classic window iff it has not already promised
    /// a higher ballot.
    pub async fn on_prepare(&self, prepare: Prepare) -> bool {
        let _guard = self.locks.lock(&prepare.key).await;

        let mut record = self.db.get(&prepare.key);
        if record.ballot > prepare.ballot {
            return false;
        }

        record.ballot = prepare.ballot;
        record.classic_end_version = prepare.classic_end_version;
        self.db.put(record);
        true
    }

    /// Builds the recovery delta for a peer: every local record the peer
    /// has never seen or holds a strictly older version of, and nothing
    /// else.
    pub fn on_recover(&self, versions: &HashMap<String, u64>) -> HashMap<String, ReadValue> {
        debug!("preparing recovery set");
        let mut delta = HashMap::new();
        for record in self.db.get_all() {
            let outdated = match versions.get(&record.key) {
                Some(version) => record.version > *version,
                None => true,
            };
            if outdated {
                delta.insert(record.key.clone(), record.read_value());
            }
        }
        delta
    }

    /// Escalates one key to a classic Paxos round after a fast-mode
    /// conflict.
    ///
    /// The key's leader guards the round with the outstanding-classic
    /// flag, runs prepare when the key is not already inside a prepared
    /// window, then broadcasts the accept and reports the majority
    /// outcome. Any other node forwards the round to the leader and
    /// waits. Vote fan-out happens with no key lock held.
    pub async fn run_classic(
        &self,
        txn_id: &str,
        key: &str,
        old_version: u64,
        value: Bytes,
    ) -> bool {
        info!("requested classic paxos on key '{}'", key);
        let leader = self.config.leader_for(key);
        let option =
            WriteOption { key: key.to_string(), value, old_version, classic: true };

        if leader != self.config.current() {
            debug!("forwarding classic round on '{}' to leader {}", key, leader);
            return self.communicator.run_classic(leader, txn_id.to_string(), option).await;
        }

        // one classic round per key at a time
        {
            let _guard = self.locks.lock(key).await;
            let mut record = self.db.get(key);
            if record.outstanding_classic {
                info!("classic round already in flight on '{}'", key);
                return false;
            }
            record.outstanding_classic = true;
            self.db.put(record);
        }

        let ballot = Ballot::Classic { round: 1, node: leader };

        if !self.db.get(key).prepared {
            info!("running prepare phase on '{}'", key);
            let prepare = {
                let _guard = self.locks.lock(key).await;
                let mut record = self.db.get(key);
                record.classic_end_version = record.version + CLASSIC_WINDOW;
                let classic_end_version = record.classic_end_version;
                self.db.put(record);
                Prepare { key: key.to_string(), ballot, classic_end_version }
            };

            if self.broadcast_prepare(prepare).await {
                info!("prepare phase on '{}' successful", key);
                let _guard = self.locks.lock(key).await;
                let mut record = self.db.get(key);
                record.prepared = true;
                self.db.put(record);
            } else {
                warn!("failed to run the prepare phase on '{}'", key);
                let _guard = self.locks.lock(key).await;
                let mut record = self.db.get(key);
                record.outstanding_classic = false;
                self.db.put(record);
                return false;
            }
        }

        info!("running accept phase on '{}'", key);
        let accepted = self.broadcast_accept(Accept::classic(txn_id, ballot, &option)).await;

        {
            let _guard = self.locks.lock(key).await;
            let mut record = self.db.get(key);
            if record.version >= record.classic_end_version {
                info!("classic window on '{}' exhausted, reverting to fast mode", key);
                record.prepared = false;
            }
            if !accepted {
                record.outstanding_classic = false;
            }
            self.db.put(record);
        }

        accepted
    }

    /// Startup reconciliation: report local versions to every peer and
    /// merge back whatever newer state the cluster holds. The wait is
    /// bounded, so an unreachable peer cannot keep the node from serving.
    pub async fn recover_from_peers(&self) {
        let mut versions = HashMap::new();
        for record in self.db.get_all() {
            versions.insert(record.key.clone(), record.version);
        }

        let replies = self
            .config
            .peers()
            .map(|peer| self.communicator.send_recover(peer, versions.clone()))
            .collect::<Vec<_>>();
        if replies.is_empty() {
            return;
        }

        for delta in gather_recovery(replies, self.recovery_timeout).await {
            info!("received recovery set with {} entries", delta.len());
            for (key, read_value) in delta {
                self.merge_recovered(&key, read_value).await;
            }
        }
    }

    async fn merge_recovered(&self, key: &str, read_value: ReadValue) {
        let _guard = self.locks.lock(key).await;
        let mut record = self.db.get(key);
        if record.version == 0 || read_value.version > record.version {
            debug!("recovered value for '{}'", key);
            record.version = read_value.version;
            record.classic_end_version = read_value.classic_end_version;
            record.value = read_value.value;
            self.db.put(record);
        }
    }

    async fn broadcast_prepare(&self, prepare: Prepare) -> bool {
        let counter = VoteCounter::new(self.config.member_count(), self.config.quorum_size());
        let replies = self
            .config
            .members()
            .map(|node| self.communicator.send_prepare(node, prepare.clone()))
            .collect::<Vec<_>>();
        gather_votes(counter, replies, self.vote_timeout).await
    }

    async fn broadcast_accept(&self, accept: Accept) -> bool {
        let counter = VoteCounter::new(self.config.member_count(), self.config.quorum_size());
        let replies = self
            .config
            .members()
            .map(|node| self.communicator.send_accept(node, accept.clone()))
            .collect::<Vec<_>>();
        gather_votes(counter, replies, self.vote_timeout).await
    }
}
