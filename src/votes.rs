use crate::record::ReadValue;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// `VoteCounter` tallies boolean votes from cluster members and resolves
/// to a decision as soon as one is knowable. A member that never answers
/// counts as a missed vote: misses can defeat a majority but never form
/// one. Once resolved, further votes do not change the outcome.
#[derive(Clone, Debug)]
pub struct VoteCounter {
    members: usize,
    quorum: usize,
    accepts: usize,
    rejects: usize,
}

impl VoteCounter {
    /// Creates a counter for one round over `members` nodes requiring
    /// `quorum` accepts.
    pub fn new(members: usize, quorum: usize) -> VoteCounter {
        assert!(quorum > 0 && quorum <= members);
        VoteCounter { members, quorum, accepts: 0, rejects: 0 }
    }

    /// Records an explicit vote, returning the round's resolution once
    /// known.
    pub fn vote(&mut self, accept: bool) -> Option<bool> {
        if accept {
            self.accepts += 1;
        } else {
            self.rejects += 1;
        }
        self.resolution()
    }

    /// Records a member that will never vote (timeout or transport
    /// failure).
    pub fn miss(&mut self) -> Option<bool> {
        self.rejects += 1;
        self.resolution()
    }

    fn resolution(&self) -> Option<bool> {
        if self.accepts >= self.quorum {
            Some(true)
        } else if self.rejects > self.members - self.quorum {
            // the quorum can no longer be reached
            Some(false)
        } else {
            None
        }
    }
}

/// Fans a round of vote replies through a single wait, stopping at the
/// earliest definite outcome: quorum reached, quorum impossible, or the
/// deadline. Replies arriving after resolution are dropped.
pub async fn gather_votes<F>(mut counter: VoteCounter, replies: Vec<F>, wait: Duration) -> bool
where
    F: Future<Output = Option<bool>>,
{
    let mut pending: FuturesUnordered<F> = replies.into_iter().collect();
    let round = async move {
        while let Some(reply) = pending.next().await {
            let resolved = match reply {
                Some(vote) => counter.vote(vote),
                None => counter.miss(),
            };
            if let Some(result) = resolved {
                return result;
            }
        }
        false
    };

    match timeout(wait, round).await {
        Ok(result) => result,
        Err(_) => {
            warn!("vote round timed out before resolution");
            false
        }
    }
}

/// `RecoverySet` collects the recovery deltas peers send back at startup.
/// Completion is all peers accounted for; the driver below additionally
/// bounds the wait so an unreachable peer cannot hold up the serving
/// transition.
pub struct RecoverySet {
    expected: usize,
    deltas: Vec<HashMap<String, ReadValue>>,
    misses: usize,
}

impl RecoverySet {
    pub fn new(expected: usize) -> RecoverySet {
        RecoverySet { expected, deltas: Vec::new(), misses: 0 }
    }

    /// Records one peer's response (or its unreachability). Returns true
    /// once every peer has been accounted for.
    pub fn add(&mut self, delta: Option<HashMap<String, ReadValue>>) -> bool {
        match delta {
            Some(delta) => self.deltas.push(delta),
            None => self.misses += 1,
        }
        self.complete()
    }

    pub fn complete(&self) -> bool {
        self.deltas.len() + self.misses >= self.expected
    }

    pub fn into_deltas(self) -> Vec<HashMap<String, ReadValue>> {
        self.deltas
    }
}

/// Gathers recovery responses until every peer has answered or the
/// deadline passes, returning whatever deltas arrived in time.
pub async fn gather_recovery<F>(replies: Vec<F>, wait: Duration) -> Vec<HashMap<String, ReadValue>>
where
    F: Future<Output = Option<HashMap<String, ReadValue>>>,
{
    let mut set = RecoverySet::new(replies.len());
    let mut pending: FuturesUnordered<F> = replies.into_iter().collect();
    let gathering = async {
        while let Some(reply) = pending.next().await {
            if set.add(reply) {
                break;
            }
        }
    };

    if timeout(wait, gathering).await.is_err() {
        warn!("recovery wait elapsed; continuing with partial responses");
    }
    set.into_deltas()
}
