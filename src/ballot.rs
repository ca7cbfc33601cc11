use crate::config::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ballot numbering orders competing classic-mode proposals across nodes.
///
/// Fast ballots are never ranked against each other: the fast path
/// resolves conflicts through the per-key outstanding flag, so a fast
/// ballot sits below every classic ballot, and classic ballots order by
/// `(round, proposing node)`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum Ballot {
    /// Optimistic proposal that bypasses ballot ranking.
    Fast,
    /// Leader-driven proposal for a classic round.
    Classic { round: u32, node: NodeId },
}

impl Ballot {
    pub fn is_fast(&self) -> bool {
        match *self {
            Ballot::Fast => true,
            Ballot::Classic { .. } => false,
        }
    }
}

impl Default for Ballot {
    /// The lowest ballot; what a freshly created record holds.
    fn default() -> Ballot {
        Ballot::Fast
    }
}

impl PartialOrd for Ballot {
    fn partial_cmp(&self, other: &Ballot) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ballot {
    fn cmp(&self, other: &Ballot) -> Ordering {
        match (*self, *other) {
            (Ballot::Fast, Ballot::Fast) => Ordering::Equal,
            (Ballot::Fast, Ballot::Classic { .. }) => Ordering::Less,
            (Ballot::Classic { .. }, Ballot::Fast) => Ordering::Greater,
            (
                Ballot::Classic { round, node },
                Ballot::Classic { round: other_round, node: other_node },
            ) => match round.cmp(&other_round) {
                Ordering::Equal => node.cmp(&other_node),
                o => o,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_cmp() {
        let b = Ballot::Classic { round: 5, node: 0 };
        assert!(Ballot::Classic { round: 2, node: 0 }.lt(&b));
        assert!(Ballot::Classic { round: 8, node: 0 }.gt(&b));
        assert_eq!(Ballot::Classic { round: 5, node: 0 }, b);
        assert!(b.ge(&b));
        assert!(b.le(&b));
        assert!(Ballot::Classic { round: 5, node: 1 }.gt(&b));
    }

    #[test]
    fn fast_orders_below_classic() {
        assert_eq!(Ballot::Fast, Ballot::Fast);
        assert!(Ballot::Fast < Ballot::Classic { round: 1, node: 0 });
        assert!(Ballot::Classic { round: 0, node: 0 }.gt(&Ballot::Fast));
        assert_eq!(Ballot::default(), Ballot::Fast);
    }
}
