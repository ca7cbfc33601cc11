use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;

/// A `NodeId` is a unique value that identifies a member
/// within the cluster configuration.
pub type NodeId = u32;

struct Inner {
    peers: HashMap<NodeId, SocketAddr>,
    /// All member ids, current node included, in sorted order.
    members: Vec<NodeId>,
}

/// Configuration holds the state of the membership of the cluster.
///
/// Shared freely across request handlers; membership is fixed for the
/// lifetime of the process.
#[derive(Clone)]
pub struct Configuration {
    current: (NodeId, SocketAddr),
    inner: Arc<Inner>,
}

impl Configuration {
    /// Creates a new configuration
    pub fn new<I>(current: (NodeId, SocketAddr), peers: I) -> Configuration
    where
        I: Iterator<Item = (NodeId, SocketAddr)>,
    {
        let peers: HashMap<NodeId, SocketAddr> = peers.collect();
        let mut members: Vec<NodeId> = peers.keys().cloned().collect();
        members.push(current.0);
        members.sort_unstable();
        Configuration { current, inner: Arc::new(Inner { peers, members }) }
    }

    /// Size of the majority quorum over all members.
    pub fn quorum_size(&self) -> usize {
        1 + (self.inner.members.len() / 2)
    }

    /// Number of members, the current node included.
    pub fn member_count(&self) -> usize {
        self.inner.members.len()
    }

    /// Current node identifier
    pub fn current(&self) -> NodeId {
        self.current.0
    }

    /// Current node address
    pub fn current_address(&self) -> &SocketAddr {
        &self.current.1
    }

    /// Iterator over the `NodeId` values of peers.
    pub fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.peers.keys().cloned()
    }

    /// Iterator over all member ids, the current node included.
    pub fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.members.iter().cloned()
    }

    /// Leader for a key's classic rounds: a hash of the key over the
    /// sorted member list. Pure function of (key, membership), so every
    /// member resolves the same leader.
    pub fn leader_for(&self, key: &str) -> NodeId {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let members = &self.inner.members;
        members[(hasher.finish() % members.len() as u64) as usize]
    }

    /// Gets the address of a node.
    pub fn address(&self, node: NodeId) -> Option<SocketAddr> {
        if node == self.current.0 {
            Some(self.current.1)
        } else {
            self.inner.peers.get(&node).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_of(members: u32) -> Configuration {
        Configuration::new(
            (0, "127.0.0.1:9000".parse().unwrap()),
            (1..members).map(|n| (n, format!("127.0.0.1:900{}", n).parse().unwrap())),
        )
    }

    #[test]
    fn quorum_sizes() {
        assert_eq!(1, config_of(1).quorum_size());
        assert_eq!(2, config_of(3).quorum_size());
        assert_eq!(3, config_of(4).quorum_size());
        assert_eq!(3, config_of(5).quorum_size());
    }

    #[test]
    fn leader_is_stable_and_a_member() {
        let config = config_of(3);
        for key in &["a", "b", "users:42", ""] {
            let leader = config.leader_for(key);
            assert!(config.members().any(|m| m == leader));
            assert_eq!(leader, config.leader_for(key));
        }
    }

    #[test]
    fn single_member_leads_everything() {
        let config = config_of(1);
        assert_eq!(0, config.leader_for("anything"));
    }

    #[test]
    fn addresses() {
        let config = config_of(3);
        assert_eq!(Some("127.0.0.1:9000".parse().unwrap()), config.address(0));
        assert_eq!(Some("127.0.0.1:9001".parse().unwrap()), config.address(1));
        assert_eq!(None, config.address(9));
    }
}
