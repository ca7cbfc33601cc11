use crate::config::{Configuration, NodeId};
use crate::messages::{Accept, Prepare, Reply, Request};
use crate::record::{ReadValue, WriteOption};
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

/// Async RPC primitives the agent drives. Vote-style calls resolve to
/// `None` on transport failure so a dead peer reads as a missed vote, not
/// an error.
#[async_trait]
pub trait Communicator: Send + Sync + 'static {
    /// Liveness probe.
    async fn ping(&self, node: NodeId) -> bool;

    /// Sends a classic-round prepare, returning the member's promise vote.
    async fn send_prepare(&self, node: NodeId, prepare: Prepare) -> Option<bool>;

    /// Sends an accept (fast or classic), returning the member's vote.
    async fn send_accept(&self, node: NodeId, accept: Accept) -> Option<bool>;

    /// Relays a transaction decision.
    async fn send_decide(&self, node: NodeId, txn_id: String, commit: bool) -> Option<()>;

    /// Reports local versions to a peer, returning the peer's delta of
    /// strictly newer records.
    async fn send_recover(
        &self,
        node: NodeId,
        versions: HashMap<String, u64>,
    ) -> Option<HashMap<String, ReadValue>>;

    /// Hands a whole classic round to the remote leader of the key and
    /// waits for its outcome.
    async fn run_classic(&self, node: NodeId, txn_id: String, option: WriteOption) -> bool;
}

/// `Communicator` over HTTP: one POST endpoint per node, bincode-encoded
/// bodies.
pub struct HttpCommunicator {
    config: Configuration,
    client: Client<HttpConnector, Body>,
    rpc_timeout: Duration,
}

impl HttpCommunicator {
    pub fn new(config: Configuration) -> HttpCommunicator {
        HttpCommunicator { config, client: Client::new(), rpc_timeout: Duration::from_secs(3) }
    }

    /// Overrides the per-call timeout.
    pub fn rpc_timeout(mut self, rpc_timeout: Duration) -> HttpCommunicator {
        self.rpc_timeout = rpc_timeout;
        self
    }

    async fn call(&self, node: NodeId, request: &Request, wait: Duration) -> Option<Reply> {
        let addr = match self.config.address(node) {
            Some(addr) => addr,
            None => {
                error!("no address for node {}", node);
                return None;
            }
        };

        let body = match bincode::serialize(request) {
            Ok(body) => body,
            Err(e) => {
                error!("error serializing request: {:?}", e);
                return None;
            }
        };

        let http_request = hyper::Request::builder()
            .method(Method::POST)
            .uri(format!("http://{}/", addr))
            .body(Body::from(body))
            .ok()?;

        let response = match timeout(wait, self.client.request(http_request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("rpc to node {} failed: {}", node, e);
                return None;
            }
            Err(_) => {
                warn!("rpc to node {} timed out", node);
                return None;
            }
        };

        let body = match hyper::body::to_bytes(response.into_body()).await {
            Ok(body) => body,
            Err(e) => {
                warn!("error reading reply from node {}: {}", node, e);
                return None;
            }
        };

        match bincode::deserialize(&body) {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!("error deserializing reply from node {}: {:?}", node, e);
                None
            }
        }
    }

    fn flag_reply(node: NodeId, reply: Reply) -> Option<bool> {
        match reply {
            Reply::Flag(vote) => Some(vote),
            reply => {
                warn!("unexpected reply from node {}: {:?}", node, reply);
                None
            }
        }
    }
}

#[async_trait]
impl Communicator for HttpCommunicator {
    async fn ping(&self, node: NodeId) -> bool {
        match self.call(node, &Request::Ping, self.rpc_timeout).await {
            Some(Reply::Flag(alive)) => alive,
            _ => false,
        }
    }

    async fn send_prepare(&self, node: NodeId, prepare: Prepare) -> Option<bool> {
        let reply = self.call(node, &Request::Prepare(prepare), self.rpc_timeout).await?;
        HttpCommunicator::flag_reply(node, reply)
    }

    async fn send_accept(&self, node: NodeId, accept: Accept) -> Option<bool> {
        let reply = self.call(node, &Request::Accept(accept), self.rpc_timeout).await?;
        HttpCommunicator::flag_reply(node, reply)
    }

    async fn send_decide(&self, node: NodeId, txn_id: String, commit: bool) -> Option<()> {
        let reply =
            self.call(node, &Request::Decide { txn_id, commit }, self.rpc_timeout).await?;
        match reply {
            Reply::Empty => Some(()),
            reply => {
                warn!("unexpected decide reply from node {}: {:?}", node, reply);
                None
            }
        }
    }

    async fn send_recover(
        &self,
        node: NodeId,
        versions: HashMap<String, u64>,
    ) -> Option<HashMap<String, ReadValue>> {
        let reply = self.call(node, &Request::Recover { versions }, self.rpc_timeout).await?;
        match reply {
            Reply::Recovery(delta) => Some(delta),
            reply => {
                warn!("unexpected recover reply from node {}: {:?}", node, reply);
                None
            }
        }
    }

    async fn run_classic(&self, node: NodeId, txn_id: String, option: WriteOption) -> bool {
        // the remote leader runs up to two full vote rounds before replying
        let wait = self.rpc_timeout * 4;
        match self.call(node, &Request::Classic { txn_id, option }, wait).await {
            Some(Reply::Flag(result)) => result,
            Some(reply) => {
                warn!("unexpected classic reply from node {}: {:?}", node, reply);
                false
            }
            None => false,
        }
    }
}
