//! Rust implementation of an MDCC storage-node agent for replicated
//! key-value storage.
//!
//! MDCC lets any replica accept a write optimistically: "fast" proposals
//! carry the version the proposer last observed and are guarded by a
//! single-owner outstanding flag per key instead of a leader election.
//! When a fast proposal collides with a pending one, the key escalates to
//! classic Paxos rounds driven by a deterministic per-key leader, then
//! reverts to fast mode once the classic window is exhausted. A restarted
//! node reconciles its record versions with every reachable peer before it
//! takes traffic.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mdcc::{Agent, Configuration, HttpCommunicator, MemStore};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let config = Configuration::new(
//!     (0u32, "127.0.0.1:4000".parse().unwrap()),
//!     vec![(1, "127.0.0.1:4001".parse().unwrap()),
//!          (2, "127.0.0.1:4002".parse().unwrap())].into_iter());
//!
//! let addr = *config.current_address();
//! let agent = Arc::new(Agent::new(
//!     config.clone(),
//!     MemStore::new(),
//!     HttpCommunicator::new(config),
//! ));
//!
//! tokio::spawn(mdcc::serve(agent.clone(), addr));
//! agent.recover_from_peers().await;
//! # }
//! ```
#[macro_use]
extern crate log;

mod agent;
mod ballot;
mod communicator;
pub mod config;
mod messages;
mod net;
mod record;
mod storage;
mod votes;

pub use agent::Agent;
pub use ballot::Ballot;
pub use communicator::{Communicator, HttpCommunicator};
pub use config::{Configuration, NodeId};
pub use messages::{Accept, Prepare, Reply, Request};
pub use net::serve;
pub use record::{ReadValue, Record, WriteOption};
pub use storage::{MemStore, Storage};
pub use votes::{RecoverySet, VoteCounter};
