#[macro_use]
extern crate log;

use mdcc::{serve, Agent, Configuration, HttpCommunicator, MemStore, NodeId};
use std::env::args;
use std::net::{Ipv4Addr, SocketAddr};
use std::process::exit;
use std::sync::Arc;

fn local_config(node: u16) -> Configuration {
    assert!(node < 3);

    let ip = Ipv4Addr::LOCALHOST.into();
    let current = (node as NodeId, SocketAddr::new(ip, 8080 + node));
    let others = (0..3u16)
        .filter(|n| *n != node)
        .map(|n| (n as NodeId, SocketAddr::new(ip, 8080 + n)));
    Configuration::new(current, others)
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let node = match args().nth(1).and_then(|arg| arg.parse::<u16>().ok()) {
        Some(node) if node < 3 => node,
        _ => {
            error!("must supply node id (0, 1, 2) as the first argument");
            exit(1);
        }
    };

    let config = local_config(node);
    let addr = *config.current_address();
    let agent = Arc::new(Agent::new(
        config.clone(),
        MemStore::new(),
        HttpCommunicator::new(config),
    ));

    let listener = tokio::spawn(serve(agent.clone(), addr));

    // reconcile with the rest of the cluster before taking traffic
    agent.recover_from_peers().await;
    info!("node {} recovered, serving on {}", node, addr);

    if let Err(e) = listener.await.expect("listener task failed") {
        eprintln!("server error: {}", e);
        exit(1);
    }
}
