use bytes::Bytes;
use hyper::{Body, Client, Method};
use mdcc::{Accept, Ballot, Reply, Request, WriteOption};
use std::env::args;
use std::process::exit;
use std::time::{SystemTime, UNIX_EPOCH};

const NODES: u16 = 3;

fn usage() -> ! {
    eprintln!("usage: client <node> get <key>");
    eprintln!("       client <node> put <key> <value>");
    eprintln!("       client <node> classic <key> <value>");
    exit(1);
}

fn txn_id() -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!("txn-{}", nanos)
}

async fn call(node: u16, request: &Request) -> Option<Reply> {
    let client = Client::new();
    let body = bincode::serialize(request).ok()?;
    let http_request = hyper::Request::builder()
        .method(Method::POST)
        .uri(format!("http://127.0.0.1:{}/", 8080 + node))
        .body(Body::from(body))
        .ok()?;
    let response = client.request(http_request).await.ok()?;
    let body = hyper::body::to_bytes(response.into_body()).await.ok()?;
    bincode::deserialize(&body).ok()
}

async fn current_version(node: u16, key: &str) -> u64 {
    match call(node, &Request::Read { key: key.to_string() }).await {
        Some(Reply::Value(read)) => read.version,
        _ => {
            eprintln!("ERR: node {} unreachable", node);
            exit(1);
        }
    }
}

async fn decide_all(txn_id: &str, commit: bool) {
    for node in 0..NODES {
        let _ = call(node, &Request::Decide { txn_id: txn_id.to_string(), commit }).await;
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let argv: Vec<String> = args().skip(1).collect();
    let node = match argv.get(0).and_then(|arg| arg.parse::<u16>().ok()) {
        Some(node) if node < NODES => node,
        _ => usage(),
    };

    match &argv[1..] {
        [cmd, key] if cmd == "get" => {
            match call(node, &Request::Read { key: key.clone() }).await {
                Some(Reply::Value(read)) => {
                    match std::str::from_utf8(&read.value) {
                        Ok(text) => println!("{} (version {})", text, read.version),
                        Err(_) => println!("{:?} (version {})", read.value, read.version),
                    }
                }
                _ => {
                    eprintln!("ERR: node {} unreachable", node);
                    exit(1);
                }
            }
        }
        [cmd, key, value] if cmd == "put" => {
            let version = current_version(node, key).await;
            let txn = txn_id();

            let mut accepts = 0;
            for member in 0..NODES {
                let accept = Accept {
                    txn_id: txn.clone(),
                    key: key.clone(),
                    old_version: version,
                    ballot: Ballot::Fast,
                    value: Bytes::from(value.clone()),
                };
                if let Some(Reply::Flag(true)) = call(member, &Request::Accept(accept)).await {
                    accepts += 1;
                }
            }

            let commit = accepts > NODES / 2;
            decide_all(&txn, commit).await;
            println!("{}", if commit { "OK" } else { "CONFLICT" });
        }
        [cmd, key, value] if cmd == "classic" => {
            let version = current_version(node, key).await;
            let txn = txn_id();
            let option = WriteOption {
                key: key.clone(),
                value: Bytes::from(value.clone()),
                old_version: version,
                classic: true,
            };

            let commit = match call(node, &Request::Classic { txn_id: txn.clone(), option }).await
            {
                Some(Reply::Flag(result)) => result,
                _ => false,
            };
            decide_all(&txn, commit).await;
            println!("{}", if commit { "OK" } else { "CONFLICT" });
        }
        _ => usage(),
    }
}
