use crate::agent::Agent;
use crate::communicator::Communicator;
use crate::messages::{Reply, Request};
use crate::storage::Storage;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;

/// Runs the RPC listener, dispatching each inbound call to the matching
/// agent handler on its own task.
pub async fn serve<S, C>(agent: Arc<Agent<S, C>>, addr: SocketAddr) -> hyper::Result<()>
where
    S: Storage,
    C: Communicator,
{
    let service = make_service_fn(move |_| {
        let agent = agent.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let agent = agent.clone();
                async move { dispatch(agent, req).await }
            }))
        }
    });

    Server::bind(&addr).serve(service).await
}

async fn dispatch<S, C>(
    agent: Arc<Agent<S, C>>,
    req: hyper::Request<Body>,
) -> Result<Response<Body>, hyper::Error>
where
    S: Storage,
    C: Communicator,
{
    let body = hyper::body::to_bytes(req.into_body()).await?;
    let request = match bincode::deserialize::<Request>(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("dropping undecodable request: {:?}", e);
            return respond(StatusCode::BAD_REQUEST);
        }
    };

    let reply = match request {
        Request::Ping => Reply::Flag(agent.ping()),
        Request::Prepare(prepare) => Reply::Flag(agent.on_prepare(prepare).await),
        Request::Accept(accept) => Reply::Flag(agent.on_accept(accept).await),
        Request::Decide { txn_id, commit } => {
            agent.on_decide(&txn_id, commit).await;
            Reply::Empty
        }
        Request::Read { key } => Reply::Value(agent.on_read(&key)),
        Request::Recover { versions } => Reply::Recovery(agent.on_recover(&versions)),
        Request::Classic { txn_id, option } => Reply::Flag(
            agent.run_classic(&txn_id, &option.key, option.old_version, option.value).await,
        ),
    };

    match bincode::serialize(&reply) {
        Ok(body) => Ok(Response::new(Body::from(body))),
        Err(e) => {
            error!("error serializing reply: {:?}", e);
            respond(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn respond(code: StatusCode) -> Result<Response<Body>, hyper::Error> {
    let mut resp = Response::default();
    *resp.status_mut() = code;
    Ok(resp)
}
