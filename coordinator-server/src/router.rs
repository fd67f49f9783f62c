//! Router construction for the coordinator's HTTP surface (spec.md §6
//! "HTTP surface"): `POST /` for coordinator calls, `GET /ping` for
//! liveness. Mirrors `sem_os_server::router::build_router`'s shape — one
//! function that takes the shared state and returns a ready-to-serve
//! `Router` — minus the JWT layer, which spec.md's wire format has no
//! notion of.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use coordinator_core::Workload;
use tower_http::trace::TraceLayer;

use crate::rpc::{handle_rpc, ping, RpcState};

pub fn build_router(workload: Arc<Workload>) -> Router {
    Router::new()
        .route("/", post(handle_rpc))
        .route("/ping", get(ping))
        .with_state(RpcState { workload })
        .layer(TraceLayer::new_for_http())
}
