//! The RPC endpoint (spec.md §4.4): `POST /` accepts an asynchronous
//! coordinator-call request, routes it to the addressed process's RPC
//! channel, and waits for the driver's reply — would-block becomes 202,
//! a dispatch error becomes 400, success becomes 200 with the JSON result.
//! `GET /ping` is the liveness check the workload controller polls during
//! startup (spec.md §4.5 "inject... where to reach the coordinator").

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use coordinator_core::wire::{Request, RpcOutcome};
use coordinator_core::Workload;
use uuid::Uuid;

use crate::error::RequestError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared axum state: just the workload, wrapped the same way
/// `sem_os_server`'s handlers extract `Arc<dyn CoreService>` from an
/// `Extension` — here a plain `State` since there is exactly one workload
/// per server process (spec.md §4.5: "hosts a single workload").
#[derive(Clone)]
pub struct RpcState {
    pub workload: Arc<Workload>,
}

pub async fn ping() -> &'static str {
    "pong"
}

/// `POST /` — spec.md §4.4 steps 1-4.
///
/// Every delivery gets a correlation id, logged alongside the pid it targets
/// and echoed back as a response header — carried over from the teacher's
/// gRPC layer, which stamps every call with a UUID for the same reason: an
/// access log line is useless for tracing a specific duplicate delivery
/// without something to grep for.
pub async fn handle_rpc(
    State(state): State<RpcState>,
    body: Bytes,
) -> Result<impl IntoResponse, RequestError> {
    let request_id = Uuid::now_v7();

    let request: Request = serde_json::from_slice(&body)
        .map_err(|e| RequestError(format!("malformed request body: {e}")))?;

    tracing::info!(%request_id, pid = %request.pid, seqno = request.seqno, "rpc delivery received");

    let process = state
        .workload
        .get_pid(request.pid)
        .ok_or_else(|| RequestError(format!("unknown pid {}", request.pid)))?;

    let outcome = process.call_rpc(request).await;

    let mut response = match outcome {
        RpcOutcome::Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        RpcOutcome::WouldBlock => (StatusCode::ACCEPTED, ()).into_response(),
        RpcOutcome::Error(message) => (StatusCode::BAD_REQUEST, message).into_response(),
    };
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    Ok(response)
}
