//! Maps the handful of errors the HTTP surface itself can raise (body
//! parsing, unknown pid) to the plain-text 400s spec.md §4.4 calls for. The
//! richer `CoordinatorError` taxonomy surfaces through the RPC endpoint as
//! an `RpcOutcome::Error`, not through this wrapper — dispatch failures are
//! fatal for the workload, not per-request HTTP errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// A request-level error: malformed body or an unrecognized pid. Rendered
/// as a plain-text 400, matching spec.md §4.4 step 1/2.
pub struct RequestError(pub String);

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.0).into_response()
    }
}
