//! Error taxonomy (spec.md §7).
//!
//! Everything here other than `WouldBlock`/outdated-discard is fatal for the
//! workload: an unknown pid/qid, an unrecognized operation tag, or a
//! malformed parameter payload indicates a protocol violation by the
//! handler runtime, not a recoverable condition.

use crate::ids::{Pid, Qid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("unknown pid {0}")]
    UnknownPid(Pid),

    #[error("unknown qid {0}")]
    UnknownQid(Qid),

    #[error("unrecognized coordinator call: {0}")]
    UnknownOperation(String),

    #[error("malformed params for op {op}: {source}")]
    MalformedParams {
        op: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed request body: {0}")]
    MalformedRequest(#[source] serde_json::Error),

    #[error("object store operation failed: {0}")]
    ObjectStore(#[source] anyhow::Error),

    #[error("{0}")]
    Fatal(String),
}

impl From<CoordinatorError> for String {
    fn from(e: CoordinatorError) -> Self {
        e.to_string()
    }
}
