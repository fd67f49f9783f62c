//! coordinator-server — HTTP surface for one running workload (spec.md §4.4,
//! §6). Wraps `coordinator-core`'s workload/dispatch/driver machinery with
//! the axum routes a handler invocation's RPC calls actually hit over the
//! wire, plus a couple of reference substrate-backed demo handlers used by
//! the `coordinator-server` binary and its integration tests.

pub mod demo;
pub mod error;
pub mod rpc;
pub mod router;
