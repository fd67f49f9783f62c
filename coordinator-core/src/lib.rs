//! Coordinator engine core: drives checkpointable, long-running computations
//! on top of a time-bounded FaaS substrate by repeatedly re-invoking each
//! process's handler from its last durable run-state.
//!
//! This crate owns the protocol (wire format, call dispatch, process/queue
//! tables, the per-process driver loop, and the workload controller that
//! ties them together) and depends only on an abstract [`substrate::Substrate`]
//! and [`object_store::ObjectStore`] — concrete bindings to a real subprocess
//! runner, cloud lambda, or checkpoint blob store are external collaborators.

pub mod dispatch;
pub mod driver;
pub mod error;
pub mod ids;
pub mod object_store;
pub mod substrate;
pub mod tables;
pub mod wire;
pub mod workload;

pub use error::CoordinatorError;
pub use ids::{Pid, Qid, MAIN_PID, MAIN_PROCESS_NAME};
pub use substrate::{Substrate, SubstrateError};
pub use workload::{FatalSink, Workload, WorkloadConfig, WorkloadOutcome};
