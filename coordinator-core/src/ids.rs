//! Workload-local identifiers. Never reused; assigned in creation order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process identifier. Unique within a workload, assigned starting at 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u64);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue identifier. Unique within a workload, assigned in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qid(pub u64);

impl fmt::Display for Qid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// pid 0 is reserved for the workload's main process, per the data model.
pub const MAIN_PID: Pid = Pid(0);
pub const MAIN_PROCESS_NAME: &str = "main-0";
