//! A test-only substrate binding that replays a fixed script of invocation
//! outcomes per process name, so the `coordinator-core` end-to-end scenarios
//! (factorial recursion, crash/recovery, duplicate delivery, ...) can be
//! expressed as data rather than hand-rolled async closures.
//!
//! Kept in the library (not `#[cfg(test)]`) so `coordinator-server`'s demo
//! binary can also drive a scripted workload without a real lambda runtime.

use super::{Substrate, SubstrateError};
use crate::wire::{InvocationInput, Request};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What a single scripted invocation does.
#[derive(Clone)]
pub enum Step {
    /// Return this request as the handler's synchronous result.
    Return(Request),
    /// Fail as a crash (retried by the driver up to `crash_retries`).
    Crash(String),
    /// Fail as a timeout (retried unconditionally by the driver).
    Timeout,
}

/// One process's queue of steps, by name — not by pid, since scripted
/// scenarios are written before pids are known (spawn assigns them at
/// runtime).
pub struct ScriptedSubstrate {
    scripts: HashMap<String, Vec<Step>>,
    cursors: Mutex<HashMap<String, AtomicUsize>>,
    pid_names: Mutex<HashMap<crate::ids::Pid, String>>,
    default_script: Vec<Step>,
}

impl ScriptedSubstrate {
    pub fn new(scripts: HashMap<String, Vec<Step>>) -> Self {
        Self {
            scripts,
            cursors: Mutex::new(HashMap::new()),
            pid_names: Mutex::new(HashMap::new()),
            default_script: Vec::new(),
        }
    }

    /// Registers the display name a pid should resolve to for script lookup.
    /// Processes created by `spawn`/`map_spawn` get names like `worker-0`
    /// (`SpawnParams::name`-`index`); call this once per scripted child
    /// before its driver task starts its first invocation, or rely on
    /// [`ScriptedSubstrate::name_prefix_script`] instead.
    pub fn register_pid(&self, pid: crate::ids::Pid, name: impl Into<String>) {
        self.pid_names.lock().unwrap().insert(pid, name.into());
    }

    fn script_for<'a>(&'a self, name: &str) -> Option<&'a Vec<Step>> {
        if let Some(s) = self.scripts.get(name) {
            return Some(s);
        }
        // Fall back to a prefix match (e.g. scenario registers "worker",
        // actual spawned processes are named "worker-0", "worker-1", ...).
        self.scripts
            .iter()
            .find(|(k, _)| name.starts_with(k.as_str()))
            .map(|(_, v)| v)
    }
}

#[async_trait]
impl Substrate for ScriptedSubstrate {
    async fn invoke(&self, payload: Vec<u8>) -> Result<Vec<u8>, SubstrateError> {
        let input: InvocationInput =
            serde_json::from_slice(&payload).map_err(|e| SubstrateError::Other(e.into()))?;

        let name = self
            .pid_names
            .lock()
            .unwrap()
            .get(&input.pid)
            .cloned()
            .unwrap_or_else(|| input.pid.to_string());

        let script = self.script_for(&name).unwrap_or(&self.default_script);
        let cursor = {
            let mut cursors = self.cursors.lock().unwrap();
            let entry = cursors
                .entry(name.clone())
                .or_insert_with(|| AtomicUsize::new(0));
            entry.fetch_add(1, Ordering::SeqCst)
        };

        let step = script.get(cursor).cloned().unwrap_or_else(|| {
            // Script exhausted: repeat the last step, or idle-exit if there
            // never was one, rather than panicking the driver.
            script.last().cloned().unwrap_or(Step::Return(Request {
                pid: input.pid,
                seqno: input.seqno,
                chk_id: input.chk_id.clone(),
                calls: vec![],
                blocked: true,
                err: None,
            }))
        });

        match step {
            Step::Crash(msg) => Err(SubstrateError::Crashed(msg)),
            Step::Timeout => Err(SubstrateError::Timeout),
            Step::Return(request) => {
                let inner =
                    serde_json::to_string(&request).map_err(|e| SubstrateError::Other(e.into()))?;
                serde_json::to_vec(&inner).map_err(|e| SubstrateError::Other(e.into()))
            }
        }
    }

    async fn finalize(&self) {
        tracing::debug!("scripted substrate finalized");
    }
}
