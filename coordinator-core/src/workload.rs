//! The workload controller (spec.md §4.5): owns the process/queue tables for
//! one workload, starts the main process, and runs until either the main
//! process completes or any process reports a fatal error.

use crate::driver;
use crate::ids::Pid;
use crate::object_store::{NullObjectStore, ObjectStore};
use crate::substrate::Substrate;
use crate::tables::{ProcessTable, QueueTable};
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Workload-wide tunables. Construction follows the `sem_os_server` idiom of
/// reading documented environment variables with sensible fallbacks rather
/// than a config-file loader.
#[derive(Clone, Debug)]
pub struct WorkloadConfig {
    /// How long the RPC endpoint waits for a dispatched call to resolve
    /// before replying would-block (spec.md §4.4).
    pub rpc_timeout: Duration,
    /// How long a single handler invocation may run before it is treated as
    /// timed out and restarted (spec.md §4.3). The reference substrate
    /// enforces this itself; real substrate bindings are expected to as well.
    pub invocation_timeout: Duration,
    /// Consecutive handler crashes tolerated before a process is declared
    /// fatally failed (spec.md §7).
    pub crash_retries: u32,
    /// Address the demo HTTP server binds to.
    pub rpc_bind_addr: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_millis(500),
            invocation_timeout: Duration::from_secs(15),
            crash_retries: 3,
            rpc_bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl WorkloadConfig {
    /// Reads `COORD_RPC_TIMEOUT_MS`, `COORD_INVOCATION_TIMEOUT_SECS`,
    /// `COORD_CRASH_RETRIES`, and `COORD_RPC_BIND_ADDR`, falling back to
    /// [`WorkloadConfig::default`] for any that are unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rpc_timeout: env_millis("COORD_RPC_TIMEOUT_MS", defaults.rpc_timeout),
            invocation_timeout: env_secs(
                "COORD_INVOCATION_TIMEOUT_SECS",
                defaults.invocation_timeout,
            ),
            crash_retries: env_u32("COORD_CRASH_RETRIES", defaults.crash_retries),
            rpc_bind_addr: env::var("COORD_RPC_BIND_ADDR").unwrap_or(defaults.rpc_bind_addr),
        }
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

/// A single-shot fatal-error sink shared by every process driver in a
/// workload. The first reported message wins; later ones are logged and
/// dropped. Built on a `watch` channel the same way [`Process`](crate::tables::Process)'s
/// completion signal is: `send_if_modified` gives the once-flag guard without
/// a separate `AtomicBool`.
#[derive(Clone)]
pub struct FatalSink {
    tx: watch::Sender<Option<String>>,
}

impl FatalSink {
    fn new() -> (Self, watch::Receiver<Option<String>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }

    /// Reports a fatal error. Only the first call has any effect; the
    /// workload run loop wakes on it and tears down.
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        let accepted = self.tx.send_if_modified(|v| {
            if v.is_none() {
                *v = Some(message.clone());
                true
            } else {
                false
            }
        });
        if !accepted {
            tracing::warn!("additional fatal error after one already reported: {message}");
        }
    }
}

/// Everything one running workload needs, shared by `Arc` across every
/// process driver task, the dispatch module, and (in `coordinator-server`)
/// the RPC endpoint.
pub struct Workload {
    pub processes: ProcessTable,
    pub queues: QueueTable,
    pub object_store: Arc<dyn ObjectStore>,
    pub substrate: Arc<dyn Substrate>,
    pub config: WorkloadConfig,
    pub fatal: FatalSink,
    fatal_rx: watch::Receiver<Option<String>>,
}

/// The outcome of running a workload to completion (spec.md §4.5).
#[derive(Debug)]
pub enum WorkloadOutcome {
    /// The main process exited; carries its return value.
    Completed(String),
    /// Some process reported a fatal error; the whole workload is torn down.
    Fatal(String),
}

impl Workload {
    pub fn new(substrate: Arc<dyn Substrate>, config: WorkloadConfig) -> Arc<Self> {
        Self::with_object_store(substrate, config, Arc::new(NullObjectStore))
    }

    pub fn with_object_store(
        substrate: Arc<dyn Substrate>,
        config: WorkloadConfig,
        object_store: Arc<dyn ObjectStore>,
    ) -> Arc<Self> {
        let (fatal, fatal_rx) = FatalSink::new();
        Arc::new(Self {
            processes: ProcessTable::new(),
            queues: QueueTable::new(),
            object_store,
            substrate,
            config,
            fatal,
            fatal_rx,
        })
    }

    /// Starts the main process (pid 0) with the given initial application
    /// event and drives the workload to completion. Returns once the main
    /// process exits or any process reports a fatal error; in the latter
    /// case other processes' driver tasks are left to be reaped by runtime
    /// shutdown (spec.md §4.5 does not mandate cooperative cancellation of
    /// siblings, only that the workload stops waiting).
    pub async fn run(self: &Arc<Self>, app_event: Value) -> WorkloadOutcome {
        let main = self.processes.create_main();
        driver::spawn_driver_task(
            self.clone(),
            main.clone(),
            String::new(),
            Value::Null,
            app_event,
        );

        let mut fatal_rx = self.fatal_rx.clone();
        tokio::select! {
            ret = main.wait_for_return() => WorkloadOutcome::Completed(ret),
            res = fatal_rx.changed() => {
                if res.is_err() {
                    // The sender side lives on `self.fatal` for as long as this
                    // Workload does, so this cannot fire in practice — but fall
                    // back to the main process's own outcome rather than hang.
                    return WorkloadOutcome::Completed(main.wait_for_return().await);
                }
                let message = fatal_rx.borrow().clone().unwrap_or_default();
                WorkloadOutcome::Fatal(message)
            }
        }
    }

    pub fn get_pid(&self, pid: Pid) -> Option<Arc<crate::tables::Process>> {
        self.processes.get(pid)
    }
}
