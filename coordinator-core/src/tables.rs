//! Workload-scoped process and queue tables (spec.md §4.6).
//!
//! Both tables are guarded by a single mutex each; entries are never
//! removed and id generation is a counter under the same mutex, mirroring
//! the `RwLock<Inner>`-over-a-plain-map idiom the teacher store used for its
//! in-memory backend.

use crate::ids::{Pid, Qid, MAIN_PID, MAIN_PROCESS_NAME};
use crate::wire::{Request, RpcOutcome, Target};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};

/// A single in-flight RPC delivery: the request plus where to send the reply.
pub struct RpcEnvelope {
    pub request: Request,
    pub reply: oneshot::Sender<RpcOutcome>,
}

/// A workload process: identity is constant after creation; run-state lives
/// only in the owning driver task; the RPC channel and completion signal are
/// the two fields shared with the rest of the workload.
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub target: Target,
    rpc_tx: mpsc::Sender<RpcEnvelope>,
    rpc_rx: AsyncMutex<Option<mpsc::Receiver<RpcEnvelope>>>,
    completion: watch::Sender<Option<String>>,
}

impl Process {
    fn new(pid: Pid, name: String, target: Target) -> Self {
        let (rpc_tx, rpc_rx) = mpsc::channel(1);
        let (completion, _) = watch::channel(None);
        Self {
            pid,
            name,
            target,
            rpc_tx,
            rpc_rx: AsyncMutex::new(Some(rpc_rx)),
            completion,
        }
    }

    /// Taken exactly once by the process's driver task at startup.
    pub(crate) async fn take_rpc_receiver(&self) -> mpsc::Receiver<RpcEnvelope> {
        self.rpc_rx
            .lock()
            .await
            .take()
            .expect("rpc receiver already taken")
    }

    /// Sets the process's return value and closes its completion signal.
    /// A no-op if already completed — the completion signal closes exactly once.
    pub(crate) fn complete(&self, value: String) {
        self.completion.send_if_modified(|v| {
            if v.is_none() {
                *v = Some(value);
                true
            } else {
                false
            }
        });
    }

    pub fn is_complete(&self) -> bool {
        self.completion.borrow().is_some()
    }

    /// Awaits completion and returns the process's return value. Never reads
    /// the value before completion is observed.
    pub async fn wait_for_return(&self) -> String {
        let mut rx = self.completion.subscribe();
        loop {
            if let Some(v) = rx.borrow().clone() {
                return v;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without ever completing — cannot happen while
                // the workload holds the Process in its table, but guard anyway.
                return rx.borrow().clone().unwrap_or_default();
            }
        }
    }

    /// Submits a request to this process's RPC intake channel and waits for
    /// the driver's reply. Used by the RPC endpoint (spec.md §4.4); never
    /// blocks beyond channel capacity — the bounded rpc timeout is enforced
    /// by the driver, not here.
    pub async fn call_rpc(&self, request: Request) -> RpcOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .rpc_tx
            .send(RpcEnvelope {
                request,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return RpcOutcome::Error("process driver has terminated".to_string());
        }
        reply_rx
            .await
            .unwrap_or_else(|_| RpcOutcome::Error("process driver dropped the reply".to_string()))
    }
}

struct ProcessTableInner {
    next_pid: u64,
    processes: HashMap<Pid, std::sync::Arc<Process>>,
}

/// Workload-scoped map from Pid to process record. Pids are never reused.
pub struct ProcessTable {
    inner: StdMutex<ProcessTableInner>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            inner: StdMutex::new(ProcessTableInner {
                next_pid: 0,
                processes: HashMap::new(),
            }),
        }
    }

    /// Creates a process record and assigns it the next pid. The caller is
    /// responsible for actually starting its driver task.
    pub fn create(&self, name: String, target: Target) -> std::sync::Arc<Process> {
        let mut inner = self.inner.lock().unwrap();
        let pid = Pid(inner.next_pid);
        inner.next_pid += 1;
        let process = std::sync::Arc::new(Process::new(pid, name, target));
        inner.processes.insert(pid, process.clone());
        process
    }

    /// Creates the main process at the reserved pid 0. Must be called exactly
    /// once per workload, before any other `create` call.
    pub fn create_main(&self) -> std::sync::Arc<Process> {
        let mut inner = self.inner.lock().unwrap();
        debug_assert_eq!(inner.next_pid, 0, "main process must be created first");
        let pid = MAIN_PID;
        inner.next_pid = 1;
        let process = std::sync::Arc::new(Process::new(
            pid,
            MAIN_PROCESS_NAME.to_string(),
            Target::OnCoordinator,
        ));
        inner.processes.insert(pid, process.clone());
        process
    }

    pub fn get(&self, pid: Pid) -> Option<std::sync::Arc<Process>> {
        self.inner.lock().unwrap().processes.get(&pid).cloned()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A bounded FIFO of opaque byte-strings. Built directly on a bounded tokio
/// mpsc channel: the channel's own backpressure gives enqueue-blocks-when-full
/// and dequeue-blocks-when-empty for free, and since the queue itself holds
/// the sender for its own lifetime the channel never closes.
pub struct Queue {
    pub qid: Qid,
    pub max_size: usize,
    tx: mpsc::Sender<String>,
    rx: AsyncMutex<mpsc::Receiver<String>>,
}

impl Queue {
    fn new(qid: Qid, max_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(max_size.max(1));
        Self {
            qid,
            max_size,
            tx,
            rx: AsyncMutex::new(rx),
        }
    }

    /// Blocks while the queue holds `max_size` elements.
    pub async fn enqueue(&self, obj: String) {
        // The queue owns `tx` for its entire lifetime, so the channel can
        // never be closed out from under this send.
        let _ = self.tx.send(obj).await;
    }

    /// Blocks while the queue is empty. Multiple concurrent consumers are
    /// serialized through the receiver lock; per-consumer order is preserved
    /// but cross-consumer interleaving is unspecified, per spec.md §5.
    pub async fn dequeue(&self) -> String {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .expect("queue sender lives as long as the queue")
    }
}

struct QueueTableInner {
    next_qid: u64,
    queues: HashMap<Qid, std::sync::Arc<Queue>>,
}

/// Workload-scoped map from Qid to queue. Qids are never reused.
pub struct QueueTable {
    inner: StdMutex<QueueTableInner>,
}

impl QueueTable {
    pub fn new() -> Self {
        Self {
            inner: StdMutex::new(QueueTableInner {
                next_qid: 0,
                queues: HashMap::new(),
            }),
        }
    }

    pub fn create(&self, max_size: usize) -> std::sync::Arc<Queue> {
        let mut inner = self.inner.lock().unwrap();
        let qid = Qid(inner.next_qid);
        inner.next_qid += 1;
        let queue = std::sync::Arc::new(Queue::new(qid, max_size));
        inner.queues.insert(qid, queue.clone());
        queue
    }

    pub fn get(&self, qid: Qid) -> Option<std::sync::Arc<Queue>> {
        self.inner.lock().unwrap().queues.get(&qid).cloned()
    }
}

impl Default for QueueTable {
    fn default() -> Self {
        Self::new()
    }
}
