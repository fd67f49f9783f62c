//! The per-process driver (spec.md §4.3): alternates between awaiting the
//! outstanding handler invocation and servicing asynchronous RPC requests,
//! restarting on timeout, retrying on crash up to a bound, and enforcing
//! the seqno-based at-most-once rule across both delivery paths.

use crate::dispatch::{self, CallOutcome};
use crate::error::CoordinatorError;
use crate::substrate::SubstrateError;
use crate::tables::{Process, RpcEnvelope};
use crate::wire::{decode_invocation_output, InvocationInput, Request, RpcOutcome};
use crate::workload::Workload;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::sleep;

/// Spawns a process's driver task. Returns immediately; the task runs for
/// the life of the process.
pub fn spawn_driver_task(
    workload: Arc<Workload>,
    process: Arc<Process>,
    chk_id: String,
    coord_call_result: Value,
    app_event: Value,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut driver = ProcessDriver::new(workload, process, chk_id, coord_call_result, app_event);
        driver.run().await;
    })
}

/// One pending asynchronous dispatch: its HTTP caller has already been told
/// would-block, and the driver just needs to apply its eventual result.
struct PendingResult {
    req_seqno: u64,
    req_chk_id: String,
    outcome: Result<CallOutcome, CoordinatorError>,
}

struct ProcessDriver {
    workload: Arc<Workload>,
    process: Arc<Process>,
    next_seqno: u64,
    last_result: Value,
    chk_id: String,
    app_event: Value,
    consecutive_crashes: u32,
}

impl ProcessDriver {
    fn new(
        workload: Arc<Workload>,
        process: Arc<Process>,
        chk_id: String,
        last_result: Value,
        app_event: Value,
    ) -> Self {
        Self {
            workload,
            process,
            next_seqno: 0,
            last_result,
            chk_id,
            app_event,
            consecutive_crashes: 0,
        }
    }

    async fn run(&mut self) {
        let mut rpc_rx = self.process.take_rpc_receiver().await;
        let mut pending: JoinSet<PendingResult> = JoinSet::new();

        'outer: loop {
            if self.process.is_complete() {
                return;
            }

            let input = InvocationInput {
                pid: self.process.pid,
                seqno: self.next_seqno,
                chk_id: self.chk_id.clone(),
                coord_call_result: self.last_result.clone(),
                app_event: self.app_event.clone(),
            };
            let payload = match serde_json::to_vec(&input) {
                Ok(p) => p,
                Err(e) => {
                    self.raise_fatal(format!("failed to encode invocation input: {e}"));
                    return;
                }
            };
            let substrate = self.workload.substrate.clone();
            let invocation = substrate.invoke(payload);
            tokio::pin!(invocation);

            loop {
                tokio::select! {
                    result = &mut invocation => {
                        match self.handle_invocation_result(result).await {
                            InvocationOutcome::Restart => continue 'outer,
                            InvocationOutcome::Terminate => return,
                        }
                    }
                    Some(envelope) = rpc_rx.recv() => {
                        if self.handle_rpc(envelope, &mut pending).await {
                            return;
                        }
                    }
                    Some(joined) = pending.join_next(), if !pending.is_empty() => {
                        match joined {
                            Ok(pending_result) => {
                                if self.apply_pending(pending_result) {
                                    return;
                                }
                            }
                            Err(join_err) => {
                                self.raise_fatal(format!("async dispatch task panicked: {join_err}"));
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn handle_invocation_result(
        &mut self,
        result: Result<Vec<u8>, SubstrateError>,
    ) -> InvocationOutcome {
        match result {
            Err(SubstrateError::Crashed(msg)) => {
                self.consecutive_crashes += 1;
                if self.consecutive_crashes > self.workload.config.crash_retries {
                    self.raise_fatal(format!(
                        "process crashed {} consecutive times: {msg}",
                        self.consecutive_crashes
                    ));
                    return InvocationOutcome::Terminate;
                }
                tracing::warn!(pid = %self.process.pid, crashes = self.consecutive_crashes, "handler crashed: {msg}, restarting from current run-state");
                InvocationOutcome::Restart
            }
            Err(SubstrateError::Timeout) => {
                self.consecutive_crashes = 0;
                tracing::info!(pid = %self.process.pid, "invocation timed out, restarting from current run-state");
                InvocationOutcome::Restart
            }
            Err(SubstrateError::Other(e)) => {
                self.raise_fatal(format!("substrate error: {e}"));
                InvocationOutcome::Terminate
            }
            Ok(bytes) => {
                self.consecutive_crashes = 0;
                match decode_invocation_output(&bytes) {
                    Ok(request) => self.handle_success(request).await,
                    Err(e) => {
                        self.raise_fatal(format!("malformed invocation output: {e}"));
                        InvocationOutcome::Terminate
                    }
                }
            }
        }
    }

    async fn handle_success(&mut self, request: Request) -> InvocationOutcome {
        if let Some(err) = &request.err {
            tracing::warn!(pid = %self.process.pid, seqno = request.seqno, "handler reported a non-fatal error: {err}");
        }

        if request.blocked {
            tracing::debug!(pid = %self.process.pid, "invocation voluntarily suspended; re-invoking from unchanged run-state");
            return InvocationOutcome::Restart;
        }

        if request.seqno < self.next_seqno {
            tracing::debug!(pid = %self.process.pid, req_seqno = request.seqno, next_seqno = self.next_seqno, "discarding outdated synchronous request");
            return InvocationOutcome::Restart;
        }

        let floor = self.next_seqno;
        match dispatch::dispatch_calls(&self.workload, &self.process, &request.calls, floor).await {
            Ok(outcome) => {
                self.apply_accepted(request.seqno, request.chk_id, outcome.result);
                if outcome.done {
                    InvocationOutcome::Terminate
                } else {
                    InvocationOutcome::Restart
                }
            }
            Err(e) => {
                self.raise_fatal(format!("call dispatch failed: {e}"));
                InvocationOutcome::Terminate
            }
        }
    }

    /// Handles an asynchronously-delivered request (spec.md §4.3): always
    /// replies so the RPC task never hangs, racing the dispatch against the
    /// workload's rpc timeout. Returns true if the driver should terminate
    /// (the accepted call resolved to `exit` within the rpc timeout).
    async fn handle_rpc(&mut self, envelope: RpcEnvelope, pending: &mut JoinSet<PendingResult>) -> bool {
        let RpcEnvelope { request, reply } = envelope;

        if request.seqno < self.next_seqno {
            tracing::debug!(pid = %self.process.pid, req_seqno = request.seqno, next_seqno = self.next_seqno, "discarding outdated RPC request");
            let _ = reply.send(RpcOutcome::Ok(Value::Null));
            return false;
        }

        let workload = self.workload.clone();
        let process = self.process.clone();
        let calls = request.calls.clone();
        let floor = self.next_seqno;
        let req_seqno = request.seqno;
        let req_chk_id = request.chk_id.clone();

        let mut handle = tokio::spawn(async move {
            dispatch::dispatch_calls(&workload, &process, &calls, floor).await
        });

        tokio::select! {
            joined = &mut handle => {
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(join_err) => {
                        let _ = reply.send(RpcOutcome::Error(join_err.to_string()));
                        self.raise_fatal(format!("rpc dispatch task panicked: {join_err}"));
                        return true;
                    }
                };
                match &outcome {
                    Ok(o) => { let _ = reply.send(RpcOutcome::Ok(o.result.clone())); }
                    Err(e) => { let _ = reply.send(RpcOutcome::Error(e.to_string())); }
                }
                self.apply_pending(PendingResult { req_seqno, req_chk_id, outcome })
            }
            _ = sleep(self.workload.config.rpc_timeout) => {
                let _ = reply.send(RpcOutcome::WouldBlock);
                pending.spawn(async move {
                    match handle.await {
                        Ok(outcome) => PendingResult { req_seqno, req_chk_id, outcome },
                        Err(join_err) => PendingResult {
                            req_seqno,
                            req_chk_id,
                            outcome: Err(CoordinatorError::Fatal(format!(
                                "rpc dispatch task panicked: {join_err}"
                            ))),
                        },
                    }
                });
                false
            }
        }
    }

    /// Applies a pending async dispatch's eventual result. Returns true if
    /// the driver should terminate (the accepted call was `exit`).
    fn apply_pending(&mut self, pending: PendingResult) -> bool {
        match pending.outcome {
            Ok(outcome) => {
                let done = outcome.done;
                self.apply_accepted(pending.req_seqno, pending.req_chk_id, outcome.result);
                done
            }
            Err(e) => {
                self.raise_fatal(format!("async call dispatch failed: {e}"));
                true
            }
        }
    }

    /// Run-state update rule (spec.md §4.3): only applied if the request's
    /// seqno is still at or above nextSeqno at the moment of application —
    /// a lower seqno here means a duplicate via the other delivery path
    /// already won the race.
    fn apply_accepted(&mut self, req_seqno: u64, req_chk_id: String, result: Value) {
        if req_seqno < self.next_seqno {
            tracing::debug!(pid = %self.process.pid, req_seqno, next_seqno = self.next_seqno, "accepted result arrived after a duplicate already advanced state; discarding");
            return;
        }
        self.last_result = result;
        self.next_seqno = req_seqno + 1;
        self.chk_id = req_chk_id;
    }

    fn raise_fatal(&self, message: String) {
        tracing::error!(pid = %self.process.pid, seqno = self.next_seqno, "{message}");
        self.workload.fatal.report(format!(
            "process {} (pid {}) at seqno {}: {message}",
            self.process.name, self.process.pid, self.next_seqno
        ));
    }
}

enum InvocationOutcome {
    /// Go back to the top of the outer loop and start a fresh invocation.
    Restart,
    /// The driver has terminated (exit or fatal).
    Terminate,
}
