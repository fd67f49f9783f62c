//! Coordinator-call dispatch (spec.md §4.2): resolves each call's operation
//! tag against the closed set in [`CallOp`](crate::wire::CallOp) and runs it
//! against the workload's process/queue tables.

use crate::driver;
use crate::error::CoordinatorError;
use crate::ids::{Pid, Qid};
use crate::wire::{Call, CallOp, MapSpawnParams, RemapStoreParams, SpawnParams};
use crate::workload::Workload;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The result of executing one call: `done = true` only for `exit`, matching
/// the wire result message `(result, done, err)` with `err` folded into
/// `Result::Err` — idiomatic Rust for the same contract.
#[derive(Clone, Debug)]
pub struct CallOutcome {
    pub result: Value,
    pub done: bool,
}

impl CallOutcome {
    fn checkpoint_like(result: Value) -> Self {
        Self {
            result,
            done: false,
        }
    }
}

/// Executes a request's call list in order, stopping at the first call that
/// reports `done` or errors (spec.md §4.3). Calls whose own seqno is below
/// `floor_seqno` are skipped as stale. Returns the outcome of the last
/// executed call; if every call was stale, returns a null checkpoint-like
/// outcome.
pub async fn dispatch_calls(
    workload: &Arc<Workload>,
    process: &Arc<crate::tables::Process>,
    calls: &[Call],
    floor_seqno: u64,
) -> Result<CallOutcome, CoordinatorError> {
    let mut last = CallOutcome::checkpoint_like(Value::Null);
    for call in calls {
        if call.seqno < floor_seqno {
            tracing::debug!(pid = %process.pid, call_seqno = call.seqno, floor_seqno, "skipping stale call");
            continue;
        }
        let outcome = dispatch_one(workload, process, &call.op).await?;
        let done = outcome.done;
        last = outcome;
        if done {
            break;
        }
    }
    Ok(last)
}

async fn dispatch_one(
    workload: &Arc<Workload>,
    process: &Arc<crate::tables::Process>,
    op: &CallOp,
) -> Result<CallOutcome, CoordinatorError> {
    match op {
        CallOp::Exit { result } => {
            process.complete(result.clone());
            Ok(CallOutcome {
                result: Value::Null,
                done: true,
            })
        }
        CallOp::Checkpoint => Ok(CallOutcome::checkpoint_like(Value::Null)),
        CallOp::Spawn(params) => handle_spawn(workload, params).await,
        CallOp::MapSpawn(params) => handle_map_spawn(workload, params).await,
        CallOp::Wait { pid } => handle_wait(workload, *pid).await,
        CallOp::CreateQueue { max_size, copies } => handle_create_queue(workload, *max_size, *copies),
        CallOp::Enqueue { qid, objs } => handle_enqueue(workload, *qid, objs).await,
        CallOp::Dequeue { qid } => handle_dequeue(workload, *qid).await,
        CallOp::RemapStore(params) => handle_remap_store(workload, params).await,
    }
}

/// Waits for every pid in `await_pids ∪ future_pids` to complete, then
/// returns the return values of `future_pids` as a pid → return map. Used by
/// both `spawn` and `map_spawn` waiters (spec.md §4.2 table, §8 "Spawn
/// dependency").
async fn await_dependencies(
    workload: &Arc<Workload>,
    await_pids: &[Pid],
    future_pids: &[Pid],
) -> Result<BTreeMap<Pid, String>, CoordinatorError> {
    let mut all: Vec<Pid> = await_pids.to_vec();
    for pid in future_pids {
        if !all.contains(pid) {
            all.push(*pid);
        }
    }
    let mut handles = Vec::with_capacity(all.len());
    for pid in &all {
        let proc = workload
            .processes
            .get(*pid)
            .ok_or(CoordinatorError::UnknownPid(*pid))?;
        handles.push(proc);
    }
    for proc in &handles {
        proc.wait_for_return().await;
    }

    let mut rets = BTreeMap::new();
    for pid in future_pids {
        let proc = workload
            .processes
            .get(*pid)
            .ok_or(CoordinatorError::UnknownPid(*pid))?;
        rets.insert(*pid, proc.wait_for_return().await);
    }
    Ok(rets)
}

/// JSON object with string pid keys — the concrete shape chosen for `predRes`,
/// which spec.md leaves as "the map of future_pids → return" without
/// specifying its wire representation (an Open Question resolved in DESIGN.md).
fn pred_res_to_value(pred: &BTreeMap<Pid, String>) -> Value {
    let map: serde_json::Map<String, Value> = pred
        .iter()
        .map(|(pid, ret)| (pid.to_string(), Value::String(ret.clone())))
        .collect();
    Value::Object(map)
}

async fn handle_spawn(
    workload: &Arc<Workload>,
    params: &SpawnParams,
) -> Result<CallOutcome, CoordinatorError> {
    let target = if params.on_coordinator {
        crate::wire::Target::OnCoordinator
    } else {
        crate::wire::Target::OnLambda
    };

    let mut child_pids = Vec::with_capacity(params.copies as usize);
    for i in 0..params.copies {
        let child = workload
            .processes
            .create(format!("{}-{i}", params.name), target);
        child_pids.push(child.pid);

        let workload = workload.clone();
        let child = child.clone();
        let await_pids = params.await_pids.clone();
        let future_pids = params.future_pids.clone();
        let child_chk_id = params.child_chk_id.clone();
        tokio::spawn(async move {
            match await_dependencies(&workload, &await_pids, &future_pids).await {
                Ok(pred) => {
                    driver::spawn_driver_task(
                        workload,
                        child,
                        child_chk_id,
                        pred_res_to_value(&pred),
                        Value::Null,
                    );
                }
                Err(e) => {
                    workload
                        .fatal
                        .report(format!("spawn dependency wait failed: {e}"));
                }
            }
        });
    }

    if params.blocking {
        let mut rets = Vec::with_capacity(child_pids.len());
        for pid in &child_pids {
            let child = workload.processes.get(*pid).expect("just created");
            rets.push(child.wait_for_return().await);
        }
        Ok(CallOutcome::checkpoint_like(json!({ "rets": rets })))
    } else {
        Ok(CallOutcome::checkpoint_like(
            json!({ "child_pids": child_pids }),
        ))
    }
}

async fn handle_map_spawn(
    workload: &Arc<Workload>,
    params: &MapSpawnParams,
) -> Result<CallOutcome, CoordinatorError> {
    let target = if params.on_coordinator {
        crate::wire::Target::OnCoordinator
    } else {
        crate::wire::Target::OnLambda
    };

    let mut child_pids = Vec::with_capacity(params.elems.len());
    let mut children = Vec::with_capacity(params.elems.len());
    for (i, elem) in params.elems.iter().enumerate() {
        let child = workload
            .processes
            .create(format!("{}-{i}", params.name), target);
        child_pids.push(child.pid);
        children.push((child, elem.clone()));
    }

    let workload_bg = workload.clone();
    let await_pids = params.await_pids.clone();
    let future_pids = params.future_pids.clone();
    let child_chk_id = params.child_chk_id.clone();
    tokio::spawn(async move {
        match await_dependencies(&workload_bg, &await_pids, &future_pids).await {
            Ok(pred) => {
                let pred_value = pred_res_to_value(&pred);
                for (child, elem) in children {
                    let app_input = json!([pred_value, elem]);
                    driver::spawn_driver_task(
                        workload_bg.clone(),
                        child,
                        child_chk_id.clone(),
                        Value::Null,
                        app_input,
                    );
                }
            }
            Err(e) => {
                workload_bg
                    .fatal
                    .report(format!("map_spawn dependency wait failed: {e}"));
            }
        }
    });

    // Unlike non-blocking `spawn`, the §4.2 table gives `map_spawn` a bare
    // array result (one pid per element), not a `{child_pids: [...]}` object.
    Ok(CallOutcome::checkpoint_like(json!(child_pids)))
}

async fn handle_wait(workload: &Arc<Workload>, pid: Pid) -> Result<CallOutcome, CoordinatorError> {
    let proc = workload
        .processes
        .get(pid)
        .ok_or(CoordinatorError::UnknownPid(pid))?;
    let ret = proc.wait_for_return().await;
    Ok(CallOutcome::checkpoint_like(Value::String(ret)))
}

fn handle_create_queue(
    workload: &Arc<Workload>,
    max_size: usize,
    copies: i64,
) -> Result<CallOutcome, CoordinatorError> {
    if copies == -1 {
        let queue = workload.queues.create(max_size);
        Ok(CallOutcome::checkpoint_like(json!(queue.qid.0)))
    } else {
        let ids: Vec<u64> = (0..copies)
            .map(|_| workload.queues.create(max_size).qid.0)
            .collect();
        Ok(CallOutcome::checkpoint_like(json!(ids)))
    }
}

async fn handle_enqueue(
    workload: &Arc<Workload>,
    qid: Qid,
    objs: &[String],
) -> Result<CallOutcome, CoordinatorError> {
    let queue = workload
        .queues
        .get(qid)
        .ok_or(CoordinatorError::UnknownQid(qid))?;
    for obj in objs {
        queue.enqueue(obj.clone()).await;
    }
    Ok(CallOutcome::checkpoint_like(Value::Null))
}

async fn handle_dequeue(workload: &Arc<Workload>, qid: Qid) -> Result<CallOutcome, CoordinatorError> {
    let queue = workload
        .queues
        .get(qid)
        .ok_or(CoordinatorError::UnknownQid(qid))?;
    let obj = queue.dequeue().await;
    Ok(CallOutcome::checkpoint_like(Value::String(obj)))
}

async fn handle_remap_store(
    workload: &Arc<Workload>,
    params: &RemapStoreParams,
) -> Result<CallOutcome, CoordinatorError> {
    workload
        .object_store
        .copy_then_delete(&params.tmp_bucket, &params.tmp_key, &params.bucket, &params.key)
        .await
        .map_err(CoordinatorError::ObjectStore)?;
    Ok(CallOutcome::checkpoint_like(Value::Null))
}
