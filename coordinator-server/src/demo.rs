//! Reference handlers for the `coordinator-server` binary's demo mode.
//!
//! spec.md places the actual handler runtime and the compiler that produces
//! continuation-taking user code out of scope (§1). To exercise the engine
//! end to end without either, these closures play the handler's role
//! directly: each invocation decodes `chk_id` as its own small opaque state
//! blob, does one step of work, and returns the next coordinator call —
//! exactly the "sequence of ephemeral handler invocations bridged by
//! serialized checkpoints" spec.md §1 describes, just implemented in Rust
//! instead of compiled from user source.

use coordinator_core::substrate::local::{HandlerFn, HandlerFuture};
use coordinator_core::substrate::SubstrateError;
use coordinator_core::wire::{Call, CallOp, Request};
use std::sync::Arc;

/// Computes `n!` one multiplication per invocation, checkpointing the
/// running `(index, accumulator)` pair into `chk_id` between invocations —
/// spec.md §8 scenario 1 ("checkpoint, checkpoint, ..., exit(result=120)").
pub fn factorial_handler() -> HandlerFn {
    Arc::new(|input| -> HandlerFuture {
        Box::pin(async move {
            let n = input
                .app_event
                .get("n")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    SubstrateError::Other(anyhow::anyhow!("app_event missing integer field `n`"))
                })?;

            let (idx, acc) = decode_chk_id(&input.chk_id);

            let (op, chk_id) = if idx >= n {
                (CallOp::Exit { result: acc.to_string() }, input.chk_id.clone())
            } else {
                let next_idx = idx + 1;
                let next_acc = acc * next_idx;
                (CallOp::Checkpoint, format!("{next_idx}:{next_acc}"))
            };

            Ok(Request {
                pid: input.pid,
                seqno: input.seqno + 1,
                chk_id,
                calls: vec![Call {
                    seqno: input.seqno,
                    op,
                }],
                blocked: false,
                err: None,
            })
        })
    })
}

/// Decodes the `"{idx}:{acc}"` checkpoint id produced by `factorial_handler`,
/// defaulting to the start-of-computation state for the first invocation
/// (spec.md §3: the main process "starts from the sentinel checkpoint id,
/// the empty string").
fn decode_chk_id(chk_id: &str) -> (u64, u64) {
    if chk_id.is_empty() {
        return (0, 1);
    }
    match chk_id.split_once(':') {
        Some((idx, acc)) => (idx.parse().unwrap_or(0), acc.parse().unwrap_or(1)),
        None => (0, 1),
    }
}

/// Exits immediately with the application event echoed back as the return
/// value — the simplest possible process, used to smoke-test the RPC
/// surface and startup path without multi-invocation state.
pub fn echo_handler() -> HandlerFn {
    Arc::new(|input| -> HandlerFuture {
        Box::pin(async move {
            Ok(Request {
                pid: input.pid,
                seqno: input.seqno + 1,
                chk_id: input.chk_id.clone(),
                calls: vec![Call {
                    seqno: input.seqno,
                    op: CallOp::Exit {
                        result: input.app_event.to_string(),
                    },
                }],
                blocked: false,
                err: None,
            })
        })
    })
}
