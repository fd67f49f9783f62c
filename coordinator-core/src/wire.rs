//! JSON wire format exchanged with handler invocations (spec.md §6).
//!
//! `Request` is the shape both of a handler's synchronous return value (once
//! unwrapped from its double-JSON encoding, see [`Substrate`](crate::substrate::Substrate))
//! and of an asynchronous RPC body. `CallOp` is the closed, strictly-decoded
//! tagged union spec.md §9 calls for: one variant per recognized operation,
//! each with its own named fields, so a stale/absent field can never silently
//! inherit a value from a prior call the way a single generic struct would.

use crate::ids::{Pid, Qid};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-process target: where a process's invocations run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    OnCoordinator,
    OnLambda,
}

/// Coordinator → handler: the input to one invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvocationInput {
    pub pid: Pid,
    pub seqno: u64,
    pub chk_id: String,
    pub coord_call_result: Value,
    pub app_event: Value,
}

/// One coordinator call within a request's call list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Call {
    pub seqno: u64,
    #[serde(flatten)]
    pub op: CallOp,
}

/// The closed set of recognized coordinator-call operation tags (spec.md §4.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", content = "params", rename_all = "snake_case")]
pub enum CallOp {
    Exit {
        result: String,
    },
    Checkpoint,
    Spawn(SpawnParams),
    MapSpawn(MapSpawnParams),
    Wait {
        pid: Pid,
    },
    CreateQueue {
        max_size: usize,
        /// -1 for a single queue; otherwise the number of queues to create.
        copies: i64,
    },
    Enqueue {
        qid: Qid,
        objs: Vec<String>,
    },
    Dequeue {
        qid: Qid,
    },
    RemapStore(RemapStoreParams),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpawnParams {
    pub name: String,
    pub child_chk_id: String,
    #[serde(default)]
    pub future_pids: Vec<Pid>,
    #[serde(default)]
    pub await_pids: Vec<Pid>,
    #[serde(default)]
    pub blocking: bool,
    pub copies: u32,
    #[serde(default)]
    pub on_coordinator: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapSpawnParams {
    pub name: String,
    pub child_chk_id: String,
    #[serde(default)]
    pub future_pids: Vec<Pid>,
    pub elems: Vec<String>,
    #[serde(default)]
    pub await_pids: Vec<Pid>,
    #[serde(default)]
    pub on_coordinator: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemapStoreParams {
    pub tmp_bucket: String,
    pub tmp_key: String,
    pub bucket: String,
    pub key: String,
}

/// Handler → coordinator: a request, delivered either as the synchronous
/// return value of an invocation or as an asynchronous RPC body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    pub pid: Pid,
    pub seqno: u64,
    pub chk_id: String,
    #[serde(default)]
    pub calls: Vec<Call>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub err: Option<String>,
}

/// The outcome of an asynchronous RPC delivery (spec.md §4.4).
#[derive(Clone, Debug)]
pub enum RpcOutcome {
    /// 200, body is the JSON-encoded result of the last executed call.
    Ok(Value),
    /// 202, empty body — the dispatched call did not resolve within the
    /// workload's rpc timeout; the caller should checkpoint and release.
    WouldBlock,
    /// 400, plain-text body — a fatal protocol error.
    Error(String),
}

/// Unwraps the handler's synchronous return value: a JSON string whose
/// content is itself the JSON-encoded [`Request`] (spec.md §6 — "double
/// encoding; implementers must unwrap once").
pub fn decode_invocation_output(bytes: &[u8]) -> Result<Request, serde_json::Error> {
    let outer: String = serde_json::from_slice(bytes)?;
    serde_json::from_str(&outer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_op_tags_round_trip_through_the_closed_set() {
        let calls = vec![
            CallOp::Exit { result: "120".into() },
            CallOp::Checkpoint,
            CallOp::Wait { pid: Pid(3) },
            CallOp::CreateQueue { max_size: 16, copies: -1 },
            CallOp::Enqueue { qid: Qid(0), objs: vec!["x".into()] },
            CallOp::Dequeue { qid: Qid(0) },
        ];
        for call in calls {
            let encoded = serde_json::to_string(&call).unwrap();
            let decoded: CallOp = serde_json::from_str(&encoded).unwrap();
            assert_eq!(
                serde_json::to_value(&call).unwrap(),
                serde_json::to_value(&decoded).unwrap()
            );
        }
    }

    /// spec.md §9: an unrecognized operation tag must be fatal for the
    /// invocation, achieved by construction (serde rejects the unknown
    /// variant) rather than a lax decoder that falls back to defaults.
    #[test]
    fn unrecognized_operation_tag_fails_to_decode() {
        let raw = serde_json::json!({"seqno": 0, "op": "teleport", "params": {}});
        let result: Result<Call, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }

    /// A `spawn` call with its `blocking` field omitted must not silently
    /// inherit `true` from some prior call — it defaults to `false`, per
    /// field, never per prior-call state (spec.md §9's rejection of a
    /// generic decode-into-single-struct approach).
    #[test]
    fn spawn_params_defaults_never_inherit_from_other_calls() {
        let raw = serde_json::json!({
            "seqno": 0,
            "op": "spawn",
            "params": { "name": "worker", "child_chk_id": "", "copies": 2 }
        });
        let call: Call = serde_json::from_value(raw).unwrap();
        match call.op {
            CallOp::Spawn(params) => {
                assert!(!params.blocking);
                assert!(params.future_pids.is_empty());
                assert!(params.await_pids.is_empty());
                assert!(!params.on_coordinator);
            }
            other => panic!("expected Spawn, got {other:?}"),
        }
    }

    #[test]
    fn invocation_output_is_unwrapped_from_its_double_json_encoding() {
        let request = Request {
            pid: Pid(0),
            seqno: 1,
            chk_id: "chk-1".into(),
            calls: vec![Call { seqno: 0, op: CallOp::Checkpoint }],
            blocked: false,
            err: None,
        };
        let inner = serde_json::to_string(&request).unwrap();
        let outer = serde_json::to_vec(&inner).unwrap();

        let decoded = decode_invocation_output(&outer).unwrap();
        assert_eq!(decoded.pid, request.pid);
        assert_eq!(decoded.seqno, request.seqno);
        assert_eq!(decoded.chk_id, request.chk_id);
    }
}
