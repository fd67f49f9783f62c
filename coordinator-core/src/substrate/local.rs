//! A reference substrate binding that invokes a registered async closure
//! in-process rather than shelling out to a subprocess or a real FaaS
//! endpoint. Not one of the two concrete bindings spec.md §2 places out of
//! scope (those genuinely exec a subprocess or package a cloud lambda) —
//! this is a test/demo double that lets the engine be driven end to end.

use super::{Substrate, SubstrateError};
use crate::wire::{InvocationInput, Request};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Request, SubstrateError>> + Send>>;
pub type HandlerFn = Arc<dyn Fn(InvocationInput) -> HandlerFuture + Send + Sync>;

pub struct LocalSubstrate {
    handler: HandlerFn,
}

impl LocalSubstrate {
    pub fn new(handler: HandlerFn) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl Substrate for LocalSubstrate {
    async fn invoke(&self, payload: Vec<u8>) -> Result<Vec<u8>, SubstrateError> {
        let input: InvocationInput =
            serde_json::from_slice(&payload).map_err(|e| SubstrateError::Other(e.into()))?;
        let request = (self.handler)(input).await?;

        // Re-encode following the wire contract: the handler's synchronous
        // return is a JSON string containing the JSON-encoded Request.
        let inner = serde_json::to_string(&request).map_err(|e| SubstrateError::Other(e.into()))?;
        serde_json::to_vec(&inner).map_err(|e| SubstrateError::Other(e.into()))
    }

    async fn finalize(&self) {
        tracing::debug!("local substrate finalized");
    }
}
