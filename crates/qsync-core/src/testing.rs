//! Scripted transport for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use crate::api::{ApiRequest, ApiResponse, Transport, TransportError};

/// Canned reply: a response or a transport failure, optionally delayed.
#[derive(Clone)]
pub(crate) struct Reply {
    result: Result<ApiResponse, TransportError>,
    delay: Duration,
}

impl Reply {
    pub(crate) fn json(status: u16, body: &str) -> Self {
        Self {
            result: Ok(ApiResponse {
                status,
                body: body.as_bytes().to_vec(),
            }),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn items(ids: &[u64]) -> Self {
        let data: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "name": format!("item-{id}")}))
            .collect();
        Self::json(
            200,
            &serde_json::json!({"success": true, "data": data}).to_string(),
        )
    }

    pub(crate) fn fail(err: TransportError) -> Self {
        Self {
            result: Err(err),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Handler = Box<dyn Fn(&ApiRequest) -> Reply + Send + Sync>;

/// Records every request and answers from a handler closure.
pub(crate) struct ScriptedTransport {
    handler: Handler,
    calls: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(handler: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Requests whose path ends with `suffix`.
    pub(crate) fn calls_to(&self, suffix: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.path().ends_with(suffix))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let reply = (self.handler)(&request);
        self.calls.lock().unwrap().push(request);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}
