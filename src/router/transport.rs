//! Per-request transport.
//!
//! One [`RequestTransport`] is created for every inbound HTTP request and
//! dropped with it. The exchange runs in a task the transport spawns; if the
//! handler future is dropped first (client disconnect), `Drop` fires the
//! cancellation token and any in-flight tool call gives up.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::types::{Error, Result, TransportId};

#[derive(Debug)]
pub struct RequestTransport {
    id: TransportId,
    cancel: CancellationToken,
    completed: bool,
}

impl RequestTransport {
    pub fn new() -> Self {
        Self {
            id: TransportId::new(),
            cancel: CancellationToken::new(),
            completed: false,
        }
    }

    pub fn id(&self) -> &TransportId {
        &self.id
    }

    /// Token handed to everything dispatched on behalf of this request.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `work` to completion in a spawned task.
    ///
    /// The task is detached from this future, so it observes a disconnect
    /// only through the cancellation token.
    pub async fn run<F, T>(&mut self, work: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(work);
        let output = handle
            .await
            .map_err(|e| Error::internal(format!("request task {} failed: {}", self.id, e)))?;
        self.completed = true;
        Ok(output)
    }
}

impl Default for RequestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestTransport {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(transport_id = %self.id, "request abandoned; cancelling dispatched work");
        }
        self.cancel.cancel();
    }
}
