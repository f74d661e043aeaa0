//! `Requesting`: the bridge between HTTP and synchronizations.
//!
//! `request` mints a request id and parks a one-shot channel for it; the HTTP
//! handler takes the receiving end, wrapped in a [`Waiter`], with
//! [`Requesting::subscribe`]. A synchronization later calls
//! `respond { request, ... }` and everything but `request` becomes the
//! response body.

use concord_core::{Concept, ConceptError, Operation, Record, Value};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

pub const REQUESTING: &str = "Requesting";

struct Pending {
    tx: oneshot::Sender<Record>,
    rx: Option<oneshot::Receiver<Record>>,
}

#[derive(Default)]
pub struct Requesting {
    pending: Mutex<HashMap<String, Pending>>,
}

impl Requesting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a request id. The inputs stay on the action record for
    /// synchronizations to match.
    pub async fn request(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(id.clone(), Pending { tx, rx: Some(rx) });
        id
    }

    /// Deliver `payload` to whoever waits on `request`.
    pub async fn respond(&self, mut payload: Record) -> Result<(), ConceptError> {
        let id = match payload.remove("request") {
            Some(Value::String(id)) => id,
            _ => {
                return Err(ConceptError::InvalidArguments(
                    "respond requires a request id".into(),
                ))
            }
        };
        let pending = self.pending.lock().await.remove(&id);
        let Some(pending) = pending else {
            return Err(ConceptError::Failed("request not pending".into()));
        };
        pending
            .tx
            .send(payload)
            .map_err(|_| ConceptError::Failed("request not pending".into()))
    }

    /// Take the response channel of `request`. Only the first caller gets it.
    pub async fn subscribe(self: &Arc<Self>, request: &str) -> Option<Waiter> {
        let rx = self
            .pending
            .lock()
            .await
            .get_mut(request)
            .and_then(|p| p.rx.take())?;
        Some(Waiter {
            requesting: self.clone(),
            request: request.to_string(),
            rx,
        })
    }

    /// Drop a request whose caller stopped waiting.
    pub async fn forget(&self, request: &str) {
        if self.pending.lock().await.remove(request).is_some() {
            tracing::debug!(request, "request abandoned");
        }
    }

    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// The caller's end of a pending request. Dropping it, whether after a
/// response, a timeout or a disconnected client, removes the request.
pub struct Waiter {
    requesting: Arc<Requesting>,
    request: String,
    rx: oneshot::Receiver<Record>,
}

impl Waiter {
    pub fn request(&self) -> &str {
        &self.request
    }

    pub async fn recv(&mut self) -> Result<Record, oneshot::error::RecvError> {
        (&mut self.rx).await
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.requesting.pending.try_lock() {
            if pending.remove(&self.request).is_some() {
                tracing::debug!(request = %self.request, "request abandoned");
            }
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let requesting = self.requesting.clone();
            let request = std::mem::take(&mut self.request);
            handle.spawn(async move { requesting.forget(&request).await });
        }
    }
}

impl Concept for Requesting {
    fn name(&self) -> &'static str {
        REQUESTING
    }

    fn operations(self: Arc<Self>) -> Vec<Operation> {
        vec![
            Operation::bound("request", &self, |c, _inputs: Record| async move {
                let id = c.request().await;
                Ok::<_, ConceptError>(json!({ "request": id }))
            })
            .returns(["request"]),
            Operation::bound("respond", &self, |c, payload: Record| async move {
                c.respond(payload).await.map(|()| json!({}))
            }),
        ]
    }
}
