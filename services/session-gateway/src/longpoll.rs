//! Batch-transport endpoint: one short-lived long-poll HTTP request per
//! attachment, resolved entirely within `Session::attach_and_replay`.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use session_relay::{Attachment, BatchSink, SessionKey, TransportError};
use session_wire::{parse_reconnect, Envelope};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::info;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct PollQuery {
    timestamp: Option<i64>,
    sequence: Option<u32>,
}

/// A `BatchSink` that resolves a one-shot channel the handler is
/// awaiting on. `is_active` reports whether that channel is still
/// unclaimed -- the long-poll request hasn't already gotten a response.
struct OneshotBatchSink {
    reply: Mutex<Option<oneshot::Sender<Vec<Envelope>>>>,
}

impl BatchSink for OneshotBatchSink {
    fn write_response<'a>(
        &'a self,
        envelopes: Vec<Envelope>,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let sender = self.reply.lock().unwrap().take();
            match sender {
                Some(tx) => tx.send(envelopes).map_err(|_| TransportError::Inactive),
                None => Err(TransportError::Inactive),
            }
        })
    }

    fn is_active(&self) -> bool {
        self.reply.lock().unwrap().is_some()
    }
}

pub async fn handler(
    Path((user, guid)): Path<(String, String)>,
    Query(query): Query<PollQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let key = SessionKey::new(user.clone(), guid.clone());
    let session = state.registry.lookup_or_create(key).await;
    let last_seen = parse_reconnect(query.timestamp, query.sequence);

    let (tx, rx) = oneshot::channel();
    let sink: Arc<dyn BatchSink> = Arc::new(OneshotBatchSink {
        reply: Mutex::new(Some(tx)),
    });

    // Resolved synchronously within this call: batch attachment always
    // gets exactly one response, so there's nothing further to await
    // on the session side. The timeout below only guards against the
    // handler's own sink never getting claimed (e.g. a lock timeout
    // inside attach_and_replay).
    session.attach_and_replay(Attachment::Batch(sink), last_seen).await;

    let envelopes = match tokio::time::timeout(state.config.lock_timeout * 4, rx).await {
        Ok(Ok(envelopes)) => envelopes,
        _ => Vec::new(),
    };
    info!(%user, %guid, count = envelopes.len(), "long-poll response sent");
    Json(envelopes)
}
