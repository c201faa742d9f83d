//! Frame-transport endpoint: a persistent websocket, one per `(user, guid)`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use session_relay::{Attachment, FrameSink, SessionKey, TransportError};
use session_wire::{parse_reconnect, Coord, Envelope};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Deserialize)]
struct ReconnectFrame {
    timestamp: Option<i64>,
    sequence: Option<u32>,
}

fn parse_reconnect_text(text: &str) -> Coord {
    let frame: ReconnectFrame = serde_json::from_str(text).unwrap_or(ReconnectFrame {
        timestamp: None,
        sequence: None,
    });
    parse_reconnect(frame.timestamp, frame.sequence)
}

enum Outbound {
    Frame(Envelope),
    Ping(i64),
}

/// A `FrameSink` whose writes are forwarded over an mpsc channel to the
/// task that owns the actual `WebSocket`, so the `Session` never holds
/// a lock across a real socket write.
struct SocketFrameSink {
    tx: mpsc::Sender<Outbound>,
    active: Arc<AtomicBool>,
}

impl FrameSink for SocketFrameSink {
    fn write_frame<'a>(&'a self, envelope: Envelope) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.tx
                .send(Outbound::Frame(envelope))
                .await
                .map_err(|_| TransportError::Inactive)
        })
    }

    fn write_ping<'a>(&'a self, epoch_millis: i64) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            self.tx
                .send(Outbound::Ping(epoch_millis))
                .await
                .map_err(|_| TransportError::Inactive)
        })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub async fn handler(
    ws: WebSocketUpgrade,
    Path((user, guid)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run(socket, state, user, guid))
}

async fn run(mut socket: WebSocket, state: AppState, user: String, guid: String) {
    let key = SessionKey::new(user.clone(), guid.clone());
    let session = state.registry.lookup_or_create(key).await;

    let last_seen = match socket.recv().await {
        Some(Ok(Message::Text(text))) => parse_reconnect_text(&text),
        _ => {
            warn!(%user, %guid, "socket closed before sending a reconnect coordinate");
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel(64);
    let active = Arc::new(AtomicBool::new(true));
    let sink: Arc<dyn FrameSink> = Arc::new(SocketFrameSink {
        tx,
        active: active.clone(),
    });

    session.attach_and_replay(Attachment::Frame(sink), last_seen).await;
    session.flush().await;
    session.set_deadline(state.config.ping_interval * 2).await;
    info!(%user, %guid, "frame transport attached");

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let sent = match outbound {
                    Some(Outbound::Frame(envelope)) => match serde_json::to_string(&envelope) {
                        Ok(text) => socket.send(Message::Text(text.into())).await.is_ok(),
                        Err(_) => true,
                    },
                    Some(Outbound::Ping(epoch_millis)) => socket
                        .send(Message::Ping(epoch_millis.to_string().into_bytes()))
                        .await
                        .is_ok(),
                    None => false,
                };
                if !sent {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        session.record_receive(parse_reconnect_text(&text)).await;
                        session.set_deadline(state.config.ping_interval * 2).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        session.set_deadline(state.config.ping_interval * 2).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    active.store(false, Ordering::SeqCst);
    info!(%user, %guid, "frame transport closed");
}
