//! WebSocket upgrade + message loop. Each connection owns one training
//! session. Client messages become session commands; session events (views,
//! advances, errors) are pushed back as they happen, including the ones
//! caused by timers.
//!
//! The socket is split: the read half feeds the session, a separate writer
//! task drains session events and direct replies into the write half. The
//! reader may wait on a busy session without stalling the events it emits.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::logic::{record_advance_detached, to_command};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::{self, Session, SessionEvent};
use crate::state::AppState;

const CHANNEL_DEPTH: usize = 32;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "mathtrainer_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
  let session_id = Uuid::new_v4().to_string();
  info!(target: "mathtrainer_backend", %session_id, "WebSocket connected");

  let (sink, mut stream) = socket.split();
  let defaults = &state.session_defaults;
  let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_DEPTH);
  let (ev_tx, ev_rx) = mpsc::channel(CHANNEL_DEPTH);
  let (reply_tx, reply_rx) = mpsc::channel(CHANNEL_DEPTH);
  let driver = tokio::spawn(session::run(Session::new(defaults.mode, defaults.aids), cmd_rx, ev_tx));
  let writer = tokio::spawn(write_loop(sink, state.clone(), session_id.clone(), ev_rx, reply_rx));

  while let Some(Ok(incoming)) = stream.next().await {
    let reply = match incoming {
      Message::Text(txt) => match parse_and_forward(&state, &txt, &cmd_tx).await {
        Ok(None) => continue,
        Ok(Some(reply)) => reply,
        Err(message) => ServerWsMessage::Error { message },
      },
      Message::Ping(payload) => {
        if reply_tx.send(Message::Pong(payload)).await.is_err() {
          break;
        }
        continue;
      }
      Message::Close(_) => break,
      _ => continue,
    };
    if reply_tx.send(text_frame(&reply)).await.is_err() {
      break;
    }
  }

  // Dropping the senders ends the driver (and everything it armed), then the writer.
  drop(cmd_tx);
  drop(reply_tx);
  let _ = driver.await;
  let _ = writer.await;
  info!(target: "mathtrainer_backend", %session_id, "WebSocket disconnected");
}

/// Write half of a connection. Ends once both the session and the reader
/// are gone, or on the first failed send.
async fn write_loop<S>(
  mut sink: S,
  state: Arc<AppState>,
  session_id: String,
  mut events: mpsc::Receiver<SessionEvent>,
  mut replies: mpsc::Receiver<Message>,
) where
  S: Sink<Message> + Unpin,
  S::Error: std::fmt::Display,
{
  loop {
    let frame = tokio::select! {
      Some(event) = events.recv() => text_frame(&event_message(&state, &session_id, event)),
      Some(reply) = replies.recv() => reply,
      else => break,
    };
    if let Err(e) = sink.send(frame).await {
      error!(target: "mathtrainer_backend", error = %e, "WS send error");
      break;
    }
  }
}

fn event_message(state: &Arc<AppState>, session_id: &str, event: SessionEvent) -> ServerWsMessage {
  match event {
    SessionEvent::View(view) => ServerWsMessage::View { session_id: session_id.to_string(), view },
    SessionEvent::Advance(adv) => {
      info!(target: "session", %session_id, task = %adv.task_id, outcome = ?adv.outcome, "advance");
      record_advance_detached(state.clone(), session_id.to_string(), (*adv).clone());
      ServerWsMessage::Advance { session_id: session_id.to_string(), advance: adv }
    }
    SessionEvent::Error(message) => ServerWsMessage::Error { message },
  }
}

fn text_frame(msg: &ServerWsMessage) -> Message {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  Message::Text(out)
}

/// Parse one client frame and hand it to the session. Returns an immediate
/// reply for messages the connection answers itself.
async fn parse_and_forward(
  state: &AppState,
  txt: &str,
  cmd_tx: &mpsc::Sender<session::Command>,
) -> Result<Option<ServerWsMessage>, String> {
  let incoming = serde_json::from_str::<ClientWsMessage>(txt)
    .map_err(|e| crate::error::ProtocolError::from(e).to_string())?;
  debug!(target: "mathtrainer_backend", "WS received: {:?}", &incoming);
  match to_command(state, incoming).await.map_err(|e| e.to_string())? {
    None => Ok(Some(ServerWsMessage::Pong)),
    Some(cmd) => {
      cmd_tx.send(cmd).await.map_err(|_| "session closed".to_string())?;
      Ok(None)
    }
  }
}
