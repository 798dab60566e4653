//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Resolving the task a client asked for (explicit fact or bank draw)
//!   - Stateless judging of a single answer
//!   - Visibility + synchronized rendering for a fact
//!   - Mapping client messages onto session commands
//!   - Handing advances to the progress store without blocking the session

use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use crate::domain::{TaskFact, TaskFactIn};
use crate::error::{ProtocolError, TaskError};
use crate::evaluate::{integrity_check, judge};
use crate::keys::Key;
use crate::policy::visibility;
use crate::protocol::{ClientWsMessage, JudgeIn, JudgeOut, RepresentationsIn, RepresentationsOut};
use crate::session::Command;
use crate::state::AppState;
use crate::steplog::Advance;
use crate::sync::render;

pub const DEFAULT_DIFFICULTY: &str = "tier20";

#[instrument(level = "info", skip(state, task))]
pub async fn resolve_task(state: &AppState, task: Option<TaskFactIn>, difficulty: Option<&str>) -> Result<TaskFact, TaskError> {
  match task {
    Some(t) => TaskFact::try_from(t),
    None => {
      let difficulty = difficulty.unwrap_or(DEFAULT_DIFFICULTY);
      let (fact, origin) = state.choose_task(difficulty).await;
      info!(target: "task_bank", %difficulty, equation = %fact.masked(), %origin, "task drawn");
      Ok(fact)
    }
  }
}

#[instrument(level = "info", skip(body), fields(answer_len = body.answer.len()))]
pub fn judge_once(body: JudgeIn) -> Result<JudgeOut, TaskError> {
  let fact = TaskFact::try_from(body.task)?;
  let judgement = judge(&fact, &body.answer);
  Ok(JudgeOut {
    judged: judgement.is_some(),
    judgement,
    integrity_warning: integrity_check(&fact),
  })
}

pub fn representations(body: RepresentationsIn) -> Result<RepresentationsOut, TaskError> {
  let fact = TaskFact::try_from(body.task)?;
  let vis = visibility(&fact, &body.aids, body.phase);
  let aids = render(&fact, &vis);
  Ok(RepresentationsOut { visibility: vis, aids })
}

/// Translate a client message into a session command. `Ok(None)` for
/// messages the connection answers itself (ping).
pub async fn to_command(state: &AppState, msg: ClientWsMessage) -> Result<Option<Command>, ProtocolError> {
  let cmd = match msg {
    ClientWsMessage::Ping => return Ok(None),
    ClientWsMessage::Start { mode, aids } => Command::Configure { mode, aids },
    ClientWsMessage::NewTask { task, difficulty } => {
      Command::NewTask(resolve_task(state, task, difficulty.as_deref()).await?)
    }
    ClientWsMessage::Input { text } => Command::Input(text),
    ClientWsMessage::Submit => Command::Submit,
    ClientWsMessage::Key { key } => Command::Key(Key::from_name(&key)),
    ClientWsMessage::EquationField { field, text } => Command::EquationField { field, text },
    ClientWsMessage::CheckEquation => Command::CheckEquation,
    ClientWsMessage::Continue => Command::Continue,
  };
  Ok(Some(cmd))
}

/// Record an advance in the background. The session has already moved on;
/// failures are only logged.
pub fn record_advance_detached(state: Arc<AppState>, session_id: String, adv: Advance) {
  tokio::spawn(async move {
    let task_id = adv.task_id;
    match state.record_advance(&session_id, adv).await {
      Ok(()) => debug!(target: "session", %session_id, %task_id, "advance recorded"),
      Err(e) => error!(target: "session", %session_id, %task_id, error = %e, "failed to record advance"),
    }
  });
}
