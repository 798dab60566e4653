//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::TaskFactIn;
use crate::logic::{judge_once, representations, DEFAULT_DIFFICULTY};
use crate::protocol::*;
use crate::state::AppState;

fn bad_request(e: impl std::fmt::Display) -> Response {
  (StatusCode::BAD_REQUEST, Json(ErrorOut { error: e.to_string() })).into_response()
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state), fields(difficulty = %q.difficulty.as_deref().unwrap_or(DEFAULT_DIFFICULTY)))]
pub async fn http_get_task(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TaskQuery>,
) -> impl IntoResponse {
  let difficulty = q.difficulty.unwrap_or_else(|| DEFAULT_DIFFICULTY.into());
  let (fact, source) = state.choose_task(&difficulty).await;
  info!(target: "task_bank", %difficulty, equation = %fact.masked(), %source, "HTTP task served");
  Json(TaskOut { task: TaskFactIn::from(&fact), equation: fact.masked(), source })
}

#[instrument(level = "info", skip(body), fields(answer_len = body.answer.len()))]
pub async fn http_post_judge(Json(body): Json<JudgeIn>) -> Response {
  match judge_once(body) {
    Ok(out) => {
      info!(target: "engine", judged = out.judged, correct = out.judgement.map(|j| j.is_correct), "HTTP judge evaluated");
      Json(out).into_response()
    }
    Err(e) => {
      warn!(target: "engine", error = %e, "HTTP judge rejected task");
      bad_request(e)
    }
  }
}

#[instrument(level = "info", skip(body), fields(phase = ?body.phase))]
pub async fn http_post_representations(Json(body): Json<RepresentationsIn>) -> Response {
  match representations(body) {
    Ok(out) => Json(out).into_response(),
    Err(e) => bad_request(e),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> impl IntoResponse {
  let advances = state.progress_for(&session_id).await;
  info!(target: "session", %session_id, count = advances.len(), "HTTP progress served");
  Json(ProgressOut { session_id, advances })
}
