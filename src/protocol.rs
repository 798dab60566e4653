//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::TaskFactIn;
use crate::equation::EquationField;
use crate::evaluate::{FactIntegrityWarning, Judgement};
use crate::feedback::Phase;
use crate::policy::{AidConfig, VisibilityMap};
use crate::session::{SessionView, TrainingMode};
use crate::steplog::Advance;
use crate::sync::RenderedAid;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Start {
        #[serde(default)]
        mode: TrainingMode,
        #[serde(default)]
        aids: AidConfig,
    },
    /// Either an explicit task or a difficulty to draw one from the bank.
    NewTask {
        #[serde(default)]
        task: Option<TaskFactIn>,
        #[serde(default)]
        difficulty: Option<String>,
    },
    Input {
        text: String,
    },
    Submit,
    Key {
        key: String,
    },
    EquationField {
        field: EquationField,
        text: String,
    },
    CheckEquation,
    Continue,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    View {
        #[serde(rename = "sessionId")]
        session_id: String,
        view: Box<SessionView>,
    },
    Advance {
        #[serde(rename = "sessionId")]
        session_id: String,
        advance: Box<Advance>,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub difficulty: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskOut {
    pub task: TaskFactIn,
    pub equation: String,
    pub source: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct JudgeIn {
    pub task: TaskFactIn,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct JudgeOut {
    /// False when the submission would be ignored (malformed or no slot).
    pub judged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judgement: Option<Judgement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_warning: Option<FactIntegrityWarning>,
}

#[derive(Debug, Deserialize)]
pub struct RepresentationsIn {
    pub task: TaskFactIn,
    #[serde(default = "default_phase")]
    pub phase: Phase,
    #[serde(default)]
    pub aids: AidConfig,
}

fn default_phase() -> Phase { Phase::Solving }

#[derive(Debug, Serialize)]
pub struct RepresentationsOut {
    pub visibility: VisibilityMap,
    pub aids: Vec<RenderedAid>,
}

#[derive(Debug, Serialize)]
pub struct ProgressOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub advances: Vec<Advance>,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
