//! One learner session: picks the flow for the training mode, turns client
//! commands and timer expiries into engine transitions, and reports views
//! and advances.
//!
//! `Session` is synchronous; `run` is the tokio driver around it. The driver
//! asks the live engine for its deadline on every loop iteration, so only the
//! live task can ever have a timer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

use crate::domain::{TaskFact, TaskId};
use crate::equation::{CheckOutcome, EquationEntry, EquationField, EquationFields, EquationPhase};
use crate::error::ProtocolError;
use crate::evaluate::FactIntegrityWarning;
use crate::feedback::{Comparison, FeedbackMachine, Phase, SubmitOutcome};
use crate::keys::Key;
use crate::policy::{visibility, AidConfig, VisibilityMap};
use crate::steplog::Advance;
use crate::sync::{render, RenderedAid};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
  /// Placeholder flow with blocking feedback.
  #[default]
  Standard,
  /// Type the whole equation first, retry until right.
  Blind,
}

impl TrainingMode {
  pub fn name(self) -> &'static str {
    match self {
      TrainingMode::Standard => "standard",
      TrainingMode::Blind => "blind",
    }
  }
}

#[derive(Debug)]
pub enum Engine {
  Feedback(FeedbackMachine),
  Equation(EquationEntry),
}

impl Engine {
  fn start(mode: TrainingMode, fact: TaskFact) -> Self {
    match mode {
      TrainingMode::Standard => Engine::Feedback(FeedbackMachine::new(fact)),
      TrainingMode::Blind => Engine::Equation(EquationEntry::new(fact)),
    }
  }

  pub fn task_id(&self) -> TaskId {
    match self {
      Engine::Feedback(m) => m.task_id(),
      Engine::Equation(e) => e.task_id(),
    }
  }

  pub fn next_deadline(&self) -> Option<Instant> {
    match self {
      Engine::Feedback(m) => m.next_deadline(),
      Engine::Equation(e) => e.next_deadline(),
    }
  }
}

#[derive(Clone, Debug)]
pub enum Command {
  Configure { mode: TrainingMode, aids: AidConfig },
  NewTask(TaskFact),
  Input(String),
  Submit,
  Key(Key),
  EquationField { field: EquationField, text: String },
  CheckEquation,
  Continue,
}

/// Everything a client needs to draw the live task.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionView {
  Standard {
    task_id: TaskId,
    equation: String,
    phase: Phase,
    input: String,
    accepts_input: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    integrity_warning: Option<FactIntegrityWarning>,
    visibility: VisibilityMap,
    aids: Vec<RenderedAid>,
  },
  Blind {
    task_id: TaskId,
    phase: EquationPhase,
    fields: EquationFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<VisibilityMap>,
    aids: Vec<RenderedAid>,
  },
}

#[derive(Clone, Debug)]
pub enum SessionEvent {
  View(Box<SessionView>),
  Advance(Box<Advance>),
  Error(String),
}

#[derive(Debug, Default)]
pub struct Session {
  mode: TrainingMode,
  aids: AidConfig,
  engine: Option<Engine>,
}

impl Session {
  pub fn new(mode: TrainingMode, aids: AidConfig) -> Self {
    Self { mode, aids, engine: None }
  }

  pub fn mode(&self) -> TrainingMode { self.mode }
  pub fn engine(&self) -> Option<&Engine> { self.engine.as_ref() }

  pub fn next_deadline(&self) -> Option<Instant> {
    self.engine.as_ref().and_then(Engine::next_deadline)
  }

  #[instrument(level = "debug", target = "session", skip(self, now))]
  pub fn handle(&mut self, cmd: Command, now: Instant) -> Result<Vec<SessionEvent>, ProtocolError> {
    let mut events = Vec::new();
    match cmd {
      Command::Configure { mode, aids } => {
        self.aids = aids;
        if mode != self.mode {
          info!(target: "session", from = self.mode.name(), to = mode.name(), "training mode changed");
          self.mode = mode;
          // The live task restarts in the new flow.
          if let Some(fact) = self.engine.as_ref().map(|e| live_fact(e).clone()) {
            self.engine = Some(Engine::start(mode, fact));
          }
        }
      }
      Command::NewTask(fact) => {
        let unplaced = match (self.mode, self.engine.as_mut()) {
          (TrainingMode::Standard, Some(Engine::Feedback(m))) => {
            m.replace_task(fact);
            None
          }
          (TrainingMode::Blind, Some(Engine::Equation(e))) => {
            e.replace_task(fact);
            None
          }
          _ => Some(fact),
        };
        if let Some(fact) = unplaced {
          self.engine = Some(Engine::start(self.mode, fact));
        }
      }
      Command::Input(raw) => {
        let m = self.feedback_mut("input")?;
        if !m.set_input(&raw) {
          debug!(target: "session", task = %m.task_id(), "input ignored while locked");
        }
      }
      Command::Submit => {
        let m = self.feedback_mut("submit")?;
        if let SubmitOutcome::Ignored(reason) = m.submit(now) {
          debug!(target: "session", task = %m.task_id(), ?reason, "submit ignored");
          return Ok(events);
        }
      }
      Command::Key(key) => {
        match self.engine.as_mut() {
          Some(Engine::Feedback(m)) => {
            if let Some(adv) = m.key(key) {
              events.push(SessionEvent::Advance(Box::new(adv)));
            }
          }
          Some(Engine::Equation(_)) => return Ok(events),
          None => return Err(ProtocolError::NoTask),
        }
      }
      Command::EquationField { field, text } => {
        let e = self.equation_mut("equation_field")?;
        e.set_field(field, &text);
      }
      Command::CheckEquation => {
        let e = self.equation_mut("check_equation")?;
        if e.check(now) == CheckOutcome::Ignored {
          return Ok(events);
        }
      }
      Command::Continue => {
        let e = self.equation_mut("continue")?;
        match e.continue_on() {
          Some(adv) => events.push(SessionEvent::Advance(Box::new(adv))),
          None => return Ok(events),
        }
      }
    }
    events.extend(self.view().map(|v| SessionEvent::View(Box::new(v))));
    Ok(events)
  }

  /// Fire whatever is due on the live engine.
  pub fn on_timer(&mut self, now: Instant) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    let fired = match self.engine.as_mut() {
      Some(Engine::Feedback(m)) => match m.on_timer(now) {
        Some(adv) => {
          events.push(SessionEvent::Advance(Box::new(adv)));
          true
        }
        None => false,
      },
      Some(Engine::Equation(e)) => e.on_timer(now),
      None => false,
    };
    if fired {
      events.extend(self.view().map(|v| SessionEvent::View(Box::new(v))));
    }
    events
  }

  pub fn view(&self) -> Option<SessionView> {
    let view = match self.engine.as_ref()? {
      Engine::Feedback(m) => {
        let vis = visibility(m.fact(), &self.aids, m.phase());
        SessionView::Standard {
          task_id: m.task_id(),
          equation: m.fact().masked(),
          phase: m.phase(),
          input: m.input().to_string(),
          accepts_input: m.accepts_input(),
          comparison: m.comparison().cloned(),
          integrity_warning: m.integrity_warning().cloned(),
          aids: render(m.fact(), &vis),
          visibility: vis,
        }
      }
      Engine::Equation(e) => {
        let vis = e.representations(&self.aids);
        SessionView::Blind {
          task_id: e.task_id(),
          phase: e.phase(),
          fields: e.fields().clone(),
          message: e.message(),
          aids: vis.as_ref().map(|v| render(e.fact(), v)).unwrap_or_default(),
          visibility: vis,
        }
      }
    };
    Some(view)
  }

  fn feedback_mut(&mut self, message: &'static str) -> Result<&mut FeedbackMachine, ProtocolError> {
    match self.engine.as_mut() {
      Some(Engine::Feedback(m)) => Ok(m),
      Some(Engine::Equation(_)) => Err(ProtocolError::WrongMode { message, mode: self.mode.name() }),
      None => Err(ProtocolError::NoTask),
    }
  }

  fn equation_mut(&mut self, message: &'static str) -> Result<&mut EquationEntry, ProtocolError> {
    match self.engine.as_mut() {
      Some(Engine::Equation(e)) => Ok(e),
      Some(Engine::Feedback(_)) => Err(ProtocolError::WrongMode { message, mode: self.mode.name() }),
      None => Err(ProtocolError::NoTask),
    }
  }
}

fn live_fact(engine: &Engine) -> &TaskFact {
  match engine {
    Engine::Feedback(m) => m.fact(),
    Engine::Equation(e) => e.fact(),
  }
}

/// Drive a session until the command channel closes.
#[instrument(level = "info", target = "session", skip_all)]
pub async fn run(mut session: Session, mut commands: mpsc::Receiver<Command>, events: mpsc::Sender<SessionEvent>) {
  info!(target: "session", mode = session.mode().name(), "session started");
  loop {
    let deadline = session.next_deadline();
    let out = tokio::select! {
      cmd = commands.recv() => match cmd {
        Some(cmd) => match session.handle(cmd, Instant::now()) {
          Ok(evs) => evs,
          Err(e) => {
            warn!(target: "session", error = %e, "command rejected");
            vec![SessionEvent::Error(e.to_string())]
          }
        },
        None => break,
      },
      _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
        session.on_timer(Instant::now())
      }
    };
    for ev in out {
      if events.send(ev).await.is_err() {
        info!(target: "session", "event receiver dropped; stopping session");
        return;
      }
    }
  }
  info!(target: "session", "session ended");
}
