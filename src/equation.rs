//! Equation entry: the learner types the whole equation before any aid is
//! shown. Wrong equations are answered with a short message and the fields
//! are wiped two seconds later; retries are unlimited and nothing advances
//! until a correct equation is confirmed with `continue`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::domain::{Operator, TaskFact, TaskId};
use crate::evaluate::parse_answer;
use crate::policy::{visibility_revealed, AidConfig, VisibilityMap};
use crate::steplog::{task_shown_details, Advance, Outcome, StepAction, StepLog};

pub const AUTO_CLEAR_DELAY: Duration = Duration::from_secs(2);

pub const RETRY_MESSAGE: &str = "Not quite yet. Check your equation and try again.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationField {
  Operand1,
  Operator,
  Operand2,
  Result,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EquationFields {
  pub operand1: String,
  pub operator: String,
  pub operand2: String,
  pub result: String,
}

impl EquationFields {
  pub fn get_mut(&mut self, field: EquationField) -> &mut String {
    match field {
      EquationField::Operand1 => &mut self.operand1,
      EquationField::Operator => &mut self.operator,
      EquationField::Operand2 => &mut self.operand2,
      EquationField::Result => &mut self.result,
    }
  }

  pub fn any_empty(&self) -> bool {
    [&self.operand1, &self.operator, &self.operand2, &self.result]
      .iter()
      .any(|s| s.trim().is_empty())
  }
}

/// Parsed equation as the learner typed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TypedEquation {
  pub operand1: i64,
  pub operator: Operator,
  pub operand2: i64,
  pub result: i64,
}

impl TypedEquation {
  pub fn parse(fields: &EquationFields) -> Option<Self> {
    Some(Self {
      operand1: parse_answer(&fields.operand1)?,
      operator: Operator::from_symbol(&fields.operator)?,
      operand2: parse_answer(&fields.operand2)?,
      result: parse_answer(&fields.result)?,
    })
  }

  pub fn is_consistent(&self) -> bool {
    self.operator.apply(self.operand1, self.operand2) == self.result
  }
}

/// Correct iff the operands and operator are the task's own and the typed
/// equation holds arithmetically.
pub fn judge_equation(fact: &TaskFact, typed: &TypedEquation) -> bool {
  typed.operand1 == i64::from(fact.operand1())
    && typed.operand2 == i64::from(fact.operand2())
    && typed.operator == fact.operator()
    && typed.is_consistent()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationPhase {
  Editing,
  Rejected,
  Solved,
  Advanced,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
  /// A field is still empty, or the fields are locked.
  Ignored,
  Correct,
  Incorrect { clear_at: Instant },
}

#[derive(Debug)]
enum State {
  Editing,
  Rejected { clear_at: Instant },
  Solved { typed: TypedEquation },
  Advanced,
}

#[derive(Debug)]
pub struct EquationEntry {
  task_id: TaskId,
  fact: TaskFact,
  fields: EquationFields,
  state: State,
  log: StepLog,
  attempts: u32,
}

impl EquationEntry {
  pub fn new(fact: TaskFact) -> Self {
    let task_id = TaskId::new();
    let mut log = StepLog::new();
    log.push(StepAction::TaskShown, task_shown_details(task_id, &fact));
    Self { task_id, fact, fields: EquationFields::default(), state: State::Editing, log, attempts: 0 }
  }

  /// Swap in the next task; a pending clear for the old one is dropped.
  pub fn replace_task(&mut self, fact: TaskFact) -> TaskId {
    if let State::Rejected { .. } = self.state {
      debug!(target: "engine", task = %self.task_id, "pending field clear cancelled by task replacement");
    }
    *self = Self::new(fact);
    self.task_id
  }

  pub fn task_id(&self) -> TaskId { self.task_id }
  pub fn fact(&self) -> &TaskFact { &self.fact }
  pub fn fields(&self) -> &EquationFields { &self.fields }
  pub fn attempts(&self) -> u32 { self.attempts }
  pub fn step_log(&self) -> &StepLog { &self.log }

  pub fn phase(&self) -> EquationPhase {
    match self.state {
      State::Editing => EquationPhase::Editing,
      State::Rejected { .. } => EquationPhase::Rejected,
      State::Solved { .. } => EquationPhase::Solved,
      State::Advanced => EquationPhase::Advanced,
    }
  }

  pub fn message(&self) -> Option<&'static str> {
    match self.state {
      State::Rejected { .. } => Some(RETRY_MESSAGE),
      _ => None,
    }
  }

  /// Aids stay hidden until the equation is confirmed, then every enabled
  /// aid reveals.
  pub fn representations(&self, config: &AidConfig) -> Option<VisibilityMap> {
    match self.state {
      State::Solved { .. } => Some(visibility_revealed(&self.fact, config)),
      _ => None,
    }
  }

  pub fn set_field(&mut self, field: EquationField, text: &str) -> bool {
    if !matches!(self.state, State::Editing) {
      return false;
    }
    *self.fields.get_mut(field) = text.to_string();
    true
  }

  #[instrument(level = "debug", target = "engine", skip(self, now), fields(task = %self.task_id))]
  pub fn check(&mut self, now: Instant) -> CheckOutcome {
    if !matches!(self.state, State::Editing) || self.fields.any_empty() {
      return CheckOutcome::Ignored;
    }
    self.attempts += 1;
    let typed = TypedEquation::parse(&self.fields);
    let correct = typed.as_ref().is_some_and(|t| judge_equation(&self.fact, t));
    self.log.push(
      StepAction::EquationChecked,
      json!({ "fields": self.fields, "correct": correct, "attempt": self.attempts }),
    );

    match typed {
      Some(typed) if correct => {
        info!(target: "engine", task = %self.task_id, attempts = self.attempts, "equation confirmed");
        self.state = State::Solved { typed };
        CheckOutcome::Correct
      }
      _ => {
        let clear_at = now + AUTO_CLEAR_DELAY;
        info!(target: "engine", task = %self.task_id, attempts = self.attempts, "equation rejected; fields clear shortly");
        self.state = State::Rejected { clear_at };
        CheckOutcome::Incorrect { clear_at }
      }
    }
  }

  pub fn next_deadline(&self) -> Option<Instant> {
    match self.state {
      State::Rejected { clear_at } => Some(clear_at),
      _ => None,
    }
  }

  /// Clear the fields once the message has been shown long enough.
  pub fn on_timer(&mut self, now: Instant) -> bool {
    match self.state {
      State::Rejected { clear_at } if now >= clear_at => {
        self.fields = EquationFields::default();
        self.state = State::Editing;
        debug!(target: "engine", task = %self.task_id, "equation fields cleared");
        true
      }
      _ => false,
    }
  }

  /// Learner confirmed the solved equation.
  pub fn continue_on(&mut self) -> Option<Advance> {
    let State::Solved { typed } = self.state else {
      return None;
    };
    self.state = State::Advanced;
    let answer = [("operand1", typed.operand1), ("operand2", typed.operand2), ("result", typed.result)]
      .into_iter()
      .map(|(k, v)| (k.to_string(), v))
      .collect();
    Some(Advance::new(self.task_id, &self.fact, Outcome::Correct, answer, self.log.take()))
  }
}
