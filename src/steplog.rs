//! Attempt records, the per-task step log and the advance payload handed to
//! the progression tracker. The engine only ever appends to a step log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{Slot, TaskFact, TaskFactIn, TaskId};
use crate::evaluate::Judgement;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepAction {
  TaskShown,
  SubmitAnswer,
  CorrectAnswer,
  IncorrectAnswer,
  Acknowledged,
  EquationChecked,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepEntry {
  pub timestamp: DateTime<Utc>,
  pub action: StepAction,
  pub details: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepLog(Vec<StepEntry>);

impl StepLog {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, action: StepAction, details: Value) {
    self.0.push(StepEntry { timestamp: Utc::now(), action, details });
  }

  pub fn entries(&self) -> &[StepEntry] { &self.0 }

  pub fn actions(&self) -> Vec<StepAction> { self.0.iter().map(|e| e.action).collect() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Hand the log over, leaving an empty one behind.
  pub fn take(&mut self) -> StepLog { std::mem::take(self) }
}

/// One judged submission.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnswerAttempt {
  pub raw_input: String,
  pub parsed_value: i64,
  pub target_slot: Slot,
  pub is_correct: bool,
  pub submitted_at: DateTime<Utc>,
}

impl AnswerAttempt {
  pub fn new(raw_input: &str, slot: Slot, judgement: &Judgement) -> Self {
    Self {
      raw_input: raw_input.to_string(),
      parsed_value: judgement.parsed_value,
      target_slot: slot,
      is_correct: judgement.is_correct,
      submitted_at: Utc::now(),
    }
  }

  /// Answer map for the advance payload, keyed by slot name.
  pub fn answer(&self) -> BTreeMap<String, i64> {
    BTreeMap::from([(self.target_slot.name().to_string(), self.parsed_value)])
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Correct,
  AcknowledgedIncorrect,
}

/// Emitted exactly once per task, whatever the outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Advance {
  pub task_id: TaskId,
  pub task: TaskFactIn,
  pub outcome: Outcome,
  pub answer: BTreeMap<String, i64>,
  pub step_log: StepLog,
}

impl Advance {
  pub fn new(task_id: TaskId, fact: &TaskFact, outcome: Outcome, answer: BTreeMap<String, i64>, step_log: StepLog) -> Self {
    Self { task_id, task: TaskFactIn::from(fact), outcome, answer, step_log }
  }
}

pub fn task_shown_details(task_id: TaskId, fact: &TaskFact) -> Value {
  json!({
    "task_id": task_id.to_string(),
    "equation": fact.masked(),
    "unknown_slot": fact.unknown_slot().name(),
  })
}
