//! Domain models for a single arithmetic task: the fact, its operator,
//! which slot is hidden, and the magnitude tier used to scale aids.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;

/// Identity of one live task. A fresh id is minted every time the caller
/// hands the engine a new fact, even if the numbers repeat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
  pub fn new() -> Self { TaskId(Uuid::new_v4()) }
}

impl Default for TaskId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
  Add,
  Subtract,
}

impl Operator {
  pub fn apply(self, a: i64, b: i64) -> i64 {
    match self {
      Operator::Add => a + b,
      Operator::Subtract => a - b,
    }
  }

  pub fn symbol(self) -> char {
    match self {
      Operator::Add => '+',
      Operator::Subtract => '-',
    }
  }

  /// Parse what a learner typed into the operator box.
  pub fn from_symbol(s: &str) -> Option<Operator> {
    match s.trim() {
      "+" => Some(Operator::Add),
      "-" | "−" | "–" => Some(Operator::Subtract),
      _ => None,
    }
  }
}

/// Which position of the equation is hidden from the learner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
  Operand1,
  Operand2,
  Result,
  /// Fully worked display, nothing to answer.
  None,
}

impl Slot {
  pub fn name(self) -> &'static str {
    match self {
      Slot::Operand1 => "operand1",
      Slot::Operand2 => "operand2",
      Slot::Result => "result",
      Slot::None => "none",
    }
  }

  /// Missing-addend / missing-subtrahend style tasks.
  pub fn is_operand(self) -> bool {
    matches!(self, Slot::Operand1 | Slot::Operand2)
  }
}

/// Largest magnitude a task may carry. Matches the widest scale drawn.
pub const MAX_MAGNITUDE: i64 = 300;

/// Number-line / field scale for a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeTier {
  Tier20,
  Tier100,
  Tier200,
  Tier300,
}

impl RangeTier {
  pub fn for_magnitude(max_magnitude: i64) -> RangeTier {
    match max_magnitude {
      m if m <= 20 => RangeTier::Tier20,
      m if m <= 100 => RangeTier::Tier100,
      m if m <= 200 => RangeTier::Tier200,
      // Facts from outside are capped at `MAX_MAGNITUDE`; built-in ones stay below it.
      _ => RangeTier::Tier300,
    }
  }

  pub fn limit(self) -> u32 {
    match self {
      RangeTier::Tier20 => 20,
      RangeTier::Tier100 => 100,
      RangeTier::Tier200 => 200,
      RangeTier::Tier300 => 300,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      RangeTier::Tier20 => "tier20",
      RangeTier::Tier100 => "tier100",
      RangeTier::Tier200 => "tier200",
      RangeTier::Tier300 => "tier300",
    }
  }
}

/// One arithmetic fact with one hidden slot. Immutable for the lifetime of
/// an attempt; a new task is a new value.
///
/// `declared_result` comes from the task generator and is never recomputed
/// or corrected here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskFact {
  operand1: u32,
  operand2: u32,
  operator: Operator,
  declared_result: i64,
  unknown_slot: Slot,
}

impl TaskFact {
  pub fn new(operand1: u32, operand2: u32, operator: Operator, declared_result: i64, unknown_slot: Slot) -> Self {
    Self { operand1, operand2, operator, declared_result, unknown_slot }
  }

  pub fn operand1(&self) -> u32 { self.operand1 }
  pub fn operand2(&self) -> u32 { self.operand2 }
  pub fn operator(&self) -> Operator { self.operator }
  pub fn declared_result(&self) -> i64 { self.declared_result }
  pub fn unknown_slot(&self) -> Slot { self.unknown_slot }

  pub fn computed_result(&self) -> i64 {
    self.operator.apply(i64::from(self.operand1), i64::from(self.operand2))
  }

  pub fn is_consistent(&self) -> bool {
    self.declared_result == self.computed_result()
  }

  pub fn max_magnitude(&self) -> i64 {
    i64::from(self.operand1)
      .max(i64::from(self.operand2))
      .max(self.declared_result)
  }

  pub fn range_tier(&self) -> RangeTier {
    RangeTier::for_magnitude(self.max_magnitude())
  }

  /// Stored value of a slot as the generator supplied it.
  pub fn slot_value(&self, slot: Slot) -> Option<i64> {
    match slot {
      Slot::Operand1 => Some(i64::from(self.operand1)),
      Slot::Operand2 => Some(i64::from(self.operand2)),
      Slot::Result => Some(self.declared_result),
      Slot::None => None,
    }
  }

  /// Equation text with the hidden slot shown as `_`.
  pub fn masked(&self) -> String {
    let show = |slot: Slot, v: i64| if self.unknown_slot == slot { "_".to_string() } else { v.to_string() };
    format!(
      "{} {} {} = {}",
      show(Slot::Operand1, i64::from(self.operand1)),
      self.operator.symbol(),
      show(Slot::Operand2, i64::from(self.operand2)),
      show(Slot::Result, self.declared_result),
    )
  }
}

impl fmt::Display for TaskFact {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {} = {}", self.operand1, self.operator.symbol(), self.operand2, self.declared_result)
  }
}

/// Task as it arrives from the outside (config bank, client message).
/// Operands are signed here so a bad generator gets a clear error instead
/// of a deserialization failure.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaskFactIn {
  pub operand1: i64,
  pub operand2: i64,
  pub operator: Operator,
  pub declared_result: i64,
  #[serde(default = "default_slot")]
  pub unknown_slot: Slot,
}

fn default_slot() -> Slot { Slot::Result }

impl TryFrom<TaskFactIn> for TaskFact {
  type Error = TaskError;

  fn try_from(t: TaskFactIn) -> Result<Self, Self::Error> {
    let operand1 = u32::try_from(t.operand1).map_err(|_| TaskError::InvalidOperand { slot: "operand1", value: t.operand1 })?;
    let operand2 = u32::try_from(t.operand2).map_err(|_| TaskError::InvalidOperand { slot: "operand2", value: t.operand2 })?;
    let fact = TaskFact::new(operand1, operand2, t.operator, t.declared_result, t.unknown_slot);
    if fact.max_magnitude() > MAX_MAGNITUDE {
      return Err(TaskError::OutOfRange { max_magnitude: fact.max_magnitude(), limit: MAX_MAGNITUDE });
    }
    Ok(fact)
  }
}

impl From<&TaskFact> for TaskFactIn {
  fn from(f: &TaskFact) -> Self {
    TaskFactIn {
      operand1: i64::from(f.operand1),
      operand2: i64::from(f.operand2),
      operator: f.operator,
      declared_result: f.declared_result,
      unknown_slot: f.unknown_slot,
    }
  }
}
