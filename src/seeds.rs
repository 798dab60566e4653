//! Built-in tasks so the app is usable without a config file. They stand in
//! for the external task generator: finished facts, nothing computed here.

use crate::domain::{Operator, Slot, TaskFact};

fn t(operand1: u32, operator: Operator, operand2: u32, declared_result: i64, unknown_slot: Slot) -> TaskFact {
  TaskFact::new(operand1, operand2, operator, declared_result, unknown_slot)
}

/// (difficulty, task) pairs.
pub fn seed_tasks() -> Vec<(String, TaskFact)> {
  use Operator::{Add, Subtract};
  use Slot::{Operand1, Operand2, Result};

  let tier20 = [
    t(6, Add, 4, 10, Result),
    t(8, Add, 3, 11, Operand2),
    t(9, Subtract, 4, 5, Result),
    t(7, Add, 5, 12, Operand1),
    t(15, Subtract, 7, 8, Operand2),
    t(13, Add, 6, 19, Result),
  ];
  let tier100 = [
    t(34, Add, 25, 59, Result),
    t(72, Subtract, 18, 54, Result),
    t(46, Add, 38, 84, Operand2),
  ];
  let tier200 = [t(120, Add, 45, 165, Result), t(180, Subtract, 95, 85, Operand1)];

  tier20
    .into_iter()
    .map(|task| ("tier20".to_string(), task))
    .chain(tier100.into_iter().map(|task| ("tier100".to_string(), task)))
    .chain(tier200.into_iter().map(|task| ("tier200".to_string(), task)))
    .collect()
}

/// Last resort when a difficulty has no tasks at all.
pub fn hard_fallback_task() -> TaskFact {
  t(2, Operator::Add, 3, 5, Slot::Result)
}
