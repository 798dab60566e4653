//! Answer evaluation for the hidden slot of a task.
//!
//! The evaluator never inverts the equation: the generator already knows the
//! hidden value and stored it in the fact, so the expected value is simply
//! the field marked hidden. For operand tasks the arithmetic is only used as
//! a sanity check that produces a `FactIntegrityWarning`.

use serde::Serialize;
use tracing::{instrument, warn};

use crate::domain::{Slot, TaskFact};

/// `declared_result` disagrees with `operand1 op operand2`. Non-fatal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FactIntegrityWarning {
  pub fact: String,
  pub declared_result: i64,
  pub computed_result: i64,
}

/// What the learner's answer is compared against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expected {
  pub slot: Slot,
  pub value: i64,
  pub warning: Option<FactIntegrityWarning>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Judgement {
  pub is_correct: bool,
  pub parsed_value: i64,
  pub expected_value: i64,
}

/// Pure comparison of the declared and computed result.
pub fn integrity_warning(fact: &TaskFact) -> Option<FactIntegrityWarning> {
  (!fact.is_consistent()).then(|| FactIntegrityWarning {
    fact: fact.to_string(),
    declared_result: fact.declared_result(),
    computed_result: fact.computed_result(),
  })
}

/// Check a fact as it is loaded and log the mismatch. Call once per fact;
/// judging reuses the stored value without logging again.
pub fn integrity_check(fact: &TaskFact) -> Option<FactIntegrityWarning> {
  let w = integrity_warning(fact)?;
  warn!(
    target: "engine",
    fact = %w.fact,
    declared = w.declared_result,
    computed = w.computed_result,
    "FactIntegrityWarning: declared result differs from computed result"
  );
  Some(w)
}

/// Expected value for the unknown slot, or `None` for fully worked tasks.
pub fn expected_value(fact: &TaskFact) -> Option<Expected> {
  let slot = fact.unknown_slot();
  let value = fact.slot_value(slot)?;
  let warning = if slot.is_operand() { integrity_warning(fact) } else { None };
  Some(Expected { slot, value, warning })
}

/// Non-negative integer or nothing. Surrounding whitespace is tolerated,
/// signs, separators and partial numbers are not.
pub fn parse_answer(raw: &str) -> Option<i64> {
  let s = raw.trim();
  if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  s.parse::<i64>().ok()
}

/// Judge a raw submission. `None` means the submission is ignored: the task
/// has nothing to answer or the input is not a complete number.
#[instrument(level = "debug", target = "engine", skip(fact), fields(slot = fact.unknown_slot().name()))]
pub fn judge(fact: &TaskFact, raw_input: &str) -> Option<Judgement> {
  let expected = expected_value(fact)?;
  let parsed_value = parse_answer(raw_input)?;
  Some(Judgement {
    is_correct: parsed_value == expected.value,
    parsed_value,
    expected_value: expected.value,
  })
}

/// Count WARN events emitted while `f` runs on this thread.
#[cfg(test)]
pub(crate) fn count_warnings(f: impl FnOnce()) -> usize {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use tracing_subscriber::layer::{Context, SubscriberExt};

  struct Counter(Arc<AtomicUsize>);

  impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Counter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
      if *event.metadata().level() == tracing::Level::WARN {
        self.0.fetch_add(1, Ordering::SeqCst);
      }
    }
  }

  let hits = Arc::new(AtomicUsize::new(0));
  let subscriber = tracing_subscriber::registry().with(Counter(hits.clone()));
  tracing::subscriber::with_default(subscriber, f);
  hits.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Operator;

  #[test]
  fn result_slot_compares_against_declared_result() {
    let f = TaskFact::new(6, 4, Operator::Add, 10, Slot::Result);
    assert!(judge(&f, "10").unwrap().is_correct);
    assert!(!judge(&f, "9").unwrap().is_correct);

    // Declared result wins even when it disagrees with the arithmetic.
    let off = TaskFact::new(6, 4, Operator::Add, 11, Slot::Result);
    assert!(judge(&off, "11").unwrap().is_correct);
    assert!(!judge(&off, "10").unwrap().is_correct);
  }

  #[test]
  fn operand_slot_uses_stored_operand_even_if_inconsistent() {
    let f = TaskFact::new(8, 3, Operator::Add, 12, Slot::Operand2);
    let expected = expected_value(&f).unwrap();
    assert_eq!(expected.value, 3);
    assert!(expected.warning.is_some());
    assert!(judge(&f, "3").unwrap().is_correct);
    assert!(!judge(&f, "4").unwrap().is_correct);

    let g = TaskFact::new(9, 4, Operator::Subtract, 5, Slot::Operand1);
    let expected = expected_value(&g).unwrap();
    assert_eq!(expected.value, 9);
    assert!(expected.warning.is_none());
  }

  #[test]
  fn expected_value_is_stable() {
    let f = TaskFact::new(7, 5, Operator::Subtract, 2, Slot::Operand2);
    assert_eq!(expected_value(&f), expected_value(&f));
  }

  #[test]
  fn malformed_or_partial_input_is_ignored() {
    let f = TaskFact::new(6, 4, Operator::Add, 10, Slot::Result);
    for raw in ["", "   ", "-3", "1a", "+4", "3.0", "ten"] {
      assert!(judge(&f, raw).is_none(), "{raw:?} should be ignored");
    }
    assert_eq!(judge(&f, " 10 ").unwrap().parsed_value, 10);
  }

  #[test]
  fn judging_does_not_repeat_the_integrity_warning() {
    let f = TaskFact::new(8, 3, Operator::Add, 12, Slot::Operand2);
    let warned = count_warnings(|| {
      assert!(expected_value(&f).and_then(|e| e.warning).is_some());
      judge(&f, "3");
      judge(&f, "4");
    });
    assert_eq!(warned, 0);
    assert_eq!(count_warnings(|| { integrity_check(&f); }), 1);
  }

  #[test]
  fn worked_example_has_nothing_to_judge() {
    let f = TaskFact::new(6, 4, Operator::Add, 10, Slot::None);
    assert!(expected_value(&f).is_none());
    assert!(judge(&f, "10").is_none());
  }
}
