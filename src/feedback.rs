//! Feedback state machine for the placeholder flow.
//!
//! ```text
//! Solving --submit(correct)-->   CorrectPendingAdvance --800ms--> Advanced
//! Solving --submit(incorrect)--> IncorrectBlocked --confirm-->    Advanced
//! any     --replace_task-->      Solving
//! ```
//!
//! The machine does no I/O and owns no timers. It stores deadlines in the
//! state they belong to and the driver asks `next_deadline()` before every
//! wait, so replacing the task drops the deadline with the state. The
//! confirm binding is likewise owned by `IncorrectBlocked` and removed on
//! every exit from it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::domain::{Slot, TaskFact, TaskId};
use crate::evaluate::{self, FactIntegrityWarning};
use crate::keys::{Key, KeyHub, Subscription};
use crate::steplog::{task_shown_details, Advance, AnswerAttempt, Outcome, StepAction, StepLog};

pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(800);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Solving,
  CorrectPendingAdvance,
  IncorrectBlocked,
  /// Advance was emitted; waiting for the caller's next task.
  Advanced,
}

/// Blocking comparison shown after a wrong answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Comparison {
  pub typed: String,
  pub correct: String,
  pub answer: i64,
  pub expected: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
  /// Empty, partial or non-numeric input.
  Malformed,
  /// Worked example, no slot to answer.
  NothingToAnswer,
  /// Not in `Solving`.
  InputLocked,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
  Ignored(IgnoreReason),
  Correct { advance_at: Instant },
  Incorrect(Comparison),
}

#[derive(Debug)]
enum State {
  Solving,
  CorrectPendingAdvance { advance_at: Instant, attempt: AnswerAttempt },
  IncorrectBlocked { attempt: AnswerAttempt, comparison: Comparison, ack: Subscription },
  Advanced,
}

/// What a state held when it was left.
enum Left {
  Nothing,
  PendingAdvance(AnswerAttempt),
  Blocked(AnswerAttempt),
}

#[derive(Debug)]
pub struct FeedbackMachine {
  task_id: TaskId,
  fact: TaskFact,
  state: State,
  input: String,
  log: StepLog,
  keys: KeyHub,
  integrity: Option<FactIntegrityWarning>,
}

impl FeedbackMachine {
  pub fn new(fact: TaskFact) -> Self {
    let mut m = Self {
      task_id: TaskId::new(),
      fact: fact.clone(),
      state: State::Solving,
      input: String::new(),
      log: StepLog::new(),
      keys: KeyHub::new(),
      integrity: None,
    };
    m.load(fact);
    m
  }

  /// Install a new task. Whatever the old task was doing is dropped: its
  /// pending advance, its confirm binding and the typed input.
  #[instrument(level = "debug", target = "engine", skip(self, fact), fields(old_task = %self.task_id))]
  pub fn replace_task(&mut self, fact: TaskFact) -> TaskId {
    let old = self.leave_state();
    if matches!(old, Left::PendingAdvance(_)) {
      info!(target: "engine", task = %self.task_id, "pending auto-advance cancelled by task replacement");
    }
    self.load(fact);
    self.task_id
  }

  fn load(&mut self, fact: TaskFact) {
    self.task_id = TaskId::new();
    self.integrity = evaluate::integrity_check(&fact);
    self.fact = fact;
    self.state = State::Solving;
    self.input.clear();
    self.log = StepLog::new();
    self.log.push(StepAction::TaskShown, task_shown_details(self.task_id, &self.fact));
    debug!(target: "engine", task = %self.task_id, equation = %self.fact.masked(), "task shown");
  }

  /// Leave the current state, tearing down everything it owns.
  fn leave_state(&mut self) -> Left {
    match std::mem::replace(&mut self.state, State::Solving) {
      State::Solving | State::Advanced => Left::Nothing,
      State::CorrectPendingAdvance { attempt, .. } => Left::PendingAdvance(attempt),
      State::IncorrectBlocked { attempt, ack, .. } => {
        self.keys.unsubscribe(ack);
        Left::Blocked(attempt)
      }
    }
  }

  pub fn task_id(&self) -> TaskId { self.task_id }
  pub fn fact(&self) -> &TaskFact { &self.fact }
  pub fn input(&self) -> &str { &self.input }
  pub fn step_log(&self) -> &StepLog { &self.log }
  pub fn integrity_warning(&self) -> Option<&FactIntegrityWarning> { self.integrity.as_ref() }
  pub fn key_bindings(&self) -> usize { self.keys.active() }

  pub fn phase(&self) -> Phase {
    match self.state {
      State::Solving => Phase::Solving,
      State::CorrectPendingAdvance { .. } => Phase::CorrectPendingAdvance,
      State::IncorrectBlocked { .. } => Phase::IncorrectBlocked,
      State::Advanced => Phase::Advanced,
    }
  }

  pub fn comparison(&self) -> Option<&Comparison> {
    match &self.state {
      State::IncorrectBlocked { comparison, .. } => Some(comparison),
      _ => None,
    }
  }

  pub fn accepts_input(&self) -> bool {
    matches!(self.state, State::Solving) && self.fact.unknown_slot() != Slot::None
  }

  /// Typing. Ignored once the answer has been judged.
  pub fn set_input(&mut self, raw: &str) -> bool {
    if !self.accepts_input() {
      return false;
    }
    self.input = raw.to_string();
    true
  }

  #[instrument(level = "debug", target = "engine", skip(self, now), fields(task = %self.task_id))]
  pub fn submit(&mut self, now: Instant) -> SubmitOutcome {
    if !matches!(self.state, State::Solving) {
      return SubmitOutcome::Ignored(IgnoreReason::InputLocked);
    }
    let slot = self.fact.unknown_slot();
    if slot == Slot::None {
      return SubmitOutcome::Ignored(IgnoreReason::NothingToAnswer);
    }
    let Some(judgement) = evaluate::judge(&self.fact, &self.input) else {
      return SubmitOutcome::Ignored(IgnoreReason::Malformed);
    };

    let attempt = AnswerAttempt::new(&self.input, slot, &judgement);
    self.log.push(
      StepAction::SubmitAnswer,
      json!({ "raw_input": attempt.raw_input, "slot": slot.name() }),
    );

    if judgement.is_correct {
      self.log.push(StepAction::CorrectAnswer, json!({ "answer": judgement.parsed_value, "slot": slot.name() }));
      let advance_at = now + AUTO_ADVANCE_DELAY;
      info!(target: "engine", task = %self.task_id, answer = judgement.parsed_value, "correct answer; auto-advance armed");
      self.state = State::CorrectPendingAdvance { advance_at, attempt };
      SubmitOutcome::Correct { advance_at }
    } else {
      self.log.push(
        StepAction::IncorrectAnswer,
        json!({
          "answer": judgement.parsed_value,
          "expected": judgement.expected_value,
          "slot": slot.name(),
        }),
      );
      let comparison = Comparison {
        typed: fill_slot(&self.fact, slot, judgement.parsed_value),
        correct: self.fact.to_string(),
        answer: judgement.parsed_value,
        expected: judgement.expected_value,
      };
      let ack = self.keys.subscribe(Key::Confirm, self.task_id);
      info!(
        target: "engine",
        task = %self.task_id,
        answer = judgement.parsed_value,
        expected = judgement.expected_value,
        "incorrect answer; waiting for acknowledgment"
      );
      self.state = State::IncorrectBlocked { attempt, comparison: comparison.clone(), ack };
      SubmitOutcome::Incorrect(comparison)
    }
  }

  /// Pending auto-advance deadline of the live task, if any.
  pub fn next_deadline(&self) -> Option<Instant> {
    match self.state {
      State::CorrectPendingAdvance { advance_at, .. } => Some(advance_at),
      _ => None,
    }
  }

  /// Fire the auto-advance if its deadline has passed.
  pub fn on_timer(&mut self, now: Instant) -> Option<Advance> {
    match self.next_deadline() {
      Some(at) if now >= at => {}
      _ => return None,
    }
    let Left::PendingAdvance(attempt) = self.leave_state() else {
      return None;
    };
    Some(self.finish(Outcome::Correct, &attempt))
  }

  /// A session-wide key press, regardless of focus.
  pub fn key(&mut self, key: Key) -> Option<Advance> {
    let bound_task = self.keys.dispatch(key)?;
    debug_assert_eq!(bound_task, self.task_id, "key binding outlived its task");
    if bound_task != self.task_id || key != Key::Confirm {
      return None;
    }
    let Left::Blocked(attempt) = self.leave_state() else {
      return None;
    };
    self.log.push(StepAction::Acknowledged, json!({ "answer": attempt.parsed_value }));
    Some(self.finish(Outcome::AcknowledgedIncorrect, &attempt))
  }

  fn finish(&mut self, outcome: Outcome, attempt: &AnswerAttempt) -> Advance {
    self.state = State::Advanced;
    info!(target: "engine", task = %self.task_id, ?outcome, "advance");
    Advance::new(self.task_id, &self.fact, outcome, attempt.answer(), self.log.take())
  }
}

/// Equation text with `value` written into `slot`.
fn fill_slot(fact: &TaskFact, slot: Slot, value: i64) -> String {
  let pick = |s: Slot, own: i64| if s == slot { value } else { own };
  format!(
    "{} {} {} = {}",
    pick(Slot::Operand1, i64::from(fact.operand1())),
    fact.operator().symbol(),
    pick(Slot::Operand2, i64::from(fact.operand2())),
    pick(Slot::Result, fact.declared_result()),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Operator;

  fn six_plus_four() -> TaskFact { TaskFact::new(6, 4, Operator::Add, 10, Slot::Result) }

  #[test]
  fn correct_answer_locks_input_and_arms_timer() {
    let now = Instant::now();
    let mut m = FeedbackMachine::new(six_plus_four());
    m.set_input("10");
    assert_eq!(m.submit(now), SubmitOutcome::Correct { advance_at: now + AUTO_ADVANCE_DELAY });
    assert_eq!(m.phase(), Phase::CorrectPendingAdvance);
    assert!(!m.set_input("11"));
    assert_eq!(m.submit(now), SubmitOutcome::Ignored(IgnoreReason::InputLocked));

    assert!(m.on_timer(now + Duration::from_millis(799)).is_none());
    let adv = m.on_timer(now + AUTO_ADVANCE_DELAY).unwrap();
    assert_eq!(adv.outcome, Outcome::Correct);
    assert_eq!(adv.answer.get("result"), Some(&10));
    assert_eq!(
      adv.step_log.actions(),
      vec![StepAction::TaskShown, StepAction::SubmitAnswer, StepAction::CorrectAnswer]
    );
    assert_eq!(m.phase(), Phase::Advanced);
    assert!(m.on_timer(now + Duration::from_secs(5)).is_none());
  }

  #[test]
  fn incorrect_answer_blocks_until_confirm() {
    let now = Instant::now();
    let mut m = FeedbackMachine::new(six_plus_four());
    m.set_input("9");
    let SubmitOutcome::Incorrect(cmp) = m.submit(now) else { panic!("expected incorrect") };
    assert_eq!(cmp.typed, "6 + 4 = 9");
    assert_eq!(cmp.correct, "6 + 4 = 10");
    assert_eq!(m.phase(), Phase::IncorrectBlocked);
    assert_eq!(m.input(), "9", "input is not cleared");
    assert_eq!(m.next_deadline(), None, "no timeout advance");
    assert_eq!(m.key_bindings(), 1);

    m.set_input("10");
    assert_eq!(m.submit(now), SubmitOutcome::Ignored(IgnoreReason::InputLocked));
    assert!(m.key(Key::Escape).is_none());

    let adv = m.key(Key::Confirm).unwrap();
    assert_eq!(adv.outcome, Outcome::AcknowledgedIncorrect);
    assert_eq!(adv.answer.get("result"), Some(&9));
    let incorrect = &adv.step_log.entries()[2];
    assert_eq!(incorrect.action, StepAction::IncorrectAnswer);
    assert_eq!(incorrect.details["expected"], 10);
    assert_eq!(incorrect.details["answer"], 9);
    assert_eq!(m.key_bindings(), 0);
    assert!(m.key(Key::Confirm).is_none());
  }

  #[test]
  fn malformed_input_changes_nothing() {
    let mut m = FeedbackMachine::new(six_plus_four());
    for raw in ["", "1x", "-"] {
      m.set_input(raw);
      assert_eq!(m.submit(Instant::now()), SubmitOutcome::Ignored(IgnoreReason::Malformed));
    }
    assert_eq!(m.phase(), Phase::Solving);
    assert_eq!(m.step_log().actions(), vec![StepAction::TaskShown]);
  }

  #[test]
  fn replacing_task_cancels_pending_advance() {
    let now = Instant::now();
    let mut m = FeedbackMachine::new(six_plus_four());
    let first = m.task_id();
    m.set_input("10");
    m.submit(now);
    let second = m.replace_task(TaskFact::new(3, 2, Operator::Add, 5, Slot::Result));
    assert_ne!(first, second);
    assert_eq!(m.phase(), Phase::Solving);
    assert_eq!(m.input(), "");
    assert_eq!(m.next_deadline(), None);
    assert!(m.on_timer(now + Duration::from_secs(1)).is_none());
    assert_eq!(m.step_log().actions(), vec![StepAction::TaskShown]);
  }

  #[test]
  fn replacing_task_removes_confirm_binding() {
    let mut m = FeedbackMachine::new(six_plus_four());
    m.set_input("9");
    m.submit(Instant::now());
    assert_eq!(m.key_bindings(), 1);
    m.replace_task(six_plus_four());
    assert_eq!(m.key_bindings(), 0);
    assert!(m.key(Key::Confirm).is_none());
    assert_eq!(m.phase(), Phase::Solving);
  }

  #[test]
  fn operand_task_scores_against_stored_operand() {
    let mut m = FeedbackMachine::new(TaskFact::new(8, 3, Operator::Add, 12, Slot::Operand2));
    assert!(m.integrity_warning().is_some());
    m.set_input("3");
    assert!(matches!(m.submit(Instant::now()), SubmitOutcome::Correct { .. }));
  }

  #[test]
  fn inconsistent_fact_warns_once_per_task() {
    let warned = evaluate::count_warnings(|| {
      let mut m = FeedbackMachine::new(TaskFact::new(8, 3, Operator::Add, 12, Slot::Operand2));
      for raw in ["4", "3"] {
        m.replace_task(TaskFact::new(8, 3, Operator::Add, 12, Slot::Operand2));
        m.set_input(raw);
        m.submit(Instant::now());
      }
    });
    // One for the first task, one for each replacement.
    assert_eq!(warned, 3);
  }

  #[test]
  fn worked_example_takes_no_input() {
    let mut m = FeedbackMachine::new(TaskFact::new(6, 4, Operator::Add, 10, Slot::None));
    assert!(!m.set_input("10"));
    assert_eq!(m.submit(Instant::now()), SubmitOutcome::Ignored(IgnoreReason::NothingToAnswer));
  }
}
