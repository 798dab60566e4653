//! End-to-end runs through the session driver with a paused clock, so the
//! 800 ms auto-advance and the 2 s equation clear are exact.

use std::time::Duration;

use mathtrainer_backend::equation::{EquationField, EquationPhase};
use mathtrainer_backend::keys::Key;
use mathtrainer_backend::policy::AidConfig;
use mathtrainer_backend::session::{run, Command, Session, SessionEvent, SessionView, TrainingMode};
use mathtrainer_backend::{Advance, Operator, Outcome, Phase, Slot, TaskFact};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

struct Harness {
  cmds: mpsc::Sender<Command>,
  events: mpsc::Receiver<SessionEvent>,
  driver: JoinHandle<()>,
}

impl Harness {
  fn start(mode: TrainingMode) -> Self {
    let (cmds, cmd_rx) = mpsc::channel(16);
    let (ev_tx, events) = mpsc::channel(16);
    let driver = tokio::spawn(run(Session::new(mode, AidConfig::default()), cmd_rx, ev_tx));
    Self { cmds, events, driver }
  }

  async fn send(&self, cmd: Command) {
    self.cmds.send(cmd).await.unwrap();
  }

  async fn next(&mut self) -> SessionEvent {
    timeout(Duration::from_secs(30), self.events.recv()).await.expect("no event").expect("driver ended")
  }

  async fn view(&mut self) -> SessionView {
    match self.next().await {
      SessionEvent::View(v) => *v,
      other => panic!("expected view, got {other:?}"),
    }
  }

  async fn advance(&mut self) -> Advance {
    match self.next().await {
      SessionEvent::Advance(a) => *a,
      other => panic!("expected advance, got {other:?}"),
    }
  }

  /// Nothing arrives for `d` of (virtual) time.
  async fn quiet_for(&mut self, d: Duration) {
    if let Ok(ev) = timeout(d, self.events.recv()).await {
      panic!("unexpected event {ev:?}");
    }
  }

  async fn shutdown(self) {
    drop(self.cmds);
    self.driver.await.unwrap();
  }
}

fn standard_phase(v: &SessionView) -> Phase {
  match v {
    SessionView::Standard { phase, .. } => *phase,
    SessionView::Blind { .. } => panic!("expected standard view"),
  }
}

async fn answer(h: &mut Harness, fact: TaskFact, input: &str) -> SessionView {
  h.send(Command::NewTask(fact)).await;
  assert_eq!(standard_phase(&h.view().await), Phase::Solving);
  h.send(Command::Input(input.into())).await;
  h.view().await;
  h.send(Command::Submit).await;
  h.view().await
}

#[tokio::test(start_paused = true)]
async fn correct_answer_advances_once_after_800ms() {
  let mut h = Harness::start(TrainingMode::Standard);
  let submitted = Instant::now();
  let view = answer(&mut h, TaskFact::new(6, 4, Operator::Add, 10, Slot::Result), "10").await;
  assert_eq!(standard_phase(&view), Phase::CorrectPendingAdvance);
  if let SessionView::Standard { accepts_input, visibility, .. } = &view {
    assert!(!accepts_input);
    assert!(visibility.values().filter(|v| v.enabled).all(|v| v.reveal_solution));
  }

  let adv = h.advance().await;
  assert!(submitted.elapsed() >= Duration::from_millis(800));
  assert_eq!(adv.outcome, Outcome::Correct);
  assert_eq!(adv.answer.get("result"), Some(&10));
  assert_eq!(standard_phase(&h.view().await), Phase::Advanced);

  h.quiet_for(Duration::from_secs(10)).await;
  h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn incorrect_answer_waits_for_confirm() {
  let mut h = Harness::start(TrainingMode::Standard);
  let view = answer(&mut h, TaskFact::new(6, 4, Operator::Add, 10, Slot::Result), "9").await;
  assert_eq!(standard_phase(&view), Phase::IncorrectBlocked);
  if let SessionView::Standard { comparison, input, .. } = &view {
    let cmp = comparison.as_ref().unwrap();
    assert_eq!(cmp.typed, "6 + 4 = 9");
    assert_eq!(cmp.correct, "6 + 4 = 10");
    assert_eq!(input, "9");
  }

  // No timeout-driven advance, however long the learner looks at it.
  h.quiet_for(Duration::from_secs(60)).await;

  h.send(Command::Key(Key::Confirm)).await;
  let adv = h.advance().await;
  assert_eq!(adv.outcome, Outcome::AcknowledgedIncorrect);
  assert_eq!(adv.answer.get("result"), Some(&9));
  assert_eq!(standard_phase(&h.view().await), Phase::Advanced);
  h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn missing_operand_is_scored_against_stored_operand() {
  let mut h = Harness::start(TrainingMode::Standard);
  // Declared result disagrees with 8 + 3 on purpose.
  let view = answer(&mut h, TaskFact::new(8, 3, Operator::Add, 12, Slot::Operand2), "3").await;
  assert_eq!(standard_phase(&view), Phase::CorrectPendingAdvance);
  if let SessionView::Standard { integrity_warning, visibility, .. } = &view {
    assert!(integrity_warning.is_some());
    assert!(visibility.values().all(|v| !v.reveal_solution));
  }
  let adv = h.advance().await;
  assert_eq!(adv.answer.get("operand2"), Some(&3));
  h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn replacing_task_cancels_pending_advance() {
  let mut h = Harness::start(TrainingMode::Standard);
  let view = answer(&mut h, TaskFact::new(6, 4, Operator::Add, 10, Slot::Result), "10").await;
  assert_eq!(standard_phase(&view), Phase::CorrectPendingAdvance);

  h.send(Command::NewTask(TaskFact::new(3, 2, Operator::Add, 5, Slot::Result))).await;
  let view = h.view().await;
  assert_eq!(standard_phase(&view), Phase::Solving);
  if let SessionView::Standard { input, equation, .. } = &view {
    assert_eq!(input, "");
    assert_eq!(equation, "3 + 2 = _");
  }
  h.quiet_for(Duration::from_secs(5)).await;
  h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_submit_emits_nothing() {
  let mut h = Harness::start(TrainingMode::Standard);
  h.send(Command::NewTask(TaskFact::new(6, 4, Operator::Add, 10, Slot::Result))).await;
  h.view().await;
  h.send(Command::Input("1".into())).await;
  h.view().await;
  h.send(Command::Input("".into())).await;
  h.view().await;
  h.send(Command::Submit).await;
  h.quiet_for(Duration::from_secs(2)).await;
  h.shutdown().await;
}

async fn type_equation(h: &mut Harness, a: &str, op: &str, b: &str, r: &str) {
  for (field, text) in [
    (EquationField::Operand1, a),
    (EquationField::Operator, op),
    (EquationField::Operand2, b),
    (EquationField::Result, r),
  ] {
    h.send(Command::EquationField { field, text: text.into() }).await;
    h.view().await;
  }
}

#[tokio::test(start_paused = true)]
async fn equation_entry_correct_then_continue() {
  let mut h = Harness::start(TrainingMode::Blind);
  h.send(Command::NewTask(TaskFact::new(7, 2, Operator::Add, 9, Slot::Result))).await;
  h.view().await;
  type_equation(&mut h, "7", "+", "2", "9").await;
  h.send(Command::CheckEquation).await;
  match h.view().await {
    SessionView::Blind { phase, visibility, aids, .. } => {
      assert_eq!(phase, EquationPhase::Solved);
      let vis = visibility.unwrap();
      assert!(vis.values().filter(|v| v.enabled).all(|v| v.reveal_solution));
      assert!(!aids.is_empty());
    }
    SessionView::Standard { .. } => panic!("expected blind view"),
  }
  h.quiet_for(Duration::from_secs(5)).await;

  h.send(Command::Continue).await;
  let adv = h.advance().await;
  assert_eq!(adv.outcome, Outcome::Correct);
  assert_eq!(adv.answer.get("operand1"), Some(&7));
  h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn equation_entry_wrong_clears_after_two_seconds() {
  let mut h = Harness::start(TrainingMode::Blind);
  h.send(Command::NewTask(TaskFact::new(7, 2, Operator::Add, 9, Slot::Result))).await;
  h.view().await;
  type_equation(&mut h, "7", "+", "3", "9").await;

  let checked = Instant::now();
  h.send(Command::CheckEquation).await;
  match h.view().await {
    SessionView::Blind { phase, message, visibility, .. } => {
      assert_eq!(phase, EquationPhase::Rejected);
      assert!(message.is_some());
      assert!(visibility.is_none());
    }
    SessionView::Standard { .. } => panic!("expected blind view"),
  }

  match h.view().await {
    SessionView::Blind { phase, fields, message, .. } => {
      assert!(checked.elapsed() >= Duration::from_secs(2));
      assert_eq!(phase, EquationPhase::Editing);
      assert!(fields.operand1.is_empty() && fields.result.is_empty());
      assert!(message.is_none());
    }
    SessionView::Standard { .. } => panic!("expected blind view"),
  }
  h.quiet_for(Duration::from_secs(5)).await;
  h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn wrong_mode_commands_are_reported() {
  let mut h = Harness::start(TrainingMode::Blind);
  h.send(Command::Submit).await;
  assert!(matches!(h.next().await, SessionEvent::Error(_)));
  h.send(Command::NewTask(TaskFact::new(7, 2, Operator::Add, 9, Slot::Result))).await;
  h.view().await;
  h.send(Command::Submit).await;
  match h.next().await {
    SessionEvent::Error(msg) => assert!(msg.contains("blind")),
    other => panic!("expected error, got {other:?}"),
  }
  h.shutdown().await;
}
