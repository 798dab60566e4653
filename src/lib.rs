//! Arithmetic trainer engine: answer validation for a task with one hidden
//! slot, the visual-aid policy and shared unit coloring, the feedback state
//! machine with its equation-entry alternative, and the Axum shell that runs
//! one training session per WebSocket.

pub mod config;
pub mod domain;
pub mod equation;
pub mod error;
pub mod evaluate;
pub mod feedback;
pub mod keys;
pub mod logic;
pub mod policy;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod session;
pub mod state;
pub mod steplog;
pub mod sync;
pub mod telemetry;

pub use domain::{Operator, RangeTier, Slot, TaskFact, TaskFactIn, TaskId};
pub use feedback::{FeedbackMachine, Phase};
pub use equation::EquationEntry;
pub use session::{Command, Session, SessionEvent, SessionView, TrainingMode};
pub use steplog::{Advance, Outcome, StepLog};
