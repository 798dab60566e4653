//! Application state: the task bank, session defaults, and the in-memory
//! progress store that receives advances.
//!
//! This module owns:
//!   - the task bank (by difficulty) built from config + built-in seeds
//!   - last-served index per difficulty, to avoid immediate repeats
//!   - recorded advances per session

use std::{collections::HashMap, sync::Arc};

use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::{load_app_config_from_env, AppConfig, SessionDefaults};
use crate::domain::TaskFact;
use crate::error::TrackerError;
use crate::seeds::{hard_fallback_task, seed_tasks};
use crate::steplog::Advance;

#[derive(Clone)]
pub struct AppState {
  pub by_diff: Arc<HashMap<String, Vec<TaskFact>>>,
  pub last_by_diff: Arc<RwLock<HashMap<String, usize>>>,
  pub progress: Arc<RwLock<HashMap<String, Vec<Advance>>>>,
  pub session_defaults: SessionDefaults,
}

impl AppState {
  /// Build state from env: load config, merge the bank with seeds.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    Self::from_config(load_app_config_from_env().unwrap_or_default())
  }

  pub fn from_config(cfg: AppConfig) -> Self {
    let mut diff_map = HashMap::<String, Vec<TaskFact>>::new();

    for tc in cfg.tasks {
      let diff = tc.difficulty.clone();
      match TaskFact::try_from(tc.task) {
        Ok(fact) => diff_map.entry(diff).or_default().push(fact),
        Err(e) => {
          error!(target: "task_bank", %diff, error = %e, "Skipping bank item");
        }
      }
    }

    for (diff, fact) in seed_tasks() {
      diff_map.entry(diff).or_default().push(fact);
    }

    for (diff, tasks) in &diff_map {
      info!(target: "task_bank", %diff, count = tasks.len(), "Startup task inventory");
    }

    Self {
      by_diff: Arc::new(diff_map),
      last_by_diff: Arc::new(RwLock::new(HashMap::new())),
      progress: Arc::new(RwLock::new(HashMap::new())),
      session_defaults: cfg.session,
    }
  }

  /// Selection policy: a random bank task for the difficulty that differs
  /// from the last one served, else the hard fallback.
  #[instrument(level = "info", skip(self), fields(%difficulty))]
  pub async fn choose_task(&self, difficulty: &str) -> (TaskFact, &'static str) {
    if let Some(tasks) = self.by_diff.get(difficulty).filter(|t| !t.is_empty()) {
      let last = { self.last_by_diff.read().await.get(difficulty).copied() };
      let candidates: Vec<usize> = (0..tasks.len()).filter(|i| tasks.len() == 1 || Some(*i) != last).collect();
      let chosen = candidates.choose(&mut rand::thread_rng()).copied().unwrap_or(0);
      self.last_by_diff.write().await.insert(difficulty.to_string(), chosen);
      info!(target: "task_bank", %difficulty, chosen, source = "bank", "Serving bank task");
      return (tasks[chosen].clone(), "bank");
    }

    warn!(target: "task_bank", %difficulty, source = "hard_fallback", "No task for difficulty; serving hard fallback");
    (hard_fallback_task(), "hard_fallback")
  }

  /// Store an advance. Each task may advance once.
  #[instrument(level = "debug", skip(self, adv), fields(%session_id, task = %adv.task_id))]
  pub async fn record_advance(&self, session_id: &str, adv: Advance) -> Result<(), TrackerError> {
    let mut progress = self.progress.write().await;
    let entries = progress.entry(session_id.to_string()).or_default();
    if entries.iter().any(|a| a.task_id == adv.task_id) {
      return Err(TrackerError::Rejected { task_id: adv.task_id.to_string(), reason: "task already advanced".into() });
    }
    entries.push(adv);
    Ok(())
  }

  pub async fn progress_for(&self, session_id: &str) -> Vec<Advance> {
    self.progress.read().await.get(session_id).cloned().unwrap_or_default()
  }
}

impl Default for AppState {
  fn default() -> Self { Self::from_config(AppConfig::default()) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Slot, TaskId};
  use crate::steplog::{Outcome, StepLog};
  use std::collections::BTreeMap;

  #[tokio::test]
  async fn serves_seed_tasks_by_tier() {
    let state = AppState::default();
    let (fact, source) = state.choose_task("tier20").await;
    assert_eq!(source, "bank");
    assert!(fact.max_magnitude() <= 20);

    let (_, source) = state.choose_task("nope").await;
    assert_eq!(source, "hard_fallback");
  }

  #[tokio::test]
  async fn does_not_repeat_last_task() {
    let state = AppState::default();
    let (a, _) = state.choose_task("tier200").await;
    let (b, _) = state.choose_task("tier200").await;
    assert_ne!(a, b);
  }

  #[tokio::test]
  async fn second_advance_for_same_task_is_rejected() {
    let state = AppState::default();
    let fact = TaskFact::new(6, 4, crate::domain::Operator::Add, 10, Slot::Result);
    let adv = Advance::new(TaskId::new(), &fact, Outcome::Correct, BTreeMap::from([("result".to_string(), 10)]), StepLog::new());
    state.record_advance("s1", adv.clone()).await.unwrap();
    assert!(state.record_advance("s1", adv).await.is_err());
    assert_eq!(state.progress_for("s1").await.len(), 1);
    assert!(state.progress_for("s2").await.is_empty());
  }
}
