//! Session-wide key bindings.
//!
//! A binding fires no matter which input currently has focus. Bindings are
//! scoped to the task that created them and must be removed explicitly when
//! that task's state is left.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::TaskId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
  Confirm,
  Escape,
  Other,
}

impl Key {
  /// Map a browser key name onto the keys the engine cares about.
  pub fn from_name(name: &str) -> Key {
    match name {
      "Enter" | "enter" | "confirm" | "NumpadEnter" => Key::Confirm,
      "Escape" | "escape" => Key::Escape,
      _ => Key::Other,
    }
  }
}

/// Handle returned by `subscribe`; hand it back to `unsubscribe`.
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription {
  id: u64,
  task: TaskId,
}

impl Subscription {
  pub fn task(&self) -> TaskId { self.task }
}

#[derive(Debug)]
struct Binding {
  id: u64,
  key: Key,
  task: TaskId,
}

#[derive(Debug, Default)]
pub struct KeyHub {
  next_id: u64,
  bindings: Vec<Binding>,
}

impl KeyHub {
  pub fn new() -> Self { Self::default() }

  pub fn subscribe(&mut self, key: Key, task: TaskId) -> Subscription {
    self.next_id += 1;
    let id = self.next_id;
    self.bindings.push(Binding { id, key, task });
    debug!(target: "engine", id, ?key, %task, "key binding registered");
    Subscription { id, task }
  }

  pub fn unsubscribe(&mut self, sub: Subscription) {
    let before = self.bindings.len();
    self.bindings.retain(|b| b.id != sub.id);
    debug!(target: "engine", id = sub.id, task = %sub.task, removed = before - self.bindings.len(), "key binding removed");
  }

  /// Task whose binding claims this key, if any.
  pub fn dispatch(&self, key: Key) -> Option<TaskId> {
    self.bindings.iter().rev().find(|b| b.key == key).map(|b| b.task)
  }

  pub fn active(&self) -> usize { self.bindings.len() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn binding_lives_until_unsubscribed() {
    let mut hub = KeyHub::new();
    let task = TaskId::new();
    let sub = hub.subscribe(Key::Confirm, task);
    assert_eq!(hub.dispatch(Key::Confirm), Some(task));
    assert_eq!(hub.dispatch(Key::Escape), None);

    hub.unsubscribe(sub);
    assert_eq!(hub.active(), 0);
    assert_eq!(hub.dispatch(Key::Confirm), None);
  }

  #[test]
  fn key_names() {
    assert_eq!(Key::from_name("Enter"), Key::Confirm);
    assert_eq!(Key::from_name("Escape"), Key::Escape);
    assert_eq!(Key::from_name("a"), Key::Other);
  }
}
