//! Which visual aids are shown for a task and whether they may show the
//! numeric value of the hidden slot.
//!
//! Finger and counter aids are only valid inside the subitizing range
//! (max magnitude ≤ 20). Above it a hundred-field, a scaled number line and
//! place-value bars take over. The magnitude rule always wins over the
//! session's aid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{RangeTier, Slot, TaskFact};
use crate::feedback::Phase;

pub const SUBITIZING_LIMIT: i64 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
  TwentyFrame,
  HundredField,
  NumberLine,
  Counters,
  Fingers,
  PlaceValue,
  Symbolic,
}

impl Representation {
  pub const ALL: [Representation; 7] = [
    Representation::TwentyFrame,
    Representation::HundredField,
    Representation::NumberLine,
    Representation::Counters,
    Representation::Fingers,
    Representation::PlaceValue,
    Representation::Symbolic,
  ];
}

/// Per-session aid toggles supplied by the caller.
///
/// `field` covers the twenty-frame and its larger hundred-field variant.
/// Place-value bars replace counters above the subitizing range and follow
/// the `counters` toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AidConfig {
  pub field: bool,
  pub number_line: bool,
  pub counters: bool,
  pub fingers: bool,
  pub symbolic: bool,
}

impl Default for AidConfig {
  fn default() -> Self {
    Self { field: true, number_line: true, counters: true, fingers: true, symbolic: true }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Visibility {
  pub enabled: bool,
  pub reveal_solution: bool,
  /// Units drawn (field cells, number-line end) where that applies.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub scale: Option<u32>,
}

pub type VisibilityMap = BTreeMap<Representation, Visibility>;

/// Reveal rule shared by every enabled aid.
pub fn reveal_allowed(slot: Slot, phase: Phase) -> bool {
  match slot {
    // Shapes may be drawn, but the number itself is never printed.
    Slot::Operand1 | Slot::Operand2 => false,
    Slot::Result => phase == Phase::CorrectPendingAdvance,
    Slot::None => true,
  }
}

/// Aid visibility for the placeholder flow.
pub fn visibility(fact: &TaskFact, config: &AidConfig, phase: Phase) -> VisibilityMap {
  build(fact, config, reveal_allowed(fact.unknown_slot(), phase))
}

/// Aid visibility once an entire equation has been confirmed, so every
/// enabled aid may show every number.
pub fn visibility_revealed(fact: &TaskFact, config: &AidConfig) -> VisibilityMap {
  build(fact, config, true)
}

fn build(fact: &TaskFact, config: &AidConfig, reveal: bool) -> VisibilityMap {
  let small = fact.max_magnitude() <= SUBITIZING_LIMIT;
  let tier = fact.range_tier();

  Representation::ALL
    .iter()
    .map(|&rep| {
      let (enabled, scale) = match rep {
        Representation::TwentyFrame => (small && config.field, Some(RangeTier::Tier20.limit())),
        Representation::HundredField => (!small && config.field, Some(tier.limit())),
        Representation::NumberLine => (config.number_line, Some(tier.limit())),
        Representation::Counters => (small && config.counters, None),
        Representation::Fingers => (small && config.fingers, None),
        Representation::PlaceValue => (!small && config.counters, None),
        Representation::Symbolic => (config.symbolic, None),
      };
      let vis = Visibility { enabled, reveal_solution: enabled && reveal, scale: if enabled { scale } else { None } };
      (rep, vis)
    })
    .collect()
}

pub fn enabled(map: &VisibilityMap) -> Vec<Representation> {
  map.iter().filter(|(_, v)| v.enabled).map(|(r, _)| *r).collect()
}
