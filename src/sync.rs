//! Shared unit coloring for every discrete visual aid.
//!
//! All aids ask one `Partition` for the mark of unit `i`; none of them
//! computes its own thresholds. Addition paints `[0, operand1)` as origin and
//! `[operand1, operand1 + operand2)` as delta. Subtraction paints
//! `[0, operand1)` as origin and overlays `[0, computed)` as remaining and
//! `[computed, operand1)` as removed.

use serde::Serialize;

use crate::domain::{Operator, RangeTier, Slot, TaskFact};
use crate::policy::{Representation, VisibilityMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Base {
  Origin,
  Delta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Overlay {
  Remaining,
  Removed,
}

/// Mark of one unit. An empty mark is an unused cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UnitMark {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub base: Option<Base>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub overlay: Option<Overlay>,
}

impl UnitMark {
  pub fn is_empty(&self) -> bool { self.base.is_none() && self.overlay.is_none() }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
  operator: Operator,
  origin_end: u32,
  delta_end: u32,
  remaining_end: u32,
}

impl Partition {
  pub fn of(fact: &TaskFact) -> Self {
    let a = fact.operand1();
    match fact.operator() {
      Operator::Add => Partition {
        operator: Operator::Add,
        origin_end: a,
        delta_end: a.saturating_add(fact.operand2()),
        remaining_end: 0,
      },
      Operator::Subtract => Partition {
        operator: Operator::Subtract,
        origin_end: a,
        delta_end: a,
        // Taking away more than is there leaves nothing remaining.
        remaining_end: u32::try_from(fact.computed_result().clamp(0, i64::from(a))).unwrap_or(0),
      },
    }
  }

  /// Number of units carrying a mark.
  pub fn extent(&self) -> u32 { self.delta_end }

  pub fn remaining_threshold(&self) -> u32 { self.remaining_end }

  pub fn mark(&self, i: u32) -> UnitMark {
    match self.operator {
      Operator::Add => {
        let base = if i < self.origin_end {
          Some(Base::Origin)
        } else if i < self.delta_end {
          Some(Base::Delta)
        } else {
          None
        };
        UnitMark { base, overlay: None }
      }
      Operator::Subtract => {
        if i >= self.origin_end {
          return UnitMark::default();
        }
        let overlay = if i < self.remaining_end { Overlay::Remaining } else { Overlay::Removed };
        UnitMark { base: Some(Base::Origin), overlay: Some(overlay) }
      }
    }
  }

  pub fn strip(&self, start: u32, len: u32) -> Vec<UnitMark> {
    (start..start.saturating_add(len)).map(|i| self.mark(i)).collect()
  }
}

/// Pack `n` units into dice faces (1..=6), deterministic for a given `n`.
///
/// Prefers equal faces (6 down to 2), then at least two equal faces plus one
/// remainder face, then greedy largest-first.
pub fn dice_faces(n: u32) -> Vec<u32> {
  if n == 0 {
    return Vec::new();
  }
  for face in (2..=6).rev() {
    if n % face == 0 {
      return vec![face; (n / face) as usize];
    }
  }
  for face in (2..=6).rev() {
    let (count, rest) = (n / face, n % face);
    if count >= 2 && rest > 0 {
      let mut faces = vec![face; count as usize];
      faces.push(rest);
      return faces;
    }
  }
  let mut faces = Vec::new();
  let mut left = n;
  while left > 0 {
    let face = left.min(6);
    faces.push(face);
    left -= face;
  }
  faces
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Die {
  pub face: u32,
  pub marks: Vec<UnitMark>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bar {
  /// 10 for a tens rod, 1 for a single unit.
  pub size: u32,
  pub marks: Vec<UnitMark>,
}

/// Start, signed jump and landing point. The one that stands for the hidden
/// slot is `None` until the solution may be revealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NumberLineModel {
  pub scale: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub start: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub jump: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub end: Option<i64>,
}

/// Rendered state of one enabled aid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "aid", rename_all = "snake_case")]
pub enum RenderedAid {
  TwentyFrame { rows: Vec<Vec<UnitMark>>, label: Option<i64> },
  HundredField { rows: Vec<Vec<UnitMark>>, label: Option<i64> },
  NumberLine { line: NumberLineModel, label: Option<i64> },
  Counters { dice: Vec<Die>, label: Option<i64> },
  Fingers { hands: Vec<Vec<UnitMark>>, label: Option<i64> },
  PlaceValue { bars: Vec<Bar>, label: Option<i64> },
  Symbolic { text: String },
}

/// Rows of ten covering at least `cells`, grown when the marked units run
/// past it (an inconsistent fact can compute beyond its tier).
fn rows_of_ten(p: &Partition, cells: u32) -> Vec<Vec<UnitMark>> {
  (0..cells.max(p.extent()).div_ceil(10)).map(|r| p.strip(r * 10, 10)).collect()
}

pub fn twenty_frame(p: &Partition) -> Vec<Vec<UnitMark>> {
  rows_of_ten(p, RangeTier::Tier20.limit())
}

pub fn hundred_field(p: &Partition, cells: u32) -> Vec<Vec<UnitMark>> {
  rows_of_ten(p, cells)
}

/// Counters packed as dice, one run for each operand that is drawn.
pub fn counters(fact: &TaskFact, p: &Partition) -> Vec<Die> {
  let mut runs = vec![fact.operand1()];
  if fact.operator() == Operator::Add {
    runs.push(fact.operand2());
  }
  let mut next = 0u32;
  let mut dice = Vec::new();
  for run in runs {
    for face in dice_faces(run) {
      dice.push(Die { face, marks: p.strip(next, face) });
      next += face;
    }
  }
  dice
}

/// Hands of five, as many as the marked units need (at least one).
pub fn fingers(p: &Partition) -> Vec<Vec<UnitMark>> {
  let hands = p.extent().div_ceil(5).max(1);
  (0..hands).map(|h| p.strip(h * 5, 5)).collect()
}

/// Tens rods first, then single units.
pub fn place_value(p: &Partition) -> Vec<Bar> {
  let extent = p.extent();
  let tens = extent / 10;
  let mut bars: Vec<Bar> = (0..tens).map(|t| Bar { size: 10, marks: p.strip(t * 10, 10) }).collect();
  bars.extend((tens * 10..extent).map(|i| Bar { size: 1, marks: vec![p.mark(i)] }));
  bars
}

pub fn number_line(fact: &TaskFact, scale: u32, reveal: bool) -> NumberLineModel {
  let shown = |slot: Slot, v: i64| (reveal || fact.unknown_slot() != slot).then_some(v);
  let jump = match fact.operator() {
    Operator::Add => i64::from(fact.operand2()),
    Operator::Subtract => -i64::from(fact.operand2()),
  };
  NumberLineModel {
    scale,
    start: shown(Slot::Operand1, i64::from(fact.operand1())),
    jump: shown(Slot::Operand2, jump),
    end: shown(Slot::Result, fact.declared_result()),
  }
}

/// Value an aid may print when it is allowed to reveal the solution.
fn solution_label(fact: &TaskFact) -> i64 {
  match fact.unknown_slot() {
    Slot::None => fact.declared_result(),
    slot => fact.slot_value(slot).unwrap_or_else(|| fact.declared_result()),
  }
}

/// Render every enabled aid from the same partition.
pub fn render(fact: &TaskFact, map: &VisibilityMap) -> Vec<RenderedAid> {
  let p = Partition::of(fact);
  map
    .iter()
    .filter(|(_, v)| v.enabled)
    .map(|(rep, v)| {
      let label = v.reveal_solution.then(|| solution_label(fact));
      match rep {
        Representation::TwentyFrame => RenderedAid::TwentyFrame { rows: twenty_frame(&p), label },
        Representation::HundredField => RenderedAid::HundredField {
          rows: hundred_field(&p, v.scale.unwrap_or_else(|| fact.range_tier().limit())),
          label,
        },
        Representation::NumberLine => RenderedAid::NumberLine {
          line: number_line(fact, v.scale.unwrap_or_else(|| fact.range_tier().limit()), v.reveal_solution),
          label,
        },
        Representation::Counters => RenderedAid::Counters { dice: counters(fact, &p), label },
        Representation::Fingers => RenderedAid::Fingers { hands: fingers(&p), label },
        Representation::PlaceValue => RenderedAid::PlaceValue { bars: place_value(&p), label },
        Representation::Symbolic => RenderedAid::Symbolic {
          text: if v.reveal_solution { fact.to_string() } else { fact.masked() },
        },
      }
    })
    .collect()
}
