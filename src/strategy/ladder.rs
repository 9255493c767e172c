//! Static price-level ladder with retrace annotations
//!
//! The ladder is an immutable, strictly sorted sequence of prices fixed at
//! strategy construction. Each index carries a mutable annotation recording
//! the most recent direction a bar crossed that level, which arms the
//! retracement entry setup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance for matching a configured level price
const LEVEL_EPSILON: f64 = 1e-9;

/// Direction in which price last crossed a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossDirection {
    Up,
    Down,
}

impl fmt::Display for CrossDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossDirection::Up => write!(f, "up"),
            CrossDirection::Down => write!(f, "down"),
        }
    }
}

impl FromStr for CrossDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(CrossDirection::Up),
            "down" => Ok(CrossDirection::Down),
            other => Err(format!("unknown cross direction: {other}")),
        }
    }
}

/// Sorted static levels plus per-index cross annotations
#[derive(Debug, Clone)]
pub struct LevelLadder {
    levels: Vec<f64>,
    annotations: Vec<Option<CrossDirection>>,
}

impl LevelLadder {
    /// Build a ladder from configured levels; sorts ascending and clears annotations
    pub fn load(mut levels: Vec<f64>) -> Self {
        levels.sort_by(|a, b| a.partial_cmp(b).expect("level prices must be comparable"));
        let annotations = vec![None; levels.len()];
        Self {
            levels,
            annotations,
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Price at a ladder index. Panics on out-of-range index; callers bound-check.
    pub fn level(&self, index: usize) -> f64 {
        self.levels[index]
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Index of a level price, matched with a small tolerance
    pub fn index_of(&self, price: f64) -> Option<usize> {
        self.levels
            .iter()
            .position(|l| (l - price).abs() < LEVEL_EPSILON)
    }

    pub fn annotate(&mut self, index: usize, direction: CrossDirection) {
        if let Some(slot) = self.annotations.get_mut(index) {
            *slot = Some(direction);
        }
    }

    pub fn annotation(&self, index: usize) -> Option<CrossDirection> {
        self.annotations.get(index).copied().flatten()
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.annotations.get_mut(index) {
            *slot = None;
        }
    }

    pub fn annotations(&self) -> &[Option<CrossDirection>] {
        &self.annotations
    }

    /// Replace annotations from a persisted snapshot. Lengths are reconciled
    /// to the ladder size so a stale snapshot cannot desync the indices.
    pub fn restore_annotations(&mut self, snapshot: Vec<Option<CrossDirection>>) {
        let mut restored = snapshot;
        restored.resize(self.levels.len(), None);
        self.annotations = restored;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_sorts_levels() {
        let ladder = LevelLadder::load(vec![110.0, 100.0, 105.0]);
        assert_eq!(ladder.levels(), &[100.0, 105.0, 110.0]);
        assert_eq!(ladder.len(), 3);
        assert!(ladder.annotations().iter().all(|a| a.is_none()));
    }

    #[test]
    fn index_lookup_is_tolerant() {
        let ladder = LevelLadder::load(vec![100.0, 105.5, 110.0]);
        assert_eq!(ladder.index_of(105.5), Some(1));
        assert_eq!(ladder.index_of(105.5 + 1e-12), Some(1));
        assert_eq!(ladder.index_of(104.0), None);
    }

    #[test]
    fn annotate_and_clear() {
        let mut ladder = LevelLadder::load(vec![100.0, 105.0]);
        ladder.annotate(1, CrossDirection::Down);
        assert_eq!(ladder.annotation(1), Some(CrossDirection::Down));
        ladder.annotate(1, CrossDirection::Up);
        assert_eq!(ladder.annotation(1), Some(CrossDirection::Up));
        ladder.clear(1);
        assert_eq!(ladder.annotation(1), None);
        // out-of-range is a no-op
        ladder.annotate(9, CrossDirection::Up);
        assert_eq!(ladder.annotation(9), None);
    }

    #[test]
    fn restore_reconciles_length() {
        let mut ladder = LevelLadder::load(vec![100.0, 105.0, 110.0]);
        ladder.restore_annotations(vec![Some(CrossDirection::Down)]);
        assert_eq!(ladder.annotation(0), Some(CrossDirection::Down));
        assert_eq!(ladder.annotation(2), None);
    }

    #[test]
    fn direction_round_trips_through_string() {
        assert_eq!("up".parse::<CrossDirection>().unwrap(), CrossDirection::Up);
        assert_eq!(CrossDirection::Down.to_string(), "down");
        assert!("sideways".parse::<CrossDirection>().is_err());
    }
}
