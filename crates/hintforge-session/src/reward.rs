//! Weighted reward selection.
//!
//! Solving a puzzle earns a roll on the difficulty's weight table. The
//! roll picks one of three buckets:
//!
//! ```text
//!  0 ─────────── progression ──────────┬──── other ────┬─ none ─ total
//!                                      │               │
//!  draw lands here → hint a progression location, an other location,
//!                    or no hint at all
//! ```
//!
//! A location is then drawn uniformly from the chosen bucket. An empty
//! bucket falls back to the other non-empty one rather than wasting the
//! roll.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::{ProgressionRecord, SessionError};

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Bucket weights for one difficulty, as probabilities.
///
/// Nothing forces the three to sum to 1.0; the draw is scaled by their
/// total instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HintWeights {
    pub progression: f64,
    pub other: f64,
    pub none: f64,
}

impl HintWeights {
    pub fn new(progression: f64, other: f64, none: f64) -> Self {
        Self {
            progression,
            other,
            none,
        }
    }

    /// Builds weights from integer percentages. Needs exactly three
    /// values (progression, other, none); they are divided by 100 as-is.
    pub fn from_percentages(values: &[i64]) -> Option<Self> {
        let [progression, other, none] = values else {
            return None;
        };
        Some(Self::new(
            *progression as f64 / 100.0,
            *other as f64 / 100.0,
            *none as f64 / 100.0,
        ))
    }

    pub fn total(&self) -> f64 {
        self.progression + self.other + self.none
    }

    /// `"<p> Prog, <o> Non-prog, <n> No Hint"` with rounded percentages.
    pub fn describe(&self) -> String {
        let pct = |p: f64| (p * 100.0).round() as i64;
        format!(
            "{} Prog, {} Non-prog, {} No Hint",
            pct(self.progression),
            pct(self.other),
            pct(self.none)
        )
    }
}

/// Weight tables keyed by difficulty name.
///
/// Owned by the supervisor for the life of the client and updated in
/// place when the server pushes new settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyWeights {
    table: BTreeMap<String, HintWeights>,
}

impl Default for DifficultyWeights {
    fn default() -> Self {
        let table = [
            ("Easy", HintWeights::new(0.10, 0.90, 0.0)),
            ("Medium", HintWeights::new(0.40, 0.60, 0.0)),
            ("Killer", HintWeights::new(0.60, 0.40, 0.0)),
            ("Hard", HintWeights::new(0.80, 0.20, 0.0)),
        ]
        .into_iter()
        .map(|(name, weights)| (name.to_owned(), weights))
        .collect();
        Self { table }
    }
}

impl DifficultyWeights {
    pub fn get(&self, difficulty: &str) -> Option<&HintWeights> {
        self.table.get(difficulty)
    }

    pub fn set(&mut self, difficulty: impl Into<String>, weights: HintWeights) {
        self.table.insert(difficulty.into(), weights);
    }

    pub fn difficulties(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Applies server-pushed percentages. Entries without exactly three
    /// values are skipped; difficulties not mentioned keep their weights.
    /// Returns the number of entries applied.
    pub fn apply_percentages(&mut self, mapping: &BTreeMap<String, Vec<i64>>) -> usize {
        let mut applied = 0;
        for (difficulty, values) in mapping {
            let Some(weights) = HintWeights::from_percentages(values) else {
                tracing::debug!(difficulty, ?values, "skipping weights entry");
                continue;
            };
            tracing::info!(difficulty, weights = %weights.describe(), "updated hint weights");
            self.set(difficulty.clone(), weights);
            applied += 1;
        }
        applied
    }

    /// Human-readable weights for `difficulty`, or `"N/A"` if unknown.
    pub fn describe(&self, difficulty: &str) -> String {
        self.get(difficulty)
            .map_or_else(|| "N/A".to_owned(), HintWeights::describe)
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Progression,
    Other,
    NoHint,
}

/// Picks the location to hint for a solved puzzle of `difficulty`.
///
/// # Errors
/// - `UnknownDifficulty` if `weights` has no entry for `difficulty`.
/// - `NoHintTriggered` if the draw lands on the "none" bucket, or the
///   weights total is not positive.
/// - `NoAvailableRewards` if `records` is empty.
pub fn select_reward<'a, R: Rng>(
    weights: &DifficultyWeights,
    difficulty: &str,
    records: &'a [ProgressionRecord],
    rng: &mut R,
) -> Result<&'a ProgressionRecord, SessionError> {
    let (progression, other): (Vec<&ProgressionRecord>, Vec<&ProgressionRecord>) =
        records.iter().partition(|r| r.is_progression());

    let w = weights
        .get(difficulty)
        .ok_or_else(|| SessionError::UnknownDifficulty(difficulty.to_owned()))?;
    let total = w.total();
    if total.is_nan() || total <= 0.0 {
        return Err(SessionError::NoHintTriggered);
    }

    let draw = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    let mut chosen = None;
    for (bucket, weight) in [
        (Bucket::Progression, w.progression),
        (Bucket::Other, w.other),
        (Bucket::NoHint, w.none),
    ] {
        cumulative += weight;
        if draw < cumulative {
            chosen = Some(bucket);
            break;
        }
    }

    let (preferred, fallback) = match chosen {
        Some(Bucket::Progression) => (&progression, &other),
        Some(Bucket::Other) => (&other, &progression),
        Some(Bucket::NoHint) | None => return Err(SessionError::NoHintTriggered),
    };
    preferred
        .choose(rng)
        .or_else(|| fallback.choose(rng))
        .copied()
        .ok_or(SessionError::NoAvailableRewards)
}

// =========================================================================
// Tests
// =========================================================================
