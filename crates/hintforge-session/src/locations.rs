//! Location bookkeeping for one session.

use std::collections::{BTreeSet, HashSet};

use hintforge_protocol::LooseId;
use serde::Serialize;

/// Marker in a location's flag bits for a progression item.
pub const PROGRESSION_FLAG: i64 = 1;

// ---------------------------------------------------------------------------
// LocationSets
// ---------------------------------------------------------------------------

/// Checked, missing and hinted locations, plus the derived candidates.
///
/// `checked` and `missing` are replaced as a whole by each `Connected`
/// packet. `hinted` only grows. `candidate` is `missing − hinted` as of
/// the last [`recompute_candidates`](Self::recompute_candidates) call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationSets {
    pub checked: BTreeSet<LooseId>,
    pub missing: BTreeSet<LooseId>,
    pub hinted: BTreeSet<LooseId>,
    pub candidate: BTreeSet<LooseId>,
}

impl LocationSets {
    pub fn replace(
        &mut self,
        checked: impl IntoIterator<Item = LooseId>,
        missing: impl IntoIterator<Item = LooseId>,
    ) {
        self.checked = checked.into_iter().collect();
        self.missing = missing.into_iter().collect();
    }

    pub fn add_hinted(&mut self, ids: impl IntoIterator<Item = LooseId>) {
        self.hinted.extend(ids);
    }

    pub fn recompute_candidates(&mut self) -> &BTreeSet<LooseId> {
        self.candidate = self.missing.difference(&self.hinted).cloned().collect();
        &self.candidate
    }

    /// Numeric candidate ids in ascending order. Non-numeric ids cannot be
    /// scouted and are left out.
    pub fn numeric_candidates(&self) -> Vec<i64> {
        let mut ids: Vec<i64> =
            self.candidate.iter().filter_map(LooseId::as_i64).collect();
        ids.sort_unstable();
        ids
    }
}

// ---------------------------------------------------------------------------
// Progression records
// ---------------------------------------------------------------------------

/// What a scouted location holds, as far as reward selection cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressionRecord {
    pub location: LooseId,
    pub flags: i64,
}

impl ProgressionRecord {
    pub fn is_progression(&self) -> bool {
        self.flags == PROGRESSION_FLAG
    }
}

/// Records in arrival order, at most one per location.
#[derive(Debug, Clone, Default)]
pub struct ProgressionLog {
    records: Vec<ProgressionRecord>,
    seen: HashSet<LooseId>,
}

impl ProgressionLog {
    /// Appends `record` unless its location is already known. The first
    /// record for a location wins.
    pub fn push(&mut self, record: ProgressionRecord) -> bool {
        if !self.seen.insert(record.location.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[ProgressionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
