//! The slot roster: who is playing which game, on which team.

use std::collections::{BTreeMap, BTreeSet};

use hintforge_protocol::{LooseId, NetworkPlayer, NetworkSlot};
use serde::Serialize;

/// One participating slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotEntry {
    /// Slot number as sent by the server.
    pub number: String,
    pub name: String,
    pub game: String,
    /// Joined in from the player list; `None` until then.
    pub team: Option<LooseId>,
}

/// Slots keyed by slot number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    slots: BTreeMap<String, SlotEntry>,
}

impl Roster {
    /// Builds a roster from the `slot_info` map of a `Connected` packet.
    pub fn from_slot_info(info: &BTreeMap<String, NetworkSlot>) -> Self {
        let slots = info
            .iter()
            .map(|(number, slot)| {
                let entry = SlotEntry {
                    number: number.clone(),
                    name: slot.name.clone(),
                    game: slot.game.clone(),
                    team: None,
                };
                (number.clone(), entry)
            })
            .collect();
        Self { slots }
    }

    /// Copies each player's team onto the slot with the same number.
    /// Players without a matching slot are ignored.
    pub fn merge_teams(&mut self, players: &[NetworkPlayer]) {
        for player in players {
            if let Some(entry) = self.slots.get_mut(player.slot.as_str()) {
                entry.team = Some(player.team.clone());
            }
        }
    }

    pub fn get(&self, number: &str) -> Option<&SlotEntry> {
        self.slots.get(number)
    }

    /// The lowest-numbered slot whose name is `name`. Numbers compare
    /// numerically; non-numeric ones sort last.
    pub fn find_by_name(&self, name: &str) -> Option<&SlotEntry> {
        self.slots
            .values()
            .filter(|entry| entry.name == name)
            .min_by_key(|entry| entry.number.parse::<i64>().unwrap_or(i64::MAX))
    }

    pub fn player_name(&self, number: &str) -> Option<&str> {
        self.get(number).map(|entry| entry.name.as_str())
    }

    pub fn game(&self, number: &str) -> Option<&str> {
        self.get(number).map(|entry| entry.game.as_str())
    }

    /// Distinct, non-empty game names, sorted.
    pub fn games(&self) -> Vec<String> {
        self.slots
            .values()
            .filter(|entry| !entry.game.is_empty())
            .map(|entry| entry.game.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotEntry> {
        self.slots.values()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
