//! Turning a hint record into a sentence.

use hintforge_protocol::HintRecord;
use hintforge_store::DataCache;

use crate::Roster;

/// A formatted hint and the slots it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintMessage {
    pub text: String,
    pub receiver: Option<String>,
    pub sender: Option<String>,
}

/// Formats `hint` as `"<receiver>'s <item> is at <location> in <sender>'s World"`.
///
/// The item is looked up in the receiver's game and the location in the
/// sender's game. Any name that cannot be resolved is replaced by its raw
/// id; a part with no id at all is left out of the sentence.
pub fn format_hint(hint: &HintRecord, roster: &Roster, datapacks: &DataCache) -> HintMessage {
    let receiver = hint.receiver();
    let sender = hint.sender();

    let item_name = receiver
        .and_then(|slot| roster.game(slot))
        .zip(hint.item_id.as_ref())
        .and_then(|(game, id)| {
            let name = datapacks.item_name(game, id);
            if name.is_none() && datapacks.contains(game) {
                tracing::debug!(game, item = %id, "item name not cached");
            }
            name
        });
    let location_name = sender
        .and_then(|slot| roster.game(slot))
        .zip(hint.location_id.as_ref())
        .and_then(|(game, id)| {
            let name = datapacks.location_name(game, id);
            if name.is_none() && datapacks.contains(game) {
                tracing::debug!(game, location = %id, "location name not cached");
            }
            name
        });

    let receiver_label = receiver.map(|slot| roster.player_name(slot).unwrap_or(slot));
    let sender_label = sender.map(|slot| roster.player_name(slot).unwrap_or(slot));
    let item_label = item_name
        .map(str::to_owned)
        .or_else(|| hint.item_id.as_ref().map(ToString::to_string));
    let location_label = location_name
        .map(str::to_owned)
        .or_else(|| hint.location_id.as_ref().map(ToString::to_string));

    let mut text = String::new();
    if let Some(receiver) = receiver_label {
        text.push_str(&format!("{receiver}'s "));
    }
    if let Some(item) = item_label {
        text.push_str(&format!("{item} "));
    }
    text.push_str("is at ");
    if let Some(location) = location_label {
        text.push_str(&format!("{location} "));
    }
    text.push_str("in ");
    if let Some(sender) = sender_label {
        text.push_str(&format!("{sender}'s World"));
    }

    HintMessage {
        text,
        receiver: receiver.map(str::to_owned),
        sender: sender.map(str::to_owned),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use hintforge_protocol::{LooseId, NetworkSlot};
    use serde_json::json;

    use super::*;

    fn roster() -> Roster {
        Roster::from_slot_info(&BTreeMap::from([
            (
                "1".to_string(),
                NetworkSlot {
                    name: "Alice".into(),
                    game: "Zelda".into(),
                },
            ),
            (
                "2".to_string(),
                NetworkSlot {
                    name: "Bob".into(),
                    game: "Metroid".into(),
                },
            ),
        ]))
    }

    fn record(players: &[&str]) -> HintRecord {
        HintRecord {
            item_id: Some(LooseId::from(10)),
            location_id: Some(LooseId::from("7")),
            players: players.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_format_hint_with_cached_names() {
        let mut cache = DataCache::in_memory();
        // Items come from the receiver's game, locations from the sender's.
        cache
            .ingest("Metroid", &json!({"item_name_to_id": {"Sword": 10}}))
            .unwrap();
        cache
            .ingest("Zelda", &json!({"location_name_to_id": {"Chest": 7}}))
            .unwrap();

        let message = format_hint(&record(&["2", "1"]), &roster(), &cache);
        assert_eq!(message.text, "Bob's Sword is at Chest in Alice's World");
        assert_eq!(message.receiver.as_deref(), Some("2"));
        assert_eq!(message.sender.as_deref(), Some("1"));
    }

    #[test]
    fn test_format_hint_falls_back_to_raw_ids() {
        let message = format_hint(&record(&["2", "1"]), &Roster::default(), &DataCache::in_memory());
        assert_eq!(message.text, "2's 10 is at 7 in 1's World");
    }

    #[test]
    fn test_format_hint_wrong_game_tables_fall_back() {
        let mut cache = DataCache::in_memory();
        // Names exist only in the opposite games' tables.
        cache
            .ingest("Zelda", &json!({"item_name_to_id": {"Sword": 10}}))
            .unwrap();
        let message = format_hint(&record(&["2", "1"]), &roster(), &cache);
        assert_eq!(message.text, "Bob's 10 is at 7 in Alice's World");
    }

    #[test]
    fn test_format_hint_single_player_omits_sender() {
        let message = format_hint(&record(&["2"]), &roster(), &DataCache::in_memory());
        assert_eq!(message.text, "Bob's 10 is at 7 in ");
        assert!(message.sender.is_none());
    }
}
