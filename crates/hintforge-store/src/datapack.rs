//! Per-game id→name lookup tables built from server datapacks.
//!
//! The server describes each game with a datapack: among other things,
//! two tables mapping item names and location names to numeric ids. Hint
//! messages only carry ids, so the cache inverts those tables to turn
//! them back into names.
//!
//! When rooted in a directory, the cache also writes what it keeps to
//! disk:
//!
//! ```text
//! <root>/ap/datapacks/<game>.json   one filtered datapack, pretty JSON
//! <root>/ap/datapacks/cache.dat     every filtered datapack, keyed by game
//! ```
//!
//! and reloads `cache.dat` when opened, so names are available before the
//! first datapack of a session arrives.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use hintforge_protocol::LooseId;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StoreError;

/// Directory (relative to the cache root) holding datapack files.
pub const DATAPACK_DIR: &str = "ap/datapacks";
/// File name of the aggregate cache.
pub const AGGREGATE_FILE: &str = "cache.dat";

// ---------------------------------------------------------------------------
// Filtered datapack
// ---------------------------------------------------------------------------

/// The parts of a raw datapack the client keeps.
///
/// Everything else the server sends (groups, full item lists and so on)
/// is dropped before anything is written to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameDataPackage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name_to_id: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name_to_id: Option<Map<String, Value>>,
}

impl GameDataPackage {
    /// Keeps only the checksum and the two name→id tables of `raw`.
    ///
    /// # Errors
    /// `Malformed` if `raw` is not a JSON object.
    pub fn filter(raw: &Value) -> Result<Self, StoreError> {
        let obj = raw.as_object().ok_or_else(|| {
            StoreError::Malformed("datapack is not an object".into())
        })?;
        let table = |key: &str| obj.get(key).and_then(Value::as_object).cloned();
        Ok(Self {
            checksum: obj
                .get("checksum")
                .and_then(Value::as_str)
                .map(str::to_owned),
            item_name_to_id: table("item_name_to_id"),
            location_name_to_id: table("location_name_to_id"),
        })
    }
}

// ---------------------------------------------------------------------------
// DataPack (inverted)
// ---------------------------------------------------------------------------

/// Inverted lookup tables for one game.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataPack {
    pub checksum: Option<String>,
    item_names: HashMap<String, String>,
    location_names: HashMap<String, String>,
}

impl DataPack {
    pub fn from_package(package: &GameDataPackage) -> Self {
        Self {
            checksum: package.checksum.clone(),
            item_names: invert(package.item_name_to_id.as_ref()),
            location_names: invert(package.location_name_to_id.as_ref()),
        }
    }

    pub fn item_name(&self, id: &LooseId) -> Option<&str> {
        lookup(&self.item_names, id)
    }

    pub fn location_name(&self, id: &LooseId) -> Option<&str> {
        lookup(&self.location_names, id)
    }

    pub fn item_count(&self) -> usize {
        self.item_names.len()
    }

    pub fn location_count(&self) -> usize {
        self.location_names.len()
    }
}

fn lookup<'a>(table: &'a HashMap<String, String>, id: &LooseId) -> Option<&'a str> {
    table.get(&id.canonical()?).map(String::as_str)
}

/// Turns `{name: id}` into `{canonical id: name}`.
///
/// Ids may be integers or numeric strings; both normalize to the decimal
/// form. Anything else is dropped.
fn invert(table: Option<&Map<String, Value>>) -> HashMap<String, String> {
    let Some(table) = table else {
        return HashMap::new();
    };
    table
        .iter()
        .filter_map(|(name, id)| {
            let key = LooseId::from_value(id)?.canonical()?;
            Some((key, name.clone()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// DataCache
// ---------------------------------------------------------------------------

/// All datapacks known to the client, at most one per game name.
#[derive(Debug, Default)]
pub struct DataCache {
    root: Option<PathBuf>,
    packs: HashMap<String, DataPack>,
    /// What gets written to the aggregate file.
    raw: BTreeMap<String, GameDataPackage>,
}

impl DataCache {
    /// A cache that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A cache rooted at `root`, warmed from the aggregate file if one
    /// exists there.
    ///
    /// An unreadable aggregate file is logged and ignored; the next
    /// datapack from the server rewrites it.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let mut cache = Self {
            root: Some(root.into()),
            ..Self::default()
        };
        match cache.load_aggregate() {
            Ok(0) => {}
            Ok(games) => tracing::info!(games, "loaded cached datapacks"),
            Err(error) => {
                tracing::warn!(%error, "ignoring unreadable datapack cache");
            }
        }
        cache
    }

    fn dir(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(DATAPACK_DIR))
    }

    /// Path of the per-game file for `game`, if the cache is rooted.
    ///
    /// Game names are percent-encoded so any name maps to a single,
    /// portable file name.
    pub fn game_file(&self, game: &str) -> Option<PathBuf> {
        let name = utf8_percent_encode(game, NON_ALPHANUMERIC).to_string();
        self.dir().map(|dir| dir.join(format!("{name}.json")))
    }

    /// Path of the aggregate cache file, if the cache is rooted.
    pub fn aggregate_file(&self) -> Option<PathBuf> {
        self.dir().map(|dir| dir.join(AGGREGATE_FILE))
    }

    fn load_aggregate(&mut self) -> Result<usize, StoreError> {
        let Some(path) = self.aggregate_file() else {
            return Ok(0);
        };
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let raw: BTreeMap<String, GameDataPackage> =
            serde_json::from_str(&contents).map_err(StoreError::Serialize)?;
        self.packs = raw
            .iter()
            .map(|(game, package)| (game.clone(), DataPack::from_package(package)))
            .collect();
        self.raw = raw;
        Ok(self.packs.len())
    }

    /// Stores the datapack for one game, replacing any earlier one.
    ///
    /// The in-memory tables are updated even if writing the files fails;
    /// the write error is still returned so the caller can log it.
    ///
    /// # Errors
    /// `Malformed` if `raw` is not an object (nothing is changed), or an
    /// `Io`/`Serialize` error from writing the files.
    pub fn ingest(&mut self, game: &str, raw: &Value) -> Result<(), StoreError> {
        let package = GameDataPackage::filter(raw)?;
        let pack = DataPack::from_package(&package);
        tracing::debug!(
            game,
            items = pack.item_count(),
            locations = pack.location_count(),
            "ingested datapack"
        );
        self.packs.insert(game.to_owned(), pack);
        self.raw.insert(game.to_owned(), package);
        self.persist(game)
    }

    /// Ingests every game in a `DataPackage` reply (`{"games": {...}}`).
    ///
    /// Entries that cannot be ingested are logged and skipped. Returns the
    /// number of games now held in memory from this reply.
    pub fn ingest_combined(&mut self, data: &Value) -> usize {
        let Some(games) = data.get("games").and_then(Value::as_object) else {
            tracing::warn!("datapack reply has no `games` object");
            return 0;
        };
        let mut ingested = 0;
        for (game, raw) in games {
            match self.ingest(game, raw) {
                Ok(()) => ingested += 1,
                Err(StoreError::Malformed(reason)) => {
                    tracing::warn!(game, %reason, "skipping malformed datapack");
                }
                Err(error) => {
                    // Tables are in memory; only the disk copy is stale.
                    ingested += 1;
                    tracing::warn!(game, %error, "failed to persist datapack");
                }
            }
        }
        ingested
    }

    fn persist(&self, game: &str) -> Result<(), StoreError> {
        let (Some(dir), Some(game_file), Some(aggregate)) =
            (self.dir(), self.game_file(game), self.aggregate_file())
        else {
            return Ok(());
        };
        let Some(package) = self.raw.get(game) else {
            return Ok(());
        };

        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let pretty =
            serde_json::to_string_pretty(package).map_err(StoreError::Serialize)?;
        write_file(&game_file, &pretty)?;
        let all = serde_json::to_string(&self.raw).map_err(StoreError::Serialize)?;
        write_file(&aggregate, &all)
    }

    pub fn get(&self, game: &str) -> Option<&DataPack> {
        self.packs.get(game)
    }

    pub fn contains(&self, game: &str) -> bool {
        self.packs.contains_key(game)
    }

    /// Game names with a cached datapack, sorted.
    pub fn games(&self) -> Vec<&str> {
        let mut games: Vec<&str> = self.packs.keys().map(String::as_str).collect();
        games.sort_unstable();
        games
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    /// Resolves an item id using `game`'s datapack.
    pub fn item_name(&self, game: &str, id: &LooseId) -> Option<&str> {
        self.packs.get(game)?.item_name(id)
    }

    /// Resolves a location id using `game`'s datapack.
    pub fn location_name(&self, game: &str, id: &LooseId) -> Option<&str> {
        self.packs.get(game)?.location_name(id)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), StoreError> {
    std::fs::write(path, contents).map_err(|e| StoreError::io(path, e))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn zelda_pack() -> Value {
        json!({
            "checksum": "abc123",
            "item_name_to_id": {"Sword": 10, "Shield": "11", "Weird": "eleven"},
            "location_name_to_id": {"Chest": 7},
            "item_name_groups": {"Everything": ["Sword", "Shield"]}
        })
    }

    // =====================================================================
    // Filtering and inversion
    // =====================================================================

    #[test]
    fn test_filter_keeps_only_checksum_and_tables() {
        let package = GameDataPackage::filter(&zelda_pack()).unwrap();
        let json = serde_json::to_value(&package).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["checksum", "item_name_to_id", "location_name_to_id"]
        );
    }

    #[test]
    fn test_filter_non_object_is_malformed() {
        let result = GameDataPackage::filter(&json!([1, 2]));
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_integer_and_string_ids_share_a_key() {
        let mut cache = DataCache::in_memory();
        cache.ingest("Zelda", &json!({"item_name_to_id": {"a": 1}})).unwrap();

        assert_eq!(cache.item_name("Zelda", &LooseId::from(1)), Some("a"));
        assert_eq!(cache.item_name("Zelda", &LooseId::from("1")), Some("a"));
        assert_eq!(cache.item_name("Zelda", &LooseId::from("001")), Some("a"));
    }

    #[test]
    fn test_non_numeric_ids_are_dropped() {
        let mut cache = DataCache::in_memory();
        cache.ingest("Zelda", &zelda_pack()).unwrap();

        let pack = cache.get("Zelda").unwrap();
        assert_eq!(pack.item_count(), 2);
        assert_eq!(pack.item_name(&LooseId::from(11)), Some("Shield"));
        assert_eq!(pack.checksum.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_lookup_unknown_game_or_id_is_none() {
        let mut cache = DataCache::in_memory();
        cache.ingest("Zelda", &zelda_pack()).unwrap();

        assert_eq!(cache.location_name("Zelda", &LooseId::from(7)), Some("Chest"));
        assert_eq!(cache.location_name("Zelda", &LooseId::from(8)), None);
        assert_eq!(cache.location_name("Metroid", &LooseId::from(7)), None);
        assert_eq!(cache.item_name("Zelda", &LooseId::from("Sword")), None);
    }

    #[test]
    fn test_ingest_replaces_earlier_pack_for_same_game() {
        let mut cache = DataCache::in_memory();
        cache.ingest("Zelda", &zelda_pack()).unwrap();
        cache
            .ingest("Zelda", &json!({"item_name_to_id": {"Bow": 10}}))
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.item_name("Zelda", &LooseId::from(10)), Some("Bow"));
        assert_eq!(cache.item_name("Zelda", &LooseId::from(11)), None);
        assert_eq!(cache.location_name("Zelda", &LooseId::from(7)), None);
    }

    // =====================================================================
    // ingest_combined
    // =====================================================================

    #[test]
    fn test_ingest_combined_skips_malformed_games() {
        let mut cache = DataCache::in_memory();
        let ingested = cache.ingest_combined(&json!({
            "games": {
                "Zelda": zelda_pack(),
                "Broken": "not a datapack",
                "Metroid": {"location_name_to_id": {"Morph Ball Room": 1}}
            }
        }));

        assert_eq!(ingested, 2);
        assert_eq!(cache.games(), vec!["Metroid", "Zelda"]);
        assert!(!cache.contains("Broken"));
    }

    #[test]
    fn test_ingest_combined_without_games_is_noop() {
        let mut cache = DataCache::in_memory();
        assert_eq!(cache.ingest_combined(&json!({"other": {}})), 0);
        assert!(cache.is_empty());
    }

    // =====================================================================
    // Persistence
    // =====================================================================

    #[test]
    fn test_ingest_writes_game_file_and_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DataCache::open(dir.path());
        cache.ingest("A Link to the Past", &zelda_pack()).unwrap();

        let game_file = cache.game_file("A Link to the Past").unwrap();
        assert!(game_file.ends_with("ap/datapacks/A%20Link%20to%20the%20Past.json"));
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&game_file).unwrap())
                .unwrap();
        assert_eq!(written["checksum"], "abc123");
        assert!(written.get("item_name_groups").is_none());

        let aggregate = cache.aggregate_file().unwrap();
        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(aggregate).unwrap())
                .unwrap();
        assert!(written["A Link to the Past"].is_object());
    }

    #[test]
    fn test_ingest_twice_is_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DataCache::open(dir.path());
        cache.ingest("Zelda", &zelda_pack()).unwrap();
        let first =
            std::fs::read_to_string(cache.aggregate_file().unwrap()).unwrap();
        cache.ingest("Zelda", &zelda_pack()).unwrap();
        let second =
            std::fs::read_to_string(cache.aggregate_file().unwrap()).unwrap();

        assert_eq!(first, second);
        let written: Value = serde_json::from_str(&second).unwrap();
        assert_eq!(written.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_open_reloads_aggregate_cache() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = DataCache::open(dir.path());
            cache.ingest("Zelda", &zelda_pack()).unwrap();
        }

        let warm = DataCache::open(dir.path());
        assert_eq!(warm.item_name("Zelda", &LooseId::from(10)), Some("Sword"));
        assert_eq!(warm.location_name("Zelda", &LooseId::from("7")), Some("Chest"));
    }

    #[test]
    fn test_open_ignores_corrupt_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let datapacks = dir.path().join(DATAPACK_DIR);
        std::fs::create_dir_all(&datapacks).unwrap();
        std::fs::write(datapacks.join(AGGREGATE_FILE), "{{{").unwrap();

        let cache = DataCache::open(dir.path());
        assert!(cache.is_empty());
    }
}
