use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use sc_core::{GameState, ScribeError};

pub const SAVE_SCHEMA: &str = "scribe-save.v1";

const SLOT_FILE_PREFIX: &str = "slot_";
const SLOT_FILE_SUFFIX: &str = ".json";

pub type SlotId = String;

/// On-disk envelope around a saved `GameState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub schema_version: String,
    pub game_state: GameState,
    pub timestamp: String,
    pub version: String,
}

impl SavePayload {
    pub fn new(state: &GameState) -> Self {
        Self {
            schema_version: SAVE_SCHEMA.to_string(),
            game_state: state.clone(),
            timestamp: Utc::now().to_rfc3339(),
            version: state.metadata.version.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, ScribeError> {
        serde_json::to_string_pretty(self)
            .map_err(|error| ScribeError::serialization("SAVE_ENCODE", error.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, ScribeError> {
        let payload: Self = serde_json::from_str(raw)
            .map_err(|error| ScribeError::serialization("SAVE_INVALID", error.to_string()))?;
        if payload.schema_version != SAVE_SCHEMA {
            return Err(ScribeError::serialization(
                "SAVE_SCHEMA",
                format!("Unsupported save schema: {}", payload.schema_version),
            ));
        }
        Ok(payload)
    }
}

/// Save-slot persistence. `load` yields `None` for an empty slot and never
/// returns a partially decoded state.
pub trait SaveStore: Send + Sync {
    fn save(&self, slot: &str, state: &GameState) -> Result<(), ScribeError>;
    fn load(&self, slot: &str) -> Result<Option<GameState>, ScribeError>;
    fn list(&self) -> Result<Vec<SlotId>, ScribeError>;
    fn delete(&self, slot: &str) -> Result<bool, ScribeError>;
}

fn validate_slot(slot: &str) -> Result<(), ScribeError> {
    let valid = !slot.is_empty()
        && slot
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(ScribeError::io(
            "SAVE_SLOT_INVALID",
            format!("Invalid save slot id: \"{}\"", slot),
        ))
    }
}

/// Keeps encoded payloads in memory, so saves go through the same
/// serialization as the file store.
#[derive(Debug, Default)]
pub struct MemorySaveStore {
    slots: Mutex<BTreeMap<SlotId, String>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw payload as-is; used to exercise decoding failures.
    pub fn insert_raw(&self, slot: &str, raw: impl Into<String>) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot.to_string(), raw.into());
    }
}

impl SaveStore for MemorySaveStore {
    fn save(&self, slot: &str, state: &GameState) -> Result<(), ScribeError> {
        validate_slot(slot)?;
        let raw = SavePayload::new(state).to_json()?;
        self.insert_raw(slot, raw);
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<GameState>, ScribeError> {
        validate_slot(slot)?;
        let raw = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slot)
            .cloned();
        raw.map(|raw| SavePayload::from_json(&raw).map(|payload| payload.game_state))
            .transpose()
    }

    fn list(&self) -> Result<Vec<SlotId>, ScribeError> {
        Ok(self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    fn delete(&self, slot: &str) -> Result<bool, ScribeError> {
        validate_slot(slot)?;
        Ok(self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(slot)
            .is_some())
    }
}

/// One `slot_<id>.json` file per slot under `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileSaveStore {
    dir: PathBuf,
}

impl JsonFileSaveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", SLOT_FILE_PREFIX, slot, SLOT_FILE_SUFFIX))
    }
}

fn map_save_io(code: &'static str, path: &Path, error: std::io::Error) -> ScribeError {
    ScribeError::io(code, format!("{}: {}", path.display(), error))
}

impl SaveStore for JsonFileSaveStore {
    fn save(&self, slot: &str, state: &GameState) -> Result<(), ScribeError> {
        validate_slot(slot)?;
        fs::create_dir_all(&self.dir)
            .map_err(|error| map_save_io("SAVE_WRITE", &self.dir, error))?;
        let path = self.slot_path(slot);
        let raw = SavePayload::new(state).to_json()?;
        fs::write(&path, raw).map_err(|error| map_save_io("SAVE_WRITE", &path, error))?;
        log::info!("saved slot {} to {}", slot, path.display());
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<GameState>, ScribeError> {
        validate_slot(slot)?;
        let path = self.slot_path(slot);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(map_save_io("SAVE_READ", &path, error)),
        };
        let payload = SavePayload::from_json(&raw)?;
        log::info!("loaded slot {} from {}", slot, path.display());
        Ok(Some(payload.game_state))
    }

    fn list(&self) -> Result<Vec<SlotId>, ScribeError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(map_save_io("SAVE_LIST", &self.dir, error)),
        };
        let mut slots: Vec<SlotId> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_prefix(SLOT_FILE_PREFIX)
                    .and_then(|rest| rest.strip_suffix(SLOT_FILE_SUFFIX))
                    .map(ToString::to_string)
            })
            .collect();
        slots.sort();
        Ok(slots)
    }

    fn delete(&self, slot: &str) -> Result<bool, ScribeError> {
        validate_slot(slot)?;
        let path = self.slot_path(slot);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == IoErrorKind::NotFound => Ok(false),
            Err(error) => Err(map_save_io("SAVE_DELETE", &path, error)),
        }
    }
}
