use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProjectConfig;
use crate::path::{assign_nested_path, lookup_path, parse_ref_path};
use crate::value::ScValue;

pub const DEFAULT_HEALTH: f64 = 100.0;
pub const DEFAULT_ENERGY: f64 = 100.0;

fn default_health() -> f64 {
    DEFAULT_HEALTH
}

fn default_energy() -> f64 {
    DEFAULT_ENERGY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub quantity: i64,
}

/// Typed fields for the default player plus an open bag for creator-defined ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_health")]
    pub health: f64,
    #[serde(default = "default_energy")]
    pub energy: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, ScValue>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            name: String::new(),
            health: DEFAULT_HEALTH,
            energy: DEFAULT_ENERGY,
            score: 0.0,
            inventory: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl Player {
    pub const TYPED_FIELDS: [&'static str; 5] = ["name", "health", "energy", "score", "inventory"];

    pub fn to_value(&self) -> ScValue {
        let mut map = self.extra.clone();
        map.insert("name".to_string(), ScValue::String(self.name.clone()));
        map.insert("health".to_string(), ScValue::Number(self.health));
        map.insert("energy".to_string(), ScValue::Number(self.energy));
        map.insert("score".to_string(), ScValue::Number(self.score));
        map.insert(
            "inventory".to_string(),
            ScValue::Array(
                self.inventory
                    .iter()
                    .map(|item| {
                        ScValue::Map(BTreeMap::from([
                            ("name".to_string(), ScValue::String(item.name.clone())),
                            ("quantity".to_string(), ScValue::Number(item.quantity as f64)),
                        ]))
                    })
                    .collect(),
            ),
        );
        ScValue::Map(map)
    }

    pub fn field(&self, key: &str) -> Option<ScValue> {
        match self.to_value() {
            ScValue::Map(mut map) => map.remove(key),
            _ => None,
        }
    }

    /// Writes one attribute; typed fields reject values of the wrong shape.
    pub fn set_field(&mut self, key: &str, value: ScValue) -> Result<(), String> {
        match key {
            "name" => match value {
                ScValue::String(name) => self.name = name,
                other => return Err(type_message(key, "string", &other)),
            },
            "health" => self.health = number_field(key, &value)?,
            "energy" => self.energy = number_field(key, &value)?,
            "score" => self.score = number_field(key, &value)?,
            "inventory" => self.inventory = inventory_field(&value)?,
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    /// Typed fields fall back to their defaults; open fields are dropped.
    pub fn remove_field(&mut self, key: &str) {
        match key {
            "name" => self.name.clear(),
            "health" => self.health = DEFAULT_HEALTH,
            "energy" => self.energy = DEFAULT_ENERGY,
            "score" => self.score = 0.0,
            "inventory" => self.inventory.clear(),
            _ => {
                self.extra.remove(key);
            }
        }
    }
}

fn type_message(key: &str, expected: &str, value: &ScValue) -> String {
    format!(
        "player.{} expects {}, got {}.",
        key,
        expected,
        value.type_name()
    )
}

fn number_field(key: &str, value: &ScValue) -> Result<f64, String> {
    value
        .as_number()
        .ok_or_else(|| type_message(key, "number", value))
}

fn inventory_field(value: &ScValue) -> Result<Vec<InventoryItem>, String> {
    let ScValue::Array(entries) = value else {
        return Err(type_message("inventory", "array", value));
    };
    let mut items: Vec<InventoryItem> = Vec::new();
    for entry in entries {
        let map = entry
            .as_map()
            .ok_or_else(|| "player.inventory entries must be maps.".to_string())?;
        let name = map
            .get("name")
            .and_then(ScValue::as_string)
            .ok_or_else(|| "player.inventory entries need a string name.".to_string())?;
        let quantity = map
            .get("quantity")
            .and_then(ScValue::as_number)
            .unwrap_or(1.0) as i64;
        if quantity <= 0 {
            continue;
        }
        match items.iter_mut().find(|item| item.name == name) {
            Some(existing) => existing.quantity += quantity,
            None => items.push(InventoryItem {
                name: name.to_string(),
                quantity,
            }),
        }
    }
    Ok(items)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryMetadata {
    pub title: String,
    pub author: String,
    pub version: String,
    pub created_date: String,
    pub last_played: String,
}

/// The live record of one game session; the unit of save/load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub current_passage: String,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub variables: BTreeMap<String, ScValue>,
    #[serde(default)]
    pub player: Player,
    #[serde(default)]
    pub passage_tags: Vec<String>,
    #[serde(default)]
    pub last_passage: Option<String>,
    #[serde(default)]
    pub metadata: StoryMetadata,
}

impl GameState {
    pub fn new(config: &ProjectConfig, now: DateTime<Utc>) -> Self {
        let stamp = now.to_rfc3339();
        Self {
            current_passage: config.starting_passage.clone(),
            metadata: StoryMetadata {
                title: config.title.clone(),
                author: config.author.clone(),
                version: config.version.clone(),
                created_date: stamp.clone(),
                last_played: stamp,
            },
            ..Self::default()
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.last_played = now.to_rfc3339();
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.flags.insert(name.to_string(), value);
    }

    pub fn get_flag(&self, name: &str, default: bool) -> bool {
        self.flags.get(name).copied().unwrap_or(default)
    }

    /// Returns false (and changes nothing) when `path` has no segments.
    pub fn set_variable(&mut self, path: &str, value: ScValue) -> bool {
        let segments = parse_ref_path(path);
        let written = assign_nested_path(&mut self.variables, &segments, value);
        if !written {
            log::warn!("ignored set_variable with empty path \"{}\"", path);
        }
        written
    }

    pub fn get_variable(&self, path: &str) -> Option<&ScValue> {
        lookup_path(&self.variables, &parse_ref_path(path))
    }

    pub fn get_variable_or(&self, path: &str, default: ScValue) -> ScValue {
        self.get_variable(path).cloned().unwrap_or(default)
    }

    /// Merges by name; non-positive quantities are ignored.
    pub fn add_to_inventory(&mut self, item: &str, quantity: i64) {
        if quantity <= 0 {
            return;
        }
        let inventory = &mut self.player.inventory;
        match inventory.iter_mut().find(|entry| entry.name == item) {
            Some(entry) => entry.quantity += quantity,
            None => inventory.push(InventoryItem {
                name: item.to_string(),
                quantity,
            }),
        }
    }

    /// Returns whether the item was present. The entry is deleted once its
    /// quantity drops to zero or below.
    pub fn remove_from_inventory(&mut self, item: &str, quantity: i64) -> bool {
        let inventory = &mut self.player.inventory;
        let Some(position) = inventory.iter().position(|entry| entry.name == item) else {
            return false;
        };
        inventory[position].quantity -= quantity.max(0);
        if inventory[position].quantity <= 0 {
            inventory.remove(position);
        }
        true
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.item_count(item) > 0
    }

    pub fn item_count(&self, item: &str) -> i64 {
        self.player
            .inventory
            .iter()
            .find(|entry| entry.name == item)
            .map(|entry| entry.quantity)
            .unwrap_or(0)
    }

    /// Writes a dotted path rooted at the whole state: `flags.<name>`,
    /// `player.<field>[.…]`, `variables.<path>`, or a bare variable path.
    pub fn set_path(&mut self, path: &str, value: ScValue) -> Result<(), String> {
        let segments = parse_ref_path(path);
        let Some((root, rest)) = segments.split_first() else {
            return Err(format!("\"{}\" is not a writable state path.", path));
        };
        match root.as_str() {
            "flags" => {
                let [name] = rest else {
                    return Err("flag paths take exactly one name: flags.<name>.".to_string());
                };
                let flag = value
                    .as_bool()
                    .ok_or_else(|| format!("flags.{} expects a boolean.", name))?;
                self.set_flag(name, flag);
                Ok(())
            }
            "player" => {
                let Some((field, nested)) = rest.split_first() else {
                    return Err("player paths need a field: player.<field>.".to_string());
                };
                if nested.is_empty() {
                    return self.player.set_field(field, value);
                }
                let mut container = match self.player.field(field) {
                    Some(ScValue::Map(entries)) => entries,
                    _ => BTreeMap::new(),
                };
                assign_nested_path(&mut container, nested, value);
                self.player.set_field(field, ScValue::Map(container))
            }
            "variables" if !rest.is_empty() => {
                assign_nested_path(&mut self.variables, rest, value);
                Ok(())
            }
            _ => {
                assign_nested_path(&mut self.variables, &segments, value);
                Ok(())
            }
        }
    }
}
