//! Tracing policy model
//!
//! A [`Config`] is the ordered set of levels declared in a policy file. Each
//! level lists where its items come from and which other levels it traces
//! to. The down-tracing obligations of a level are not declared directly;
//! they are derived from the `trace to` declarations of the other levels
//! (or taken from the level's own `trace from` groups) by
//! [`Config::derive_tracing`].

use crate::item::ItemClass;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Requirements,
    Implementation,
    Activity,
}

impl LevelKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requirements" => Some(LevelKind::Requirements),
            "implementation" => Some(LevelKind::Implementation),
            "activity" => Some(LevelKind::Activity),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelKind::Requirements => "requirements",
            LevelKind::Implementation => "implementation",
            LevelKind::Activity => "activity",
        }
    }

    /// The item class every item of a level of this kind has.
    pub fn item_class(&self) -> ItemClass {
        match self {
            LevelKind::Requirements => ItemClass::Requirement,
            LevelKind::Implementation => ItemClass::Implementation,
            LevelKind::Activity => ItemClass::Activity,
        }
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Prefix,
    Kind,
}

/// One `prefix "..."` or `kind "..."` clause of a source declaration.
/// Serialized as a `[property, value]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter(pub FilterKind, pub String);

/// A `source: "file" with ...;` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub file: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Accepted requirement statuses; only legal on requirements levels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_status: Option<Vec<String>>,
}

impl SourceSpec {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            filters: Vec::new(),
            valid_status: None,
        }
    }
}

/// An OR-group: satisfied by any one of the named levels.
pub type TraceGroup = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    pub kind: LevelKind,
    #[serde(default)]
    pub source: Vec<SourceSpec>,
    #[serde(default)]
    pub trace_to: Vec<TraceGroup>,
    #[serde(default)]
    pub trace_from: Vec<TraceGroup>,
    #[serde(default)]
    pub needs_tracing_up: bool,
    #[serde(default)]
    pub needs_tracing_down: bool,
    /// AND of OR-groups of levels that must reference items of this level.
    #[serde(default)]
    pub breakdown_requirements: Vec<TraceGroup>,
}

impl Level {
    pub fn new(name: impl Into<String>, kind: LevelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            source: Vec::new(),
            trace_to: Vec::new(),
            trace_from: Vec::new(),
            needs_tracing_up: false,
            needs_tracing_down: false,
            breakdown_requirements: Vec::new(),
        }
    }

    /// Whether any `trace to` group of this level names `target`.
    pub fn traces_to(&self, target: &str) -> bool {
        self.trace_to.iter().flatten().any(|name| name == target)
    }
}

/// Ordered map from level name to level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    levels: Vec<Level>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a level. Returns the level back if the name is taken.
    pub fn insert(&mut self, level: Level) -> Result<(), Level> {
        if self.contains(&level.name) {
            return Err(level);
        }
        self.levels.push(level);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Level> {
        self.levels.iter_mut().find(|l| l.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().map(|l| l.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Recompute `needs_tracing_up`, `needs_tracing_down` and
    /// `breakdown_requirements` from the declared trace groups.
    pub fn derive_tracing(&mut self) {
        let derived: Vec<Vec<TraceGroup>> = self
            .levels
            .iter()
            .map(|level| {
                if !level.trace_from.is_empty() {
                    return level.trace_from.clone();
                }
                self.levels
                    .iter()
                    .filter(|other| other.name != level.name && other.traces_to(&level.name))
                    .map(|other| vec![other.name.clone()])
                    .collect()
            })
            .collect();

        for (level, breakdown) in self.levels.iter_mut().zip(derived) {
            level.needs_tracing_up = !level.trace_to.is_empty();
            level.needs_tracing_down = !breakdown.is_empty();
            level.breakdown_requirements = breakdown;
        }
    }
}

impl<'a> IntoIterator for &'a Config {
    type Item = &'a Level;
    type IntoIter = std::slice::Iter<'a, Level>;

    fn into_iter(self) -> Self::IntoIter {
        self.levels.iter()
    }
}

// Persisted as a JSON object keyed by level name, in declaration order.
impl Serialize for Config {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.levels.len()))?;
        for level in &self.levels {
            map.serialize_entry(&level.name, level)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut config = Config::new();
        for (name, value) in raw {
            let level = Level::deserialize(value).map_err(D::Error::custom)?;
            if level.name != name {
                return Err(D::Error::custom(format!(
                    "level '{}' is stored under key '{name}'",
                    level.name
                )));
            }
            config
                .insert(level)
                .map_err(|l| D::Error::custom(format!("duplicate level '{}'", l.name)))?;
        }
        Ok(config)
    }
}
