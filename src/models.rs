//! Data models for accounts, universes, players, planets and fleets

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returns true when `id` looks like a UUID.
pub fn valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Generate a fresh identifier for an entity.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Building,
    Technology,
    Ship,
    Defense,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Building => "building",
            ElementKind::Technology => "technology",
            ElementKind::Ship => "ship",
            ElementKind::Defense => "defense",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "building" => Some(ElementKind::Building),
            "technology" => Some(ElementKind::Technology),
            "ship" => Some(ElementKind::Ship),
            "defense" => Some(ElementKind::Defense),
            _ => None,
        }
    }

    /// Leveled elements follow a progression; the others are bought per unit.
    pub fn is_leveled(&self) -> bool {
        matches!(self, ElementKind::Building | ElementKind::Technology)
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A quantity of a single resource: a price or a stockpile entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub resource: String,
    pub amount: f64,
}

impl ResourceAmount {
    pub fn new(resource: impl Into<String>, amount: f64) -> Self {
        Self {
            resource: resource.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub mail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub id: String,
    pub name: String,
    pub economic_speed: i64,
    pub fleet_speed: i64,
    pub research_speed: i64,
    pub fleets_to_ruins_ratio: f64,
    pub defenses_to_ruins_ratio: f64,
    pub fleets_consumption_ratio: f64,
    pub galaxies_count: i64,
    pub galaxy_size: i64,
    pub solar_system_size: i64,
}

impl Universe {
    /// Number of distinct coordinates available in this universe, or
    /// `None` when it does not fit an `i64`.
    pub fn checked_capacity(&self) -> Option<i64> {
        self.galaxies_count
            .checked_mul(self.galaxy_size)?
            .checked_mul(self.solar_system_size)
    }

    /// Like [`Universe::checked_capacity`], saturating at `i64::MAX`.
    pub fn capacity(&self) -> i64 {
        self.checked_capacity().unwrap_or(i64::MAX)
    }

    pub fn contains(&self, coords: &Coordinate) -> bool {
        (0..self.galaxies_count).contains(&coords.galaxy)
            && (0..self.galaxy_size).contains(&coords.system)
            && (0..self.solar_system_size).contains(&coords.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub galaxy: i64,
    pub system: i64,
    pub position: i64,
}

impl Coordinate {
    pub fn new(galaxy: i64, system: i64, position: i64) -> Self {
        Self {
            galaxy,
            system,
            position,
        }
    }

    /// Index of these coordinates among all the positions of `uni`.
    pub fn linearize(&self, uni: &Universe) -> i64 {
        self.galaxy
            .saturating_mul(uni.galaxy_size)
            .saturating_add(self.system)
            .saturating_mul(uni.solar_system_size)
            .saturating_add(self.position)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.galaxy, self.system, self.position)
    }
}

/// Level of a building or a technology, with descriptive data filled
/// in by the listing paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementLevel {
    pub id: String,
    pub level: i64,
    #[serde(default)]
    pub next_cost: Vec<ResourceAmount>,
    #[serde(default)]
    pub production: Vec<ResourceAmount>,
}

impl ElementLevel {
    pub fn new(id: impl Into<String>, level: i64) -> Self {
        Self {
            id: id.into(),
            level,
            next_cost: Vec::new(),
            production: Vec::new(),
        }
    }
}

/// Count of ships or defenses stationed on a planet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCount {
    pub id: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stockpile {
    pub resource: String,
    pub amount: f64,
    pub production: f64,
    pub storage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub account_id: String,
    pub universe_id: String,
    pub name: String,
    #[serde(default)]
    pub technologies: Vec<ElementLevel>,
}

impl Player {
    pub fn technology_level(&self, id: &str) -> Option<i64> {
        self.technologies.iter().find(|t| t.id == id).map(|t| t.level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id: String,
    pub player_id: String,
    pub name: String,
    pub coordinates: Coordinate,
    pub fields: i64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub diameter: i64,
    #[serde(default)]
    pub resources: Vec<Stockpile>,
    #[serde(default)]
    pub buildings: Vec<ElementLevel>,
    #[serde(default)]
    pub ships: Vec<ElementCount>,
    #[serde(default)]
    pub defenses: Vec<ElementCount>,
}

impl Planet {
    pub fn average_temperature(&self) -> f64 {
        (self.min_temperature + self.max_temperature) / 2.0
    }

    pub fn building_level(&self, id: &str) -> Option<i64> {
        self.buildings.iter().find(|b| b.id == id).map(|b| b.level)
    }

    /// Fields consumed by buildings: the sum of their levels.
    pub fn used_fields(&self) -> i64 {
        self.buildings.iter().map(|b| b.level).sum()
    }

    pub fn remaining_fields(&self) -> i64 {
        self.fields - self.used_fields()
    }

    /// Amount available per resource.
    pub fn available(&self) -> std::collections::HashMap<String, f64> {
        self.resources
            .iter()
            .map(|r| (r.resource.clone(), r.amount))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    pub id: String,
    pub universe_id: String,
    pub name: String,
    pub objective: String,
    pub target: Coordinate,
}

/// Pending change of level of a building (keyed by planet) or of a
/// technology (keyed by player, researched from a planet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressAction {
    pub id: String,
    pub planet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    pub element_id: String,
    pub current_level: i64,
    pub desired_level: i64,
    /// Unix milliseconds; set when the action is accepted.
    #[serde(default)]
    pub completion_time: i64,
}

/// Pending batch of ships or defenses. Units come out one after the other,
/// each taking `unit_duration` milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedAction {
    pub id: String,
    pub planet_id: String,
    pub element_id: String,
    pub amount: i64,
    pub remaining: i64,
    #[serde(default)]
    pub unit_duration: i64,
    #[serde(default)]
    pub started_at: i64,
    #[serde(default)]
    pub completion_time: i64,
}
