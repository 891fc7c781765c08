//! Game content: resources and elements with their costs, prerequisites,
//! production and storage rules.
//!
//! Content is described by name. Imports upsert on name, so importing the
//! same description twice leaves the catalog unchanged.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db::{InsertReq, Store};
use crate::models::ElementKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentFile {
    #[serde(default)]
    pub resources: Vec<ResourceDef>,
    #[serde(default)]
    pub elements: Vec<ElementDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    #[serde(default)]
    pub base_amount: f64,
    /// Hourly production of a fresh planet.
    #[serde(default)]
    pub base_production: f64,
    #[serde(default)]
    pub base_storage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDef {
    pub name: String,
    pub kind: ElementKind,
    /// Resource name -> cost at level 1, or per unit.
    #[serde(default)]
    pub costs: BTreeMap<String, i64>,
    /// Only meaningful for buildings and technologies.
    #[serde(default)]
    pub progression: Option<f64>,
    #[serde(default)]
    pub requirements: Vec<RequirementDef>,
    #[serde(default)]
    pub production: Vec<ProductionDef>,
    #[serde(default)]
    pub storage: Vec<StorageDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementDef {
    pub name: String,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionDef {
    pub resource: String,
    pub base: f64,
    pub progression: f64,
    #[serde(default)]
    pub temperature_coeff: f64,
    #[serde(default = "default_temperature_offset")]
    pub temperature_offset: f64,
}

fn default_temperature_offset() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageDef {
    pub resource: String,
    pub base: f64,
    pub progression: f64,
}

impl ContentFile {
    pub fn merge(&mut self, other: ContentFile) {
        self.resources.extend(other.resources);
        self.elements.extend(other.elements);
    }
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub resources: usize,
    pub elements: usize,
    pub requirements: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} resources and {} elements ({} requirements) from {} file(s). Errors: {}",
            self.resources, self.elements, self.requirements, self.files, self.errors
        )
    }
}

/// Store a content description through the `import_content` procedure.
pub fn import(store: &dyn Store, content: &ContentFile) -> Result<ImportStats> {
    store
        .insert_to_db(&InsertReq::new(
            "import_content",
            vec![serde_json::to_value(content)?],
        ))
        .context("Failed to import content")?;

    Ok(ImportStats {
        files: 0,
        resources: content.resources.len(),
        elements: content.elements.len(),
        requirements: content.elements.iter().map(|e| e.requirements.len()).sum(),
        errors: 0,
    })
}

/// Import every `*.json` content file found under `dir`. Files are merged
/// first so requirements may point to elements described in another file.
pub fn import_dir(store: &dyn Store, dir: &Path) -> Result<ImportStats> {
    let mut paths: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut merged = ContentFile::default();
    let mut files = 0;
    let mut errors = 0;

    for path in &paths {
        let parsed = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .and_then(|raw| {
                serde_json::from_str::<ContentFile>(&raw)
                    .with_context(|| format!("Failed to parse {}", path.display()))
            });

        match parsed {
            Ok(content) => {
                info!(
                    file = %path.display(),
                    resources = content.resources.len(),
                    elements = content.elements.len(),
                    "content.parsed"
                );
                merged.merge(content);
                files += 1;
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "content.skipped");
                errors += 1;
            }
        }
    }

    let mut stats = import(store, &merged)?;
    stats.files = files;
    stats.errors = errors;
    Ok(stats)
}

fn costs(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
    pairs.iter().map(|(res, c)| (res.to_string(), *c)).collect()
}

fn requires(pairs: &[(&str, i64)]) -> Vec<RequirementDef> {
    pairs
        .iter()
        .map(|(name, level)| RequirementDef {
            name: name.to_string(),
            level: *level,
        })
        .collect()
}

fn leveled(
    name: &str,
    kind: ElementKind,
    cost: &[(&str, i64)],
    progression: f64,
    requirements: &[(&str, i64)],
) -> ElementDef {
    ElementDef {
        name: name.to_string(),
        kind,
        costs: costs(cost),
        progression: Some(progression),
        requirements: requires(requirements),
        production: Vec::new(),
        storage: Vec::new(),
    }
}

fn unit(name: &str, kind: ElementKind, cost: &[(&str, i64)], requirements: &[(&str, i64)]) -> ElementDef {
    ElementDef {
        name: name.to_string(),
        kind,
        costs: costs(cost),
        progression: None,
        requirements: requires(requirements),
        production: Vec::new(),
        storage: Vec::new(),
    }
}

fn mine(name: &str, cost: &[(&str, i64)], progression: f64, production: ProductionDef) -> ElementDef {
    ElementDef {
        production: vec![production],
        ..leveled(name, ElementKind::Building, cost, progression, &[])
    }
}

fn storage(name: &str, resource: &str) -> ElementDef {
    let cost: &[(&str, i64)] = match resource {
        "metal" => &[("metal", 1000)],
        "crystal" => &[("metal", 1000), ("crystal", 500)],
        _ => &[("metal", 1000), ("crystal", 1000)],
    };
    ElementDef {
        storage: vec![StorageDef {
            resource: resource.to_string(),
            base: 10000.0,
            progression: 1.5,
        }],
        ..leveled(name, ElementKind::Building, cost, 2.0, &[])
    }
}

fn produces(resource: &str, base: f64, progression: f64) -> ProductionDef {
    ProductionDef {
        resource: resource.to_string(),
        base,
        progression,
        temperature_coeff: 0.0,
        temperature_offset: 1.0,
    }
}

/// Small self-contained content set, enough to play the early game.
pub fn sample_content() -> ContentFile {
    use ElementKind::{Building, Defense, Ship, Technology};

    let resources = [
        ("metal", 500.0, 30.0, 10000.0),
        ("crystal", 500.0, 15.0, 10000.0),
        ("deuterium", 0.0, 0.0, 10000.0),
        ("energy", 0.0, 0.0, 0.0),
    ]
    .into_iter()
    .map(|(name, base_amount, base_production, base_storage)| ResourceDef {
        name: name.to_string(),
        base_amount,
        base_production,
        base_storage,
    })
    .collect();

    let elements = vec![
        mine(
            "metal mine",
            &[("metal", 60), ("crystal", 15)],
            1.5,
            produces("metal", 30.0, 1.1),
        ),
        mine(
            "crystal mine",
            &[("metal", 48), ("crystal", 24)],
            1.6,
            produces("crystal", 20.0, 1.1),
        ),
        mine(
            "deuterium synthesizer",
            &[("metal", 225), ("crystal", 75)],
            1.5,
            ProductionDef {
                temperature_coeff: -0.004,
                temperature_offset: 1.44,
                ..produces("deuterium", 10.0, 1.1)
            },
        ),
        mine(
            "solar plant",
            &[("metal", 75), ("crystal", 30)],
            1.5,
            produces("energy", 20.0, 1.1),
        ),
        storage("metal storage", "metal"),
        storage("crystal storage", "crystal"),
        storage("deuterium tank", "deuterium"),
        leveled(
            "robotics factory",
            Building,
            &[("metal", 400), ("crystal", 120), ("deuterium", 200)],
            2.0,
            &[],
        ),
        leveled(
            "shipyard",
            Building,
            &[("metal", 400), ("crystal", 200), ("deuterium", 100)],
            2.0,
            &[("robotics factory", 2)],
        ),
        leveled(
            "research lab",
            Building,
            &[("metal", 200), ("crystal", 400), ("deuterium", 200)],
            2.0,
            &[],
        ),
        leveled(
            "nanite factory",
            Building,
            &[("metal", 1_000_000), ("crystal", 500_000), ("deuterium", 100_000)],
            2.0,
            &[("robotics factory", 10), ("computer technology", 10)],
        ),
        leveled(
            "energy technology",
            Technology,
            &[("crystal", 800), ("deuterium", 400)],
            2.0,
            &[("research lab", 1)],
        ),
        leveled(
            "computer technology",
            Technology,
            &[("crystal", 400), ("deuterium", 600)],
            2.0,
            &[("research lab", 1)],
        ),
        leveled(
            "laser technology",
            Technology,
            &[("metal", 200), ("crystal", 100)],
            2.0,
            &[("research lab", 1), ("energy technology", 2)],
        ),
        leveled(
            "combustion drive",
            Technology,
            &[("metal", 400), ("deuterium", 600)],
            2.0,
            &[("research lab", 1), ("energy technology", 1)],
        ),
        leveled(
            "weapons technology",
            Technology,
            &[("metal", 800), ("crystal", 200)],
            2.0,
            &[("research lab", 4)],
        ),
        unit(
            "light fighter",
            Ship,
            &[("metal", 3000), ("crystal", 1000)],
            &[("shipyard", 1), ("combustion drive", 1)],
        ),
        unit(
            "small cargo ship",
            Ship,
            &[("metal", 2000), ("crystal", 2000)],
            &[("shipyard", 2), ("combustion drive", 2)],
        ),
        unit(
            "espionage probe",
            Ship,
            &[("crystal", 1000)],
            &[("shipyard", 3), ("combustion drive", 3)],
        ),
        unit("rocket launcher", Defense, &[("metal", 2000)], &[("shipyard", 1)]),
        unit(
            "light laser",
            Defense,
            &[("metal", 1500), ("crystal", 500)],
            &[("shipyard", 2), ("laser technology", 3)],
        ),
    ];

    ContentFile { resources, elements }
}
