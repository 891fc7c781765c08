//! Cost curves for leveled and unit-like elements, and the production and
//! storage rules applied when a building changes level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::ResourceAmount;

/// Cost of a building or technology: base cost at level 1 grown by
/// `progression` per additional level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionCost {
    pub base: BTreeMap<String, i64>,
    pub progression: f64,
}

impl ConstructionCost {
    pub fn new(base: BTreeMap<String, i64>, progression: f64) -> Self {
        Self { base, progression }
    }

    /// Cost to reach `level`; `level` starts at 1.
    pub fn compute_costs(&self, level: i64) -> Vec<ResourceAmount> {
        debug_assert!(level >= 1, "level {level} has no construction cost");
        let exponent = (level - 1).max(0) as i32;
        let factor = self.progression.powi(exponent);

        self.base
            .iter()
            .map(|(res, &cost)| ResourceAmount::new(res.clone(), (cost as f64 * factor).round()))
            .collect()
    }
}

/// Cost of a ship or defense: a flat price per unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedCost {
    pub per_unit: BTreeMap<String, i64>,
}

impl FixedCost {
    pub fn new(per_unit: BTreeMap<String, i64>) -> Self {
        Self { per_unit }
    }

    pub fn compute_costs(&self, count: i64) -> Vec<ResourceAmount> {
        debug_assert!(count >= 0, "negative unit count {count}");
        if count <= 0 {
            return Vec::new();
        }

        self.per_unit
            .iter()
            .map(|(res, &cost)| ResourceAmount::new(res.clone(), (cost * count) as f64))
            .collect()
    }
}

/// Hourly production of a resource by a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRule {
    pub resource: String,
    pub base: f64,
    pub progression: f64,
    pub temperature_coeff: f64,
    pub temperature_offset: f64,
}

impl ProductionRule {
    pub fn compute_production(&self, level: i64, temperature: f64) -> ResourceAmount {
        if level <= 0 {
            return ResourceAmount::new(self.resource.clone(), 0.0);
        }

        let temp_factor = (self.temperature_coeff * temperature + self.temperature_offset).max(0.0);
        let level = level as f64;
        let amount = self.base * level * self.progression.powf(level) * temp_factor;

        ResourceAmount::new(self.resource.clone(), amount)
    }
}

/// Storage capacity a building grants for a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRule {
    pub resource: String,
    pub base: f64,
    pub progression: f64,
}

impl StorageRule {
    pub fn compute_storage(&self, level: i64) -> ResourceAmount {
        if level <= 0 {
            return ResourceAmount::new(self.resource.clone(), 0.0);
        }

        let amount = self.base * self.progression.powf(level as f64);
        ResourceAmount::new(self.resource.clone(), amount)
    }
}

/// Per-resource change a building level change applies to a planet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEffect {
    pub resource: String,
    pub change: f64,
}

pub fn production_effects(
    rules: &[ProductionRule],
    from: i64,
    to: i64,
    temperature: f64,
) -> Vec<ResourceEffect> {
    rules
        .iter()
        .map(|rule| ResourceEffect {
            resource: rule.resource.clone(),
            change: rule.compute_production(to, temperature).amount
                - rule.compute_production(from, temperature).amount,
        })
        .collect()
}

pub fn storage_effects(rules: &[StorageRule], from: i64, to: i64) -> Vec<ResourceEffect> {
    rules
        .iter()
        .map(|rule| ResourceEffect {
            resource: rule.resource.clone(),
            change: rule.compute_storage(to).amount - rule.compute_storage(from).amount,
        })
        .collect()
}

/// Amount of `resource` in a cost vector, zero when absent.
pub fn amount_of(costs: &[ResourceAmount], resource: &str) -> f64 {
    costs
        .iter()
        .filter(|c| c.resource == resource)
        .map(|c| c.amount)
        .sum()
}
