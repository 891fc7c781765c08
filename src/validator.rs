//! Admissibility of upgrade actions and their timing
//!
//! Validation has two outcomes besides success. A malformed action (bad
//! identifier, unknown element, impossible levels or amounts) or broken
//! content is an error. A well-formed action the planet cannot afford, or
//! whose prerequisites are unmet, is a [`Verdict::Rejected`].

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::catalog::Catalog;
use crate::costs::{self, ResourceEffect};
use crate::error::{GameError, Result, ValidationError};
use crate::models::{ElementKind, FixedAction, Planet, Player, ProgressAction, ResourceAmount, valid_id};
use crate::tech_tree::DependencyGraph;

const ROBOTICS_FACTORY: &str = "robotics factory";
const NANITE_FACTORY: &str = "nanite factory";
const RESEARCH_LAB: &str = "research lab";
const SHIPYARD: &str = "shipyard";

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MIN_DURATION_MS: i64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "action", rename_all = "lowercase")]
pub enum UpgradeAction {
    Building(ProgressAction),
    Technology(ProgressAction),
    Ship(FixedAction),
    Defense(FixedAction),
}

/// What the planet and player look like when the action is checked.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub catalog: &'a Catalog,
    pub planet: &'a Planet,
    pub player: &'a Player,
    pub allow_building_downgrade: bool,
}

/// Everything needed to commit an accepted action.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub costs: Vec<ResourceAmount>,
    /// Whole action for leveled elements, a single unit otherwise.
    pub duration: Duration,
    pub production_effects: Vec<ResourceEffect>,
    pub storage_effects: Vec<ResourceEffect>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(Plan),
    Rejected(ValidationError),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

impl UpgradeAction {
    pub fn kind(&self) -> ElementKind {
        match self {
            UpgradeAction::Building(_) => ElementKind::Building,
            UpgradeAction::Technology(_) => ElementKind::Technology,
            UpgradeAction::Ship(_) => ElementKind::Ship,
            UpgradeAction::Defense(_) => ElementKind::Defense,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            UpgradeAction::Building(a) | UpgradeAction::Technology(a) => &a.id,
            UpgradeAction::Ship(a) | UpgradeAction::Defense(a) => &a.id,
        }
    }

    pub fn planet_id(&self) -> &str {
        match self {
            UpgradeAction::Building(a) | UpgradeAction::Technology(a) => &a.planet_id,
            UpgradeAction::Ship(a) | UpgradeAction::Defense(a) => &a.planet_id,
        }
    }

    pub fn element_id(&self) -> &str {
        match self {
            UpgradeAction::Building(a) | UpgradeAction::Technology(a) => &a.element_id,
            UpgradeAction::Ship(a) | UpgradeAction::Defense(a) => &a.element_id,
        }
    }

    pub fn validate(&self, ctx: &ValidationContext<'_>) -> Result<Verdict> {
        for id in [self.id(), self.planet_id(), self.element_id()] {
            if !valid_id(id) {
                return Err(ValidationError::InvalidId(id.to_string()).into());
            }
        }
        if self.planet_id() != ctx.planet.id {
            return Err(ValidationError::InvalidField(format!(
                "action targets planet \"{}\", not \"{}\"",
                self.planet_id(),
                ctx.planet.id
            ))
            .into());
        }
        if ctx.planet.player_id != ctx.player.id {
            return Err(ValidationError::InvalidField(format!(
                "planet \"{}\" does not belong to player \"{}\"",
                ctx.planet.id, ctx.player.id
            ))
            .into());
        }

        let element = ctx
            .catalog
            .element(self.element_id())
            .ok_or_else(|| ValidationError::UnknownElement(self.element_id().to_string()))?;
        if element.kind != self.kind() {
            return Err(ValidationError::WrongElementKind {
                element: element.id.clone(),
                expected: self.kind().as_str(),
                actual: element.kind.to_string(),
            }
            .into());
        }

        match self {
            UpgradeAction::Building(action) => validate_building(action, ctx),
            UpgradeAction::Technology(action) => validate_technology(action, ctx),
            UpgradeAction::Ship(action) | UpgradeAction::Defense(action) => validate_units(action, ctx),
        }
    }
}

/// Every resource in `costs` must be available in at least that amount.
/// A resource missing from `available` cannot be paid for.
pub fn enough_resources(costs: &[ResourceAmount], available: &HashMap<String, f64>) -> bool {
    costs.iter().all(|cost| {
        available
            .get(&cost.resource)
            .is_some_and(|&amount| amount >= cost.amount)
    })
}

/// Whether the planet's buildings and the player's technologies meet the
/// prerequisites of `element`. An element the tree does not know about is
/// a content error.
pub fn meets_tech_criteria(
    tree: &DependencyGraph,
    element: &str,
    planet: &Planet,
    player: &Player,
) -> Result<bool> {
    tree.is_satisfied(element, |id| {
        planet
            .building_level(id)
            .or_else(|| player.technology_level(id))
    })
    .ok_or_else(|| content_error(element, "no tech tree entry"))
}

/// Catalog inconsistencies are operator problems, not player mistakes.
fn content_error(element: &str, missing: &str) -> GameError {
    error!(element, missing, "validator.content_inconsistent");
    GameError::ContentData(format!("{missing} for element \"{element}\""))
}

fn check_level(action: &ProgressAction, actual: i64) -> Result<()> {
    if action.current_level < 0 || action.desired_level < 0 {
        return Err(ValidationError::InvalidLevels {
            element: action.element_id.clone(),
            current: action.current_level,
            desired: action.desired_level,
        }
        .into());
    }
    if action.current_level != actual {
        return Err(ValidationError::StaleLevel {
            element: action.element_id.clone(),
            actual,
            assumed: action.current_level,
        }
        .into());
    }
    Ok(())
}

fn invalid_levels(action: &ProgressAction) -> GameError {
    ValidationError::InvalidLevels {
        element: action.element_id.clone(),
        current: action.current_level,
        desired: action.desired_level,
    }
    .into()
}

/// Resources, then prerequisites: the order rejections are reported in.
fn admissible(
    element: &str,
    costs: &[ResourceAmount],
    ctx: &ValidationContext<'_>,
    check_tech: bool,
) -> Result<Option<ValidationError>> {
    if !enough_resources(costs, &ctx.planet.available()) {
        return Ok(Some(ValidationError::NotEnoughResources(element.to_string())));
    }
    if check_tech && !meets_tech_criteria(ctx.catalog.tech_tree(), element, ctx.planet, ctx.player)? {
        return Ok(Some(ValidationError::UnmetDependencies(element.to_string())));
    }
    Ok(None)
}

fn progress_costs(ctx: &ValidationContext<'_>, element: &str, level: i64) -> Result<Vec<ResourceAmount>> {
    let cost = ctx
        .catalog
        .progress_cost(element)
        .ok_or_else(|| content_error(element, "no progress cost"))?;
    Ok(cost.compute_costs(level))
}

fn validate_building(action: &ProgressAction, ctx: &ValidationContext<'_>) -> Result<Verdict> {
    let element = action.element_id.as_str();
    check_level(action, ctx.planet.building_level(element).unwrap_or(0))?;

    let upgrade = action.desired_level == action.current_level + 1;
    let downgrade = action.desired_level == action.current_level - 1 && action.current_level > 0;
    if !upgrade && !(downgrade && ctx.allow_building_downgrade) {
        return Err(invalid_levels(action));
    }

    // Demolishing a level costs what building it did.
    let cost_level = if upgrade { action.desired_level } else { action.current_level };
    let costs = progress_costs(ctx, element, cost_level)?;

    if let Some(reason) = admissible(element, &costs, ctx, upgrade)? {
        return Ok(Verdict::Rejected(reason));
    }
    if upgrade && ctx.planet.remaining_fields() <= 0 {
        return Ok(Verdict::Rejected(ValidationError::NoFieldLeft(ctx.planet.id.clone())));
    }

    let helper = |name: &str| helper_level(ctx, name);
    let hours = metal_and_crystal(ctx.catalog, &costs)
        / (2500.0 * (1.0 + helper(ROBOTICS_FACTORY)) * 2f64.powf(helper(NANITE_FACTORY)));

    let temperature = ctx.planet.average_temperature();
    Ok(Verdict::Accepted(Plan {
        duration: from_hours(hours),
        production_effects: costs::production_effects(
            ctx.catalog.production_rules(element),
            action.current_level,
            action.desired_level,
            temperature,
        ),
        storage_effects: costs::storage_effects(
            ctx.catalog.storage_rules(element),
            action.current_level,
            action.desired_level,
        ),
        costs,
    }))
}

fn validate_technology(action: &ProgressAction, ctx: &ValidationContext<'_>) -> Result<Verdict> {
    let element = action.element_id.as_str();
    if let Some(player) = &action.player_id {
        if player != &ctx.player.id {
            return Err(ValidationError::InvalidField(format!(
                "action belongs to player \"{player}\", not \"{}\"",
                ctx.player.id
            ))
            .into());
        }
    }
    check_level(action, ctx.player.technology_level(element).unwrap_or(0))?;
    if action.desired_level != action.current_level + 1 {
        return Err(invalid_levels(action));
    }

    let costs = progress_costs(ctx, element, action.desired_level)?;
    if let Some(reason) = admissible(element, &costs, ctx, true)? {
        return Ok(Verdict::Rejected(reason));
    }

    let hours = metal_and_crystal(ctx.catalog, &costs) / (1000.0 * (1.0 + helper_level(ctx, RESEARCH_LAB)));
    Ok(Verdict::Accepted(Plan {
        costs,
        duration: from_hours(hours),
        production_effects: Vec::new(),
        storage_effects: Vec::new(),
    }))
}

fn validate_units(action: &FixedAction, ctx: &ValidationContext<'_>) -> Result<Verdict> {
    let element = action.element_id.as_str();
    if action.amount <= 0 || action.remaining < 0 || action.remaining > action.amount {
        return Err(ValidationError::InvalidAmount {
            amount: action.amount,
            remaining: action.remaining,
        }
        .into());
    }

    let cost = ctx
        .catalog
        .fixed_cost(element)
        .ok_or_else(|| content_error(element, "no fixed cost"))?;
    let costs = cost.compute_costs(action.remaining);

    if let Some(reason) = admissible(element, &costs, ctx, true)? {
        return Ok(Verdict::Rejected(reason));
    }

    let hours = metal_and_crystal(ctx.catalog, &cost.compute_costs(1))
        / (2500.0 * (1.0 + helper_level(ctx, SHIPYARD)) * 2f64.powf(helper_level(ctx, NANITE_FACTORY)));
    Ok(Verdict::Accepted(Plan {
        costs,
        duration: from_hours(hours),
        production_effects: Vec::new(),
        storage_effects: Vec::new(),
    }))
}

/// Level of the named building on the planet, 0 when absent.
fn helper_level(ctx: &ValidationContext<'_>, name: &str) -> f64 {
    ctx.catalog
        .element_by_name(name)
        .and_then(|b| ctx.planet.building_level(&b.id))
        .unwrap_or(0) as f64
}

fn metal_and_crystal(catalog: &Catalog, costs: &[ResourceAmount]) -> f64 {
    ["metal", "crystal"]
        .into_iter()
        .filter_map(|name| catalog.resource_by_name(name))
        .map(|res| costs::amount_of(costs, &res.id))
        .sum()
}

fn from_hours(hours: f64) -> Duration {
    let ms = (hours * MILLIS_PER_HOUR).round() as i64;
    Duration::milliseconds(ms.max(MIN_DURATION_MS))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::catalog::{ElementInfo, ResourceInfo};
    use crate::costs::{ConstructionCost, FixedCost};
    use crate::models::{Coordinate, ElementLevel, Stockpile, new_id};

    struct World {
        catalog: Catalog,
        planet: Planet,
        player: Player,
        metal: String,
        crystal: String,
    }

    impl World {
        fn new() -> Self {
            let mut catalog = Catalog::new();
            let metal = new_id();
            let crystal = new_id();
            for (id, name) in [(&metal, "metal"), (&crystal, "crystal")] {
                catalog.insert_resource(ResourceInfo {
                    id: id.clone(),
                    name: name.to_string(),
                    base_amount: 500.0,
                    base_production: 0.0,
                    base_storage: 10000.0,
                });
            }

            let player = Player {
                id: new_id(),
                account_id: new_id(),
                universe_id: new_id(),
                name: "tester".to_string(),
                technologies: Vec::new(),
            };
            let planet = Planet {
                id: new_id(),
                player_id: player.id.clone(),
                name: "homeworld".to_string(),
                coordinates: Coordinate::new(1, 1, 1),
                fields: 163,
                min_temperature: -20.0,
                max_temperature: 30.0,
                diameter: 12800,
                resources: vec![
                    Stockpile {
                        resource: metal.clone(),
                        amount: 500.0,
                        production: 0.0,
                        storage: 10000.0,
                    },
                    Stockpile {
                        resource: crystal.clone(),
                        amount: 500.0,
                        production: 0.0,
                        storage: 10000.0,
                    },
                ],
                buildings: Vec::new(),
                ships: Vec::new(),
                defenses: Vec::new(),
            };

            Self {
                catalog,
                planet,
                player,
                metal,
                crystal,
            }
        }

        fn add(&mut self, name: &str, kind: ElementKind, metal: i64, crystal: i64) -> String {
            let id = new_id();
            self.catalog.insert_element(ElementInfo {
                id: id.clone(),
                name: name.to_string(),
                kind,
            });
            let base: BTreeMap<_, _> = [(self.metal.clone(), metal), (self.crystal.clone(), crystal)].into();
            if kind.is_leveled() {
                self.catalog.set_progress_cost(&id, ConstructionCost::new(base, 2.0));
            } else {
                self.catalog.set_fixed_cost(&id, FixedCost::new(base));
            }
            id
        }

        fn ctx(&self) -> ValidationContext<'_> {
            ValidationContext {
                catalog: &self.catalog,
                planet: &self.planet,
                player: &self.player,
                allow_building_downgrade: false,
            }
        }

        fn building(&self, element: &str, current: i64, desired: i64) -> UpgradeAction {
            UpgradeAction::Building(ProgressAction {
                id: new_id(),
                planet_id: self.planet.id.clone(),
                player_id: None,
                element_id: element.to_string(),
                current_level: current,
                desired_level: desired,
                completion_time: 0,
            })
        }

        fn ships(&self, element: &str, amount: i64, remaining: i64) -> UpgradeAction {
            UpgradeAction::Ship(FixedAction {
                id: new_id(),
                planet_id: self.planet.id.clone(),
                element_id: element.to_string(),
                amount,
                remaining,
                unit_duration: 0,
                started_at: 0,
                completion_time: 0,
            })
        }
    }

    #[test]
    fn unaffordable_action_is_rejected_not_an_error() {
        let mut world = World::new();
        let lab = world.add("research lab", ElementKind::Building, 300, 600);

        let verdict = world.building(&lab, 0, 1).validate(&world.ctx()).unwrap();
        assert_eq!(verdict, Verdict::Rejected(ValidationError::NotEnoughResources(lab)));
    }

    #[test]
    fn rejections_can_be_kept_after_validation() {
        let mut world = World::new();
        let lab = world.add("research lab", ElementKind::Building, 300, 600);

        let verdict = world.building(&lab, 0, 1).validate(&world.ctx()).unwrap();
        let kept = verdict.clone();
        assert!(!kept.is_accepted());
        assert_eq!(kept, verdict);
    }

    #[test]
    fn affordability_fails_closed_on_missing_resource() {
        let available: HashMap<String, f64> = [("metal".to_string(), 1e9)].into();
        let costs = vec![ResourceAmount::new("metal", 10.0), ResourceAmount::new("crystal", 1.0)];
        assert!(!enough_resources(&costs, &available));
        assert!(enough_resources(&costs[..1], &available));
    }

    #[test]
    fn missing_shipyard_rejects_ship_order() {
        let mut world = World::new();
        let shipyard = world.add("shipyard", ElementKind::Building, 400, 200);
        let probe = world.add("espionage probe", ElementKind::Ship, 0, 10);
        world.catalog.add_dependency(&probe, &shipyard, 1);

        let verdict = world.ships(&probe, 10, 10).validate(&world.ctx()).unwrap();
        assert_eq!(verdict, Verdict::Rejected(ValidationError::UnmetDependencies(probe.clone())));

        world.planet.buildings.push(ElementLevel::new(shipyard, 1));
        assert!(world.ships(&probe, 10, 10).validate(&world.ctx()).unwrap().is_accepted());
    }

    #[test]
    fn remaining_must_not_exceed_amount() {
        let mut world = World::new();
        let probe = world.add("espionage probe", ElementKind::Ship, 0, 10);
        let err = world.ships(&probe, 2, 3).validate(&world.ctx()).unwrap_err();
        assert!(matches!(
            err,
            GameError::Validation(ValidationError::InvalidAmount { amount: 2, remaining: 3 })
        ));
    }

    #[test]
    fn buildings_only_go_up_one_level() {
        let mut world = World::new();
        let mine = world.add("metal mine", ElementKind::Building, 60, 15);

        let err = world.building(&mine, 0, 2).validate(&world.ctx()).unwrap_err();
        assert!(matches!(err, GameError::Validation(ValidationError::InvalidLevels { .. })));

        let err = world.building(&mine, 3, 4).validate(&world.ctx()).unwrap_err();
        assert!(matches!(err, GameError::Validation(ValidationError::StaleLevel { actual: 0, .. })));
    }

    #[test]
    fn downgrade_needs_configuration() {
        let mut world = World::new();
        let mine = world.add("metal mine", ElementKind::Building, 60, 15);
        world.planet.buildings.push(ElementLevel::new(mine.clone(), 2));

        let action = world.building(&mine, 2, 1);
        assert!(action.validate(&world.ctx()).is_err());

        let ctx = ValidationContext {
            allow_building_downgrade: true,
            ..world.ctx()
        };
        match action.validate(&ctx).unwrap() {
            Verdict::Accepted(plan) => assert_eq!(costs::amount_of(&plan.costs, &world.metal), 120.0),
            other => panic!("downgrade refused: {other:?}"),
        }
    }

    #[test]
    fn full_planet_rejects_upgrades() {
        let mut world = World::new();
        let mine = world.add("metal mine", ElementKind::Building, 60, 15);
        world.planet.fields = 3;
        world.planet.buildings.push(ElementLevel::new(mine.clone(), 3));

        let verdict = world.building(&mine, 3, 4).validate(&world.ctx()).unwrap();
        assert!(matches!(verdict, Verdict::Rejected(ValidationError::NoFieldLeft(_))));
    }

    #[test]
    fn unknown_element_is_a_validation_error() {
        let world = World::new();
        let err = world.building(&new_id(), 0, 1).validate(&world.ctx()).unwrap_err();
        assert!(matches!(err, GameError::Validation(ValidationError::UnknownElement(_))));
    }

    #[test]
    fn element_missing_from_tech_tree_is_a_content_error() {
        let world = World::new();
        let err = meets_tech_criteria(world.catalog.tech_tree(), "ghost", &world.planet, &world.player)
            .unwrap_err();
        assert!(matches!(err, GameError::ContentData(_)));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn missing_costs_are_logged_as_errors() {
        let mut world = World::new();
        let mine = new_id();
        world.catalog.insert_element(ElementInfo {
            id: mine.clone(),
            name: "uncosted mine".to_string(),
            kind: ElementKind::Building,
        });

        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let err = tracing::subscriber::with_default(subscriber, || {
            world.building(&mine, 0, 1).validate(&world.ctx()).unwrap_err()
        });
        assert!(matches!(err, GameError::ContentData(_)));

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ERROR"), "{output}");
        assert!(output.contains("validator.content_inconsistent"), "{output}");
        assert!(output.contains(&mine), "{output}");
    }

    #[test]
    fn robotics_factory_speeds_up_construction() {
        let mut world = World::new();
        let robotics = world.add("robotics factory", ElementKind::Building, 1, 1);
        let mine = world.add("metal mine", ElementKind::Building, 200, 50);

        let duration = |world: &World| match world.building(&mine, 0, 1).validate(&world.ctx()).unwrap() {
            Verdict::Accepted(plan) => plan.duration,
            other => panic!("rejected: {other:?}"),
        };

        // 250 / 2500 hours = 6 minutes
        assert_eq!(duration(&world), Duration::minutes(6));
        world.planet.buildings.push(ElementLevel::new(robotics, 1));
        assert_eq!(duration(&world), Duration::minutes(3));
    }
}
