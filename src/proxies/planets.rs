use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use super::{Shared, check_filters, matching_ids, players, translate, universes};
use crate::catalog::Catalog;
use crate::consolidator::ConsolidationTarget;
use crate::db::{Filter, InsertReq, QueryDesc};
use crate::error::{GameError, Result, StoreError, ValidationError};
use crate::models::{Coordinate, ElementCount, ElementLevel, Planet, Stockpile, Universe, new_id};

const PROPS: &[&str] = &[
    "id",
    "player",
    "universe",
    "name",
    "galaxy",
    "solar_system",
    "position",
    "fields",
    "min_temperature",
    "max_temperature",
    "diameter",
];

/// Read a planet without consolidating it. `describe` fills in, for each
/// building, the cost of its next level and its current production.
pub(super) fn load(shared: &Shared, id: &str, describe: bool) -> Result<Planet> {
    let row = shared.fetch_one("planet", "planets", PROPS, id)?;
    let of_planet = |table: &str, props: &[&str], order: &str| {
        shared.fetch(
            QueryDesc::new(table, props)
                .filtered([Filter::eq("planet", id)])
                .ordered_by(order, false),
        )
    };

    let resources = of_planet("planet_resources", &["res", "amount", "production", "storage_capacity"], "res")?
        .iter()
        .map(|row| {
            Ok(Stockpile {
                resource: row.str("res")?,
                amount: row.f64("amount")?,
                production: row.f64("production")?,
                storage: row.f64("storage_capacity")?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    let buildings = of_planet("planet_buildings", &["building", "level"], "building")?
        .iter()
        .map(|row| Ok(ElementLevel::new(row.str("building")?, row.i64("level")?)))
        .collect::<Result<Vec<_>, StoreError>>()?;

    let units = |table: &str, column: &str| -> Result<Vec<ElementCount>> {
        Ok(of_planet(table, &[column, "count"], column)?
            .iter()
            .map(|row| {
                Ok(ElementCount {
                    id: row.str(column)?,
                    count: row.i64("count")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?)
    };

    let mut planet = Planet {
        id: row.str("id")?,
        player_id: row.str("player")?,
        name: row.str("name")?,
        coordinates: Coordinate::new(row.i64("galaxy")?, row.i64("solar_system")?, row.i64("position")?),
        fields: row.i64("fields")?,
        min_temperature: row.f64("min_temperature")?,
        max_temperature: row.f64("max_temperature")?,
        diameter: row.i64("diameter")?,
        resources,
        buildings,
        ships: units("planet_ships", "ship")?,
        defenses: units("planet_defenses", "defense")?,
    };

    if describe {
        let temperature = planet.average_temperature();
        for building in &mut planet.buildings {
            describe_building(&shared.catalog, building, temperature);
        }
    }
    Ok(planet)
}

fn describe_building(catalog: &Catalog, building: &mut ElementLevel, temperature: f64) {
    match catalog.progress_cost(&building.id) {
        Some(cost) => building.next_cost = cost.compute_costs(building.level + 1),
        None => warn!(building = %building.id, "planet.no_cost"),
    }
    building.production = catalog
        .production_rules(&building.id)
        .iter()
        .map(|rule| rule.compute_production(building.level, temperature))
        .collect();
}

/// Player owning `planet`. Ownership never changes, so no lock is needed.
pub(super) fn owner_of(shared: &Shared, planet: &str) -> Result<String> {
    Ok(shared.fetch_one("planet", "planets", &["id", "player"], planet)?.str("player")?)
}

pub struct Planets {
    shared: Arc<Shared>,
}

impl Planets {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Planets matching `filters`, each consolidated before being read.
    pub fn list(&self, filters: &[Filter]) -> Result<Vec<Planet>> {
        check_filters(filters, PROPS)?;

        matching_ids(&self.shared, "planets", filters)?
            .iter()
            .map(|id| {
                self.shared
                    .consolidator
                    .consolidate_and_run(ConsolidationTarget::Planet(id), || load(&self.shared, id, true))
            })
            .collect()
    }

    /// Create a planet for `player`, at `coords` when given. Without
    /// coordinates a free location of the player's universe is drawn at
    /// random, a bounded number of times.
    pub fn create_for(&self, player: &str, coords: Option<Coordinate>) -> Result<String> {
        let player = players::load(&self.shared, player, false)?;
        let uni = universes::load(&self.shared, &player.universe_id)?;
        let first = matching_ids(&self.shared, "planets", &[Filter::eq("player", player.id.as_str())])?.is_empty();
        let mut planet = self.generate(&player.id, first);

        if let Some(coords) = coords {
            if !uni.contains(&coords) {
                return Err(ValidationError::InvalidCoordinates(coords.to_string()).into());
            }
            planet.coordinates = coords;
            self.insert(&planet, &uni)?;
            return Ok(planet.id);
        }

        let mut used = self.used_coordinates(&uni)?;
        let capacity = uni.capacity();
        let trials = self.shared.config.planets.creation_trials;
        let mut rng = rand::thread_rng();

        for _ in 0..trials {
            if used.len() as i64 >= capacity {
                break;
            }

            let coords = loop {
                let candidate = Coordinate::new(
                    rng.gen_range(0..uni.galaxies_count),
                    rng.gen_range(0..uni.galaxy_size),
                    rng.gen_range(0..uni.solar_system_size),
                );
                if !used.contains(&candidate.linearize(&uni)) {
                    break candidate;
                }
            };

            planet.coordinates = coords;
            match self.insert(&planet, &uni) {
                Ok(()) => return Ok(planet.id),
                Err(GameError::Validation(ValidationError::Conflict(reason))) => {
                    warn!(%coords, %reason, "planet.coordinates_taken");
                    used.insert(coords.linearize(&uni));
                }
                Err(err) => return Err(err),
            }
        }

        Err(GameError::CapacityExhausted { trials })
    }

    fn generate(&self, player: &str, homeworld: bool) -> Planet {
        let defaults = &self.shared.config.planets;
        Planet {
            id: new_id(),
            player_id: player.to_string(),
            name: if homeworld { "homeworld" } else { "planet" }.to_string(),
            coordinates: Coordinate::new(0, 0, 0),
            fields: defaults.default_fields,
            min_temperature: defaults.min_temperature,
            max_temperature: defaults.max_temperature,
            diameter: defaults.diameter,
            resources: self
                .shared
                .catalog
                .resources()
                .iter()
                .map(|res| Stockpile {
                    resource: res.id.clone(),
                    amount: res.base_amount,
                    production: res.base_production,
                    storage: res.base_storage,
                })
                .collect(),
            buildings: Vec::new(),
            ships: Vec::new(),
            defenses: Vec::new(),
        }
    }

    fn used_coordinates(&self, uni: &Universe) -> Result<HashSet<i64>> {
        self.shared
            .fetch(
                QueryDesc::new("planets", &["galaxy", "solar_system", "position"])
                    .filtered([Filter::eq("universe", uni.id.as_str())]),
            )?
            .iter()
            .map(|row| {
                let coords = Coordinate::new(row.i64("galaxy")?, row.i64("solar_system")?, row.i64("position")?);
                Ok(coords.linearize(uni))
            })
            .collect()
    }

    fn insert(&self, planet: &Planet, uni: &Universe) -> Result<()> {
        let now = self.shared.now_ms();
        self.shared
            .store
            .insert_to_db(&InsertReq::new(
                "create_planet",
                vec![json!(planet), json!(uni.id), json!(now)],
            ))
            .map_err(|err| {
                translate(err, |err| {
                    err.is_duplicate_on("position")
                        .then(|| format!("coordinates {} are already taken", planet.coordinates))
                })
            })?;

        info!(
            planet = %planet.id,
            player = %planet.player_id,
            coords = %planet.coordinates,
            fields = planet.fields,
            "planet.created"
        );
        Ok(())
    }
}
