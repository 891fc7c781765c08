use std::sync::Arc;

use serde_json::json;
use tracing::info;

use super::{Shared, assign_id, check_filters, translate};
use crate::db::{Filter, InsertReq, QueryDesc, Row};
use crate::error::{Result, StoreError, ValidationError};
use crate::models::Universe;

const PROPS: &[&str] = &[
    "id",
    "name",
    "economic_speed",
    "fleet_speed",
    "research_speed",
    "fleets_to_ruins_ratio",
    "defenses_to_ruins_ratio",
    "fleets_consumption_ratio",
    "galaxies_count",
    "galaxy_size",
    "solar_system_size",
];

pub(super) fn universe_from(row: &Row) -> Result<Universe, StoreError> {
    Ok(Universe {
        id: row.str("id")?,
        name: row.str("name")?,
        economic_speed: row.i64("economic_speed")?,
        fleet_speed: row.i64("fleet_speed")?,
        research_speed: row.i64("research_speed")?,
        fleets_to_ruins_ratio: row.f64("fleets_to_ruins_ratio")?,
        defenses_to_ruins_ratio: row.f64("defenses_to_ruins_ratio")?,
        fleets_consumption_ratio: row.f64("fleets_consumption_ratio")?,
        galaxies_count: row.i64("galaxies_count")?,
        galaxy_size: row.i64("galaxy_size")?,
        solar_system_size: row.i64("solar_system_size")?,
    })
}

pub(super) fn load(shared: &Shared, id: &str) -> Result<Universe> {
    let row = shared.fetch_one("universe", "universes", PROPS, id)?;
    Ok(universe_from(&row)?)
}

pub struct Universes {
    shared: Arc<Shared>,
}

impl Universes {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn list(&self, filters: &[Filter]) -> Result<Vec<Universe>> {
        check_filters(filters, &["id", "name"])?;
        self.shared
            .fetch(
                QueryDesc::new("universes", PROPS)
                    .filtered(filters.iter().cloned())
                    .ordered_by("name", false),
            )?
            .iter()
            .map(|row| Ok(universe_from(row)?))
            .collect()
    }

    pub fn create(&self, mut uni: Universe) -> Result<String> {
        assign_id(&mut uni.id)?;

        let invalid = |what: &str| -> Result<String> {
            Err(ValidationError::InvalidField(format!("{what} for universe \"{}\"", uni.name)).into())
        };
        if uni.name.trim().is_empty() {
            return invalid("empty name");
        }
        if uni.galaxies_count <= 0 || uni.galaxy_size <= 0 || uni.solar_system_size <= 0 {
            return invalid("non-positive dimensions");
        }
        if uni.checked_capacity().is_none() {
            return invalid("dimensions too large");
        }
        if uni.economic_speed <= 0 || uni.fleet_speed <= 0 || uni.research_speed <= 0 {
            return invalid("non-positive speeds");
        }
        if uni.fleets_to_ruins_ratio < 0.0
            || uni.defenses_to_ruins_ratio < 0.0
            || uni.fleets_consumption_ratio < 0.0
        {
            return invalid("negative ratios");
        }

        self.shared
            .store
            .insert_to_db(&InsertReq::new("create_universe", vec![json!(uni)]))
            .map_err(|err| {
                translate(err, |err| {
                    err.is_duplicate_on("name")
                        .then(|| format!("universe name \"{}\" is already in use", uni.name))
                })
            })?;

        info!(universe = %uni.id, name = %uni.name, "universe.created");
        Ok(uni.id)
    }
}
