use std::sync::Arc;

use serde_json::json;
use tracing::info;

use super::{Shared, assign_id, check_filters, translate, universes};
use crate::db::{Filter, InsertReq, QueryDesc};
use crate::error::{Result, StoreError, ValidationError};
use crate::models::{Coordinate, Fleet};

const PROPS: &[&str] = &["id", "universe", "name", "objective", "galaxy", "solar_system", "position"];

pub struct Fleets {
    shared: Arc<Shared>,
}

impl Fleets {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn list(&self, filters: &[Filter]) -> Result<Vec<Fleet>> {
        check_filters(filters, &["id", "universe", "name", "objective"])?;
        self.shared
            .fetch(
                QueryDesc::new("fleets", PROPS)
                    .filtered(filters.iter().cloned())
                    .ordered_by("name", false),
            )?
            .iter()
            .map(|row| {
                Ok(Fleet {
                    id: row.str("id")?,
                    universe_id: row.str("universe")?,
                    name: row.str("name")?,
                    objective: row.str("objective")?,
                    target: Coordinate::new(row.i64("galaxy")?, row.i64("solar_system")?, row.i64("position")?),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()
            .map_err(Into::into)
    }

    /// Register a fleet heading to `fleet.target`, which must lie inside its
    /// universe.
    pub fn create(&self, mut fleet: Fleet) -> Result<String> {
        assign_id(&mut fleet.id)?;
        if fleet.name.trim().is_empty() {
            return Err(ValidationError::InvalidField("empty fleet name".to_string()).into());
        }

        let uni = universes::load(&self.shared, &fleet.universe_id)?;
        if !uni.contains(&fleet.target) {
            return Err(ValidationError::InvalidCoordinates(fleet.target.to_string()).into());
        }

        self.shared
            .store
            .insert_to_db(&InsertReq::new("create_fleet", vec![json!(fleet)]))
            .map_err(|err| {
                translate(err, |err| {
                    matches!(err, StoreError::ForeignKey(_))
                        .then(|| format!("universe \"{}\" does not exist", fleet.universe_id))
                })
            })?;

        info!(fleet = %fleet.id, universe = %uni.id, target = %fleet.target, "fleet.created");
        Ok(fleet.id)
    }
}
