use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use super::{Shared, assign_id, check_filters, matching_ids, translate};
use crate::catalog::Catalog;
use crate::consolidator::ConsolidationTarget;
use crate::db::{Filter, InsertReq, QueryDesc};
use crate::error::{Result, StoreError, ValidationError};
use crate::models::{ElementLevel, Player, valid_id};

const PROPS: &[&str] = &["id", "account", "universe", "name"];

/// Read a player without consolidating it. `describe` fills in the cost of
/// the next level of each technology.
pub(super) fn load(shared: &Shared, id: &str, describe: bool) -> Result<Player> {
    let row = shared.fetch_one("player", "players", PROPS, id)?;

    let mut technologies = shared
        .fetch(
            QueryDesc::new("player_technologies", &["technology", "level"])
                .filtered([Filter::eq("player", id)])
                .ordered_by("technology", false),
        )?
        .iter()
        .map(|row| Ok(ElementLevel::new(row.str("technology")?, row.i64("level")?)))
        .collect::<Result<Vec<_>, StoreError>>()?;

    if describe {
        for tech in &mut technologies {
            describe_technology(&shared.catalog, tech);
        }
    }

    Ok(Player {
        id: row.str("id")?,
        account_id: row.str("account")?,
        universe_id: row.str("universe")?,
        name: row.str("name")?,
        technologies,
    })
}

fn describe_technology(catalog: &Catalog, tech: &mut ElementLevel) {
    match catalog.progress_cost(&tech.id) {
        Some(cost) => tech.next_cost = cost.compute_costs(tech.level + 1),
        None => warn!(technology = %tech.id, "player.no_cost"),
    }
}

pub struct Players {
    shared: Arc<Shared>,
}

impl Players {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Players matching `filters`, each consolidated before being read.
    pub fn list(&self, filters: &[Filter]) -> Result<Vec<Player>> {
        check_filters(filters, PROPS)?;

        matching_ids(&self.shared, "players", filters)?
            .iter()
            .map(|id| {
                self.shared
                    .consolidator
                    .consolidate_and_run(ConsolidationTarget::Player(id), || load(&self.shared, id, true))
            })
            .collect()
    }

    pub fn create(&self, mut player: Player) -> Result<String> {
        assign_id(&mut player.id)?;
        for id in [&player.account_id, &player.universe_id] {
            if !valid_id(id) {
                return Err(ValidationError::InvalidId(id.clone()).into());
            }
        }
        if player.name.trim().is_empty() {
            return Err(ValidationError::InvalidField("player name cannot be empty".to_string()).into());
        }
        player.technologies.clear();

        self.shared
            .store
            .insert_to_db(&InsertReq::new("create_player", vec![json!(player)]))
            .map_err(|err| {
                translate(err, |err| match err {
                    StoreError::Duplicate { columns, .. } if columns.iter().any(|c| c == "account") => Some(format!(
                        "account \"{}\" already exists in universe \"{}\"",
                        player.account_id, player.universe_id
                    )),
                    StoreError::Duplicate { columns, .. } if columns.iter().any(|c| c == "name") => Some(format!(
                        "name \"{}\" is already in use in universe \"{}\"",
                        player.name, player.universe_id
                    )),
                    StoreError::ForeignKey(_) => Some(format!(
                        "account \"{}\" or universe \"{}\" does not exist",
                        player.account_id, player.universe_id
                    )),
                    _ => None,
                })
            })?;

        info!(player = %player.id, universe = %player.universe_id, "player.created");
        Ok(player.id)
    }
}
