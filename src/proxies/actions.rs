use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use super::{Shared, assign_id, check_filters, planets, players};
use crate::consolidator::ConsolidationTarget;
use crate::db::{Filter, InsertReq, QueryDesc, Row};
use crate::error::{GameError, Result, StoreError, ValidationError};
use crate::models::{ElementKind, FixedAction, ProgressAction};
use crate::validator::{Plan, UpgradeAction, ValidationContext, Verdict};

const PROGRESS_PROPS: &[&str] = &["id", "planet", "element", "current_level", "desired_level", "completion_time"];
const TECHNOLOGY_PROPS: &[&str] = &[
    "id",
    "player",
    "planet",
    "element",
    "current_level",
    "desired_level",
    "completion_time",
];
const FIXED_PROPS: &[&str] = &[
    "id",
    "planet",
    "element",
    "amount",
    "remaining",
    "unit_duration",
    "started_at",
    "completion_time",
];

fn progress_from(row: &Row) -> Result<ProgressAction, StoreError> {
    let player_id = match row.get("player") {
        Some(_) => Some(row.str("player")?),
        None => None,
    };
    Ok(ProgressAction {
        id: row.str("id")?,
        planet_id: row.str("planet")?,
        player_id,
        element_id: row.str("element")?,
        current_level: row.i64("current_level")?,
        desired_level: row.i64("desired_level")?,
        completion_time: row.i64("completion_time")?,
    })
}

fn fixed_from(row: &Row) -> Result<FixedAction, StoreError> {
    Ok(FixedAction {
        id: row.str("id")?,
        planet_id: row.str("planet")?,
        element_id: row.str("element")?,
        amount: row.i64("amount")?,
        remaining: row.i64("remaining")?,
        unit_duration: row.i64("unit_duration")?,
        started_at: row.i64("started_at")?,
        completion_time: row.i64("completion_time")?,
    })
}

pub struct Actions {
    shared: Arc<Shared>,
}

impl Actions {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn create_building_action(&self, action: ProgressAction) -> Result<String> {
        self.create(UpgradeAction::Building(action))
    }

    pub fn create_technology_action(&self, action: ProgressAction) -> Result<String> {
        self.create(UpgradeAction::Technology(action))
    }

    pub fn create_ship_action(&self, action: FixedAction) -> Result<String> {
        self.create(UpgradeAction::Ship(action))
    }

    pub fn create_defense_action(&self, action: FixedAction) -> Result<String> {
        self.create(UpgradeAction::Defense(action))
    }

    /// Validate `action` against the freshly consolidated planet and player
    /// and commit it. The player is consolidated first under its own lock;
    /// validation and commit then happen under the planet's lock.
    pub fn create(&self, mut action: UpgradeAction) -> Result<String> {
        match &mut action {
            UpgradeAction::Building(a) | UpgradeAction::Technology(a) => assign_id(&mut a.id)?,
            UpgradeAction::Ship(a) | UpgradeAction::Defense(a) => assign_id(&mut a.id)?,
        }

        let planet_id = action.planet_id().to_string();
        let owner = planets::owner_of(&self.shared, &planet_id)?;
        if let UpgradeAction::Technology(a) = &mut action {
            a.player_id.get_or_insert_with(|| owner.clone());
        }

        let consolidator = &self.shared.consolidator;
        let player = consolidator.consolidate_and_run(ConsolidationTarget::Player(&owner), || {
            players::load(&self.shared, &owner, false)
        })?;

        consolidator.consolidate_and_run(ConsolidationTarget::Planet(&planet_id), || {
            let planet = planets::load(&self.shared, &planet_id, false)?;
            let ctx = ValidationContext {
                catalog: &self.shared.catalog,
                planet: &planet,
                player: &player,
                allow_building_downgrade: self.shared.config.actions.allow_building_downgrade,
            };

            match action.validate(&ctx)? {
                Verdict::Accepted(plan) => self.commit(action, plan),
                Verdict::Rejected(reason) => {
                    info!(action = %action.id(), kind = %action.kind(), %reason, "action.rejected");
                    Err(reason.into())
                }
            }
        })
    }

    fn commit(&self, action: UpgradeAction, plan: Plan) -> Result<String> {
        let now = self.shared.now_ms();
        let duration = plan.duration.num_milliseconds();
        let kind = action.kind();
        let id = action.id().to_string();

        let req = match action {
            UpgradeAction::Building(mut a) => {
                a.completion_time = now + duration;
                InsertReq::new(
                    "create_building_upgrade_action",
                    vec![
                        json!(a),
                        json!(plan.costs),
                        json!(plan.production_effects),
                        json!(plan.storage_effects),
                    ],
                )
            }
            UpgradeAction::Technology(mut a) => {
                a.completion_time = now + duration;
                InsertReq::new("create_technology_upgrade_action", vec![json!(a), json!(plan.costs)])
            }
            UpgradeAction::Ship(mut a) | UpgradeAction::Defense(mut a) => {
                a.unit_duration = duration;
                let script = if kind == ElementKind::Ship {
                    "create_ship_upgrade_action"
                } else {
                    "create_defense_upgrade_action"
                };
                InsertReq::new(script, vec![json!(a), json!(plan.costs), json!(now)])
            }
        };

        self.shared.store.insert_to_db(&req).map_err(|err| commit_error(err, &req.script))?;

        info!(action = %id, %kind, duration_ms = duration, "action.committed");
        Ok(id)
    }

    pub fn buildings(&self, filters: &[Filter]) -> Result<Vec<ProgressAction>> {
        self.list("construction_actions_buildings", PROGRESS_PROPS, filters, progress_from)
    }

    pub fn technologies(&self, filters: &[Filter]) -> Result<Vec<ProgressAction>> {
        self.list("construction_actions_technologies", TECHNOLOGY_PROPS, filters, progress_from)
    }

    pub fn ships(&self, filters: &[Filter]) -> Result<Vec<FixedAction>> {
        self.list("construction_actions_ships", FIXED_PROPS, filters, fixed_from)
    }

    pub fn defenses(&self, filters: &[Filter]) -> Result<Vec<FixedAction>> {
        self.list("construction_actions_defenses", FIXED_PROPS, filters, fixed_from)
    }

    /// Pending actions: the owners of the matching actions are consolidated
    /// first so that completed ones are gone.
    fn list<T>(
        &self,
        table: &str,
        props: &[&str],
        filters: &[Filter],
        from_row: fn(&Row) -> Result<T, StoreError>,
    ) -> Result<Vec<T>> {
        check_filters(filters, props)?;
        let query = QueryDesc::new(table, props)
            .filtered(filters.iter().cloned())
            .ordered_by("completion_time", false);

        let keyed_by_player = props.contains(&"player");
        let key = if keyed_by_player { "player" } else { "planet" };
        let keys = self
            .shared
            .fetch(query.clone())?
            .iter()
            .map(|row| row.str(key))
            .collect::<Result<BTreeSet<_>, _>>()?;

        for key in &keys {
            let target = if keyed_by_player {
                ConsolidationTarget::Player(key)
            } else {
                ConsolidationTarget::Planet(key)
            };
            self.shared.consolidator.consolidate(target)?;
        }

        self.shared
            .fetch(query)?
            .iter()
            .map(|row| Ok(from_row(row)?))
            .collect()
    }
}

fn commit_error(err: StoreError, script: &str) -> GameError {
    let reason = match &err {
        StoreError::Duplicate { columns, .. } if columns.iter().any(|c| c == "planet") => {
            "a building is already being upgraded on this planet"
        }
        StoreError::Duplicate { columns, .. } if columns.iter().any(|c| c == "player") => {
            "a technology is already being researched by this player"
        }
        StoreError::Check(_) => "not enough resources to pay for the action",
        StoreError::ForeignKey(_) => "action references an unknown planet or element",
        _ => return err.into(),
    };
    tracing::warn!(script, %err, "action.commit_refused");
    ValidationError::Conflict(reason.to_string()).into()
}
