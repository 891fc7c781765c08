//! Named write procedures of the SQLite store
//!
//! Every procedure runs inside the caller's transaction. The
//! `update_*` procedures take a key and the current time in Unix
//! milliseconds, apply whatever is due at that time and are idempotent:
//! running them twice with the same time changes nothing the second time.

use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::content::ContentFile;
use crate::costs::ResourceEffect;
use crate::error::StoreError;
use crate::models::{self, Account, FixedAction, Fleet, Planet, Player, ProgressAction, ResourceAmount, Universe};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Dispatch `script` with its JSON arguments; returns the number of rows
/// touched.
pub fn run(conn: &Connection, script: &str, args: &[Value]) -> Result<usize, StoreError> {
    let args = Args { script, args };
    match script {
        "import_content" => import_content(conn, &args.get(0)?),
        "create_account" => create_account(conn, &args.get(0)?),
        "create_universe" => create_universe(conn, &args.get(0)?),
        "create_player" => create_player(conn, &args.get(0)?),
        "create_planet" => create_planet(conn, &args.get(0)?, &args.get::<String>(1)?, args.get(2)?),
        "create_fleet" => create_fleet(conn, &args.get(0)?),
        "create_building_upgrade_action" => create_building_action(
            conn,
            &args.get(0)?,
            &args.get::<Vec<ResourceAmount>>(1)?,
            &args.get::<Vec<ResourceEffect>>(2)?,
            &args.get::<Vec<ResourceEffect>>(3)?,
        ),
        "create_technology_upgrade_action" => {
            create_technology_action(conn, &args.get(0)?, &args.get::<Vec<ResourceAmount>>(1)?)
        }
        "create_ship_upgrade_action" => create_fixed_action(
            conn,
            UnitTable::SHIPS,
            &args.get(0)?,
            &args.get::<Vec<ResourceAmount>>(1)?,
            args.get(2)?,
        ),
        "create_defense_upgrade_action" => create_fixed_action(
            conn,
            UnitTable::DEFENSES,
            &args.get(0)?,
            &args.get::<Vec<ResourceAmount>>(1)?,
            args.get(2)?,
        ),
        "update_resources_for_planet" => accrue(conn, &args.get::<String>(0)?, args.get(1)?),
        "update_building_upgrade_action" => {
            update_building_actions(conn, &args.get::<String>(0)?, args.get(1)?)
        }
        "update_technology_upgrade_action" => {
            update_technology_actions(conn, &args.get::<String>(0)?, args.get(1)?)
        }
        "update_ship_upgrade_action" => {
            update_fixed_actions(conn, UnitTable::SHIPS, &args.get::<String>(0)?, args.get(1)?)
        }
        "update_defense_upgrade_action" => {
            update_fixed_actions(conn, UnitTable::DEFENSES, &args.get::<String>(0)?, args.get(1)?)
        }
        other => Err(StoreError::UnknownScript(other.to_string())),
    }
}

struct Args<'a> {
    script: &'a str,
    args: &'a [Value],
}

impl Args<'_> {
    fn get<T: DeserializeOwned>(&self, idx: usize) -> Result<T, StoreError> {
        let value = self.args.get(idx).ok_or_else(|| StoreError::InvalidArgs {
            script: self.script.to_string(),
            reason: format!("missing argument #{idx}"),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| StoreError::InvalidArgs {
            script: self.script.to_string(),
            reason: format!("argument #{idx}: {e}"),
        })
    }
}

fn invalid(script: &str, reason: String) -> StoreError {
    StoreError::InvalidArgs {
        script: script.to_string(),
        reason,
    }
}

fn resource_id(conn: &Connection, name: &str) -> Result<String, StoreError> {
    conn.query_row("SELECT id FROM resources WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| invalid("import_content", format!("unknown resource \"{name}\"")))
}

fn element_id(conn: &Connection, name: &str, kinds: &[&str]) -> Result<String, StoreError> {
    let mut stmt = conn.prepare("SELECT id, kind FROM elements WHERE name = ?1")?;
    let found: Vec<(String, String)> = stmt
        .query_map([name], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;

    found
        .into_iter()
        .find(|(_, kind)| kinds.contains(&kind.as_str()))
        .map(|(id, _)| id)
        .ok_or_else(|| invalid("import_content", format!("unknown element \"{name}\"")))
}

fn import_content(conn: &Connection, content: &ContentFile) -> Result<usize, StoreError> {
    let mut changed = 0;

    for res in &content.resources {
        changed += conn.execute(
            "INSERT INTO resources (id, name, base_amount, base_production, base_storage)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
                base_amount = excluded.base_amount,
                base_production = excluded.base_production,
                base_storage = excluded.base_storage",
            params![models::new_id(), res.name, res.base_amount, res.base_production, res.base_storage],
        )?;
    }

    for element in &content.elements {
        changed += conn.execute(
            "INSERT INTO elements (id, name, kind) VALUES (?1, ?2, ?3)
             ON CONFLICT(kind, name) DO NOTHING",
            params![models::new_id(), element.name, element.kind.as_str()],
        )?;
    }

    // Second pass once every element has an id: requirements may point
    // forward in the list.
    for element in &content.elements {
        let id = element_id(conn, &element.name, &[element.kind.as_str()])?;
        for table in [
            "progress_costs",
            "element_costs",
            "tech_dependencies",
            "production_rules",
            "storage_rules",
        ] {
            conn.execute(&format!("DELETE FROM {table} WHERE element = ?1"), [&id])?;
        }

        match (element.kind.is_leveled(), element.progression) {
            (true, Some(progression)) => {
                changed += conn.execute(
                    "INSERT INTO progress_costs (element, progression) VALUES (?1, ?2)",
                    params![id, progression],
                )?;
            }
            (true, None) => {
                return Err(invalid(
                    "import_content",
                    format!("{} \"{}\" has no progression", element.kind, element.name),
                ));
            }
            (false, _) => {}
        }

        for (res, cost) in &element.costs {
            changed += conn.execute(
                "INSERT INTO element_costs (element, res, cost) VALUES (?1, ?2, ?3)",
                params![id, resource_id(conn, res)?, cost],
            )?;
        }

        for req in &element.requirements {
            let requirement = element_id(conn, &req.name, &["building", "technology"])?;
            changed += conn.execute(
                "INSERT INTO tech_dependencies (element, requirement, level) VALUES (?1, ?2, ?3)",
                params![id, requirement, req.level],
            )?;
        }

        for rule in &element.production {
            changed += conn.execute(
                "INSERT INTO production_rules
                    (element, res, base, progression, temperature_coeff, temperature_offset)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    resource_id(conn, &rule.resource)?,
                    rule.base,
                    rule.progression,
                    rule.temperature_coeff,
                    rule.temperature_offset
                ],
            )?;
        }

        for rule in &element.storage {
            changed += conn.execute(
                "INSERT INTO storage_rules (element, res, base, progression) VALUES (?1, ?2, ?3, ?4)",
                params![id, resource_id(conn, &rule.resource)?, rule.base, rule.progression],
            )?;
        }
    }

    Ok(changed)
}

fn create_account(conn: &Connection, account: &Account) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "INSERT INTO accounts (id, mail) VALUES (?1, ?2)",
        params![account.id, account.mail],
    )?)
}

fn create_universe(conn: &Connection, uni: &Universe) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "INSERT INTO universes (
            id, name, economic_speed, fleet_speed, research_speed,
            fleets_to_ruins_ratio, defenses_to_ruins_ratio, fleets_consumption_ratio,
            galaxies_count, galaxy_size, solar_system_size
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            uni.id,
            uni.name,
            uni.economic_speed,
            uni.fleet_speed,
            uni.research_speed,
            uni.fleets_to_ruins_ratio,
            uni.defenses_to_ruins_ratio,
            uni.fleets_consumption_ratio,
            uni.galaxies_count,
            uni.galaxy_size,
            uni.solar_system_size
        ],
    )?)
}

fn create_player(conn: &Connection, player: &Player) -> Result<usize, StoreError> {
    let mut changed = conn.execute(
        "INSERT INTO players (id, account, universe, name) VALUES (?1, ?2, ?3, ?4)",
        params![player.id, player.account_id, player.universe_id, player.name],
    )?;
    for tech in &player.technologies {
        changed += conn.execute(
            "INSERT INTO player_technologies (player, technology, level) VALUES (?1, ?2, ?3)",
            params![player.id, tech.id, tech.level],
        )?;
    }
    Ok(changed)
}

fn create_planet(conn: &Connection, planet: &Planet, universe: &str, now: i64) -> Result<usize, StoreError> {
    let mut changed = conn.execute(
        "INSERT INTO planets (
            id, player, universe, name, galaxy, solar_system, position,
            fields, min_temperature, max_temperature, diameter
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            planet.id,
            planet.player_id,
            universe,
            planet.name,
            planet.coordinates.galaxy,
            planet.coordinates.system,
            planet.coordinates.position,
            planet.fields,
            planet.min_temperature,
            planet.max_temperature,
            planet.diameter
        ],
    )?;

    for stock in &planet.resources {
        changed += conn.execute(
            "INSERT INTO planet_resources (planet, res, amount, production, storage_capacity, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![planet.id, stock.resource, stock.amount, stock.production, stock.storage, now],
        )?;
    }
    for building in &planet.buildings {
        changed += conn.execute(
            "INSERT INTO planet_buildings (planet, building, level) VALUES (?1, ?2, ?3)",
            params![planet.id, building.id, building.level],
        )?;
    }
    for (table, column, units) in [
        ("planet_ships", "ship", &planet.ships),
        ("planet_defenses", "defense", &planet.defenses),
    ] {
        for unit in units {
            changed += conn.execute(
                &format!("INSERT INTO {table} (planet, {column}, count) VALUES (?1, ?2, ?3)"),
                params![planet.id, unit.id, unit.count],
            )?;
        }
    }

    Ok(changed)
}

fn create_fleet(conn: &Connection, fleet: &Fleet) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "INSERT INTO fleets (id, universe, name, objective, galaxy, solar_system, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            fleet.id,
            fleet.universe_id,
            fleet.name,
            fleet.objective,
            fleet.target.galaxy,
            fleet.target.system,
            fleet.target.position
        ],
    )?)
}

/// Remove the cost of an action from the planet's stockpiles. The CHECK on
/// `amount` refuses to go below zero.
fn deduct(conn: &Connection, planet: &str, costs: &[ResourceAmount]) -> Result<usize, StoreError> {
    let mut changed = 0;
    for cost in costs.iter().filter(|c| c.amount > 0.0) {
        let updated = conn.execute(
            "UPDATE planet_resources SET amount = amount - ?3 WHERE planet = ?1 AND res = ?2",
            params![planet, cost.resource, cost.amount],
        )?;
        if updated == 0 {
            return Err(StoreError::Check(format!(
                "planet {planet} has no stockpile of {}",
                cost.resource
            )));
        }
        changed += updated;
    }
    Ok(changed)
}

fn create_building_action(
    conn: &Connection,
    action: &ProgressAction,
    costs: &[ResourceAmount],
    production: &[ResourceEffect],
    storage: &[ResourceEffect],
) -> Result<usize, StoreError> {
    let mut changed = deduct(conn, &action.planet_id, costs)?;
    changed += conn.execute(
        "INSERT INTO construction_actions_buildings
            (id, planet, element, current_level, desired_level, completion_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            action.id,
            action.planet_id,
            action.element_id,
            action.current_level,
            action.desired_level,
            action.completion_time
        ],
    )?;

    for effect in production {
        changed += conn.execute(
            "INSERT INTO construction_actions_buildings_production_effects (action, res, production_change)
             VALUES (?1, ?2, ?3)",
            params![action.id, effect.resource, effect.change],
        )?;
    }
    for effect in storage {
        changed += conn.execute(
            "INSERT INTO construction_actions_buildings_storage_effects (action, res, storage_capacity_change)
             VALUES (?1, ?2, ?3)",
            params![action.id, effect.resource, effect.change],
        )?;
    }
    Ok(changed)
}

fn create_technology_action(
    conn: &Connection,
    action: &ProgressAction,
    costs: &[ResourceAmount],
) -> Result<usize, StoreError> {
    let player = action.player_id.as_deref().ok_or_else(|| {
        invalid("create_technology_upgrade_action", "action has no player".to_string())
    })?;

    let mut changed = deduct(conn, &action.planet_id, costs)?;
    changed += conn.execute(
        "INSERT INTO construction_actions_technologies
            (id, player, planet, element, current_level, desired_level, completion_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            action.id,
            player,
            action.planet_id,
            action.element_id,
            action.current_level,
            action.desired_level,
            action.completion_time
        ],
    )?;
    Ok(changed)
}

/// Ships and defenses share everything but the table names.
#[derive(Debug, Clone, Copy)]
struct UnitTable {
    actions: &'static str,
    units: &'static str,
    column: &'static str,
}

impl UnitTable {
    const SHIPS: UnitTable = UnitTable {
        actions: "construction_actions_ships",
        units: "planet_ships",
        column: "ship",
    };
    const DEFENSES: UnitTable = UnitTable {
        actions: "construction_actions_defenses",
        units: "planet_defenses",
        column: "defense",
    };
}

/// End of the planet's shipyard queue: ships and defenses are built one
/// batch after the other.
fn queue_end(conn: &Connection, planet: &str) -> Result<Option<i64>, StoreError> {
    Ok(conn.query_row(
        "SELECT MAX(started_at + remaining * unit_duration) FROM (
            SELECT started_at, remaining, unit_duration FROM construction_actions_ships WHERE planet = ?1
            UNION ALL
            SELECT started_at, remaining, unit_duration FROM construction_actions_defenses WHERE planet = ?1
        )",
        [planet],
        |row| row.get(0),
    )?)
}

fn create_fixed_action(
    conn: &Connection,
    table: UnitTable,
    action: &FixedAction,
    costs: &[ResourceAmount],
    now: i64,
) -> Result<usize, StoreError> {
    let started_at = queue_end(conn, &action.planet_id)?.map_or(now, |end| end.max(now));
    let completion = started_at + action.remaining * action.unit_duration;

    let mut changed = deduct(conn, &action.planet_id, costs)?;
    changed += conn.execute(
        &format!(
            "INSERT INTO {} (id, planet, element, amount, remaining, unit_duration, started_at, completion_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            table.actions
        ),
        params![
            action.id,
            action.planet_id,
            action.element_id,
            action.amount,
            action.remaining,
            action.unit_duration,
            started_at,
            completion
        ],
    )?;
    Ok(changed)
}

/// Bring the planet's stockpiles up to `until`, never past storage
/// capacity and never below zero. A stockpile already above capacity stays
/// where it is.
fn accrue(conn: &Connection, planet: &str, until: i64) -> Result<usize, StoreError> {
    Ok(conn.execute(
        &format!(
            "UPDATE planet_resources SET
                amount = CASE
                    WHEN amount >= storage_capacity THEN amount
                    ELSE MIN(storage_capacity, MAX(0, amount + production * (?2 - updated_at) / {MILLIS_PER_HOUR:.1}))
                END,
                updated_at = ?2
             WHERE planet = ?1 AND updated_at < ?2"
        ),
        params![planet, until],
    )?)
}

fn update_building_actions(conn: &Connection, planet: &str, now: i64) -> Result<usize, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, element, desired_level, completion_time
         FROM construction_actions_buildings
         WHERE planet = ?1 AND completion_time <= ?2
         ORDER BY completion_time",
    )?;
    let due: Vec<(String, String, i64, i64)> = stmt
        .query_map(params![planet, now], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<Result<_, _>>()?;

    let mut changed = 0;
    for (action, element, level, completed_at) in due {
        // Resources gathered before the building completes use the old rates.
        changed += accrue(conn, planet, completed_at)?;
        changed += conn.execute(
            "INSERT INTO planet_buildings (planet, building, level) VALUES (?1, ?2, ?3)
             ON CONFLICT(planet, building) DO UPDATE SET level = excluded.level",
            params![planet, element, level],
        )?;
        changed += conn.execute(
            "UPDATE planet_resources SET production = production + (
                SELECT production_change FROM construction_actions_buildings_production_effects
                WHERE action = ?2 AND res = planet_resources.res
             )
             WHERE planet = ?1 AND res IN (
                SELECT res FROM construction_actions_buildings_production_effects WHERE action = ?2
             )",
            params![planet, action],
        )?;
        changed += conn.execute(
            "UPDATE planet_resources SET storage_capacity = storage_capacity + (
                SELECT storage_capacity_change FROM construction_actions_buildings_storage_effects
                WHERE action = ?2 AND res = planet_resources.res
             )
             WHERE planet = ?1 AND res IN (
                SELECT res FROM construction_actions_buildings_storage_effects WHERE action = ?2
             )",
            params![planet, action],
        )?;
        changed += conn.execute(
            "DELETE FROM construction_actions_buildings WHERE id = ?1",
            [&action],
        )?;
    }
    Ok(changed)
}

fn update_technology_actions(conn: &Connection, player: &str, now: i64) -> Result<usize, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, element, desired_level FROM construction_actions_technologies
         WHERE player = ?1 AND completion_time <= ?2",
    )?;
    let due: Vec<(String, String, i64)> = stmt
        .query_map(params![player, now], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<_, _>>()?;

    let mut changed = 0;
    for (action, element, level) in due {
        changed += conn.execute(
            "INSERT INTO player_technologies (player, technology, level) VALUES (?1, ?2, ?3)
             ON CONFLICT(player, technology) DO UPDATE SET level = excluded.level",
            params![player, element, level],
        )?;
        changed += conn.execute(
            "DELETE FROM construction_actions_technologies WHERE id = ?1",
            [&action],
        )?;
    }
    Ok(changed)
}

/// Credit the units finished by `now`. `started_at` always points at the
/// start of the next unit to come out.
fn update_fixed_actions(conn: &Connection, table: UnitTable, planet: &str, now: i64) -> Result<usize, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, element, remaining, unit_duration, started_at FROM {}
         WHERE planet = ?1 AND started_at <= ?2",
        table.actions
    ))?;
    let running: Vec<(String, String, i64, i64, i64)> = stmt
        .query_map(params![planet, now], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?
        .collect::<Result<_, _>>()?;

    let mut changed = 0;
    for (action, element, remaining, unit_duration, started_at) in running {
        if remaining <= 0 {
            changed += conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table.actions), [&action])?;
            continue;
        }
        let done = if unit_duration <= 0 {
            remaining
        } else {
            ((now - started_at) / unit_duration).min(remaining)
        };
        if done <= 0 {
            continue;
        }

        changed += conn.execute(
            &format!(
                "INSERT INTO {units} (planet, {column}, count) VALUES (?1, ?2, ?3)
                 ON CONFLICT(planet, {column}) DO UPDATE SET count = count + excluded.count",
                units = table.units,
                column = table.column
            ),
            params![planet, element, done],
        )?;

        if done == remaining {
            changed += conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table.actions), [&action])?;
        } else {
            changed += conn.execute(
                &format!(
                    "UPDATE {} SET remaining = ?2, started_at = ?3 WHERE id = ?1",
                    table.actions
                ),
                params![action, remaining - done, started_at + done * unit_duration],
            )?;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO resources (id, name) VALUES ('metal', 'metal');
             INSERT INTO elements (id, name, kind) VALUES ('fighter', 'light fighter', 'ship');
             INSERT INTO accounts (id, mail) VALUES ('a', 'a@b.io');
             INSERT INTO universes VALUES ('u', 'u', 1, 1, 1, 0.3, 0, 1, 9, 499, 15);
             INSERT INTO players (id, account, universe, name) VALUES ('p', 'a', 'u', 'p');
             INSERT INTO planets VALUES ('pl', 'p', 'u', 'home', 0, 0, 0, 163, -20, 30, 12800);
             INSERT INTO planet_resources VALUES ('pl', 'metal', 100, 3600, 1000, 0);",
        )
        .unwrap();
        conn
    }

    fn metal(conn: &Connection) -> f64 {
        conn.query_row(
            "SELECT amount FROM planet_resources WHERE planet = 'pl' AND res = 'metal'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn accrual_is_capped_by_storage_and_idempotent() {
        let conn = setup();
        accrue(&conn, "pl", 60_000).unwrap();
        assert_eq!(metal(&conn), 160.0);
        assert_eq!(accrue(&conn, "pl", 60_000).unwrap(), 0);
        assert_eq!(metal(&conn), 160.0);

        accrue(&conn, "pl", 10 * 3_600_000).unwrap();
        assert_eq!(metal(&conn), 1000.0);
    }

    #[test]
    fn fixed_actions_credit_finished_units_only() {
        let conn = setup();
        let action = FixedAction {
            id: "act".to_string(),
            planet_id: "pl".to_string(),
            element_id: "fighter".to_string(),
            amount: 5,
            remaining: 5,
            unit_duration: 1_000,
            started_at: 0,
            completion_time: 0,
        };
        create_fixed_action(&conn, UnitTable::SHIPS, &action, &[], 10_000).unwrap();

        update_fixed_actions(&conn, UnitTable::SHIPS, "pl", 12_500).unwrap();
        let (remaining, started): (i64, i64) = conn
            .query_row(
                "SELECT remaining, started_at FROM construction_actions_ships WHERE id = 'act'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!((remaining, started), (3, 12_000));

        update_fixed_actions(&conn, UnitTable::SHIPS, "pl", 12_500).unwrap();
        update_fixed_actions(&conn, UnitTable::SHIPS, "pl", 20_000).unwrap();
        let count: i64 = conn
            .query_row("SELECT count FROM planet_ships WHERE planet = 'pl'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 5);
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM construction_actions_ships", [], |row| row.get(0))
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn exhausted_fixed_actions_are_cleared() {
        let conn = setup();
        let action = FixedAction {
            id: "empty".to_string(),
            planet_id: "pl".to_string(),
            element_id: "fighter".to_string(),
            amount: 4,
            remaining: 0,
            unit_duration: 1_000,
            started_at: 0,
            completion_time: 0,
        };
        create_fixed_action(&conn, UnitTable::SHIPS, &action, &[], 10_000).unwrap();

        let changed = update_fixed_actions(&conn, UnitTable::SHIPS, "pl", 10_000).unwrap();
        assert_eq!(changed, 1);
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM construction_actions_ships", [], |row| row.get(0))
            .unwrap();
        assert_eq!(left, 0);
        let credited: i64 = conn
            .query_row("SELECT COUNT(*) FROM planet_ships", [], |row| row.get(0))
            .unwrap();
        assert_eq!(credited, 0);
    }

    #[test]
    fn deduction_below_zero_is_refused() {
        let conn = setup();
        let err = deduct(&conn, "pl", &[ResourceAmount::new("metal", 101.0)]).unwrap_err();
        assert!(matches!(err, StoreError::Check(_)), "{err:?}");
        assert_eq!(metal(&conn), 100.0);
    }
}
