#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use oglike_core::Proxies;
use oglike_core::clock::ManualClock;
use oglike_core::config::Config;
use oglike_core::content::{self, ContentFile, ElementDef, RequirementDef, ResourceDef};
use oglike_core::db::{Filter, SqliteStore};
use oglike_core::models::{
    Account, ElementKind, FixedAction, Planet, Player, ProgressAction, Universe,
};

pub const START_MS: i64 = 1_700_000_000_000;

/// One universe, one account, one player and its homeworld.
pub struct World {
    pub proxies: Proxies,
    pub clock: ManualClock,
    pub universe: String,
    pub account: String,
    pub player: String,
    pub planet: String,
}

impl World {
    pub fn new() -> Self {
        Self::with(content::sample_content(), Config::default(), (9, 499, 15))
    }

    pub fn with(content: ContentFile, config: Config, dims: (i64, i64, i64)) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        content::import(store.as_ref(), &content).unwrap();

        let clock = ManualClock::at_millis(START_MS);
        let proxies = Proxies::new(store, Arc::new(clock.clone()), config);

        let universe = proxies.universes.create(universe("Andromeda", dims)).unwrap();
        let account = proxies.accounts.create(account("first@oglike.io")).unwrap();
        let player = proxies
            .players
            .create(player(&account, &universe, "first"))
            .unwrap();
        let planet = proxies.planets.create_for(&player, None).unwrap();

        Self {
            proxies,
            clock,
            universe,
            account,
            player,
            planet,
        }
    }

    pub fn element(&self, name: &str) -> String {
        self.proxies
            .catalog()
            .element_by_name(name)
            .unwrap_or_else(|| panic!("no element {name}"))
            .id
            .clone()
    }

    pub fn resource(&self, name: &str) -> String {
        self.proxies
            .catalog()
            .resource_by_name(name)
            .unwrap_or_else(|| panic!("no resource {name}"))
            .id
            .clone()
    }

    pub fn planet_state(&self) -> Planet {
        self.proxies
            .planets
            .list(&[Filter::eq("id", self.planet.as_str())])
            .unwrap()
            .remove(0)
    }

    pub fn player_state(&self) -> Player {
        self.proxies
            .players
            .list(&[Filter::eq("id", self.player.as_str())])
            .unwrap()
            .remove(0)
    }

    pub fn amount(&self, resource: &str) -> f64 {
        let id = self.resource(resource);
        self.planet_state()
            .resources
            .iter()
            .find(|r| r.resource == id)
            .map(|r| r.amount)
            .unwrap_or(0.0)
    }

    pub fn level(&self, building: &str) -> i64 {
        self.planet_state()
            .building_level(&self.element(building))
            .unwrap_or(0)
    }

    pub fn wait(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn upgrade(&self, building: &str) -> ProgressAction {
        let current = self.level(building);
        ProgressAction {
            id: String::new(),
            planet_id: self.planet.clone(),
            player_id: None,
            element_id: self.element(building),
            current_level: current,
            desired_level: current + 1,
            completion_time: 0,
        }
    }

    pub fn build(&self, building: &str) -> oglike_core::Result<String> {
        self.proxies.actions.create_building_action(self.upgrade(building))
    }

    pub fn research(&self, technology: &str) -> oglike_core::Result<String> {
        let id = self.element(technology);
        let current = self.player_state().technology_level(&id).unwrap_or(0);
        self.proxies.actions.create_technology_action(ProgressAction {
            id: String::new(),
            planet_id: self.planet.clone(),
            player_id: None,
            element_id: id,
            current_level: current,
            desired_level: current + 1,
            completion_time: 0,
        })
    }

    pub fn units(&self, element: &str, count: i64) -> FixedAction {
        FixedAction {
            id: String::new(),
            planet_id: self.planet.clone(),
            element_id: self.element(element),
            amount: count,
            remaining: count,
            unit_duration: 0,
            started_at: 0,
            completion_time: 0,
        }
    }
}

pub fn universe(name: &str, (galaxies, galaxy_size, solar_system_size): (i64, i64, i64)) -> Universe {
    Universe {
        id: String::new(),
        name: name.to_string(),
        economic_speed: 1,
        fleet_speed: 1,
        research_speed: 1,
        fleets_to_ruins_ratio: 0.3,
        defenses_to_ruins_ratio: 0.0,
        fleets_consumption_ratio: 1.0,
        galaxies_count: galaxies,
        galaxy_size,
        solar_system_size,
    }
}

pub fn account(mail: &str) -> Account {
    Account {
        id: String::new(),
        mail: mail.to_string(),
    }
}

pub fn player(account: &str, universe: &str, name: &str) -> Player {
    Player {
        id: String::new(),
        account_id: account.to_string(),
        universe_id: universe.to_string(),
        name: name.to_string(),
        technologies: Vec::new(),
    }
}

/// Rich planets and a shipyard with no prerequisite: enough to exercise the
/// unit queues without growing an economy first.
pub fn shipyard_content() -> ContentFile {
    let resource = |name: &str| ResourceDef {
        name: name.to_string(),
        base_amount: 100_000.0,
        base_production: 0.0,
        base_storage: 1_000_000.0,
    };
    let costs = |metal: i64, crystal: i64| -> BTreeMap<String, i64> {
        [("metal".to_string(), metal), ("crystal".to_string(), crystal)].into()
    };
    let element = |name: &str, kind: ElementKind, cost, requirements: Vec<RequirementDef>| ElementDef {
        name: name.to_string(),
        kind,
        costs: cost,
        progression: kind.is_leveled().then_some(2.0),
        requirements,
        production: Vec::new(),
        storage: Vec::new(),
    };
    let needs_shipyard = || {
        vec![RequirementDef {
            name: "shipyard".to_string(),
            level: 1,
        }]
    };

    ContentFile {
        resources: vec![resource("metal"), resource("crystal")],
        elements: vec![
            element("shipyard", ElementKind::Building, costs(400, 200), Vec::new()),
            // 2500 metal + crystal per unit: one hour with a level 1 shipyard
            element("light fighter", ElementKind::Ship, costs(3000, 2000), needs_shipyard()),
            element("rocket launcher", ElementKind::Defense, costs(4000, 1000), needs_shipyard()),
        ],
    }
}
