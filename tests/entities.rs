mod common;

use common::{World, account, player, universe};
use oglike_core::GameError;
use oglike_core::config::Config;
use oglike_core::content;
use oglike_core::db::Filter;
use oglike_core::error::ValidationError;
use oglike_core::models::{Coordinate, Fleet, new_id};

fn conflict(result: oglike_core::Result<String>) -> String {
    match result {
        Err(GameError::Validation(ValidationError::Conflict(msg))) => msg,
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[test]
fn mails_are_unique_and_well_formed() {
    let world = World::new();

    let msg = conflict(world.proxies.accounts.create(account("first@oglike.io")));
    assert!(msg.contains("already registered"), "{msg}");

    let err = world.proxies.accounts.create(account("not a mail")).unwrap_err();
    assert!(matches!(err, GameError::Validation(ValidationError::InvalidField(_))));

    let accounts = world
        .proxies
        .accounts
        .list(&[Filter::eq("mail", "first@oglike.io")])
        .unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, world.account);
}

#[test]
fn one_player_per_account_and_name_per_universe() {
    let world = World::new();

    let msg = conflict(world.proxies.players.create(player(&world.account, &world.universe, "second")));
    assert!(msg.contains("already exists in universe"), "{msg}");

    let other = world.proxies.accounts.create(account("other@oglike.io")).unwrap();
    let msg = conflict(world.proxies.players.create(player(&other, &world.universe, "first")));
    assert!(msg.contains("is already in use"), "{msg}");

    let msg = conflict(world.proxies.players.create(player(&new_id(), &world.universe, "third")));
    assert!(msg.contains("does not exist"), "{msg}");

    // The same account may play in another universe under the same name
    let elsewhere = world.proxies.universes.create(universe("Triangulum", (1, 10, 10))).unwrap();
    world
        .proxies
        .players
        .create(player(&world.account, &elsewhere, "first"))
        .unwrap();
}

#[test]
fn universe_names_are_unique() {
    let world = World::new();
    let msg = conflict(world.proxies.universes.create(universe("Andromeda", (1, 1, 1))));
    assert!(msg.contains("already in use"), "{msg}");

    let err = world.proxies.universes.create(universe("Empty", (0, 10, 10))).unwrap_err();
    assert!(matches!(err, GameError::Validation(ValidationError::InvalidField(_))));
}

#[test]
fn universes_too_large_to_index_are_refused() {
    let world = World::new();
    let err = world
        .proxies
        .universes
        .create(universe("Boundless", (i64::MAX / 2, 4, 4)))
        .unwrap_err();
    match err {
        GameError::Validation(ValidationError::InvalidField(msg)) => {
            assert!(msg.contains("too large"), "{msg}")
        }
        other => panic!("expected an invalid field, got {other:?}"),
    }
    assert!(world
        .proxies
        .universes
        .list(&[Filter::eq("name", "Boundless")])
        .unwrap()
        .is_empty());
}

#[test]
fn homeworld_starts_with_base_resources() {
    let world = World::new();
    let planet = world.planet_state();

    assert_eq!(planet.player_id, world.player);
    assert_eq!(planet.name, "homeworld");
    assert_eq!(planet.fields, 163);
    assert!(planet.buildings.is_empty());
    assert_eq!(planet.resources.len(), 4);
    assert_eq!(world.amount("metal"), 500.0);
}

#[test]
fn full_universe_refuses_new_planets() {
    let world = World::with(content::sample_content(), Config::default(), (1, 1, 1));

    let err = world.proxies.planets.create_for(&world.player, None).unwrap_err();
    assert!(matches!(err, GameError::CapacityExhausted { trials: 10 }));

    let other = world.proxies.accounts.create(account("late@oglike.io")).unwrap();
    let late = world
        .proxies
        .players
        .create(player(&other, &world.universe, "late"))
        .unwrap();
    let err = world.proxies.planets.create_for(&late, None).unwrap_err();
    assert!(matches!(err, GameError::CapacityExhausted { .. }));
}

#[test]
fn explicit_coordinates_are_checked() {
    let world = World::with(content::sample_content(), Config::default(), (1, 2, 2));
    let taken = world.planet_state().coordinates;

    let msg = conflict(world.proxies.planets.create_for(&world.player, Some(taken)));
    assert!(msg.contains("already taken"), "{msg}");

    let err = world
        .proxies
        .planets
        .create_for(&world.player, Some(Coordinate::new(0, 5, 0)))
        .unwrap_err();
    assert!(matches!(err, GameError::Validation(ValidationError::InvalidCoordinates(_))));

    let free = (0..2)
        .flat_map(|s| (0..2).map(move |p| Coordinate::new(0, s, p)))
        .find(|c| *c != taken)
        .unwrap();
    let colony = world.proxies.planets.create_for(&world.player, Some(free)).unwrap();
    let planets = world
        .proxies
        .planets
        .list(&[Filter::eq("player", world.player.as_str())])
        .unwrap();
    assert_eq!(planets.len(), 2);
    let colony = planets.iter().find(|p| p.id == colony).unwrap();
    assert_eq!(colony.name, "planet");
    assert_eq!(colony.coordinates, free);
}

#[test]
fn random_placement_fills_a_small_universe() {
    let world = World::with(content::sample_content(), Config::default(), (1, 1, 3));

    // Two free slots left; the third attempt finds none
    for name in ["second", "third"] {
        let mail = format!("{name}@oglike.io");
        let acc = world.proxies.accounts.create(account(&mail)).unwrap();
        let id = world
            .proxies
            .players
            .create(player(&acc, &world.universe, name))
            .unwrap();
        world.proxies.planets.create_for(&id, None).unwrap();
    }

    let planets = world
        .proxies
        .planets
        .list(&[Filter::any("id", Vec::<String>::new())])
        .unwrap();
    assert!(planets.is_empty());

    let mut positions: Vec<_> = world
        .proxies
        .planets
        .list(&[])
        .unwrap()
        .iter()
        .map(|p| p.coordinates.position)
        .collect();
    positions.sort();
    assert_eq!(positions, vec![0, 1, 2]);

    let err = world.proxies.planets.create_for(&world.player, None).unwrap_err();
    assert!(matches!(err, GameError::CapacityExhausted { .. }));
}

#[test]
fn fleets_target_coordinates_inside_their_universe() {
    let world = World::new();
    let fleet = |target| Fleet {
        id: String::new(),
        universe_id: world.universe.clone(),
        name: "scouts".to_string(),
        objective: "espionage".to_string(),
        target,
    };

    let err = world.proxies.fleets.create(fleet(Coordinate::new(9, 0, 0))).unwrap_err();
    assert!(matches!(err, GameError::Validation(ValidationError::InvalidCoordinates(_))));

    let id = world.proxies.fleets.create(fleet(Coordinate::new(3, 120, 7))).unwrap();
    let fleets = world
        .proxies
        .fleets
        .list(&[Filter::eq("universe", world.universe.as_str())])
        .unwrap();
    assert_eq!(fleets.len(), 1);
    assert_eq!(fleets[0].id, id);
    assert_eq!(fleets[0].target, Coordinate::new(3, 120, 7));

    let mut lost = fleet(Coordinate::new(0, 0, 0));
    lost.universe_id = new_id();
    let err = world.proxies.fleets.create(lost).unwrap_err();
    assert!(matches!(err, GameError::NotFound { kind: "universe", .. }));
}

#[test]
fn filters_on_hidden_columns_are_refused() {
    let world = World::new();
    let err = world.proxies.planets.list(&[Filter::eq("secret", "x")]).unwrap_err();
    assert!(matches!(err, GameError::Validation(ValidationError::InvalidField(_))));
}
