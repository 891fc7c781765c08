//! oglike
//!
//! Administration driver for the game core: database setup, content import
//! and a handful of player actions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

use oglike_core::catalog::Catalog;
use oglike_core::clock::SystemClock;
use oglike_core::config::Config;
use oglike_core::content;
use oglike_core::db::{Filter, SqliteStore};
use oglike_core::models::{Account, ElementKind, FixedAction, Player, ProgressAction, Universe};
use oglike_core::Proxies;

#[derive(Parser)]
#[command(name = "oglike")]
#[command(about = "Administration tool for an OGame-like universe")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "oglike.db")]
    database: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the size of the lock pool
    #[arg(long)]
    lock_count: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Load the built-in sample content
    LoadSample,

    /// Import every *.json content file under a directory
    ImportContent {
        /// Directory holding the content files
        dir: PathBuf,
    },

    /// Create a universe
    CreateUniverse {
        name: String,

        #[arg(long, default_value = "9")]
        galaxies: i64,

        #[arg(long, default_value = "499")]
        galaxy_size: i64,

        #[arg(long, default_value = "15")]
        solar_system_size: i64,

        #[arg(long, default_value = "1")]
        speed: i64,
    },

    /// Create an account
    CreateAccount { mail: String },

    /// Create a player and its homeworld
    CreatePlayer {
        account: String,
        universe: String,
        name: String,
    },

    /// List planets, optionally those of one player
    Planets {
        #[arg(short, long)]
        player: Option<String>,
    },

    /// Upgrade (or demolish) a building by one level
    Build {
        planet: String,

        /// Building name or identifier (e.g. "metal mine")
        building: String,

        #[arg(long)]
        demolish: bool,
    },

    /// Research the next level of a technology from a planet
    Research { planet: String, technology: String },

    /// Order ships on a planet
    BuildShips {
        planet: String,
        ship: String,
        count: i64,
    },

    /// Order defenses on a planet
    BuildDefenses {
        planet: String,
        defense: String,
        count: i64,
    },

    /// List pending actions of a planet
    Actions { planet: String },
}

fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config =
        Config::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(lock_count) = cli.lock_count {
        config.locker.lock_count = lock_count;
    }

    let store = Arc::new(
        SqliteStore::open(&cli.database)
            .with_context(|| format!("Failed to open {}", cli.database.display()))?,
    );

    match &cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
            return Ok(());
        }
        Commands::LoadSample => {
            let stats = content::import(store.as_ref(), &content::sample_content())?;
            println!("{}", stats);
            return Ok(());
        }
        Commands::ImportContent { dir } => {
            let stats = content::import_dir(store.as_ref(), dir)?;
            println!("\n{}", stats);
            return Ok(());
        }
        _ => {}
    }

    let proxies = Proxies::new(store, Arc::new(SystemClock), config);
    if proxies.catalog().is_empty() {
        println!("No content in database. Run 'load-sample' or 'import-content' first.");
    }

    match cli.command {
        Commands::Init | Commands::LoadSample | Commands::ImportContent { .. } => {}

        Commands::CreateUniverse {
            name,
            galaxies,
            galaxy_size,
            solar_system_size,
            speed,
        } => {
            let id = proxies.universes.create(Universe {
                id: String::new(),
                name,
                economic_speed: speed,
                fleet_speed: speed,
                research_speed: speed,
                fleets_to_ruins_ratio: 0.3,
                defenses_to_ruins_ratio: 0.0,
                fleets_consumption_ratio: 1.0,
                galaxies_count: galaxies,
                galaxy_size,
                solar_system_size,
            })?;
            println!("Created universe {}", id);
        }

        Commands::CreateAccount { mail } => {
            let id = proxies.accounts.create(Account {
                id: String::new(),
                mail,
            })?;
            println!("Created account {}", id);
        }

        Commands::CreatePlayer {
            account,
            universe,
            name,
        } => {
            let id = proxies.players.create(Player {
                id: String::new(),
                account_id: account,
                universe_id: universe,
                name,
                technologies: Vec::new(),
            })?;
            let planet = proxies.planets.create_for(&id, None)?;
            println!("Created player {} with homeworld {}", id, planet);
        }

        Commands::Planets { player } => {
            let filters: Vec<Filter> = player.iter().map(|p| Filter::eq("player", p.as_str())).collect();
            let planets = proxies.planets.list(&filters)?;
            if planets.is_empty() {
                println!("No planets found.");
            }
            for planet in planets {
                println!(
                    "{} [{}] {} ({} of {} fields used)",
                    planet.name,
                    planet.coordinates,
                    planet.id,
                    planet.used_fields(),
                    planet.fields
                );
                for stock in &planet.resources {
                    println!(
                        "  {:<12} {:>12.0} / {:<12.0} {:>+10.1}/h",
                        resource_name(proxies.catalog(), &stock.resource),
                        stock.amount,
                        stock.storage,
                        stock.production
                    );
                }
                for building in &planet.buildings {
                    println!(
                        "  {:<24} level {:>3}",
                        element_name(proxies.catalog(), &building.id),
                        building.level
                    );
                }
                for unit in planet.ships.iter().chain(&planet.defenses) {
                    println!("  {:<24} x{}", element_name(proxies.catalog(), &unit.id), unit.count);
                }
            }
        }

        Commands::Build {
            planet,
            building,
            demolish,
        } => {
            let element = resolve(proxies.catalog(), &building, ElementKind::Building)?;
            let current = current_planet(&proxies, &planet)?.building_level(&element).unwrap_or(0);
            let desired = if demolish { current - 1 } else { current + 1 };
            let id = proxies.actions.create_building_action(ProgressAction {
                id: String::new(),
                planet_id: planet,
                player_id: None,
                element_id: element,
                current_level: current,
                desired_level: desired,
                completion_time: 0,
            })?;
            println!("Building {} -> level {} ({})", building, desired, id);
        }

        Commands::Research { planet, technology } => {
            let element = resolve(proxies.catalog(), &technology, ElementKind::Technology)?;
            let owner = current_planet(&proxies, &planet)?.player_id;
            let current = proxies
                .players
                .list(&[Filter::eq("id", owner.as_str())])?
                .first()
                .and_then(|p| p.technology_level(&element))
                .unwrap_or(0);
            let id = proxies.actions.create_technology_action(ProgressAction {
                id: String::new(),
                planet_id: planet,
                player_id: Some(owner),
                element_id: element,
                current_level: current,
                desired_level: current + 1,
                completion_time: 0,
            })?;
            println!("Researching {} -> level {} ({})", technology, current + 1, id);
        }

        Commands::BuildShips { planet, ship, count } => {
            let element = resolve(proxies.catalog(), &ship, ElementKind::Ship)?;
            let id = proxies.actions.create_ship_action(units(planet, element, count))?;
            println!("Ordered {} x {} ({})", count, ship, id);
        }

        Commands::BuildDefenses {
            planet,
            defense,
            count,
        } => {
            let element = resolve(proxies.catalog(), &defense, ElementKind::Defense)?;
            let id = proxies.actions.create_defense_action(units(planet, element, count))?;
            println!("Ordered {} x {} ({})", count, defense, id);
        }

        Commands::Actions { planet } => {
            let filter = [Filter::eq("planet", planet.as_str())];
            let catalog = proxies.catalog();

            for action in proxies.actions.buildings(&filter)? {
                println!(
                    "{:<24} {} -> {} done at {}",
                    element_name(catalog, &action.element_id),
                    action.current_level,
                    action.desired_level,
                    oglike_core::clock::from_millis(action.completion_time)
                );
            }
            for action in proxies.actions.technologies(&filter)? {
                println!(
                    "{:<24} {} -> {} done at {}",
                    element_name(catalog, &action.element_id),
                    action.current_level,
                    action.desired_level,
                    oglike_core::clock::from_millis(action.completion_time)
                );
            }
            for action in proxies
                .actions
                .ships(&filter)?
                .into_iter()
                .chain(proxies.actions.defenses(&filter)?)
            {
                println!(
                    "{:<24} {}/{} left, done at {}",
                    element_name(catalog, &action.element_id),
                    action.remaining,
                    action.amount,
                    oglike_core::clock::from_millis(action.completion_time)
                );
            }
        }
    }

    Ok(())
}

fn current_planet(proxies: &Proxies, id: &str) -> Result<oglike_core::models::Planet> {
    match proxies.planets.list(&[Filter::eq("id", id)])?.into_iter().next() {
        Some(planet) => Ok(planet),
        None => bail!("Planet '{}' not found", id),
    }
}

/// Element identifier from a name or an identifier.
fn resolve(catalog: &Catalog, name: &str, kind: ElementKind) -> Result<String> {
    let element = catalog
        .element_by_name(name)
        .or_else(|| catalog.element(name))
        .with_context(|| format!("Unknown {} '{}'", kind, name))?;
    if element.kind != kind {
        bail!("'{}' is a {}, not a {}", name, element.kind, kind);
    }
    Ok(element.id.clone())
}

fn units(planet: String, element: String, count: i64) -> FixedAction {
    FixedAction {
        id: String::new(),
        planet_id: planet,
        element_id: element,
        amount: count,
        remaining: count,
        unit_duration: 0,
        started_at: 0,
        completion_time: 0,
    }
}

fn element_name<'a>(catalog: &'a Catalog, id: &'a str) -> &'a str {
    catalog.element(id).map_or(id, |e| e.name.as_str())
}

fn resource_name<'a>(catalog: &'a Catalog, id: &'a str) -> &'a str {
    catalog
        .resources()
        .iter()
        .find(|r| r.id == id)
        .map_or(id, |r| r.name.as_str())
}
