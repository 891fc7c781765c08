//! Read and write gateways for the game entities
//!
//! Proxies own no mutable state. Planets and players are rebuilt from the
//! store on every access, after consolidation, while the content catalog is
//! read once when the proxies are built.

mod accounts;
mod actions;
mod fleets;
mod planets;
mod players;
mod universes;

use std::sync::Arc;

pub use accounts::Accounts;
pub use actions::Actions;
pub use fleets::Fleets;
pub use planets::Planets;
pub use players::Players;
pub use universes::Universes;

use crate::catalog::Catalog;
use crate::clock::{self, Clock};
use crate::config::Config;
use crate::consolidator::ActionConsolidator;
use crate::db::{Filter, QueryDesc, Row, Store};
use crate::error::{GameError, Result, StoreError, ValidationError};
use crate::locker::ResourceLocker;
use crate::models::valid_id;

/// Collaborators shared by every proxy.
pub(crate) struct Shared {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    consolidator: ActionConsolidator,
    catalog: Catalog,
    config: Config,
}

impl Shared {
    fn now_ms(&self) -> i64 {
        clock::to_millis(self.clock.now())
    }

    fn fetch(&self, query: QueryDesc) -> Result<Vec<Row>> {
        Ok(self.store.fetch_from_db(&query)?)
    }

    /// The single row of `table` with this id.
    fn fetch_one(&self, kind: &'static str, table: &str, props: &[&str], id: &str) -> Result<Row> {
        if !valid_id(id) {
            return Err(ValidationError::InvalidId(id.to_string()).into());
        }
        self.fetch(QueryDesc::new(table, props).filtered([Filter::eq("id", id)]))?
            .into_iter()
            .next()
            .ok_or_else(|| GameError::NotFound {
                kind,
                id: id.to_string(),
            })
    }
}

/// Refuse filters on columns a proxy does not expose.
fn check_filters(filters: &[Filter], allowed: &[&str]) -> Result<()> {
    match filters.iter().find(|f| !allowed.contains(&f.key.as_str())) {
        Some(filter) => Err(ValidationError::InvalidField(format!(
            "cannot filter on \"{}\"",
            filter.key
        ))
        .into()),
        None => Ok(()),
    }
}

/// Ids of the rows of `table` matching `filters`.
fn matching_ids(shared: &Shared, table: &str, filters: &[Filter]) -> Result<Vec<String>> {
    shared
        .fetch(
            QueryDesc::new(table, &["id"])
                .filtered(filters.iter().cloned())
                .ordered_by("id", false),
        )?
        .iter()
        .map(|row| Ok(row.str("id")?))
        .collect()
}

fn assign_id(id: &mut String) -> Result<()> {
    if id.is_empty() {
        *id = crate::models::new_id();
    }
    if !valid_id(id) {
        return Err(ValidationError::InvalidId(id.clone()).into());
    }
    Ok(())
}

/// Translate constraint violations with `describe`, keep anything else.
fn translate(err: StoreError, describe: impl FnOnce(&StoreError) -> Option<String>) -> GameError {
    match describe(&err) {
        Some(msg) => ValidationError::Conflict(msg).into(),
        None => err.into(),
    }
}

/// Every entity gateway, wired to the same store, clock and locker.
pub struct Proxies {
    pub accounts: Accounts,
    pub universes: Universes,
    pub players: Players,
    pub planets: Planets,
    pub fleets: Fleets,
    pub actions: Actions,
    shared: Arc<Shared>,
}

impl Proxies {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: Config) -> Self {
        let locker = Arc::new(ResourceLocker::new(config.locker.lock_count));
        let consolidator = ActionConsolidator::new(locker, Arc::clone(&store), Arc::clone(&clock));
        let catalog = Catalog::load_or_empty(store.as_ref());

        let shared = Arc::new(Shared {
            store,
            clock,
            consolidator,
            catalog,
            config,
        });

        Self {
            accounts: Accounts::new(Arc::clone(&shared)),
            universes: Universes::new(Arc::clone(&shared)),
            players: Players::new(Arc::clone(&shared)),
            planets: Planets::new(Arc::clone(&shared)),
            fleets: Fleets::new(Arc::clone(&shared)),
            actions: Actions::new(Arc::clone(&shared)),
            shared,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }
}
