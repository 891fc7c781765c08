//! Lazy application of elapsed actions
//!
//! Nothing advances game state in the background. Before a planet or a
//! player is read, its key is locked and the store's consolidation
//! procedures apply every action completed by now; the read then runs
//! under the same lock.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::clock::{self, Clock};
use crate::db::{InsertReq, Store};
use crate::error::Result;
use crate::locker::{KeyGuard, ResourceLocker};

/// Entity whose pending actions are applied under its own lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidationTarget<'a> {
    Planet(&'a str),
    Player(&'a str),
}

impl ConsolidationTarget<'_> {
    pub fn key(&self) -> &str {
        match self {
            ConsolidationTarget::Planet(id) | ConsolidationTarget::Player(id) => id,
        }
    }

    /// Procedures run in order. Buildings come first so resources accrue at
    /// the rates in effect before each completion.
    fn scripts(&self) -> &'static [&'static str] {
        match self {
            ConsolidationTarget::Planet(_) => &[
                "update_building_upgrade_action",
                "update_ship_upgrade_action",
                "update_defense_upgrade_action",
                "update_resources_for_planet",
            ],
            ConsolidationTarget::Player(_) => &["update_technology_upgrade_action"],
        }
    }
}

#[derive(Clone)]
pub struct ActionConsolidator {
    locker: Arc<ResourceLocker>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ActionConsolidator {
    pub fn new(locker: Arc<ResourceLocker>, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { locker, store, clock }
    }

    pub fn locker(&self) -> &ResourceLocker {
        &self.locker
    }

    /// Bring `target` up to date, then run `query` before anyone else can
    /// touch the same key. The lock is released on every exit path.
    pub fn consolidate_and_run<T, F>(&self, target: ConsolidationTarget<'_>, query: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let guard = KeyGuard::new(&self.locker, target.key());

        self.consolidate_locked(target)?;
        let result = query()?;

        guard.finish()?;
        Ok(result)
    }

    pub fn consolidate(&self, target: ConsolidationTarget<'_>) -> Result<()> {
        self.consolidate_and_run(target, || Ok(()))
    }

    /// Callers must hold the lock on `target`.
    fn consolidate_locked(&self, target: ConsolidationTarget<'_>) -> Result<()> {
        let now = clock::to_millis(self.clock.now());
        for script in target.scripts() {
            self.store.insert_to_db(
                &InsertReq::new(script, vec![json!(target.key()), json!(now)]).skip_return(),
            )?;
        }
        debug!(key = target.key(), now, "consolidator.done");
        Ok(())
    }
}

impl std::fmt::Debug for ActionConsolidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionConsolidator")
            .field("locker", &self.locker)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::db::{QueryDesc, Rows};
    use crate::error::{GameError, StoreError};

    /// Records procedure calls, optionally failing them.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, serde_json::Value)>>,
        fail: bool,
    }

    impl Store for Recorder {
        fn fetch_from_db(&self, _query: &QueryDesc) -> Result<Rows, StoreError> {
            Ok(Vec::new())
        }

        fn insert_to_db(&self, req: &InsertReq) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::UnknownScript(req.script.clone()));
            }
            self.calls
                .lock()
                .unwrap()
                .push((req.script.clone(), req.args[0].clone()));
            Ok(())
        }
    }

    fn consolidator(store: Arc<Recorder>, lock_count: usize) -> ActionConsolidator {
        ActionConsolidator::new(
            Arc::new(ResourceLocker::new(lock_count)),
            store,
            Arc::new(ManualClock::at_millis(0)),
        )
    }

    #[test]
    fn planet_scripts_run_before_the_query() {
        let store = Arc::new(Recorder::default());
        let consolidator = consolidator(Arc::clone(&store), 1);

        let seen = consolidator
            .consolidate_and_run(ConsolidationTarget::Planet("p1"), || {
                Ok(store.calls.lock().unwrap().len())
            })
            .unwrap();
        assert_eq!(seen, 4);

        let calls = store.calls.lock().unwrap();
        assert_eq!(calls[0].0, "update_building_upgrade_action");
        assert_eq!(calls[3].0, "update_resources_for_planet");
        assert!(calls.iter().all(|(_, key)| key == "p1"));
    }

    #[test]
    fn failures_still_release_the_lock() {
        let store = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let consolidator = consolidator(store, 1);

        let err = consolidator
            .consolidate(ConsolidationTarget::Player("p1"))
            .unwrap_err();
        assert!(matches!(err, GameError::Storage(StoreError::UnknownScript(_))));
        assert_eq!(consolidator.locker().available(), 1);

        let consolidator = self::consolidator(Arc::new(Recorder::default()), 1);
        let err = consolidator
            .consolidate_and_run(ConsolidationTarget::Player("p2"), || -> Result<()> {
                Err(GameError::ContentData("broken".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, GameError::ContentData(_)));
        assert_eq!(consolidator.locker().available(), 1);
    }

    #[test]
    fn same_key_queries_are_serialized() {
        let store = Arc::new(Recorder::default());
        let consolidator = Arc::new(consolidator(store, 2));
        let inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..6)
            .map(|_| {
                let consolidator = Arc::clone(&consolidator);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    consolidator
                        .consolidate_and_run(ConsolidationTarget::Planet("p1"), || {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            thread::sleep(Duration::from_millis(2));
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(consolidator.locker().available(), 2);
    }
}
