//! Named locks drawn from a bounded pool
//!
//! Players and planets far outnumber any lock table we would want to keep
//! around, so a fixed number of slots is shared between resource keys. A
//! slot is bound to a key on first `acquire`, shared (and reference counted)
//! by every caller asking for that key while it is bound, and returned to
//! the pool when the last of them releases it. When every slot is bound to
//! some other key, `acquire` blocks until one is returned.
//!
//! `acquire` only hands out access to the slot: mutual exclusion on the key
//! is obtained with [`LockHandle::lock`].

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::debug;

use crate::error::LockError;

pub const DEFAULT_LOCK_COUNT: usize = 10;

/// Binary semaphore backing one pool slot.
#[derive(Debug)]
struct Slot {
    index: usize,
    held: Mutex<bool>,
    freed: Condvar,
}

#[derive(Debug)]
struct Registry {
    registered: HashMap<String, usize>,
    uses: Vec<usize>,
    free: Vec<usize>,
}

#[derive(Debug)]
pub struct ResourceLocker {
    slots: Vec<Arc<Slot>>,
    registry: Mutex<Registry>,
    slot_returned: Condvar,
}

/// Access to the slot bound to a resource key.
#[derive(Debug)]
pub struct LockHandle {
    key: String,
    slot: Arc<Slot>,
}

fn recover<T>(guard: std::sync::LockResult<MutexGuard<'_, T>>) -> MutexGuard<'_, T> {
    guard.unwrap_or_else(|e| e.into_inner())
}

impl ResourceLocker {
    pub fn new(lock_count: usize) -> Self {
        let lock_count = lock_count.max(1);
        let slots = (0..lock_count)
            .map(|index| {
                Arc::new(Slot {
                    index,
                    held: Mutex::new(false),
                    freed: Condvar::new(),
                })
            })
            .collect();

        Self {
            slots,
            registry: Mutex::new(Registry {
                registered: HashMap::new(),
                uses: vec![0; lock_count],
                free: (0..lock_count).rev().collect(),
            }),
            slot_returned: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots not currently bound to any key.
    pub fn available(&self) -> usize {
        recover(self.registry.lock()).free.len()
    }

    /// Get the slot for `key`, binding a free one if the key has none.
    /// Blocks while the pool is exhausted by other keys.
    pub fn acquire(&self, key: &str) -> LockHandle {
        let mut registry = recover(self.registry.lock());

        loop {
            if let Some(&index) = registry.registered.get(key) {
                registry.uses[index] += 1;
                debug!(
                    key,
                    slot = index,
                    users = registry.uses[index],
                    available = registry.free.len(),
                    "locker.share"
                );
                return self.handle(key, index);
            }

            if let Some(index) = registry.free.pop() {
                registry.registered.insert(key.to_string(), index);
                registry.uses[index] = 1;
                debug!(
                    key,
                    slot = index,
                    available = registry.free.len(),
                    "locker.bind"
                );
                return self.handle(key, index);
            }

            registry = recover(self.slot_returned.wait(registry));
        }
    }

    /// Drop one user of the handle's slot, returning the slot to the pool
    /// once nobody uses it anymore.
    pub fn release(&self, handle: LockHandle) {
        let mut registry = recover(self.registry.lock());
        let index = handle.slot.index;

        registry.uses[index] = registry.uses[index].saturating_sub(1);
        if registry.uses[index] > 0 {
            return;
        }

        registry.registered.remove(&handle.key);
        registry.free.push(index);
        debug!(
            key = %handle.key,
            slot = index,
            available = registry.free.len(),
            "locker.unbind"
        );
        drop(registry);

        // Every waiter re-checks the registry: some may now share a key
        // bound by another waiter.
        self.slot_returned.notify_all();
    }

    fn handle(&self, key: &str, index: usize) -> LockHandle {
        LockHandle {
            key: key.to_string(),
            slot: Arc::clone(&self.slots[index]),
        }
    }
}

impl Default for ResourceLocker {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_COUNT)
    }
}

impl LockHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Block until the caller is the only holder of this key.
    pub fn lock(&self) {
        let mut held = recover(self.slot.held.lock());
        while *held {
            held = recover(self.slot.freed.wait(held));
        }
        *held = true;
    }

    /// Give the key back to the next waiter. Fails without touching the
    /// semaphore when the lock is not currently held.
    pub fn unlock(&self) -> Result<(), LockError> {
        let mut held = recover(self.slot.held.lock());
        if !*held {
            return Err(LockError::NotHeld(self.key.clone()));
        }
        *held = false;
        drop(held);

        self.slot.freed.notify_one();
        Ok(())
    }
}

/// Holds the key locked for as long as it lives; unlocks the handle and
/// returns it to the locker on drop, whatever the exit path.
pub struct KeyGuard<'a> {
    locker: &'a ResourceLocker,
    handle: Option<LockHandle>,
}

impl<'a> KeyGuard<'a> {
    pub fn new(locker: &'a ResourceLocker, key: &str) -> Self {
        let handle = locker.acquire(key);
        handle.lock();
        Self {
            locker,
            handle: Some(handle),
        }
    }

    /// Unlock early, reporting a double release instead of swallowing it.
    pub fn finish(mut self) -> Result<(), LockError> {
        match self.handle.take() {
            Some(handle) => {
                let unlocked = handle.unlock();
                self.locker.release(handle);
                unlocked
            }
            None => Ok(()),
        }
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.unlock() {
                tracing::warn!(%err, "locker.unlock_failed");
            }
            self.locker.release(handle);
        }
    }
}
