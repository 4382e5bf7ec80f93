//! Single-flight resolution cache.
//!
//! [`ResolutionCache`] maps a [`CacheKey`] to a loaded value. Concurrent
//! callers for the same key share one load: the first caller reserves the
//! slot as `Pending`, runs the loader without holding any map guard, and
//! publishes `Ready`. Everyone else blocks on the in-flight handle and gets
//! the published value.
//!
//! # State machine
//!
//! ```text
//!            get_or_load                   loader returns
//! (vacant) ──────────────▶ Pending(flight) ──────────────▶ Ready(entry)
//!     ▲                        │                               │
//!     │   invalidate / panic   │      invalidate / evict       │
//!     └────────────────────────┴───────────────────────────────┘
//! ```
//!
//! A loader only publishes if its own flight still owns the slot. An
//! invalidation that lands while a load is running therefore discards that
//! load's result for the cache (the caller still receives it), and waiters
//! on the discarded flight retry from the top.
//!
//! A waiter that has not seen the flight finish within the pending timeout
//! logs a warning and runs the loader itself without publishing. That is
//! the escape from cross-thread dependency cycles.
//!
//! # Bounds
//!
//! Entries older than the TTL are reloaded on access. When the number of
//! entries exceeds `max_entries` the least recently used ready entries are
//! evicted. Both are a safety net: correctness comes from invalidation.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::constants::{DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL, DEFAULT_PENDING_TIMEOUT};
use crate::specifier::CacheKey;

/// Bounds and timeouts of a [`ResolutionCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum number of entries before LRU eviction
    pub max_entries: usize,
    /// Age after which an entry is reloaded
    pub ttl: Duration,
    /// How long to wait on another thread's load before loading anyway
    pub pending_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl: DEFAULT_CACHE_TTL,
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
        }
    }
}

/// Counters describing cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a ready entry or a shared flight
    pub hits: u64,
    /// Lookups that had to load
    pub misses: u64,
    /// Loader invocations, detached loads included
    pub loads: u64,
    /// Entries removed by invalidation
    pub invalidations: u64,
    /// Entries removed by the size bound
    pub evictions: u64,
    /// Current number of slots, pending ones included
    pub entries: usize,
}

struct ReadyEntry<V> {
    value: V,
    loaded_at: Instant,
    last_used: AtomicU64,
}

enum Slot<V> {
    Pending(Arc<InFlight<V>>),
    Ready(ReadyEntry<V>),
}

enum FlightState<V> {
    Running,
    Done(V),
    Superseded,
}

enum WaitOutcome<V> {
    Value(V),
    Retry,
    TimedOut,
}

struct InFlight<V> {
    state: Mutex<FlightState<V>>,
    finished: Condvar,
}

impl<V: Clone> InFlight<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Running),
            finished: Condvar::new(),
        }
    }

    fn complete(&self, outcome: FlightState<V>) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
        self.finished.notify_all();
    }

    fn wait(&self, timeout: Duration) -> WaitOutcome<V> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .finished
            .wait_timeout_while(guard, timeout, |state| matches!(state, FlightState::Running))
            .unwrap_or_else(PoisonError::into_inner);
        match &*guard {
            FlightState::Done(value) => WaitOutcome::Value(value.clone()),
            FlightState::Superseded => WaitOutcome::Retry,
            FlightState::Running => WaitOutcome::TimedOut,
        }
    }
}

enum Lookup<V> {
    Hit(V),
    Expired,
    Wait(Arc<InFlight<V>>),
}

/// Concurrent single-flight cache keyed by [`CacheKey`].
pub struct ResolutionCache<V> {
    slots: DashMap<CacheKey, Slot<V>>,
    settings: CacheSettings,
    clock: AtomicU64,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> ResolutionCache<V> {
    /// Create an empty cache.
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            slots: DashMap::new(),
            settings: CacheSettings {
                max_entries: settings.max_entries.max(1),
                ..settings
            },
            clock: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Return the cached value for `key`, loading it with `load` on a miss.
    ///
    /// At most one `load` runs per key at a time unless a waiter times out.
    /// The loader runs on the calling thread with no cache lock held, so it
    /// may itself call `get_or_load` for other keys.
    pub fn get_or_load<F>(&self, key: &CacheKey, load: F) -> V
    where
        F: FnOnce() -> V,
    {
        let flight = loop {
            if let Some(value) = self.fresh(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return value;
            }
            match self.slots.entry(key.clone()) {
                MapEntry::Occupied(mut occupied) => {
                    let lookup = match occupied.get() {
                        Slot::Ready(entry) if entry.loaded_at.elapsed() < self.settings.ttl => {
                            entry.last_used.store(self.tick(), Ordering::Relaxed);
                            Lookup::Hit(entry.value.clone())
                        }
                        Slot::Ready(_) => Lookup::Expired,
                        Slot::Pending(flight) => Lookup::Wait(flight.clone()),
                    };

                    match lookup {
                        Lookup::Hit(value) => {
                            self.hits.fetch_add(1, Ordering::Relaxed);
                            return value;
                        }
                        Lookup::Expired => {
                            tracing::debug!(target: "clientdeps::cache", "Entry {key} expired");
                            let flight = Arc::new(InFlight::new());
                            occupied.insert(Slot::Pending(flight.clone()));
                            break flight;
                        }
                        Lookup::Wait(flight) => {
                            drop(occupied);
                            tracing::trace!(target: "clientdeps::cache", "Waiting on load of {key}");
                            match flight.wait(self.settings.pending_timeout) {
                                WaitOutcome::Value(value) => {
                                    self.hits.fetch_add(1, Ordering::Relaxed);
                                    return value;
                                }
                                WaitOutcome::Retry => continue,
                                WaitOutcome::TimedOut => {
                                    tracing::warn!(
                                        target: "clientdeps::cache",
                                        "Timeout waiting for load of {key} - loading without the cache"
                                    );
                                    self.misses.fetch_add(1, Ordering::Relaxed);
                                    self.loads.fetch_add(1, Ordering::Relaxed);
                                    return load();
                                }
                            }
                        }
                    }
                }
                MapEntry::Vacant(vacant) => {
                    let flight = Arc::new(InFlight::new());
                    vacant.insert(Slot::Pending(flight.clone()));
                    break flight;
                }
            }
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut guard = FlightGuard {
            cache: self,
            key,
            flight: &flight,
            finished: false,
        };
        let value = load();
        self.loads.fetch_add(1, Ordering::Relaxed);
        guard.publish(value.clone());
        self.enforce_capacity();
        value
    }

    /// Unexpired value for `key` under the shard's read lock only.
    fn fresh(&self, key: &CacheKey) -> Option<V> {
        let slot = self.slots.get(key)?;
        match slot.value() {
            Slot::Ready(entry) if entry.loaded_at.elapsed() < self.settings.ttl => {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => None,
        }
    }

    /// Cached value for `key` without loading or touching it.
    pub fn peek(&self, key: &CacheKey) -> Option<V> {
        self.slots.get(key).and_then(|slot| match slot.value() {
            Slot::Ready(entry) => Some(entry.value.clone()),
            Slot::Pending(_) => None,
        })
    }

    /// Whether `key` currently has a ready entry.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.slots.get(key).is_some_and(|slot| matches!(slot.value(), Slot::Ready(_)))
    }

    /// Remove one key. Returns whether anything was removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.slots.remove(key).is_some();
        if removed {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            self.generation.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(target: "clientdeps::cache", "Invalidated {key}");
        }
        removed
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        let count = self.slots.len();
        self.slots.clear();
        self.invalidations.fetch_add(count as u64, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(target: "clientdeps::cache", "Cleared {count} cache entries");
    }

    /// Counter bumped by every invalidation that removed something and by
    /// every full clear.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Number of slots, pending ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.slots.len(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn enforce_capacity(&self) {
        let excess = self.slots.len().saturating_sub(self.settings.max_entries);
        if excess == 0 {
            return;
        }

        let mut ready: Vec<(u64, CacheKey)> = self
            .slots
            .iter()
            .filter_map(|slot| match slot.value() {
                Slot::Ready(entry) => {
                    Some((entry.last_used.load(Ordering::Relaxed), slot.key().clone()))
                }
                Slot::Pending(_) => None,
            })
            .collect();
        ready.sort_unstable();

        for (last_used, key) in ready.into_iter().take(excess) {
            let removed = self.slots.remove_if(&key, |_, slot| {
                matches!(slot, Slot::Ready(entry) if entry.last_used.load(Ordering::Relaxed) == last_used)
            });
            if removed.is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target: "clientdeps::cache", "Evicted {key}");
            }
        }
    }
}

/// Publishes a flight's result, or abandons the flight if the loader
/// unwinds before publishing.
struct FlightGuard<'a, V: Clone> {
    cache: &'a ResolutionCache<V>,
    key: &'a CacheKey,
    flight: &'a Arc<InFlight<V>>,
    finished: bool,
}

impl<V: Clone> FlightGuard<'_, V> {
    fn owns(&self, slot: &Slot<V>) -> bool {
        matches!(slot, Slot::Pending(current) if Arc::ptr_eq(current, self.flight))
    }

    fn publish(&mut self, value: V) {
        self.finished = true;
        let published = match self.cache.slots.get_mut(self.key) {
            Some(mut slot) if self.owns(&slot) => {
                *slot = Slot::Ready(ReadyEntry {
                    value: value.clone(),
                    loaded_at: Instant::now(),
                    last_used: AtomicU64::new(self.cache.tick()),
                });
                true
            }
            _ => false,
        };

        if published {
            self.flight.complete(FlightState::Done(value));
        } else {
            tracing::debug!(
                target: "clientdeps::cache",
                "Discarding load of {} invalidated while in flight",
                self.key
            );
            self.flight.complete(FlightState::Superseded);
        }
    }
}

impl<V: Clone> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!(target: "clientdeps::cache", "Load of {} was abandoned", self.key);
        self.cache.slots.remove_if(self.key, |_, slot| self.owns(slot));
        self.flight.complete(FlightState::Superseded);
    }
}
