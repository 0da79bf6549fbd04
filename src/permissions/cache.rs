//! Bounded cache of compiled value patterns
//!
//! Regex and glob value patterns are compiled once and shared between
//! evaluations. The cache is a small LRU guarded by a mutex: lookups hold
//! the lock only long enough to bump an access counter, and compilation
//! happens outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use regex::Regex;

/// Default number of compiled patterns kept
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// A value pattern after compilation
#[derive(Debug)]
pub enum CompiledValue {
    /// Unanchored regex search
    Regex(Regex),
    /// Glob translated to an anchored regex
    Glob(Regex),
    /// Pattern failed to compile; never matches
    Invalid,
}

impl CompiledValue {
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            CompiledValue::Regex(re) => re.is_match(value),
            CompiledValue::Glob(re) => re.is_match(value),
            CompiledValue::Invalid => false,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: Arc<CompiledValue>,
    last_access: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    access_counter: u64,
}

impl CacheState {
    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }
}

/// Thread-safe LRU cache keyed by the raw value pattern
#[derive(Debug)]
pub struct ValueCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl ValueCache {
    /// Create a cache holding at most `capacity` compiled patterns.
    ///
    /// A capacity of zero disables caching; every lookup compiles.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
                access_counter: 0,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are inserted whole, so a poisoned guard is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached compilation of `pattern`, compiling it on a miss
    pub fn get_or_compile<F>(&self, pattern: &str, compile: F) -> Arc<CompiledValue>
    where
        F: FnOnce(&str) -> CompiledValue,
    {
        if self.capacity == 0 {
            return Arc::new(compile(pattern));
        }

        {
            let mut state = self.lock();
            state.access_counter += 1;
            let tick = state.access_counter;
            if let Some(entry) = state.entries.get_mut(pattern) {
                entry.last_access = tick;
                return Arc::clone(&entry.value);
            }
        }

        let compiled = Arc::new(compile(pattern));

        let mut state = self.lock();
        state.access_counter += 1;
        let tick = state.access_counter;

        // Another thread may have compiled the same pattern meanwhile
        if let Some(entry) = state.entries.get_mut(pattern) {
            entry.last_access = tick;
            return Arc::clone(&entry.value);
        }

        while state.entries.len() >= self.capacity {
            state.evict_lru();
        }
        state.entries.insert(
            pattern.to_string(),
            CacheEntry {
                value: Arc::clone(&compiled),
                last_access: tick,
            },
        );

        compiled
    }

    /// Check if a pattern is cached without updating access time
    pub fn contains(&self, pattern: &str) -> bool {
        self.lock().entries.contains_key(pattern)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.access_counter = 0;
    }
}

impl Default for ValueCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
