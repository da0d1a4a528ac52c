use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Bounds for an [`LruStore`]. A zero bound is unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LruBounds {
    pub max_items: usize,
    pub max_cost: u64,
}

impl LruBounds {
    pub const fn by_count(max_items: usize) -> Self {
        Self {
            max_items,
            max_cost: 0,
        }
    }

    pub const fn by_cost(max_cost: u64) -> Self {
        Self {
            max_items: 0,
            max_cost,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub inserts: u64,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    cost: u64,
}

/// Outcome of [`LruStore::insert`].
#[derive(Debug, PartialEq, Eq)]
pub enum Insertion<K> {
    /// Stored; the listed keys were evicted to make room
    Stored { evicted: Vec<K> },
    /// The entry alone exceeds the cost bound and was not stored
    Rejected,
}

/// Recency-ordered store bounded by item count and summed cost.
///
/// Not synchronised; the owning cache wraps it in a lock.
#[derive(Debug)]
pub struct LruStore<K, V> {
    bounds: LruBounds,
    items: HashMap<K, Entry<V>>,
    /// Front is least recently used
    queue: VecDeque<K>,
    current_cost: u64,
    stats: CacheStats,
}

impl<K, V> LruStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(bounds: LruBounds) -> Self {
        Self {
            bounds,
            items: HashMap::new(),
            queue: VecDeque::new(),
            current_cost: 0,
            stats: CacheStats::default(),
        }
    }

    /// Returns a clone of the value and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        match self.items.get(key) {
            Some(entry) => {
                let value = entry.value.clone();
                self.touch(key);
                self.stats.hits += 1;
                Some(value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Lookup without touching recency or stats
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.items.get(key).map(|entry| &entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V, cost: u64) -> Insertion<K> {
        if self.bounds.max_cost > 0 && cost > self.bounds.max_cost {
            self.remove(&key);
            return Insertion::Rejected;
        }

        self.remove(&key);
        let evicted = self.evict_for(cost);

        self.items.insert(key.clone(), Entry { value, cost });
        self.queue.push_back(key);
        self.current_cost += cost;
        self.stats.inserts += 1;

        Insertion::Stored { evicted }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.items.remove(key)?;
        self.queue.retain(|k| k != key);
        self.current_cost = self.current_cost.saturating_sub(entry.cost);
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.queue.clear();
        self.current_cost = 0;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_cost(&self) -> u64 {
        self.current_cost
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.queue.iter().position(|k| k == key) {
            if let Some(k) = self.queue.remove(pos) {
                self.queue.push_back(k);
            }
        }
    }

    /// Evicts least recently used entries until one more entry of
    /// `incoming_cost` fits both bounds.
    fn evict_for(&mut self, incoming_cost: u64) -> Vec<K> {
        let mut evicted = Vec::new();

        loop {
            let over_count = self.bounds.max_items > 0 && self.queue.len() >= self.bounds.max_items;
            let over_cost = self.bounds.max_cost > 0
                && self.current_cost + incoming_cost > self.bounds.max_cost;
            if !(over_count || over_cost) {
                break;
            }
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            if let Some(entry) = self.items.remove(&key) {
                self.current_cost = self.current_cost.saturating_sub(entry.cost);
                self.stats.evictions += 1;
                evicted.push(key);
            }
        }

        evicted
    }
}
