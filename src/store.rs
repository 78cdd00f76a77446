//! String-keyed hash table with chained collision resolution.
//!
//! One store instance backs one input batch and is discarded afterwards.
//! Buckets hold singly linked chains of owned entries; capacity doubles
//! whenever the live-entry count crosses 0.7 of the bucket count. Resizes
//! re-link the existing entry nodes into the new bucket array; keys are
//! never recopied.

use crate::error::{Error, Result};

/// Resize trigger threshold: live entries per bucket.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.7;

struct Node<V> {
    key: String,
    value: V,
    next: Link<V>,
}

type Link<V> = Option<Box<Node<V>>>;

/// Hash table keyed by opaque byte strings.
///
/// Single-writer, batch-oriented: all mutation happens through [`upsert`]
/// and [`remove`]; iteration borrows the store, so mutating mid-iteration
/// is rejected at compile time.
///
/// [`upsert`]: KeyedStore::upsert
/// [`remove`]: KeyedStore::remove
pub struct KeyedStore<V> {
    buckets: Vec<Link<V>>,
    size: usize,
    resize_threshold: usize,
    load_factor: f64,
}

// Classic 33-multiplier rolling string hash.
fn bucket_index(key: &str, capacity: usize) -> usize {
    let mut hash: u64 = 5381;
    for &byte in key.as_bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
    }
    (hash % capacity as u64) as usize
}

impl<V> KeyedStore<V> {
    /// Create an empty store with the given bucket count hint.
    ///
    /// # Errors
    ///
    /// `Error::Allocation` if the bucket array cannot be reserved. Creation
    /// failure is fatal to the caller, unlike resize failure.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_LOAD_FACTOR)
    }

    /// Create an empty store with an explicit load-factor threshold.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f64) -> Result<Self> {
        let capacity = capacity.max(1);
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(capacity)
            .map_err(|_| Error::Allocation("store bucket array"))?;
        buckets.resize_with(capacity, || None);
        Ok(Self {
            buckets,
            size: 0,
            resize_threshold: (capacity as f64 * load_factor) as usize,
            load_factor,
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Current bucket count.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&V> {
        let index = bucket_index(key, self.buckets.len());
        let mut cursor = self.buckets[index].as_deref();
        while let Some(node) = cursor {
            if node.key == key {
                return Some(&node.value);
            }
            cursor = node.next.as_deref();
        }
        None
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove an entry. Returns whether the key was present.
    ///
    /// The store never shrinks; the workload only ever drains by dropping
    /// the whole store.
    pub fn remove(&mut self, key: &str) -> bool {
        let index = bucket_index(key, self.buckets.len());
        let mut cursor = self.buckets[index].take();
        let mut kept: Link<V> = None;
        let mut removed = false;
        while let Some(mut node) = cursor {
            cursor = node.next.take();
            if !removed && node.key == key {
                removed = true;
            } else {
                node.next = kept;
                kept = Some(node);
            }
        }
        self.buckets[index] = kept;
        if removed {
            self.size -= 1;
        }
        removed
    }

    /// Iterate over all live entries in bucket order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            buckets: self.buckets.iter(),
            node: None,
        }
    }

    fn grow(&mut self) {
        let new_capacity = self.buckets.len() * 2;
        let mut new_buckets: Vec<Link<V>> = Vec::new();
        if new_buckets.try_reserve_exact(new_capacity).is_err() {
            // Degraded but functional: keep running over the threshold and
            // retry on the next insertion that crosses it.
            log::warn!(
                "store resize to {new_capacity} buckets failed; continuing over load factor"
            );
            return;
        }
        new_buckets.resize_with(new_capacity, || None);
        for link in self.buckets.iter_mut() {
            let mut cursor = link.take();
            while let Some(mut node) = cursor {
                cursor = node.next.take();
                let index = bucket_index(&node.key, new_capacity);
                node.next = new_buckets[index].take();
                new_buckets[index] = Some(node);
            }
        }
        self.buckets = new_buckets;
        self.resize_threshold = (new_capacity as f64 * self.load_factor) as usize;
    }
}

impl<V: Default> KeyedStore<V> {
    /// Insert-or-update a key.
    ///
    /// If the key exists, `update` runs against the stored value in place.
    /// Otherwise the key is cloned into a fresh entry at the head of its
    /// bucket chain, `update` runs against the default value, and the
    /// resize check fires. Returns the resulting value.
    pub fn upsert<F>(&mut self, key: &str, update: F) -> &V
    where
        F: FnOnce(&mut V),
    {
        if !self.contains_key(key) {
            let index = bucket_index(key, self.buckets.len());
            let node = Box::new(Node {
                key: key.to_owned(),
                value: V::default(),
                next: self.buckets[index].take(),
            });
            self.buckets[index] = Some(node);
            self.size += 1;
            if self.size > self.resize_threshold {
                self.grow();
            }
        }
        let index = bucket_index(key, self.buckets.len());
        let mut update = Some(update);
        let mut cursor = self.buckets[index].as_deref_mut();
        while let Some(node) = cursor {
            if node.key == key {
                if let Some(f) = update.take() {
                    f(&mut node.value);
                }
                return &node.value;
            }
            cursor = node.next.as_deref_mut();
        }
        // The key was inserted above if absent; the re-walk cannot miss it.
        unreachable!("entry missing after insert")
    }
}

/// Borrowing iterator over `(key, value)` pairs.
pub struct Iter<'a, V> {
    buckets: std::slice::Iter<'a, Link<V>>,
    node: Option<&'a Node<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                self.node = node.next.as_deref();
                return Some((node.key.as_str(), &node.value));
            }
            match self.buckets.next() {
                Some(link) => self.node = link.as_deref(),
                None => return None,
            }
        }
    }
}

/// Consuming iterator yielding owned `(key, value)` pairs, used by the
/// draining phase.
pub struct IntoEntries<V> {
    buckets: std::vec::IntoIter<Link<V>>,
    node: Link<V>,
}

impl<V> Iterator for IntoEntries<V> {
    type Item = (String, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(boxed) = self.node.take() {
                let node = *boxed;
                self.node = node.next;
                return Some((node.key, node.value));
            }
            self.node = self.buckets.next()?;
        }
    }
}

impl<V> IntoIterator for KeyedStore<V> {
    type Item = (String, V);
    type IntoIter = IntoEntries<V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoEntries {
            buckets: self.buckets.into_iter(),
            node: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KeyedStore<u64> {
        KeyedStore::with_capacity(4).expect("store")
    }

    #[test]
    fn upsert_inserts_then_updates() {
        let mut map = store();
        let value = *map.upsert("a", |v| *v += 1);
        assert_eq!(value, 1);
        let value = *map.upsert("a", |v| *v += 1);
        assert_eq!(value, 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&2));
    }

    #[test]
    fn size_tracks_distinct_keys() {
        let mut map = store();
        for i in 0..100 {
            let key = format!("key-{i}");
            map.upsert(&key, |v| *v = i);
            map.upsert(&key, |v| *v = i);
        }
        assert_eq!(map.len(), 100);
        assert_eq!(map.iter().count(), 100);
        assert!(map.remove("key-42"));
        assert!(!map.remove("key-42"));
        assert_eq!(map.len(), 99);
        assert_eq!(map.iter().count(), 99);
    }

    #[test]
    fn load_factor_bound_holds_after_every_upsert() {
        let mut map = store();
        for i in 0..1000 {
            map.upsert(&format!("key-{i}"), |v| *v = i);
            let threshold = (map.capacity() as f64 * DEFAULT_LOAD_FACTOR) as usize;
            assert!(
                map.len() <= threshold,
                "size {} over threshold {} at capacity {}",
                map.len(),
                threshold,
                map.capacity()
            );
        }
    }

    #[test]
    fn idempotent_reinsertion_leaves_size_unchanged() {
        let mut map = store();
        map.upsert("k", |v| *v = 7);
        let before = map.len();
        map.upsert("k", |v| *v = 7);
        assert_eq!(map.len(), before);
        assert_eq!(map.get("k"), Some(&7));
    }

    #[test]
    fn entries_survive_resizes() {
        let mut map = store();
        for i in 0..500u64 {
            map.upsert(&format!("device-{i}"), |v| *v = i * 3);
        }
        assert!(map.capacity() > 4);
        for i in 0..500u64 {
            assert_eq!(map.get(&format!("device-{i}")), Some(&(i * 3)));
        }
    }

    #[test]
    fn remove_from_chain_interior() {
        // Capacity 1 forces every key into one chain.
        let mut map: KeyedStore<u32> =
            KeyedStore::with_capacity_and_load_factor(1, 1000.0).expect("store");
        for key in ["a", "b", "c"] {
            map.upsert(key, |v| *v = 1);
        }
        assert!(map.remove("b"));
        assert_eq!(map.len(), 2);
        assert!(map.get("a").is_some());
        assert!(map.get("b").is_none());
        assert!(map.get("c").is_some());
    }

    #[test]
    fn into_iter_yields_every_entry_once() {
        let mut map = store();
        for i in 0..50u64 {
            map.upsert(&format!("k{i}"), |v| *v = i);
        }
        let mut seen: Vec<(String, u64)> = map.into_iter().collect();
        seen.sort();
        assert_eq!(seen.len(), 50);
        for (key, value) in &seen {
            assert_eq!(key, &format!("k{value}"));
        }
    }

    #[test]
    fn get_missing_key_is_none() {
        let map = store();
        assert!(map.get("nope").is_none());
        assert!(map.is_empty());
    }
}
