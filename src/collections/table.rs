//! Open-chained hash table shared by maps, environments, and compile-time scopes.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

use ahash::RandomState;

/// Bucket count of a freshly created table.
const INITIAL_BUCKETS: usize = 8;

// Fixed seeds keep bucket order, and therefore map iteration order,
// identical across runs.
const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    next: Option<Box<Node<K, V>>>,
}

/// A hash table of singly-linked bucket chains.
///
/// Inserting an existing key updates it in place; new keys are prepended to
/// their chain. When the entry count exceeds three quarters of the bucket
/// count the bucket array doubles and every node is redistributed.
#[derive(Clone)]
pub struct HashTable<K, V> {
    buckets: Vec<Option<Box<Node<K, V>>>>,
    len: usize,
    hasher: RandomState,
}

/// Resumable position for a single forward pass over a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCursor {
    bucket: usize,
    depth: usize,
}

impl<K: Hash + Eq, V> HashTable<K, V> {
    pub fn new() -> Self {
        Self::with_buckets(INITIAL_BUCKETS)
    }

    pub fn with_buckets(count: usize) -> Self {
        Self {
            buckets: empty_buckets(count.max(1)),
            len: 0,
            hasher: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_of<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        (self.hasher.hash_one(key) % self.buckets.len() as u64) as usize
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut node = self.buckets[self.bucket_of(key)].as_deref();
        while let Some(n) = node {
            if n.key.borrow() == key {
                return Some(&n.value);
            }
            node = n.next.as_deref();
        }
        None
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.bucket_of(key);
        let mut node = self.buckets[index].as_deref_mut();
        while let Some(n) = node {
            if n.key.borrow() == key {
                return Some(&mut n.value);
            }
            node = n.next.as_deref_mut();
        }
        None
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Insert or update. Returns the previous value for an existing key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(slot) = self.get_mut(&key) {
            return Some(std::mem::replace(slot, value));
        }

        let index = self.bucket_of(&key);
        let next = self.buckets[index].take();
        self.buckets[index] = Some(Box::new(Node { key, value, next }));
        self.len += 1;

        if self.len * 4 > self.buckets.len() * 3 {
            self.rehash(self.buckets.len() * 2);
        }
        None
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.bucket_of(key);
        let mut link = &mut self.buckets[index];
        loop {
            match link.as_deref() {
                None => return None,
                Some(node) if node.key.borrow() == key => break,
                Some(_) => {}
            }
            link = &mut link.as_mut()?.next;
        }

        let node = link.take()?;
        let Node { value, next, .. } = *node;
        *link = next;
        self.len -= 1;
        Some(value)
    }

    pub fn clear(&mut self) {
        self.buckets = empty_buckets(INITIAL_BUCKETS);
        self.len = 0;
    }

    fn rehash(&mut self, count: usize) {
        let old = std::mem::replace(&mut self.buckets, empty_buckets(count));
        for mut chain in old {
            while let Some(mut node) = chain {
                chain = node.next.take();
                let index = self.bucket_of(&node.key);
                node.next = self.buckets[index].take();
                self.buckets[index] = Some(node);
            }
        }
        log::trace!("hash table rehashed to {} buckets ({} entries)", count, self.len);
    }
}

impl<K, V> HashTable<K, V> {
    /// Iterate entries in bucket order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            node: None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// Return the entry at `cursor` and advance it, or `None` once the pass is done.
    pub fn next_entry(&self, cursor: &mut TableCursor) -> Option<(&K, &V)> {
        while cursor.bucket < self.buckets.len() {
            let mut node = self.buckets[cursor.bucket].as_deref();
            for _ in 0..cursor.depth {
                node = node.and_then(|n| n.next.as_deref());
            }
            match node {
                Some(n) => {
                    cursor.depth += 1;
                    return Some((&n.key, &n.value));
                }
                None => {
                    cursor.bucket += 1;
                    cursor.depth = 0;
                }
            }
        }
        None
    }

    /// Whether a pass at `cursor` would yield another entry.
    pub fn has_entry_at(&self, cursor: TableCursor) -> bool {
        let mut lookahead = cursor;
        self.next_entry(&mut lookahead).is_some()
    }
}

impl<K: Hash + Eq, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for HashTable<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = HashTable::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

/// Iterator over the entries of a [`HashTable`].
pub struct Iter<'a, K, V> {
    buckets: std::slice::Iter<'a, Option<Box<Node<K, V>>>>,
    node: Option<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                self.node = node.next.as_deref();
                return Some((&node.key, &node.value));
            }
            self.node = self.buckets.next()?.as_deref();
        }
    }
}

fn empty_buckets<K, V>(count: usize) -> Vec<Option<Box<Node<K, V>>>> {
    let mut buckets = Vec::with_capacity(count);
    buckets.resize_with(count, || None);
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_and_get() {
        let mut table = HashTable::new();
        assert_eq!(table.insert("a".to_string(), 1), None);
        assert_eq!(table.insert("b".to_string(), 2), None);
        assert_eq!(table.get("a"), Some(&1));
        assert_eq!(table.get("b"), Some(&2));
        assert_eq!(table.get("c"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_insert_existing_key_updates_in_place() {
        let mut table = HashTable::new();
        table.insert(7, "first");
        assert_eq!(table.insert(7, "second"), Some("first"));
        assert_eq!(table.get(&7), Some(&"second"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_growth_keeps_every_key() {
        let mut table = HashTable::new();
        let initial = table.bucket_count();
        for i in 0..1000 {
            table.insert(i, i * 10);
        }
        assert!(table.bucket_count() > initial);
        assert!(table.len() * 4 <= table.bucket_count() * 3);
        for i in 0..1000 {
            assert_eq!(table.get(&i), Some(&(i * 10)), "lost key {}", i);
        }
    }

    #[test]
    fn test_rehash_triggers_past_three_quarters() {
        let mut table = HashTable::with_buckets(8);
        for i in 0..6 {
            table.insert(i, ());
        }
        assert_eq!(table.bucket_count(), 8);
        table.insert(6, ());
        assert_eq!(table.bucket_count(), 16);
    }

    #[test]
    fn test_remove() {
        let mut table: HashTable<i32, i32> = (0..50).map(|i| (i, i)).collect();
        assert_eq!(table.remove(&10), Some(10));
        assert_eq!(table.remove(&10), None);
        assert_eq!(table.len(), 49);
        assert!(!table.contains_key(&10));
        for i in (0..50).filter(|i| *i != 10) {
            assert!(table.contains_key(&i));
        }
    }

    #[test]
    fn test_iteration_visits_every_entry_once() {
        let table: HashTable<i32, i32> = (0..100).map(|i| (i, i * i)).collect();
        let mut keys: Vec<i32> = table.keys().copied().collect();
        keys.sort();
        assert_eq!(keys, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_cursor_matches_iteration_order() {
        let table: HashTable<i32, i32> = (0..40).map(|i| (i, -i)).collect();
        let mut cursor = TableCursor::default();
        let mut walked = Vec::new();
        while let Some((k, v)) = table.next_entry(&mut cursor) {
            walked.push((*k, *v));
        }
        let iterated: Vec<(i32, i32)> = table.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(walked, iterated);
        assert!(!table.has_entry_at(cursor));
    }

    #[test]
    fn test_get_mut() {
        let mut table = HashTable::new();
        table.insert("counter".to_string(), 0);
        *table.get_mut("counter").unwrap() += 5;
        assert_eq!(table.get("counter"), Some(&5));
    }
}
