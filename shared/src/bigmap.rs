use std::{
    collections::{hash_map::Iter as HashMapIter, HashMap},
    hash::Hash,
    marker::PhantomData,
};

pub trait BigMapKey: Clone + Copy + Eq + PartialEq + Hash {
    fn to_u64(&self) -> u64;
    fn from_u64(value: u64) -> Self;
}

/// A map that hands out its own keys. Keys are never reused, so a stale key
/// can only ever miss, never alias a newer entry.
pub struct BigMap<K: BigMapKey, V> {
    inner: HashMap<u64, V>,
    current_index: u64,
    phantom_k: PhantomData<K>,
}

impl<K: BigMapKey, V> Default for BigMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: BigMapKey, V> BigMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
            current_index: 0,
            phantom_k: PhantomData,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(&key.to_u64())
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(&key.to_u64())
    }

    pub fn insert(&mut self, value: V) -> K {
        let old_index = self.current_index;
        self.current_index = self.current_index.wrapping_add(1);

        self.inner.insert(old_index, value);

        K::from_u64(old_index)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(&key.to_u64())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(&key.to_u64())
    }

    pub fn iter(&self) -> BigMapIter<'_, K, V> {
        BigMapIter {
            inner: self.inner.iter(),
            phantom_k: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

pub struct BigMapIter<'a, K: BigMapKey, V> {
    inner: HashMapIter<'a, u64, V>,
    phantom_k: PhantomData<K>,
}

impl<'a, K: BigMapKey, V> Iterator for BigMapIter<'a, K, V> {
    type Item = (K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(index, value)| (K::from_u64(*index), value))
    }
}
