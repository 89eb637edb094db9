//! Derived indices kept in step with a family registry
//!
//! A [`SecondaryIndex`] observes the same insert / remove sequence as the identity
//! registry it belongs to. The owning [`crate::family::FamilyRegistry`] calls it
//! inside the same `&mut self` call that mutates the primary map, so no reader can
//! observe one updated without the other.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

/// Observer of registry insertions and removals
pub trait SecondaryIndex<W>: Any {
    /// Name used to look the index up on its registry
    fn name(&self) -> &'static str;

    fn on_added(&mut self, wrapper: &Rc<W>);

    fn on_removed(&mut self, wrapper: &Rc<W>);

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;
}

/// Index from keys derived from cached wrapper data to wrappers
///
/// The key function may return several keys (a door between two rooms is listed
/// under both). Keys must only depend on data cached at construction, so removal
/// finds the same buckets insertion used.
pub struct KeyedIndex<W, K> {
    name: &'static str,
    keys: fn(&W) -> Vec<K>,
    buckets: HashMap<K, Vec<Rc<W>>>,
}

impl<W: 'static, K: Eq + Hash + 'static> KeyedIndex<W, K> {
    pub fn new(name: &'static str, keys: fn(&W) -> Vec<K>) -> Self {
        Self {
            name,
            keys,
            buckets: HashMap::new(),
        }
    }

    /// Wrappers listed under `key`
    pub fn get(&self, key: &K) -> &[Rc<W>] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.buckets.keys()
    }

    /// Total number of (key, wrapper) pairs
    pub fn entry_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

impl<W: 'static, K: Eq + Hash + 'static> SecondaryIndex<W> for KeyedIndex<W, K> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_added(&mut self, wrapper: &Rc<W>) {
        for key in (self.keys)(wrapper) {
            let bucket = self.buckets.entry(key).or_default();
            if !bucket.iter().any(|existing| Rc::ptr_eq(existing, wrapper)) {
                bucket.push(Rc::clone(wrapper));
            }
        }
    }

    fn on_removed(&mut self, wrapper: &Rc<W>) {
        for key in (self.keys)(wrapper) {
            if let Some(bucket) = self.buckets.get_mut(&key) {
                bucket.retain(|existing| !Rc::ptr_eq(existing, wrapper));
                if bucket.is_empty() {
                    self.buckets.remove(&key);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
