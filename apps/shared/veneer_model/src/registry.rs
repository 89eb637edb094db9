//! Identity map from native handles to wrappers
//!
//! [`IdentityRegistry`] is the bare map: it never constructs and never tears down.
//! The create-on-miss and teardown paths live in [`crate::family::FamilyRegistry`],
//! which owns one identity registry per family.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::rc::Rc;

use crate::handle::NativeHandle;

/// Map from native handle to the single live wrapper for that handle
pub struct IdentityRegistry<W> {
    entries: HashMap<NativeHandle, Rc<W>>,
}

impl<W> IdentityRegistry<W> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up without constructing
    pub fn try_get(&self, handle: NativeHandle) -> Option<Rc<W>> {
        self.entries.get(&handle).cloned()
    }

    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Insert `wrapper` unless the handle already has an entry
    ///
    /// Returns the wrapper that ends up registered: the existing one if there was
    /// one, `wrapper` otherwise.
    pub fn insert(&mut self, handle: NativeHandle, wrapper: Rc<W>) -> Rc<W> {
        match self.entries.entry(handle) {
            Entry::Occupied(existing) => Rc::clone(existing.get()),
            Entry::Vacant(slot) => Rc::clone(slot.insert(wrapper)),
        }
    }

    /// Delete the entry, returning the wrapper it held
    pub fn remove(&mut self, handle: NativeHandle) -> Option<Rc<W>> {
        self.entries.remove(&handle)
    }

    /// Remove the entry only if it holds exactly `wrapper`
    pub fn remove_instance(&mut self, wrapper: &Rc<W>, handle: NativeHandle) -> bool {
        match self.entries.get(&handle) {
            Some(existing) if Rc::ptr_eq(existing, wrapper) => {
                self.entries.remove(&handle);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> Vec<NativeHandle> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NativeHandle, &Rc<W>)> + '_ {
        self.entries.iter().map(|(handle, wrapper)| (*handle, wrapper))
    }
}

impl<W> Default for IdentityRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}
