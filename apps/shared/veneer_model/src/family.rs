//! Per-family wrapper registry
//!
//! [`FamilyRegistry`] ties an [`IdentityRegistry`], a [`TypeDispatchTable`] and the
//! family's secondary indices together. It owns both ways a wrapper comes into
//! existence (the engine's add notification and a plugin's first `get`) and the
//! only way one leaves (the engine's removal notification, through [`FamilyRegistry::retire`]).
//!
//! # Create-on-miss
//!
//! `get` and `on_added` share one construction path, so whichever observes a
//! handle first builds its wrapper and the other finds it registered. Constructors
//! receive a [`Construction`] context and use it to resolve the child wrappers of
//! composite objects through the same path.
//!
//! # Teardown
//!
//! Retiring a handle removes its entry, removes the wrapper from every secondary
//! index, runs the wrapper's teardown hook, tombstones it, then walks its owned
//! children and does the same for each. Faults from hooks are logged and counted;
//! the cascade always runs to the end. Lifecycle listeners are notified once the
//! whole cascade is done.

use std::collections::HashSet;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::dispatch::{Constructor, DispatchPolicy, Lookup, TypeDispatchTable};
use crate::handle::NativeHandle;
use crate::index::{KeyedIndex, SecondaryIndex};
use crate::kind::FamilyKind;
use crate::native::{NativeObject, NativeWorld};
use crate::registry::IdentityRegistry;
use crate::wrapper::{Wrapper, WrapperSummary};

/// Lifecycle event delivered to plugin listeners
pub enum LifecycleEvent<W> {
    Created(Rc<W>),
    Destroyed(Rc<W>),
}

impl<W> LifecycleEvent<W> {
    pub fn wrapper(&self) -> &Rc<W> {
        match self {
            LifecycleEvent::Created(wrapper) | LifecycleEvent::Destroyed(wrapper) => wrapper,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, LifecycleEvent::Created(_))
    }
}

/// Plugin callback for lifecycle events
pub type ListenerFn<W> = Box<dyn FnMut(&LifecycleEvent<W>)>;

struct LifecycleListener<W> {
    id: u64,
    owner: String,
    /// Lower numbers run first
    priority: i32,
    callback: ListenerFn<W>,
}

/// Counters for one family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FamilyStats {
    pub live: usize,
    pub constructed: u64,
    pub retired: u64,
    pub fallbacks: u64,
    pub misses: u64,
    pub construction_faults: u64,
    pub teardown_faults: u64,
    pub listener_faults: u64,
    pub stale_evictions: u64,
    /// Add notifications for handles that were already registered
    pub added_noops: u64,
    /// Removal notifications for handles that were not registered
    pub removed_noops: u64,
}

/// Context handed to constructors
pub struct Construction<'a, W: Wrapper> {
    registry: &'a mut FamilyRegistry<W>,
    world: &'a dyn NativeWorld,
}

impl<'a, W: Wrapper> Construction<'a, W> {
    pub fn world(&self) -> &'a dyn NativeWorld {
        self.world
    }

    /// Resolve a child object of the same family, registering it if needed
    pub fn child(&mut self, handle: NativeHandle) -> Option<Rc<W>> {
        self.registry.get(self.world, handle)
    }

    /// Resolve every declared child of `object`, in slot order
    pub fn children(&mut self, object: &NativeObject) -> Vec<Rc<W>> {
        let mut children = Vec::with_capacity(object.children.len());
        for &handle in &object.children {
            // The cycle guard already reported this one
            let cyclic = self.registry.in_flight.contains(&handle);
            match self.child(handle) {
                Some(child) => children.push(child),
                None if cyclic => {}
                None => warn!(
                    family = %W::FAMILY,
                    handle = %object.handle,
                    "Child {} of native {} produced no wrapper",
                    handle,
                    object.kind
                ),
            }
        }
        children
    }
}

/// Identity registry, dispatch table, indices and listeners of one family
pub struct FamilyRegistry<W: Wrapper> {
    entries: IdentityRegistry<W>,
    table: TypeDispatchTable<W>,
    indices: Vec<Box<dyn SecondaryIndex<W>>>,
    listeners: Vec<LifecycleListener<W>>,
    next_listener_id: u64,
    in_flight: HashSet<NativeHandle>,
    heal_stale: bool,
    closed: bool,
    stats: FamilyStats,
}

impl<W: Wrapper> FamilyRegistry<W> {
    pub fn new(table: TypeDispatchTable<W>) -> Self {
        Self {
            entries: IdentityRegistry::new(),
            table,
            indices: Vec::new(),
            listeners: Vec::new(),
            next_listener_id: 1,
            in_flight: HashSet::new(),
            heal_stale: true,
            closed: false,
            stats: FamilyStats::default(),
        }
    }

    pub fn with_index(mut self, index: impl SecondaryIndex<W>) -> Self {
        self.add_index(Box::new(index));
        self
    }

    /// Install a secondary index, seeding it with every registered wrapper
    pub fn add_index(&mut self, mut index: Box<dyn SecondaryIndex<W>>) {
        for (_, wrapper) in self.entries.iter() {
            index.on_added(wrapper);
        }
        self.indices.push(index);
    }

    /// Look up a secondary index by name and concrete type
    pub fn index<I: SecondaryIndex<W>>(&self, name: &str) -> Option<&I> {
        self.indices
            .iter()
            .find(|index| index.name() == name)
            .and_then(|index| index.as_any().downcast_ref::<I>())
    }

    /// Wrappers listed under `key` in the keyed index called `name`
    pub fn indexed<K: Eq + Hash + 'static>(&self, name: &str, key: &K) -> Vec<Rc<W>> {
        self.index::<KeyedIndex<W, K>>(name)
            .map(|index| index.get(key).to_vec())
            .unwrap_or_default()
    }

    /// Whether `get` retires wrappers whose native object vanished unnoticed
    pub fn set_heal_stale(&mut self, heal: bool) {
        self.heal_stale = heal;
    }

    pub fn table(&self) -> &TypeDispatchTable<W> {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TypeDispatchTable<W> {
        &mut self.table
    }

    pub fn family(&self) -> FamilyKind {
        W::FAMILY
    }

    /// Whether [`FamilyRegistry::close`] has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Retire every wrapper, drop every listener and stop constructing new wrappers
    ///
    /// Returns how many wrappers were retired. Idempotent.
    pub fn close(&mut self) -> usize {
        let retired = self.retire_all();
        self.listeners.clear();
        self.closed = true;
        retired
    }

    /// Wrapper for `handle`, constructing and registering it on first observation
    ///
    /// Returns `None` for the null handle, for handles that denote no object and
    /// for every handle once the registry is closed.
    pub fn get(&mut self, world: &dyn NativeWorld, handle: NativeHandle) -> Option<Rc<W>> {
        if handle.is_null() || self.closed {
            return None;
        }

        if let Some(existing) = self.entries.try_get(handle) {
            if !self.heal_stale || world.is_alive(handle) {
                return Some(existing);
            }
            warn!(
                family = %W::FAMILY,
                handle = %handle,
                "Native object vanished without a removal notification, retiring its wrapper"
            );
            self.stats.stale_evictions += 1;
            self.retire(handle);
            return None;
        }

        let object = world.describe(handle)?;
        let wrapper = self.resolve(world, &object)?;
        Some(self.admit(Rc::new(wrapper)))
    }

    /// Registered wrapper for `handle`; never constructs
    pub fn try_get(&self, handle: NativeHandle) -> Option<Rc<W>> {
        self.entries.try_get(handle)
    }

    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.entries.contains(handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<W>> + '_ {
        self.entries.iter().map(|(_, wrapper)| wrapper)
    }

    /// First registered wrapper matching `predicate`
    pub fn find(&self, mut predicate: impl FnMut(&W) -> bool) -> Option<Rc<W>> {
        self.iter().find(|wrapper| predicate(wrapper)).cloned()
    }

    /// Build a wrapper for `object` without registering it
    ///
    /// Children resolved by composite constructors are registered as usual.
    pub(crate) fn resolve(&mut self, world: &dyn NativeWorld, object: &NativeObject) -> Option<W> {
        if object.kind.family() != W::FAMILY {
            warn!(
                family = %W::FAMILY,
                handle = %object.handle,
                "Native kind {} belongs to the {} family",
                object.kind,
                object.kind.family()
            );
            self.stats.misses += 1;
            return None;
        }

        if !self.in_flight.insert(object.handle) {
            warn!(
                family = %W::FAMILY,
                handle = %object.handle,
                "Cyclic construction request for native {}",
                object.kind
            );
            return None;
        }

        let lookup = self.table.lookup(object.kind);
        let built = self.run_lookup(world, object, &lookup);
        self.in_flight.remove(&object.handle);
        built
    }

    fn run_lookup(&mut self, world: &dyn NativeWorld, object: &NativeObject, lookup: &Lookup<W>) -> Option<W> {
        for &constructor in &lookup.candidates {
            if let Some(wrapper) = self.invoke(constructor, world, object) {
                return Some(wrapper);
            }
        }

        match lookup.policy {
            DispatchPolicy::Fallback(base) => {
                debug!(
                    family = %W::FAMILY,
                    handle = %object.handle,
                    "No wrapper for native {}, using the base wrapper",
                    lookup.kind
                );
                self.stats.fallbacks += 1;
                let built = self.invoke(base, world, object);
                if built.is_none() {
                    warn!(
                        family = %W::FAMILY,
                        handle = %object.handle,
                        "Base constructor refused native {}",
                        lookup.kind
                    );
                    self.stats.misses += 1;
                }
                built
            }
            DispatchPolicy::Diagnostic | DispatchPolicy::Candidates => {
                if lookup.candidates.is_empty() {
                    warn!(
                        family = %W::FAMILY,
                        handle = %object.handle,
                        "No constructor registered for native {}",
                        lookup.kind
                    );
                } else {
                    warn!(
                        family = %W::FAMILY,
                        handle = %object.handle,
                        "Every constructor refused native {} (discriminator {})",
                        lookup.kind,
                        object.discriminator
                    );
                }
                self.stats.misses += 1;
                None
            }
        }
    }

    fn invoke(&mut self, constructor: Constructor<W>, world: &dyn NativeWorld, object: &NativeObject) -> Option<W> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut construction = Construction { registry: &mut *self, world };
            constructor(&mut construction, object)
        }));

        match outcome {
            Ok(built) => built,
            Err(payload) => {
                error!(
                    family = %W::FAMILY,
                    handle = %object.handle,
                    "Constructor for native {} panicked: {}",
                    object.kind,
                    panic_message(payload.as_ref())
                );
                self.stats.construction_faults += 1;
                None
            }
        }
    }

    fn admit(&mut self, wrapper: Rc<W>) -> Rc<W> {
        let handle = wrapper.handle();
        let registered = self.entries.insert(handle, Rc::clone(&wrapper));
        if !Rc::ptr_eq(&registered, &wrapper) {
            debug!(family = %W::FAMILY, handle = %handle, "Handle registered during its own construction");
            return registered;
        }

        self.update_indices(&wrapper, true);
        self.stats.constructed += 1;
        debug!(
            family = %W::FAMILY,
            handle = %handle,
            "Created {} wrapper for native {}",
            wrapper.variant_name(),
            wrapper.kind()
        );
        self.emit(&LifecycleEvent::Created(Rc::clone(&wrapper)));
        wrapper
    }

    /// Add notification: register `handle` unless it already is
    pub fn on_added(&mut self, world: &dyn NativeWorld, handle: NativeHandle) {
        if self.entries.contains(handle) {
            debug!(family = %W::FAMILY, handle = %handle, "Handle already registered, add notification ignored");
            self.stats.added_noops += 1;
            return;
        }
        // Misses are logged once by dispatch
        let _ = self.get(world, handle);
    }

    /// Removal notification: retire `handle` if registered
    pub fn on_removed(&mut self, handle: NativeHandle) -> bool {
        if self.retire(handle).is_some() {
            return true;
        }
        debug!(family = %W::FAMILY, handle = %handle, "Handle not registered, removal notification ignored");
        self.stats.removed_noops += 1;
        false
    }

    /// Remove the entry for `handle` and tear its wrapper down, children included
    pub fn retire(&mut self, handle: NativeHandle) -> Option<Rc<W>> {
        let wrapper = self.entries.remove(handle)?;
        let mut retired = Vec::new();
        self.teardown(&wrapper, &mut retired);
        for wrapper in retired {
            self.emit(&LifecycleEvent::Destroyed(wrapper));
        }
        Some(wrapper)
    }

    /// Retire every registered wrapper; returns how many were torn down
    pub fn retire_all(&mut self) -> usize {
        let before = self.stats.retired;
        for handle in self.entries.handles() {
            self.retire(handle);
        }
        (self.stats.retired - before) as usize
    }

    fn teardown(&mut self, wrapper: &Rc<W>, retired: &mut Vec<Rc<W>>) {
        self.update_indices(wrapper, false);

        match panic::catch_unwind(AssertUnwindSafe(|| wrapper.on_teardown())) {
            Ok(Ok(())) => {}
            Ok(Err(fault)) => {
                error!(family = %W::FAMILY, handle = %wrapper.handle(), "{}", fault);
                self.stats.teardown_faults += 1;
            }
            Err(payload) => {
                error!(
                    family = %W::FAMILY,
                    handle = %wrapper.handle(),
                    "Teardown hook panicked: {}",
                    panic_message(payload.as_ref())
                );
                self.stats.teardown_faults += 1;
            }
        }

        wrapper.core().tombstone();
        self.stats.retired += 1;
        retired.push(Rc::clone(wrapper));
        debug!(family = %W::FAMILY, handle = %wrapper.handle(), "Retired {} wrapper", wrapper.variant_name());

        for child in wrapper.children() {
            if child.is_destroyed() {
                continue;
            }
            self.entries.remove_instance(child, child.handle());
            self.teardown(child, retired);
        }
    }

    /// Add `wrapper` to or remove it from every secondary index
    ///
    /// A panicking index is logged and counted; the remaining indices are still
    /// updated.
    fn update_indices(&mut self, wrapper: &Rc<W>, added: bool) {
        let mut faults = 0;
        for index in &mut self.indices {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                if added {
                    index.on_added(wrapper);
                } else {
                    index.on_removed(wrapper);
                }
            }));
            if let Err(payload) = outcome {
                error!(
                    family = %W::FAMILY,
                    handle = %wrapper.handle(),
                    "Secondary index '{}' panicked on {}: {}",
                    index.name(),
                    if added { "add" } else { "remove" },
                    panic_message(payload.as_ref())
                );
                faults += 1;
            }
        }
        if added {
            self.stats.construction_faults += faults;
        } else {
            self.stats.teardown_faults += faults;
        }
    }

    /// Register a lifecycle listener; returns its id
    pub fn subscribe(
        &mut self,
        owner: impl Into<String>,
        priority: i32,
        callback: impl FnMut(&LifecycleEvent<W>) + 'static,
    ) -> u64 {
        let id = self.next_listener_id;
        self.next_listener_id += 1;

        self.listeners.push(LifecycleListener {
            id,
            owner: owner.into(),
            priority,
            callback: Box::new(callback),
        });
        // Stable: equal priorities keep subscription order
        self.listeners.sort_by_key(|listener| listener.priority);
        id
    }

    pub fn unsubscribe(&mut self, id: u64) -> bool {
        match self.listeners.iter().position(|listener| listener.id == id) {
            Some(pos) => {
                self.listeners.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drop every listener registered by `owner`; returns how many were removed
    pub fn unsubscribe_owner(&mut self, owner: &str) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.owner != owner);
        before - self.listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn emit(&mut self, event: &LifecycleEvent<W>) {
        for listener in &mut self.listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (listener.callback)(event))) {
                error!(
                    family = %W::FAMILY,
                    handle = %event.wrapper().handle(),
                    "Lifecycle listener {} of '{}' panicked: {}",
                    listener.id,
                    listener.owner,
                    panic_message(payload.as_ref())
                );
                self.stats.listener_faults += 1;
            }
        }
    }

    pub fn stats(&self) -> FamilyStats {
        FamilyStats {
            live: self.entries.len(),
            ..self.stats
        }
    }

    pub fn summaries(&self) -> Vec<WrapperSummary> {
        let mut summaries: Vec<_> = self.iter().map(|wrapper| wrapper.summary()).collect();
        summaries.sort_by_key(|summary| summary.handle);
        summaries
    }
}

/// Family-erased view of a registry, used by the lifecycle bridge
pub trait FamilyChannel {
    fn family(&self) -> FamilyKind;
    fn deliver_added(&mut self, world: &dyn NativeWorld, handle: NativeHandle);
    fn deliver_removed(&mut self, handle: NativeHandle) -> bool;
    fn retire_all(&mut self) -> usize;
    fn close(&mut self) -> usize;
    fn stats(&self) -> FamilyStats;
    fn summaries(&self) -> Vec<WrapperSummary>;
}

impl<W: Wrapper> FamilyChannel for FamilyRegistry<W> {
    fn family(&self) -> FamilyKind {
        W::FAMILY
    }

    fn deliver_added(&mut self, world: &dyn NativeWorld, handle: NativeHandle) {
        self.on_added(world, handle);
    }

    fn deliver_removed(&mut self, handle: NativeHandle) -> bool {
        self.on_removed(handle)
    }

    fn retire_all(&mut self) -> usize {
        FamilyRegistry::retire_all(self)
    }

    fn close(&mut self) -> usize {
        FamilyRegistry::close(self)
    }

    fn stats(&self) -> FamilyStats {
        FamilyRegistry::stats(self)
    }

    fn summaries(&self) -> Vec<WrapperSummary> {
        FamilyRegistry::summaries(self)
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use crate::error::TeardownFault;
    use crate::handle::ContainerId;
    use crate::kind::NativeKind;
    use crate::native::NativeState;
    use crate::wrapper::WrapperCore;

    /// Minimal door-family wrapper driven by the object name
    struct Probe {
        core: WrapperCore,
        children: Vec<Rc<Probe>>,
    }

    impl Wrapper for Probe {
        const FAMILY: FamilyKind = FamilyKind::Door;

        fn core(&self) -> &WrapperCore {
            &self.core
        }

        fn variant_name(&self) -> &'static str {
            "probe"
        }

        fn children(&self) -> &[Rc<Self>] {
            &self.children
        }

        fn on_teardown(&self) -> Result<(), TeardownFault> {
            match self.core.name() {
                "faulty" => Err(TeardownFault::new(FamilyKind::Door, self.handle(), "hook failed")),
                "panicky" => panic!("hook exploded"),
                _ => Ok(()),
            }
        }
    }

    fn build(ctx: &mut Construction<'_, Probe>, object: &NativeObject) -> Option<Probe> {
        if object.name == "explode" {
            panic!("constructor exploded");
        }
        Some(Probe {
            core: WrapperCore::from_object(object),
            children: ctx.children(object),
        })
    }

    #[derive(Default)]
    struct MapWorld {
        objects: HashMap<NativeHandle, NativeObject>,
    }

    impl MapWorld {
        fn add(&mut self, index: u32, name: &str, children: &[u32]) -> NativeHandle {
            let handle = NativeHandle::new(index, 1);
            self.objects.insert(
                handle,
                NativeObject {
                    handle,
                    kind: NativeKind::BasicDoor,
                    discriminator: 0,
                    name: name.to_string(),
                    containers: vec![ContainerId(index % 2)],
                    children: children.iter().map(|&i| NativeHandle::new(i, 1)).collect(),
                    state: NativeState::default(),
                },
            );
            handle
        }
    }

    impl NativeWorld for MapWorld {
        fn describe(&self, handle: NativeHandle) -> Option<NativeObject> {
            self.objects.get(&handle).cloned()
        }
    }

    fn registry() -> FamilyRegistry<Probe> {
        let mut table = TypeDispatchTable::diagnostic();
        table.register(NativeKind::BasicDoor, build).unwrap();
        FamilyRegistry::new(table)
            .with_index(KeyedIndex::new("rooms", |probe: &Probe| probe.core.rooms().to_vec()))
    }

    #[test]
    fn test_cyclic_children_do_not_recurse() {
        let mut world = MapWorld::default();
        let a = world.add(1, "a", &[2]);
        world.add(2, "b", &[1]);
        let mut registry = registry();

        let wrapper = registry.get(&world, a).unwrap();
        // b could not resolve its parent while the parent was being built
        assert_eq!(wrapper.children().len(), 1);
        assert!(wrapper.children()[0].children().is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_constructor_panic_is_contained() {
        let mut world = MapWorld::default();
        let handle = world.add(1, "explode", &[]);
        let mut registry = registry();

        assert!(registry.get(&world, handle).is_none());
        assert_eq!(registry.stats().construction_faults, 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_teardown_faults_do_not_stop_cascade() {
        let mut world = MapWorld::default();
        let parent = world.add(1, "faulty", &[2, 3]);
        world.add(2, "panicky", &[]);
        world.add(3, "fine", &[]);
        let mut registry = registry();

        let wrapper = registry.get(&world, parent).unwrap();
        assert_eq!(registry.len(), 3);

        registry.on_removed(parent);
        assert!(registry.is_empty());
        assert!(wrapper.is_destroyed());
        assert!(wrapper.children().iter().all(|child| child.is_destroyed()));
        assert_eq!(registry.stats().teardown_faults, 2);
        assert_eq!(registry.stats().retired, 3);

        let rooms = registry.index::<KeyedIndex<Probe, ContainerId>>("rooms").unwrap();
        assert_eq!(rooms.entry_count(), 0);
    }

    #[test]
    fn test_listeners_run_by_priority_and_survive_panics() {
        let mut world = MapWorld::default();
        let handle = world.add(1, "door", &[]);
        let mut registry = registry();
        let order = Rc::new(RefCell::new(Vec::new()));

        let late = Rc::clone(&order);
        registry.subscribe("plugin-b", 10, move |event| {
            late.borrow_mut().push(("late", event.is_created()));
        });
        registry.subscribe("plugin-c", 5, |_| panic!("listener exploded"));
        let early = Rc::clone(&order);
        registry.subscribe("plugin-a", 0, move |event| {
            early.borrow_mut().push(("early", event.is_created()));
        });

        registry.get(&world, handle).unwrap();
        registry.on_removed(handle);

        assert_eq!(
            *order.borrow(),
            vec![("early", true), ("late", true), ("early", false), ("late", false)]
        );
        assert_eq!(registry.stats().listener_faults, 2);

        assert_eq!(registry.unsubscribe_owner("plugin-c"), 1);
        assert_eq!(registry.listener_count(), 2);
    }

    /// Index that panics on every update
    struct Volatile;

    impl SecondaryIndex<Probe> for Volatile {
        fn name(&self) -> &'static str {
            "volatile"
        }

        fn on_added(&mut self, _wrapper: &Rc<Probe>) {
            panic!("index exploded on add");
        }

        fn on_removed(&mut self, _wrapper: &Rc<Probe>) {
            panic!("index exploded on remove");
        }

        fn clear(&mut self) {}

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_panicking_index_is_contained() {
        let mut world = MapWorld::default();
        let parent = world.add(1, "door", &[2]);
        world.add(2, "leaf", &[]);
        let mut table = TypeDispatchTable::diagnostic();
        table.register(NativeKind::BasicDoor, build).unwrap();
        let mut registry = FamilyRegistry::new(table)
            .with_index(Volatile)
            .with_index(KeyedIndex::new("rooms", |probe: &Probe| probe.core.rooms().to_vec()));

        let wrapper = registry.get(&world, parent).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.stats().construction_faults, 2);
        // Indices after the faulty one were still fed
        let rooms = registry.index::<KeyedIndex<Probe, ContainerId>>("rooms").unwrap();
        assert_eq!(rooms.entry_count(), 2);

        registry.on_removed(parent);
        assert!(wrapper.is_destroyed());
        assert!(wrapper.children()[0].is_destroyed());
        assert!(registry.is_empty());
        assert_eq!(registry.stats().teardown_faults, 2);
        assert_eq!(registry.stats().retired, 2);
    }

    #[derive(Clone, Default)]
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_cyclic_child_warns_once() {
        let mut world = MapWorld::default();
        let a = world.add(1, "a", &[2]);
        world.add(2, "b", &[1]);
        let mut registry = registry();

        let counter = WarnCounter::default();
        let warnings = Arc::clone(&counter.0);
        let subscriber = tracing_subscriber::registry().with(counter);
        tracing::subscriber::with_default(subscriber, || registry.get(&world, a));

        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_registry_constructs_nothing() {
        let mut world = MapWorld::default();
        let first = world.add(1, "first", &[]);
        let second = world.add(2, "second", &[]);
        let mut registry = registry();
        let wrapper = registry.get(&world, first).unwrap();
        registry.subscribe("plugin-a", 0, |_| {});

        assert_eq!(registry.close(), 1);
        assert!(wrapper.is_destroyed());
        assert_eq!(registry.listener_count(), 0);
        assert!(registry.get(&world, second).is_none());
        registry.on_added(&world, second);
        assert!(registry.is_empty());
        assert_eq!(registry.close(), 0);
    }

    #[test]
    fn test_index_added_later_is_seeded() {
        let mut world = MapWorld::default();
        let handle = world.add(3, "door", &[]);
        let mut registry = FamilyRegistry::new({
            let mut table = TypeDispatchTable::diagnostic();
            table.register(NativeKind::BasicDoor, build).unwrap();
            table
        });
        registry.get(&world, handle).unwrap();

        registry.add_index(Box::new(KeyedIndex::new("rooms", |probe: &Probe| probe.core.rooms().to_vec())));
        let rooms = registry.index::<KeyedIndex<Probe, ContainerId>>("rooms").unwrap();
        assert_eq!(rooms.get(&ContainerId(1)).len(), 1);
    }
}
