//! In-process reference engine
//!
//! [`SimEngine`] keeps native objects in generational slots, fires add/remove
//! notifications synchronously on the calling thread, and applies commands to
//! object state. It is what the host binary and the test suites drive.
//!
//! Slot 0 is never used, so index 0 stays the null handle. Freeing a slot bumps
//! its generation, so a handle to a destroyed object never aliases the next
//! object stored in the same slot.

use std::mem;

use tracing::debug;

use crate::bridge::{Channel, NotificationListener, NotificationSource};
use crate::handle::{ContainerId, NativeHandle};
use crate::kind::{FamilyKind, NativeKind};
use crate::native::{CommandError, NativeCommand, NativeEngine, NativeObject, NativeState, NativeWorld};

/// Health every spawned object starts with
pub const SPAWN_HEALTH: f32 = 100.0;

struct Slot {
    generation: u32,
    object: Option<NativeObject>,
}

struct Subscription {
    family: FamilyKind,
    channel: Channel,
    listener: NotificationListener,
}

#[derive(Default)]
pub struct SimEngine {
    slots: Vec<Slot>,
    free: Vec<u32>,
    subscriptions: Vec<Subscription>,
    notifications: u64,
}

impl SimEngine {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                object: None,
            }],
            ..Self::default()
        }
    }

    fn allocate(&mut self) -> NativeHandle {
        if self.slots.is_empty() {
            self.slots.push(Slot {
                generation: 0,
                object: None,
            });
        }
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 1,
                    object: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        NativeHandle::new(index, self.slots[index as usize].generation)
    }

    fn slot(&self, handle: NativeHandle) -> Option<&NativeObject> {
        if handle.is_null() {
            return None;
        }
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.object.as_ref()
    }

    fn slot_mut(&mut self, handle: NativeHandle) -> Option<&mut NativeObject> {
        if handle.is_null() {
            return None;
        }
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.object.as_mut()
    }

    fn store(&mut self, object: NativeObject) {
        let index = object.handle.index() as usize;
        self.slots[index].object = Some(object);
    }

    /// Free the slot behind `handle`, returning the object it held
    fn release(&mut self, handle: NativeHandle) -> Option<NativeObject> {
        self.slot(handle)?;
        let slot = &mut self.slots[handle.index() as usize];
        let object = slot.object.take();
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(handle.index());
        object
    }

    /// Spawn a plain object with no discriminator and no children
    pub fn spawn(&mut self, kind: NativeKind, name: &str, rooms: &[ContainerId]) -> NativeHandle {
        self.spawn_with(kind, name, rooms, 0, &[])
    }

    /// Spawn a composite whose children are created alongside it
    pub fn spawn_composite(
        &mut self,
        kind: NativeKind,
        name: &str,
        rooms: &[ContainerId],
        child_kinds: &[NativeKind],
    ) -> NativeHandle {
        self.spawn_with(kind, name, rooms, 0, child_kinds)
    }

    /// Spawn an object, then announce it and its children, parent first
    pub fn spawn_with(
        &mut self,
        kind: NativeKind,
        name: &str,
        rooms: &[ContainerId],
        discriminator: u32,
        child_kinds: &[NativeKind],
    ) -> NativeHandle {
        let mut children = Vec::with_capacity(child_kinds.len());
        for (slot, &child_kind) in child_kinds.iter().enumerate() {
            let handle = self.allocate();
            self.store(Self::object(
                handle,
                child_kind,
                format!("{}/{}", name, slot),
                rooms,
                0,
                Vec::new(),
            ));
            children.push(handle);
        }

        let handle = self.allocate();
        self.store(Self::object(
            handle,
            kind,
            name.to_string(),
            rooms,
            discriminator,
            children.clone(),
        ));
        debug!(family = %kind.family(), handle = %handle, "Spawned {} '{}'", kind, name);

        self.fire(kind.family(), Channel::Added, handle);
        for (child, child_kind) in children.into_iter().zip(child_kinds) {
            self.fire(child_kind.family(), Channel::Added, child);
        }
        handle
    }

    fn object(
        handle: NativeHandle,
        kind: NativeKind,
        name: String,
        rooms: &[ContainerId],
        discriminator: u32,
        children: Vec<NativeHandle>,
    ) -> NativeObject {
        NativeObject {
            handle,
            kind,
            discriminator,
            name,
            containers: rooms.to_vec(),
            children,
            state: NativeState {
                health: SPAWN_HEALTH,
                ..NativeState::default()
            },
        }
    }

    /// Destroy an object and its children, announcing the parent first
    pub fn despawn(&mut self, handle: NativeHandle) -> bool {
        let Some(removed) = self.remove_tree(handle) else {
            return false;
        };
        debug!(family = %removed[0].kind.family(), handle = %handle, "Despawned {}", removed[0].kind);
        for object in removed {
            self.fire(object.kind.family(), Channel::Removed, object.handle);
        }
        true
    }

    /// Destroy an object and its children without any notification
    ///
    /// Models an engine that loses objects behind the bridge's back.
    pub fn despawn_silently(&mut self, handle: NativeHandle) -> bool {
        self.remove_tree(handle).is_some()
    }

    fn remove_tree(&mut self, handle: NativeHandle) -> Option<Vec<NativeObject>> {
        let parent = self.release(handle)?;
        let mut removed = Vec::with_capacity(1 + parent.children.len());
        let children = parent.children.clone();
        removed.push(parent);
        for child in children {
            if let Some(object) = self.release(child) {
                removed.push(object);
            }
        }
        Some(removed)
    }

    fn fire(&mut self, family: FamilyKind, channel: Channel, handle: NativeHandle) {
        let mut subscriptions = mem::take(&mut self.subscriptions);
        for subscription in subscriptions
            .iter_mut()
            .filter(|s| s.family == family && s.channel == channel)
        {
            (subscription.listener)(&*self, handle);
            self.notifications += 1;
        }
        // Keep subscriptions made while firing
        subscriptions.append(&mut self.subscriptions);
        self.subscriptions = subscriptions;
    }

    /// Live handles of one family, in slot order
    pub fn live_handles(&self, family: FamilyKind) -> Vec<NativeHandle> {
        self.slots
            .iter()
            .filter_map(|slot| slot.object.as_ref())
            .filter(|object| object.kind.family() == family)
            .map(|object| object.handle)
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.object.is_some()).count()
    }

    /// Notifications delivered to subscribers so far
    pub fn notifications_fired(&self) -> u64 {
        self.notifications
    }
}

impl NativeWorld for SimEngine {
    fn describe(&self, handle: NativeHandle) -> Option<NativeObject> {
        self.slot(handle).cloned()
    }

    fn is_alive(&self, handle: NativeHandle) -> bool {
        self.slot(handle).is_some()
    }

    fn state(&self, handle: NativeHandle) -> Option<NativeState> {
        self.slot(handle).map(|object| object.state)
    }
}

impl NativeEngine for SimEngine {
    fn submit(&mut self, handle: NativeHandle, command: NativeCommand) -> Result<(), CommandError> {
        let object = self.slot_mut(handle).ok_or(CommandError::NoSuchObject(handle))?;

        match command {
            NativeCommand::Destroy => {
                self.despawn(handle);
            }
            NativeCommand::SetOpen(open) => {
                if open && object.state.locked {
                    return Err(CommandError::Rejected(handle, "object is locked".to_string()));
                }
                object.state.open = open;
            }
            NativeCommand::SetLocked(locked) => object.state.locked = locked,
            NativeCommand::SetActive(active) => object.state.active = active,
            NativeCommand::Damage(amount) => {
                object.state.health = (object.state.health - amount).max(0.0);
                if object.state.health <= 0.0 {
                    self.despawn(handle);
                }
            }
            NativeCommand::Disconnect(reason) => {
                if object.kind != NativeKind::ReferenceHub {
                    return Err(CommandError::Rejected(handle, "not a player".to_string()));
                }
                debug!(family = %FamilyKind::Player, handle = %handle, "Disconnected: {}", reason);
                self.despawn(handle);
            }
        }
        Ok(())
    }
}

impl NotificationSource for SimEngine {
    fn subscribe(&mut self, family: FamilyKind, channel: Channel, listener: NotificationListener) {
        self.subscriptions.push(Subscription {
            family,
            channel,
            listener,
        });
    }
}
