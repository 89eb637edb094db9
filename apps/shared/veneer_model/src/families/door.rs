//! Door wrappers
//!
//! Unregistered door kinds (including the abstract `DoorBase`) silently fall back
//! to [`DoorVariant::Basic`]. Checkpoint doors are composites: the sub-doors in
//! their child slots are registered as doors of their own and torn down with the
//! checkpoint.

use std::rc::Rc;

use crate::dispatch::TypeDispatchTable;
use crate::error::Result;
use crate::family::{Construction, FamilyRegistry};
use crate::handle::ContainerId;
use crate::index::KeyedIndex;
use crate::kind::{FamilyKind, NativeKind};
use crate::native::{CommandError, NativeCommand, NativeEngine, NativeObject, NativeWorld};
use crate::wrapper::{Wrapper, WrapperCore};

/// Name of the room index installed on the door registry
pub const ROOM_INDEX: &str = "rooms";

pub type DoorsByRoom = KeyedIndex<Door, ContainerId>;

#[derive(Debug)]
pub enum DoorVariant {
    Basic,
    Breakable { max_health: f32 },
    /// Breakable door that can also be pried open
    Gate { max_health: f32 },
    Checkpoint { sub_doors: Vec<Rc<Door>> },
    Elevator { group: u32 },
}

#[derive(Debug)]
pub struct Door {
    core: WrapperCore,
    variant: DoorVariant,
}

impl Door {
    /// Base door wrapper for any door object
    pub fn basic(object: &NativeObject) -> Door {
        Door {
            core: WrapperCore::from_object(object),
            variant: DoorVariant::Basic,
        }
    }

    pub fn variant(&self) -> &DoorVariant {
        &self.variant
    }

    pub fn is_breakable(&self) -> bool {
        matches!(self.variant, DoorVariant::Breakable { .. } | DoorVariant::Gate { .. })
    }

    /// Health the door was spawned with, for breakable doors
    pub fn max_health(&self) -> Option<f32> {
        match self.variant {
            DoorVariant::Breakable { max_health } | DoorVariant::Gate { max_health } => Some(max_health),
            _ => None,
        }
    }

    /// Doors owned by a checkpoint, empty for every other variant
    pub fn sub_doors(&self) -> &[Rc<Door>] {
        match &self.variant {
            DoorVariant::Checkpoint { sub_doors } => sub_doors,
            _ => &[],
        }
    }

    pub fn is_open(&self, world: &dyn NativeWorld) -> Option<bool> {
        self.core.live_state(world).map(|state| state.open)
    }

    pub fn is_locked(&self, world: &dyn NativeWorld) -> Option<bool> {
        self.core.live_state(world).map(|state| state.locked)
    }

    pub fn health(&self, world: &dyn NativeWorld) -> Option<f32> {
        if !self.is_breakable() {
            return None;
        }
        self.core.live_state(world).map(|state| state.health)
    }

    /// Open or close the door; a checkpoint drives its sub-doors too
    ///
    /// Opening a checkpoint is all or nothing: if the checkpoint or any live
    /// sub-door is locked, nothing is submitted.
    pub fn set_open(&self, engine: &mut dyn NativeEngine, open: bool) -> Result<()> {
        self.core.ensure_live("open")?;
        let live_sub_doors: Vec<&Rc<Door>> = self.sub_doors().iter().filter(|door| !door.is_destroyed()).collect();
        if open {
            let members = std::iter::once(self.handle()).chain(live_sub_doors.iter().map(|door| door.handle()));
            for handle in members {
                if engine.state(handle).is_some_and(|state| state.locked) {
                    return Err(CommandError::Rejected(handle, "checkpoint member is locked".to_string()).into());
                }
            }
        }

        self.core.submit(engine, "open", NativeCommand::SetOpen(open))?;
        for sub_door in live_sub_doors {
            sub_door.core.submit(engine, "open", NativeCommand::SetOpen(open))?;
        }
        Ok(())
    }

    pub fn set_locked(&self, engine: &mut dyn NativeEngine, locked: bool) -> Result<()> {
        self.core.submit(engine, "lock", NativeCommand::SetLocked(locked))
    }

    pub fn damage(&self, engine: &mut dyn NativeEngine, amount: f32) -> Result<()> {
        self.core.ensure_live("damage")?;
        if !self.is_breakable() {
            return Err(self.core.unsupported("damage"));
        }
        self.core.submit(engine, "damage", NativeCommand::Damage(amount))
    }

    pub fn pry_open(&self, engine: &mut dyn NativeEngine) -> Result<()> {
        self.core.ensure_live("pry open")?;
        if !matches!(self.variant, DoorVariant::Gate { .. }) {
            return Err(self.core.unsupported("pry open"));
        }
        self.core.submit(engine, "pry open", NativeCommand::SetOpen(true))
    }
}

impl Wrapper for Door {
    const FAMILY: FamilyKind = FamilyKind::Door;

    fn core(&self) -> &WrapperCore {
        &self.core
    }

    fn variant_name(&self) -> &'static str {
        match self.variant {
            DoorVariant::Basic => "basic",
            DoorVariant::Breakable { .. } => "breakable",
            DoorVariant::Gate { .. } => "gate",
            DoorVariant::Checkpoint { .. } => "checkpoint",
            DoorVariant::Elevator { .. } => "elevator",
        }
    }

    fn children(&self) -> &[Rc<Self>] {
        self.sub_doors()
    }
}

fn build_basic(_: &mut Construction<'_, Door>, object: &NativeObject) -> Option<Door> {
    Some(Door::basic(object))
}

fn build_breakable(_: &mut Construction<'_, Door>, object: &NativeObject) -> Option<Door> {
    Some(Door {
        core: WrapperCore::from_object(object),
        variant: DoorVariant::Breakable {
            max_health: object.state.health,
        },
    })
}

fn build_gate(_: &mut Construction<'_, Door>, object: &NativeObject) -> Option<Door> {
    Some(Door {
        core: WrapperCore::from_object(object),
        variant: DoorVariant::Gate {
            max_health: object.state.health,
        },
    })
}

fn build_checkpoint(ctx: &mut Construction<'_, Door>, object: &NativeObject) -> Option<Door> {
    let sub_doors = ctx.children(object);
    Some(Door {
        core: WrapperCore::from_object(object),
        variant: DoorVariant::Checkpoint { sub_doors },
    })
}

fn build_elevator(_: &mut Construction<'_, Door>, object: &NativeObject) -> Option<Door> {
    Some(Door {
        core: WrapperCore::from_object(object),
        variant: DoorVariant::Elevator {
            group: object.discriminator,
        },
    })
}

fn rooms(door: &Door) -> Vec<ContainerId> {
    door.rooms().to_vec()
}

pub fn dispatch_table() -> Result<TypeDispatchTable<Door>> {
    let mut table = TypeDispatchTable::with_fallback(build_basic);
    table.register(NativeKind::BasicDoor, build_basic)?;
    table.register(NativeKind::BreakableDoor, build_breakable)?;
    table.register(NativeKind::PryableDoor, build_gate)?;
    table.register(NativeKind::CheckpointDoor, build_checkpoint)?;
    table.register(NativeKind::ElevatorDoor, build_elevator)?;
    Ok(table)
}

pub fn registry() -> Result<FamilyRegistry<Door>> {
    Ok(FamilyRegistry::new(dispatch_table()?).with_index(DoorsByRoom::new(ROOM_INDEX, rooms)))
}
