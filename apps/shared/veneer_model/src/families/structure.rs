//! Interactable structure wrappers
//!
//! Structures use the diagnostic policy: a structure kind without a registered
//! constructor yields no wrapper and one warning. Lockers own their chambers.

use std::rc::Rc;

use crate::dispatch::TypeDispatchTable;
use crate::error::Result;
use crate::family::{Construction, FamilyRegistry};
use crate::kind::{FamilyKind, NativeKind};
use crate::native::{NativeCommand, NativeEngine, NativeObject, NativeWorld};
use crate::wrapper::{Wrapper, WrapperCore};

#[derive(Debug)]
pub enum StructureVariant {
    Locker { chambers: Vec<Rc<Structure>> },
    Chamber,
    Generator,
    Workstation,
}

#[derive(Debug)]
pub struct Structure {
    core: WrapperCore,
    variant: StructureVariant,
}

impl Structure {
    pub fn variant(&self) -> &StructureVariant {
        &self.variant
    }

    pub fn chambers(&self) -> &[Rc<Structure>] {
        match &self.variant {
            StructureVariant::Locker { chambers } => chambers,
            _ => &[],
        }
    }

    pub fn is_open(&self, world: &dyn NativeWorld) -> Option<bool> {
        self.core.live_state(world).map(|state| state.open)
    }

    /// Whether a generator is engaged; `None` for other structures
    pub fn is_engaged(&self, world: &dyn NativeWorld) -> Option<bool> {
        match self.variant {
            StructureVariant::Generator => self.core.live_state(world).map(|state| state.active),
            _ => None,
        }
    }

    /// Open or close a locker chamber
    pub fn set_open(&self, engine: &mut dyn NativeEngine, open: bool) -> Result<()> {
        self.core.ensure_live("open")?;
        if !matches!(self.variant, StructureVariant::Chamber) {
            return Err(self.core.unsupported("open"));
        }
        self.core.submit(engine, "open", NativeCommand::SetOpen(open))
    }

    /// Open every live chamber of a locker
    pub fn open_all(&self, engine: &mut dyn NativeEngine) -> Result<usize> {
        self.core.ensure_live("open chambers of")?;
        if !matches!(self.variant, StructureVariant::Locker { .. }) {
            return Err(self.core.unsupported("open chambers of"));
        }
        let mut opened = 0;
        for chamber in self.chambers().iter().filter(|chamber| !chamber.is_destroyed()) {
            chamber.set_open(engine, true)?;
            opened += 1;
        }
        Ok(opened)
    }

    pub fn set_locked(&self, engine: &mut dyn NativeEngine, locked: bool) -> Result<()> {
        self.core.submit(engine, "lock", NativeCommand::SetLocked(locked))
    }

    /// Engage a generator
    pub fn activate(&self, engine: &mut dyn NativeEngine) -> Result<()> {
        self.core.ensure_live("activate")?;
        if !matches!(self.variant, StructureVariant::Generator) {
            return Err(self.core.unsupported("activate"));
        }
        self.core.submit(engine, "activate", NativeCommand::SetActive(true))
    }
}

impl Wrapper for Structure {
    const FAMILY: FamilyKind = FamilyKind::Structure;

    fn core(&self) -> &WrapperCore {
        &self.core
    }

    fn variant_name(&self) -> &'static str {
        match self.variant {
            StructureVariant::Locker { .. } => "locker",
            StructureVariant::Chamber => "chamber",
            StructureVariant::Generator => "generator",
            StructureVariant::Workstation => "workstation",
        }
    }

    fn children(&self) -> &[Rc<Self>] {
        self.chambers()
    }
}

fn build_locker(ctx: &mut Construction<'_, Structure>, object: &NativeObject) -> Option<Structure> {
    let chambers = ctx.children(object);
    Some(Structure {
        core: WrapperCore::from_object(object),
        variant: StructureVariant::Locker { chambers },
    })
}

fn build_chamber(_: &mut Construction<'_, Structure>, object: &NativeObject) -> Option<Structure> {
    Some(Structure {
        core: WrapperCore::from_object(object),
        variant: StructureVariant::Chamber,
    })
}

fn build_generator(_: &mut Construction<'_, Structure>, object: &NativeObject) -> Option<Structure> {
    Some(Structure {
        core: WrapperCore::from_object(object),
        variant: StructureVariant::Generator,
    })
}

fn build_workstation(_: &mut Construction<'_, Structure>, object: &NativeObject) -> Option<Structure> {
    Some(Structure {
        core: WrapperCore::from_object(object),
        variant: StructureVariant::Workstation,
    })
}

pub fn dispatch_table() -> Result<TypeDispatchTable<Structure>> {
    let mut table = TypeDispatchTable::diagnostic();
    table.register(NativeKind::Locker, build_locker)?;
    table.register(NativeKind::LockerChamber, build_chamber)?;
    table.register(NativeKind::Generator, build_generator)?;
    table.register(NativeKind::Workstation, build_workstation)?;
    Ok(table)
}

pub fn registry() -> Result<FamilyRegistry<Structure>> {
    Ok(FamilyRegistry::new(dispatch_table()?))
}
