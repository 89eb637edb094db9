//! Environmental hazard wrappers
//!
//! Unregistered hazard kinds fall back to [`HazardVariant::Generic`].

use crate::dispatch::TypeDispatchTable;
use crate::error::Result;
use crate::family::{Construction, FamilyRegistry};
use crate::handle::ContainerId;
use crate::index::KeyedIndex;
use crate::kind::{FamilyKind, NativeKind};
use crate::native::{NativeCommand, NativeEngine, NativeObject, NativeWorld};
use crate::wrapper::{Wrapper, WrapperCore};

pub const ROOM_INDEX: &str = "rooms";

pub type HazardsByRoom = KeyedIndex<Hazard, ContainerId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardVariant {
    Generic,
    /// Expires on its own; the discriminator holds its lifetime in seconds
    Temporary { lifetime_secs: u32 },
    Tantrum { lifetime_secs: u32 },
    AmnesticCloud { lifetime_secs: u32 },
    Sinkhole,
}

#[derive(Debug)]
pub struct Hazard {
    core: WrapperCore,
    variant: HazardVariant,
}

impl Hazard {
    pub fn variant(&self) -> HazardVariant {
        self.variant
    }

    pub fn lifetime_secs(&self) -> Option<u32> {
        match self.variant {
            HazardVariant::Temporary { lifetime_secs }
            | HazardVariant::Tantrum { lifetime_secs }
            | HazardVariant::AmnesticCloud { lifetime_secs } => Some(lifetime_secs),
            HazardVariant::Generic | HazardVariant::Sinkhole => None,
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.lifetime_secs().is_some()
    }

    pub fn is_active(&self, world: &dyn NativeWorld) -> Option<bool> {
        self.core.live_state(world).map(|state| state.active)
    }

    pub fn set_active(&self, engine: &mut dyn NativeEngine, active: bool) -> Result<()> {
        self.core.submit(engine, "toggle", NativeCommand::SetActive(active))
    }

    /// End a temporary hazard early
    pub fn expire(&self, engine: &mut dyn NativeEngine) -> Result<()> {
        self.core.ensure_live("expire")?;
        if !self.is_temporary() {
            return Err(self.core.unsupported("expire"));
        }
        self.core.submit(engine, "expire", NativeCommand::Destroy)
    }
}

impl Wrapper for Hazard {
    const FAMILY: FamilyKind = FamilyKind::Hazard;

    fn core(&self) -> &WrapperCore {
        &self.core
    }

    fn variant_name(&self) -> &'static str {
        match self.variant {
            HazardVariant::Generic => "generic",
            HazardVariant::Temporary { .. } => "temporary",
            HazardVariant::Tantrum { .. } => "tantrum",
            HazardVariant::AmnesticCloud { .. } => "amnestic-cloud",
            HazardVariant::Sinkhole => "sinkhole",
        }
    }
}

fn hazard(object: &NativeObject, variant: HazardVariant) -> Option<Hazard> {
    Some(Hazard {
        core: WrapperCore::from_object(object),
        variant,
    })
}

fn build_generic(_: &mut Construction<'_, Hazard>, object: &NativeObject) -> Option<Hazard> {
    hazard(object, HazardVariant::Generic)
}

fn build_temporary(_: &mut Construction<'_, Hazard>, object: &NativeObject) -> Option<Hazard> {
    hazard(object, HazardVariant::Temporary { lifetime_secs: object.discriminator })
}

fn build_tantrum(_: &mut Construction<'_, Hazard>, object: &NativeObject) -> Option<Hazard> {
    hazard(object, HazardVariant::Tantrum { lifetime_secs: object.discriminator })
}

fn build_amnestic_cloud(_: &mut Construction<'_, Hazard>, object: &NativeObject) -> Option<Hazard> {
    hazard(object, HazardVariant::AmnesticCloud { lifetime_secs: object.discriminator })
}

fn build_sinkhole(_: &mut Construction<'_, Hazard>, object: &NativeObject) -> Option<Hazard> {
    hazard(object, HazardVariant::Sinkhole)
}

fn rooms(hazard: &Hazard) -> Vec<ContainerId> {
    hazard.rooms().to_vec()
}

pub fn dispatch_table() -> Result<TypeDispatchTable<Hazard>> {
    let mut table = TypeDispatchTable::with_fallback(build_generic);
    table.register(NativeKind::TemporaryHazard, build_temporary)?;
    table.register(NativeKind::TantrumHazard, build_tantrum)?;
    table.register(NativeKind::AmnesticCloud, build_amnestic_cloud)?;
    table.register(NativeKind::SinkholeHazard, build_sinkhole)?;
    Ok(table)
}

pub fn registry() -> Result<FamilyRegistry<Hazard>> {
    Ok(FamilyRegistry::new(dispatch_table()?).with_index(HazardsByRoom::new(ROOM_INDEX, rooms)))
}
