//! Admin toy wrappers

use crate::dispatch::TypeDispatchTable;
use crate::error::Result;
use crate::family::{Construction, FamilyRegistry};
use crate::handle::ContainerId;
use crate::index::KeyedIndex;
use crate::kind::{FamilyKind, NativeKind};
use crate::native::{NativeCommand, NativeEngine, NativeObject, NativeWorld};
use crate::wrapper::{Wrapper, WrapperCore};

pub const ROOM_INDEX: &str = "rooms";

pub type ToysByRoom = KeyedIndex<Toy, ContainerId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToyVariant {
    Light,
    Primitive,
    /// Audio speaker; the discriminator carries its playback channel
    Speaker { channel: u32 },
    ShootingTarget,
}

#[derive(Debug)]
pub struct Toy {
    core: WrapperCore,
    variant: ToyVariant,
}

impl Toy {
    pub fn variant(&self) -> ToyVariant {
        self.variant
    }

    /// Toys that can be switched on and off
    pub fn is_switchable(&self) -> bool {
        matches!(self.variant, ToyVariant::Light | ToyVariant::Speaker { .. })
    }

    pub fn is_active(&self, world: &dyn NativeWorld) -> Option<bool> {
        if !self.is_switchable() {
            return None;
        }
        self.core.live_state(world).map(|state| state.active)
    }

    /// Switch a light on or off, or start and stop a speaker
    pub fn set_active(&self, engine: &mut dyn NativeEngine, active: bool) -> Result<()> {
        self.core.ensure_live("switch")?;
        if !self.is_switchable() {
            return Err(self.core.unsupported("switch"));
        }
        self.core.submit(engine, "switch", NativeCommand::SetActive(active))
    }

    /// Register a hit on a shooting target
    pub fn hit(&self, engine: &mut dyn NativeEngine, damage: f32) -> Result<()> {
        self.core.ensure_live("hit")?;
        if self.variant != ToyVariant::ShootingTarget {
            return Err(self.core.unsupported("hit"));
        }
        self.core.submit(engine, "hit", NativeCommand::Damage(damage))
    }
}

impl Wrapper for Toy {
    const FAMILY: FamilyKind = FamilyKind::Toy;

    fn core(&self) -> &WrapperCore {
        &self.core
    }

    fn variant_name(&self) -> &'static str {
        match self.variant {
            ToyVariant::Light => "light",
            ToyVariant::Primitive => "primitive",
            ToyVariant::Speaker { .. } => "speaker",
            ToyVariant::ShootingTarget => "shooting-target",
        }
    }
}

fn toy(object: &NativeObject, variant: ToyVariant) -> Option<Toy> {
    Some(Toy {
        core: WrapperCore::from_object(object),
        variant,
    })
}

fn build_light(_: &mut Construction<'_, Toy>, object: &NativeObject) -> Option<Toy> {
    toy(object, ToyVariant::Light)
}

fn build_primitive(_: &mut Construction<'_, Toy>, object: &NativeObject) -> Option<Toy> {
    toy(object, ToyVariant::Primitive)
}

fn build_speaker(_: &mut Construction<'_, Toy>, object: &NativeObject) -> Option<Toy> {
    toy(object, ToyVariant::Speaker { channel: object.discriminator })
}

fn build_shooting_target(_: &mut Construction<'_, Toy>, object: &NativeObject) -> Option<Toy> {
    toy(object, ToyVariant::ShootingTarget)
}

fn rooms(toy: &Toy) -> Vec<ContainerId> {
    toy.rooms().to_vec()
}

pub fn dispatch_table() -> Result<TypeDispatchTable<Toy>> {
    let mut table = TypeDispatchTable::diagnostic();
    table.register(NativeKind::LightSourceToy, build_light)?;
    table.register(NativeKind::PrimitiveToy, build_primitive)?;
    table.register(NativeKind::SpeakerToy, build_speaker)?;
    table.register(NativeKind::ShootingTargetToy, build_shooting_target)?;
    Ok(table)
}

pub fn registry() -> Result<FamilyRegistry<Toy>> {
    Ok(FamilyRegistry::new(dispatch_table()?).with_index(ToysByRoom::new(ROOM_INDEX, rooms)))
}
