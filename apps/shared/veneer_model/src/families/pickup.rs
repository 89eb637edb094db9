//! Item pickup wrappers
//!
//! One native pickup kind stands for many items, so each kind maps to an ordered
//! list of candidate constructors that accept or refuse based on the item type in
//! the object's discriminator. A pickup whose item type no candidate accepts
//! yields no wrapper and one warning.

use crate::dispatch::{Constructor, TypeDispatchTable};
use crate::error::Result;
use crate::family::{Construction, FamilyRegistry};
use crate::handle::ContainerId;
use crate::index::KeyedIndex;
use crate::kind::{FamilyKind, ItemType, NativeKind};
use crate::native::{NativeCommand, NativeEngine, NativeObject, NativeWorld};
use crate::wrapper::{Wrapper, WrapperCore};

pub const ROOM_INDEX: &str = "rooms";

pub type PickupsByRoom = KeyedIndex<Pickup, ContainerId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrenadeKind {
    Frag,
    Flash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupVariant {
    Generic,
    Keycard,
    Radio,
    Firearm,
    Ammo,
    Grenade(GrenadeKind),
    /// Thrown object that is not a grenade
    Projectile,
}

#[derive(Debug)]
pub struct Pickup {
    core: WrapperCore,
    item: ItemType,
    variant: PickupVariant,
}

impl Pickup {
    pub fn variant(&self) -> PickupVariant {
        self.variant
    }

    pub fn item_type(&self) -> ItemType {
        self.item
    }

    pub fn grenade_kind(&self) -> Option<GrenadeKind> {
        match self.variant {
            PickupVariant::Grenade(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_thrown(&self) -> bool {
        matches!(self.variant, PickupVariant::Grenade(_) | PickupVariant::Projectile)
    }

    /// Whether the pickup is locked against collection
    pub fn is_locked(&self, world: &dyn NativeWorld) -> Option<bool> {
        self.core.live_state(world).map(|state| state.locked)
    }

    pub fn set_locked(&self, engine: &mut dyn NativeEngine, locked: bool) -> Result<()> {
        self.core.ensure_live("lock")?;
        if self.is_thrown() {
            return Err(self.core.unsupported("lock"));
        }
        self.core.submit(engine, "lock", NativeCommand::SetLocked(locked))
    }
}

impl Wrapper for Pickup {
    const FAMILY: FamilyKind = FamilyKind::Pickup;

    fn core(&self) -> &WrapperCore {
        &self.core
    }

    fn variant_name(&self) -> &'static str {
        match self.variant {
            PickupVariant::Generic => "generic",
            PickupVariant::Keycard => "keycard",
            PickupVariant::Radio => "radio",
            PickupVariant::Firearm => "firearm",
            PickupVariant::Ammo => "ammo",
            PickupVariant::Grenade(GrenadeKind::Frag) => "grenade-frag",
            PickupVariant::Grenade(GrenadeKind::Flash) => "grenade-flash",
            PickupVariant::Projectile => "projectile",
        }
    }
}

fn pickup(object: &NativeObject, item: ItemType, variant: PickupVariant) -> Option<Pickup> {
    Some(Pickup {
        core: WrapperCore::from_object(object),
        item,
        variant,
    })
}

/// Accept only objects carrying `expected` as their item type
fn gated(object: &NativeObject, expected: ItemType, variant: PickupVariant) -> Option<Pickup> {
    match ItemType::from_u32(object.discriminator) {
        Some(item) if item == expected => pickup(object, item, variant),
        _ => None,
    }
}

fn build_keycard(_: &mut Construction<'_, Pickup>, object: &NativeObject) -> Option<Pickup> {
    gated(object, ItemType::Keycard, PickupVariant::Keycard)
}

fn build_radio(_: &mut Construction<'_, Pickup>, object: &NativeObject) -> Option<Pickup> {
    gated(object, ItemType::Radio, PickupVariant::Radio)
}

fn build_generic(_: &mut Construction<'_, Pickup>, object: &NativeObject) -> Option<Pickup> {
    let item = ItemType::from_u32(object.discriminator)?;
    pickup(object, item, PickupVariant::Generic)
}

fn build_firearm(_: &mut Construction<'_, Pickup>, object: &NativeObject) -> Option<Pickup> {
    gated(object, ItemType::Firearm, PickupVariant::Firearm)
}

fn build_ammo(_: &mut Construction<'_, Pickup>, object: &NativeObject) -> Option<Pickup> {
    gated(object, ItemType::Ammo, PickupVariant::Ammo)
}

fn build_grenade(_: &mut Construction<'_, Pickup>, object: &NativeObject) -> Option<Pickup> {
    let item = ItemType::from_u32(object.discriminator)?;
    let kind = match item {
        ItemType::GrenadeFrag => GrenadeKind::Frag,
        ItemType::GrenadeFlash => GrenadeKind::Flash,
        _ => return None,
    };
    pickup(object, item, PickupVariant::Grenade(kind))
}

fn build_projectile(_: &mut Construction<'_, Pickup>, object: &NativeObject) -> Option<Pickup> {
    let item = ItemType::from_u32(object.discriminator)?;
    pickup(object, item, PickupVariant::Projectile)
}

fn rooms(pickup: &Pickup) -> Vec<ContainerId> {
    pickup.rooms().to_vec()
}

pub fn dispatch_table() -> Result<TypeDispatchTable<Pickup>> {
    let mut table = TypeDispatchTable::candidates();
    table.register_candidates(
        NativeKind::ItemPickup,
        [build_keycard as Constructor<Pickup>, build_radio, build_generic],
    )?;
    table.register_candidates(NativeKind::FirearmPickup, [build_firearm as Constructor<Pickup>])?;
    table.register_candidates(NativeKind::AmmoPickup, [build_ammo as Constructor<Pickup>])?;
    table.register_candidates(
        NativeKind::ThrownProjectile,
        [build_grenade as Constructor<Pickup>, build_projectile],
    )?;
    Ok(table)
}

pub fn registry() -> Result<FamilyRegistry<Pickup>> {
    Ok(FamilyRegistry::new(dispatch_table()?).with_index(PickupsByRoom::new(ROOM_INDEX, rooms)))
}
