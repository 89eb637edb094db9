//! Entity families and exact native runtime types
//!
//! The engine reports the exact runtime type of every native object as a
//! [`NativeKind`]. Every kind belongs to exactly one [`FamilyKind`], and dispatch
//! is keyed by the exact kind only: the native parent chain returned by
//! [`NativeKind::parent`] is informational and never consulted when resolving
//! constructors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Families
// ============================================================================

/// Entity families tracked by the object model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FamilyKind {
    Door,
    Hazard,
    Structure,
    Pickup,
    Toy,
    Player,
}

impl FamilyKind {
    /// Every family, in bridge subscription order
    pub const ALL: [FamilyKind; 6] = [
        FamilyKind::Door,
        FamilyKind::Hazard,
        FamilyKind::Structure,
        FamilyKind::Pickup,
        FamilyKind::Toy,
        FamilyKind::Player,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FamilyKind::Door => "door",
            FamilyKind::Hazard => "hazard",
            FamilyKind::Structure => "structure",
            FamilyKind::Pickup => "pickup",
            FamilyKind::Toy => "toy",
            FamilyKind::Player => "player",
        }
    }
}

impl std::fmt::Display for FamilyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FamilyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FamilyKind::ALL
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown entity family: {}", s))
    }
}

// ============================================================================
// Native kinds
// ============================================================================

/// Exact runtime type of a native object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NativeKind {
    // Doors
    DoorBase,
    BasicDoor,
    BreakableDoor,
    PryableDoor,
    CheckpointDoor,
    ElevatorDoor,

    // Environmental hazards
    HazardBase,
    TemporaryHazard,
    TantrumHazard,
    AmnesticCloud,
    SinkholeHazard,

    // Interactable structures
    StructureBase,
    Locker,
    LockerChamber,
    Generator,
    Workstation,

    // Item pickups
    ItemPickup,
    FirearmPickup,
    AmmoPickup,
    ThrownProjectile,

    // Admin toys
    ToyBase,
    LightSourceToy,
    PrimitiveToy,
    SpeakerToy,
    ShootingTargetToy,

    // Players
    ReferenceHub,
}

impl NativeKind {
    /// Family this kind belongs to
    pub fn family(self) -> FamilyKind {
        use NativeKind::*;
        match self {
            DoorBase | BasicDoor | BreakableDoor | PryableDoor | CheckpointDoor | ElevatorDoor => {
                FamilyKind::Door
            }
            HazardBase | TemporaryHazard | TantrumHazard | AmnesticCloud | SinkholeHazard => {
                FamilyKind::Hazard
            }
            StructureBase | Locker | LockerChamber | Generator | Workstation => FamilyKind::Structure,
            ItemPickup | FirearmPickup | AmmoPickup | ThrownProjectile => FamilyKind::Pickup,
            ToyBase | LightSourceToy | PrimitiveToy | SpeakerToy | ShootingTargetToy => FamilyKind::Toy,
            ReferenceHub => FamilyKind::Player,
        }
    }

    /// Native base type this kind derives from, if any
    pub fn parent(self) -> Option<NativeKind> {
        use NativeKind::*;
        match self {
            BasicDoor | BreakableDoor | CheckpointDoor => Some(DoorBase),
            PryableDoor => Some(BreakableDoor),
            ElevatorDoor => Some(BasicDoor),
            TemporaryHazard | SinkholeHazard => Some(HazardBase),
            TantrumHazard | AmnesticCloud => Some(TemporaryHazard),
            Locker | LockerChamber | Generator | Workstation => Some(StructureBase),
            FirearmPickup | AmmoPickup | ThrownProjectile => Some(ItemPickup),
            LightSourceToy | PrimitiveToy | SpeakerToy | ShootingTargetToy => Some(ToyBase),
            DoorBase | HazardBase | StructureBase | ItemPickup | ToyBase | ReferenceHub => None,
        }
    }

    /// Native ancestors, nearest first
    pub fn ancestors(self) -> impl Iterator<Item = NativeKind> {
        std::iter::successors(self.parent(), |kind| kind.parent())
    }
}

impl std::fmt::Display for NativeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// Item discriminator
// ============================================================================

/// Item type carried in the discriminator field of pickup objects
///
/// One native pickup kind can stand for several items, so the pickup family
/// dispatches on this value in addition to the exact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ItemType {
    Keycard = 1,
    Radio = 2,
    Medkit = 3,
    Firearm = 4,
    Ammo = 5,
    GrenadeFrag = 6,
    GrenadeFlash = 7,
    Ball = 8,
}

impl ItemType {
    /// Convert from the raw discriminator value
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(ItemType::Keycard),
            2 => Some(ItemType::Radio),
            3 => Some(ItemType::Medkit),
            4 => Some(ItemType::Firearm),
            5 => Some(ItemType::Ammo),
            6 => Some(ItemType::GrenadeFrag),
            7 => Some(ItemType::GrenadeFlash),
            8 => Some(ItemType::Ball),
            _ => None,
        }
    }

    /// Convert to the raw discriminator value
    pub fn to_u32(self) -> u32 {
        self as u32
    }
}
