//! Wrapper families
//!
//! Each module defines one wrapper struct (shared [`crate::wrapper::WrapperCore`]
//! plus a variant enum), its constructors, the default dispatch table and the
//! default registry with its secondary indices.

pub mod door;
pub mod hazard;
pub mod pickup;
pub mod player;
pub mod structure;
pub mod toy;

pub use door::{Door, DoorVariant};
pub use hazard::{Hazard, HazardVariant};
pub use pickup::{GrenadeKind, Pickup, PickupVariant};
pub use player::{Player, PlayerVariant};
pub use structure::{Structure, StructureVariant};
pub use toy::{Toy, ToyVariant};
