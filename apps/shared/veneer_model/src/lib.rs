//! Veneer Object Model
//!
//! Plugin-facing wrappers over engine-owned native objects: doors, hazards,
//! structures, pickups, toys and players. The engine owns object lifetime; this
//! crate guarantees that each live native object is seen by plugins through
//! exactly one wrapper instance, built by the right constructor, and that the
//! wrapper is torn down when the engine reports the object gone.
//!
//! # Architecture
//!
//! - **IdentityRegistry**: map from native handle to the single wrapper instance
//! - **TypeDispatchTable**: exact native kind to constructor, with a per-family
//!   policy for kinds that resolve to nothing
//! - **FamilyRegistry**: create-on-miss `get`, non-allocating `try_get`, teardown
//!   cascade, secondary indices and plugin lifecycle listeners for one family
//! - **LifecycleBridge**: subscribes to the engine's add/remove notifications and
//!   routes them to the family registries
//! - **ObjectModel**: host-owned context holding all of the above
//!
//! Everything runs on the engine thread. Nothing here blocks or locks.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod families;
pub mod family;
pub mod handle;
pub mod index;
pub mod kind;
pub mod model;
pub mod native;
pub mod registry;
pub mod sim;
pub mod wrapper;

pub use bridge::{BridgeStats, Channel, LifecycleBridge, Notification, NotificationListener, NotificationSource};
pub use config::{ConfigError, ModelConfig, SchemaValidated};
pub use dispatch::{Constructor, DispatchPolicy, PolicyKind, TypeDispatchTable};
pub use error::{ModelError, Result, TeardownFault};
pub use family::{Construction, FamilyChannel, FamilyRegistry, FamilyStats, LifecycleEvent};
pub use handle::{ContainerId, NativeHandle};
pub use index::{KeyedIndex, SecondaryIndex};
pub use kind::{FamilyKind, ItemType, NativeKind};
pub use model::{ModelStats, ObjectModel};
pub use native::{CommandError, NativeCommand, NativeEngine, NativeObject, NativeState, NativeWorld};
pub use registry::IdentityRegistry;
pub use sim::SimEngine;
pub use wrapper::{Wrapper, WrapperCore, WrapperState, WrapperSummary};
