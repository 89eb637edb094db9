//! Boundary with the host engine
//!
//! The object model never owns native objects. It reads them through
//! [`NativeWorld`] and asks the engine to change them through [`NativeEngine`].
//! Destruction requested through [`NativeCommand::Destroy`] is only a request:
//! registry cleanup happens when the engine later fires its removal notification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handle::{ContainerId, NativeHandle};
use crate::kind::NativeKind;

/// Mutable runtime state of a native object
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeState {
    pub open: bool,
    pub locked: bool,
    /// Generators engaged, lights enabled, speakers playing, ...
    pub active: bool,
    pub health: f32,
}

/// Snapshot of a native object as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeObject {
    pub handle: NativeHandle,
    pub kind: NativeKind,
    /// Auxiliary discriminator (item type for pickups, flags for players)
    pub discriminator: u32,
    pub name: String,
    /// Rooms the object belongs to
    pub containers: Vec<ContainerId>,
    /// Statically known child objects, in slot order
    pub children: Vec<NativeHandle>,
    pub state: NativeState,
}

/// Read access to the engine's object graph
pub trait NativeWorld {
    /// Describe the object behind `handle`, or `None` when it denotes no object
    fn describe(&self, handle: NativeHandle) -> Option<NativeObject>;

    /// Whether `handle` still denotes a live object
    fn is_alive(&self, handle: NativeHandle) -> bool {
        self.describe(handle).is_some()
    }

    /// Current runtime state of a live object
    fn state(&self, handle: NativeHandle) -> Option<NativeState> {
        self.describe(handle).map(|object| object.state)
    }
}

/// Mutation requests sent to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NativeCommand {
    /// Ask the engine to destroy the object
    Destroy,
    SetOpen(bool),
    SetLocked(bool),
    /// Generators, lights, speakers
    SetActive(bool),
    Damage(f32),
    /// Players only
    Disconnect(String),
}

/// Engine-side rejection of a command
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("No native object behind handle {0}")]
    NoSuchObject(NativeHandle),

    #[error("Native object {0} rejected command: {1}")]
    Rejected(NativeHandle, String),
}

/// Write access to the engine
pub trait NativeEngine: NativeWorld {
    /// Submit a command for the object behind `handle`
    ///
    /// Commands may fire engine notifications synchronously before returning.
    fn submit(&mut self, handle: NativeHandle, command: NativeCommand) -> Result<(), CommandError>;
}
