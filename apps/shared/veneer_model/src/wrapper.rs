//! The facade contract
//!
//! Every family wrapper is a plain struct holding a [`WrapperCore`] plus a variant
//! payload, and implements the [`Wrapper`] capability trait. The core carries the
//! data cached at construction time and the Live → Destroyed state machine.
//!
//! # Destroyed wrappers
//!
//! Plugins may keep an `Rc` to a wrapper after its native object is gone. Each
//! operation category behaves the same way on every family:
//!
//! - cached reads (`handle`, `kind`, `name`, `rooms`, variant data) keep working
//! - live reads go through [`WrapperCore::live_state`] and return `None`
//! - mutations go through [`WrapperCore::submit`] and fail with
//!   [`ModelError::Destroyed`] without contacting the engine

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{ModelError, Result, TeardownFault};
use crate::handle::{ContainerId, NativeHandle};
use crate::kind::{FamilyKind, NativeKind};
use crate::native::{NativeCommand, NativeEngine, NativeObject, NativeState, NativeWorld};

/// Lifecycle state of a wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapperState {
    Live,
    /// Terminal: the native object was destroyed
    Destroyed,
}

/// State shared by every wrapper: identity, cached data, tombstone flag
#[derive(Debug)]
pub struct WrapperCore {
    handle: NativeHandle,
    kind: NativeKind,
    discriminator: u32,
    name: String,
    rooms: Vec<ContainerId>,
    state: Cell<WrapperState>,
    attachments: RefCell<HashMap<String, serde_json::Value>>,
}

impl WrapperCore {
    pub fn from_object(object: &NativeObject) -> Self {
        Self {
            handle: object.handle,
            kind: object.kind,
            discriminator: object.discriminator,
            name: object.name.clone(),
            rooms: object.containers.clone(),
            state: Cell::new(WrapperState::Live),
            attachments: RefCell::new(HashMap::new()),
        }
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn kind(&self) -> NativeKind {
        self.kind
    }

    pub fn family(&self) -> FamilyKind {
        self.kind.family()
    }

    pub fn discriminator(&self) -> u32 {
        self.discriminator
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rooms(&self) -> &[ContainerId] {
        &self.rooms
    }

    pub fn state(&self) -> WrapperState {
        self.state.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.get() == WrapperState::Destroyed
    }

    /// Fail with [`ModelError::Destroyed`] if the wrapper is tombstoned
    pub fn ensure_live(&self, operation: &'static str) -> Result<()> {
        if self.is_destroyed() {
            return Err(ModelError::Destroyed {
                family: self.family(),
                handle: self.handle,
                operation,
            });
        }
        Ok(())
    }

    /// Send a mutation to the engine on behalf of this wrapper
    pub fn submit(
        &self,
        engine: &mut dyn NativeEngine,
        operation: &'static str,
        command: NativeCommand,
    ) -> Result<()> {
        self.ensure_live(operation)?;
        engine.submit(self.handle, command)?;
        Ok(())
    }

    /// Build the error for a mutation the wrapper's variant cannot perform
    pub fn unsupported(&self, operation: &'static str) -> ModelError {
        ModelError::Unsupported {
            family: self.family(),
            handle: self.handle,
            kind: self.kind,
            operation,
        }
    }

    /// Current runtime state, `None` once destroyed or if the engine lost the object
    pub fn live_state(&self, world: &dyn NativeWorld) -> Option<NativeState> {
        if self.is_destroyed() {
            return None;
        }
        world.state(self.handle)
    }

    /// Store plugin data on the wrapper
    pub fn attach(&self, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        self.ensure_live("attach data to")?;
        self.attachments.borrow_mut().insert(key.into(), value);
        Ok(())
    }

    pub fn attachment(&self, key: &str) -> Option<serde_json::Value> {
        self.attachments.borrow().get(key).cloned()
    }

    pub fn detach(&self, key: &str) -> Option<serde_json::Value> {
        self.attachments.borrow_mut().remove(key)
    }

    /// Move to the terminal state; returns `false` if already destroyed
    pub(crate) fn tombstone(&self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.state.set(WrapperState::Destroyed);
        self.attachments.borrow_mut().clear();
        true
    }
}

/// Serializable description of a wrapper
#[derive(Debug, Clone, Serialize)]
pub struct WrapperSummary {
    pub family: FamilyKind,
    pub handle: NativeHandle,
    pub kind: NativeKind,
    pub variant: &'static str,
    pub name: String,
    pub rooms: Vec<ContainerId>,
    pub state: WrapperState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NativeHandle>,
}

/// Capability trait implemented by every family wrapper
pub trait Wrapper: Sized + 'static {
    /// Family the wrapper type belongs to
    const FAMILY: FamilyKind;

    fn core(&self) -> &WrapperCore;

    /// Name of the wrapper variant, for logs and summaries
    fn variant_name(&self) -> &'static str;

    /// Owned child wrappers, torn down together with this wrapper
    fn children(&self) -> &[Rc<Self>] {
        &[]
    }

    /// Family-specific cleanup, run once when the native object is removed
    fn on_teardown(&self) -> std::result::Result<(), TeardownFault> {
        Ok(())
    }

    fn handle(&self) -> NativeHandle {
        self.core().handle()
    }

    fn kind(&self) -> NativeKind {
        self.core().kind()
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn rooms(&self) -> &[ContainerId] {
        self.core().rooms()
    }

    fn is_destroyed(&self) -> bool {
        self.core().is_destroyed()
    }

    /// Not destroyed, and the engine still knows the handle
    fn is_valid(&self, world: &dyn NativeWorld) -> bool {
        !self.is_destroyed() && world.is_alive(self.handle())
    }

    /// Ask the engine to destroy the native object
    ///
    /// The wrapper stays live until the engine's removal notification is delivered.
    fn request_destroy(&self, engine: &mut dyn NativeEngine) -> Result<()> {
        self.core().submit(engine, "destroy", NativeCommand::Destroy)
    }

    fn summary(&self) -> WrapperSummary {
        let core = self.core();
        WrapperSummary {
            family: Self::FAMILY,
            handle: core.handle(),
            kind: core.kind(),
            variant: self.variant_name(),
            name: core.name().to_string(),
            rooms: core.rooms().to_vec(),
            state: core.state(),
            children: self.children().iter().map(|child| child.handle()).collect(),
        }
    }
}
