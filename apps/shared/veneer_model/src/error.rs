use thiserror::Error;

use crate::config::ConfigError;
use crate::dispatch::PolicyKind;
use crate::handle::NativeHandle;
use crate::kind::{FamilyKind, NativeKind};
use crate::native::CommandError;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("A {family} constructor is already registered for native kind {kind}")]
    DuplicateConstructor { family: FamilyKind, kind: NativeKind },

    #[error("The {family} dispatch table uses the {policy:?} policy and cannot take candidate lists")]
    PolicyMismatch { family: FamilyKind, policy: PolicyKind },

    #[error("Native kind {kind} does not belong to the {family} family")]
    ForeignKind { family: FamilyKind, kind: NativeKind },

    #[error("Cannot {operation} {family} {handle}: the native object was destroyed")]
    Destroyed {
        family: FamilyKind,
        handle: NativeHandle,
        operation: &'static str,
    },

    #[error("Cannot {operation} {family} {handle}: not supported by native kind {kind}")]
    Unsupported {
        family: FamilyKind,
        handle: NativeHandle,
        kind: NativeKind,
        operation: &'static str,
    },

    #[error("Lifecycle bridge is already attached to a notification source")]
    AlreadyAttached,

    #[error("Engine command failed: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failure raised by a wrapper's teardown hook
///
/// Teardown faults are logged by the registry and never abort the rest of the
/// teardown cascade.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Teardown of {family} {handle} failed: {reason}")]
pub struct TeardownFault {
    pub family: FamilyKind,
    pub handle: NativeHandle,
    pub reason: String,
}

impl TeardownFault {
    pub fn new(family: FamilyKind, handle: NativeHandle, reason: impl Into<String>) -> Self {
        Self {
            family,
            handle,
            reason: reason.into(),
        }
    }
}
