//! Per-family dispatch from exact native kind to wrapper constructor
//!
//! Dispatch is keyed by the exact [`NativeKind`] reported by the engine. There is
//! no walk up the native parent chain: every concrete kind that needs its own
//! wrapper variant is registered explicitly.
//!
//! Each family declares one [`DispatchPolicy`] for kinds that resolve to nothing:
//!
//! - **Fallback**: build the family's base wrapper, logged at debug level only
//! - **Diagnostic**: log one warning and produce no wrapper
//! - **Candidates**: each kind maps to an ordered list of constructors; a
//!   constructor refuses by returning `None` and the next one is tried. When every
//!   candidate refuses, or none is registered, one warning is logged and no
//!   wrapper is produced.
//!
//! Registering a second constructor list for a kind that already has one is
//! rejected with [`ModelError::DuplicateConstructor`], whatever the policy.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{ModelError, Result};
use crate::family::Construction;
use crate::kind::NativeKind;
use crate::native::NativeObject;
use crate::wrapper::Wrapper;

/// Build a wrapper for a native object, or refuse with `None`
pub type Constructor<W> = fn(&mut Construction<'_, W>, &NativeObject) -> Option<W>;

/// What a family does with kinds that resolve to no wrapper
pub enum DispatchPolicy<W: Wrapper> {
    /// Build the family's base wrapper with this constructor
    Fallback(Constructor<W>),
    /// Warn and produce nothing
    Diagnostic,
    /// Try registered candidates in order, warn and produce nothing if all refuse
    Candidates,
}

impl<W: Wrapper> Clone for DispatchPolicy<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W: Wrapper> Copy for DispatchPolicy<W> {}

impl<W: Wrapper> DispatchPolicy<W> {
    pub fn kind(&self) -> PolicyKind {
        match self {
            DispatchPolicy::Fallback(_) => PolicyKind::Fallback,
            DispatchPolicy::Diagnostic => PolicyKind::Diagnostic,
            DispatchPolicy::Candidates => PolicyKind::Candidates,
        }
    }
}

/// Data-only view of a [`DispatchPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Fallback,
    Diagnostic,
    Candidates,
}

/// Constructors resolved for one exact kind
pub struct Lookup<W: Wrapper> {
    pub kind: NativeKind,
    /// Registered constructors, in trial order
    pub candidates: Vec<Constructor<W>>,
    pub policy: DispatchPolicy<W>,
}

/// Exact-kind dispatch table for one family
pub struct TypeDispatchTable<W: Wrapper> {
    policy: DispatchPolicy<W>,
    entries: HashMap<NativeKind, Vec<Constructor<W>>>,
}

impl<W: Wrapper> TypeDispatchTable<W> {
    /// Table that falls back to `base` for unregistered kinds
    pub fn with_fallback(base: Constructor<W>) -> Self {
        Self::with_policy(DispatchPolicy::Fallback(base))
    }

    /// Table that warns and produces nothing for unregistered kinds
    pub fn diagnostic() -> Self {
        Self::with_policy(DispatchPolicy::Diagnostic)
    }

    /// Table of ordered, refusable candidates
    pub fn candidates() -> Self {
        Self::with_policy(DispatchPolicy::Candidates)
    }

    pub fn with_policy(policy: DispatchPolicy<W>) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy.kind()
    }

    /// Associate one exact kind with one constructor
    pub fn register(&mut self, kind: NativeKind, constructor: Constructor<W>) -> Result<()> {
        self.insert(kind, vec![constructor])
    }

    /// Associate one exact kind with an ordered list of candidate constructors
    ///
    /// Only tables using [`DispatchPolicy::Candidates`] accept lists.
    pub fn register_candidates(
        &mut self,
        kind: NativeKind,
        candidates: impl IntoIterator<Item = Constructor<W>>,
    ) -> Result<()> {
        if self.policy() != PolicyKind::Candidates {
            return Err(ModelError::PolicyMismatch {
                family: W::FAMILY,
                policy: self.policy(),
            });
        }
        self.insert(kind, candidates.into_iter().collect())
    }

    fn insert(&mut self, kind: NativeKind, constructors: Vec<Constructor<W>>) -> Result<()> {
        if kind.family() != W::FAMILY {
            return Err(ModelError::ForeignKind {
                family: W::FAMILY,
                kind,
            });
        }
        if self.entries.contains_key(&kind) {
            return Err(ModelError::DuplicateConstructor {
                family: W::FAMILY,
                kind,
            });
        }
        self.entries.insert(kind, constructors);
        Ok(())
    }

    pub fn is_registered(&self, kind: NativeKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn registered_kinds(&self) -> Vec<NativeKind> {
        let mut kinds: Vec<_> = self.entries.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Resolve the constructors for an exact kind
    ///
    /// The returned lookup is detached from the table so the registry can run the
    /// constructors while it is mutably borrowed.
    pub fn lookup(&self, kind: NativeKind) -> Lookup<W> {
        Lookup {
            kind,
            candidates: self.entries.get(&kind).cloned().unwrap_or_default(),
            policy: self.policy,
        }
    }
}
