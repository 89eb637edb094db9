//! Native object identities
//!
//! A [`NativeHandle`] is the engine-issued identity of one native object. It packs
//! a slot index and a generation into a single `u64`:
//!
//! ```text
//! | generation (32) | index (32) |
//! ```
//!
//! The generation is bumped every time the engine recycles a slot, so a handle kept
//! past its object's destruction never aliases the next object stored in that slot.
//! Index `0` is reserved: the all-zero handle is [`NativeHandle::NULL`] and denotes
//! no object.

use std::fmt;

use serde::{Deserialize, Serialize};

const INDEX_BITS: u32 = 32;
const INDEX_MASK: u64 = (1u64 << INDEX_BITS) - 1;

/// Engine-issued identity of a native object
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    /// The handle that denotes no object
    pub const NULL: NativeHandle = NativeHandle(0);

    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        NativeHandle(((generation as u64) << INDEX_BITS) | index as u64)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        (self.0 >> INDEX_BITS) as u32
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.index() == 0
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "#null")
        } else {
            write!(f, "#{}v{}", self.index(), self.generation())
        }
    }
}

/// Identity of a spatial container (a facility room) native objects live in
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ContainerId(pub u32);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_packing() {
        let handle = NativeHandle::new(42, 7);
        assert_eq!(handle.index(), 42);
        assert_eq!(handle.generation(), 7);
        assert!(!handle.is_null());
        assert_eq!(handle.to_string(), "#42v7");
    }

    #[test]
    fn test_null_handle() {
        assert!(NativeHandle::NULL.is_null());
        assert!(NativeHandle::new(0, 3).is_null());
        assert_eq!(NativeHandle::default(), NativeHandle::NULL);
        assert_eq!(NativeHandle::NULL.to_string(), "#null");
    }

    #[test]
    fn test_recycled_slot_is_a_different_identity() {
        let first = NativeHandle::new(5, 1);
        let recycled = NativeHandle::new(5, 2);
        assert_ne!(first, recycled);
        assert_eq!(first.index(), recycled.index());
    }
}
