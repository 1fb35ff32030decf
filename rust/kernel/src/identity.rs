// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity allocation for geometry and layers.
//!
//! Identities are issued monotonically and never reissued: freeing an
//! identity only removes it from the lookup table. Explicit registration (used
//! when loading) bumps the allocator past the registered value so later
//! allocations cannot collide with loaded entities.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::keys::{GeometryId, GeometryKey, LayerKey};

/// What an identity is bound to. Layers share the identity space with
/// geometry but are not geometry themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdOwner {
    Geometry(GeometryKey),
    Layer(LayerKey),
}

/// Lookup table and allocator for model identities.
#[derive(Debug, Default)]
pub struct IdTable {
    next: u64,
    owners: FxHashMap<GeometryId, IdOwner>,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused identity. The identity is only consumed when
    /// `increment` is set; otherwise the same value is returned again.
    pub fn get_free_id(&mut self, increment: bool) -> GeometryId {
        while self.owners.contains_key(&GeometryId(self.next)) {
            self.next += 1;
        }
        let id = GeometryId(self.next);
        if increment {
            self.next += 1;
        }
        id
    }

    /// Commits an identity to its owner.
    pub fn register_id(&mut self, id: GeometryId, owner: IdOwner) -> Result<()> {
        if !id.is_valid() {
            return Err(Error::InvalidId);
        }
        if self.owners.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        self.owners.insert(id, owner);
        if id.0 >= self.next {
            self.next = id.0 + 1;
        }
        Ok(())
    }

    /// Releases an identity. It stays retired and is not reissued.
    pub fn free_id(&mut self, id: GeometryId) -> Option<IdOwner> {
        self.owners.remove(&id)
    }

    pub fn owner(&self, id: GeometryId) -> Option<IdOwner> {
        self.owners.get(&id).copied()
    }

    pub fn contains(&self, id: GeometryId) -> bool {
        self.owners.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
