// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Texture sets: deduplicated, reference-counted lists of texture bindings.

use super::state_cache::RefCountedCache;
use crate::api::TextureSetDescriptor;
use crate::error::ResourceError;
use crate::handle::{kind, HTexture, HTextureSet};
use crate::pool::ResourcePool;

/// Owns every texture set and the lookup that deduplicates them.
///
/// The pool slot holds the bindings packet lists read at record time. The
/// lookup entry goes away as soon as the last reference is released, while
/// the slot itself may be freed later through the deletion scheduler.
#[derive(Debug, Default)]
pub struct TextureSetCache {
    pool: ResourcePool<TextureSetDescriptor, kind::TextureSet>,
    lookup: RefCountedCache<TextureSetDescriptor, HTextureSet>,
}

impl TextureSetCache {
    /// Creates an empty cache backed by a pool of `max_count` slots (0 for the default).
    pub fn new(max_count: u32) -> Self {
        Self {
            pool: ResourcePool::with_configured_capacity(max_count),
            lookup: RefCountedCache::new(),
        }
    }

    /// Returns the set matching `desc`, allocating it on a miss.
    pub fn acquire(&mut self, desc: &TextureSetDescriptor) -> Result<HTextureSet, ResourceError> {
        if !desc.is_within_limits() {
            return Err(ResourceError::OutOfBounds);
        }
        let pool = &mut self.pool;
        self.lookup.acquire(desc, |d| pool.alloc(d.clone()))
    }

    /// Adds a reference to `handle` and returns it.
    pub fn copy(&mut self, handle: HTextureSet) -> Result<HTextureSet, ResourceError> {
        self.pool.get(handle)?;
        self.lookup.add_ref(handle)
    }

    /// Drops a reference. Returns `true` when the set is no longer referenced;
    /// its slot must then be freed with [`free_slot`](Self::free_slot).
    pub fn release(&mut self, handle: HTextureSet) -> Result<bool, ResourceError> {
        self.pool.get(handle)?;
        Ok(self.lookup.release(handle)?.is_some())
    }

    /// Frees the pool slot of a set whose last reference was released.
    pub fn free_slot(&mut self, handle: HTextureSet) -> Result<(), ResourceError> {
        self.pool.free(handle).map(|_| ())
    }

    /// The bindings of `handle`.
    pub fn get(&self, handle: HTextureSet) -> Result<&TextureSetDescriptor, ResourceError> {
        self.pool.get(handle)
    }

    /// Reference count of `handle`, `None` once released.
    pub fn ref_count(&self, handle: HTextureSet) -> Option<u32> {
        self.lookup.ref_count(handle)
    }

    /// Swaps `old` for `new` in every live set and in the lookup keys.
    pub fn replace_texture_in_all(&mut self, old: HTexture, new: HTexture) {
        let swap = |textures: &mut Vec<HTexture>| {
            for t in textures.iter_mut().filter(|t| **t == old) {
                *t = new;
            }
        };
        for handle in self.lookup.handles() {
            if let Ok(set) = self.pool.get_mut(handle) {
                swap(&mut set.fragment_textures);
                swap(&mut set.vertex_textures);
            }
        }
        for desc in self.lookup.descriptors_mut() {
            swap(&mut desc.fragment_textures);
            swap(&mut desc.vertex_textures);
        }
    }

    /// Number of distinct referenced sets.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// `true` when no set is referenced.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}
