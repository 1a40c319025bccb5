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

//! Fixed-capacity slot storage minting generation-checked handles.

use crate::error::ResourceError;
use crate::handle::{Handle, ResourceKind};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::marker::PhantomData;

/// Number of slots a pool gets unless configured otherwise.
pub const DEFAULT_POOL_CAPACITY: usize = 2048;

/// Upper bound imposed by the 16-bit index field of a handle.
pub const MAX_POOL_CAPACITY: usize = 1 << 16;

struct Slot<T> {
    generation: u8,
    object: Option<T>,
}

/// Storage for resources of kind `K`, addressed by [`Handle<K>`].
///
/// The slot array is allocated on the first `alloc` and never grows past the
/// configured capacity. Allocation always returns the lowest free index. A
/// slot's generation is bumped on every allocation and left untouched on free,
/// so handles to a previous occupant are rejected with
/// [`ResourceError::StaleHandle`].
///
/// A pool is not synchronised itself; owners keep it behind a `Mutex` that is
/// held only for the slot operation.
pub struct ResourcePool<T, K: ResourceKind> {
    /// Slots that have been touched at least once.
    slots: Vec<Slot<T>>,
    /// Indices below `slots.len()` that are currently free.
    freed: BinaryHeap<Reverse<u16>>,
    capacity: usize,
    len: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<T, K: ResourceKind> ResourcePool<T, K> {
    /// Creates an empty pool with [`DEFAULT_POOL_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Creates an empty pool with `capacity` slots (clamped to `1..=65536`).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            freed: BinaryHeap::new(),
            capacity: capacity.clamp(1, MAX_POOL_CAPACITY),
            len: 0,
            _kind: PhantomData,
        }
    }

    /// Creates a pool from a configured maximum where `0` means "default".
    pub fn with_configured_capacity(max_count: u32) -> Self {
        match max_count {
            0 => Self::new(),
            n => Self::with_capacity(n as usize),
        }
    }

    /// Changes the capacity. Only allowed before the first allocation.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), ResourceError> {
        if !self.slots.is_empty() {
            return Err(ResourceError::CapacityLocked);
        }
        self.capacity = capacity.clamp(1, MAX_POOL_CAPACITY);
        Ok(())
    }

    /// Stores `object` in the lowest free slot and returns its handle.
    pub fn alloc(&mut self, object: T) -> Result<Handle<K>, ResourceError> {
        let index = match self.freed.pop() {
            Some(Reverse(index)) => index as usize,
            None if self.slots.len() < self.capacity => {
                if self.slots.capacity() == 0 {
                    self.slots.reserve_exact(self.capacity);
                }
                self.slots.push(Slot {
                    generation: 0,
                    object: None,
                });
                self.slots.len() - 1
            }
            None => {
                log::error!(
                    "{:?} pool exhausted: all {} slots are allocated",
                    K::TYPE,
                    self.capacity
                );
                return Err(ResourceError::PoolExhausted {
                    kind: K::TYPE,
                    capacity: self.capacity,
                });
            }
        };

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.object = Some(object);
        self.len += 1;
        Ok(Handle::new(index as u16, slot.generation))
    }

    /// Releases the slot addressed by `handle` and returns its payload.
    pub fn free(&mut self, handle: Handle<K>) -> Result<T, ResourceError> {
        let index = self.check(handle)?;
        let object = self.slots[index]
            .object
            .take()
            .ok_or(ResourceError::NotFound)?;
        self.freed.push(Reverse(index as u16));
        self.len -= 1;
        Ok(object)
    }

    /// Returns the payload addressed by `handle`.
    pub fn get(&self, handle: Handle<K>) -> Result<&T, ResourceError> {
        let index = self.check(handle)?;
        self.slots[index]
            .object
            .as_ref()
            .ok_or(ResourceError::NotFound)
    }

    /// Returns the payload addressed by `handle`, mutably.
    pub fn get_mut(&mut self, handle: Handle<K>) -> Result<&mut T, ResourceError> {
        let index = self.check(handle)?;
        self.slots[index]
            .object
            .as_mut()
            .ok_or(ResourceError::NotFound)
    }

    /// `true` if `handle` addresses a live payload.
    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_ok()
    }

    /// Iterates over allocated slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.object
                .as_ref()
                .map(|object| (Handle::new(index as u16, slot.generation), object))
        })
    }

    /// Iterates mutably over allocated slots in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<K>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.object
                .as_mut()
                .map(|object| (Handle::new(index as u16, generation), object))
        })
    }

    /// Collects the handles of every allocated slot.
    pub fn handles(&self) -> Vec<Handle<K>> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Frees every slot, keeping generations so outstanding handles go stale.
    pub fn clear(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(object) = slot.object.take() {
                drained.push(object);
                self.freed.push(Reverse(index as u16));
            }
        }
        self.len = 0;
        drained
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when no slot is allocated.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The fixed number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn check(&self, handle: Handle<K>) -> Result<usize, ResourceError> {
        if !handle.is_valid() {
            return Err(ResourceError::InvalidHandle);
        }
        if handle.type_tag() != K::TYPE as u8 {
            return Err(ResourceError::TypeMismatch {
                expected: K::TYPE,
                found: handle.type_tag(),
            });
        }
        let index = handle.index() as usize;
        let slot = self.slots.get(index).ok_or(ResourceError::NotFound)?;
        if slot.generation != handle.generation() {
            return Err(ResourceError::StaleHandle {
                kind: K::TYPE,
                index: handle.index(),
                generation: handle.generation(),
                current: slot.generation,
            });
        }
        if slot.object.is_none() {
            return Err(ResourceError::NotFound);
        }
        Ok(index)
    }
}

impl<T, K: ResourceKind> Default for ResourcePool<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K: ResourceKind> fmt::Debug for ResourcePool<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("kind", &K::TYPE)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{kind, HIndexBuffer, HVertexBuffer};
    use std::collections::HashSet;

    type VbPool = ResourcePool<u32, kind::VertexBuffer>;

    #[test]
    fn test_alloc_get_round_trip() {
        let mut pool = VbPool::new();
        let h = pool.alloc(42).unwrap();
        assert!(h.is_valid());
        assert_eq!(*pool.get(h).unwrap(), 42);
        *pool.get_mut(h).unwrap() = 7;
        assert_eq!(*pool.get(h).unwrap(), 7);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_get_after_free_is_stale() {
        let mut pool = VbPool::new();
        let h = pool.alloc(1).unwrap();
        assert_eq!(pool.free(h).unwrap(), 1);

        assert_eq!(pool.get(h), Err(ResourceError::NotFound));

        let reused = pool.alloc(2).unwrap();
        assert_eq!(reused.index(), h.index());
        assert_ne!(reused.generation(), h.generation());
        assert!(matches!(
            pool.get(h),
            Err(ResourceError::StaleHandle { index: 0, .. })
        ));
        assert_eq!(*pool.get(reused).unwrap(), 2);
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut pool = VbPool::new();
        let h = pool.alloc(1).unwrap();
        pool.free(h).unwrap();
        assert!(pool.free(h).is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_invalid_handle_is_rejected() {
        let pool = VbPool::new();
        assert_eq!(
            pool.get(HVertexBuffer::INVALID),
            Err(ResourceError::InvalidHandle)
        );
    }

    #[test]
    fn test_foreign_tag_is_rejected() {
        let mut pool = VbPool::new();
        pool.alloc(1).unwrap();
        let foreign = HIndexBuffer::new(0, 1);
        let forged = HVertexBuffer::from_raw(foreign.raw());
        assert!(forged.is_none());
    }

    #[test]
    fn test_generation_cycles_through_256_values() {
        let mut pool = VbPool::with_capacity(1);
        let mut generations = HashSet::new();
        for i in 0..256 {
            let h = pool.alloc(i).unwrap();
            assert_eq!(h.index(), 0);
            generations.insert(h.generation());
            pool.free(h).unwrap();
        }
        assert_eq!(generations.len(), 256);
    }

    #[test]
    fn test_allocation_is_first_fit() {
        let mut pool = VbPool::new();
        let handles: Vec<_> = (0..5).map(|i| pool.alloc(i).unwrap()).collect();
        pool.free(handles[3]).unwrap();
        pool.free(handles[1]).unwrap();

        assert_eq!(pool.alloc(10).unwrap().index(), 1);
        assert_eq!(pool.alloc(11).unwrap().index(), 3);
        assert_eq!(pool.alloc(12).unwrap().index(), 5);
    }

    #[test]
    fn test_exhaustion_fails_without_touching_slots() {
        let mut pool = VbPool::with_capacity(4);
        let handles: Vec<_> = (0..4).map(|i| pool.alloc(i).unwrap()).collect();

        assert_eq!(
            pool.alloc(99),
            Err(ResourceError::PoolExhausted {
                kind: crate::handle::ResourceType::VertexBuffer,
                capacity: 4
            })
        );
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(*pool.get(*h).unwrap(), i as u32);
        }
    }

    #[test]
    fn test_default_capacity_exhaustion() {
        let mut pool = VbPool::new();
        for i in 0..DEFAULT_POOL_CAPACITY as u32 {
            pool.alloc(i).unwrap();
        }
        assert!(pool.alloc(0).is_err());
        assert_eq!(pool.len(), DEFAULT_POOL_CAPACITY);
    }

    #[test]
    fn test_capacity_is_fixed_at_first_touch() {
        let mut pool = VbPool::new();
        pool.set_capacity(16).unwrap();
        assert_eq!(pool.capacity(), 16);
        pool.alloc(0).unwrap();
        assert_eq!(pool.set_capacity(32), Err(ResourceError::CapacityLocked));
    }

    #[test]
    fn test_iter_skips_freed_slots() {
        let mut pool = VbPool::new();
        let a = pool.alloc(1).unwrap();
        let b = pool.alloc(2).unwrap();
        let c = pool.alloc(3).unwrap();
        pool.free(b).unwrap();

        let live: Vec<_> = pool.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(live, vec![(a, 1), (c, 3)]);
        assert_eq!(pool.handles(), vec![a, c]);
    }

    #[test]
    fn test_clear_invalidates_outstanding_handles() {
        let mut pool = VbPool::new();
        let a = pool.alloc(1).unwrap();
        assert_eq!(pool.clear(), vec![1]);
        assert!(!pool.contains(a));
        let b = pool.alloc(2).unwrap();
        assert_eq!(b.index(), a.index());
        assert!(pool.get(a).is_err());
    }
}
