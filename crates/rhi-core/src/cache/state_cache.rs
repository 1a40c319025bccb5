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

//! A reference-counted, descriptor-keyed cache of immutable objects.

use crate::error::ResourceError;

#[derive(Debug, Clone)]
struct Entry<D, H> {
    desc: D,
    handle: H,
    refs: u32,
}

/// Deduplicates objects built from equal descriptors.
///
/// Lookups are a linear scan: the number of distinct states alive at once
/// is small compared to the number of draws that reference them.
#[derive(Debug, Clone)]
pub struct RefCountedCache<D, H> {
    entries: Vec<Entry<D, H>>,
}

impl<D, H> Default for RefCountedCache<D, H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<D: PartialEq + Clone, H: Copy + PartialEq> RefCountedCache<D, H> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `desc`, creating the object on a miss.
    ///
    /// A hit bumps the reference count; a miss stores the new handle with a
    /// count of one. `create` is not called on a hit.
    pub fn acquire<E>(
        &mut self,
        desc: &D,
        create: impl FnOnce(&D) -> Result<H, E>,
    ) -> Result<H, E> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.desc == *desc) {
            entry.refs += 1;
            return Ok(entry.handle);
        }
        let handle = create(desc)?;
        self.entries.push(Entry {
            desc: desc.clone(),
            handle,
            refs: 1,
        });
        Ok(handle)
    }

    /// Adds a reference to an object already in the cache.
    pub fn add_ref(&mut self, handle: H) -> Result<H, ResourceError> {
        let entry = self.find_mut(handle)?;
        entry.refs += 1;
        Ok(handle)
    }

    /// Drops a reference. Returns the descriptor when the last reference is gone,
    /// at which point the entry is no longer found by [`acquire`](Self::acquire).
    pub fn release(&mut self, handle: H) -> Result<Option<D>, ResourceError> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.handle == handle)
            .ok_or(ResourceError::NotFound)?;
        let entry = &mut self.entries[pos];
        entry.refs -= 1;
        if entry.refs == 0 {
            Ok(Some(self.entries.swap_remove(pos).desc))
        } else {
            Ok(None)
        }
    }

    /// Current reference count of `handle`.
    pub fn ref_count(&self, handle: H) -> Option<u32> {
        self.entries.iter().find(|e| e.handle == handle).map(|e| e.refs)
    }

    /// Mutable access to every cached descriptor.
    pub fn descriptors_mut(&mut self) -> impl Iterator<Item = &mut D> {
        self.entries.iter_mut().map(|e| &mut e.desc)
    }

    /// Every cached handle.
    pub fn handles(&self) -> Vec<H> {
        self.entries.iter().map(|e| e.handle).collect()
    }

    /// Number of distinct cached objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_mut(&mut self, handle: H) -> Result<&mut Entry<D, H>, ResourceError> {
        self.entries
            .iter_mut()
            .find(|e| e.handle == handle)
            .ok_or(ResourceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn test_equal_descriptors_share_one_object() {
        let mut cache: RefCountedCache<u32, usize> = RefCountedCache::new();
        let mut created = 0;
        let mut create = |_: &u32| -> Result<usize, Infallible> {
            created += 1;
            Ok(created)
        };

        let a = cache.acquire(&7, &mut create).unwrap();
        let b = cache.acquire(&7, &mut create).unwrap();
        let c = cache.acquire(&8, &mut create).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(created, 2);
        assert_eq!(cache.ref_count(a), Some(2));
    }

    #[test]
    fn test_release_erases_at_zero() {
        let mut cache: RefCountedCache<u32, usize> = RefCountedCache::new();
        let h = cache.acquire(&1, |_| Ok::<_, Infallible>(10)).unwrap();
        cache.add_ref(h).unwrap();

        assert_eq!(cache.release(h), Ok(None));
        assert_eq!(cache.release(h), Ok(Some(1)));
        assert!(cache.is_empty());
        assert_eq!(cache.release(h), Err(ResourceError::NotFound));

        let again = cache.acquire(&1, |_| Ok::<_, Infallible>(11)).unwrap();
        assert_eq!(again, 11, "a released descriptor creates a new object");
    }

    #[test]
    fn test_failed_creation_caches_nothing() {
        let mut cache: RefCountedCache<u32, usize> = RefCountedCache::new();
        let result = cache.acquire(&1, |_| Err(ResourceError::OutOfBounds));
        assert_eq!(result, Err(ResourceError::OutOfBounds));
        assert!(cache.is_empty());
    }
}
