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

//! CPU-visible completion fences for submitted frames.
//!
//! A sync object starts unsignaled. When a frame that references it is
//! executed it is stamped with that frame's number, and it becomes signaled
//! once the device reports a frame at least `latency` frames later as
//! executed. Frames that are rejected signal their sync objects at once so
//! nobody waits on work that will never run.

use crate::error::ResourceError;
use crate::handle::{kind, HSyncObject};
use crate::pool::ResourcePool;

/// Frames a sync object stays unsignaled after execution on a device with a
/// deep command queue.
pub const DEFAULT_SYNC_LATENCY: u64 = 2;

#[derive(Debug, Clone, Copy, Default)]
struct SyncState {
    frame: u64,
    in_flight: bool,
    signaled: bool,
}

/// The sync object table a backend embeds.
#[derive(Debug)]
pub struct SyncObjectTable {
    pool: ResourcePool<SyncState, kind::SyncObject>,
    latency: u64,
}

impl Default for SyncObjectTable {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_LATENCY)
    }
}

impl SyncObjectTable {
    /// Creates a table whose objects signal `latency` frames after execution.
    pub fn new(latency: u64) -> Self {
        Self {
            pool: ResourcePool::new(),
            latency,
        }
    }

    /// Frames between execution and signaling.
    pub fn latency(&self) -> u64 {
        self.latency
    }

    /// Creates an unsignaled sync object.
    pub fn create(&mut self) -> Result<HSyncObject, ResourceError> {
        self.pool.alloc(SyncState::default())
    }

    /// Destroys a sync object.
    pub fn delete(&mut self, handle: HSyncObject) -> Result<(), ResourceError> {
        self.pool.free(handle).map(|_| ())
    }

    /// `true` once the work guarded by `handle` completed. Dead handles report `true`.
    pub fn is_signaled(&self, handle: HSyncObject) -> bool {
        self.pool.get(handle).map(|s| s.signaled).unwrap_or(true)
    }

    /// Stamps `handle` with the number of the frame being executed.
    pub fn mark_executed(&mut self, handle: HSyncObject, frame: u64) {
        if let Ok(state) = self.pool.get_mut(handle) {
            state.frame = frame;
            state.in_flight = true;
            state.signaled = false;
        }
    }

    /// Signals `handle` immediately, for frames that will never execute.
    pub fn signal(&mut self, handle: HSyncObject) {
        if let Ok(state) = self.pool.get_mut(handle) {
            state.in_flight = true;
            state.signaled = true;
        }
    }

    /// Signals every in-flight object stamped at least `latency` frames before `executed_frame`.
    pub fn frame_completed(&mut self, executed_frame: u64) {
        let latency = self.latency;
        for (_, state) in self.pool.iter_mut() {
            if state.in_flight && executed_frame.saturating_sub(state.frame) >= latency {
                state.signaled = true;
            }
        }
    }

    /// Number of live sync objects.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// `true` when no sync object is alive.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sync_is_unsignaled() {
        let mut table = SyncObjectTable::default();
        let sync = table.create().unwrap();
        assert!(!table.is_signaled(sync));
        table.frame_completed(100);
        assert!(!table.is_signaled(sync), "a sync never submitted stays unsignaled");
    }

    #[test]
    fn test_sync_signals_after_latency() {
        let mut table = SyncObjectTable::new(2);
        let sync = table.create().unwrap();

        table.mark_executed(sync, 10);
        table.frame_completed(10);
        assert!(!table.is_signaled(sync));
        table.frame_completed(11);
        assert!(!table.is_signaled(sync));
        table.frame_completed(12);
        assert!(table.is_signaled(sync));
    }

    #[test]
    fn test_zero_latency_signals_on_execution() {
        let mut table = SyncObjectTable::new(0);
        let sync = table.create().unwrap();
        table.mark_executed(sync, 3);
        table.frame_completed(3);
        assert!(table.is_signaled(sync));
    }

    #[test]
    fn test_rejected_and_dead_syncs_are_signaled() {
        let mut table = SyncObjectTable::default();
        let rejected = table.create().unwrap();
        let dead = table.create().unwrap();

        table.signal(rejected);
        table.delete(dead).unwrap();

        assert!(table.is_signaled(rejected));
        assert!(table.is_signaled(dead));
        assert!(table.is_signaled(HSyncObject::INVALID));
        assert_eq!(table.len(), 1);
    }
}
