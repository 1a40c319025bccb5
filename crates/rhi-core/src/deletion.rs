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

//! Deferred destruction of resources that in-flight frames may still use.
//!
//! Deletions requested during a frame are parked in the slot of that frame.
//! Each slot owns a frame sync object, created lazily when the slot has
//! something to delete. `present` submits the slot's sync with the frame,
//! rotates to the next slot and then destroys every parked resource whose
//! slot sync has signaled.

use crate::handle::{
    HConstBuffer, HDepthStencilState, HIndexBuffer, HPipelineState, HQueryBuffer, HSamplerState,
    HSyncObject, HTexture, HTextureSet, HVertexBuffer,
};

/// Number of frame slots in the rotation.
pub const FRAME_SYNC_SLOT_COUNT: usize = 16;

/// A resource parked for destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledResource {
    /// A vertex buffer.
    VertexBuffer(HVertexBuffer),
    /// An index buffer.
    IndexBuffer(HIndexBuffer),
    /// A texture.
    Texture(HTexture),
    /// A query buffer.
    QueryBuffer(HQueryBuffer),
    /// A const buffer.
    ConstBuffer(HConstBuffer),
    /// A pipeline state.
    PipelineState(HPipelineState),
    /// A depth-stencil state.
    DepthStencilState(HDepthStencilState),
    /// A sampler state.
    SamplerState(HSamplerState),
    /// A texture set.
    TextureSet(HTextureSet),
}

#[derive(Debug, Default)]
struct FrameSlot {
    sync: HSyncObject,
    pending: Vec<ScheduledResource>,
}

/// The rotation of frame slots.
#[derive(Debug, Default)]
pub struct DeletionScheduler {
    slots: [FrameSlot; FRAME_SYNC_SLOT_COUNT],
    current: usize,
}

impl DeletionScheduler {
    /// Creates an empty rotation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks `resource` in the current frame's slot.
    pub fn schedule(&mut self, resource: ScheduledResource) {
        log::trace!("Scheduled {:?} for deletion in slot {}", resource, self.current);
        self.slots[self.current].pending.push(resource);
    }

    /// Index of the current slot.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// Sync object of the current slot, possibly invalid.
    pub fn current_sync(&self) -> HSyncObject {
        self.slots[self.current].sync
    }

    /// `true` when the current slot has parked resources but no sync object yet.
    pub fn needs_frame_sync(&self) -> bool {
        let slot = &self.slots[self.current];
        !slot.pending.is_empty() && !slot.sync.is_valid()
    }

    /// Attaches a freshly created sync object to the current slot.
    pub fn set_current_sync(&mut self, sync: HSyncObject) {
        self.slots[self.current].sync = sync;
    }

    /// Moves to the next slot and returns its stale sync object for destruction.
    ///
    /// A slot whose parked resources are still waiting keeps its sync object;
    /// new deletions then join the resources already waiting there.
    pub fn advance(&mut self) -> Option<HSyncObject> {
        self.current = (self.current + 1) % FRAME_SYNC_SLOT_COUNT;
        let slot = &mut self.slots[self.current];
        if !slot.pending.is_empty() {
            log::warn!(
                "Deletion slot {} still holds {} resources after a full rotation",
                self.current,
                slot.pending.len()
            );
            return None;
        }
        let stale = std::mem::take(&mut slot.sync);
        stale.is_valid().then_some(stale)
    }

    /// Removes and returns the parked resources of every slot whose sync has signaled.
    pub fn take_signaled(
        &mut self,
        mut is_signaled: impl FnMut(HSyncObject) -> bool,
    ) -> Vec<ScheduledResource> {
        let mut ready = Vec::new();
        for slot in &mut self.slots {
            if slot.sync.is_valid() && !slot.pending.is_empty() && is_signaled(slot.sync) {
                ready.append(&mut slot.pending);
            }
        }
        ready
    }

    /// Removes everything parked, regardless of sync state.
    pub fn drain_all(&mut self) -> Vec<ScheduledResource> {
        self.slots
            .iter_mut()
            .flat_map(|slot| std::mem::take(&mut slot.pending))
            .collect()
    }

    /// Removes every slot sync object, for destruction on shutdown.
    pub fn take_sync_objects(&mut self) -> Vec<HSyncObject> {
        self.slots
            .iter_mut()
            .map(|slot| std::mem::take(&mut slot.sync))
            .filter(|sync| sync.is_valid())
            .collect()
    }

    /// Number of parked resources across all slots.
    pub fn pending_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.pending.len()).sum()
    }
}
