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

//! The recorded command vocabulary.

use crate::api::{CullMode, FillMode, PrimitiveType, ScissorRect, Viewport};
use crate::handle::{
    HConstBuffer, HDepthStencilState, HIndexBuffer, HPerfQuerySet, HPipelineState, HQueryBuffer,
    HSamplerState, HTexture, HVertexBuffer,
};
use std::ops::Deref;
use std::sync::Arc;

/// Const buffer contents captured when a binding is recorded.
///
/// Backends keep the live contents of a const buffer behind an `Arc` and
/// replace it on update, so a snapshot is a reference count bump and later
/// updates never reach buffers that were already recorded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstSnapshot(Arc<Vec<f32>>);

impl ConstSnapshot {
    /// Wraps shared contents.
    pub fn new(data: Arc<Vec<f32>>) -> Self {
        Self(data)
    }

    /// Returns `true` when both snapshots share the same storage.
    pub fn ptr_eq(&self, other: &ConstSnapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The shared storage.
    pub fn shared(&self) -> &Arc<Vec<f32>> {
        &self.0
    }
}

impl Deref for ConstSnapshot {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for ConstSnapshot {
    fn from(data: Vec<f32>) -> Self {
        Self(Arc::new(data))
    }
}

/// A draw with the arguments of its native counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    /// Non-indexed draw starting at vertex 0.
    Primitive {
        /// Topology.
        primitive: PrimitiveType,
        /// Number of primitives.
        count: u32,
    },
    /// Indexed draw.
    Indexed {
        /// Topology.
        primitive: PrimitiveType,
        /// Number of primitives.
        count: u32,
        /// Number of vertices referenced by the indices.
        vertex_count: u32,
        /// Value added to each index.
        first_vertex: u32,
        /// First index read from the index buffer.
        start_index: u32,
    },
    /// Non-indexed instanced draw.
    Instanced {
        /// Topology.
        primitive: PrimitiveType,
        /// Number of instances.
        instance_count: u32,
        /// Number of primitives per instance.
        count: u32,
    },
    /// Indexed instanced draw.
    InstancedIndexed {
        /// Topology.
        primitive: PrimitiveType,
        /// Number of instances.
        instance_count: u32,
        /// Number of primitives per instance.
        count: u32,
        /// Number of vertices referenced by the indices.
        vertex_count: u32,
        /// Value added to each index.
        first_vertex: u32,
        /// First index read from the index buffer.
        start_index: u32,
        /// Instance id of the first instance.
        base_instance: u32,
    },
}

impl DrawCall {
    /// Topology of the draw.
    pub fn primitive(&self) -> PrimitiveType {
        match *self {
            DrawCall::Primitive { primitive, .. }
            | DrawCall::Indexed { primitive, .. }
            | DrawCall::Instanced { primitive, .. }
            | DrawCall::InstancedIndexed { primitive, .. } => primitive,
        }
    }

    /// Primitives per instance.
    pub fn primitive_count(&self) -> u32 {
        match *self {
            DrawCall::Primitive { count, .. }
            | DrawCall::Indexed { count, .. }
            | DrawCall::Instanced { count, .. }
            | DrawCall::InstancedIndexed { count, .. } => count,
        }
    }

    /// Number of instances, `1` for non-instanced draws.
    pub fn instance_count(&self) -> u32 {
        match *self {
            DrawCall::Instanced { instance_count, .. }
            | DrawCall::InstancedIndexed { instance_count, .. } => instance_count,
            _ => 1,
        }
    }

    /// `true` when the draw reads the bound index buffer.
    pub fn is_indexed(&self) -> bool {
        matches!(self, DrawCall::Indexed { .. } | DrawCall::InstancedIndexed { .. })
    }

    /// Number of vertices (or indices) consumed per instance, `None` on overflow.
    pub fn element_count(&self) -> Option<u32> {
        self.primitive().vertex_count(self.primitive_count())
    }
}

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Selects the pipeline and the layout of the bound vertex data.
    SetPipelineState {
        /// Pipeline state.
        state: HPipelineState,
        /// Uid of the vertex layout of the bound buffers, `0` for the pipeline's own.
        vertex_layout: u32,
    },
    /// Sets the culled winding.
    SetCullMode(CullMode),
    /// Sets or disables the scissor rectangle.
    SetScissorRect(ScissorRect),
    /// Sets the viewport; all zero restores the pass default.
    SetViewport(Viewport),
    /// Sets the polygon fill mode.
    SetFillMode(FillMode),
    /// Binds a vertex buffer to a stream.
    SetVertexData {
        /// The vertex buffer.
        buffer: HVertexBuffer,
        /// Stream index.
        stream: u32,
    },
    /// Binds a const buffer of the vertex stage.
    SetVertexConstBuffer {
        /// Slot index.
        slot: u32,
        /// The const buffer.
        buffer: HConstBuffer,
        /// Contents at record time.
        data: ConstSnapshot,
    },
    /// Binds a texture to a vertex unit.
    SetVertexTexture {
        /// Unit index.
        unit: u32,
        /// The texture.
        texture: HTexture,
    },
    /// Binds the index buffer.
    SetIndices(HIndexBuffer),
    /// Selects the query buffer receiving occlusion results.
    SetQueryBuffer(HQueryBuffer),
    /// Selects the query slot following draws count into.
    SetQueryIndex(u32),
    /// Writes a timestamp into a perf query set.
    IssueTimestampQuery {
        /// The perf query set.
        set: HPerfQuerySet,
        /// Timestamp slot.
        index: u32,
    },
    /// Binds a const buffer of the fragment stage.
    SetFragmentConstBuffer {
        /// Slot index.
        slot: u32,
        /// The const buffer.
        buffer: HConstBuffer,
        /// Contents at record time.
        data: ConstSnapshot,
    },
    /// Binds a texture to a fragment unit.
    SetFragmentTexture {
        /// Unit index.
        unit: u32,
        /// The texture.
        texture: HTexture,
    },
    /// Selects the depth-stencil state.
    SetDepthStencilState(HDepthStencilState),
    /// Selects the sampler state.
    SetSamplerState(HSamplerState),
    /// Issues a draw.
    Draw(DrawCall),
    /// Inserts a debug marker.
    SetMarker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_shares_storage() {
        let live = Arc::new(vec![1.0f32, 2.0, 3.0, 4.0]);
        let a = ConstSnapshot::new(Arc::clone(&live));
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(&a[..], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_snapshot_survives_copy_on_write_update() {
        let mut live = Arc::new(vec![0.0f32; 4]);
        let recorded = ConstSnapshot::new(Arc::clone(&live));

        Arc::make_mut(&mut live)[0] = 9.0;

        approx::assert_relative_eq!(recorded[0], 0.0);
        approx::assert_relative_eq!(live[0], 9.0);
    }

    #[test]
    fn test_draw_call_accessors() {
        let draw = DrawCall::InstancedIndexed {
            primitive: PrimitiveType::TriangleList,
            instance_count: 5,
            count: 2,
            vertex_count: 4,
            first_vertex: 0,
            start_index: 0,
            base_instance: 0,
        };
        assert!(draw.is_indexed());
        assert_eq!(draw.instance_count(), 5);
        assert_eq!(draw.element_count(), Some(6));

        let plain = DrawCall::Primitive {
            primitive: PrimitiveType::TriangleStrip,
            count: 2,
        };
        assert!(!plain.is_indexed());
        assert_eq!(plain.instance_count(), 1);
        assert_eq!(plain.element_count(), Some(4));
    }
}
