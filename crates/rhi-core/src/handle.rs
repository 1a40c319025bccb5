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

//! Typed, generation-tagged resource handles.
//!
//! A handle packs a slot index (bits 0-15), a generation counter (bits 16-23)
//! and a resource-type tag (bits 24-31) into 32 bits. The tag is carried twice:
//! at runtime in the packed value, and at compile time through the `K`
//! parameter, so a texture handle can never be handed to a vertex-buffer API.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

const INDEX_MASK: u32 = 0x0000_FFFF;
const GENERATION_SHIFT: u32 = 16;
const GENERATION_MASK: u32 = 0x00FF_0000;
const TYPE_SHIFT: u32 = 24;

/// The runtime tag identifying which pool owns a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResourceType {
    /// Vertex buffer.
    VertexBuffer = 11,
    /// Index buffer.
    IndexBuffer = 12,
    /// Occlusion query buffer.
    QueryBuffer = 13,
    /// Set of GPU timestamp queries.
    PerfQuerySet = 14,
    /// Shader constant buffer.
    ConstBuffer = 22,
    /// Texture.
    Texture = 31,
    /// Pipeline state object.
    PipelineState = 41,
    /// Render pass.
    RenderPass = 43,
    /// Command buffer.
    CommandBuffer = 44,
    /// Depth-stencil state object.
    DepthStencilState = 51,
    /// Sampler state object.
    SamplerState = 52,
    /// CPU/GPU synchronisation object.
    SyncObject = 61,
    /// Packet list (batch drawer).
    PacketList = 100,
    /// Deduplicated texture set.
    TextureSet = 101,
}

/// Compile-time description of a resource kind.
pub trait ResourceKind: 'static {
    /// The runtime tag stored in bits 24-31 of every handle of this kind.
    const TYPE: ResourceType;
}

/// Marker types, one per resource kind.
pub mod kind {
    use super::{ResourceKind, ResourceType};

    macro_rules! resource_kinds {
        ($($(#[$doc:meta])* $name:ident => $tag:ident;)*) => {
            $(
                $(#[$doc])*
                #[derive(Debug)]
                pub enum $name {}

                impl ResourceKind for $name {
                    const TYPE: ResourceType = ResourceType::$tag;
                }
            )*
        };
    }

    resource_kinds! {
        /// Vertex buffer marker.
        VertexBuffer => VertexBuffer;
        /// Index buffer marker.
        IndexBuffer => IndexBuffer;
        /// Query buffer marker.
        QueryBuffer => QueryBuffer;
        /// Perf query set marker.
        PerfQuerySet => PerfQuerySet;
        /// Const buffer marker.
        ConstBuffer => ConstBuffer;
        /// Texture marker.
        Texture => Texture;
        /// Pipeline state marker.
        PipelineState => PipelineState;
        /// Render pass marker.
        RenderPass => RenderPass;
        /// Command buffer marker.
        CommandBuffer => CommandBuffer;
        /// Depth-stencil state marker.
        DepthStencilState => DepthStencilState;
        /// Sampler state marker.
        SamplerState => SamplerState;
        /// Sync object marker.
        SyncObject => SyncObject;
        /// Packet list marker.
        PacketList => PacketList;
        /// Texture set marker.
        TextureSet => TextureSet;
    }
}

/// An opaque, generation-checked reference to a resource of kind `K`.
pub struct Handle<K: ResourceKind> {
    raw: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> Handle<K> {
    /// The "no resource" handle.
    pub const INVALID: Self = Self {
        raw: 0,
        _kind: PhantomData,
    };

    pub(crate) fn new(index: u16, generation: u8) -> Self {
        let raw = (index as u32)
            | ((generation as u32) << GENERATION_SHIFT)
            | ((K::TYPE as u32) << TYPE_SHIFT);
        Self {
            raw,
            _kind: PhantomData,
        }
    }

    /// Reinterprets a packed value, checking its type tag.
    ///
    /// Returns `None` when the tag belongs to another resource kind. The raw
    /// value `0` yields [`Handle::INVALID`].
    pub fn from_raw(raw: u32) -> Option<Self> {
        if raw == 0 {
            return Some(Self::INVALID);
        }
        if (raw >> TYPE_SHIFT) as u8 != K::TYPE as u8 {
            return None;
        }
        Some(Self {
            raw,
            _kind: PhantomData,
        })
    }

    /// The packed 32-bit value.
    pub const fn raw(self) -> u32 {
        self.raw
    }

    /// The slot index within the owning pool.
    pub const fn index(self) -> u16 {
        (self.raw & INDEX_MASK) as u16
    }

    /// The generation the slot had when this handle was minted.
    pub const fn generation(self) -> u8 {
        ((self.raw & GENERATION_MASK) >> GENERATION_SHIFT) as u8
    }

    /// The runtime type tag carried in the packed value.
    pub const fn type_tag(self) -> u8 {
        (self.raw >> TYPE_SHIFT) as u8
    }

    /// `true` unless this is [`Handle::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.raw != 0
    }
}

impl<K: ResourceKind> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ResourceKind> Copy for Handle<K> {}

impl<K: ResourceKind> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: ResourceKind> Eq for Handle<K> {}

impl<K: ResourceKind> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: ResourceKind> Default for Handle<K> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K: ResourceKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(
                f,
                "{:?}({}v{})",
                K::TYPE,
                self.index(),
                self.generation()
            )
        } else {
            write!(f, "{:?}(invalid)", K::TYPE)
        }
    }
}

/// Handle to a vertex buffer.
pub type HVertexBuffer = Handle<kind::VertexBuffer>;
/// Handle to an index buffer.
pub type HIndexBuffer = Handle<kind::IndexBuffer>;
/// Handle to a query buffer.
pub type HQueryBuffer = Handle<kind::QueryBuffer>;
/// Handle to a perf query set.
pub type HPerfQuerySet = Handle<kind::PerfQuerySet>;
/// Handle to a const buffer.
pub type HConstBuffer = Handle<kind::ConstBuffer>;
/// Handle to a texture.
pub type HTexture = Handle<kind::Texture>;
/// Handle to a pipeline state.
pub type HPipelineState = Handle<kind::PipelineState>;
/// Handle to a render pass.
pub type HRenderPass = Handle<kind::RenderPass>;
/// Handle to a command buffer.
pub type HCommandBuffer = Handle<kind::CommandBuffer>;
/// Handle to a depth-stencil state.
pub type HDepthStencilState = Handle<kind::DepthStencilState>;
/// Handle to a sampler state.
pub type HSamplerState = Handle<kind::SamplerState>;
/// Handle to a sync object.
pub type HSyncObject = Handle<kind::SyncObject>;
/// Handle to a packet list.
pub type HPacketList = Handle<kind::PacketList>;
/// Handle to a texture set.
pub type HTextureSet = Handle<kind::TextureSet>;
