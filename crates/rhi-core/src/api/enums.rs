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

//! Generic rendering enums shared by descriptors, commands and backends.

use serde::{Deserialize, Serialize};

/// A native graphics API a backend can emulate or drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Api {
    /// Direct3D 11.
    Dx11,
    /// Direct3D 9.
    Dx9,
    /// OpenGL ES 2.
    Gles2,
    /// Apple's Metal API.
    Metal,
}

/// The programmable stage a program or sampler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgType {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
}

/// Primitive topology of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    /// Independent triangles.
    #[default]
    TriangleList = 1,
    /// Triangle strip.
    TriangleStrip = 2,
    /// Independent lines.
    LineList = 10,
}

impl PrimitiveType {
    /// Number of vertices (or indices) consumed by `primitive_count` primitives,
    /// or `None` when it does not fit in a `u32`.
    pub const fn vertex_count(self, primitive_count: u32) -> Option<u32> {
        match self {
            PrimitiveType::TriangleList => primitive_count.checked_mul(3),
            PrimitiveType::TriangleStrip => primitive_count.checked_add(2),
            PrimitiveType::LineList => primitive_count.checked_mul(2),
        }
    }
}

/// Rasterizer fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Filled polygons.
    #[default]
    Solid = 1,
    /// Polygon edges only.
    Wireframe = 2,
}

/// Which winding is culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    None = 0,
    /// Counter-clockwise faces are culled.
    #[default]
    Ccw = 1,
    /// Clockwise faces are culled.
    Cw = 2,
}

impl CullMode {
    /// The mode culling the opposite winding, used when a pass flips its projection.
    pub const fn inverted(self) -> Self {
        match self {
            CullMode::None => CullMode::None,
            CullMode::Ccw => CullMode::Cw,
            CullMode::Cw => CullMode::Ccw,
        }
    }
}

/// Expected update frequency of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Usage {
    /// Let the backend decide.
    #[default]
    Default,
    /// Written once, drawn many times.
    StaticDraw,
    /// Rewritten frequently.
    DynamicDraw,
}

/// Memory pool a buffer should live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryPool {
    /// Let the backend decide.
    #[default]
    Default,
    /// Device-local memory.
    LocalMemory,
    /// Host-visible system memory.
    SystemMemory,
}

/// Width of the indices stored in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexSize {
    /// 16-bit indices.
    #[default]
    Size16 = 0,
    /// 32-bit indices.
    Size32 = 1,
}

impl IndexSize {
    /// Size of one index in bytes.
    pub const fn bytes(self) -> u32 {
        match self {
            IndexSize::Size16 => 2,
            IndexSize::Size32 => 4,
        }
    }
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    /// One-dimensional texture.
    Tex1D,
    /// Two-dimensional texture.
    #[default]
    Tex2D,
    /// Cube map (six 2D faces).
    Cube,
}

impl TextureType {
    /// Number of faces stored per mip level.
    pub const fn face_count(self) -> usize {
        match self {
            TextureType::Cube => 6,
            _ => 1,
        }
    }
}

/// One face of a cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFace {
    /// +X face (also the only face of non-cube textures).
    #[default]
    PositiveX = 0,
    /// -X face.
    NegativeX = 1,
    /// +Y face.
    PositiveY = 2,
    /// -Y face.
    NegativeY = 3,
    /// +Z face.
    PositiveZ = 4,
    /// -Z face.
    NegativeZ = 5,
}

impl TextureFace {
    /// All faces in storage order.
    pub const ALL: [TextureFace; 6] = [
        TextureFace::PositiveX,
        TextureFace::NegativeX,
        TextureFace::PositiveY,
        TextureFace::NegativeY,
        TextureFace::PositiveZ,
        TextureFace::NegativeZ,
    ];
}

/// Texture coordinate addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureAddrMode {
    /// Repeat.
    #[default]
    Wrap,
    /// Clamp to edge.
    Clamp,
    /// Mirrored repeat.
    Mirror,
}

/// Minification / magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    /// Nearest texel.
    Nearest,
    /// Bilinear.
    #[default]
    Linear,
}

/// Filter between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureMipFilter {
    /// Mipmapping disabled.
    None,
    /// Nearest level.
    Nearest,
    /// Blend between levels.
    #[default]
    Linear,
}

/// Comparison function for depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CmpFunc {
    /// Never passes.
    Never,
    /// Passes if less.
    Less,
    /// Passes if equal.
    Equal,
    /// Passes if less or equal.
    #[default]
    LessEqual,
    /// Passes if greater.
    Greater,
    /// Passes if not equal.
    NotEqual,
    /// Passes if greater or equal.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Action applied to the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    /// Keep the current value.
    #[default]
    Keep,
    /// Set to zero.
    Zero,
    /// Replace with the reference value.
    Replace,
    /// Bitwise invert.
    Invert,
    /// Increment, clamping at the maximum.
    IncrementClamp,
    /// Decrement, clamping at zero.
    DecrementClamp,
    /// Increment with wrap-around.
    IncrementWrap,
    /// Decrement with wrap-around.
    DecrementWrap,
}

/// What happens to an attachment when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadAction {
    /// Contents are undefined.
    None = 0,
    /// Contents are cleared to the configured value.
    #[default]
    Clear = 1,
    /// Previous contents are preserved.
    Load = 2,
}

/// What happens to an attachment when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreAction {
    /// Results may be discarded.
    #[default]
    None = 0,
    /// Results persist past the end of the pass.
    Store = 1,
}

/// Blend factor applied to the source or destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    /// `0`.
    Zero,
    /// `1`.
    #[default]
    One,
    /// Source alpha.
    SrcAlpha,
    /// `1 - source alpha`.
    InvSrcAlpha,
    /// Source color.
    SrcColor,
    /// Destination color.
    DstColor,
}

/// Multisample anti-aliasing modes a device may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AntialiasingType {
    /// No anti-aliasing.
    #[default]
    None,
    /// 2x MSAA.
    Msaa2x,
    /// 4x MSAA.
    Msaa4x,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_count_per_topology() {
        assert_eq!(PrimitiveType::TriangleList.vertex_count(1), Some(3));
        assert_eq!(PrimitiveType::TriangleList.vertex_count(12), Some(36));
        assert_eq!(PrimitiveType::TriangleStrip.vertex_count(2), Some(4));
        assert_eq!(PrimitiveType::LineList.vertex_count(5), Some(10));
    }

    #[test]
    fn test_vertex_count_overflow_is_none() {
        assert_eq!(PrimitiveType::TriangleList.vertex_count(0x6000_0000), None);
        assert_eq!(PrimitiveType::TriangleStrip.vertex_count(u32::MAX), None);
        assert_eq!(PrimitiveType::LineList.vertex_count(0x8000_0000), None);
        assert_eq!(
            PrimitiveType::TriangleList.vertex_count(u32::MAX / 3),
            Some(u32::MAX / 3 * 3)
        );
    }

    #[test]
    fn test_cull_inversion() {
        assert_eq!(CullMode::Cw.inverted(), CullMode::Ccw);
        assert_eq!(CullMode::Ccw.inverted(), CullMode::Cw);
        assert_eq!(CullMode::None.inverted(), CullMode::None);
    }

    #[test]
    fn test_enum_defaults() {
        assert_eq!(CmpFunc::default(), CmpFunc::LessEqual);
        assert_eq!(LoadAction::default(), LoadAction::Clear);
        assert_eq!(StoreAction::default(), StoreAction::None);
        assert_eq!(TextureType::Cube.face_count(), 6);
        assert_eq!(IndexSize::Size32.bytes(), 4);
    }
}
