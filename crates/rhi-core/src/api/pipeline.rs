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

//! Descriptors for pipeline and depth-stencil states.

use super::enums::{BlendOp, CmpFunc, StencilOperation};
use super::MAX_RENDER_TARGET_COUNT;
use crate::vertex_layout::VertexLayout;

/// Flags selecting which color channels a render target writes.
///
/// Multiple channels can be combined using bitwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorMask {
    bits: u8,
}

impl ColorMask {
    /// No channel is written.
    pub const NONE: Self = Self { bits: 0 };
    /// Red channel.
    pub const R: Self = Self { bits: 1 << 0 };
    /// Green channel.
    pub const G: Self = Self { bits: 1 << 1 };
    /// Blue channel.
    pub const B: Self = Self { bits: 1 << 2 };
    /// Alpha channel.
    pub const A: Self = Self { bits: 1 << 3 };
    /// Every channel.
    pub const ALL: Self = Self {
        bits: Self::R.bits | Self::G.bits | Self::B.bits | Self::A.bits,
    };

    /// Creates a mask from raw bits, discarding unknown ones.
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            bits: bits & Self::ALL.bits,
        }
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u8 {
        self.bits
    }

    /// Combines two masks.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks if every channel of `other` is also set here.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Checks if no channel is written.
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for ColorMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for ColorMask {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// Blending configuration of a single render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlend {
    /// Source factor for color.
    pub color_src: BlendOp,
    /// Destination factor for color.
    pub color_dst: BlendOp,
    /// Source factor for alpha.
    pub alpha_src: BlendOp,
    /// Destination factor for alpha.
    pub alpha_dst: BlendOp,
    /// Channels written to the target.
    pub write_mask: ColorMask,
    /// Whether blending is applied at all.
    pub blend_enabled: bool,
    /// Whether alpha is converted to a coverage mask.
    pub alpha_to_coverage: bool,
}

impl RenderTargetBlend {
    /// Classic `src * a + dst * (1 - a)` blending.
    pub const ALPHA: Self = Self {
        color_src: BlendOp::SrcAlpha,
        color_dst: BlendOp::InvSrcAlpha,
        alpha_src: BlendOp::SrcAlpha,
        alpha_dst: BlendOp::InvSrcAlpha,
        write_mask: ColorMask::ALL,
        blend_enabled: true,
        alpha_to_coverage: false,
    };
}

impl Default for RenderTargetBlend {
    fn default() -> Self {
        Self {
            color_src: BlendOp::One,
            color_dst: BlendOp::Zero,
            alpha_src: BlendOp::One,
            alpha_dst: BlendOp::Zero,
            write_mask: ColorMask::ALL,
            blend_enabled: false,
            alpha_to_coverage: false,
        }
    }
}

/// Blending for every render target of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendState {
    /// Per-target blending, indexed by color attachment.
    pub render_targets: [RenderTargetBlend; MAX_RENDER_TARGET_COUNT],
}

/// Parameters for creating a render pipeline state.
///
/// Programs are referenced by uid and resolved through the shader cache.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineStateDescriptor {
    /// The layout the vertex program consumes.
    pub vertex_layout: VertexLayout,
    /// Uid of the vertex program.
    pub vprog_uid: String,
    /// Uid of the fragment program.
    pub fprog_uid: String,
    /// Output blending.
    pub blending: BlendState,
}

/// Stencil configuration of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilDescriptor {
    /// Mask applied when reading.
    pub read_mask: u8,
    /// Mask applied when writing.
    pub write_mask: u8,
    /// Reference value.
    pub ref_value: u8,
    /// Comparison against the reference value.
    pub func: CmpFunc,
    /// Operation when the stencil test fails.
    pub fail_operation: StencilOperation,
    /// Operation when the stencil test passes but depth fails.
    pub depth_fail_operation: StencilOperation,
    /// Operation when both tests pass.
    pub depth_stencil_pass_operation: StencilOperation,
}

impl Default for StencilDescriptor {
    fn default() -> Self {
        Self {
            read_mask: 0xFF,
            write_mask: 0xFF,
            ref_value: 0,
            func: CmpFunc::Always,
            fail_operation: StencilOperation::Keep,
            depth_fail_operation: StencilOperation::Keep,
            depth_stencil_pass_operation: StencilOperation::Keep,
        }
    }
}

/// Parameters for creating a depth-stencil state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDescriptor {
    /// Whether the depth test runs.
    pub depth_test_enabled: bool,
    /// Whether passing fragments write depth.
    pub depth_write_enabled: bool,
    /// Depth comparison.
    pub depth_func: CmpFunc,
    /// Whether the stencil test runs.
    pub stencil_enabled: bool,
    /// Whether back faces use `stencil_back`.
    pub stencil_two_sided: bool,
    /// Front face stencil.
    pub stencil_front: StencilDescriptor,
    /// Back face stencil.
    pub stencil_back: StencilDescriptor,
}

impl Default for DepthStencilStateDescriptor {
    fn default() -> Self {
        Self {
            depth_test_enabled: true,
            depth_write_enabled: true,
            depth_func: CmpFunc::LessEqual,
            stencil_enabled: false,
            stencil_two_sided: false,
            stencil_front: StencilDescriptor::default(),
            stencil_back: StencilDescriptor::default(),
        }
    }
}
