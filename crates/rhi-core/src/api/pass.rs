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

//! Render pass configuration: attachments, viewport and scissor.

use super::enums::{LoadAction, StoreAction};
use super::MAX_RENDER_TARGET_COUNT;
use crate::handle::{HQueryBuffer, HTexture};

/// A color attachment of a render pass.
///
/// An invalid `texture` on the first attachment renders to the backbuffer;
/// on other attachments it leaves the slot unused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBuffer {
    /// The render target texture.
    pub texture: HTexture,
    /// What happens to the contents when the pass begins.
    pub load_action: LoadAction,
    /// What happens to the contents when the pass ends.
    pub store_action: StoreAction,
    /// Clear value used with [`LoadAction::Clear`], RGBA.
    pub clear_color: [f32; 4],
}

impl Default for ColorBuffer {
    fn default() -> Self {
        Self {
            texture: HTexture::INVALID,
            load_action: LoadAction::Clear,
            store_action: StoreAction::None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// The depth-stencil attachment target of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthTarget {
    /// The depth buffer paired with the backbuffer.
    #[default]
    Default,
    /// A depth texture.
    Texture(HTexture),
    /// No depth attachment.
    None,
}

impl DepthTarget {
    /// The texture handle when the target is a depth texture.
    pub fn texture(&self) -> Option<HTexture> {
        match self {
            DepthTarget::Texture(t) => Some(*t),
            _ => None,
        }
    }
}

/// The depth-stencil attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilBuffer {
    /// Where depth and stencil are stored.
    pub target: DepthTarget,
    /// What happens to the contents when the pass begins.
    pub load_action: LoadAction,
    /// What happens to the contents when the pass ends.
    pub store_action: StoreAction,
    /// Depth clear value.
    pub clear_depth: f32,
    /// Stencil clear value.
    pub clear_stencil: u32,
}

impl Default for DepthStencilBuffer {
    fn default() -> Self {
        Self {
            target: DepthTarget::Default,
            load_action: LoadAction::Clear,
            store_action: StoreAction::None,
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

/// A rectangle of the render target in pixels. All zero means "whole target".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A scissor rectangle. All zero disables scissoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u16,
    /// Top edge.
    pub y: u16,
    /// Width.
    pub width: u16,
    /// Height.
    pub height: u16,
}

impl ScissorRect {
    /// Creates a scissor rectangle.
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// `true` when the rectangle disables scissoring.
    pub const fn is_disabled(&self) -> bool {
        self.x == 0 && self.y == 0 && self.width == 0 && self.height == 0
    }
}

/// The attachments and ordering of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderPassConfig {
    /// Color attachments.
    pub color_buffers: [ColorBuffer; MAX_RENDER_TARGET_COUNT],
    /// Depth-stencil attachment.
    pub depth_stencil_buffer: DepthStencilBuffer,
    /// Query buffer receiving occlusion results of the pass.
    pub query_buffer: HQueryBuffer,
    /// Initial viewport.
    pub viewport: Viewport,
    /// Passes execute in ascending priority within a frame.
    pub priority: i32,
    /// Whether packet lists flip the cull mode of every packet.
    pub invert_culling: bool,
}

impl RenderPassConfig {
    /// `true` when the pass renders into at least one texture instead of the backbuffer.
    pub fn renders_off_screen(&self) -> bool {
        self.color_buffers.iter().any(|cb| cb.texture.is_valid())
            || matches!(self.depth_stencil_buffer.target, DepthTarget::Texture(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_defaults() {
        let cfg = RenderPassConfig::default();
        assert_eq!(cfg.color_buffers[0].load_action, LoadAction::Clear);
        assert_eq!(cfg.color_buffers[0].clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(cfg.depth_stencil_buffer.target, DepthTarget::Default);
        assert!(!cfg.query_buffer.is_valid());
        assert_eq!(cfg.priority, 0);
        assert!(!cfg.renders_off_screen());
    }

    #[test]
    fn test_default_scissor_is_disabled() {
        assert!(ScissorRect::default().is_disabled());
        assert!(!ScissorRect::new(0, 0, 10, 10).is_disabled());
    }
}
