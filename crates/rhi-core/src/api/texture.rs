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

//! Defines data structures related to textures, samplers and texture sets.

use super::enums::{TextureAddrMode, TextureFilter, TextureMipFilter, TextureType};
use super::{MAX_FRAGMENT_TEXTURE_SAMPLER_COUNT, MAX_VERTEX_TEXTURE_SAMPLER_COUNT};
use crate::handle::HTexture;

/// Defines the memory format of texels in a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    /// 8-bit RGBA.
    #[default]
    R8G8B8A8,
    /// 8-bit RGB with an unused byte.
    R8G8B8X8,
    /// Packed 24-bit RGB.
    R8G8B8,
    /// 16-bit RGB with 1-bit alpha.
    R5G5B5A1,
    /// 16-bit RGB.
    R5G6B5,
    /// 16-bit RGBA, 4 bits per channel.
    R4G4B4A4,
    /// 16 bits per channel ARGB.
    A16R16G16B16,
    /// 32 bits per channel ARGB.
    A32R32G32B32,
    /// Single 8-bit channel.
    R8,
    /// Single 16-bit channel.
    R16,
    /// BC1.
    DXT1,
    /// BC2.
    DXT3,
    /// BC3.
    DXT5,
    /// PowerVR 4 bits per pixel.
    PVRTC_4BPP_RGBA,
    /// PowerVR 2 bits per pixel.
    PVRTC_2BPP_RGBA,
    /// PowerVR II 4 bpp, opaque.
    PVRTC2_4BPP_RGB,
    /// PowerVR II 4 bpp.
    PVRTC2_4BPP_RGBA,
    /// PowerVR II 2 bpp, opaque.
    PVRTC2_2BPP_RGB,
    /// PowerVR II 2 bpp.
    PVRTC2_2BPP_RGBA,
    /// ATI compressed RGB.
    ATC_RGB,
    /// ATI compressed RGBA, explicit alpha.
    ATC_RGBA_EXPLICIT,
    /// ATI compressed RGBA, interpolated alpha.
    ATC_RGBA_INTERPOLATED,
    /// Ericsson texture compression.
    ETC1,
    /// ETC2 RGB.
    ETC2_R8G8B8,
    /// ETC2 RGBA.
    ETC2_R8G8B8A8,
    /// ETC2 RGB with punch-through alpha.
    ETC2_R8G8B8A1,
    /// EAC single channel, unsigned.
    EAC_R11_UNSIGNED,
    /// EAC single channel, signed.
    EAC_R11_SIGNED,
    /// EAC two channels, unsigned.
    EAC_R11G11_UNSIGNED,
    /// EAC two channels, signed.
    EAC_R11G11_SIGNED,
    /// 16-bit depth.
    D16,
    /// 24-bit depth with 8-bit stencil.
    D24S8,
    /// Single 32-bit float channel.
    R32F,
    /// Two 32-bit float channels.
    RG32F,
    /// Four 32-bit float channels.
    RGBA32F,
}

impl TextureFormat {
    /// Every format, in declaration order.
    pub const ALL: [TextureFormat; 35] = [
        TextureFormat::R8G8B8A8,
        TextureFormat::R8G8B8X8,
        TextureFormat::R8G8B8,
        TextureFormat::R5G5B5A1,
        TextureFormat::R5G6B5,
        TextureFormat::R4G4B4A4,
        TextureFormat::A16R16G16B16,
        TextureFormat::A32R32G32B32,
        TextureFormat::R8,
        TextureFormat::R16,
        TextureFormat::DXT1,
        TextureFormat::DXT3,
        TextureFormat::DXT5,
        TextureFormat::PVRTC_4BPP_RGBA,
        TextureFormat::PVRTC_2BPP_RGBA,
        TextureFormat::PVRTC2_4BPP_RGB,
        TextureFormat::PVRTC2_4BPP_RGBA,
        TextureFormat::PVRTC2_2BPP_RGB,
        TextureFormat::PVRTC2_2BPP_RGBA,
        TextureFormat::ATC_RGB,
        TextureFormat::ATC_RGBA_EXPLICIT,
        TextureFormat::ATC_RGBA_INTERPOLATED,
        TextureFormat::ETC1,
        TextureFormat::ETC2_R8G8B8,
        TextureFormat::ETC2_R8G8B8A8,
        TextureFormat::ETC2_R8G8B8A1,
        TextureFormat::EAC_R11_UNSIGNED,
        TextureFormat::EAC_R11_SIGNED,
        TextureFormat::EAC_R11G11_UNSIGNED,
        TextureFormat::EAC_R11G11_SIGNED,
        TextureFormat::D16,
        TextureFormat::D24S8,
        TextureFormat::R32F,
        TextureFormat::RG32F,
        TextureFormat::RGBA32F,
    ];

    /// Size of one texel in bytes, or `None` for block-compressed formats.
    pub const fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            TextureFormat::R8G8B8A8 | TextureFormat::R8G8B8X8 => Some(4),
            TextureFormat::R8G8B8 => Some(3),
            TextureFormat::R5G5B5A1
            | TextureFormat::R5G6B5
            | TextureFormat::R4G4B4A4
            | TextureFormat::R16
            | TextureFormat::D16 => Some(2),
            TextureFormat::A16R16G16B16 => Some(8),
            TextureFormat::A32R32G32B32 => Some(16),
            TextureFormat::R8 => Some(1),
            TextureFormat::D24S8 | TextureFormat::R32F => Some(4),
            TextureFormat::RG32F => Some(8),
            TextureFormat::RGBA32F => Some(16),
            _ => None,
        }
    }

    /// `true` for block-compressed formats.
    pub const fn is_compressed(self) -> bool {
        self.bytes_per_pixel().is_none()
    }

    /// `true` for depth(-stencil) formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, TextureFormat::D16 | TextureFormat::D24S8)
    }

    /// Width and height in texels of one compression block, and its size in bytes.
    ///
    /// Uncompressed formats report a 1x1 block of `bytes_per_pixel` bytes.
    pub const fn block_dimensions(self) -> (u32, u32, u32) {
        match self {
            TextureFormat::DXT1
            | TextureFormat::ETC1
            | TextureFormat::ETC2_R8G8B8
            | TextureFormat::ETC2_R8G8B8A1
            | TextureFormat::EAC_R11_UNSIGNED
            | TextureFormat::EAC_R11_SIGNED
            | TextureFormat::ATC_RGB => (4, 4, 8),
            TextureFormat::DXT3
            | TextureFormat::DXT5
            | TextureFormat::ETC2_R8G8B8A8
            | TextureFormat::EAC_R11G11_UNSIGNED
            | TextureFormat::EAC_R11G11_SIGNED
            | TextureFormat::ATC_RGBA_EXPLICIT
            | TextureFormat::ATC_RGBA_INTERPOLATED => (4, 4, 16),
            TextureFormat::PVRTC_4BPP_RGBA => (8, 8, 32),
            TextureFormat::PVRTC_2BPP_RGBA => (8, 16, 32),
            TextureFormat::PVRTC2_4BPP_RGB | TextureFormat::PVRTC2_4BPP_RGBA => (4, 4, 8),
            TextureFormat::PVRTC2_2BPP_RGB | TextureFormat::PVRTC2_2BPP_RGBA => (8, 4, 8),
            _ => match self.bytes_per_pixel() {
                Some(bpp) => (1, 1, bpp),
                None => (1, 1, 0),
            },
        }
    }
}

/// Parameters for creating a texture.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Dimensionality.
    pub texture_type: TextureType,
    /// Width of level 0 in texels.
    pub width: u32,
    /// Height of level 0 in texels.
    pub height: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Number of mip levels.
    pub level_count: u32,
    /// Initial contents, face-major: entry `face * level_count + level`.
    /// Missing or short entries leave the level zero-filled.
    pub initial_data: Vec<&'a [u8]>,
    /// Whether the texture can be bound as a render target.
    pub is_render_target: bool,
    /// Whether lower levels are generated from level 0.
    pub auto_gen_mipmaps: bool,
    /// Whether the texture must be refilled by its owner after a device loss.
    pub need_restore: bool,
}

impl TextureDescriptor<'_> {
    /// A single-level 2D texture.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            ..Default::default()
        }
    }
}

impl Default for TextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            texture_type: TextureType::Tex2D,
            width: 0,
            height: 0,
            format: TextureFormat::R8G8B8A8,
            level_count: 1,
            initial_data: Vec::new(),
            is_render_target: false,
            auto_gen_mipmaps: false,
            need_restore: true,
        }
    }
}

/// Sampling parameters of one texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sampler {
    /// Addressing along U.
    pub addr_u: TextureAddrMode,
    /// Addressing along V.
    pub addr_v: TextureAddrMode,
    /// Addressing along W.
    pub addr_w: TextureAddrMode,
    /// Minification filter.
    pub min_filter: TextureFilter,
    /// Magnification filter.
    pub mag_filter: TextureFilter,
    /// Filter between mip levels.
    pub mip_filter: TextureMipFilter,
}

impl Sampler {
    /// The default for fragment units: wrap, linear, linear mips.
    pub const FRAGMENT_DEFAULT: Self = Self {
        addr_u: TextureAddrMode::Wrap,
        addr_v: TextureAddrMode::Wrap,
        addr_w: TextureAddrMode::Wrap,
        min_filter: TextureFilter::Linear,
        mag_filter: TextureFilter::Linear,
        mip_filter: TextureMipFilter::Linear,
    };

    /// The default for vertex units: wrap, nearest, no mips.
    pub const VERTEX_DEFAULT: Self = Self {
        addr_u: TextureAddrMode::Wrap,
        addr_v: TextureAddrMode::Wrap,
        addr_w: TextureAddrMode::Wrap,
        min_filter: TextureFilter::Nearest,
        mag_filter: TextureFilter::Nearest,
        mip_filter: TextureMipFilter::None,
    };
}

impl Default for Sampler {
    fn default() -> Self {
        Self::FRAGMENT_DEFAULT
    }
}

/// Parameters for creating a sampler state covering every texture unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SamplerStateDescriptor {
    /// Samplers of the fragment units, at most 8.
    pub fragment_samplers: Vec<Sampler>,
    /// Samplers of the vertex units, at most 2.
    pub vertex_samplers: Vec<Sampler>,
}

impl SamplerStateDescriptor {
    /// A descriptor filling every unit with its stage default.
    pub fn all_units() -> Self {
        Self {
            fragment_samplers: vec![Sampler::FRAGMENT_DEFAULT; MAX_FRAGMENT_TEXTURE_SAMPLER_COUNT],
            vertex_samplers: vec![Sampler::VERTEX_DEFAULT; MAX_VERTEX_TEXTURE_SAMPLER_COUNT],
        }
    }

    /// `true` when neither stage exceeds its unit count.
    pub fn is_within_limits(&self) -> bool {
        self.fragment_samplers.len() <= MAX_FRAGMENT_TEXTURE_SAMPLER_COUNT
            && self.vertex_samplers.len() <= MAX_VERTEX_TEXTURE_SAMPLER_COUNT
    }
}

/// The ordered texture bindings of a draw, deduplicated into a texture set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TextureSetDescriptor {
    /// Textures bound to fragment units 0..n.
    pub fragment_textures: Vec<HTexture>,
    /// Textures bound to vertex units 0..n.
    pub vertex_textures: Vec<HTexture>,
}

impl TextureSetDescriptor {
    /// A set binding `textures` to consecutive fragment units.
    pub fn fragment(textures: &[HTexture]) -> Self {
        Self {
            fragment_textures: textures.to_vec(),
            vertex_textures: Vec::new(),
        }
    }

    /// `true` when neither stage exceeds its unit count.
    pub fn is_within_limits(&self) -> bool {
        self.fragment_textures.len() <= MAX_FRAGMENT_TEXTURE_SAMPLER_COUNT
            && self.vertex_textures.len() <= MAX_VERTEX_TEXTURE_SAMPLER_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_classification() {
        assert!(TextureFormat::DXT1.is_compressed());
        assert!(!TextureFormat::R8G8B8A8.is_compressed());
        assert!(TextureFormat::D24S8.is_depth());
        assert_eq!(TextureFormat::RGBA32F.bytes_per_pixel(), Some(16));
        assert_eq!(TextureFormat::PVRTC_2BPP_RGBA.block_dimensions(), (8, 16, 32));
    }

    #[test]
    fn test_all_lists_every_format_once() {
        let unique: std::collections::HashSet<_> = TextureFormat::ALL.iter().collect();
        assert_eq!(unique.len(), TextureFormat::ALL.len());
    }

    #[test]
    fn test_sampler_defaults_per_stage() {
        let desc = SamplerStateDescriptor::all_units();
        assert_eq!(desc.fragment_samplers.len(), 8);
        assert_eq!(desc.vertex_samplers[0].mip_filter, TextureMipFilter::None);
        assert_eq!(desc.fragment_samplers[0].min_filter, TextureFilter::Linear);
        assert!(desc.is_within_limits());
    }
}
