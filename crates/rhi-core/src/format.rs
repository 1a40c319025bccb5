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

//! Size, pitch and color-packing utilities for texture formats.

use crate::api::{Api, TextureFormat};

/// Dimensions of mip `level` of a `width` x `height` texture, never below 1x1.
pub fn texture_extents(width: u32, height: u32, level: u32) -> (u32, u32) {
    let w = width.checked_shr(level).unwrap_or(0).max(1);
    let h = height.checked_shr(level).unwrap_or(0).max(1);
    (w, h)
}

/// Size in bytes of mip `level` of a `width` x `height` texture in `format`.
pub fn texture_size(format: TextureFormat, width: u32, height: u32, level: u32) -> u32 {
    use TextureFormat::*;

    let (w, h) = texture_extents(width, height, level);
    match format {
        // 4x4 blocks, at least one block per axis.
        DXT1 | DXT3 | DXT5 | ETC1 | ETC2_R8G8B8 | ETC2_R8G8B8A8 | ETC2_R8G8B8A1
        | EAC_R11_UNSIGNED | EAC_R11_SIGNED | EAC_R11G11_UNSIGNED | EAC_R11G11_SIGNED => {
            let (_, _, block_bytes) = format.block_dimensions();
            (w >> 2).max(1) * (h >> 2).max(1) * block_bytes
        }
        ATC_RGB | ATC_RGBA_EXPLICIT | ATC_RGBA_INTERPOLATED | PVRTC_4BPP_RGBA
        | PVRTC_2BPP_RGBA | PVRTC2_4BPP_RGB | PVRTC2_4BPP_RGBA | PVRTC2_2BPP_RGB
        | PVRTC2_2BPP_RGBA => {
            let (bw, bh, block_bytes) = format.block_dimensions();
            w.div_ceil(bw) * h.div_ceil(bh) * block_bytes
        }
        _ => w * h * format.bytes_per_pixel().unwrap_or(0),
    }
}

/// Row pitch in bytes of mip `level`, or `0` for block formats without a row notion.
pub fn texture_stride(format: TextureFormat, width: u32, height: u32, level: u32) -> u32 {
    let (w, _) = texture_extents(width, height, level);
    match format {
        TextureFormat::DXT1 => 8 * w.div_ceil(4).max(1),
        TextureFormat::DXT3 | TextureFormat::DXT5 => 16 * w.div_ceil(4).max(1),
        _ => w * format.bytes_per_pixel().unwrap_or(0),
    }
}

/// Packs a normalized RGBA color into the 32-bit vertex color layout of `api`.
///
/// Direct3D 9 stores ARGB; the other APIs store ABGR.
pub fn native_color_rgba(api: Api, r: f32, g: f32, b: f32, a: f32) -> u32 {
    debug_assert!(
        [r, g, b, a].iter().all(|c| (0.0..=1.0).contains(c)),
        "color components must be normalized, got ({r}, {g}, {b}, {a})"
    );
    let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0) as u32;
    let (r, g, b, a) = (to_byte(r), to_byte(g), to_byte(b), to_byte(a));

    match api {
        Api::Dx9 => (a << 24) | (r << 16) | (g << 8) | b,
        Api::Dx11 | Api::Gles2 | Api::Metal => (a << 24) | (b << 16) | (g << 8) | r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TextureFormat::*;

    #[test]
    fn test_extents_clamp_to_one() {
        assert_eq!(texture_extents(256, 64, 0), (256, 64));
        assert_eq!(texture_extents(256, 64, 7), (2, 1));
        assert_eq!(texture_extents(256, 64, 40), (1, 1));
    }

    #[test]
    fn test_uncompressed_sizes() {
        assert_eq!(texture_size(R8G8B8A8, 10, 10, 0), 400);
        assert_eq!(texture_size(R8G8B8A8, 256, 256, 0), 262_144);
        assert_eq!(texture_size(R8G8B8A8, 256, 256, 1), 65_536);
        assert_eq!(texture_size(R8G8B8X8, 3, 5, 0), 60);
        assert_eq!(texture_size(R8G8B8, 3, 5, 0), 45);
        assert_eq!(texture_size(R5G6B5, 3, 5, 0), 30);
        assert_eq!(texture_size(R4G4B4A4, 3, 5, 0), 30);
        assert_eq!(texture_size(A16R16G16B16, 2, 2, 0), 32);
        assert_eq!(texture_size(A32R32G32B32, 2, 2, 0), 64);
        assert_eq!(texture_size(R8, 7, 3, 0), 21);
        assert_eq!(texture_size(R16, 7, 3, 0), 42);
        assert_eq!(texture_size(D16, 4, 4, 0), 32);
        assert_eq!(texture_size(D24S8, 4, 4, 0), 64);
        assert_eq!(texture_size(R32F, 4, 4, 0), 64);
        assert_eq!(texture_size(RG32F, 4, 4, 0), 128);
        assert_eq!(texture_size(RGBA32F, 4, 4, 0), 256);
    }

    #[test]
    fn test_four_by_four_block_sizes_floor_the_block_count() {
        assert_eq!(texture_size(DXT1, 64, 64, 0), 2048);
        assert_eq!(texture_size(DXT1, 256, 256, 0), 32_768);
        assert_eq!(texture_size(DXT1, 6, 6, 0), 8, "6x6 floors to one block");
        assert_eq!(texture_size(DXT1, 2, 2, 0), 8);
        assert_eq!(texture_size(DXT5, 8, 4, 0), 32);
        assert_eq!(texture_size(DXT3, 1, 1, 0), 16);
        assert_eq!(texture_size(ETC1, 16, 8, 0), 64);
        assert_eq!(texture_size(ETC2_R8G8B8A1, 16, 8, 0), 128);
        assert_eq!(texture_size(EAC_R11_SIGNED, 4, 4, 0), 8);
        assert_eq!(texture_size(EAC_R11G11_UNSIGNED, 4, 4, 0), 16);
    }

    #[test]
    fn test_atc_sizes_round_up() {
        assert_eq!(texture_size(ATC_RGB, 5, 5, 0), 32);
        assert_eq!(texture_size(ATC_RGBA_EXPLICIT, 5, 5, 0), 64);
        assert_eq!(texture_size(ATC_RGBA_INTERPOLATED, 4, 4, 0), 16);
    }

    #[test]
    fn test_pvrtc_sizes_use_mip_extents() {
        assert_eq!(texture_size(PVRTC_4BPP_RGBA, 16, 16, 0), 128);
        assert_eq!(texture_size(PVRTC_4BPP_RGBA, 16, 16, 1), 32);
        assert_eq!(texture_size(PVRTC_4BPP_RGBA, 9, 9, 0), 128);
        assert_eq!(texture_size(PVRTC_2BPP_RGBA, 16, 16, 0), 64);
        assert_eq!(texture_size(PVRTC2_4BPP_RGBA, 5, 5, 0), 32);
        assert_eq!(texture_size(PVRTC2_4BPP_RGB, 8, 8, 0), 32);
        assert_eq!(texture_size(PVRTC2_2BPP_RGB, 9, 4, 0), 16);
        assert_eq!(texture_size(PVRTC2_2BPP_RGBA, 9, 4, 0), 16);
    }

    #[test]
    fn test_every_format_has_a_nonzero_size() {
        for format in TextureFormat::ALL {
            assert!(texture_size(format, 13, 7, 0) > 0, "{format:?} reported zero bytes");
        }
    }

    #[test]
    fn test_strides() {
        assert_eq!(texture_stride(R8G8B8A8, 256, 256, 0), 1024);
        assert_eq!(texture_stride(R8G8B8A8, 256, 256, 2), 256);
        assert_eq!(texture_stride(R8G8B8, 5, 1, 0), 15);
        assert_eq!(texture_stride(R16, 5, 1, 0), 10);
        assert_eq!(texture_stride(D24S8, 5, 1, 0), 20);
        assert_eq!(texture_stride(DXT1, 256, 256, 0), 512);
        assert_eq!(texture_stride(DXT1, 2, 2, 0), 8);
        assert_eq!(texture_stride(DXT5, 10, 10, 0), 48);
        assert_eq!(texture_stride(ETC1, 16, 16, 0), 0);
        assert_eq!(texture_stride(PVRTC_4BPP_RGBA, 16, 16, 0), 0);
    }

    #[test]
    fn test_native_color_byte_order_per_api() {
        let dx9 = native_color_rgba(Api::Dx9, 1.0, 0.0, 0.0, 1.0);
        assert_eq!(dx9, 0xFFFF_0000);
        let gles = native_color_rgba(Api::Gles2, 1.0, 0.0, 0.0, 1.0);
        assert_eq!(gles, 0xFF00_00FF);
        assert_eq!(native_color_rgba(Api::Metal, 0.0, 0.0, 1.0, 0.0), 0x00FF_0000);
        assert_eq!(native_color_rgba(Api::Dx11, 0.0, 0.0, 1.0, 0.0), 0x00FF_0000);
        assert_eq!(native_color_rgba(Api::Dx9, 0.0, 0.0, 1.0, 0.0), 0x0000_00FF);
    }

    #[test]
    fn test_native_color_truncates_components() {
        assert_eq!(native_color_rgba(Api::Gles2, 0.5, 0.5, 0.5, 0.5), 0x7F7F_7F7F);
    }
}
