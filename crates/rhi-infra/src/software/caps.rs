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

//! Device capabilities and format support emulated per native API.

use rhi_core::api::{Api, ProgType, RenderDeviceCaps, TextureFormat};

/// Capabilities a device of `api` reports.
pub fn emulated_caps(api: Api) -> RenderDeviceCaps {
    let device_description = format!("Software rasterizer ({api:?} conventions)");
    match api {
        Api::Dx9 => RenderDeviceCaps {
            max_anisotropy: 16,
            max_samples: 4,
            device_description,
            is_32bit_indices_supported: true,
            is_vertex_texture_units_supported: false,
            is_framebuffer_fetch_supported: false,
            is_upper_left_rt_origin: true,
            is_zero_base_clip_range: true,
            is_center_pixel_mapping: true,
            is_instancing_supported: true,
        },
        Api::Dx11 => RenderDeviceCaps {
            max_anisotropy: 16,
            max_samples: 8,
            device_description,
            is_32bit_indices_supported: true,
            is_vertex_texture_units_supported: true,
            is_framebuffer_fetch_supported: false,
            is_upper_left_rt_origin: true,
            is_zero_base_clip_range: true,
            is_center_pixel_mapping: false,
            is_instancing_supported: true,
        },
        Api::Metal => RenderDeviceCaps {
            max_anisotropy: 16,
            max_samples: 4,
            device_description,
            is_32bit_indices_supported: true,
            is_vertex_texture_units_supported: true,
            is_framebuffer_fetch_supported: true,
            is_upper_left_rt_origin: true,
            is_zero_base_clip_range: true,
            is_center_pixel_mapping: false,
            is_instancing_supported: true,
        },
        Api::Gles2 => RenderDeviceCaps {
            max_anisotropy: 1,
            max_samples: 4,
            device_description,
            is_32bit_indices_supported: false,
            is_vertex_texture_units_supported: false,
            is_framebuffer_fetch_supported: false,
            is_upper_left_rt_origin: false,
            is_zero_base_clip_range: false,
            is_center_pixel_mapping: false,
            is_instancing_supported: false,
        },
    }
}

/// Whether `format` can be sampled from `prog_type` programs on `api`.
pub fn format_supported(api: Api, format: TextureFormat, prog_type: ProgType) -> bool {
    use TextureFormat::*;

    if prog_type == ProgType::Vertex {
        return emulated_caps(api).is_vertex_texture_units_supported
            && matches!(format, R8G8B8A8 | R32F | RGBA32F);
    }

    match format {
        R8G8B8A8 | R5G5B5A1 | R5G6B5 | R4G4B4A4 | R8 | R16 | D16 | D24S8 => true,
        R8G8B8 => api != Api::Metal,
        R8G8B8X8 => matches!(api, Api::Dx9 | Api::Dx11),
        A16R16G16B16 | A32R32G32B32 | R32F | RG32F | RGBA32F => api != Api::Gles2,
        DXT1 | DXT3 | DXT5 => matches!(api, Api::Dx9 | Api::Dx11),
        PVRTC_4BPP_RGBA | PVRTC_2BPP_RGBA | PVRTC2_4BPP_RGB | PVRTC2_4BPP_RGBA
        | PVRTC2_2BPP_RGB | PVRTC2_2BPP_RGBA => matches!(api, Api::Metal | Api::Gles2),
        ATC_RGB | ATC_RGBA_EXPLICIT | ATC_RGBA_INTERPOLATED | ETC1 => api == Api::Gles2,
        ETC2_R8G8B8 | ETC2_R8G8B8A8 | ETC2_R8G8B8A1 | EAC_R11_UNSIGNED | EAC_R11_SIGNED
        | EAC_R11G11_UNSIGNED | EAC_R11G11_SIGNED => api == Api::Metal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_target_origin_per_api() {
        assert!(emulated_caps(Api::Dx9).is_upper_left_rt_origin);
        assert!(emulated_caps(Api::Dx11).is_upper_left_rt_origin);
        assert!(emulated_caps(Api::Metal).is_upper_left_rt_origin);
        assert!(!emulated_caps(Api::Gles2).is_upper_left_rt_origin);
    }

    #[test]
    fn test_only_dx9_uses_center_pixel_mapping() {
        let centered: Vec<Api> = [Api::Dx9, Api::Dx11, Api::Gles2, Api::Metal]
            .into_iter()
            .filter(|&api| emulated_caps(api).is_center_pixel_mapping)
            .collect();
        assert_eq!(centered, vec![Api::Dx9]);
    }

    #[test]
    fn test_compressed_families_follow_the_platform() {
        assert!(format_supported(Api::Dx11, TextureFormat::DXT5, ProgType::Fragment));
        assert!(!format_supported(Api::Dx11, TextureFormat::PVRTC_4BPP_RGBA, ProgType::Fragment));
        assert!(format_supported(Api::Metal, TextureFormat::PVRTC_4BPP_RGBA, ProgType::Fragment));
        assert!(format_supported(Api::Gles2, TextureFormat::ETC1, ProgType::Fragment));
        assert!(!format_supported(Api::Gles2, TextureFormat::DXT1, ProgType::Fragment));
    }

    #[test]
    fn test_vertex_textures_need_vertex_texture_units() {
        assert!(!format_supported(Api::Gles2, TextureFormat::R8G8B8A8, ProgType::Vertex));
        assert!(!format_supported(Api::Dx9, TextureFormat::RGBA32F, ProgType::Vertex));
        assert!(format_supported(Api::Dx11, TextureFormat::RGBA32F, ProgType::Vertex));
        assert!(!format_supported(Api::Dx11, TextureFormat::DXT1, ProgType::Vertex));
    }
}
