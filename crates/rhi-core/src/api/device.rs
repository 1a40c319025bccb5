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

//! Device configuration and capability reporting.

use super::enums::AntialiasingType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters used to initialize the render hardware interface.
///
/// Every `max_*_count` of `0` selects the default pool capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitParam {
    /// Backbuffer width in pixels.
    pub width: u32,
    /// Backbuffer height in pixels.
    pub height: u32,
    /// Horizontal content scale.
    pub scale_x: f32,
    /// Vertical content scale.
    pub scale_y: f32,
    /// Whether the device starts in exclusive full-screen mode.
    pub full_screen: bool,
    /// Whether presented frames execute on a dedicated render thread.
    pub threaded_render: bool,
    /// Whether presentation waits for vertical sync.
    pub vsync: bool,
    /// How many frames may be queued ahead of the render thread.
    pub threaded_render_frame_count: u32,

    /// Capacity of the index buffer pool.
    pub max_index_buffer_count: u32,
    /// Capacity of the vertex buffer pool.
    pub max_vertex_buffer_count: u32,
    /// Capacity of the const buffer pool.
    pub max_const_buffer_count: u32,
    /// Capacity of the texture pool.
    pub max_texture_count: u32,
    /// Capacity of the texture set pool.
    pub max_texture_set_count: u32,
    /// Capacity of the sampler state pool.
    pub max_sampler_state_count: u32,
    /// Capacity of the pipeline state pool.
    pub max_pipeline_state_count: u32,
    /// Capacity of the depth-stencil state pool.
    pub max_depth_stencil_state_count: u32,
    /// Capacity of the render pass pool.
    pub max_render_pass_count: u32,
    /// Capacity of the command buffer pool.
    pub max_command_buffer_count: u32,
    /// Capacity of the packet list pool.
    pub max_packet_list_count: u32,

    /// Size in bytes of the ring used for per-draw constant uploads, `0` for the backend default.
    pub shader_const_ring_buffer_size: u32,
}

impl Default for InitParam {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            scale_x: 1.0,
            scale_y: 1.0,
            full_screen: false,
            threaded_render: false,
            vsync: true,
            threaded_render_frame_count: 2,
            max_index_buffer_count: 0,
            max_vertex_buffer_count: 0,
            max_const_buffer_count: 0,
            max_texture_count: 0,
            max_texture_set_count: 0,
            max_sampler_state_count: 0,
            max_pipeline_state_count: 0,
            max_depth_stencil_state_count: 0,
            max_render_pass_count: 0,
            max_command_buffer_count: 0,
            max_packet_list_count: 0,
            shader_const_ring_buffer_size: 0,
        }
    }
}

impl InitParam {
    /// Parses parameters from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse render init parameters")
    }

    /// Loads parameters from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read render config '{}'", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse render config '{}'", path.display()))
    }

    /// Serializes the parameters as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize render init parameters")
    }
}

/// Parameters used to reset the device, for instance after a window resize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetParam {
    /// New backbuffer width in pixels.
    pub width: u32,
    /// New backbuffer height in pixels.
    pub height: u32,
    /// Horizontal content scale.
    pub scale_x: f32,
    /// Vertical content scale.
    pub scale_y: f32,
    /// Whether to switch to exclusive full-screen mode.
    pub full_screen: bool,
    /// Whether presentation waits for vertical sync.
    pub vsync: bool,
}

impl Default for ResetParam {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            scale_x: 1.0,
            scale_y: 1.0,
            full_screen: false,
            vsync: true,
        }
    }
}

/// Capabilities reported by the active device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderDeviceCaps {
    /// Highest supported anisotropy level, `1` when unsupported.
    pub max_anisotropy: u32,
    /// Highest supported MSAA sample count.
    pub max_samples: u32,
    /// Human-readable adapter description.
    pub device_description: String,
    /// Whether 32-bit index buffers are accepted.
    pub is_32bit_indices_supported: bool,
    /// Whether vertex programs can sample textures.
    pub is_vertex_texture_units_supported: bool,
    /// Whether fragment programs can read the framebuffer.
    pub is_framebuffer_fetch_supported: bool,
    /// Whether render target row 0 is the top row.
    pub is_upper_left_rt_origin: bool,
    /// Whether clip space depth spans `[0, 1]` rather than `[-1, 1]`.
    pub is_zero_base_clip_range: bool,
    /// Whether pixel centers sit on integer coordinates.
    pub is_center_pixel_mapping: bool,
    /// Whether instanced draws are supported.
    pub is_instancing_supported: bool,
}

impl Default for RenderDeviceCaps {
    fn default() -> Self {
        Self {
            max_anisotropy: 1,
            max_samples: 1,
            device_description: String::new(),
            is_32bit_indices_supported: false,
            is_vertex_texture_units_supported: false,
            is_framebuffer_fetch_supported: false,
            is_upper_left_rt_origin: false,
            is_zero_base_clip_range: false,
            is_center_pixel_mapping: false,
            is_instancing_supported: false,
        }
    }
}

impl RenderDeviceCaps {
    /// Returns `true` when anisotropic filtering beyond 1x is available.
    pub fn is_anisotropic_filtering_supported(&self) -> bool {
        self.max_anisotropy > 1
    }

    /// Returns `true` when the device has enough samples for `aa`.
    pub fn supports_antialiasing(&self, aa: AntialiasingType) -> bool {
        match aa {
            AntialiasingType::Msaa2x => self.max_samples >= 2,
            AntialiasingType::Msaa4x => self.max_samples >= 4,
            AntialiasingType::None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_param_defaults() {
        let p = InitParam::default();
        assert_eq!(p.threaded_render_frame_count, 2);
        assert!(p.vsync);
        assert!(!p.threaded_render);
        assert_eq!(p.max_texture_count, 0);
        approx::assert_relative_eq!(p.scale_x, 1.0);
    }

    #[test]
    fn test_init_param_from_partial_json() {
        let json = r#"{
            "width": 640,
            "height": 480,
            "threaded_render": true,
            "max_vertex_buffer_count": 16
        }"#;
        let p = InitParam::from_json_str(json).expect("valid json should parse");
        assert_eq!(p.width, 640);
        assert!(p.threaded_render);
        assert_eq!(p.max_vertex_buffer_count, 16);
        assert_eq!(p.threaded_render_frame_count, 2, "missing fields keep defaults");
    }

    #[test]
    fn test_init_param_rejects_malformed_json() {
        assert!(InitParam::from_json_str("{ width: }").is_err());
    }

    #[test]
    fn test_init_param_json_file_round_trip() {
        let path = std::env::temp_dir().join(format!("rhi-init-{}.json", std::process::id()));
        let params = InitParam {
            width: 1024,
            vsync: false,
            ..Default::default()
        };
        std::fs::write(&path, params.to_json_string().unwrap()).unwrap();
        let loaded = InitParam::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, params);
    }

    #[test]
    fn test_caps_antialiasing_support() {
        let caps = RenderDeviceCaps {
            max_samples: 2,
            ..Default::default()
        };
        assert!(caps.supports_antialiasing(AntialiasingType::None));
        assert!(caps.supports_antialiasing(AntialiasingType::Msaa2x));
        assert!(!caps.supports_antialiasing(AntialiasingType::Msaa4x));
        assert!(!caps.is_anisotropic_filtering_supported());
    }
}
