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

//! The contract every rendering backend fulfils.
//!
//! One method per device operation. Resource handles come from the backend's
//! own typed pools; the façade never interprets them beyond their type.

use crate::api::{
    Api, DepthStencilStateDescriptor, IndexBufferDescriptor, InitParam, PipelineStateDescriptor,
    ProgType, RenderDeviceCaps, ResetParam, SamplerStateDescriptor, TextureDescriptor,
    TextureFace, TextureFormat, VertexBufferDescriptor,
};
use crate::command::{ConstSnapshot, ReplayStats};
use crate::error::{RenderError, ResourceError};
use crate::frame::FrameSubmission;
use crate::handle::{
    HConstBuffer, HDepthStencilState, HIndexBuffer, HPerfQuerySet, HPipelineState, HQueryBuffer,
    HSamplerState, HSyncObject, HTexture, HVertexBuffer,
};
use crate::shader_cache::ProgramSource;
use crate::vertex_layout::VertexLayoutRegistry;
use std::fmt::Debug;
use std::sync::Arc;

/// A rendering backend.
///
/// Implementations are shared between the recording threads and the render
/// thread, so every method takes `&self` and guards its own state.
pub trait RenderBackend: Send + Sync + Debug + 'static {
    // --- Device ---

    /// The API this backend drives or emulates.
    fn api(&self) -> Api;

    /// Capabilities of the device.
    fn device_caps(&self) -> RenderDeviceCaps;

    /// Whether `format` can be sampled by programs of stage `prog_type`.
    fn texture_format_supported(&self, format: TextureFormat, prog_type: ProgType) -> bool;

    /// `true` while resources lost with the device still wait to be refilled.
    fn need_restore_resources(&self) -> bool;

    /// Applies new presentation parameters.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the device cannot be reset right now.
    fn reset(&self, params: &ResetParam) -> Result<(), RenderError>;

    /// Releases every device resource.
    fn uninitialize(&self);

    /// Stops presenting; frames are rejected until rendering resumes.
    fn suspend_rendering(&self);

    /// Resumes presenting after a suspension.
    fn resume_rendering(&self);

    /// Drops any state the backend cached about the native device.
    fn invalidate_cache(&self) {}

    // --- Vertex buffers ---

    /// Creates a vertex buffer, uploading `initial_data` when present.
    /// ## Arguments
    /// * `desc` - Size, memory hints and optional contents of the buffer.
    /// ## Returns
    /// The handle of the new buffer.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the initial data exceeds the buffer size.
    /// * `ResourceError::PoolExhausted` - If no vertex buffer slot is left.
    fn create_vertex_buffer(
        &self,
        desc: &VertexBufferDescriptor,
    ) -> Result<HVertexBuffer, ResourceError>;
    /// Destroys a vertex buffer.
    fn delete_vertex_buffer(&self, handle: HVertexBuffer) -> Result<(), ResourceError>;
    /// Overwrites `data.len()` bytes at `offset`.
    fn update_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        data: &[u8],
        offset: u32,
    ) -> Result<(), ResourceError>;
    /// Maps `size` bytes at `offset` and returns their current contents.
    fn map_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        offset: u32,
        size: u32,
    ) -> Result<Vec<u8>, ResourceError>;
    /// Writes back the mapped range and unmaps the buffer.
    fn unmap_vertex_buffer(&self, handle: HVertexBuffer, data: &[u8]) -> Result<(), ResourceError>;
    /// Whether the buffer lost its contents with the device.
    fn vertex_buffer_need_restore(&self, handle: HVertexBuffer) -> Result<bool, ResourceError>;

    // --- Index buffers ---

    /// Creates an index buffer.
    fn create_index_buffer(
        &self,
        desc: &IndexBufferDescriptor,
    ) -> Result<HIndexBuffer, ResourceError>;
    /// Destroys an index buffer.
    fn delete_index_buffer(&self, handle: HIndexBuffer) -> Result<(), ResourceError>;
    /// Overwrites `data.len()` bytes at `offset`.
    fn update_index_buffer(
        &self,
        handle: HIndexBuffer,
        data: &[u8],
        offset: u32,
    ) -> Result<(), ResourceError>;
    /// Maps `size` bytes at `offset` and returns their current contents.
    fn map_index_buffer(
        &self,
        handle: HIndexBuffer,
        offset: u32,
        size: u32,
    ) -> Result<Vec<u8>, ResourceError>;
    /// Writes back the mapped range and unmaps the buffer.
    fn unmap_index_buffer(&self, handle: HIndexBuffer, data: &[u8]) -> Result<(), ResourceError>;
    /// Whether the buffer lost its contents with the device.
    fn index_buffer_need_restore(&self, handle: HIndexBuffer) -> Result<bool, ResourceError>;

    // --- Occlusion queries ---

    /// Creates a query buffer with `max_object_count` slots.
    fn create_query_buffer(&self, max_object_count: u32) -> Result<HQueryBuffer, ResourceError>;
    /// Destroys a query buffer.
    fn delete_query_buffer(&self, handle: HQueryBuffer) -> Result<(), ResourceError>;
    /// Clears every result of the buffer.
    fn reset_query_buffer(&self, handle: HQueryBuffer) -> Result<(), ResourceError>;
    /// `true` once every slot that was drawn into has a result.
    fn query_buffer_is_ready(&self, handle: HQueryBuffer) -> Result<bool, ResourceError>;
    /// `true` once slot `index` has a result.
    fn query_is_ready(&self, handle: HQueryBuffer, index: u32) -> Result<bool, ResourceError>;
    /// Result of slot `index`.
    fn query_value(&self, handle: HQueryBuffer, index: u32) -> Result<u32, ResourceError>;

    // --- Timestamp queries ---

    /// Creates a perf query set holding `max_timestamp_count` timestamps.
    fn create_perf_query_set(
        &self,
        max_timestamp_count: u32,
    ) -> Result<HPerfQuerySet, ResourceError>;
    /// Destroys a perf query set.
    fn delete_perf_query_set(&self, handle: HPerfQuerySet) -> Result<(), ResourceError>;
    /// Clears every timestamp of the set.
    fn reset_perf_query_set(&self, handle: HPerfQuerySet) -> Result<(), ResourceError>;
    /// `true` once the frame the set was attached to has executed.
    fn perf_query_set_is_ready(&self, handle: HPerfQuerySet) -> Result<bool, ResourceError>;
    /// Ticks per second of the timestamps.
    fn perf_query_frequency(&self) -> u64;
    /// Timestamp `index`, `None` when it was never written.
    fn perf_query_timestamp(
        &self,
        handle: HPerfQuerySet,
        index: u32,
    ) -> Result<Option<u64>, ResourceError>;
    /// Begin and end timestamps of the frame the set was attached to.
    fn perf_query_frame_timestamps(
        &self,
        handle: HPerfQuerySet,
    ) -> Result<Option<(u64, u64)>, ResourceError>;

    // --- Textures ---

    /// Creates a texture and uploads its initial levels.
    /// ## Errors
    /// * `ResourceError::Unsupported` - If the format cannot be used as requested.
    fn create_texture(&self, desc: &TextureDescriptor) -> Result<HTexture, ResourceError>;
    /// Destroys a texture.
    fn delete_texture(&self, handle: HTexture) -> Result<(), ResourceError>;
    /// Maps mip `level` of the first face and returns its contents.
    fn map_texture(&self, handle: HTexture, level: u32) -> Result<Vec<u8>, ResourceError>;
    /// Writes back the mapped level and unmaps the texture.
    fn unmap_texture(&self, handle: HTexture, data: &[u8]) -> Result<(), ResourceError>;
    /// Replaces the contents of one level of one face.
    fn update_texture(
        &self,
        handle: HTexture,
        data: &[u8],
        level: u32,
        face: TextureFace,
    ) -> Result<(), ResourceError>;
    /// Whether the texture lost its contents with the device.
    fn texture_need_restore(&self, handle: HTexture) -> Result<bool, ResourceError>;

    // --- Pipeline states and const buffers ---

    /// Creates a pipeline state from resolved programs.
    /// ## Arguments
    /// * `desc` - Vertex layout, program uids and blending.
    /// * `vprog` - The vertex program registered under `desc.vprog_uid`.
    /// * `fprog` - The fragment program registered under `desc.fprog_uid`.
    fn create_pipeline_state(
        &self,
        desc: &PipelineStateDescriptor,
        vprog: Arc<ProgramSource>,
        fprog: Arc<ProgramSource>,
    ) -> Result<HPipelineState, ResourceError>;
    /// Destroys a pipeline state.
    fn delete_pipeline_state(&self, handle: HPipelineState) -> Result<(), ResourceError>;
    /// Creates const buffer `index` of the pipeline's vertex program.
    fn create_vertex_const_buffer(
        &self,
        pipeline: HPipelineState,
        index: u32,
    ) -> Result<HConstBuffer, ResourceError>;
    /// Creates const buffer `index` of the pipeline's fragment program.
    fn create_fragment_const_buffer(
        &self,
        pipeline: HPipelineState,
        index: u32,
    ) -> Result<HConstBuffer, ResourceError>;
    /// Number of const buffers the pipeline's program of `stage` declares.
    fn pipeline_const_buffer_count(
        &self,
        pipeline: HPipelineState,
        stage: ProgType,
    ) -> Result<u32, ResourceError>;
    /// Writes whole float4 registers starting at `const_index`.
    fn update_const_buffer_4fv(
        &self,
        handle: HConstBuffer,
        const_index: u32,
        data: &[f32],
    ) -> Result<(), ResourceError>;
    /// Writes single floats starting at component `const_sub_index` of register `const_index`.
    fn update_const_buffer_1fv(
        &self,
        handle: HConstBuffer,
        const_index: u32,
        const_sub_index: u32,
        data: &[f32],
    ) -> Result<(), ResourceError>;
    /// The current contents, captured for recording.
    fn const_buffer_snapshot(&self, handle: HConstBuffer) -> Result<ConstSnapshot, ResourceError>;
    /// Destroys a const buffer.
    fn delete_const_buffer(&self, handle: HConstBuffer) -> Result<(), ResourceError>;

    // --- Fixed-function states ---

    /// Creates a depth-stencil state.
    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDescriptor,
    ) -> Result<HDepthStencilState, ResourceError>;
    /// Destroys a depth-stencil state.
    fn delete_depth_stencil_state(&self, handle: HDepthStencilState) -> Result<(), ResourceError>;
    /// Creates a sampler state.
    fn create_sampler_state(
        &self,
        desc: &SamplerStateDescriptor,
    ) -> Result<HSamplerState, ResourceError>;
    /// Destroys a sampler state.
    fn delete_sampler_state(&self, handle: HSamplerState) -> Result<(), ResourceError>;

    // --- Synchronisation ---

    /// Creates an unsignaled sync object.
    fn create_sync_object(&self) -> Result<HSyncObject, ResourceError>;
    /// Destroys a sync object.
    fn delete_sync_object(&self, handle: HSyncObject) -> Result<(), ResourceError>;
    /// `true` once the frame that carried `handle` completed. Dead handles are signaled.
    fn sync_object_signaled(&self, handle: HSyncObject) -> bool;

    // --- Frames ---

    /// Replays every command buffer of `frame` and presents it.
    /// ## Arguments
    /// * `frame` - Passes in execution order with their sealed buffers.
    /// * `layouts` - The registry the recorded vertex layout uids refer to.
    /// ## Returns
    /// The counters of the replay.
    fn execute_frame(
        &self,
        frame: &FrameSubmission,
        layouts: &VertexLayoutRegistry,
    ) -> Result<ReplayStats, RenderError>;

    /// Drops `frame` without executing it, signaling its sync objects.
    fn reject_frame(&self, frame: &FrameSubmission);
}

/// Creates the backend for a requested API.
pub trait BackendSelector {
    /// Builds a backend for `api` configured by `params`.
    ///
    /// # Returns
    ///
    /// The shared backend, or an error if the API cannot be driven here.
    fn select(&self, api: Api, params: &InitParam) -> Result<Arc<dyn RenderBackend>, RenderError>;
}

/// Whether `api` can run on the platform this crate was built for.
pub fn api_is_supported(api: Api) -> bool {
    match api {
        Api::Dx9 | Api::Dx11 => cfg!(target_os = "windows"),
        Api::Metal => cfg!(all(target_os = "ios", not(target_abi = "sim"))),
        Api::Gles2 => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gles2_is_supported_everywhere() {
        assert!(api_is_supported(Api::Gles2));
    }

    #[test]
    fn test_direct3d_follows_the_target_os() {
        assert_eq!(api_is_supported(Api::Dx9), cfg!(target_os = "windows"));
        assert_eq!(api_is_supported(Api::Dx11), cfg!(target_os = "windows"));
    }

    #[cfg(not(target_os = "ios"))]
    #[test]
    fn test_metal_requires_ios() {
        assert!(!api_is_supported(Api::Metal));
    }
}
