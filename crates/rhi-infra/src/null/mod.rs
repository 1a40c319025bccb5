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

//! A backend that accepts every call and renders nothing.
//!
//! Resources only keep what later calls need to answer consistently: sizes,
//! const buffer counts and query slot counts. Useful for headless servers and
//! for measuring the recording overhead of the front end alone.

use rhi_core::api::{
    Api, DepthStencilStateDescriptor, IndexBufferDescriptor, InitParam, PipelineStateDescriptor,
    ProgType, RenderDeviceCaps, ResetParam, SamplerStateDescriptor, TextureDescriptor,
    TextureFace, TextureFormat, VertexBufferDescriptor,
};
use rhi_core::command::{ConstSnapshot, ReplayStats};
use rhi_core::format;
use rhi_core::frame::FrameSubmission;
use rhi_core::handle::{
    kind, HConstBuffer, HDepthStencilState, HIndexBuffer, HPerfQuerySet, HPipelineState,
    HQueryBuffer, HSamplerState, HSyncObject, HTexture, HVertexBuffer,
};
use rhi_core::pool::ResourcePool;
use rhi_core::shader_cache::ProgramSource;
use rhi_core::sync::SyncObjectTable;
use rhi_core::utils;
use rhi_core::vertex_layout::VertexLayoutRegistry;
use rhi_core::{RenderBackend, RenderError, ResourceError};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
struct NullTexture {
    format: TextureFormat,
    width: u32,
    height: u32,
    level_count: u32,
}

#[derive(Debug)]
struct NullPipeline {
    vprog: Arc<ProgramSource>,
    fprog: Arc<ProgramSource>,
}

impl NullPipeline {
    fn program(&self, stage: ProgType) -> &ProgramSource {
        match stage {
            ProgType::Vertex => &self.vprog,
            ProgType::Fragment => &self.fprog,
        }
    }
}

/// The no-op backend.
#[derive(Debug)]
pub struct NullBackend {
    api: Api,
    vertex_buffers: Mutex<ResourcePool<u32, kind::VertexBuffer>>,
    index_buffers: Mutex<ResourcePool<u32, kind::IndexBuffer>>,
    query_buffers: Mutex<ResourcePool<u32, kind::QueryBuffer>>,
    perf_query_sets: Mutex<ResourcePool<u32, kind::PerfQuerySet>>,
    textures: Mutex<ResourcePool<NullTexture, kind::Texture>>,
    pipelines: Mutex<ResourcePool<NullPipeline, kind::PipelineState>>,
    const_buffers: Mutex<ResourcePool<(), kind::ConstBuffer>>,
    depth_stencil_states: Mutex<ResourcePool<(), kind::DepthStencilState>>,
    sampler_states: Mutex<ResourcePool<(), kind::SamplerState>>,
    syncs: Mutex<SyncObjectTable>,
}

impl NullBackend {
    /// Creates a backend reporting `api`, with pools sized from `params`.
    pub fn new(api: Api, params: &InitParam) -> Self {
        log::info!("Null backend created for {api:?}");
        Self {
            api,
            vertex_buffers: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_vertex_buffer_count,
            )),
            index_buffers: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_index_buffer_count,
            )),
            query_buffers: Mutex::new(ResourcePool::new()),
            perf_query_sets: Mutex::new(ResourcePool::new()),
            textures: Mutex::new(ResourcePool::with_configured_capacity(params.max_texture_count)),
            pipelines: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_pipeline_state_count,
            )),
            const_buffers: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_const_buffer_count,
            )),
            depth_stencil_states: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_depth_stencil_state_count,
            )),
            sampler_states: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_sampler_state_count,
            )),
            syncs: Mutex::new(SyncObjectTable::new(0)),
        }
    }

    fn buffer_range(size: u32, offset: u32, len: u32) -> Result<Vec<u8>, ResourceError> {
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(vec![0; len as usize]),
            _ => Err(ResourceError::OutOfBounds),
        }
    }

    fn create_const_buffer(
        &self,
        pipeline: HPipelineState,
        stage: ProgType,
        index: u32,
    ) -> Result<HConstBuffer, ResourceError> {
        utils::lock(&self.pipelines)
            .get(pipeline)?
            .program(stage)
            .const_buffer_registers(index)?;
        utils::lock(&self.const_buffers).alloc(())
    }
}

impl RenderBackend for NullBackend {
    fn api(&self) -> Api {
        self.api
    }

    fn device_caps(&self) -> RenderDeviceCaps {
        RenderDeviceCaps {
            device_description: "Null device".into(),
            ..Default::default()
        }
    }

    fn texture_format_supported(&self, _format: TextureFormat, _prog_type: ProgType) -> bool {
        true
    }

    fn need_restore_resources(&self) -> bool {
        false
    }

    fn reset(&self, _params: &ResetParam) -> Result<(), RenderError> {
        Ok(())
    }

    fn uninitialize(&self) {
        utils::lock(&self.vertex_buffers).clear();
        utils::lock(&self.index_buffers).clear();
        utils::lock(&self.query_buffers).clear();
        utils::lock(&self.perf_query_sets).clear();
        utils::lock(&self.textures).clear();
        utils::lock(&self.pipelines).clear();
        utils::lock(&self.const_buffers).clear();
        utils::lock(&self.depth_stencil_states).clear();
        utils::lock(&self.sampler_states).clear();
        log::info!("Null backend uninitialized.");
    }

    fn suspend_rendering(&self) {}

    fn resume_rendering(&self) {}

    fn create_vertex_buffer(
        &self,
        desc: &VertexBufferDescriptor,
    ) -> Result<HVertexBuffer, ResourceError> {
        if desc.initial_data.is_some_and(|data| data.len() > desc.size as usize) {
            return Err(ResourceError::OutOfBounds);
        }
        utils::lock(&self.vertex_buffers).alloc(desc.size)
    }

    fn delete_vertex_buffer(&self, handle: HVertexBuffer) -> Result<(), ResourceError> {
        utils::lock(&self.vertex_buffers).free(handle).map(|_| ())
    }

    fn update_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        data: &[u8],
        offset: u32,
    ) -> Result<(), ResourceError> {
        let size = *utils::lock(&self.vertex_buffers).get(handle)?;
        Self::buffer_range(size, offset, data.len() as u32).map(|_| ())
    }

    fn map_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        offset: u32,
        size: u32,
    ) -> Result<Vec<u8>, ResourceError> {
        let capacity = *utils::lock(&self.vertex_buffers).get(handle)?;
        Self::buffer_range(capacity, offset, size)
    }

    fn unmap_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        _data: &[u8],
    ) -> Result<(), ResourceError> {
        utils::lock(&self.vertex_buffers).get(handle).map(|_| ())
    }

    fn vertex_buffer_need_restore(&self, handle: HVertexBuffer) -> Result<bool, ResourceError> {
        utils::lock(&self.vertex_buffers).get(handle).map(|_| false)
    }

    fn create_index_buffer(
        &self,
        desc: &IndexBufferDescriptor,
    ) -> Result<HIndexBuffer, ResourceError> {
        if desc.initial_data.is_some_and(|data| data.len() > desc.size as usize) {
            return Err(ResourceError::OutOfBounds);
        }
        utils::lock(&self.index_buffers).alloc(desc.size)
    }

    fn delete_index_buffer(&self, handle: HIndexBuffer) -> Result<(), ResourceError> {
        utils::lock(&self.index_buffers).free(handle).map(|_| ())
    }

    fn update_index_buffer(
        &self,
        handle: HIndexBuffer,
        data: &[u8],
        offset: u32,
    ) -> Result<(), ResourceError> {
        let size = *utils::lock(&self.index_buffers).get(handle)?;
        Self::buffer_range(size, offset, data.len() as u32).map(|_| ())
    }

    fn map_index_buffer(
        &self,
        handle: HIndexBuffer,
        offset: u32,
        size: u32,
    ) -> Result<Vec<u8>, ResourceError> {
        let capacity = *utils::lock(&self.index_buffers).get(handle)?;
        Self::buffer_range(capacity, offset, size)
    }

    fn unmap_index_buffer(&self, handle: HIndexBuffer, _data: &[u8]) -> Result<(), ResourceError> {
        utils::lock(&self.index_buffers).get(handle).map(|_| ())
    }

    fn index_buffer_need_restore(&self, handle: HIndexBuffer) -> Result<bool, ResourceError> {
        utils::lock(&self.index_buffers).get(handle).map(|_| false)
    }

    fn create_query_buffer(&self, max_object_count: u32) -> Result<HQueryBuffer, ResourceError> {
        utils::lock(&self.query_buffers).alloc(max_object_count)
    }

    fn delete_query_buffer(&self, handle: HQueryBuffer) -> Result<(), ResourceError> {
        utils::lock(&self.query_buffers).free(handle).map(|_| ())
    }

    fn reset_query_buffer(&self, handle: HQueryBuffer) -> Result<(), ResourceError> {
        utils::lock(&self.query_buffers).get(handle).map(|_| ())
    }

    fn query_buffer_is_ready(&self, handle: HQueryBuffer) -> Result<bool, ResourceError> {
        utils::lock(&self.query_buffers).get(handle).map(|_| true)
    }

    fn query_is_ready(&self, handle: HQueryBuffer, index: u32) -> Result<bool, ResourceError> {
        let count = *utils::lock(&self.query_buffers).get(handle)?;
        if index < count {
            Ok(true)
        } else {
            Err(ResourceError::OutOfBounds)
        }
    }

    fn query_value(&self, handle: HQueryBuffer, index: u32) -> Result<u32, ResourceError> {
        self.query_is_ready(handle, index).map(|_| 0)
    }

    fn create_perf_query_set(
        &self,
        max_timestamp_count: u32,
    ) -> Result<HPerfQuerySet, ResourceError> {
        utils::lock(&self.perf_query_sets).alloc(max_timestamp_count)
    }

    fn delete_perf_query_set(&self, handle: HPerfQuerySet) -> Result<(), ResourceError> {
        utils::lock(&self.perf_query_sets).free(handle).map(|_| ())
    }

    fn reset_perf_query_set(&self, handle: HPerfQuerySet) -> Result<(), ResourceError> {
        utils::lock(&self.perf_query_sets).get(handle).map(|_| ())
    }

    fn perf_query_set_is_ready(&self, handle: HPerfQuerySet) -> Result<bool, ResourceError> {
        utils::lock(&self.perf_query_sets).get(handle).map(|_| true)
    }

    fn perf_query_frequency(&self) -> u64 {
        1_000_000
    }

    fn perf_query_timestamp(
        &self,
        handle: HPerfQuerySet,
        index: u32,
    ) -> Result<Option<u64>, ResourceError> {
        let count = *utils::lock(&self.perf_query_sets).get(handle)?;
        if index < count {
            Ok(None)
        } else {
            Err(ResourceError::OutOfBounds)
        }
    }

    fn perf_query_frame_timestamps(
        &self,
        handle: HPerfQuerySet,
    ) -> Result<Option<(u64, u64)>, ResourceError> {
        utils::lock(&self.perf_query_sets).get(handle).map(|_| None)
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<HTexture, ResourceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(ResourceError::Unsupported("zero-sized texture".into()));
        }
        utils::lock(&self.textures).alloc(NullTexture {
            format: desc.format,
            width: desc.width,
            height: desc.height,
            level_count: desc.level_count.max(1),
        })
    }

    fn delete_texture(&self, handle: HTexture) -> Result<(), ResourceError> {
        utils::lock(&self.textures).free(handle).map(|_| ())
    }

    fn map_texture(&self, handle: HTexture, level: u32) -> Result<Vec<u8>, ResourceError> {
        let texture = *utils::lock(&self.textures).get(handle)?;
        if level >= texture.level_count {
            return Err(ResourceError::OutOfBounds);
        }
        let size = format::texture_size(texture.format, texture.width, texture.height, level);
        Ok(vec![0; size as usize])
    }

    fn unmap_texture(&self, handle: HTexture, _data: &[u8]) -> Result<(), ResourceError> {
        utils::lock(&self.textures).get(handle).map(|_| ())
    }

    fn update_texture(
        &self,
        handle: HTexture,
        _data: &[u8],
        level: u32,
        _face: TextureFace,
    ) -> Result<(), ResourceError> {
        let texture = *utils::lock(&self.textures).get(handle)?;
        if level < texture.level_count {
            Ok(())
        } else {
            Err(ResourceError::OutOfBounds)
        }
    }

    fn texture_need_restore(&self, handle: HTexture) -> Result<bool, ResourceError> {
        utils::lock(&self.textures).get(handle).map(|_| false)
    }

    fn create_pipeline_state(
        &self,
        _desc: &PipelineStateDescriptor,
        vprog: Arc<ProgramSource>,
        fprog: Arc<ProgramSource>,
    ) -> Result<HPipelineState, ResourceError> {
        utils::lock(&self.pipelines).alloc(NullPipeline { vprog, fprog })
    }

    fn delete_pipeline_state(&self, handle: HPipelineState) -> Result<(), ResourceError> {
        utils::lock(&self.pipelines).free(handle).map(|_| ())
    }

    fn create_vertex_const_buffer(
        &self,
        pipeline: HPipelineState,
        index: u32,
    ) -> Result<HConstBuffer, ResourceError> {
        self.create_const_buffer(pipeline, ProgType::Vertex, index)
    }

    fn create_fragment_const_buffer(
        &self,
        pipeline: HPipelineState,
        index: u32,
    ) -> Result<HConstBuffer, ResourceError> {
        self.create_const_buffer(pipeline, ProgType::Fragment, index)
    }

    fn pipeline_const_buffer_count(
        &self,
        pipeline: HPipelineState,
        stage: ProgType,
    ) -> Result<u32, ResourceError> {
        Ok(utils::lock(&self.pipelines)
            .get(pipeline)?
            .program(stage)
            .const_buffers
            .len() as u32)
    }

    fn update_const_buffer_4fv(
        &self,
        handle: HConstBuffer,
        _const_index: u32,
        _data: &[f32],
    ) -> Result<(), ResourceError> {
        utils::lock(&self.const_buffers).get(handle).map(|_| ())
    }

    fn update_const_buffer_1fv(
        &self,
        handle: HConstBuffer,
        _const_index: u32,
        _const_sub_index: u32,
        _data: &[f32],
    ) -> Result<(), ResourceError> {
        utils::lock(&self.const_buffers).get(handle).map(|_| ())
    }

    fn const_buffer_snapshot(&self, handle: HConstBuffer) -> Result<ConstSnapshot, ResourceError> {
        utils::lock(&self.const_buffers)
            .get(handle)
            .map(|_| ConstSnapshot::default())
    }

    fn delete_const_buffer(&self, handle: HConstBuffer) -> Result<(), ResourceError> {
        utils::lock(&self.const_buffers).free(handle).map(|_| ())
    }

    fn create_depth_stencil_state(
        &self,
        _desc: &DepthStencilStateDescriptor,
    ) -> Result<HDepthStencilState, ResourceError> {
        utils::lock(&self.depth_stencil_states).alloc(())
    }

    fn delete_depth_stencil_state(&self, handle: HDepthStencilState) -> Result<(), ResourceError> {
        utils::lock(&self.depth_stencil_states).free(handle).map(|_| ())
    }

    fn create_sampler_state(
        &self,
        _desc: &SamplerStateDescriptor,
    ) -> Result<HSamplerState, ResourceError> {
        utils::lock(&self.sampler_states).alloc(())
    }

    fn delete_sampler_state(&self, handle: HSamplerState) -> Result<(), ResourceError> {
        utils::lock(&self.sampler_states).free(handle).map(|_| ())
    }

    fn create_sync_object(&self) -> Result<HSyncObject, ResourceError> {
        utils::lock(&self.syncs).create()
    }

    fn delete_sync_object(&self, handle: HSyncObject) -> Result<(), ResourceError> {
        utils::lock(&self.syncs).delete(handle)
    }

    fn sync_object_signaled(&self, handle: HSyncObject) -> bool {
        utils::lock(&self.syncs).is_signaled(handle)
    }

    fn execute_frame(
        &self,
        frame: &FrameSubmission,
        _layouts: &VertexLayoutRegistry,
    ) -> Result<ReplayStats, RenderError> {
        let mut syncs = utils::lock(&self.syncs);
        for sync in frame.sync_objects() {
            syncs.mark_executed(sync, frame.number());
        }
        syncs.frame_completed(frame.number());
        let commands = frame
            .passes()
            .iter()
            .flat_map(|pass| &pass.command_buffers)
            .map(|buffer| buffer.len())
            .sum::<usize>();
        Ok(ReplayStats {
            command_buffers: frame.command_buffer_count() as u32,
            commands: commands as u32,
            ..Default::default()
        })
    }

    fn reject_frame(&self, frame: &FrameSubmission) {
        let mut syncs = utils::lock(&self.syncs);
        for sync in frame.sync_objects() {
            syncs.signal(sync);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_tracks_buffer_bounds() {
        let backend = NullBackend::new(Api::Gles2, &InitParam::default());
        let vb = backend.create_vertex_buffer(&VertexBufferDescriptor::new(16)).unwrap();

        assert_eq!(backend.map_vertex_buffer(vb, 8, 8).unwrap(), vec![0; 8]);
        assert!(backend.map_vertex_buffer(vb, 8, 9).is_err());
        backend.delete_vertex_buffer(vb).unwrap();
        assert!(
            backend.update_vertex_buffer(vb, &[0; 4], 0).is_err(),
            "stale handle must be rejected"
        );
    }

    #[test]
    fn test_null_backend_sizes_mapped_texture_levels() {
        let backend = NullBackend::new(Api::Gles2, &InitParam::default());
        let texture = backend
            .create_texture(&TextureDescriptor {
                level_count: 2,
                ..TextureDescriptor::new_2d(8, 8, TextureFormat::R8G8B8A8)
            })
            .unwrap();

        assert_eq!(backend.map_texture(texture, 0).unwrap().len(), 256);
        assert_eq!(backend.map_texture(texture, 1).unwrap().len(), 64);
        assert!(backend.map_texture(texture, 2).is_err());
    }

    #[test]
    fn test_null_backend_signals_executed_frames() {
        let backend = NullBackend::new(Api::Gles2, &InitParam::default());
        let sync = backend.create_sync_object().unwrap();
        let frame = FrameSubmission::new(1, Vec::new(), sync, HPerfQuerySet::INVALID);

        assert!(!backend.sync_object_signaled(sync));
        backend.execute_frame(&frame, &VertexLayoutRegistry::new()).unwrap();
        assert!(backend.sync_object_signaled(sync));
    }
}
