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

//! The software backend: CPU-resident resources and a recording device.

use super::caps::{emulated_caps, format_supported};
use super::native::{FrameLog, SoftwareNativeDevice};
use super::resources::{
    BufferEntry, ConstBufferEntry, PerfQuerySetEntry, PipelineEntry, QueryBufferEntry,
    TextureEntry,
};
use rhi_core::api::{
    Api, DepthStencilStateDescriptor, IndexBufferDescriptor, InitParam, PipelineStateDescriptor,
    ProgType, RenderDeviceCaps, ResetParam, SamplerStateDescriptor, TextureDescriptor,
    TextureFace, TextureFormat, VertexBufferDescriptor,
};
use rhi_core::command::{ConstSnapshot, ReplayStats};
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
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Number of executed frames whose call logs are kept.
pub const FRAME_LOG_CAPACITY: usize = 16;

/// Live objects per resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    /// Vertex buffers.
    pub vertex_buffers: usize,
    /// Index buffers.
    pub index_buffers: usize,
    /// Query buffers.
    pub query_buffers: usize,
    /// Perf query sets.
    pub perf_query_sets: usize,
    /// Textures.
    pub textures: usize,
    /// Pipeline states.
    pub pipeline_states: usize,
    /// Const buffers.
    pub const_buffers: usize,
    /// Depth-stencil states.
    pub depth_stencil_states: usize,
    /// Sampler states.
    pub sampler_states: usize,
    /// Sync objects.
    pub sync_objects: usize,
}

/// A backend that keeps every resource in host memory and replays frames
/// onto a validating software device.
///
/// It reports the capabilities of the [`Api`] it was created for, so code
/// depending on API conventions (render target origin, clip range, color
/// packing) can be exercised on any host.
#[derive(Debug)]
pub struct SoftwareBackend {
    api: Api,
    pub(super) caps: RenderDeviceCaps,
    epoch: Instant,
    suspended: AtomicBool,
    resolution: Mutex<(u32, u32)>,

    pub(super) vertex_buffers: Mutex<ResourcePool<BufferEntry, kind::VertexBuffer>>,
    pub(super) index_buffers: Mutex<ResourcePool<BufferEntry, kind::IndexBuffer>>,
    pub(super) query_buffers: Mutex<ResourcePool<QueryBufferEntry, kind::QueryBuffer>>,
    pub(super) perf_query_sets: Mutex<ResourcePool<PerfQuerySetEntry, kind::PerfQuerySet>>,
    pub(super) textures: Mutex<ResourcePool<TextureEntry, kind::Texture>>,
    pub(super) pipelines: Mutex<ResourcePool<PipelineEntry, kind::PipelineState>>,
    pub(super) const_buffers: Mutex<ResourcePool<ConstBufferEntry, kind::ConstBuffer>>,
    pub(super) depth_stencil_states:
        Mutex<ResourcePool<DepthStencilStateDescriptor, kind::DepthStencilState>>,
    pub(super) sampler_states: Mutex<ResourcePool<SamplerStateDescriptor, kind::SamplerState>>,
    syncs: Mutex<SyncObjectTable>,

    frame_logs: Mutex<VecDeque<FrameLog>>,
}

impl SoftwareBackend {
    /// Creates a backend emulating `api`, sizing its pools from `params`.
    pub fn new(api: Api, params: &InitParam) -> Self {
        let caps = emulated_caps(api);
        log::info!(
            "Software backend created: {} ({}x{})",
            caps.device_description,
            params.width,
            params.height
        );
        Self {
            api,
            caps,
            epoch: Instant::now(),
            suspended: AtomicBool::new(false),
            resolution: Mutex::new((params.width, params.height)),
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
            // Frames complete as soon as they are replayed.
            syncs: Mutex::new(SyncObjectTable::new(0)),
            frame_logs: Mutex::new(VecDeque::with_capacity(FRAME_LOG_CAPACITY)),
        }
    }

    pub(super) fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Drops the contents of every resource, as a lost device would.
    ///
    /// Resources created with `need_restore` report it until they are
    /// written again.
    pub fn simulate_device_lost(&self) {
        log::info!("Software device lost, resource contents discarded.");
        for (_, vb) in utils::lock(&self.vertex_buffers).iter_mut() {
            vb.lose();
        }
        for (_, ib) in utils::lock(&self.index_buffers).iter_mut() {
            ib.lose();
        }
        for (_, texture) in utils::lock(&self.textures).iter_mut() {
            texture.lose();
        }
    }

    /// Current backbuffer size.
    pub fn resolution(&self) -> (u32, u32) {
        *utils::lock(&self.resolution)
    }

    /// `true` while rendering is suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Call logs of the most recent executed frames, oldest first.
    pub fn frame_logs(&self) -> Vec<FrameLog> {
        utils::lock(&self.frame_logs).iter().cloned().collect()
    }

    /// Call log of the most recent executed frame.
    pub fn last_frame_log(&self) -> Option<FrameLog> {
        utils::lock(&self.frame_logs).back().cloned()
    }

    /// Removes and returns every kept call log.
    pub fn take_frame_logs(&self) -> Vec<FrameLog> {
        utils::lock(&self.frame_logs).drain(..).collect()
    }

    /// Current contents of a vertex buffer.
    pub fn vertex_buffer_data(&self, handle: HVertexBuffer) -> Result<Vec<u8>, ResourceError> {
        Ok(utils::lock(&self.vertex_buffers).get(handle)?.data.clone())
    }

    /// Current contents of an index buffer.
    pub fn index_buffer_data(&self, handle: HIndexBuffer) -> Result<Vec<u8>, ResourceError> {
        Ok(utils::lock(&self.index_buffers).get(handle)?.data.clone())
    }

    /// Current contents of one level of one face of a texture.
    pub fn texture_data(
        &self,
        handle: HTexture,
        level: u32,
        face: TextureFace,
    ) -> Result<Vec<u8>, ResourceError> {
        utils::lock(&self.textures)
            .get(handle)?
            .level(level, face)
            .map(<[u8]>::to_vec)
            .ok_or(ResourceError::OutOfBounds)
    }

    /// Number of live objects per kind.
    pub fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            vertex_buffers: utils::lock(&self.vertex_buffers).len(),
            index_buffers: utils::lock(&self.index_buffers).len(),
            query_buffers: utils::lock(&self.query_buffers).len(),
            perf_query_sets: utils::lock(&self.perf_query_sets).len(),
            textures: utils::lock(&self.textures).len(),
            pipeline_states: utils::lock(&self.pipelines).len(),
            const_buffers: utils::lock(&self.const_buffers).len(),
            depth_stencil_states: utils::lock(&self.depth_stencil_states).len(),
            sampler_states: utils::lock(&self.sampler_states).len(),
            sync_objects: utils::lock(&self.syncs).len(),
        }
    }

    fn create_const_buffer(
        &self,
        pipeline: HPipelineState,
        stage: ProgType,
        index: u32,
    ) -> Result<HConstBuffer, ResourceError> {
        let registers = utils::lock(&self.pipelines)
            .get(pipeline)?
            .program(stage)
            .const_buffer_registers(index)?;
        utils::lock(&self.const_buffers).alloc(ConstBufferEntry::new(stage, registers))
    }

    fn record_frame(&self, log: FrameLog) {
        let mut logs = utils::lock(&self.frame_logs);
        if logs.len() == FRAME_LOG_CAPACITY {
            logs.pop_front();
        }
        logs.push_back(log);
    }
}

impl RenderBackend for SoftwareBackend {
    fn api(&self) -> Api {
        self.api
    }

    fn device_caps(&self) -> RenderDeviceCaps {
        self.caps.clone()
    }

    fn texture_format_supported(&self, format: TextureFormat, prog_type: ProgType) -> bool {
        format_supported(self.api, format, prog_type)
    }

    fn need_restore_resources(&self) -> bool {
        utils::lock(&self.vertex_buffers).iter().any(|(_, vb)| vb.need_restore())
            || utils::lock(&self.index_buffers).iter().any(|(_, ib)| ib.need_restore())
            || utils::lock(&self.textures).iter().any(|(_, t)| t.need_restore())
    }

    fn reset(&self, params: &ResetParam) -> Result<(), RenderError> {
        if params.width == 0 || params.height == 0 {
            return Err(RenderError::InitializationFailed(format!(
                "Invalid backbuffer size {}x{}",
                params.width, params.height
            )));
        }
        *utils::lock(&self.resolution) = (params.width, params.height);
        log::info!("Software backbuffer resized to {}x{}", params.width, params.height);
        Ok(())
    }

    fn uninitialize(&self) {
        let counts = self.resource_counts();
        if counts != ResourceCounts::default() {
            log::warn!("Software backend shut down with live resources: {counts:?}");
        }
        utils::lock(&self.vertex_buffers).clear();
        utils::lock(&self.index_buffers).clear();
        utils::lock(&self.query_buffers).clear();
        utils::lock(&self.perf_query_sets).clear();
        utils::lock(&self.textures).clear();
        utils::lock(&self.pipelines).clear();
        utils::lock(&self.const_buffers).clear();
        utils::lock(&self.depth_stencil_states).clear();
        utils::lock(&self.sampler_states).clear();
        *utils::lock(&self.syncs) = SyncObjectTable::new(0);
        log::info!("Software backend uninitialized.");
    }

    fn suspend_rendering(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    fn resume_rendering(&self) {
        self.suspended.store(false, Ordering::SeqCst);
    }

    // --- Vertex buffers ---

    fn create_vertex_buffer(
        &self,
        desc: &VertexBufferDescriptor,
    ) -> Result<HVertexBuffer, ResourceError> {
        let entry = BufferEntry::new(desc.size, desc.initial_data, desc.need_restore)?;
        utils::lock(&self.vertex_buffers).alloc(entry)
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
        utils::lock(&self.vertex_buffers).get_mut(handle)?.write(data, offset)
    }

    fn map_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        offset: u32,
        size: u32,
    ) -> Result<Vec<u8>, ResourceError> {
        utils::lock(&self.vertex_buffers).get_mut(handle)?.map(offset, size)
    }

    fn unmap_vertex_buffer(&self, handle: HVertexBuffer, data: &[u8]) -> Result<(), ResourceError> {
        utils::lock(&self.vertex_buffers).get_mut(handle)?.unmap(data)
    }

    fn vertex_buffer_need_restore(&self, handle: HVertexBuffer) -> Result<bool, ResourceError> {
        Ok(utils::lock(&self.vertex_buffers).get(handle)?.need_restore())
    }

    // --- Index buffers ---

    fn create_index_buffer(
        &self,
        desc: &IndexBufferDescriptor,
    ) -> Result<HIndexBuffer, ResourceError> {
        if desc.index_size.bytes() == 4 && !self.caps.is_32bit_indices_supported {
            return Err(ResourceError::Unsupported("32-bit indices".into()));
        }
        let mut entry = BufferEntry::new(desc.size, desc.initial_data, desc.need_restore)?;
        entry.index_size = Some(desc.index_size);
        utils::lock(&self.index_buffers).alloc(entry)
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
        utils::lock(&self.index_buffers).get_mut(handle)?.write(data, offset)
    }

    fn map_index_buffer(
        &self,
        handle: HIndexBuffer,
        offset: u32,
        size: u32,
    ) -> Result<Vec<u8>, ResourceError> {
        utils::lock(&self.index_buffers).get_mut(handle)?.map(offset, size)
    }

    fn unmap_index_buffer(&self, handle: HIndexBuffer, data: &[u8]) -> Result<(), ResourceError> {
        utils::lock(&self.index_buffers).get_mut(handle)?.unmap(data)
    }

    fn index_buffer_need_restore(&self, handle: HIndexBuffer) -> Result<bool, ResourceError> {
        Ok(utils::lock(&self.index_buffers).get(handle)?.need_restore())
    }

    // --- Occlusion queries ---

    fn create_query_buffer(&self, max_object_count: u32) -> Result<HQueryBuffer, ResourceError> {
        utils::lock(&self.query_buffers).alloc(QueryBufferEntry::new(max_object_count))
    }

    fn delete_query_buffer(&self, handle: HQueryBuffer) -> Result<(), ResourceError> {
        utils::lock(&self.query_buffers).free(handle).map(|_| ())
    }

    fn reset_query_buffer(&self, handle: HQueryBuffer) -> Result<(), ResourceError> {
        utils::lock(&self.query_buffers).get_mut(handle)?.reset();
        Ok(())
    }

    fn query_buffer_is_ready(&self, handle: HQueryBuffer) -> Result<bool, ResourceError> {
        Ok(utils::lock(&self.query_buffers).get(handle)?.ready)
    }

    fn query_is_ready(&self, handle: HQueryBuffer, index: u32) -> Result<bool, ResourceError> {
        let queries = utils::lock(&self.query_buffers);
        let entry = queries.get(handle)?;
        let written = *entry
            .written
            .get(index as usize)
            .ok_or(ResourceError::OutOfBounds)?;
        Ok(entry.ready && written)
    }

    fn query_value(&self, handle: HQueryBuffer, index: u32) -> Result<u32, ResourceError> {
        utils::lock(&self.query_buffers)
            .get(handle)?
            .values
            .get(index as usize)
            .copied()
            .ok_or(ResourceError::OutOfBounds)
    }

    // --- Perf queries ---

    fn create_perf_query_set(
        &self,
        max_timestamp_count: u32,
    ) -> Result<HPerfQuerySet, ResourceError> {
        utils::lock(&self.perf_query_sets).alloc(PerfQuerySetEntry::new(max_timestamp_count))
    }

    fn delete_perf_query_set(&self, handle: HPerfQuerySet) -> Result<(), ResourceError> {
        utils::lock(&self.perf_query_sets).free(handle).map(|_| ())
    }

    fn reset_perf_query_set(&self, handle: HPerfQuerySet) -> Result<(), ResourceError> {
        utils::lock(&self.perf_query_sets).get_mut(handle)?.reset();
        Ok(())
    }

    fn perf_query_set_is_ready(&self, handle: HPerfQuerySet) -> Result<bool, ResourceError> {
        Ok(utils::lock(&self.perf_query_sets).get(handle)?.ready)
    }

    fn perf_query_frequency(&self) -> u64 {
        1_000_000
    }

    fn perf_query_timestamp(
        &self,
        handle: HPerfQuerySet,
        index: u32,
    ) -> Result<Option<u64>, ResourceError> {
        utils::lock(&self.perf_query_sets)
            .get(handle)?
            .timestamps
            .get(index as usize)
            .copied()
            .ok_or(ResourceError::OutOfBounds)
    }

    fn perf_query_frame_timestamps(
        &self,
        handle: HPerfQuerySet,
    ) -> Result<Option<(u64, u64)>, ResourceError> {
        Ok(utils::lock(&self.perf_query_sets).get(handle)?.frame)
    }

    // --- Textures ---

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<HTexture, ResourceError> {
        let usable = if desc.is_render_target || desc.format.is_depth() {
            !desc.format.is_compressed()
        } else {
            format_supported(self.api, desc.format, ProgType::Fragment)
        };
        if !usable {
            return Err(ResourceError::Unsupported(format!(
                "{:?} textures on the {:?} device",
                desc.format, self.api
            )));
        }
        let entry = TextureEntry::new(desc)?;
        utils::lock(&self.textures).alloc(entry)
    }

    fn delete_texture(&self, handle: HTexture) -> Result<(), ResourceError> {
        utils::lock(&self.textures).free(handle).map(|_| ())
    }

    fn map_texture(&self, handle: HTexture, level: u32) -> Result<Vec<u8>, ResourceError> {
        utils::lock(&self.textures).get_mut(handle)?.map(level)
    }

    fn unmap_texture(&self, handle: HTexture, data: &[u8]) -> Result<(), ResourceError> {
        utils::lock(&self.textures).get_mut(handle)?.unmap(data)
    }

    fn update_texture(
        &self,
        handle: HTexture,
        data: &[u8],
        level: u32,
        face: TextureFace,
    ) -> Result<(), ResourceError> {
        utils::lock(&self.textures)
            .get_mut(handle)?
            .update(data, level, face)
    }

    fn texture_need_restore(&self, handle: HTexture) -> Result<bool, ResourceError> {
        Ok(utils::lock(&self.textures).get(handle)?.need_restore())
    }

    // --- Pipeline states and const buffers ---

    fn create_pipeline_state(
        &self,
        desc: &PipelineStateDescriptor,
        vprog: Arc<ProgramSource>,
        fprog: Arc<ProgramSource>,
    ) -> Result<HPipelineState, ResourceError> {
        utils::lock(&self.pipelines).alloc(PipelineEntry {
            vertex_layout: desc.vertex_layout.clone(),
            vprog,
            fprog,
            blending: desc.blending,
        })
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
        const_index: u32,
        data: &[f32],
    ) -> Result<(), ResourceError> {
        utils::lock(&self.const_buffers)
            .get_mut(handle)?
            .write(const_index as usize * 4, data)
    }

    fn update_const_buffer_1fv(
        &self,
        handle: HConstBuffer,
        const_index: u32,
        const_sub_index: u32,
        data: &[f32],
    ) -> Result<(), ResourceError> {
        utils::lock(&self.const_buffers)
            .get_mut(handle)?
            .write(const_index as usize * 4 + const_sub_index as usize, data)
    }

    fn const_buffer_snapshot(&self, handle: HConstBuffer) -> Result<ConstSnapshot, ResourceError> {
        let buffers = utils::lock(&self.const_buffers);
        Ok(ConstSnapshot::new(Arc::clone(&buffers.get(handle)?.data)))
    }

    fn delete_const_buffer(&self, handle: HConstBuffer) -> Result<(), ResourceError> {
        utils::lock(&self.const_buffers).free(handle).map(|_| ())
    }

    // --- Fixed-function states ---

    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDescriptor,
    ) -> Result<HDepthStencilState, ResourceError> {
        utils::lock(&self.depth_stencil_states).alloc(*desc)
    }

    fn delete_depth_stencil_state(&self, handle: HDepthStencilState) -> Result<(), ResourceError> {
        utils::lock(&self.depth_stencil_states).free(handle).map(|_| ())
    }

    fn create_sampler_state(
        &self,
        desc: &SamplerStateDescriptor,
    ) -> Result<HSamplerState, ResourceError> {
        if !desc.vertex_samplers.is_empty() && !self.caps.is_vertex_texture_units_supported {
            log::debug!(
                "Vertex samplers ignored: the {:?} device has no vertex texture units",
                self.api
            );
        }
        utils::lock(&self.sampler_states).alloc(desc.clone())
    }

    fn delete_sampler_state(&self, handle: HSamplerState) -> Result<(), ResourceError> {
        utils::lock(&self.sampler_states).free(handle).map(|_| ())
    }

    // --- Synchronisation ---

    fn create_sync_object(&self) -> Result<HSyncObject, ResourceError> {
        utils::lock(&self.syncs).create()
    }

    fn delete_sync_object(&self, handle: HSyncObject) -> Result<(), ResourceError> {
        utils::lock(&self.syncs).delete(handle)
    }

    fn sync_object_signaled(&self, handle: HSyncObject) -> bool {
        utils::lock(&self.syncs).is_signaled(handle)
    }

    // --- Frames ---

    fn execute_frame(
        &self,
        frame: &FrameSubmission,
        layouts: &VertexLayoutRegistry,
    ) -> Result<ReplayStats, RenderError> {
        let begin = self.now_us();
        let mut device = SoftwareNativeDevice::new(self);
        let stats = frame.replay(&mut device, layouts)?;
        let end = self.now_us();
        let (calls, queries, perf_sets) = device.finish();

        {
            let mut query_buffers = utils::lock(&self.query_buffers);
            for handle in queries {
                if let Ok(entry) = query_buffers.get_mut(handle) {
                    entry.ready = true;
                }
            }
        }
        {
            let mut sets = utils::lock(&self.perf_query_sets);
            for handle in perf_sets {
                if let Ok(entry) = sets.get_mut(handle) {
                    entry.ready = true;
                }
            }
            let frame_set = frame.perf_query_set();
            if frame_set.is_valid() {
                match sets.get_mut(frame_set) {
                    Ok(entry) => {
                        entry.frame = Some((begin, end));
                        entry.ready = true;
                    }
                    Err(e) => log::warn!(
                        "Frame {} perf query set {frame_set:?}: {e}",
                        frame.number()
                    ),
                }
            }
        }
        {
            let mut syncs = utils::lock(&self.syncs);
            for sync in frame.sync_objects() {
                syncs.mark_executed(sync, frame.number());
            }
            syncs.frame_completed(frame.number());
        }

        self.record_frame(FrameLog {
            number: frame.number(),
            calls,
            stats,
        });
        Ok(stats)
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
    use rhi_core::api::{IndexSize, TextureType};

    fn backend(api: Api) -> SoftwareBackend {
        SoftwareBackend::new(api, &InitParam::default())
    }

    #[test]
    fn test_caps_follow_the_emulated_api() {
        assert!(backend(Api::Metal).device_caps().is_upper_left_rt_origin);
        assert!(!backend(Api::Gles2).device_caps().is_upper_left_rt_origin);
    }

    #[test]
    fn test_unsupported_texture_format_is_rejected() {
        let gles = backend(Api::Gles2);
        let desc = TextureDescriptor::new_2d(4, 4, TextureFormat::DXT1);
        assert!(matches!(gles.create_texture(&desc), Err(ResourceError::Unsupported(_))));

        let dx = backend(Api::Dx11);
        assert!(dx.create_texture(&desc).is_ok());
    }

    #[test]
    fn test_32bit_indices_need_device_support() {
        let desc = IndexBufferDescriptor {
            size: 12,
            index_size: IndexSize::Size32,
            ..Default::default()
        };
        assert!(backend(Api::Gles2).create_index_buffer(&desc).is_err());
        assert!(backend(Api::Dx9).create_index_buffer(&desc).is_ok());
    }

    #[test]
    fn test_device_loss_requires_restore_of_flagged_resources() {
        // --- 1. ARRANGE ---
        let sw = backend(Api::Dx9);
        let vb = sw.create_vertex_buffer(&VertexBufferDescriptor::with_data(&[1; 12])).unwrap();
        let tex = sw
            .create_texture(&TextureDescriptor {
                texture_type: TextureType::Tex2D,
                need_restore: false,
                ..TextureDescriptor::new_2d(2, 2, TextureFormat::R8G8B8A8)
            })
            .unwrap();
        assert!(!sw.need_restore_resources());

        // --- 2. ACT ---
        sw.simulate_device_lost();

        // --- 3. ASSERT ---
        assert!(sw.need_restore_resources());
        assert!(sw.vertex_buffer_need_restore(vb).unwrap());
        assert!(!sw.texture_need_restore(tex).unwrap(), "texture opted out of restore");
        assert_eq!(sw.vertex_buffer_data(vb).unwrap(), vec![0; 12]);

        sw.update_vertex_buffer(vb, &[1; 12], 0).unwrap();
        assert!(!sw.need_restore_resources());
    }

    #[test]
    fn test_const_buffers_are_sized_by_the_program() {
        let sw = backend(Api::Dx11);
        let vprog = Arc::new(ProgramSource::new("vp", ProgType::Vertex, "").with_const_buffer(3));
        let fprog = Arc::new(ProgramSource::new("fp", ProgType::Fragment, ""));
        let ps = sw
            .create_pipeline_state(&PipelineStateDescriptor::default(), vprog, fprog)
            .unwrap();

        let cb = sw.create_vertex_const_buffer(ps, 0).unwrap();

        assert_eq!(sw.pipeline_const_buffer_count(ps, ProgType::Vertex).unwrap(), 1);
        assert_eq!(sw.pipeline_const_buffer_count(ps, ProgType::Fragment).unwrap(), 0);
        assert_eq!(sw.const_buffer_snapshot(cb).unwrap().len(), 12);
        assert!(sw.create_fragment_const_buffer(ps, 0).is_err());
        assert!(sw.update_const_buffer_4fv(cb, 2, &[0.0; 8]).is_err());
        sw.update_const_buffer_1fv(cb, 2, 3, &[5.0]).unwrap();
        approx::assert_relative_eq!(sw.const_buffer_snapshot(cb).unwrap()[11], 5.0);
    }

    #[test]
    fn test_reset_rejects_empty_backbuffer() {
        let sw = backend(Api::Dx11);
        assert!(sw.reset(&ResetParam { width: 0, ..Default::default() }).is_err());
        sw.reset(&ResetParam {
            width: 640,
            height: 480,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(sw.resolution(), (640, 480));
    }
}
