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

//! The device façade: one entry point for resources, recording and presentation.

use crate::api::{
    Api, CullMode, DepthStencilStateDescriptor, FillMode, IndexBufferDescriptor, InitParam,
    PipelineStateDescriptor, PrimitiveType, ProgType, RenderDeviceCaps, RenderPassConfig,
    ResetParam, SamplerStateDescriptor, ScissorRect, TextureDescriptor, TextureFace,
    TextureFormat, TextureSetDescriptor, VertexBufferDescriptor, Viewport,
};
use crate::backend::{api_is_supported, BackendSelector, RenderBackend};
use crate::cache::{RefCountedCache, TextureSetCache};
use crate::command::{Command, CommandBuffer, ConstSnapshot, DrawCall, RecordingState};
use crate::deletion::{DeletionScheduler, ScheduledResource};
use crate::error::{CommandError, RenderError, ResourceError};
use crate::format;
use crate::frame::{
    validate_command_buffer_count, FrameBuilder, FrameExecutor, FrameSubmission, PassState,
    RenderPass, SubmittedPass,
};
use crate::handle::{
    kind, HCommandBuffer, HConstBuffer, HDepthStencilState, HIndexBuffer, HPacketList,
    HPerfQuerySet, HPipelineState, HQueryBuffer, HRenderPass, HSamplerState, HSyncObject,
    HTexture, HTextureSet, HVertexBuffer,
};
use crate::packet::{Packet, PacketList, PacketResolver};
use crate::pool::ResourcePool;
use crate::shader_cache::{ProgramSource, ShaderCache};
use crate::stats::FrameStats;
use crate::utils;
use crate::vertex_layout::{VertexLayout, VertexLayoutRegistry};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// The resource a [`Mapping`] writes back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapTarget {
    /// A vertex buffer range.
    VertexBuffer(HVertexBuffer),
    /// An index buffer range.
    IndexBuffer(HIndexBuffer),
    /// A texture level.
    Texture(HTexture),
}

/// CPU access to a mapped resource. Contents are written back on
/// [`unmap`](Mapping::unmap) or when the guard is dropped.
pub struct Mapping<'a> {
    rhi: &'a Rhi,
    target: MapTarget,
    data: Vec<u8>,
    unmapped: bool,
}

impl Mapping<'_> {
    /// The mapped resource.
    pub fn target(&self) -> MapTarget {
        self.target
    }

    /// Writes the contents back and ends the mapping.
    pub fn unmap(mut self) -> Result<(), ResourceError> {
        self.unmapped = true;
        self.rhi.write_back(self.target, &self.data)
    }
}

impl Deref for Mapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for Mapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for Mapping<'_> {
    fn drop(&mut self) {
        if !self.unmapped {
            if let Err(e) = self.rhi.write_back(self.target, &self.data) {
                log::error!("Failed to unmap {:?}: {e}", self.target);
            }
        }
    }
}

impl fmt::Debug for Mapping<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("target", &self.target)
            .field("len", &self.data.len())
            .finish()
    }
}

struct Resolver<'a> {
    backend: &'a dyn RenderBackend,
    texture_sets: &'a Mutex<TextureSetCache>,
}

impl PacketResolver for Resolver<'_> {
    fn const_snapshot(&self, buffer: HConstBuffer) -> Result<ConstSnapshot, ResourceError> {
        self.backend.const_buffer_snapshot(buffer)
    }

    fn texture_set(&self, set: HTextureSet) -> Result<TextureSetDescriptor, ResourceError> {
        utils::lock(self.texture_sets).get(set).cloned()
    }
}

/// A render device.
///
/// Every method takes `&self`: command buffers can be recorded from several
/// threads while another one presents. Resources are referenced by typed
/// handles; deletions requested with `force_immediate == false` wait until
/// the frames that may still use the resource have completed.
pub struct Rhi {
    backend: Arc<dyn RenderBackend>,
    params: InitParam,
    layouts: Arc<VertexLayoutRegistry>,
    shaders: ShaderCache,

    command_buffers: Mutex<ResourcePool<CommandBuffer, kind::CommandBuffer>>,
    passes: Mutex<ResourcePool<RenderPass, kind::RenderPass>>,
    packet_lists: Mutex<ResourcePool<PacketList, kind::PacketList>>,

    texture_sets: Mutex<TextureSetCache>,
    depth_stencil_states: Mutex<RefCountedCache<DepthStencilStateDescriptor, HDepthStencilState>>,
    sampler_states: Mutex<RefCountedCache<SamplerStateDescriptor, HSamplerState>>,
    default_states: Mutex<Option<(HDepthStencilState, HSamplerState)>>,

    frame: Mutex<FrameBuilder>,
    deletion: Mutex<DeletionScheduler>,
    executor: FrameExecutor,
    suspended: AtomicBool,
}

impl Rhi {
    // --- Lifecycle ---

    /// Creates a device for `api` with the backend chosen by `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedApi`] when `api` cannot run on this platform.
    pub fn initialize(
        api: Api,
        params: InitParam,
        selector: &dyn BackendSelector,
    ) -> Result<Self, RenderError> {
        if !api_is_supported(api) {
            return Err(RenderError::UnsupportedApi(api));
        }
        let backend = selector.select(api, &params)?;
        Self::with_backend(backend, params)
    }

    /// Creates a device over an existing backend.
    pub fn with_backend(
        backend: Arc<dyn RenderBackend>,
        params: InitParam,
    ) -> Result<Self, RenderError> {
        let layouts = Arc::new(VertexLayoutRegistry::new());
        let executor = if params.threaded_render {
            FrameExecutor::threaded(
                Arc::clone(&backend),
                Arc::clone(&layouts),
                params.threaded_render_frame_count,
            )?
        } else {
            FrameExecutor::immediate(Arc::clone(&backend), Arc::clone(&layouts))
        };

        log::info!(
            "Render device initialized: {:?} ({}x{}, threaded: {})",
            backend.api(),
            params.width,
            params.height,
            params.threaded_render
        );

        Ok(Self {
            command_buffers: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_command_buffer_count,
            )),
            passes: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_render_pass_count,
            )),
            packet_lists: Mutex::new(ResourcePool::with_configured_capacity(
                params.max_packet_list_count,
            )),
            texture_sets: Mutex::new(TextureSetCache::new(params.max_texture_set_count)),
            depth_stencil_states: Mutex::new(RefCountedCache::new()),
            sampler_states: Mutex::new(RefCountedCache::new()),
            default_states: Mutex::new(None),
            frame: Mutex::new(FrameBuilder::new()),
            deletion: Mutex::new(DeletionScheduler::new()),
            executor,
            suspended: AtomicBool::new(false),
            shaders: ShaderCache::new(),
            layouts,
            backend,
            params,
        })
    }

    /// Shuts the device down; equivalent to dropping it.
    pub fn uninitialize(self) {}

    /// The parameters the device was created with.
    pub fn init_params(&self) -> &InitParam {
        &self.params
    }

    /// The API of the backend.
    pub fn host_api(&self) -> Api {
        self.backend.api()
    }

    /// The backend itself.
    pub fn backend(&self) -> &Arc<dyn RenderBackend> {
        &self.backend
    }

    /// Capabilities of the device.
    pub fn device_caps(&self) -> RenderDeviceCaps {
        self.backend.device_caps()
    }

    /// Whether `format` can be sampled from `prog_type` programs.
    pub fn texture_format_supported(&self, format: TextureFormat, prog_type: ProgType) -> bool {
        self.backend.texture_format_supported(format, prog_type)
    }

    /// Packs a color the way the host API expects it.
    pub fn native_color_rgba(&self, r: f32, g: f32, b: f32, a: f32) -> u32 {
        format::native_color_rgba(self.host_api(), r, g, b, a)
    }

    /// Whether projections must be flipped when rendering with `config`.
    pub fn need_invert_projection(&self, config: &RenderPassConfig) -> bool {
        config.renders_off_screen() && !self.device_caps().is_upper_left_rt_origin
    }

    /// Applies new presentation parameters.
    pub fn reset(&self, params: &ResetParam) -> Result<(), RenderError> {
        log::info!("Resetting render device to {}x{}", params.width, params.height);
        self.backend.reset(params)
    }

    /// Stops executing frames; presented frames are rejected until
    /// [`resume_rendering`](Self::resume_rendering).
    pub fn suspend_rendering(&self) {
        log::info!("Rendering suspended.");
        self.suspended.store(true, Ordering::SeqCst);
        self.backend.suspend_rendering();
    }

    /// Resumes frame execution.
    pub fn resume_rendering(&self) {
        log::info!("Rendering resumed.");
        self.backend.resume_rendering();
        self.suspended.store(false, Ordering::SeqCst);
    }

    /// `true` while rendering is suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// `true` while resources lost with the device wait to be refilled.
    pub fn need_restore_resources(&self) -> bool {
        self.backend.need_restore_resources()
    }

    /// Drops state the backend cached about the native device.
    pub fn invalidate_cache(&self) {
        self.backend.invalidate_cache();
    }

    // --- Programs and vertex layouts ---

    /// The program registry used to resolve pipeline states.
    pub fn shader_cache(&self) -> &ShaderCache {
        &self.shaders
    }

    /// Registers a program for later pipeline creation.
    pub fn register_program(&self, source: ProgramSource) -> Result<(), ResourceError> {
        self.shaders.register_program(source).map_err(Into::into)
    }

    /// Uid of `layout`, registering it on first use.
    pub fn vertex_layout_uid(&self, layout: &VertexLayout) -> u32 {
        self.layouts.unique_id(layout)
    }

    /// The layout registered under `uid`.
    pub fn vertex_layout(&self, uid: u32) -> Option<VertexLayout> {
        self.layouts.get(uid)
    }

    // --- Vertex buffers ---

    /// Creates a vertex buffer.
    pub fn create_vertex_buffer(
        &self,
        desc: &VertexBufferDescriptor,
    ) -> Result<HVertexBuffer, ResourceError> {
        let handle = self.backend.create_vertex_buffer(desc)?;
        log::debug!("Created vertex buffer {handle:?} ({} bytes)", desc.size);
        Ok(handle)
    }

    /// Deletes a vertex buffer now or once in-flight frames completed.
    pub fn delete_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if force_immediate {
            self.backend.delete_vertex_buffer(handle)
        } else {
            self.schedule(handle.is_valid(), ScheduledResource::VertexBuffer(handle))
        }
    }

    /// Overwrites part of a vertex buffer.
    pub fn update_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        data: &[u8],
        offset: u32,
    ) -> Result<(), ResourceError> {
        self.backend.update_vertex_buffer(handle, data, offset)
    }

    /// Maps `size` bytes at `offset`.
    pub fn map_vertex_buffer(
        &self,
        handle: HVertexBuffer,
        offset: u32,
        size: u32,
    ) -> Result<Mapping<'_>, ResourceError> {
        let data = self.backend.map_vertex_buffer(handle, offset, size)?;
        Ok(self.mapping(MapTarget::VertexBuffer(handle), data))
    }

    /// Whether the buffer must be refilled after a device loss.
    pub fn vertex_buffer_need_restore(&self, handle: HVertexBuffer) -> Result<bool, ResourceError> {
        self.backend.vertex_buffer_need_restore(handle)
    }

    // --- Index buffers ---

    /// Creates an index buffer.
    pub fn create_index_buffer(
        &self,
        desc: &IndexBufferDescriptor,
    ) -> Result<HIndexBuffer, ResourceError> {
        let handle = self.backend.create_index_buffer(desc)?;
        log::debug!("Created index buffer {handle:?} ({} bytes)", desc.size);
        Ok(handle)
    }

    /// Deletes an index buffer now or once in-flight frames completed.
    pub fn delete_index_buffer(
        &self,
        handle: HIndexBuffer,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if force_immediate {
            self.backend.delete_index_buffer(handle)
        } else {
            self.schedule(handle.is_valid(), ScheduledResource::IndexBuffer(handle))
        }
    }

    /// Overwrites part of an index buffer.
    pub fn update_index_buffer(
        &self,
        handle: HIndexBuffer,
        data: &[u8],
        offset: u32,
    ) -> Result<(), ResourceError> {
        self.backend.update_index_buffer(handle, data, offset)
    }

    /// Maps `size` bytes at `offset`.
    pub fn map_index_buffer(
        &self,
        handle: HIndexBuffer,
        offset: u32,
        size: u32,
    ) -> Result<Mapping<'_>, ResourceError> {
        let data = self.backend.map_index_buffer(handle, offset, size)?;
        Ok(self.mapping(MapTarget::IndexBuffer(handle), data))
    }

    /// Whether the buffer must be refilled after a device loss.
    pub fn index_buffer_need_restore(&self, handle: HIndexBuffer) -> Result<bool, ResourceError> {
        self.backend.index_buffer_need_restore(handle)
    }

    // --- Queries ---

    /// Creates an occlusion query buffer.
    pub fn create_query_buffer(
        &self,
        max_object_count: u32,
    ) -> Result<HQueryBuffer, ResourceError> {
        self.backend.create_query_buffer(max_object_count)
    }

    /// Clears a query buffer.
    pub fn reset_query_buffer(&self, handle: HQueryBuffer) -> Result<(), ResourceError> {
        self.backend.reset_query_buffer(handle)
    }

    /// Deletes a query buffer now or once in-flight frames completed.
    pub fn delete_query_buffer(
        &self,
        handle: HQueryBuffer,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if force_immediate {
            self.backend.delete_query_buffer(handle)
        } else {
            self.schedule(handle.is_valid(), ScheduledResource::QueryBuffer(handle))
        }
    }

    /// Whether every used slot has a result.
    pub fn query_buffer_is_ready(&self, handle: HQueryBuffer) -> Result<bool, ResourceError> {
        self.backend.query_buffer_is_ready(handle)
    }

    /// Whether slot `index` has a result.
    pub fn query_is_ready(&self, handle: HQueryBuffer, index: u32) -> Result<bool, ResourceError> {
        self.backend.query_is_ready(handle, index)
    }

    /// Result of slot `index`.
    pub fn query_value(&self, handle: HQueryBuffer, index: u32) -> Result<u32, ResourceError> {
        self.backend.query_value(handle, index)
    }

    /// Creates a timestamp query set.
    pub fn create_perf_query_set(
        &self,
        max_timestamp_count: u32,
    ) -> Result<HPerfQuerySet, ResourceError> {
        self.backend.create_perf_query_set(max_timestamp_count)
    }

    /// Clears a timestamp query set.
    pub fn reset_perf_query_set(&self, handle: HPerfQuerySet) -> Result<(), ResourceError> {
        self.backend.reset_perf_query_set(handle)
    }

    /// Deletes a timestamp query set.
    pub fn delete_perf_query_set(&self, handle: HPerfQuerySet) -> Result<(), ResourceError> {
        self.backend.delete_perf_query_set(handle)
    }

    /// Whether the set's frame has executed.
    pub fn perf_query_set_is_ready(&self, handle: HPerfQuerySet) -> Result<bool, ResourceError> {
        self.backend.perf_query_set_is_ready(handle)
    }

    /// Ticks per second of timestamps.
    pub fn perf_query_frequency(&self) -> u64 {
        self.backend.perf_query_frequency()
    }

    /// Timestamp `index` of a set.
    pub fn perf_query_timestamp(
        &self,
        handle: HPerfQuerySet,
        index: u32,
    ) -> Result<Option<u64>, ResourceError> {
        self.backend.perf_query_timestamp(handle, index)
    }

    /// Frame begin and end timestamps of a set.
    pub fn perf_query_frame_timestamps(
        &self,
        handle: HPerfQuerySet,
    ) -> Result<Option<(u64, u64)>, ResourceError> {
        self.backend.perf_query_frame_timestamps(handle)
    }

    // --- Textures ---

    /// Creates a texture.
    pub fn create_texture(&self, desc: &TextureDescriptor) -> Result<HTexture, ResourceError> {
        let handle = self.backend.create_texture(desc)?;
        log::debug!(
            "Created texture {handle:?} ({}x{} {:?}, {} levels)",
            desc.width,
            desc.height,
            desc.format,
            desc.level_count
        );
        Ok(handle)
    }

    /// Deletes a texture now or once in-flight frames completed.
    pub fn delete_texture(
        &self,
        handle: HTexture,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if force_immediate {
            self.backend.delete_texture(handle)
        } else {
            self.schedule(handle.is_valid(), ScheduledResource::Texture(handle))
        }
    }

    /// Maps mip `level`.
    pub fn map_texture(&self, handle: HTexture, level: u32) -> Result<Mapping<'_>, ResourceError> {
        let data = self.backend.map_texture(handle, level)?;
        Ok(self.mapping(MapTarget::Texture(handle), data))
    }

    /// Replaces one level of one face.
    pub fn update_texture(
        &self,
        handle: HTexture,
        data: &[u8],
        level: u32,
        face: TextureFace,
    ) -> Result<(), ResourceError> {
        self.backend.update_texture(handle, data, level, face)
    }

    /// Whether the texture must be refilled after a device loss.
    pub fn texture_need_restore(&self, handle: HTexture) -> Result<bool, ResourceError> {
        self.backend.texture_need_restore(handle)
    }

    // --- Texture sets ---

    /// Returns the texture set binding `desc`, sharing an existing one when possible.
    pub fn acquire_texture_set(
        &self,
        desc: &TextureSetDescriptor,
    ) -> Result<HTextureSet, ResourceError> {
        utils::lock(&self.texture_sets).acquire(desc)
    }

    /// Adds a reference to a texture set.
    pub fn copy_texture_set(&self, handle: HTextureSet) -> Result<HTextureSet, ResourceError> {
        utils::lock(&self.texture_sets).copy(handle)
    }

    /// Drops a reference; the last one frees the set now or once in-flight frames completed.
    pub fn release_texture_set(
        &self,
        handle: HTextureSet,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if !handle.is_valid() {
            return Ok(());
        }
        let released = utils::lock(&self.texture_sets).release(handle)?;
        if !released {
            return Ok(());
        }
        if force_immediate {
            utils::lock(&self.texture_sets).free_slot(handle)
        } else {
            self.schedule(true, ScheduledResource::TextureSet(handle))
        }
    }

    /// Swaps `old` for `new` in every texture set.
    pub fn replace_texture_in_all_texture_sets(&self, old: HTexture, new: HTexture) {
        utils::lock(&self.texture_sets).replace_texture_in_all(old, new);
    }

    // --- Pipeline states and const buffers ---

    /// Creates a pipeline state, resolving its programs from the shader cache.
    pub fn acquire_render_pipeline_state(
        &self,
        desc: &PipelineStateDescriptor,
    ) -> Result<HPipelineState, ResourceError> {
        let vprog = self.shaders.program(&desc.vprog_uid, ProgType::Vertex)?;
        let fprog = self.shaders.program(&desc.fprog_uid, ProgType::Fragment)?;
        let handle = self.backend.create_pipeline_state(desc, vprog, fprog)?;
        log::debug!(
            "Created pipeline state {handle:?} ({} + {})",
            desc.vprog_uid,
            desc.fprog_uid
        );
        Ok(handle)
    }

    /// Releases a pipeline state now or once in-flight frames completed.
    pub fn release_render_pipeline_state(
        &self,
        handle: HPipelineState,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if !handle.is_valid() {
            return Ok(());
        }
        if force_immediate {
            self.backend.delete_pipeline_state(handle)
        } else {
            self.schedule(handle.is_valid(), ScheduledResource::PipelineState(handle))
        }
    }

    /// Creates const buffer `index` of the pipeline's vertex program.
    pub fn create_vertex_const_buffer(
        &self,
        pipeline: HPipelineState,
        index: u32,
    ) -> Result<HConstBuffer, ResourceError> {
        self.backend.create_vertex_const_buffer(pipeline, index)
    }

    /// Creates every const buffer of the pipeline's vertex program, in index order.
    pub fn create_vertex_const_buffers(
        &self,
        pipeline: HPipelineState,
    ) -> Result<Vec<HConstBuffer>, ResourceError> {
        let count = self.backend.pipeline_const_buffer_count(pipeline, ProgType::Vertex)?;
        (0..count)
            .map(|i| self.backend.create_vertex_const_buffer(pipeline, i))
            .collect()
    }

    /// Creates const buffer `index` of the pipeline's fragment program.
    pub fn create_fragment_const_buffer(
        &self,
        pipeline: HPipelineState,
        index: u32,
    ) -> Result<HConstBuffer, ResourceError> {
        self.backend.create_fragment_const_buffer(pipeline, index)
    }

    /// Creates every const buffer of the pipeline's fragment program, in index order.
    pub fn create_fragment_const_buffers(
        &self,
        pipeline: HPipelineState,
    ) -> Result<Vec<HConstBuffer>, ResourceError> {
        let count = self.backend.pipeline_const_buffer_count(pipeline, ProgType::Fragment)?;
        (0..count)
            .map(|i| self.backend.create_fragment_const_buffer(pipeline, i))
            .collect()
    }

    /// Writes float4 registers starting at `const_index`.
    pub fn update_const_buffer_4fv(
        &self,
        handle: HConstBuffer,
        const_index: u32,
        data: &[f32],
    ) -> Result<(), ResourceError> {
        self.backend.update_const_buffer_4fv(handle, const_index, data)
    }

    /// Writes floats starting at component `const_sub_index` of register `const_index`.
    pub fn update_const_buffer_1fv(
        &self,
        handle: HConstBuffer,
        const_index: u32,
        const_sub_index: u32,
        data: &[f32],
    ) -> Result<(), ResourceError> {
        self.backend
            .update_const_buffer_1fv(handle, const_index, const_sub_index, data)
    }

    /// Deletes a const buffer now or once in-flight frames completed.
    pub fn delete_const_buffer(
        &self,
        handle: HConstBuffer,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if force_immediate {
            self.backend.delete_const_buffer(handle)
        } else {
            self.schedule(handle.is_valid(), ScheduledResource::ConstBuffer(handle))
        }
    }

    // --- Depth-stencil and sampler states ---

    /// Returns the depth-stencil state for `desc`, sharing an existing one when possible.
    pub fn acquire_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDescriptor,
    ) -> Result<HDepthStencilState, ResourceError> {
        utils::lock(&self.depth_stencil_states)
            .acquire(desc, |d| self.backend.create_depth_stencil_state(d))
    }

    /// Adds a reference to a depth-stencil state.
    pub fn copy_depth_stencil_state(
        &self,
        handle: HDepthStencilState,
    ) -> Result<HDepthStencilState, ResourceError> {
        utils::lock(&self.depth_stencil_states).add_ref(handle)
    }

    /// Drops a reference; the last one deletes the state.
    pub fn release_depth_stencil_state(
        &self,
        handle: HDepthStencilState,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if !handle.is_valid() {
            return Ok(());
        }
        let released = utils::lock(&self.depth_stencil_states).release(handle)?;
        match (released, force_immediate) {
            (None, _) => Ok(()),
            (Some(_), true) => self.backend.delete_depth_stencil_state(handle),
            (Some(_), false) => self.schedule(true, ScheduledResource::DepthStencilState(handle)),
        }
    }

    /// Returns the sampler state for `desc`, sharing an existing one when possible.
    pub fn acquire_sampler_state(
        &self,
        desc: &SamplerStateDescriptor,
    ) -> Result<HSamplerState, ResourceError> {
        if !desc.is_within_limits() {
            return Err(ResourceError::OutOfBounds);
        }
        utils::lock(&self.sampler_states).acquire(desc, |d| self.backend.create_sampler_state(d))
    }

    /// Adds a reference to a sampler state.
    pub fn copy_sampler_state(
        &self,
        handle: HSamplerState,
    ) -> Result<HSamplerState, ResourceError> {
        utils::lock(&self.sampler_states).add_ref(handle)
    }

    /// Drops a reference; the last one deletes the state.
    pub fn release_sampler_state(
        &self,
        handle: HSamplerState,
        force_immediate: bool,
    ) -> Result<(), ResourceError> {
        if !handle.is_valid() {
            return Ok(());
        }
        let released = utils::lock(&self.sampler_states).release(handle)?;
        match (released, force_immediate) {
            (None, _) => Ok(()),
            (Some(_), true) => self.backend.delete_sampler_state(handle),
            (Some(_), false) => self.schedule(true, ScheduledResource::SamplerState(handle)),
        }
    }

    // --- Sync objects ---

    /// Creates an unsignaled sync object.
    pub fn create_sync_object(&self) -> Result<HSyncObject, ResourceError> {
        self.backend.create_sync_object()
    }

    /// Deletes a sync object.
    pub fn delete_sync_object(&self, handle: HSyncObject) -> Result<(), ResourceError> {
        self.backend.delete_sync_object(handle)
    }

    /// Whether the work guarded by `handle` completed.
    pub fn sync_object_signaled(&self, handle: HSyncObject) -> bool {
        self.backend.sync_object_signaled(handle)
    }

    /// The sync object signaled when the current frame completes, created on demand.
    pub fn current_frame_sync_object(&self) -> Result<HSyncObject, ResourceError> {
        let mut deletion = utils::lock(&self.deletion);
        if !deletion.current_sync().is_valid() {
            let sync = self.backend.create_sync_object()?;
            deletion.set_current_sync(sync);
        }
        Ok(deletion.current_sync())
    }

    // --- Command recording ---

    /// Opens the recording window of a command buffer.
    pub fn begin_command_buffer(&self, cmd: HCommandBuffer) -> Result<(), CommandError> {
        utils::lock(&self.command_buffers).get_mut(cmd)?.begin();
        Ok(())
    }

    /// Seals a command buffer; `sync` is signaled once its frame completed.
    pub fn end_command_buffer(
        &self,
        cmd: HCommandBuffer,
        sync: HSyncObject,
    ) -> Result<(), CommandError> {
        utils::lock(&self.command_buffers).get_mut(cmd)?.end(sync)
    }

    /// Recording state of a command buffer.
    pub fn command_buffer_state(
        &self,
        cmd: HCommandBuffer,
    ) -> Result<RecordingState, ResourceError> {
        Ok(utils::lock(&self.command_buffers).get(cmd)?.state())
    }

    /// Selects the pipeline and the layout of the bound vertex streams.
    pub fn set_pipeline_state(
        &self,
        cmd: HCommandBuffer,
        state: HPipelineState,
        vertex_layout_uid: u32,
    ) -> Result<(), CommandError> {
        self.record(
            cmd,
            Command::SetPipelineState {
                state,
                vertex_layout: vertex_layout_uid,
            },
        )
    }

    /// Sets the culled winding.
    pub fn set_cull_mode(&self, cmd: HCommandBuffer, mode: CullMode) -> Result<(), CommandError> {
        self.record(cmd, Command::SetCullMode(mode))
    }

    /// Sets the scissor rectangle; all zero disables it.
    pub fn set_scissor_rect(
        &self,
        cmd: HCommandBuffer,
        rect: ScissorRect,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetScissorRect(rect))
    }

    /// Sets the viewport.
    pub fn set_viewport(
        &self,
        cmd: HCommandBuffer,
        viewport: Viewport,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetViewport(viewport))
    }

    /// Sets the fill mode.
    pub fn set_fill_mode(&self, cmd: HCommandBuffer, mode: FillMode) -> Result<(), CommandError> {
        self.record(cmd, Command::SetFillMode(mode))
    }

    /// Binds a vertex buffer to `stream`.
    pub fn set_vertex_data(
        &self,
        cmd: HCommandBuffer,
        buffer: HVertexBuffer,
        stream: u32,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetVertexData { buffer, stream })
    }

    /// Binds a vertex const buffer, capturing its current contents.
    pub fn set_vertex_const_buffer(
        &self,
        cmd: HCommandBuffer,
        slot: u32,
        buffer: HConstBuffer,
    ) -> Result<(), CommandError> {
        let data = self.backend.const_buffer_snapshot(buffer)?;
        self.record(cmd, Command::SetVertexConstBuffer { slot, buffer, data })
    }

    /// Binds a texture to a vertex unit.
    pub fn set_vertex_texture(
        &self,
        cmd: HCommandBuffer,
        unit: u32,
        texture: HTexture,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetVertexTexture { unit, texture })
    }

    /// Binds the index buffer.
    pub fn set_indices(
        &self,
        cmd: HCommandBuffer,
        buffer: HIndexBuffer,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetIndices(buffer))
    }

    /// Selects the occlusion query buffer.
    pub fn set_query_buffer(
        &self,
        cmd: HCommandBuffer,
        buffer: HQueryBuffer,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetQueryBuffer(buffer))
    }

    /// Selects the occlusion query slot.
    pub fn set_query_index(&self, cmd: HCommandBuffer, index: u32) -> Result<(), CommandError> {
        self.record(cmd, Command::SetQueryIndex(index))
    }

    /// Writes a timestamp into slot `index` of `set`.
    pub fn issue_timestamp_query(
        &self,
        cmd: HCommandBuffer,
        set: HPerfQuerySet,
        index: u32,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::IssueTimestampQuery { set, index })
    }

    /// Binds a fragment const buffer, capturing its current contents.
    pub fn set_fragment_const_buffer(
        &self,
        cmd: HCommandBuffer,
        slot: u32,
        buffer: HConstBuffer,
    ) -> Result<(), CommandError> {
        let data = self.backend.const_buffer_snapshot(buffer)?;
        self.record(cmd, Command::SetFragmentConstBuffer { slot, buffer, data })
    }

    /// Binds a texture to a fragment unit.
    pub fn set_fragment_texture(
        &self,
        cmd: HCommandBuffer,
        unit: u32,
        texture: HTexture,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetFragmentTexture { unit, texture })
    }

    /// Selects the depth-stencil state.
    pub fn set_depth_stencil_state(
        &self,
        cmd: HCommandBuffer,
        state: HDepthStencilState,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetDepthStencilState(state))
    }

    /// Selects the sampler state.
    pub fn set_sampler_state(
        &self,
        cmd: HCommandBuffer,
        state: HSamplerState,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::SetSamplerState(state))
    }

    /// Draws `count` primitives from the bound vertex streams.
    pub fn draw_primitive(
        &self,
        cmd: HCommandBuffer,
        primitive: PrimitiveType,
        count: u32,
    ) -> Result<(), CommandError> {
        self.record(cmd, Command::Draw(DrawCall::Primitive { primitive, count }))
    }

    /// Draws `count` primitives through the bound index buffer.
    pub fn draw_indexed_primitive(
        &self,
        cmd: HCommandBuffer,
        primitive: PrimitiveType,
        count: u32,
        vertex_count: u32,
        first_vertex: u32,
        start_index: u32,
    ) -> Result<(), CommandError> {
        self.record(
            cmd,
            Command::Draw(DrawCall::Indexed {
                primitive,
                count,
                vertex_count,
                first_vertex,
                start_index,
            }),
        )
    }

    /// Draws `instance_count` instances of `count` primitives.
    pub fn draw_instanced_primitive(
        &self,
        cmd: HCommandBuffer,
        primitive: PrimitiveType,
        instance_count: u32,
        count: u32,
    ) -> Result<(), CommandError> {
        self.record(
            cmd,
            Command::Draw(DrawCall::Instanced {
                primitive,
                instance_count,
                count,
            }),
        )
    }

    /// Draws `instance_count` instances through the bound index buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_instanced_indexed_primitive(
        &self,
        cmd: HCommandBuffer,
        primitive: PrimitiveType,
        instance_count: u32,
        count: u32,
        vertex_count: u32,
        first_vertex: u32,
        start_index: u32,
        base_instance: u32,
    ) -> Result<(), CommandError> {
        self.record(
            cmd,
            Command::Draw(DrawCall::InstancedIndexed {
                primitive,
                instance_count,
                count,
                vertex_count,
                first_vertex,
                start_index,
                base_instance,
            }),
        )
    }

    /// Inserts a debug marker.
    pub fn set_marker(&self, cmd: HCommandBuffer, text: &str) -> Result<(), CommandError> {
        self.record(cmd, Command::SetMarker(text.to_owned()))
    }

    // --- Render passes ---

    /// Allocates a pass with `count` command buffers.
    ///
    /// The first buffer performs the clears of the pass and the last one its
    /// store actions.
    pub fn allocate_render_pass(
        &self,
        config: &RenderPassConfig,
        count: u32,
    ) -> Result<(HRenderPass, Vec<HCommandBuffer>), ResourceError> {
        validate_command_buffer_count(count)?;
        let config = Arc::new(*config);

        let mut passes = utils::lock(&self.passes);
        let mut buffers = utils::lock(&self.command_buffers);
        let mut handles = Vec::with_capacity(count as usize);
        for i in 0..count {
            let buffer = CommandBuffer::for_pass(Arc::clone(&config), i == 0, i + 1 == count);
            match buffers.alloc(buffer) {
                Ok(h) => handles.push(h),
                Err(e) => {
                    for h in handles {
                        let _ = buffers.free(h);
                    }
                    return Err(e);
                }
            }
        }

        match passes.alloc(RenderPass::new(config, handles.clone())) {
            Ok(pass) => Ok((pass, handles)),
            Err(e) => {
                for h in handles {
                    let _ = buffers.free(h);
                }
                Err(e)
            }
        }
    }

    /// Allocates a pass whose command buffers are driven through packet lists.
    pub fn allocate_render_pass_with_packet_lists(
        &self,
        config: &RenderPassConfig,
        count: u32,
    ) -> Result<(HRenderPass, Vec<HPacketList>), ResourceError> {
        let (pass, buffers) = self.allocate_render_pass(config, count)?;
        let pass_config = Arc::new(*config);
        let mut lists = utils::lock(&self.packet_lists);
        let mut handles = Vec::with_capacity(buffers.len());
        for (i, cmd) in buffers.into_iter().enumerate() {
            match lists.alloc(PacketList::new(cmd, Arc::clone(&pass_config), i == 0)) {
                Ok(h) => handles.push(h),
                Err(e) => {
                    for h in handles {
                        let _ = lists.free(h);
                    }
                    drop(lists);
                    self.discard_render_pass(pass);
                    return Err(e);
                }
            }
        }
        Ok((pass, handles))
    }

    /// Queues a pass into the current frame.
    pub fn begin_render_pass(&self, pass: HRenderPass) -> Result<(), CommandError> {
        utils::lock(&self.passes).get_mut(pass)?.begin()?;
        utils::lock(&self.frame).add_pass(pass);
        Ok(())
    }

    /// Closes a pass.
    pub fn end_render_pass(&self, pass: HRenderPass) -> Result<(), CommandError> {
        utils::lock(&self.passes).get_mut(pass)?.end()
    }

    // --- Packet lists ---

    /// Begins the command buffer of a packet list with the default states.
    pub fn begin_packet_list(&self, list: HPacketList) -> Result<(), CommandError> {
        let (ds, ss) = self.default_states()?;
        let mut lists = utils::lock(&self.packet_lists);
        let list = lists.get_mut(list)?;
        let cmd = list.command_buffer();
        let mut buffers = utils::lock(&self.command_buffers);
        list.begin(buffers.get_mut(cmd)?, ds, ss)
    }

    /// Records `packets`, skipping state that is already bound.
    pub fn add_packets(&self, list: HPacketList, packets: &[Packet]) -> Result<(), CommandError> {
        let resolver = Resolver {
            backend: self.backend.as_ref(),
            texture_sets: &self.texture_sets,
        };
        let mut lists = utils::lock(&self.packet_lists);
        let list = lists.get_mut(list)?;
        let cmd = list.command_buffer();
        let mut buffers = utils::lock(&self.command_buffers);
        list.add_packets(buffers.get_mut(cmd)?, packets, &resolver)
    }

    /// Records one packet.
    pub fn add_packet(&self, list: HPacketList, packet: &Packet) -> Result<(), CommandError> {
        self.add_packets(list, std::slice::from_ref(packet))
    }

    /// Seals the list's command buffer and releases the list.
    pub fn end_packet_list(
        &self,
        list: HPacketList,
        sync: HSyncObject,
    ) -> Result<(), CommandError> {
        let mut lists = utils::lock(&self.packet_lists);
        let cmd = lists.get(list)?.command_buffer();
        utils::lock(&self.command_buffers).get_mut(cmd)?.end(sync)?;
        lists.free(list)?;
        Ok(())
    }

    // --- Frames ---

    /// Attaches a timestamp query set to the frame being built.
    pub fn set_frame_perf_query_set(&self, set: HPerfQuerySet) {
        utils::lock(&self.frame).set_perf_query_set(set);
    }

    /// Number of the frame being built.
    pub fn frame_number(&self) -> u64 {
        utils::lock(&self.frame).number()
    }

    /// Submits the current frame and starts the next one.
    ///
    /// Ended passes are moved out of the device with their command buffers
    /// and executed in ascending priority order; while rendering is
    /// suspended the frame is rejected instead. Resources whose deletion was
    /// scheduled are destroyed once the frames that could use them completed.
    pub fn present(&self) -> Result<(), RenderError> {
        let sync = {
            let mut deletion = utils::lock(&self.deletion);
            if deletion.needs_frame_sync() {
                let sync = self.backend.create_sync_object()?;
                deletion.set_current_sync(sync);
            }
            deletion.current_sync()
        };

        let (number, pass_handles, perf_query_set) = utils::lock(&self.frame).finish();
        let (passes, dropped) = self.collect_passes(&pass_handles);
        if !dropped.is_empty() {
            // Dropped work never executes: release anyone waiting on its syncs.
            let dropped =
                FrameSubmission::new(number, dropped, HSyncObject::INVALID, HPerfQuerySet::INVALID);
            self.backend.reject_frame(&dropped);
        }
        let frame = FrameSubmission::new(number, passes, sync, perf_query_set);

        let result = if self.is_suspended() {
            self.executor.reject(frame);
            Ok(())
        } else {
            self.executor.submit(frame)
        };

        let (stale, ready) = {
            let mut deletion = utils::lock(&self.deletion);
            let stale = deletion.advance();
            let ready = deletion.take_signaled(|s| self.backend.sync_object_signaled(s));
            (stale, ready)
        };
        if let Some(stale) = stale {
            if let Err(e) = self.backend.delete_sync_object(stale) {
                log::warn!("Failed to delete frame sync object {stale:?}: {e}");
            }
        }
        for resource in ready {
            self.destroy(resource);
        }

        result
    }

    /// Blocks until every submitted frame has executed.
    pub fn flush(&self) -> Result<(), RenderError> {
        self.executor.flush()
    }

    /// Counters of executed and rejected frames.
    pub fn frame_stats(&self) -> FrameStats {
        self.executor.stats()
    }

    /// Number of resources waiting for deletion.
    pub fn pending_deletion_count(&self) -> usize {
        utils::lock(&self.deletion).pending_count()
    }

    // --- Internals ---

    fn record(&self, cmd: HCommandBuffer, command: Command) -> Result<(), CommandError> {
        utils::lock(&self.command_buffers).get_mut(cmd)?.record(command)
    }

    fn mapping(&self, target: MapTarget, data: Vec<u8>) -> Mapping<'_> {
        Mapping {
            rhi: self,
            target,
            data,
            unmapped: false,
        }
    }

    fn write_back(&self, target: MapTarget, data: &[u8]) -> Result<(), ResourceError> {
        match target {
            MapTarget::VertexBuffer(h) => self.backend.unmap_vertex_buffer(h, data),
            MapTarget::IndexBuffer(h) => self.backend.unmap_index_buffer(h, data),
            MapTarget::Texture(h) => self.backend.unmap_texture(h, data),
        }
    }

    fn schedule(&self, valid: bool, resource: ScheduledResource) -> Result<(), ResourceError> {
        if !valid {
            return Err(ResourceError::InvalidHandle);
        }
        utils::lock(&self.deletion).schedule(resource);
        Ok(())
    }

    fn destroy(&self, resource: ScheduledResource) {
        let result = match resource {
            ScheduledResource::VertexBuffer(h) => self.backend.delete_vertex_buffer(h),
            ScheduledResource::IndexBuffer(h) => self.backend.delete_index_buffer(h),
            ScheduledResource::Texture(h) => self.backend.delete_texture(h),
            ScheduledResource::QueryBuffer(h) => self.backend.delete_query_buffer(h),
            ScheduledResource::ConstBuffer(h) => self.backend.delete_const_buffer(h),
            ScheduledResource::PipelineState(h) => self.backend.delete_pipeline_state(h),
            ScheduledResource::DepthStencilState(h) => self.backend.delete_depth_stencil_state(h),
            ScheduledResource::SamplerState(h) => self.backend.delete_sampler_state(h),
            ScheduledResource::TextureSet(h) => utils::lock(&self.texture_sets).free_slot(h),
        };
        match result {
            Ok(()) => log::trace!("Deleted {resource:?}"),
            Err(e) => log::warn!("Scheduled deletion of {resource:?} failed: {e}"),
        }
    }

    fn discard_render_pass(&self, pass: HRenderPass) {
        let mut passes = utils::lock(&self.passes);
        let mut buffers = utils::lock(&self.command_buffers);
        if let Ok(pass) = passes.free(pass) {
            for &cmd in pass.command_buffers() {
                let _ = buffers.free(cmd);
            }
        }
    }

    fn default_states(&self) -> Result<(HDepthStencilState, HSamplerState), ResourceError> {
        let mut defaults = utils::lock(&self.default_states);
        if let Some(states) = *defaults {
            return Ok(states);
        }
        let ds = self
            .backend
            .create_depth_stencil_state(&DepthStencilStateDescriptor::default())?;
        let ss = match self
            .backend
            .create_sampler_state(&SamplerStateDescriptor::all_units())
        {
            Ok(ss) => ss,
            Err(e) => {
                let _ = self.backend.delete_depth_stencil_state(ds);
                return Err(e);
            }
        };
        *defaults = Some((ds, ss));
        Ok((ds, ss))
    }

    /// Moves the frame's passes out of the pools. Returns the passes to
    /// submit and the passes dropped for not being ended.
    fn collect_passes(&self, handles: &[HRenderPass]) -> (Vec<SubmittedPass>, Vec<SubmittedPass>) {
        let mut passes = utils::lock(&self.passes);
        let mut buffers = utils::lock(&self.command_buffers);
        let mut submitted = Vec::with_capacity(handles.len());
        let mut dropped = Vec::new();

        for &handle in handles {
            let pass = match passes.free(handle) {
                Ok(pass) => pass,
                Err(e) => {
                    log::warn!("Skipping render pass {handle:?}: {e}");
                    continue;
                }
            };
            let command_buffers: Vec<CommandBuffer> = pass
                .command_buffers()
                .iter()
                .filter_map(|&cmd| buffers.free(cmd).ok())
                .collect();
            let collected = SubmittedPass {
                handle,
                config: Arc::clone(pass.config()),
                command_buffers,
            };

            if pass.state() != PassState::Ended {
                log::warn!("Render pass {handle:?} was not ended, dropping it");
                dropped.push(collected);
                continue;
            }
            if collected
                .command_buffers
                .iter()
                .any(|cb| cb.state() != RecordingState::Ended)
            {
                log::warn!(
                    "Render pass {handle:?} has a command buffer that was not ended, dropping it"
                );
                dropped.push(collected);
                continue;
            }
            submitted.push(collected);
        }
        (submitted, dropped)
    }
}

impl fmt::Debug for Rhi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rhi")
            .field("backend", &self.backend)
            .field("executor", &self.executor)
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

impl Drop for Rhi {
    fn drop(&mut self) {
        if let Err(e) = self.executor.flush() {
            log::error!("Failed to flush pending frames on shutdown: {e}");
        }

        let (pending, syncs) = {
            let mut deletion = utils::lock(&self.deletion);
            (deletion.drain_all(), deletion.take_sync_objects())
        };
        for resource in pending {
            self.destroy(resource);
        }
        for sync in syncs {
            let _ = self.backend.delete_sync_object(sync);
        }
        if let Some((ds, ss)) = utils::lock(&self.default_states).take() {
            let _ = self.backend.delete_depth_stencil_state(ds);
            let _ = self.backend.delete_sampler_state(ss);
        }

        self.backend.uninitialize();
        log::info!("Render device uninitialized.");
    }
}
