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

//! The software device that command buffers are replayed onto.
//!
//! Every native call is validated against the backend's resource tables and
//! appended to a per-frame log, so tests can inspect exactly what a frame did.

use super::device::SoftwareBackend;
use rhi_core::api::{
    CullMode, DepthTarget, FillMode, ProgType, RenderPassConfig, ScissorRect, Viewport,
    MAX_VERTEX_STREAM_COUNT,
};
use rhi_core::command::{ConstSnapshot, DrawCall, NativeDevice, PassClear, ReplayStats};
use rhi_core::handle::{
    HConstBuffer, HDepthStencilState, HIndexBuffer, HPerfQuerySet, HPipelineState, HQueryBuffer,
    HSamplerState, HTexture, HVertexBuffer,
};
use rhi_core::utils;
use rhi_core::vertex_layout::VertexLayout;
use rhi_core::ResourceError;

/// Query slot value that stops occlusion counting.
pub const NO_QUERY_INDEX: u32 = u32::MAX;

/// One call issued to the software device.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    /// A pass was opened.
    BeginPass {
        /// Clears performed.
        clear: PassClear,
        /// First color target, invalid for the backbuffer.
        color_target: HTexture,
    },
    /// A pass was closed.
    EndPass,
    /// A pipeline was applied.
    ApplyPipeline {
        /// The pipeline.
        state: HPipelineState,
        /// Stride of the vertex layout the draws read.
        vertex_stride: u32,
    },
    /// A const buffer was uploaded and bound.
    BindConstBuffer {
        /// Stage.
        stage: ProgType,
        /// Slot.
        slot: u32,
        /// The const buffer.
        buffer: HConstBuffer,
        /// Uploaded registers.
        data: Vec<f32>,
    },
    /// A vertex buffer was bound.
    SetVertexBuffer {
        /// Stream.
        stream: u32,
        /// The buffer.
        buffer: HVertexBuffer,
    },
    /// The index buffer was bound.
    SetIndexBuffer(HIndexBuffer),
    /// A texture was bound.
    SetTexture {
        /// Stage.
        stage: ProgType,
        /// Unit.
        unit: u32,
        /// The texture.
        texture: HTexture,
    },
    /// A depth-stencil state was applied.
    SetDepthStencilState(HDepthStencilState),
    /// A sampler state was applied.
    SetSamplerState(HSamplerState),
    /// The viewport changed.
    SetViewport(Viewport),
    /// The scissor rectangle changed.
    SetScissorRect(ScissorRect),
    /// The culled winding changed.
    SetCullMode(CullMode),
    /// The fill mode changed.
    SetFillMode(FillMode),
    /// The occlusion query buffer changed.
    SetQueryBuffer(HQueryBuffer),
    /// The occlusion query slot changed.
    SetQueryIndex(u32),
    /// A timestamp was written.
    Timestamp {
        /// The set.
        set: HPerfQuerySet,
        /// Slot.
        index: u32,
    },
    /// A draw was issued.
    Draw(DrawCall),
    /// A debug marker was inserted.
    Marker(String),
}

/// Everything an executed frame did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameLog {
    /// Frame number.
    pub number: u64,
    /// Native calls in issue order.
    pub calls: Vec<NativeCall>,
    /// Replay counters.
    pub stats: ReplayStats,
}

impl FrameLog {
    /// The draws of the frame, in order.
    pub fn draws(&self) -> Vec<DrawCall> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                NativeCall::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&NativeCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }
}

fn backend_error(message: &str) -> ResourceError {
    ResourceError::BackendError(message.to_owned())
}

pub(crate) struct SoftwareNativeDevice<'a> {
    backend: &'a SoftwareBackend,
    calls: Vec<NativeCall>,
    layout: Option<VertexLayout>,
    streams: [HVertexBuffer; MAX_VERTEX_STREAM_COUNT],
    index_buffer: HIndexBuffer,
    query_buffer: HQueryBuffer,
    query_index: u32,
    touched_queries: Vec<HQueryBuffer>,
    touched_perf_sets: Vec<HPerfQuerySet>,
}

impl<'a> SoftwareNativeDevice<'a> {
    pub fn new(backend: &'a SoftwareBackend) -> Self {
        Self {
            backend,
            calls: Vec::new(),
            layout: None,
            streams: [HVertexBuffer::INVALID; MAX_VERTEX_STREAM_COUNT],
            index_buffer: HIndexBuffer::INVALID,
            query_buffer: HQueryBuffer::INVALID,
            query_index: NO_QUERY_INDEX,
            touched_queries: Vec::new(),
            touched_perf_sets: Vec::new(),
        }
    }

    /// The call log and the query objects written during the replay.
    pub fn finish(self) -> (Vec<NativeCall>, Vec<HQueryBuffer>, Vec<HPerfQuerySet>) {
        (self.calls, self.touched_queries, self.touched_perf_sets)
    }

    fn check_render_target(&self, texture: HTexture) -> Result<(), ResourceError> {
        let textures = utils::lock(&self.backend.textures);
        if !textures.get(texture)?.is_render_target {
            return Err(backend_error("texture is not a render target"));
        }
        Ok(())
    }

    fn validate_draw(&self, call: &DrawCall) -> Result<(), ResourceError> {
        let stride = self
            .layout
            .as_ref()
            .ok_or_else(|| backend_error("draw without a pipeline state"))?
            .stride();
        if call.instance_count() > 1 && !self.backend.caps.is_instancing_supported {
            return Err(ResourceError::Unsupported("instanced draws".into()));
        }
        if !self.streams[0].is_valid() {
            return Err(backend_error("draw without vertex data on stream 0"));
        }

        let vertex_buffers = utils::lock(&self.backend.vertex_buffers);
        let vertex_bytes = vertex_buffers.get(self.streams[0])?.data.len() as u32;
        let vertex_capacity = vertex_bytes.checked_div(stride).unwrap_or(u32::MAX);
        let element_count = call.element_count().ok_or(ResourceError::OutOfBounds)?;

        match *call {
            DrawCall::Primitive { .. } | DrawCall::Instanced { .. } => {
                if element_count > vertex_capacity {
                    return Err(ResourceError::OutOfBounds);
                }
            }
            DrawCall::Indexed {
                first_vertex,
                start_index,
                ..
            }
            | DrawCall::InstancedIndexed {
                first_vertex,
                start_index,
                ..
            } => {
                if !self.index_buffer.is_valid() {
                    return Err(backend_error("indexed draw without an index buffer"));
                }
                let index_buffers = utils::lock(&self.backend.index_buffers);
                let indices = index_buffers.get(self.index_buffer)?;
                let end = start_index
                    .checked_add(element_count)
                    .ok_or(ResourceError::OutOfBounds)?;
                if end > indices.index_count() {
                    return Err(ResourceError::OutOfBounds);
                }
                for i in start_index..end {
                    let vertex = indices.index(i).ok_or(ResourceError::OutOfBounds)? as u64
                        + first_vertex as u64;
                    if vertex >= vertex_capacity as u64 {
                        return Err(ResourceError::OutOfBounds);
                    }
                }
            }
        }
        Ok(())
    }
}

impl NativeDevice for SoftwareNativeDevice<'_> {
    fn begin_pass(
        &mut self,
        config: &RenderPassConfig,
        clear: &PassClear,
    ) -> Result<(), ResourceError> {
        for cb in &config.color_buffers {
            if cb.texture.is_valid() {
                self.check_render_target(cb.texture)?;
            }
        }
        if let DepthTarget::Texture(depth) = config.depth_stencil_buffer.target {
            self.check_render_target(depth)?;
        }
        self.layout = None;
        self.streams = [HVertexBuffer::INVALID; MAX_VERTEX_STREAM_COUNT];
        self.index_buffer = HIndexBuffer::INVALID;
        self.query_buffer = HQueryBuffer::INVALID;
        self.query_index = NO_QUERY_INDEX;
        self.calls.push(NativeCall::BeginPass {
            clear: *clear,
            color_target: config.color_buffers[0].texture,
        });
        Ok(())
    }

    fn end_pass(&mut self, _config: &RenderPassConfig) -> Result<(), ResourceError> {
        self.calls.push(NativeCall::EndPass);
        Ok(())
    }

    fn apply_pipeline(
        &mut self,
        state: HPipelineState,
        vertex_layout: Option<&VertexLayout>,
    ) -> Result<(), ResourceError> {
        let pipelines = utils::lock(&self.backend.pipelines);
        let pipeline = pipelines.get(state)?;
        let layout = match vertex_layout {
            Some(layout) if !VertexLayout::is_compatible(layout, &pipeline.vertex_layout) => {
                return Err(backend_error("vertex layout does not provide the pipeline's inputs"));
            }
            Some(layout) => layout.clone(),
            None => pipeline.vertex_layout.clone(),
        };
        self.calls.push(NativeCall::ApplyPipeline {
            state,
            vertex_stride: layout.stride(),
        });
        self.layout = Some(layout);
        Ok(())
    }

    fn bind_const_buffer(
        &mut self,
        stage: ProgType,
        slot: u32,
        buffer: HConstBuffer,
        data: &ConstSnapshot,
    ) -> Result<(), ResourceError> {
        if !utils::lock(&self.backend.const_buffers).contains(buffer) {
            return Err(ResourceError::InvalidHandle);
        }
        self.calls.push(NativeCall::BindConstBuffer {
            stage,
            slot,
            buffer,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn set_vertex_buffer(
        &mut self,
        stream: u32,
        buffer: HVertexBuffer,
    ) -> Result<(), ResourceError> {
        let slot = self
            .streams
            .get_mut(stream as usize)
            .ok_or(ResourceError::OutOfBounds)?;
        if buffer.is_valid() && !utils::lock(&self.backend.vertex_buffers).contains(buffer) {
            return Err(ResourceError::InvalidHandle);
        }
        *slot = buffer;
        self.calls.push(NativeCall::SetVertexBuffer { stream, buffer });
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: HIndexBuffer) -> Result<(), ResourceError> {
        if buffer.is_valid() && !utils::lock(&self.backend.index_buffers).contains(buffer) {
            return Err(ResourceError::InvalidHandle);
        }
        self.index_buffer = buffer;
        self.calls.push(NativeCall::SetIndexBuffer(buffer));
        Ok(())
    }

    fn set_texture(
        &mut self,
        stage: ProgType,
        unit: u32,
        texture: HTexture,
    ) -> Result<(), ResourceError> {
        if stage == ProgType::Vertex && !self.backend.caps.is_vertex_texture_units_supported {
            return Err(ResourceError::Unsupported("vertex texture units".into()));
        }
        if texture.is_valid() && !utils::lock(&self.backend.textures).contains(texture) {
            return Err(ResourceError::InvalidHandle);
        }
        self.calls.push(NativeCall::SetTexture { stage, unit, texture });
        Ok(())
    }

    fn set_depth_stencil_state(&mut self, state: HDepthStencilState) -> Result<(), ResourceError> {
        utils::lock(&self.backend.depth_stencil_states).get(state)?;
        self.calls.push(NativeCall::SetDepthStencilState(state));
        Ok(())
    }

    fn set_sampler_state(&mut self, state: HSamplerState) -> Result<(), ResourceError> {
        utils::lock(&self.backend.sampler_states).get(state)?;
        self.calls.push(NativeCall::SetSamplerState(state));
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(NativeCall::SetViewport(viewport));
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.calls.push(NativeCall::SetScissorRect(rect));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.calls.push(NativeCall::SetCullMode(mode));
    }

    fn set_fill_mode(&mut self, mode: FillMode) {
        self.calls.push(NativeCall::SetFillMode(mode));
    }

    fn set_query_buffer(&mut self, buffer: HQueryBuffer) {
        self.query_buffer = buffer;
        self.calls.push(NativeCall::SetQueryBuffer(buffer));
    }

    fn set_query_index(&mut self, index: u32) {
        self.query_index = index;
        self.calls.push(NativeCall::SetQueryIndex(index));
    }

    fn issue_timestamp(&mut self, set: HPerfQuerySet, index: u32) -> Result<(), ResourceError> {
        let now = self.backend.now_us();
        let mut sets = utils::lock(&self.backend.perf_query_sets);
        *sets
            .get_mut(set)?
            .timestamps
            .get_mut(index as usize)
            .ok_or(ResourceError::OutOfBounds)? = Some(now);
        if !self.touched_perf_sets.contains(&set) {
            self.touched_perf_sets.push(set);
        }
        self.calls.push(NativeCall::Timestamp { set, index });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), ResourceError> {
        self.validate_draw(call)?;

        if self.query_buffer.is_valid() && self.query_index != NO_QUERY_INDEX {
            let samples = call.primitive_count().saturating_mul(call.instance_count());
            utils::lock(&self.backend.query_buffers)
                .get_mut(self.query_buffer)?
                .add(self.query_index, samples)?;
            if !self.touched_queries.contains(&self.query_buffer) {
                self.touched_queries.push(self.query_buffer);
            }
        }

        self.calls.push(NativeCall::Draw(*call));
        Ok(())
    }

    fn marker(&mut self, text: &str) {
        self.calls.push(NativeCall::Marker(text.to_owned()));
    }
}
