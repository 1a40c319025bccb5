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

//! Replays a sealed command buffer onto a [`NativeDevice`].
//!
//! Replay is a single forward pass. Pipeline and const buffer bindings are
//! deferred: the `Set*` commands only update a transient bound state, and the
//! native calls are issued right before the next draw. A pipeline change
//! marks every bound const slot dirty, and a slot set several times between
//! two draws is bound once with its last value.

use super::buffer::{CommandBuffer, RecordingState};
use super::op::{Command, ConstSnapshot, DrawCall};
use crate::api::{
    CullMode, DepthTarget, FillMode, LoadAction, ProgType, RenderPassConfig, ScissorRect,
    Viewport, MAX_CONST_BUFFER_COUNT, MAX_RENDER_TARGET_COUNT,
};
use crate::error::{CommandError, RenderError, ResourceError};
use crate::handle::{
    HConstBuffer, HDepthStencilState, HIndexBuffer, HPerfQuerySet, HPipelineState, HQueryBuffer,
    HSamplerState, HTexture, HVertexBuffer,
};
use crate::vertex_layout::{VertexLayout, VertexLayoutRegistry};

/// Clears performed when a pass opens, derived from its load actions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PassClear {
    /// Clear color per attachment, `None` when the attachment is not cleared.
    pub color: [Option<[f32; 4]>; MAX_RENDER_TARGET_COUNT],
    /// Depth clear value.
    pub depth: Option<f32>,
    /// Stencil clear value.
    pub stencil: Option<u32>,
}

impl PassClear {
    /// Computes the clears requested by `config`.
    pub fn from_config(config: &RenderPassConfig) -> Self {
        let mut clear = PassClear::default();
        for (i, cb) in config.color_buffers.iter().enumerate() {
            // Slot 0 without a texture is the backbuffer; other empty slots are unused.
            let attached = i == 0 || cb.texture.is_valid();
            if attached && cb.load_action == LoadAction::Clear {
                clear.color[i] = Some(cb.clear_color);
            }
        }
        let ds = &config.depth_stencil_buffer;
        if ds.target != DepthTarget::None && ds.load_action == LoadAction::Clear {
            clear.depth = Some(ds.clear_depth);
            clear.stencil = Some(ds.clear_stencil);
        }
        clear
    }

    /// `true` when nothing is cleared.
    pub fn is_empty(&self) -> bool {
        self.color.iter().all(Option::is_none) && self.depth.is_none() && self.stencil.is_none()
    }
}

/// The sink of native calls a replay produces.
///
/// Each backend implements it over its own device; failures abort the replay
/// of the current buffer.
pub trait NativeDevice {
    /// Opens a pass, performing `clear`.
    fn begin_pass(
        &mut self,
        config: &RenderPassConfig,
        clear: &PassClear,
    ) -> Result<(), ResourceError>;
    /// Closes a pass, applying its store actions.
    fn end_pass(&mut self, config: &RenderPassConfig) -> Result<(), ResourceError>;
    /// Applies a pipeline state; `vertex_layout` is the layout of the bound
    /// buffers when it differs from the pipeline's.
    fn apply_pipeline(
        &mut self,
        state: HPipelineState,
        vertex_layout: Option<&VertexLayout>,
    ) -> Result<(), ResourceError>;
    /// Uploads and binds a const buffer.
    fn bind_const_buffer(
        &mut self,
        stage: ProgType,
        slot: u32,
        buffer: HConstBuffer,
        data: &ConstSnapshot,
    ) -> Result<(), ResourceError>;
    /// Binds a vertex buffer to a stream.
    fn set_vertex_buffer(
        &mut self,
        stream: u32,
        buffer: HVertexBuffer,
    ) -> Result<(), ResourceError>;
    /// Binds the index buffer.
    fn set_index_buffer(&mut self, buffer: HIndexBuffer) -> Result<(), ResourceError>;
    /// Binds a texture to a unit of `stage`.
    fn set_texture(
        &mut self,
        stage: ProgType,
        unit: u32,
        texture: HTexture,
    ) -> Result<(), ResourceError>;
    /// Applies a depth-stencil state.
    fn set_depth_stencil_state(&mut self, state: HDepthStencilState) -> Result<(), ResourceError>;
    /// Applies a sampler state.
    fn set_sampler_state(&mut self, state: HSamplerState) -> Result<(), ResourceError>;
    /// Sets the viewport; all zero means the full render target.
    fn set_viewport(&mut self, viewport: Viewport);
    /// Sets the scissor rectangle; all zero disables scissoring.
    fn set_scissor_rect(&mut self, rect: ScissorRect);
    /// Sets the culled winding.
    fn set_cull_mode(&mut self, mode: CullMode);
    /// Sets the fill mode.
    fn set_fill_mode(&mut self, mode: FillMode);
    /// Selects the occlusion query buffer.
    fn set_query_buffer(&mut self, buffer: HQueryBuffer);
    /// Selects the occlusion query slot.
    fn set_query_index(&mut self, index: u32);
    /// Writes a timestamp.
    fn issue_timestamp(&mut self, set: HPerfQuerySet, index: u32) -> Result<(), ResourceError>;
    /// Issues one native draw.
    fn draw(&mut self, call: &DrawCall) -> Result<(), ResourceError>;
    /// Inserts a debug marker.
    fn marker(&mut self, text: &str);
}

/// Counters collected while replaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayStats {
    /// Command buffers replayed.
    pub command_buffers: u32,
    /// Commands read.
    pub commands: u32,
    /// Native draws issued.
    pub draws: u32,
    /// Primitives drawn, instances included.
    pub primitives: u64,
    /// Native pipeline applications.
    pub pipeline_applies: u32,
    /// Native const buffer binds.
    pub const_binds: u32,
    /// Native texture binds.
    pub texture_binds: u32,
    /// Native vertex and index buffer binds.
    pub buffer_binds: u32,
    /// Other fixed-function state changes.
    pub state_changes: u32,
}

impl ReplayStats {
    /// Accumulates `other` into `self`.
    pub fn merge(&mut self, other: &ReplayStats) {
        self.command_buffers += other.command_buffers;
        self.commands += other.commands;
        self.draws += other.draws;
        self.primitives += other.primitives;
        self.pipeline_applies += other.pipeline_applies;
        self.const_binds += other.const_binds;
        self.texture_binds += other.texture_binds;
        self.buffer_binds += other.buffer_binds;
        self.state_changes += other.state_changes;
    }
}

#[derive(Debug, Clone)]
struct ConstBinding {
    buffer: HConstBuffer,
    data: ConstSnapshot,
    dirty: bool,
}

/// Transient bindings of one replay.
#[derive(Debug, Default)]
struct BoundState {
    pipeline: Option<(HPipelineState, u32)>,
    pipeline_dirty: bool,
    vertex_consts: [Option<ConstBinding>; MAX_CONST_BUFFER_COUNT],
    fragment_consts: [Option<ConstBinding>; MAX_CONST_BUFFER_COUNT],
}

impl BoundState {
    fn set_pipeline(&mut self, state: HPipelineState, layout: u32) {
        if self.pipeline != Some((state, layout)) {
            self.pipeline = Some((state, layout));
            self.pipeline_dirty = true;
        }
    }

    fn set_const(
        &mut self,
        stage: ProgType,
        slot: u32,
        buffer: HConstBuffer,
        data: &ConstSnapshot,
    ) {
        let slots = match stage {
            ProgType::Vertex => &mut self.vertex_consts,
            ProgType::Fragment => &mut self.fragment_consts,
        };
        slots[slot as usize] = Some(ConstBinding {
            buffer,
            data: data.clone(),
            dirty: true,
        });
    }

    fn flush(
        &mut self,
        device: &mut dyn NativeDevice,
        layouts: &VertexLayoutRegistry,
        stats: &mut ReplayStats,
    ) -> Result<(), RenderError> {
        if self.pipeline_dirty {
            if let Some((state, layout_uid)) = self.pipeline {
                let layout = match layout_uid {
                    VertexLayoutRegistry::INVALID_UID => None,
                    uid => Some(layouts.get(uid).ok_or(ResourceError::NotFound)?),
                };
                device.apply_pipeline(state, layout.as_ref())?;
                stats.pipeline_applies += 1;
                for binding in self
                    .vertex_consts
                    .iter_mut()
                    .chain(self.fragment_consts.iter_mut())
                    .flatten()
                {
                    binding.dirty = true;
                }
            }
            self.pipeline_dirty = false;
        }

        let stages = [
            (ProgType::Vertex, &mut self.vertex_consts),
            (ProgType::Fragment, &mut self.fragment_consts),
        ];
        for (stage, slots) in stages {
            for (slot, binding) in slots.iter_mut().enumerate() {
                if let Some(binding) = binding.as_mut().filter(|b| b.dirty) {
                    device.bind_const_buffer(stage, slot as u32, binding.buffer, &binding.data)?;
                    binding.dirty = false;
                    stats.const_binds += 1;
                }
            }
        }
        Ok(())
    }
}

/// Replays `buffer` onto `device`.
///
/// Every call starts from an empty bound state, so replaying the same buffer
/// twice produces the same native calls.
pub fn replay(
    buffer: &CommandBuffer,
    device: &mut dyn NativeDevice,
    layouts: &VertexLayoutRegistry,
) -> Result<ReplayStats, RenderError> {
    if buffer.state() != RecordingState::Ended {
        return Err(CommandError::NotEnded.into());
    }

    let mut stats = ReplayStats {
        command_buffers: 1,
        ..Default::default()
    };
    let mut bound = BoundState::default();
    let config = buffer.pass_config();

    if buffer.is_first_in_pass() {
        device.begin_pass(config, &PassClear::from_config(config))?;
        if config.query_buffer.is_valid() {
            device.set_query_buffer(config.query_buffer);
        }
    }

    for command in buffer.commands() {
        stats.commands += 1;
        match command {
            Command::SetPipelineState {
                state,
                vertex_layout,
            } => bound.set_pipeline(*state, *vertex_layout),
            Command::SetCullMode(mode) => {
                device.set_cull_mode(*mode);
                stats.state_changes += 1;
            }
            Command::SetScissorRect(rect) => {
                device.set_scissor_rect(*rect);
                stats.state_changes += 1;
            }
            Command::SetViewport(viewport) => {
                device.set_viewport(*viewport);
                stats.state_changes += 1;
            }
            Command::SetFillMode(mode) => {
                device.set_fill_mode(*mode);
                stats.state_changes += 1;
            }
            Command::SetVertexData { buffer, stream } => {
                device.set_vertex_buffer(*stream, *buffer)?;
                stats.buffer_binds += 1;
            }
            Command::SetVertexConstBuffer { slot, buffer, data } => {
                bound.set_const(ProgType::Vertex, *slot, *buffer, data)
            }
            Command::SetFragmentConstBuffer { slot, buffer, data } => {
                bound.set_const(ProgType::Fragment, *slot, *buffer, data)
            }
            Command::SetVertexTexture { unit, texture } => {
                device.set_texture(ProgType::Vertex, *unit, *texture)?;
                stats.texture_binds += 1;
            }
            Command::SetFragmentTexture { unit, texture } => {
                device.set_texture(ProgType::Fragment, *unit, *texture)?;
                stats.texture_binds += 1;
            }
            Command::SetIndices(buffer) => {
                device.set_index_buffer(*buffer)?;
                stats.buffer_binds += 1;
            }
            Command::SetQueryBuffer(buffer) => device.set_query_buffer(*buffer),
            Command::SetQueryIndex(index) => device.set_query_index(*index),
            Command::IssueTimestampQuery { set, index } => device.issue_timestamp(*set, *index)?,
            Command::SetDepthStencilState(state) => {
                device.set_depth_stencil_state(*state)?;
                stats.state_changes += 1;
            }
            Command::SetSamplerState(state) => {
                device.set_sampler_state(*state)?;
                stats.state_changes += 1;
            }
            Command::Draw(call) => {
                bound.flush(device, layouts, &mut stats)?;
                device.draw(call)?;
                stats.draws += 1;
                stats.primitives += call.primitive_count() as u64 * call.instance_count() as u64;
            }
            Command::SetMarker(text) => device.marker(text),
        }
    }

    if buffer.is_last_in_pass() {
        device.end_pass(config)?;
    }

    Ok(stats)
}
