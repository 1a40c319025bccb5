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

//! Packet lists: a batch drawer turning draw packets into commands.
//!
//! A packet describes one draw with every binding it needs. The list
//! remembers what the command buffer already has bound and only records the
//! state that changed between consecutive packets.

use crate::api::{
    CullMode, FillMode, PrimitiveType, RenderPassConfig, ScissorRect, TextureSetDescriptor,
    MAX_CONST_BUFFER_COUNT, MAX_VERTEX_STREAM_COUNT,
};
use crate::command::{Command, CommandBuffer, ConstSnapshot, DrawCall};
use crate::error::{CommandError, ResourceError};
use crate::handle::{
    HCommandBuffer, HConstBuffer, HDepthStencilState, HIndexBuffer, HPipelineState,
    HSamplerState, HTextureSet, HVertexBuffer,
};
use crate::vertex_layout::VertexLayoutRegistry;
use std::sync::Arc;

/// The packet sets its own scissor rectangle.
pub const OPT_OVERRIDE_SCISSOR: u32 = 1 << 0;
/// The packet is drawn in wireframe.
pub const OPT_WIREFRAME: u32 = 1 << 1;

/// One draw with its bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Vertex buffers, one per stream.
    pub vertex_streams: [HVertexBuffer; MAX_VERTEX_STREAM_COUNT],
    /// Number of streams used.
    pub vertex_stream_count: u32,
    /// Value added to each index.
    pub base_vertex: u32,
    /// Number of vertices referenced; required for indexed draws.
    pub vertex_count: u32,
    /// Index buffer, invalid for non-indexed draws.
    pub index_buffer: HIndexBuffer,
    /// Pipeline state.
    pub render_pipeline_state: HPipelineState,
    /// Uid of the layout of the vertex streams, `0` for the pipeline's own.
    pub vertex_layout_uid: u32,
    /// Depth-stencil state, invalid for the device default.
    pub depth_stencil_state: HDepthStencilState,
    /// Sampler state, invalid for the device default.
    pub sampler_state: HSamplerState,
    /// Culled winding.
    pub cull_mode: CullMode,
    /// Scissor rectangle used with [`OPT_OVERRIDE_SCISSOR`].
    pub scissor_rect: ScissorRect,
    /// Vertex stage const buffers.
    pub vertex_const: [HConstBuffer; MAX_CONST_BUFFER_COUNT],
    /// Number of vertex const buffers used.
    pub vertex_const_count: u32,
    /// Fragment stage const buffers.
    pub fragment_const: [HConstBuffer; MAX_CONST_BUFFER_COUNT],
    /// Number of fragment const buffers used.
    pub fragment_const_count: u32,
    /// Texture bindings.
    pub texture_set: HTextureSet,
    /// Topology.
    pub primitive_type: PrimitiveType,
    /// Number of primitives.
    pub primitive_count: u32,
    /// Number of instances, `0` for a non-instanced draw.
    pub instance_count: u32,
    /// Instance id of the first instance.
    pub base_instance: u32,
    /// First index read from the index buffer.
    pub start_index: u32,
    /// Occlusion query slot.
    pub query_index: Option<u32>,
    /// `OPT_*` flags.
    pub options: u32,
    /// Marker inserted before the draw.
    pub debug_marker: Option<String>,
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            vertex_streams: [HVertexBuffer::INVALID; MAX_VERTEX_STREAM_COUNT],
            vertex_stream_count: 0,
            base_vertex: 0,
            vertex_count: 0,
            index_buffer: HIndexBuffer::INVALID,
            render_pipeline_state: HPipelineState::INVALID,
            vertex_layout_uid: VertexLayoutRegistry::INVALID_UID,
            depth_stencil_state: HDepthStencilState::INVALID,
            sampler_state: HSamplerState::INVALID,
            cull_mode: CullMode::None,
            scissor_rect: ScissorRect::default(),
            vertex_const: [HConstBuffer::INVALID; MAX_CONST_BUFFER_COUNT],
            vertex_const_count: 0,
            fragment_const: [HConstBuffer::INVALID; MAX_CONST_BUFFER_COUNT],
            fragment_const_count: 0,
            texture_set: HTextureSet::INVALID,
            primitive_type: PrimitiveType::TriangleList,
            primitive_count: 0,
            instance_count: 0,
            base_instance: 0,
            start_index: 0,
            query_index: None,
            options: 0,
            debug_marker: None,
        }
    }
}

impl Packet {
    /// The draw command the packet produces.
    pub fn draw_call(&self) -> DrawCall {
        let indexed = self.index_buffer.is_valid();
        match (self.instance_count, indexed) {
            (0, false) => DrawCall::Primitive {
                primitive: self.primitive_type,
                count: self.primitive_count,
            },
            (0, true) => DrawCall::Indexed {
                primitive: self.primitive_type,
                count: self.primitive_count,
                vertex_count: self.vertex_count,
                first_vertex: self.base_vertex,
                start_index: self.start_index,
            },
            (instance_count, false) => DrawCall::Instanced {
                primitive: self.primitive_type,
                instance_count,
                count: self.primitive_count,
            },
            (instance_count, true) => DrawCall::InstancedIndexed {
                primitive: self.primitive_type,
                instance_count,
                count: self.primitive_count,
                vertex_count: self.vertex_count,
                first_vertex: self.base_vertex,
                start_index: self.start_index,
                base_instance: self.base_instance,
            },
        }
    }
}

/// Resolves packet references that live outside the command buffer.
pub trait PacketResolver {
    /// Current contents of a const buffer.
    fn const_snapshot(&self, buffer: HConstBuffer) -> Result<ConstSnapshot, ResourceError>;
    /// Bindings of a texture set.
    fn texture_set(&self, set: HTextureSet) -> Result<TextureSetDescriptor, ResourceError>;
}

/// The redundancy filter wrapped around one command buffer of a pass.
#[derive(Debug, Clone)]
pub struct PacketList {
    command_buffer: HCommandBuffer,
    pass_config: Arc<RenderPassConfig>,
    set_pass_viewport: bool,

    default_depth_stencil: HDepthStencilState,
    default_sampler: HSamplerState,

    cur_pipeline: HPipelineState,
    cur_vertex_layout: u32,
    cur_texture_set: HTextureSet,
    cur_sampler: HSamplerState,
    cur_depth_stencil: HDepthStencilState,
    cur_cull_mode: CullMode,

    restore_default_scissor: bool,
    restore_solid_fill: bool,
    batch_index: u32,
}

impl PacketList {
    /// Wraps `command_buffer`; the first list of a pass sets the pass viewport.
    pub fn new(
        command_buffer: HCommandBuffer,
        pass_config: Arc<RenderPassConfig>,
        first_in_pass: bool,
    ) -> Self {
        Self {
            command_buffer,
            pass_config,
            set_pass_viewport: first_in_pass,
            default_depth_stencil: HDepthStencilState::INVALID,
            default_sampler: HSamplerState::INVALID,
            cur_pipeline: HPipelineState::INVALID,
            cur_vertex_layout: VertexLayoutRegistry::INVALID_UID,
            cur_texture_set: HTextureSet::INVALID,
            cur_sampler: HSamplerState::INVALID,
            cur_depth_stencil: HDepthStencilState::INVALID,
            cur_cull_mode: CullMode::None,
            restore_default_scissor: false,
            restore_solid_fill: false,
            batch_index: 0,
        }
    }

    /// The wrapped command buffer.
    pub fn command_buffer(&self) -> HCommandBuffer {
        self.command_buffer
    }

    /// Packets added since `begin`.
    pub fn batch_index(&self) -> u32 {
        self.batch_index
    }

    /// Begins `buffer` and records the list's starting state.
    ///
    /// `default_depth_stencil` and `default_sampler` are used by packets that
    /// leave their states invalid.
    pub fn begin(
        &mut self,
        buffer: &mut CommandBuffer,
        default_depth_stencil: HDepthStencilState,
        default_sampler: HSamplerState,
    ) -> Result<(), CommandError> {
        self.default_depth_stencil = default_depth_stencil;
        self.default_sampler = default_sampler;
        self.cur_pipeline = HPipelineState::INVALID;
        self.cur_vertex_layout = VertexLayoutRegistry::INVALID_UID;
        self.cur_texture_set = HTextureSet::INVALID;
        self.restore_default_scissor = false;
        self.restore_solid_fill = false;
        self.batch_index = 0;

        buffer.begin();
        if self.set_pass_viewport {
            buffer.record(Command::SetViewport(self.pass_config.viewport))?;
        }
        buffer.record(Command::SetScissorRect(ScissorRect::default()))?;
        buffer.record(Command::SetDepthStencilState(default_depth_stencil))?;
        self.cur_depth_stencil = default_depth_stencil;
        buffer.record(Command::SetSamplerState(default_sampler))?;
        self.cur_sampler = default_sampler;
        buffer.record(Command::SetCullMode(CullMode::None))?;
        self.cur_cull_mode = CullMode::None;
        buffer.record(Command::SetFillMode(FillMode::Solid))?;
        if self.pass_config.query_buffer.is_valid() {
            buffer.record(Command::SetQueryBuffer(self.pass_config.query_buffer))?;
        }
        Ok(())
    }

    /// Records `packets` into `buffer`, skipping state that is already bound.
    pub fn add_packets(
        &mut self,
        buffer: &mut CommandBuffer,
        packets: &[Packet],
        resolver: &dyn PacketResolver,
    ) -> Result<(), CommandError> {
        for packet in packets {
            self.add_packet(buffer, packet, resolver)?;
        }
        Ok(())
    }

    fn add_packet(
        &mut self,
        buffer: &mut CommandBuffer,
        p: &Packet,
        resolver: &dyn PacketResolver,
    ) -> Result<(), CommandError> {
        let ds_state = if p.depth_stencil_state.is_valid() {
            p.depth_stencil_state
        } else {
            self.default_depth_stencil
        };
        let sampler_state = if p.sampler_state.is_valid() {
            p.sampler_state
        } else {
            self.default_sampler
        };

        if p.render_pipeline_state != self.cur_pipeline
            || p.vertex_layout_uid != self.cur_vertex_layout
        {
            buffer.record(Command::SetPipelineState {
                state: p.render_pipeline_state,
                vertex_layout: p.vertex_layout_uid,
            })?;
            self.cur_pipeline = p.render_pipeline_state;
            self.cur_vertex_layout = p.vertex_layout_uid;
        }
        if ds_state != self.cur_depth_stencil {
            buffer.record(Command::SetDepthStencilState(ds_state))?;
            self.cur_depth_stencil = ds_state;
        }
        if sampler_state != self.cur_sampler {
            buffer.record(Command::SetSamplerState(sampler_state))?;
            self.cur_sampler = sampler_state;
        }
        if p.cull_mode != self.cur_cull_mode {
            let mode = if self.pass_config.invert_culling {
                p.cull_mode.inverted()
            } else {
                p.cull_mode
            };
            buffer.record(Command::SetCullMode(mode))?;
            self.cur_cull_mode = p.cull_mode;
        }

        let stream_count = (p.vertex_stream_count as usize).min(MAX_VERTEX_STREAM_COUNT);
        for (stream, vb) in p.vertex_streams[..stream_count].iter().enumerate() {
            buffer.record(Command::SetVertexData {
                buffer: *vb,
                stream: stream as u32,
            })?;
        }
        if p.index_buffer.is_valid() {
            buffer.record(Command::SetIndices(p.index_buffer))?;
        }

        let vertex_count = (p.vertex_const_count as usize).min(MAX_CONST_BUFFER_COUNT);
        for (slot, cb) in p.vertex_const[..vertex_count].iter().enumerate() {
            buffer.record(Command::SetVertexConstBuffer {
                slot: slot as u32,
                buffer: *cb,
                data: resolver.const_snapshot(*cb)?,
            })?;
        }
        let fragment_count = (p.fragment_const_count as usize).min(MAX_CONST_BUFFER_COUNT);
        for (slot, cb) in p.fragment_const[..fragment_count].iter().enumerate() {
            buffer.record(Command::SetFragmentConstBuffer {
                slot: slot as u32,
                buffer: *cb,
                data: resolver.const_snapshot(*cb)?,
            })?;
        }

        if p.texture_set != self.cur_texture_set {
            if p.texture_set.is_valid() {
                let set = resolver.texture_set(p.texture_set)?;
                for (unit, texture) in set.fragment_textures.iter().enumerate() {
                    buffer.record(Command::SetFragmentTexture {
                        unit: unit as u32,
                        texture: *texture,
                    })?;
                }
                for (unit, texture) in set.vertex_textures.iter().enumerate() {
                    buffer.record(Command::SetVertexTexture {
                        unit: unit as u32,
                        texture: *texture,
                    })?;
                }
            }
            self.cur_texture_set = p.texture_set;
        }

        if p.options & OPT_OVERRIDE_SCISSOR != 0 {
            buffer.record(Command::SetScissorRect(p.scissor_rect))?;
            self.restore_default_scissor = true;
        } else if self.restore_default_scissor {
            buffer.record(Command::SetScissorRect(ScissorRect::default()))?;
            self.restore_default_scissor = false;
        }

        if p.options & OPT_WIREFRAME != 0 {
            buffer.record(Command::SetFillMode(FillMode::Wireframe))?;
            self.restore_solid_fill = true;
        } else if self.restore_solid_fill {
            buffer.record(Command::SetFillMode(FillMode::Solid))?;
            self.restore_solid_fill = false;
        }

        if let Some(index) = p.query_index {
            buffer.record(Command::SetQueryIndex(index))?;
        }
        if let Some(marker) = &p.debug_marker {
            buffer.record(Command::SetMarker(marker.clone()))?;
        }

        let call = p.draw_call();
        if call.is_indexed() && p.vertex_count == 0 {
            log::warn!("Indexed packet {} has no vertex count", self.batch_index);
        }
        buffer.record(Command::Draw(call))?;
        self.batch_index += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{HSyncObject, HTexture, Handle};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeResolver {
        sets: HashMap<HTextureSet, TextureSetDescriptor>,
    }

    impl PacketResolver for FakeResolver {
        fn const_snapshot(&self, _: HConstBuffer) -> Result<ConstSnapshot, ResourceError> {
            Ok(ConstSnapshot::from(vec![1.0; 4]))
        }

        fn texture_set(&self, set: HTextureSet) -> Result<TextureSetDescriptor, ResourceError> {
            self.sets.get(&set).cloned().ok_or(ResourceError::NotFound)
        }
    }

    fn ds(i: u16) -> HDepthStencilState {
        Handle::new(i, 1)
    }

    fn ss(i: u16) -> HSamplerState {
        Handle::new(i, 1)
    }

    fn setup(config: RenderPassConfig) -> (PacketList, CommandBuffer) {
        let config = Arc::new(config);
        let mut list = PacketList::new(Handle::new(0, 1), Arc::clone(&config), true);
        let mut buffer = CommandBuffer::new(config);
        list.begin(&mut buffer, ds(0), ss(0)).unwrap();
        (list, buffer)
    }

    fn packet() -> Packet {
        Packet {
            render_pipeline_state: Handle::new(1, 1),
            primitive_count: 1,
            ..Default::default()
        }
    }

    fn count(buffer: &CommandBuffer, pred: impl Fn(&Command) -> bool) -> usize {
        buffer.commands().iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn test_begin_records_default_state() {
        let (_, buffer) = setup(RenderPassConfig {
            query_buffer: Handle::new(5, 1),
            ..Default::default()
        });

        let commands = buffer.commands();
        assert!(matches!(commands[0], Command::SetViewport(_)));
        assert_eq!(commands[1], Command::SetScissorRect(ScissorRect::default()));
        assert_eq!(commands[2], Command::SetDepthStencilState(ds(0)));
        assert_eq!(commands[3], Command::SetSamplerState(ss(0)));
        assert_eq!(commands[4], Command::SetCullMode(CullMode::None));
        assert_eq!(commands[5], Command::SetFillMode(FillMode::Solid));
        assert_eq!(commands[6], Command::SetQueryBuffer(Handle::new(5, 1)));
    }

    #[test]
    fn test_only_the_first_list_sets_the_viewport() {
        let config = Arc::new(RenderPassConfig::default());
        let mut list = PacketList::new(Handle::new(1, 1), Arc::clone(&config), false);
        let mut buffer = CommandBuffer::new(config);
        list.begin(&mut buffer, ds(0), ss(0)).unwrap();
        assert_eq!(count(&buffer, |c| matches!(c, Command::SetViewport(_))), 0);
    }

    #[test]
    fn test_redundant_state_is_filtered() {
        // --- 1. ARRANGE ---
        let (mut list, mut buffer) = setup(RenderPassConfig::default());
        let start = buffer.len();
        let packets = vec![packet(), packet(), packet()];

        // --- 2. ACT ---
        list.add_packets(&mut buffer, &packets, &FakeResolver::default())
            .unwrap();

        // --- 3. ASSERT ---
        let recorded = &buffer.commands()[start..];
        let pipelines = recorded
            .iter()
            .filter(|c| matches!(c, Command::SetPipelineState { .. }))
            .count();
        let draws = recorded.iter().filter(|c| matches!(c, Command::Draw(_))).count();
        assert_eq!(pipelines, 1, "the same pipeline is set once");
        assert_eq!(draws, 3);
        assert_eq!(recorded.len(), 4);
        assert_eq!(list.batch_index(), 3);
    }

    #[test]
    fn test_default_states_stand_in_for_invalid_ones() {
        let (mut list, mut buffer) = setup(RenderPassConfig::default());
        let start = buffer.len();
        let custom = Packet {
            depth_stencil_state: ds(4),
            ..packet()
        };

        list.add_packets(&mut buffer, &[packet(), custom, packet()], &FakeResolver::default())
            .unwrap();

        let switches: Vec<_> = buffer.commands()[start..]
            .iter()
            .filter_map(|c| match c {
                Command::SetDepthStencilState(h) => Some(*h),
                _ => None,
            })
            .collect();
        assert_eq!(switches, vec![ds(4), ds(0)]);
    }

    #[test]
    fn test_cull_mode_is_inverted_for_inverted_passes() {
        let config = RenderPassConfig {
            invert_culling: true,
            ..Default::default()
        };
        let (mut list, mut buffer) = setup(config);
        let start = buffer.len();
        let cw = Packet {
            cull_mode: CullMode::Cw,
            ..packet()
        };

        list.add_packets(&mut buffer, &[cw.clone(), cw], &FakeResolver::default())
            .unwrap();

        let culls: Vec<_> = buffer.commands()[start..]
            .iter()
            .filter_map(|c| match c {
                Command::SetCullMode(m) => Some(*m),
                _ => None,
            })
            .collect();
        assert_eq!(culls, vec![CullMode::Ccw]);
    }

    #[test]
    fn test_texture_set_is_expanded_once() {
        let set: HTextureSet = Handle::new(2, 1);
        let textures: Vec<HTexture> = vec![Handle::new(0, 1), Handle::new(1, 1)];
        let mut resolver = FakeResolver::default();
        resolver.sets.insert(
            set,
            TextureSetDescriptor {
                fragment_textures: textures,
                vertex_textures: vec![Handle::new(3, 1)],
            },
        );
        let (mut list, mut buffer) = setup(RenderPassConfig::default());
        let textured = Packet {
            texture_set: set,
            ..packet()
        };

        list.add_packets(&mut buffer, &[textured.clone(), textured], &resolver)
            .unwrap();

        assert_eq!(count(&buffer, |c| matches!(c, Command::SetFragmentTexture { .. })), 2);
        assert_eq!(count(&buffer, |c| matches!(c, Command::SetVertexTexture { .. })), 1);
    }

    #[test]
    fn test_scissor_and_wireframe_are_restored() {
        let (mut list, mut buffer) = setup(RenderPassConfig::default());
        let start = buffer.len();
        let special = Packet {
            options: OPT_OVERRIDE_SCISSOR | OPT_WIREFRAME,
            scissor_rect: ScissorRect::new(1, 2, 3, 4),
            ..packet()
        };

        list.add_packets(&mut buffer, &[special, packet(), packet()], &FakeResolver::default())
            .unwrap();

        let recorded = &buffer.commands()[start..];
        let scissors: Vec<_> = recorded
            .iter()
            .filter_map(|c| match c {
                Command::SetScissorRect(r) => Some(*r),
                _ => None,
            })
            .collect();
        let fills: Vec<_> = recorded
            .iter()
            .filter_map(|c| match c {
                Command::SetFillMode(m) => Some(*m),
                _ => None,
            })
            .collect();
        assert_eq!(scissors, vec![ScissorRect::new(1, 2, 3, 4), ScissorRect::default()]);
        assert_eq!(fills, vec![FillMode::Wireframe, FillMode::Solid]);
    }

    #[test]
    fn test_draw_command_follows_instancing_and_indices() {
        let ib: HIndexBuffer = Handle::new(0, 1);
        let indexed = Packet {
            index_buffer: ib,
            vertex_count: 3,
            ..packet()
        };
        let instanced = Packet {
            instance_count: 4,
            ..packet()
        };
        let both = Packet {
            instance_count: 4,
            ..indexed.clone()
        };

        assert!(matches!(packet().draw_call(), DrawCall::Primitive { .. }));
        assert!(matches!(indexed.draw_call(), DrawCall::Indexed { vertex_count: 3, .. }));
        assert!(matches!(instanced.draw_call(), DrawCall::Instanced { instance_count: 4, .. }));
        assert!(matches!(both.draw_call(), DrawCall::InstancedIndexed { .. }));
    }

    #[test]
    fn test_const_buffers_and_streams_are_always_set() {
        let (mut list, mut buffer) = setup(RenderPassConfig::default());
        let p = Packet {
            vertex_stream_count: 1,
            vertex_const_count: 2,
            fragment_const_count: 1,
            ..packet()
        };

        list.add_packets(&mut buffer, &[p.clone(), p], &FakeResolver::default())
            .unwrap();
        buffer.end(HSyncObject::INVALID).unwrap();

        assert_eq!(count(&buffer, |c| matches!(c, Command::SetVertexData { .. })), 2);
        assert_eq!(count(&buffer, |c| matches!(c, Command::SetVertexConstBuffer { .. })), 4);
        assert_eq!(count(&buffer, |c| matches!(c, Command::SetFragmentConstBuffer { .. })), 2);
    }
}
