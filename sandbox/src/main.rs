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

//! Spinning-cube smoke program.
//!
//! Drives the render device end to end on the software backend: programs,
//! pipeline, buffers, a const buffer updated every frame, and one packet list
//! per frame. Usage: `rhi-cube [config.json] [frame-count]`.

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use rhi_core::api::{
    Api, CullMode, DepthStencilStateDescriptor, IndexBufferDescriptor, InitParam,
    PipelineStateDescriptor, PrimitiveType, ProgType, RenderPassConfig, VertexBufferDescriptor,
    Viewport,
};
use rhi_core::handle::{
    HConstBuffer, HDepthStencilState, HIndexBuffer, HPipelineState, HSyncObject, HVertexBuffer,
};
use rhi_core::vertex_layout::{VertexDataType, VertexLayout, VertexSemantics};
use rhi_core::{Packet, ProgramSource, Rhi};
use rhi_infra::{BackendKind, InfraBackendSelector};

const DEFAULT_FRAME_COUNT: u32 = 60;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: u32,
}

const CORNERS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

#[rustfmt::skip]
const INDICES: [u16; 36] = [
    0, 2, 1, 0, 3, 2, // back
    4, 5, 6, 4, 6, 7, // front
    0, 1, 5, 0, 5, 4, // bottom
    3, 7, 6, 3, 6, 2, // top
    0, 4, 7, 0, 7, 3, // left
    1, 2, 6, 1, 6, 5, // right
];

/// Column-major rotation about Y, tilted about X so three faces show.
#[rustfmt::skip]
fn spin(angle: f32) -> [f32; 16] {
    let (sy, cy) = angle.sin_cos();
    let (sx, cx) = 0.5f32.sin_cos();
    [
        cy, sx * sy, -cx * sy, 0.0,
        0.0, cx, sx, 0.0,
        sy, -sx * cy, cx * cy, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]
}

struct Cube {
    pipeline: HPipelineState,
    depth_state: HDepthStencilState,
    vertices: HVertexBuffer,
    indices: HIndexBuffer,
    transform: Vec<HConstBuffer>,
}

impl Cube {
    fn new(rhi: &Rhi) -> Result<Self> {
        rhi.register_program(
            ProgramSource::new("cube.vp", ProgType::Vertex, "mvp * position").with_const_buffer(4),
        )?;
        rhi.register_program(ProgramSource::new("cube.fp", ProgType::Fragment, "color"))?;

        let layout = VertexLayout::new()
            .with(VertexSemantics::Position, 0, VertexDataType::Float, 3)?
            .with(VertexSemantics::Color, 0, VertexDataType::Uint8N, 4)?;
        layout.dump();

        let pipeline = rhi.acquire_render_pipeline_state(&PipelineStateDescriptor {
            vertex_layout: layout,
            vprog_uid: "cube.vp".into(),
            fprog_uid: "cube.fp".into(),
            ..Default::default()
        })?;
        let transform = rhi.create_vertex_const_buffers(pipeline)?;
        let depth_state = rhi.acquire_depth_stencil_state(&DepthStencilStateDescriptor::default())?;

        let vertices: Vec<Vertex> = CORNERS
            .iter()
            .map(|&position| Vertex {
                position,
                color: rhi.native_color_rgba(
                    position[0] + 0.5,
                    position[1] + 0.5,
                    position[2] + 0.5,
                    1.0,
                ),
            })
            .collect();
        let vertices = rhi.create_vertex_buffer(&VertexBufferDescriptor::with_data(
            bytemuck::cast_slice(&vertices),
        ))?;
        let indices = rhi.create_index_buffer(&IndexBufferDescriptor::with_indices_u16(&INDICES))?;

        Ok(Self {
            pipeline,
            depth_state,
            vertices,
            indices,
            transform,
        })
    }

    fn packet(&self) -> Packet {
        let mut packet = Packet {
            vertex_stream_count: 1,
            vertex_count: CORNERS.len() as u32,
            index_buffer: self.indices,
            render_pipeline_state: self.pipeline,
            depth_stencil_state: self.depth_state,
            cull_mode: CullMode::Ccw,
            vertex_const_count: self.transform.len() as u32,
            primitive_type: PrimitiveType::TriangleList,
            primitive_count: INDICES.len() as u32 / 3,
            debug_marker: Some("cube".into()),
            ..Default::default()
        };
        packet.vertex_streams[0] = self.vertices;
        packet.vertex_const[..self.transform.len()].copy_from_slice(&self.transform);
        packet
    }

    fn render(&self, rhi: &Rhi, angle: f32) -> Result<()> {
        if let Some(&transform) = self.transform.first() {
            rhi.update_const_buffer_4fv(transform, 0, &spin(angle))?;
        }

        let params = rhi.init_params();
        let mut config = RenderPassConfig {
            viewport: Viewport::new(0, 0, params.width, params.height),
            ..Default::default()
        };
        config.color_buffers[0].clear_color = [0.1, 0.1, 0.15, 1.0];

        let (pass, lists) = rhi.allocate_render_pass_with_packet_lists(&config, 1)?;
        rhi.begin_render_pass(pass)?;
        for &list in &lists {
            rhi.begin_packet_list(list)?;
            rhi.add_packet(list, &self.packet())?;
            rhi.end_packet_list(list, HSyncObject::INVALID)?;
        }
        rhi.end_render_pass(pass)?;
        Ok(())
    }

    fn destroy(self, rhi: &Rhi) -> Result<()> {
        for cb in self.transform {
            rhi.delete_const_buffer(cb, false)?;
        }
        rhi.delete_vertex_buffer(self.vertices, false)?;
        rhi.delete_index_buffer(self.indices, false)?;
        rhi.release_depth_stencil_state(self.depth_state, false)?;
        rhi.release_render_pipeline_state(self.pipeline, false)?;
        Ok(())
    }
}

fn main() -> Result<()> {
    rhi_infra::init_logging();

    let mut args = std::env::args().skip(1);
    let params = match args.next() {
        Some(path) => InitParam::from_json_file(&path)?,
        None => InitParam {
            width: 800,
            height: 600,
            ..Default::default()
        },
    };
    let frame_count = match args.next() {
        Some(count) => count
            .parse::<u32>()
            .with_context(|| format!("Invalid frame count '{count}'"))?,
        None => DEFAULT_FRAME_COUNT,
    };

    let selector = InfraBackendSelector::new(BackendKind::Software);
    let rhi = Rhi::initialize(Api::Gles2, params, &selector)?;
    log::info!("Device: {}", rhi.device_caps().device_description);

    let cube = Cube::new(&rhi)?;
    for frame in 0..frame_count {
        cube.render(&rhi, frame as f32 * 0.05)?;
        rhi.present()?;
    }
    rhi.flush()?;

    let stats = rhi.frame_stats();
    log::info!(
        "Rendered {} frames ({} rejected): {} draws, {} primitives",
        stats.frames_executed,
        stats.frames_rejected,
        stats.total.draws,
        stats.total.primitives
    );

    cube.destroy(&rhi)?;
    // One more frame lets the scheduled deletions complete.
    rhi.present()?;
    rhi.flush()?;
    rhi.uninitialize();
    Ok(())
}
