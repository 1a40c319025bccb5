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

use rhi_core::api::{
    Api, ColorBuffer, CullMode, IndexBufferDescriptor, InitParam, LoadAction,
    PipelineStateDescriptor, PrimitiveType, ProgType, RenderPassConfig, TextureDescriptor,
    TextureFormat, VertexBufferDescriptor,
};
use rhi_core::command::DrawCall;
use rhi_core::handle::{HPipelineState, HSyncObject, HVertexBuffer};
use rhi_core::vertex_layout::{VertexDataType, VertexLayout, VertexSemantics};
use rhi_core::{Packet, ProgramSource, RenderError, ResourceError, Rhi};
use rhi_infra::software::NO_QUERY_INDEX;
use rhi_infra::{NativeCall, SoftwareBackend};
use std::sync::Arc;

// --- HELPERS FOR THESE TESTS ---

fn params() -> InitParam {
    InitParam {
        width: 640,
        height: 480,
        ..Default::default()
    }
}

fn software_rhi(api: Api, params: InitParam) -> (Arc<SoftwareBackend>, Rhi) {
    rhi_infra::logging::init_test_logging();
    let backend = Arc::new(SoftwareBackend::new(api, &params));
    let rhi = Rhi::with_backend(backend.clone(), params)
        .expect("software device should initialize");
    (backend, rhi)
}

fn position_layout() -> VertexLayout {
    VertexLayout::new()
        .with(VertexSemantics::Position, 0, VertexDataType::Float, 3)
        .unwrap()
}

/// Registers a position-only program pair and builds a pipeline from it.
fn triangle_pipeline(rhi: &Rhi, vertex_const_registers: Option<u32>) -> HPipelineState {
    let mut vprog = ProgramSource::new("triangle.vp", ProgType::Vertex, "void main() {}");
    if let Some(registers) = vertex_const_registers {
        vprog = vprog.with_const_buffer(registers);
    }
    rhi.register_program(vprog).unwrap();
    rhi.register_program(ProgramSource::new("triangle.fp", ProgType::Fragment, "void main() {}"))
        .unwrap();
    rhi.acquire_render_pipeline_state(&PipelineStateDescriptor {
        vertex_layout: position_layout(),
        vprog_uid: "triangle.vp".into(),
        fprog_uid: "triangle.fp".into(),
        ..Default::default()
    })
    .unwrap()
}

/// Three vertices of three floats: 36 bytes.
fn triangle_buffer(rhi: &Rhi) -> HVertexBuffer {
    let vertices: [f32; 9] = [0.0, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0];
    rhi.create_vertex_buffer(&VertexBufferDescriptor::with_data(bytemuck::cast_slice(&vertices)))
        .unwrap()
}

fn backbuffer_pass(priority: i32) -> RenderPassConfig {
    RenderPassConfig {
        priority,
        ..Default::default()
    }
}

/// Records one non-indexed triangle into a single-buffer pass.
fn record_triangle_pass(
    rhi: &Rhi,
    config: &RenderPassConfig,
    ps: HPipelineState,
    vb: HVertexBuffer,
) {
    let (pass, cmds) = rhi.allocate_render_pass(config, 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 1).unwrap();
    rhi.end_command_buffer(cmds[0], HSyncObject::INVALID).unwrap();
    rhi.end_render_pass(pass).unwrap();
}

#[test]
fn test_indexed_triangle_reaches_the_device() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);
    let ib = rhi
        .create_index_buffer(&IndexBufferDescriptor::with_indices_u16(&[0, 1, 2]))
        .unwrap();

    let (pass, cmds) = rhi.allocate_render_pass(&backbuffer_pass(0), 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    rhi.set_indices(cmds[0], ib).unwrap();
    rhi.draw_indexed_primitive(cmds[0], PrimitiveType::TriangleList, 1, 3, 0, 0)
        .unwrap();
    rhi.end_command_buffer(cmds[0], HSyncObject::INVALID).unwrap();
    rhi.end_render_pass(pass).unwrap();

    // --- 2. ACT ---
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    let log = backend.last_frame_log().expect("the frame should have executed");
    assert_eq!(
        log.draws(),
        vec![DrawCall::Indexed {
            primitive: PrimitiveType::TriangleList,
            count: 1,
            vertex_count: 3,
            first_vertex: 0,
            start_index: 0,
        }]
    );
    assert_eq!(log.stats.primitives, 1);
    assert_eq!(
        log.count(|c| matches!(c, NativeCall::ApplyPipeline { vertex_stride: 12, .. })),
        1,
        "pipeline should be applied once with the 12-byte position stride"
    );
    assert!(matches!(log.calls.first(), Some(NativeCall::BeginPass { .. })));
    assert_eq!(log.calls.last(), Some(&NativeCall::EndPass));
    assert_eq!(rhi.frame_stats().frames_executed, 1);
}

#[test]
fn test_draw_past_the_vertex_buffer_fails_the_frame() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);

    let (pass, cmds) = rhi.allocate_render_pass(&backbuffer_pass(0), 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    // Two triangles need six vertices; the buffer holds three.
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 2).unwrap();
    rhi.end_command_buffer(cmds[0], HSyncObject::INVALID).unwrap();
    rhi.end_render_pass(pass).unwrap();

    // --- 2. ACT ---
    let result = rhi.present();

    // --- 3. ASSERT ---
    assert!(result.is_err(), "out-of-range draw must be reported");
    assert!(backend.last_frame_log().is_none(), "failed frame must not be logged");
}

#[test]
fn test_draw_with_overflowing_primitive_count_fails_the_frame() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);

    let (pass, cmds) = rhi.allocate_render_pass(&backbuffer_pass(0), 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    // Three vertices per triangle does not fit in 32 bits.
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 0x6000_0000)
        .unwrap();
    rhi.end_command_buffer(cmds[0], HSyncObject::INVALID).unwrap();
    rhi.end_render_pass(pass).unwrap();

    // --- 2. ACT ---
    let result = rhi.present();

    // --- 3. ASSERT ---
    assert!(
        matches!(result, Err(RenderError::Resource(ResourceError::OutOfBounds))),
        "an element count past u32 must be rejected, got {result:?}"
    );
    assert!(backend.last_frame_log().is_none());
    assert_eq!(rhi.frame_stats().frames_rejected, 1);
}

#[test]
fn test_overflowing_draw_keeps_the_render_thread_alive() {
    // --- 1. ARRANGE ---
    let params = InitParam {
        threaded_render: true,
        ..params()
    };
    let (backend, rhi) = software_rhi(Api::Gles2, params);
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);

    let (pass, cmds) = rhi.allocate_render_pass(&backbuffer_pass(0), 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    rhi.draw_primitive(cmds[0], PrimitiveType::LineList, u32::MAX)
        .unwrap();
    rhi.end_command_buffer(cmds[0], HSyncObject::INVALID).unwrap();
    rhi.end_render_pass(pass).unwrap();

    // --- 2. ACT ---
    rhi.present().unwrap();
    rhi.flush().unwrap();
    record_triangle_pass(&rhi, &backbuffer_pass(0), ps, vb);
    rhi.present().unwrap();
    rhi.flush().unwrap();

    // --- 3. ASSERT ---
    let stats = rhi.frame_stats();
    assert_eq!(stats.frames_rejected, 1);
    assert_eq!(stats.frames_executed, 1);
    assert_eq!(backend.last_frame_log().unwrap().draws().len(), 1);
}

#[test]
fn test_passes_execute_in_priority_order() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);
    let late = rhi.create_texture(&TextureDescriptor {
        is_render_target: true,
        ..TextureDescriptor::new_2d(64, 64, TextureFormat::R8G8B8A8)
    })
    .unwrap();

    let mut late_config = backbuffer_pass(10);
    late_config.color_buffers[0] = ColorBuffer {
        texture: late,
        ..Default::default()
    };
    // Begun first, but its priority sends it last.
    record_triangle_pass(&rhi, &late_config, ps, vb);
    record_triangle_pass(&rhi, &backbuffer_pass(-5), ps, vb);

    // --- 2. ACT ---
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    let log = backend.last_frame_log().unwrap();
    let targets: Vec<_> = log
        .calls
        .iter()
        .filter_map(|c| match c {
            NativeCall::BeginPass { color_target, .. } => Some(*color_target),
            _ => None,
        })
        .collect();
    assert_eq!(targets.len(), 2);
    assert!(!targets[0].is_valid(), "backbuffer pass (priority -5) should run first");
    assert_eq!(targets[1], late);
}

#[test]
fn test_load_action_clears_only_once_per_pass() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);
    let mut config = backbuffer_pass(0);
    config.color_buffers[0].load_action = LoadAction::Clear;
    config.color_buffers[0].clear_color = [0.25, 0.5, 0.75, 1.0];

    let (pass, cmds) = rhi.allocate_render_pass(&config, 2).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    for &cmd in &cmds {
        rhi.begin_command_buffer(cmd).unwrap();
        rhi.set_pipeline_state(cmd, ps, 0).unwrap();
        rhi.set_vertex_data(cmd, vb, 0).unwrap();
        rhi.draw_primitive(cmd, PrimitiveType::TriangleList, 1).unwrap();
        rhi.end_command_buffer(cmd, HSyncObject::INVALID).unwrap();
    }
    rhi.end_render_pass(pass).unwrap();

    // --- 2. ACT ---
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    let log = backend.last_frame_log().unwrap();
    let begins: Vec<_> = log
        .calls
        .iter()
        .filter_map(|c| match c {
            NativeCall::BeginPass { clear, .. } => Some(*clear),
            _ => None,
        })
        .collect();
    assert_eq!(begins.len(), 1, "only the first buffer opens the pass");
    assert_eq!(begins[0].color[0], Some([0.25, 0.5, 0.75, 1.0]));
    assert_eq!(log.count(|c| matches!(c, NativeCall::EndPass)), 1);
    assert_eq!(log.draws().len(), 2);
    assert_eq!(log.stats.command_buffers, 2);
}

#[test]
fn test_unended_pass_is_dropped_at_present() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);

    let sync = rhi.create_sync_object().unwrap();

    let (pass, cmds) = rhi.allocate_render_pass(&backbuffer_pass(0), 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 1).unwrap();
    rhi.end_command_buffer(cmds[0], sync).unwrap();
    // The pass is never ended.
    assert!(!rhi.sync_object_signaled(sync));

    // --- 2. ACT ---
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    let log = backend.last_frame_log().unwrap();
    assert!(log.calls.is_empty(), "the unended pass must not be replayed");
    assert!(
        rhi.command_buffer_state(cmds[0]).is_err(),
        "the dropped pass should release its command buffers"
    );
    assert!(
        rhi.sync_object_signaled(sync),
        "a sync attached to dropped work must not leave waiters hanging"
    );
}

#[test]
fn test_unended_command_buffer_signals_the_syncs_of_its_pass() {
    // --- 1. ARRANGE ---
    let (_backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);
    let sync = rhi.create_sync_object().unwrap();

    let (pass, cmds) = rhi.allocate_render_pass(&backbuffer_pass(0), 2).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 1).unwrap();
    rhi.end_command_buffer(cmds[0], sync).unwrap();
    // The second buffer is left recording.
    rhi.begin_command_buffer(cmds[1]).unwrap();
    rhi.end_render_pass(pass).unwrap();

    // --- 2. ACT ---
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    assert!(
        rhi.sync_object_signaled(sync),
        "dropping a pass must signal the syncs of its ended buffers"
    );
}

#[test]
fn test_packet_list_skips_redundant_state_and_inverts_culling() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);
    let config = RenderPassConfig {
        invert_culling: true,
        ..backbuffer_pass(0)
    };
    let (pass, lists) = rhi.allocate_render_pass_with_packet_lists(&config, 1).unwrap();

    let mut packet = Packet {
        render_pipeline_state: ps,
        vertex_stream_count: 1,
        cull_mode: CullMode::Ccw,
        primitive_count: 1,
        ..Default::default()
    };
    packet.vertex_streams[0] = vb;
    let packets = vec![packet.clone(), packet];

    // --- 2. ACT ---
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_packet_list(lists[0]).unwrap();
    rhi.add_packets(lists[0], &packets).unwrap();
    rhi.end_packet_list(lists[0], HSyncObject::INVALID).unwrap();
    rhi.end_render_pass(pass).unwrap();
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    let log = backend.last_frame_log().unwrap();
    assert_eq!(log.draws().len(), 2);
    assert_eq!(
        log.count(|c| matches!(c, NativeCall::ApplyPipeline { .. })),
        1,
        "the shared pipeline should be applied once"
    );
    let cull_modes: Vec<_> = log
        .calls
        .iter()
        .filter_map(|c| match c {
            NativeCall::SetCullMode(mode) => Some(*mode),
            _ => None,
        })
        .collect();
    assert_eq!(
        cull_modes,
        vec![CullMode::None, CullMode::Cw],
        "the list starts unculled and the packet winding is flipped once"
    );
}

#[test]
fn test_const_buffer_contents_are_captured_when_bound() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Dx11, params());
    let ps = triangle_pipeline(&rhi, Some(1));
    let vb = triangle_buffer(&rhi);
    let consts = rhi.create_vertex_const_buffers(ps).unwrap();
    assert_eq!(consts.len(), 1);

    let (pass, cmds) = rhi.allocate_render_pass(&backbuffer_pass(0), 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.update_const_buffer_4fv(consts[0], 0, &[1.0; 4]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_const_buffer(cmds[0], 0, consts[0]).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 1).unwrap();

    // --- 2. ACT ---
    // Writing after the bind must not leak into the recorded draw.
    rhi.update_const_buffer_4fv(consts[0], 0, &[2.0; 4]).unwrap();
    rhi.end_command_buffer(cmds[0], HSyncObject::INVALID).unwrap();
    rhi.end_render_pass(pass).unwrap();
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    let log = backend.last_frame_log().unwrap();
    let uploaded: Vec<_> = log
        .calls
        .iter()
        .filter_map(|c| match c {
            NativeCall::BindConstBuffer { data, .. } => Some(data.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(uploaded, vec![vec![1.0; 4]]);

    for cb in consts {
        rhi.delete_const_buffer(cb, true).unwrap();
    }
}

#[test]
fn test_scheduled_deletion_waits_for_the_frame() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let vb = triangle_buffer(&rhi);
    assert_eq!(backend.resource_counts().vertex_buffers, 1);

    // --- 2. ACT ---
    rhi.delete_vertex_buffer(vb, false).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(rhi.pending_deletion_count(), 1);
    assert_eq!(
        backend.resource_counts().vertex_buffers,
        1,
        "the buffer must survive until its frame completed"
    );

    rhi.present().unwrap();

    assert_eq!(rhi.pending_deletion_count(), 0);
    assert_eq!(backend.resource_counts().vertex_buffers, 0);
}

#[test]
fn test_rejected_frames_still_signal_their_sync_objects() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);
    let sync = rhi.create_sync_object().unwrap();

    let (pass, cmds) = rhi.allocate_render_pass(&backbuffer_pass(0), 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 1).unwrap();
    rhi.end_command_buffer(cmds[0], sync).unwrap();
    rhi.end_render_pass(pass).unwrap();
    assert!(!rhi.sync_object_signaled(sync));

    // --- 2. ACT ---
    rhi.suspend_rendering();
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    assert!(rhi.sync_object_signaled(sync), "a rejected frame must not leave waiters hanging");
    assert!(backend.last_frame_log().is_none());
    let stats = rhi.frame_stats();
    assert_eq!(stats.frames_rejected, 1);
    assert_eq!(stats.frames_executed, 0);

    rhi.resume_rendering();
    rhi.delete_sync_object(sync).unwrap();
}

#[test]
fn test_executed_sync_objects_signal() {
    let (_backend, rhi) = software_rhi(Api::Gles2, params());
    let sync = rhi.current_frame_sync_object().unwrap();
    assert!(!rhi.sync_object_signaled(sync));

    rhi.present().unwrap();

    assert!(rhi.sync_object_signaled(sync));
}

#[test]
fn test_occlusion_queries_count_primitives() {
    // --- 1. ARRANGE ---
    let (_backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);
    let queries = rhi.create_query_buffer(4).unwrap();
    let config = RenderPassConfig {
        query_buffer: queries,
        ..backbuffer_pass(0)
    };

    let (pass, cmds) = rhi.allocate_render_pass(&config, 1).unwrap();
    rhi.begin_render_pass(pass).unwrap();
    rhi.begin_command_buffer(cmds[0]).unwrap();
    rhi.set_pipeline_state(cmds[0], ps, 0).unwrap();
    rhi.set_vertex_data(cmds[0], vb, 0).unwrap();
    rhi.set_query_index(cmds[0], 2).unwrap();
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 1).unwrap();
    rhi.set_query_index(cmds[0], NO_QUERY_INDEX).unwrap();
    rhi.draw_primitive(cmds[0], PrimitiveType::TriangleList, 1).unwrap();
    rhi.end_command_buffer(cmds[0], HSyncObject::INVALID).unwrap();
    rhi.end_render_pass(pass).unwrap();
    assert!(!rhi.query_buffer_is_ready(queries).unwrap());

    // --- 2. ACT ---
    rhi.present().unwrap();

    // --- 3. ASSERT ---
    assert!(rhi.query_buffer_is_ready(queries).unwrap());
    assert!(rhi.query_is_ready(queries, 2).unwrap());
    assert!(!rhi.query_is_ready(queries, 0).unwrap(), "slot 0 was never drawn into");
    assert_eq!(rhi.query_value(queries, 2).unwrap(), 1, "the second draw stopped counting");

    rhi.delete_query_buffer(queries, true).unwrap();
}

#[test]
fn test_frame_timestamps_are_recorded() {
    let (_backend, rhi) = software_rhi(Api::Gles2, params());
    let set = rhi.create_perf_query_set(2).unwrap();
    rhi.set_frame_perf_query_set(set);

    rhi.present().unwrap();

    assert!(rhi.perf_query_set_is_ready(set).unwrap());
    let (begin, end) = rhi
        .perf_query_frame_timestamps(set)
        .unwrap()
        .expect("frame timestamps should be written");
    assert!(begin <= end);
    assert_eq!(rhi.perf_query_frequency(), 1_000_000);
    rhi.delete_perf_query_set(set).unwrap();
}

#[test]
fn test_mapped_vertex_buffer_writes_back_on_unmap() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let vb = rhi.create_vertex_buffer(&VertexBufferDescriptor::new(8)).unwrap();

    // --- 2. ACT ---
    let mut mapping = rhi.map_vertex_buffer(vb, 4, 4).unwrap();
    mapping.copy_from_slice(&[9, 8, 7, 6]);
    mapping.unmap().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(backend.vertex_buffer_data(vb).unwrap(), vec![0, 0, 0, 0, 9, 8, 7, 6]);
    rhi.delete_vertex_buffer(vb, true).unwrap();
}

#[test]
fn test_device_loss_flags_resources_for_restore() {
    // --- 1. ARRANGE ---
    let (backend, rhi) = software_rhi(Api::Gles2, params());
    let vb = triangle_buffer(&rhi);
    assert!(!rhi.need_restore_resources());

    // --- 2. ACT ---
    backend.simulate_device_lost();

    // --- 3. ASSERT ---
    assert!(rhi.need_restore_resources());
    assert!(rhi.vertex_buffer_need_restore(vb).unwrap());

    let vertices = [0.0f32; 9];
    rhi.update_vertex_buffer(vb, bytemuck::cast_slice(&vertices), 0).unwrap();
    assert!(!rhi.need_restore_resources(), "refilling the buffer restores it");
}

#[test]
fn test_threaded_rendering_matches_immediate_rendering() {
    fn render(threaded: bool) -> Vec<NativeCall> {
        let params = InitParam {
            threaded_render: threaded,
            ..params()
        };
        let (backend, rhi) = software_rhi(Api::Gles2, params);
        let ps = triangle_pipeline(&rhi, None);
        let vb = triangle_buffer(&rhi);
        record_triangle_pass(&rhi, &backbuffer_pass(1), ps, vb);
        record_triangle_pass(&rhi, &backbuffer_pass(0), ps, vb);
        rhi.present().unwrap();
        rhi.flush().unwrap();
        backend.last_frame_log().expect("frame should have executed").calls
    }

    // --- 2. ACT ---
    let immediate = render(false);
    let threaded = render(true);

    // --- 3. ASSERT ---
    assert!(!immediate.is_empty());
    assert_eq!(immediate, threaded, "the render thread must replay the same calls");
}

#[test]
fn test_threaded_deletion_completes_after_flush() {
    let params = InitParam {
        threaded_render: true,
        ..params()
    };
    let (backend, rhi) = software_rhi(Api::Gles2, params);
    let vb = triangle_buffer(&rhi);

    rhi.delete_vertex_buffer(vb, false).unwrap();
    rhi.present().unwrap();
    rhi.flush().unwrap();
    // The next present collects what the executed frame released.
    rhi.present().unwrap();
    rhi.flush().unwrap();

    assert_eq!(rhi.pending_deletion_count(), 0);
    assert_eq!(backend.resource_counts().vertex_buffers, 0);
}

#[test]
fn test_invalid_render_target_fails_the_frame() {
    let (_backend, rhi) = software_rhi(Api::Gles2, params());
    let ps = triangle_pipeline(&rhi, None);
    let vb = triangle_buffer(&rhi);
    let not_a_target = rhi
        .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::R8G8B8A8))
        .unwrap();
    let mut config = backbuffer_pass(0);
    config.color_buffers[0].texture = not_a_target;
    record_triangle_pass(&rhi, &config, ps, vb);

    let result = rhi.present();

    assert!(matches!(result, Err(RenderError::Resource(_))));
    assert_eq!(rhi.frame_stats().frames_rejected, 1);
}

#[test]
fn test_projection_inversion_follows_render_target_origin() {
    let mut offscreen = RenderPassConfig::default();
    let (_gl_backend, gl) = software_rhi(Api::Gles2, params());
    offscreen.color_buffers[0].texture = gl
        .create_texture(&TextureDescriptor {
            is_render_target: true,
            ..TextureDescriptor::new_2d(8, 8, TextureFormat::R8G8B8A8)
        })
        .unwrap();
    let (_dx_backend, dx) = software_rhi(Api::Dx11, params());

    assert!(gl.need_invert_projection(&offscreen));
    assert!(!dx.need_invert_projection(&offscreen));
    assert!(!gl.need_invert_projection(&RenderPassConfig::default()));
}

#[test]
fn test_native_color_packing_per_api() {
    let (_dx9_backend, dx9) = software_rhi(Api::Dx9, params());
    let (_gl_backend, gl) = software_rhi(Api::Gles2, params());

    assert_eq!(dx9.native_color_rgba(1.0, 0.0, 0.0, 1.0), 0xFFFF_0000);
    assert_eq!(gl.native_color_rgba(1.0, 0.0, 0.0, 1.0), 0xFF00_00FF);
}

#[test]
fn test_init_params_load_from_json() {
    let json = r#"{
        "width": 1280,
        "height": 720,
        "threaded_render": true,
        "max_texture_count": 64
    }"#;

    let params = InitParam::from_json_str(json).unwrap();

    assert_eq!((params.width, params.height), (1280, 720));
    assert!(params.threaded_render);
    assert_eq!(params.max_texture_count, 64);
    assert_eq!(params.threaded_render_frame_count, 2, "missing keys keep their defaults");

    let round_trip = InitParam::from_json_str(&params.to_json_string().unwrap()).unwrap();
    assert_eq!(round_trip, params);
}
