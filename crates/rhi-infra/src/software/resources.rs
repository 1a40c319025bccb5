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

//! CPU-resident storage behind every software resource handle.

use rhi_core::api::{
    BlendState, IndexSize, ProgType, TextureDescriptor, TextureFace, TextureFormat, TextureType,
};
use rhi_core::format;
use rhi_core::shader_cache::ProgramSource;
use rhi_core::vertex_layout::VertexLayout;
use rhi_core::ResourceError;
use std::sync::Arc;

/// Contents of a vertex or index buffer.
#[derive(Debug)]
pub(crate) struct BufferEntry {
    pub data: Vec<u8>,
    pub index_size: Option<IndexSize>,
    mapped: Option<u32>,
    need_restore: bool,
    lost: bool,
}

impl BufferEntry {
    pub fn new(
        size: u32,
        initial_data: Option<&[u8]>,
        need_restore: bool,
    ) -> Result<Self, ResourceError> {
        let mut data = vec![0u8; size as usize];
        if let Some(initial) = initial_data {
            data.get_mut(..initial.len())
                .ok_or(ResourceError::OutOfBounds)?
                .copy_from_slice(initial);
        }
        Ok(Self {
            data,
            index_size: None,
            mapped: None,
            need_restore,
            lost: false,
        })
    }

    pub fn write(&mut self, data: &[u8], offset: u32) -> Result<(), ResourceError> {
        let start = offset as usize;
        self.data
            .get_mut(start..start + data.len())
            .ok_or(ResourceError::OutOfBounds)?
            .copy_from_slice(data);
        self.lost = false;
        Ok(())
    }

    pub fn map(&mut self, offset: u32, size: u32) -> Result<Vec<u8>, ResourceError> {
        if self.mapped.is_some() {
            return Err(ResourceError::AlreadyMapped);
        }
        let start = offset as usize;
        let range = self
            .data
            .get(start..start + size as usize)
            .ok_or(ResourceError::OutOfBounds)?
            .to_vec();
        self.mapped = Some(offset);
        Ok(range)
    }

    pub fn unmap(&mut self, data: &[u8]) -> Result<(), ResourceError> {
        let offset = self.mapped.take().ok_or(ResourceError::NotMapped)?;
        self.write(data, offset)
    }

    pub fn lose(&mut self) {
        self.data.fill(0);
        self.mapped = None;
        self.lost = self.need_restore;
    }

    pub fn need_restore(&self) -> bool {
        self.lost
    }

    /// Number of indices held, for index buffers.
    pub fn index_count(&self) -> u32 {
        match self.index_size {
            Some(size) => self.data.len() as u32 / size.bytes(),
            None => 0,
        }
    }

    /// Index `i`, for index buffers.
    pub fn index(&self, i: u32) -> Option<u32> {
        let size = self.index_size?.bytes() as usize;
        let start = i as usize * size;
        let bytes = self.data.get(start..start + size)?;
        Some(match size {
            2 => bytemuck::pod_read_unaligned::<u16>(bytes) as u32,
            _ => bytemuck::pod_read_unaligned::<u32>(bytes),
        })
    }
}

/// Every face and level of a texture.
#[derive(Debug)]
pub(crate) struct TextureEntry {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub level_count: u32,
    pub is_render_target: bool,
    faces: Vec<Vec<Vec<u8>>>,
    mapped_level: Option<u32>,
    need_restore: bool,
    lost: bool,
}

impl TextureEntry {
    pub fn new(desc: &TextureDescriptor) -> Result<Self, ResourceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(ResourceError::Unsupported("zero-sized texture".into()));
        }
        let level_count = desc.level_count.max(1);
        let face_count = match desc.texture_type {
            TextureType::Cube => TextureFace::ALL.len(),
            _ => 1,
        };
        let mut faces: Vec<Vec<Vec<u8>>> = (0..face_count)
            .map(|_| {
                (0..level_count)
                    .map(|level| {
                        let size =
                            format::texture_size(desc.format, desc.width, desc.height, level);
                        vec![0u8; size as usize]
                    })
                    .collect()
            })
            .collect();

        for (i, initial) in desc.initial_data.iter().enumerate() {
            let face = i / level_count as usize;
            let level = i % level_count as usize;
            let storage = faces
                .get_mut(face)
                .and_then(|f| f.get_mut(level))
                .ok_or(ResourceError::OutOfBounds)?;
            storage
                .get_mut(..initial.len())
                .ok_or(ResourceError::OutOfBounds)?
                .copy_from_slice(initial);
        }

        Ok(Self {
            format: desc.format,
            width: desc.width,
            height: desc.height,
            level_count,
            is_render_target: desc.is_render_target,
            faces,
            mapped_level: None,
            need_restore: desc.need_restore,
            lost: false,
        })
    }

    fn level_mut(&mut self, level: u32, face: TextureFace) -> Result<&mut Vec<u8>, ResourceError> {
        self.faces
            .get_mut(face as usize)
            .and_then(|f| f.get_mut(level as usize))
            .ok_or(ResourceError::OutOfBounds)
    }

    /// Contents of one level of one face.
    pub fn level(&self, level: u32, face: TextureFace) -> Option<&[u8]> {
        self.faces
            .get(face as usize)
            .and_then(|f| f.get(level as usize))
            .map(Vec::as_slice)
    }

    pub fn update(
        &mut self,
        data: &[u8],
        level: u32,
        face: TextureFace,
    ) -> Result<(), ResourceError> {
        self.level_mut(level, face)?
            .get_mut(..data.len())
            .ok_or(ResourceError::OutOfBounds)?
            .copy_from_slice(data);
        self.lost = false;
        Ok(())
    }

    pub fn map(&mut self, level: u32) -> Result<Vec<u8>, ResourceError> {
        if self.mapped_level.is_some() {
            return Err(ResourceError::AlreadyMapped);
        }
        let contents = self.level_mut(level, TextureFace::PositiveX)?.clone();
        self.mapped_level = Some(level);
        Ok(contents)
    }

    pub fn unmap(&mut self, data: &[u8]) -> Result<(), ResourceError> {
        let level = self.mapped_level.take().ok_or(ResourceError::NotMapped)?;
        self.update(data, level, TextureFace::PositiveX)
    }

    pub fn lose(&mut self) {
        for level in self.faces.iter_mut().flatten() {
            level.fill(0);
        }
        self.mapped_level = None;
        self.lost = self.need_restore;
    }

    pub fn need_restore(&self) -> bool {
        self.lost
    }
}

/// Occlusion results of a query buffer.
#[derive(Debug)]
pub(crate) struct QueryBufferEntry {
    pub values: Vec<u32>,
    pub written: Vec<bool>,
    pub ready: bool,
}

impl QueryBufferEntry {
    pub fn new(max_object_count: u32) -> Self {
        Self {
            values: vec![0; max_object_count as usize],
            written: vec![false; max_object_count as usize],
            ready: false,
        }
    }

    pub fn reset(&mut self) {
        self.values.fill(0);
        self.written.fill(false);
        self.ready = false;
    }

    pub fn add(&mut self, index: u32, samples: u32) -> Result<(), ResourceError> {
        let value = self
            .values
            .get_mut(index as usize)
            .ok_or(ResourceError::OutOfBounds)?;
        *value = value.saturating_add(samples);
        self.written[index as usize] = true;
        Ok(())
    }
}

/// Timestamps of a perf query set, in microseconds.
#[derive(Debug)]
pub(crate) struct PerfQuerySetEntry {
    pub timestamps: Vec<Option<u64>>,
    pub frame: Option<(u64, u64)>,
    pub ready: bool,
}

impl PerfQuerySetEntry {
    pub fn new(max_timestamp_count: u32) -> Self {
        Self {
            timestamps: vec![None; max_timestamp_count as usize],
            frame: None,
            ready: false,
        }
    }

    pub fn reset(&mut self) {
        self.timestamps.fill(None);
        self.frame = None;
        self.ready = false;
    }
}

/// A linked pipeline.
#[derive(Debug)]
pub(crate) struct PipelineEntry {
    pub vertex_layout: VertexLayout,
    pub vprog: Arc<ProgramSource>,
    pub fprog: Arc<ProgramSource>,
    #[allow(dead_code)]
    pub blending: BlendState,
}

impl PipelineEntry {
    pub fn program(&self, stage: ProgType) -> &ProgramSource {
        match stage {
            ProgType::Vertex => &self.vprog,
            ProgType::Fragment => &self.fprog,
        }
    }
}

/// Float4 registers of one const buffer.
#[derive(Debug)]
pub(crate) struct ConstBufferEntry {
    #[allow(dead_code)]
    pub stage: ProgType,
    pub data: Arc<Vec<f32>>,
}

impl ConstBufferEntry {
    pub fn new(stage: ProgType, registers: u32) -> Self {
        Self {
            stage,
            data: Arc::new(vec![0.0; registers as usize * 4]),
        }
    }

    /// Overwrites floats from `offset`, leaving recorded snapshots untouched.
    pub fn write(&mut self, offset: usize, values: &[f32]) -> Result<(), ResourceError> {
        if offset + values.len() > self.data.len() {
            return Err(ResourceError::OutOfBounds);
        }
        Arc::make_mut(&mut self.data)[offset..offset + values.len()].copy_from_slice(values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_map_round_trip_writes_back() {
        let mut buffer = BufferEntry::new(8, Some(&[1, 2, 3, 4]), true).unwrap();
        let mut mapped = buffer.map(2, 4).unwrap();
        assert_eq!(mapped, vec![3, 4, 0, 0]);
        assert!(matches!(buffer.map(0, 1), Err(ResourceError::AlreadyMapped)));

        mapped[3] = 9;
        buffer.unmap(&mapped).unwrap();

        assert_eq!(buffer.data, vec![1, 2, 3, 4, 0, 9, 0, 0]);
        assert!(matches!(buffer.unmap(&[]), Err(ResourceError::NotMapped)));
    }

    #[test]
    fn test_buffer_write_out_of_range_fails() {
        let mut buffer = BufferEntry::new(4, None, false).unwrap();
        assert!(matches!(buffer.write(&[0; 4], 1), Err(ResourceError::OutOfBounds)));
        assert!(BufferEntry::new(2, Some(&[0; 3]), false).is_err());
    }

    #[test]
    fn test_lost_buffer_needs_restore_until_written() {
        let mut buffer = BufferEntry::new(4, Some(&[7; 4]), true).unwrap();
        buffer.lose();
        assert!(buffer.need_restore());
        assert_eq!(buffer.data, vec![0; 4]);

        buffer.write(&[7; 4], 0).unwrap();
        assert!(!buffer.need_restore());

        let mut transient = BufferEntry::new(4, None, false).unwrap();
        transient.lose();
        assert!(!transient.need_restore());
    }

    #[test]
    fn test_index_reads_follow_index_size() {
        let indices: [u16; 3] = [0, 1, 0x0102];
        let mut buffer = BufferEntry::new(6, Some(bytemuck::cast_slice(&indices)), false).unwrap();
        buffer.index_size = Some(IndexSize::Size16);
        assert_eq!(buffer.index_count(), 3);
        assert_eq!(buffer.index(2), Some(0x0102));
        assert_eq!(buffer.index(3), None);
    }

    #[test]
    fn test_cube_texture_stores_six_faces_of_every_level() {
        let desc = TextureDescriptor {
            texture_type: TextureType::Cube,
            width: 4,
            height: 4,
            level_count: 2,
            ..Default::default()
        };
        let mut texture = TextureEntry::new(&desc).unwrap();

        texture.update(&[5; 16], 1, TextureFace::NegativeZ).unwrap();

        assert_eq!(texture.level(0, TextureFace::PositiveX).map(<[u8]>::len), Some(64));
        assert_eq!(texture.level(1, TextureFace::NegativeZ), Some(&[5u8; 16][..]));
        assert!(texture.update(&[0; 17], 1, TextureFace::PositiveY).is_err());
    }

    #[test]
    fn test_texture_initial_data_is_face_major() {
        let level0 = [1u8; 16];
        let level1 = [2u8; 4];
        let desc = TextureDescriptor {
            width: 2,
            height: 2,
            level_count: 2,
            initial_data: vec![&level0[..], &level1[..]],
            ..Default::default()
        };
        let texture = TextureEntry::new(&desc).unwrap();
        assert_eq!(texture.level(0, TextureFace::PositiveX), Some(&level0[..]));
        assert_eq!(texture.level(1, TextureFace::PositiveX), Some(&level1[..]));
    }

    #[test]
    fn test_query_counts_accumulate_per_slot() {
        let mut queries = QueryBufferEntry::new(2);
        queries.add(1, 3).unwrap();
        queries.add(1, 4).unwrap();
        assert_eq!(queries.values, vec![0, 7]);
        assert_eq!(queries.written, vec![false, true]);
        assert!(queries.add(2, 1).is_err());

        queries.reset();
        assert_eq!(queries.values, vec![0, 0]);
    }

    #[test]
    fn test_const_write_does_not_touch_snapshots() {
        let mut cb = ConstBufferEntry::new(ProgType::Vertex, 2);
        let snapshot = Arc::clone(&cb.data);

        cb.write(4, &[1.0, 2.0]).unwrap();

        assert_eq!(snapshot[4], 0.0);
        assert_eq!(cb.data[4..6], [1.0, 2.0]);
        assert!(cb.write(7, &[0.0, 0.0]).is_err());
    }
}
