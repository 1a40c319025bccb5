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

//! Descriptors for vertex and index buffers.

use super::enums::{IndexSize, MemoryPool, Usage};

/// Parameters for creating a vertex buffer.
#[derive(Debug, Clone, Copy)]
pub struct VertexBufferDescriptor<'a> {
    /// Size of the buffer in bytes.
    pub size: u32,
    /// Memory pool preference.
    pub pool: MemoryPool,
    /// Update frequency hint.
    pub usage: Usage,
    /// Contents uploaded at creation. Must not exceed `size`.
    pub initial_data: Option<&'a [u8]>,
    /// Whether the buffer must be refilled by its owner after a device loss.
    pub need_restore: bool,
}

impl<'a> VertexBufferDescriptor<'a> {
    /// A descriptor for a buffer of `size` bytes with default settings.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// A descriptor sized to and initialised from `data`.
    pub fn with_data(data: &'a [u8]) -> Self {
        Self {
            size: data.len() as u32,
            initial_data: Some(data),
            ..Default::default()
        }
    }
}

impl Default for VertexBufferDescriptor<'_> {
    fn default() -> Self {
        Self {
            size: 0,
            pool: MemoryPool::Default,
            usage: Usage::Default,
            initial_data: None,
            need_restore: true,
        }
    }
}

/// Parameters for creating an index buffer.
#[derive(Debug, Clone, Copy)]
pub struct IndexBufferDescriptor<'a> {
    /// Size of the buffer in bytes.
    pub size: u32,
    /// Width of each index.
    pub index_size: IndexSize,
    /// Memory pool preference.
    pub pool: MemoryPool,
    /// Update frequency hint.
    pub usage: Usage,
    /// Contents uploaded at creation. Must not exceed `size`.
    pub initial_data: Option<&'a [u8]>,
    /// Whether the buffer must be refilled by its owner after a device loss.
    pub need_restore: bool,
}

impl<'a> IndexBufferDescriptor<'a> {
    /// A descriptor for a 16-bit index buffer of `size` bytes.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// A 16-bit index buffer initialised from `indices`.
    pub fn with_indices_u16(indices: &'a [u16]) -> Self {
        let bytes: &'a [u8] = bytemuck::cast_slice(indices);
        Self {
            size: bytes.len() as u32,
            initial_data: Some(bytes),
            ..Default::default()
        }
    }

    /// A 32-bit index buffer initialised from `indices`.
    pub fn with_indices_u32(indices: &'a [u32]) -> Self {
        let bytes: &'a [u8] = bytemuck::cast_slice(indices);
        Self {
            size: bytes.len() as u32,
            index_size: IndexSize::Size32,
            initial_data: Some(bytes),
            ..Default::default()
        }
    }
}

impl Default for IndexBufferDescriptor<'_> {
    fn default() -> Self {
        Self {
            size: 0,
            index_size: IndexSize::Size16,
            pool: MemoryPool::Default,
            usage: Usage::Default,
            initial_data: None,
            need_restore: true,
        }
    }
}
