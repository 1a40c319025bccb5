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

//! Plain data types describing resources, states and device configuration.
//!
//! Everything here is backend-agnostic and carries defaults matching what a
//! freshly created state looks like on every supported API.

mod buffer;
mod device;
mod enums;
mod pass;
mod pipeline;
mod texture;

pub use self::buffer::*;
pub use self::device::*;
pub use self::enums::*;
pub use self::pass::*;
pub use self::pipeline::*;
pub use self::texture::*;

/// Const buffer slots per program stage.
pub const MAX_CONST_BUFFER_COUNT: usize = 8;
/// Color attachments per render pass.
pub const MAX_RENDER_TARGET_COUNT: usize = 2;
/// Texture units of the fragment stage.
pub const MAX_FRAGMENT_TEXTURE_SAMPLER_COUNT: usize = 8;
/// Texture units of the vertex stage.
pub const MAX_VERTEX_TEXTURE_SAMPLER_COUNT: usize = 2;
/// Vertex streams a draw can read from.
pub const MAX_VERTEX_STREAM_COUNT: usize = 4;
/// Elements a vertex layout can hold.
pub const MAX_VERTEX_LAYOUT_ELEMENT_COUNT: usize = 8;
/// Command buffers a single render pass may own.
pub const MAX_RENDER_PASS_COMMAND_BUFFER_COUNT: usize = 8;
