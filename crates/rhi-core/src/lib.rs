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

//! # RHI Core
//!
//! Foundational crate of the render hardware interface: typed resource
//! handles and their pools, resource descriptors, vertex layouts, format
//! utilities, the command log with its replay engine, render pass and frame
//! orchestration, and the [`RenderBackend`] contract concrete backends
//! implement. [`Rhi`] ties them together behind one device façade.

#![warn(missing_docs)]

pub mod api;
pub mod backend;
pub mod cache;
pub mod command;
pub mod deletion;
pub mod error;
pub mod format;
pub mod frame;
pub mod handle;
pub mod packet;
pub mod pool;
pub mod rhi;
pub mod shader_cache;
pub mod stats;
pub mod sync;
pub mod utils;
pub mod vertex_layout;

pub use backend::{api_is_supported, BackendSelector, RenderBackend};
pub use error::{CommandError, ProgramError, RenderError, ResourceError};
pub use handle::{Handle, ResourceType};
pub use packet::Packet;
pub use rhi::{MapTarget, Mapping, Rhi};
pub use shader_cache::{ProgramSource, ShaderCache};
pub use stats::FrameStats;
pub use vertex_layout::{VertexLayout, VertexLayoutRegistry};
