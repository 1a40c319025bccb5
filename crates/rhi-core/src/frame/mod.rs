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

//! Render passes, frames and their execution.
//!
//! Passes are begun into the frame being built. `present` moves their sealed
//! command buffers into a [`FrameSubmission`], which the [`FrameExecutor`]
//! runs on the backend.

mod executor;
mod pass;
mod submission;

pub use self::executor::FrameExecutor;
pub use self::pass::{validate_command_buffer_count, PassState, RenderPass};
pub use self::submission::{FrameBuilder, FrameSubmission, SubmittedPass};
