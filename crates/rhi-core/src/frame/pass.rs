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

//! Render passes: a configuration plus the command buffers recorded into it.

use crate::api::{RenderPassConfig, MAX_RENDER_PASS_COMMAND_BUFFER_COUNT};
use crate::error::{CommandError, ResourceError};
use crate::handle::HCommandBuffer;
use std::sync::Arc;

/// Lifecycle of a render pass inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassState {
    /// Allocated, not yet queued.
    #[default]
    Allocated,
    /// Queued into the current frame.
    Begun,
    /// Closed; its buffers are submitted at the next present.
    Ended,
}

/// A render pass owned by the device until the frame that contains it is presented.
#[derive(Debug, Clone)]
pub struct RenderPass {
    config: Arc<RenderPassConfig>,
    command_buffers: Vec<HCommandBuffer>,
    state: PassState,
}

impl RenderPass {
    /// Creates a pass owning `command_buffers`, in recording order.
    pub fn new(config: Arc<RenderPassConfig>, command_buffers: Vec<HCommandBuffer>) -> Self {
        Self {
            config,
            command_buffers,
            state: PassState::Allocated,
        }
    }

    /// The pass configuration shared with its command buffers.
    pub fn config(&self) -> &Arc<RenderPassConfig> {
        &self.config
    }

    /// Command buffers of the pass, the first one opens it and the last one closes it.
    pub fn command_buffers(&self) -> &[HCommandBuffer] {
        &self.command_buffers
    }

    /// Submission priority; lower values execute first.
    pub fn priority(&self) -> i32 {
        self.config.priority
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PassState {
        self.state
    }

    /// Marks the pass as queued into the frame.
    pub fn begin(&mut self) -> Result<(), CommandError> {
        match self.state {
            PassState::Allocated => {
                self.state = PassState::Begun;
                Ok(())
            }
            PassState::Begun => Err(CommandError::NotEnded),
            PassState::Ended => Err(CommandError::AlreadyEnded),
        }
    }

    /// Closes the pass.
    pub fn end(&mut self) -> Result<(), CommandError> {
        match self.state {
            PassState::Begun => {
                self.state = PassState::Ended;
                Ok(())
            }
            PassState::Allocated => Err(CommandError::NotRecording),
            PassState::Ended => Err(CommandError::AlreadyEnded),
        }
    }
}

/// Checks the number of command buffers requested for one pass.
pub fn validate_command_buffer_count(count: u32) -> Result<(), ResourceError> {
    if count == 0 || count as usize > MAX_RENDER_PASS_COMMAND_BUFFER_COUNT {
        return Err(ResourceError::OutOfBounds);
    }
    Ok(())
}
