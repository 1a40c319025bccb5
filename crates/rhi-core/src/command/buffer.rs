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

//! The command buffer: an append-only log with a begin/end recording window.

use super::op::Command;
use crate::api::{
    RenderPassConfig, MAX_CONST_BUFFER_COUNT, MAX_FRAGMENT_TEXTURE_SAMPLER_COUNT,
    MAX_VERTEX_STREAM_COUNT, MAX_VERTEX_TEXTURE_SAMPLER_COUNT,
};
use crate::error::CommandError;
use crate::handle::HSyncObject;
use std::sync::Arc;

/// Where a command buffer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    /// Allocated, never begun.
    #[default]
    Idle,
    /// Between `begin` and `end`.
    Recording,
    /// Sealed; ready to be submitted and replayed.
    Ended,
}

/// A recorded list of commands belonging to one render pass.
///
/// The first buffer of a pass opens it (applying load actions) and the last
/// one closes it (applying store actions); a single-buffer pass does both.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    state: RecordingState,
    sync: HSyncObject,
    pass_config: Arc<RenderPassConfig>,
    first_in_pass: bool,
    last_in_pass: bool,
}

impl CommandBuffer {
    /// A standalone buffer that both opens and closes its pass.
    pub fn new(pass_config: Arc<RenderPassConfig>) -> Self {
        Self::for_pass(pass_config, true, true)
    }

    /// A buffer at a given position inside a multi-buffer pass.
    pub fn for_pass(
        pass_config: Arc<RenderPassConfig>,
        first_in_pass: bool,
        last_in_pass: bool,
    ) -> Self {
        Self {
            commands: Vec::new(),
            state: RecordingState::Idle,
            sync: HSyncObject::INVALID,
            pass_config,
            first_in_pass,
            last_in_pass,
        }
    }

    /// Opens the recording window, discarding previous contents.
    pub fn begin(&mut self) {
        self.commands.clear();
        self.sync = HSyncObject::INVALID;
        self.state = RecordingState::Recording;
    }

    /// Seals the buffer. `sync` is stamped with the frame that executes it.
    pub fn end(&mut self, sync: HSyncObject) -> Result<(), CommandError> {
        match self.state {
            RecordingState::Recording => {
                self.sync = sync;
                self.state = RecordingState::Ended;
                Ok(())
            }
            RecordingState::Ended => Err(CommandError::AlreadyEnded),
            RecordingState::Idle => Err(CommandError::NotRecording),
        }
    }

    /// Appends a command after validating its slot indices.
    pub fn record(&mut self, command: Command) -> Result<(), CommandError> {
        if self.state != RecordingState::Recording {
            return Err(CommandError::NotRecording);
        }
        validate_slots(&command)?;
        self.commands.push(command);
        Ok(())
    }

    /// Recorded commands in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Sync object attached by `end`.
    pub fn sync(&self) -> HSyncObject {
        self.sync
    }

    /// Configuration of the owning pass.
    pub fn pass_config(&self) -> &RenderPassConfig {
        &self.pass_config
    }

    /// Whether this buffer opens its pass.
    pub fn is_first_in_pass(&self) -> bool {
        self.first_in_pass
    }

    /// Whether this buffer closes its pass.
    pub fn is_last_in_pass(&self) -> bool {
        self.last_in_pass
    }
}

fn check_slot(what: &'static str, slot: u32, max: usize) -> Result<(), CommandError> {
    if (slot as usize) < max {
        Ok(())
    } else {
        Err(CommandError::InvalidSlot {
            what,
            slot,
            max: max as u32,
        })
    }
}

fn validate_slots(command: &Command) -> Result<(), CommandError> {
    match command {
        Command::SetVertexData { stream, .. } => {
            check_slot("vertex stream", *stream, MAX_VERTEX_STREAM_COUNT)
        }
        Command::SetVertexConstBuffer { slot, .. } => {
            check_slot("vertex const buffer", *slot, MAX_CONST_BUFFER_COUNT)
        }
        Command::SetFragmentConstBuffer { slot, .. } => {
            check_slot("fragment const buffer", *slot, MAX_CONST_BUFFER_COUNT)
        }
        Command::SetVertexTexture { unit, .. } => {
            check_slot("vertex texture", *unit, MAX_VERTEX_TEXTURE_SAMPLER_COUNT)
        }
        Command::SetFragmentTexture { unit, .. } => {
            check_slot("fragment texture", *unit, MAX_FRAGMENT_TEXTURE_SAMPLER_COUNT)
        }
        _ => Ok(()),
    }
}
