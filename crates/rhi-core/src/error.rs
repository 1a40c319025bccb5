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

//! Defines the hierarchy of error types for the render hardware interface.
//!
//! Contract violations that the original design only asserted on (stale
//! handles, wrong resource kinds, exhausted pools, commands recorded outside of
//! a `begin`/`end` window) are reported as values in every build configuration.

use crate::api::Api;
use crate::handle::ResourceType;
use std::fmt;

/// An error raised while resolving a shader program for a pipeline state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// No program with this uid was registered in the shader cache.
    NotFound {
        /// The uid of the missing program.
        uid: String,
    },
    /// The program exists but was registered for another stage.
    InvalidType {
        /// The uid of the program.
        uid: String,
    },
    /// The pipeline state has no const buffer at the requested index.
    ConstBufferOutOfRange {
        /// The requested const buffer index.
        index: u32,
        /// The number of const buffers declared by the program.
        count: u32,
    },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::NotFound { uid } => write!(f, "Program '{uid}' is not registered"),
            ProgramError::InvalidType { uid } => {
                write!(f, "Program '{uid}' is registered for another stage")
            }
            ProgramError::ConstBufferOutOfRange { index, count } => write!(
                f,
                "Const buffer index {index} out of range (program declares {count})"
            ),
        }
    }
}

impl std::error::Error for ProgramError {}

/// An error related to the creation, lookup or use of a resource handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The handle is the invalid (zero) handle.
    InvalidHandle,
    /// The handle refers to a slot that has since been freed or reused.
    StaleHandle {
        /// The resource kind of the pool.
        kind: ResourceType,
        /// The slot index carried by the handle.
        index: u16,
        /// The generation carried by the handle.
        generation: u8,
        /// The generation currently stored in the slot.
        current: u8,
    },
    /// The handle's type tag does not match the pool it was presented to.
    TypeMismatch {
        /// The resource kind the pool stores.
        expected: ResourceType,
        /// The raw tag found in the handle.
        found: u8,
    },
    /// Every slot of the pool is allocated.
    PoolExhausted {
        /// The resource kind of the pool.
        kind: ResourceType,
        /// The fixed capacity of the pool.
        capacity: usize,
    },
    /// The capacity of a pool can only change before its first allocation.
    CapacityLocked,
    /// The slot addressed by the handle is not allocated.
    NotFound,
    /// An access went past the end of a resource.
    OutOfBounds,
    /// `unmap` was called on a resource that is not mapped.
    NotMapped,
    /// `map` was called on a resource that is already mapped.
    AlreadyMapped,
    /// The operation is not supported by the active backend.
    Unsupported(String),
    /// A program lookup failed.
    Program(ProgramError),
    /// An error originating from the specific backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle."),
            ResourceError::StaleHandle {
                kind,
                index,
                generation,
                current,
            } => write!(
                f,
                "Stale {kind:?} handle: slot {index} has generation {current}, handle carries {generation}"
            ),
            ResourceError::TypeMismatch { expected, found } => write!(
                f,
                "Handle type tag {found} does not match pool of {expected:?}"
            ),
            ResourceError::PoolExhausted { kind, capacity } => {
                write!(f, "{kind:?} pool exhausted ({capacity} slots)")
            }
            ResourceError::CapacityLocked => {
                write!(f, "Pool capacity is fixed once the pool has been used")
            }
            ResourceError::NotFound => write!(f, "Resource not found."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::NotMapped => write!(f, "Resource is not mapped."),
            ResourceError::AlreadyMapped => write!(f, "Resource is already mapped."),
            ResourceError::Unsupported(msg) => write!(f, "Unsupported operation: {msg}"),
            ResourceError::Program(err) => write!(f, "Program error: {err}"),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Program(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProgramError> for ResourceError {
    fn from(err: ProgramError) -> Self {
        ResourceError::Program(err)
    }
}

/// An error raised while recording into a command buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command buffer is not between `begin` and `end`.
    NotRecording,
    /// `end` was called twice.
    AlreadyEnded,
    /// The command buffer was submitted or replayed before `end`.
    NotEnded,
    /// A binding slot is outside the range allowed for its stage.
    InvalidSlot {
        /// What kind of slot was addressed.
        what: &'static str,
        /// The requested slot.
        slot: u32,
        /// The number of slots available.
        max: u32,
    },
    /// A resource referenced by the command could not be resolved.
    Resource(ResourceError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::NotRecording => write!(f, "Command buffer is not recording"),
            CommandError::AlreadyEnded => write!(f, "Command buffer was already ended"),
            CommandError::NotEnded => write!(f, "Command buffer was not ended"),
            CommandError::InvalidSlot { what, slot, max } => {
                write!(f, "Invalid {what} slot {slot} (max {max})")
            }
            CommandError::Resource(err) => write!(f, "Command resource error: {err}"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for CommandError {
    fn from(err: ResourceError) -> Self {
        CommandError::Resource(err)
    }
}

/// A high-level error that can occur within the render hardware interface.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the device was initialized or after it was torn down.
    NotInitialized,
    /// The requested graphics API is not available on this platform.
    UnsupportedApi(Api),
    /// The backend failed to initialize.
    InitializationFailed(String),
    /// The device was lost and frames are rejected until it is restored.
    DeviceLost,
    /// An error related to a resource.
    Resource(ResourceError),
    /// An error related to command recording.
    Command(CommandError),
    /// An unexpected internal error.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => write!(f, "Render device is not initialized"),
            RenderError::UnsupportedApi(api) => {
                write!(f, "Graphics API {api:?} is not supported on this platform")
            }
            RenderError::InitializationFailed(msg) => {
                write!(f, "Render device initialization failed: {msg}")
            }
            RenderError::DeviceLost => write!(f, "Render device lost"),
            RenderError::Resource(err) => write!(f, "Resource error: {err}"),
            RenderError::Command(err) => write!(f, "Command error: {err}"),
            RenderError::Internal(msg) => write!(f, "Internal render error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Resource(err) => Some(err),
            RenderError::Command(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

impl From<CommandError> for RenderError {
    fn from(err: CommandError) -> Self {
        RenderError::Command(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_stale_handle_message_names_both_generations() {
        let err = ResourceError::StaleHandle {
            kind: ResourceType::VertexBuffer,
            index: 3,
            generation: 1,
            current: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("slot 3"));
        assert!(msg.contains("generation 2"));
    }

    #[test]
    fn test_error_sources_chain() {
        let err: RenderError = CommandError::from(ResourceError::InvalidHandle).into();
        let source = err.source().expect("render error wraps a command error");
        assert!(source.source().is_some());
    }
}
