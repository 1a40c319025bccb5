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

//! A registry of program sources keyed by uid.

use crate::api::{ProgType, MAX_CONST_BUFFER_COUNT};
use crate::error::ProgramError;
use crate::utils;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A program as handed to backends when a pipeline state is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    /// Unique name of the program.
    pub uid: String,
    /// The stage the program runs in.
    pub prog_type: ProgType,
    /// Backend-specific source text or bytecode listing.
    pub code: String,
    /// Size of each const buffer the program declares, in float4 registers.
    pub const_buffers: Vec<u32>,
}

impl ProgramSource {
    /// A program without const buffers.
    pub fn new(uid: impl Into<String>, prog_type: ProgType, code: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            prog_type,
            code: code.into(),
            const_buffers: Vec::new(),
        }
    }

    /// Declares one more const buffer of `registers` float4 registers.
    pub fn with_const_buffer(mut self, registers: u32) -> Self {
        self.const_buffers.push(registers);
        self
    }

    /// Register count of const buffer `index`.
    pub fn const_buffer_registers(&self, index: u32) -> Result<u32, ProgramError> {
        self.const_buffers
            .get(index as usize)
            .copied()
            .ok_or(ProgramError::ConstBufferOutOfRange {
                index,
                count: self.const_buffers.len() as u32,
            })
    }
}

/// Thread-safe store of registered programs.
#[derive(Debug, Default)]
pub struct ShaderCache {
    programs: RwLock<HashMap<String, Arc<ProgramSource>>>,
}

impl ShaderCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a program.
    pub fn register_program(&self, source: ProgramSource) -> Result<(), ProgramError> {
        if source.const_buffers.len() > MAX_CONST_BUFFER_COUNT {
            return Err(ProgramError::ConstBufferOutOfRange {
                index: source.const_buffers.len() as u32 - 1,
                count: MAX_CONST_BUFFER_COUNT as u32,
            });
        }
        log::debug!("Registered {:?} program '{}'", source.prog_type, source.uid);
        utils::write(&self.programs).insert(source.uid.clone(), Arc::new(source));
        Ok(())
    }

    /// Looks a program up by uid and checks its stage.
    pub fn program(
        &self,
        uid: &str,
        prog_type: ProgType,
    ) -> Result<Arc<ProgramSource>, ProgramError> {
        let programs = utils::read(&self.programs);
        let prog = programs.get(uid).ok_or_else(|| ProgramError::NotFound {
            uid: uid.to_owned(),
        })?;
        if prog.prog_type != prog_type {
            return Err(ProgramError::InvalidType {
                uid: uid.to_owned(),
            });
        }
        Ok(Arc::clone(prog))
    }

    /// Removes a program. Pipeline states already created keep their copy.
    pub fn remove_program(&self, uid: &str) -> bool {
        utils::write(&self.programs).remove(uid).is_some()
    }

    /// Number of registered programs.
    pub fn len(&self) -> usize {
        utils::read(&self.programs).len()
    }

    /// `true` when no program is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
