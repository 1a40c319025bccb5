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

//! Command recording and replay.
//!
//! A [`CommandBuffer`] is recorded on any thread between `begin` and `end`,
//! moved to the executing side as an immutable value when its frame is
//! presented, and replayed there onto a backend's [`NativeDevice`].

mod buffer;
mod op;
mod replay;

pub use self::buffer::{CommandBuffer, RecordingState};
pub use self::op::{Command, ConstSnapshot, DrawCall};
pub use self::replay::{replay, NativeDevice, PassClear, ReplayStats};
