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

//! Host-memory backend that emulates the conventions of any supported API.

mod caps;
mod device;
mod native;
mod resources;

pub use caps::{emulated_caps, format_supported};
pub use device::{ResourceCounts, SoftwareBackend, FRAME_LOG_CAPACITY};
pub use native::{FrameLog, NativeCall, NO_QUERY_INDEX};
