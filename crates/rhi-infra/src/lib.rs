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

//! # RHI Infra
//!
//! Concrete backends for `rhi-core`: a software device that keeps every
//! resource in host memory and validates each replayed command, and a null
//! device for headless runs. Also hosts backend selection and logger setup.

#![warn(missing_docs)]

pub mod logging;
pub mod null;
pub mod selector;
#[cfg(feature = "software")]
pub mod software;

pub use logging::init_logging;
pub use null::NullBackend;
pub use selector::{BackendKind, InfraBackendSelector};
#[cfg(feature = "software")]
pub use software::{FrameLog, NativeCall, SoftwareBackend};
