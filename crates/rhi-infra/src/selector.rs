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

//! Backend selection.
//!
//! The render device asks a [`BackendSelector`] for the backend of a
//! requested API. This selector builds one of the backends of this crate,
//! configured for that API.

use crate::null::NullBackend;
#[cfg(feature = "software")]
use crate::software::SoftwareBackend;
use rhi_core::api::{Api, InitParam};
use rhi_core::{BackendSelector, RenderBackend, RenderError};
use std::sync::Arc;

/// The backends this crate provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Host-memory device emulating the requested API.
    #[cfg(feature = "software")]
    Software,
    /// Device that accepts everything and renders nothing.
    Null,
}

impl Default for BackendKind {
    fn default() -> Self {
        #[cfg(feature = "software")]
        {
            BackendKind::Software
        }
        #[cfg(not(feature = "software"))]
        {
            BackendKind::Null
        }
    }
}

/// Returns a human-readable name for a backend kind.
pub fn backend_name(kind: BackendKind) -> &'static str {
    match kind {
        #[cfg(feature = "software")]
        BackendKind::Software => "Software",
        BackendKind::Null => "Null",
    }
}

/// Builds the backends of this crate for the render device.
#[derive(Debug, Clone, Default)]
pub struct InfraBackendSelector {
    kind: BackendKind,
}

impl InfraBackendSelector {
    /// A selector that always builds `kind`.
    pub fn new(kind: BackendKind) -> Self {
        Self { kind }
    }

    /// The backend kind this selector builds.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }
}

impl BackendSelector for InfraBackendSelector {
    fn select(&self, api: Api, params: &InitParam) -> Result<Arc<dyn RenderBackend>, RenderError> {
        if params.width == 0 || params.height == 0 {
            return Err(RenderError::InitializationFailed(format!(
                "Invalid backbuffer size {}x{}",
                params.width, params.height
            )));
        }
        log::info!("Selecting {} backend for {api:?}", backend_name(self.kind));
        let backend: Arc<dyn RenderBackend> = match self.kind {
            #[cfg(feature = "software")]
            BackendKind::Software => Arc::new(SoftwareBackend::new(api, params)),
            BackendKind::Null => Arc::new(NullBackend::new(api, params)),
        };
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_builds_the_requested_kind() {
        // --- 1. ARRANGE ---
        let selector = InfraBackendSelector::new(BackendKind::Null);

        // --- 2. ACT ---
        let params = InitParam {
            width: 320,
            height: 240,
            ..Default::default()
        };
        let backend = selector.select(Api::Gles2, &params).unwrap();

        // --- 3. ASSERT ---
        assert_eq!(backend.api(), Api::Gles2);
        assert_eq!(backend.device_caps().device_description, "Null device");
    }

    #[test]
    fn test_selector_rejects_empty_backbuffer() {
        let params = InitParam {
            width: 0,
            ..Default::default()
        };
        let result = InfraBackendSelector::default().select(Api::Gles2, &params);
        assert!(matches!(result, Err(RenderError::InitializationFailed(_))));
    }
}
