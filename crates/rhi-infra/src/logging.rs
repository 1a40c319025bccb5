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

//! Logger installation for binaries and tests built on the RHI.

use env_logger::{Builder, Env};

/// Installs the process-wide logger.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Installing twice
/// is harmless: the second call returns `false` and keeps the first logger.
pub fn init_logging() -> bool {
    Builder::from_env(Env::default().default_filter_or("info"))
        .try_init()
        .is_ok()
}

/// Installs a logger that captures output for the test harness.
pub fn init_test_logging() {
    let _ = Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
