// Copyright 2025 The Drasi Authors.
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

use native_host_sdk::NativeBoundary;

use super::BoundaryScenario;

/// Invokes an exported nullary native function.
pub struct NativeCallScenario {
    boundary: &'static NativeBoundary,
    symbol: String,
}

impl NativeCallScenario {
    pub fn new(boundary: &'static NativeBoundary, symbol: &str) -> NativeCallScenario {
        NativeCallScenario {
            boundary,
            symbol: symbol.to_string(),
        }
    }
}

impl BoundaryScenario for NativeCallScenario {
    fn name(&self) -> String {
        format!("native_call:{}", self.symbol)
    }

    fn run_once(&mut self) -> anyhow::Result<()> {
        // SAFETY: symbols passed on the command line must be `extern "C" fn()`.
        unsafe { self.boundary.invoke_nullary(&self.symbol)? };
        Ok(())
    }
}
