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
use rand::Rng;

use handle_scenarios::{
    BoundaryGateCheckScenario, HandleCreateReleaseScenario, HandleLookupScenario, UserIds,
};
use native_call::NativeCallScenario;

mod handle_scenarios;
mod native_call;

/// A single operation timed by the harness.
pub trait BoundaryScenario {
    fn name(&self) -> String;
    fn run_once(&mut self) -> anyhow::Result<()>;
}

impl BoundaryScenario for Box<dyn BoundaryScenario> {
    fn name(&self) -> String {
        self.as_ref().name()
    }

    fn run_once(&mut self) -> anyhow::Result<()> {
        self.as_mut().run_once()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioOptions {
    /// Seed for the random id scenarios. A random seed is used if not set.
    pub seed: Option<u64>,
    /// Exported nullary symbols to time, one scenario each.
    pub symbols: Vec<String>,
}

// Returns the scenarios whose name contains `scenario_filter`, or all of them
// for "all". Native call scenarios are only offered when `boundary` is loaded.
pub fn get_scenarios(
    scenario_filter: &str,
    boundary: Option<&'static NativeBoundary>,
    options: &ScenarioOptions,
) -> Vec<Box<dyn BoundaryScenario>> {
    let seed = options.seed.unwrap_or_else(|| rand::thread_rng().gen());

    let mut candidates: Vec<Box<dyn BoundaryScenario>> = vec![
        Box::new(BoundaryGateCheckScenario::new()),
        Box::new(HandleCreateReleaseScenario::new(UserIds::Global)),
        Box::new(HandleCreateReleaseScenario::new(UserIds::random(seed))),
        Box::new(HandleLookupScenario::new()),
    ];

    match boundary {
        Some(boundary) if boundary.is_loaded() => {
            for symbol in &options.symbols {
                candidates.push(Box::new(NativeCallScenario::new(boundary, symbol)));
            }
        }
        _ if !options.symbols.is_empty() => {
            log::warn!(
                "Native library is not loaded, skipping {} native call scenario(s)",
                options.symbols.len()
            );
        }
        _ => {}
    }

    candidates
        .into_iter()
        .filter(|s| scenario_filter == "all" || s.name().contains(scenario_filter))
        .collect()
}
