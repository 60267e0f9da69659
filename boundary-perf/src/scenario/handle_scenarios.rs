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

use std::hint::black_box;

use native_host_sdk::{is_library_loaded, HandleKind, HandleRegistry};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use super::BoundaryScenario;

const GLOBAL_USER_ID: &str = "global_user";
const RANDOM_USER_ID_RANGE: u32 = 1_000_000;

/// Reads the cached load gate.
pub struct BoundaryGateCheckScenario {}

impl BoundaryGateCheckScenario {
    pub fn new() -> BoundaryGateCheckScenario {
        BoundaryGateCheckScenario {}
    }
}

impl BoundaryScenario for BoundaryGateCheckScenario {
    fn name(&self) -> String {
        String::from("boundary_gate_check")
    }

    fn run_once(&mut self) -> anyhow::Result<()> {
        black_box(is_library_loaded());
        Ok(())
    }
}

/// Source of the user id stored in each request context.
pub enum UserIds {
    Global,
    Random(Pcg64),
}

impl UserIds {
    pub fn random(seed: u64) -> UserIds {
        UserIds::Random(Pcg64::seed_from_u64(seed))
    }

    fn label(&self) -> &'static str {
        match self {
            UserIds::Global => "global",
            UserIds::Random(_) => "random",
        }
    }

    fn next_id(&mut self) -> String {
        match self {
            UserIds::Global => GLOBAL_USER_ID.to_string(),
            UserIds::Random(rng) => format!("user_{}", rng.gen_range(0..RANDOM_USER_ID_RANGE)),
        }
    }
}

/// Creates a request context handle and releases it again.
pub struct HandleCreateReleaseScenario {
    contexts: HandleRegistry<String>,
    ids: UserIds,
}

impl HandleCreateReleaseScenario {
    pub fn new(ids: UserIds) -> HandleCreateReleaseScenario {
        HandleCreateReleaseScenario {
            contexts: HandleRegistry::new(HandleKind::RequestContext),
            ids,
        }
    }
}

impl BoundaryScenario for HandleCreateReleaseScenario {
    fn name(&self) -> String {
        format!("handle_create_release_{}_context", self.ids.label())
    }

    fn run_once(&mut self) -> anyhow::Result<()> {
        let id = self.ids.next_id();
        let reference = self.contexts.create(id.clone());
        let released = self.contexts.release(&reference)?;
        if released != id {
            anyhow::bail!("Handle {reference} released '{released}', expected '{id}'");
        }
        Ok(())
    }
}

/// Resolves a long-lived request context handle.
pub struct HandleLookupScenario {
    contexts: HandleRegistry<String>,
    reference: String,
}

impl HandleLookupScenario {
    pub fn new() -> HandleLookupScenario {
        let mut contexts = HandleRegistry::new(HandleKind::RequestContext);
        let reference = contexts.create(GLOBAL_USER_ID.to_string());
        HandleLookupScenario {
            contexts,
            reference,
        }
    }
}

impl BoundaryScenario for HandleLookupScenario {
    fn name(&self) -> String {
        String::from("handle_lookup_global_context")
    }

    fn run_once(&mut self) -> anyhow::Result<()> {
        let user = self.contexts.get(&self.reference)?;
        black_box(user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_follow_seed() {
        let mut a = UserIds::random(9);
        let mut b = UserIds::random(9);
        for _ in 0..10 {
            let id = a.next_id();
            assert!(id.starts_with("user_"));
            assert_eq!(id, b.next_id());
        }
    }

    #[test]
    fn test_create_release_leaves_registry_empty() {
        let mut scenario = HandleCreateReleaseScenario::new(UserIds::Global);
        for _ in 0..5 {
            scenario.run_once().unwrap();
        }
        assert!(scenario.contexts.is_empty());
    }

    #[test]
    fn test_lookup_fails_once_released() {
        let mut scenario = HandleLookupScenario::new();
        scenario.run_once().unwrap();

        let reference = scenario.reference.clone();
        scenario.contexts.release(&reference).unwrap();
        assert!(scenario.run_once().is_err());
    }
}
