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

//! Timing loop and tail-latency statistics.

use std::time::Instant;

/// Iterations per benchmark; large enough to stabilize the p99 estimate.
pub const DEFAULT_ITERATIONS: usize = 100_000;

pub const P99: f64 = 0.99;

/// Run `action` `iterations` times and return the per-call durations in
/// fractional milliseconds, sorted ascending.
///
/// The first error aborts the remaining iterations and is returned as is;
/// no partial result is produced.
pub fn run<F, E>(iterations: usize, mut action: F) -> Result<Vec<f64>, E>
where
    F: FnMut() -> Result<(), E>,
{
    let mut durations = Vec::with_capacity(iterations);

    for _ in 0..iterations {
        let start = Instant::now();
        action()?;
        durations.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    durations.sort_by(f64::total_cmp);
    Ok(durations)
}

/// Nearest-rank percentile of an ascending sequence: `sorted[floor(len * p)]`.
///
/// Not interpolated. `p = 1.0` selects the maximum.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let index = ((sorted.len() as f64) * p).floor() as usize;
    sorted.get(index.min(sorted.len() - 1)).copied()
}

/// One named benchmark's durations.
#[derive(Debug, Clone)]
pub struct BenchmarkSample {
    name: String,
    durations_ms: Vec<f64>,
}

impl BenchmarkSample {
    /// `durations_ms` is sorted on construction.
    pub fn new(name: impl Into<String>, mut durations_ms: Vec<f64>) -> Self {
        durations_ms.sort_by(f64::total_cmp);
        Self {
            name: name.into(),
            durations_ms,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn durations_ms(&self) -> &[f64] {
        &self.durations_ms
    }

    pub fn p99(&self) -> Option<f64> {
        percentile(&self.durations_ms, P99)
    }
}

/// Accumulates the samples of a benchmark run, in the order they ran.
#[derive(Debug)]
pub struct BenchmarkContext {
    iterations: usize,
    samples: Vec<BenchmarkSample>,
}

impl BenchmarkContext {
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            samples: Vec::new(),
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Time `action` under `name` and record the sample.
    pub fn benchmark<F, E>(
        &mut self,
        name: impl Into<String>,
        action: F,
    ) -> Result<&BenchmarkSample, E>
    where
        F: FnMut() -> Result<(), E>,
    {
        let durations = run(self.iterations, action)?;
        let sample = BenchmarkSample::new(name, durations);
        log::debug!(
            "Benchmark {} finished with {} samples",
            sample.name(),
            sample.durations_ms().len()
        );
        self.samples.push(sample);
        Ok(&self.samples[self.samples.len() - 1])
    }

    pub fn samples(&self) -> &[BenchmarkSample] {
        &self.samples
    }

    /// Scenario name to p99, skipping empty samples.
    pub fn results(&self) -> Vec<(&str, f64)> {
        self.samples
            .iter()
            .filter_map(|s| s.p99().map(|p99| (s.name(), p99)))
            .collect()
    }

    pub fn into_samples(self) -> Vec<BenchmarkSample> {
        self.samples
    }
}
