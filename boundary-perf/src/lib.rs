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

//! Tail-latency benchmarks for operations that cross the native boundary.

pub mod harness;
pub mod report;
pub mod scenario;

pub use harness::{percentile, run, BenchmarkContext, BenchmarkSample, DEFAULT_ITERATIONS, P99};
pub use report::{
    format_result_line, is_ci_context, metrics_sink, BenchmarkRecord, JsonLinesSink, LogSink,
    MetricsSink, Reporter, SdkMetadata,
};

/// Initialize the global tracing subscriber with an env filter and fmt layer.
///
/// Also installs the `tracing-log` bridge so `log::info!()` from the SDK is
/// captured. `default_level` is used when `RUST_LOG` is not set.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();

    // log -> tracing bridge; already installed if the subscriber did it
    let _ = tracing_log::LogTracer::init();

    tracing::debug!("Tracing initialized at default level {default_level}");
}
