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

use std::{env, path::PathBuf};

use anyhow::Context;
use clap::Parser;

use boundary_perf::{
    init_tracing, is_ci_context,
    report::{metrics_sink, CI_ENV, SDK_TYPE},
    scenario::{self, ScenarioOptions},
    BenchmarkContext, Reporter, SdkMetadata, DEFAULT_ITERATIONS,
};
use native_host_sdk::{AddressingMode, DirectoryBundle, NativeBoundary, ProvisionConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct BenchArgs {
    /// Iterations per scenario
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Run only scenarios whose name contains this text, or "all"
    #[arg(short, long, default_value = "all")]
    scenario: String,

    /// Exported nullary native function to time. May be repeated.
    #[arg(long = "symbol")]
    symbols: Vec<String>,

    /// Directory holding the native resource bundle
    #[arg(short, long, default_value = ".")]
    bundle_dir: PathBuf,

    /// Base name of the native library. Overrides NATIVE_LIBRARY_NAME.
    #[arg(long)]
    library_name: Option<String>,

    /// Use flat bundle addressing instead of per-platform directories
    #[arg(long)]
    flat: bool,

    /// The random number seed to use. If not specified, a random seed will be used.
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write the SDK metadata descriptor
    #[arg(long, env = "BENCH_METADATA_FILE")]
    metadata_file: Option<PathBuf>,

    /// JSON lines file receiving benchmark records in CI. Logged if not set.
    #[arg(long, env = "BENCH_METRICS_FILE")]
    metrics_file: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl BenchArgs {
    fn provision_config(&self) -> anyhow::Result<ProvisionConfig> {
        let mut config = ProvisionConfig::from_env()?;
        if let Some(name) = &self.library_name {
            config.library_name = name.clone();
        }
        if self.flat {
            config.addressing = AddressingMode::Flat;
        }
        Ok(config)
    }
}

#[allow(clippy::print_stdout)]
fn main() -> anyhow::Result<()> {
    let args = BenchArgs::parse();
    init_tracing(&args.log_level);

    let config = args.provision_config()?;
    let bundle = DirectoryBundle::new(&args.bundle_dir);
    let boundary = NativeBoundary::initialize(&config, &bundle);

    let metadata = SdkMetadata::new(SDK_TYPE, env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.metadata_file {
        metadata.write_to(path)?;
    }

    // fail on a bad metrics path before any scenario runs
    let ci = is_ci_context(env::var(CI_ENV).ok().as_deref());
    let sink = metrics_sink(ci, args.metrics_file.as_deref())?;

    let scenarios = scenario::get_scenarios(
        &args.scenario,
        Some(boundary),
        &ScenarioOptions {
            seed: args.seed,
            symbols: args.symbols.clone(),
        },
    );

    if scenarios.is_empty() {
        println!("Scenario {} not found", args.scenario);
        return Ok(());
    }

    println!("Native Boundary Bench (v{})", metadata.sdk_version);
    println!("--------------------------------");
    println!(
        "Platform: {}, native library loaded: {}",
        boundary.descriptor(),
        boundary.is_loaded()
    );

    let mut context = BenchmarkContext::new(args.iterations);
    for mut scenario in scenarios {
        let name = scenario.name();
        log::info!("Running scenario {name}");
        context
            .benchmark(name.clone(), || scenario.run_once())
            .with_context(|| format!("Scenario {name} failed"))?;
    }

    let mut reporter = Reporter::new(metadata, ci, sink);
    let emitted = reporter.report(&context, &mut std::io::stdout().lock())?;
    log::info!("Emitted {emitted} benchmark record(s)");

    println!("\n");
    Ok(())
}
