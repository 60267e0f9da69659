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

//! Runs the built-in scenarios end to end and checks the emitted records.

use boundary_perf::scenario::{get_scenarios, ScenarioOptions};
use boundary_perf::{
    format_result_line, BenchmarkContext, BenchmarkRecord, JsonLinesSink, Reporter, SdkMetadata,
};

#[test]
fn test_scenarios_report_to_json_lines_in_ci() {
    let dir = tempfile::tempdir().unwrap();
    let metrics_path = dir.path().join("metrics.jsonl");

    let options = ScenarioOptions {
        seed: Some(1234),
        symbols: vec![],
    };
    let mut context = BenchmarkContext::new(500);
    for mut scenario in get_scenarios("all", None, &options) {
        let name = scenario.name();
        let sample = context.benchmark(name, || scenario.run_once()).unwrap();
        assert_eq!(sample.durations_ms().len(), 500);
    }

    let sink = JsonLinesSink::open(&metrics_path).unwrap();
    let mut reporter = Reporter::new(SdkMetadata::new("bench-sdk", "0.0.1"), true, Box::new(sink));
    let mut out = Vec::new();
    let emitted = reporter.report(&context, &mut out).unwrap();
    assert_eq!(emitted, 4);

    let printed = String::from_utf8(out).unwrap();
    let records: Vec<BenchmarkRecord> = std::fs::read_to_string(&metrics_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 4);

    for (record, line) in records.iter().zip(printed.lines()) {
        assert_eq!(record.sdk_type, "bench-sdk");
        assert_eq!(record.sdk_version, "0.0.1");
        assert!(record.p99_ms >= 0.0);
        assert_eq!(line, format_result_line(&record.benchmark_name, record.p99_ms));
    }
}

#[test]
fn test_local_run_writes_no_records() {
    let dir = tempfile::tempdir().unwrap();
    let metrics_path = dir.path().join("metrics.jsonl");

    let mut context = BenchmarkContext::new(50);
    for mut scenario in get_scenarios("boundary_gate_check", None, &ScenarioOptions::default()) {
        let name = scenario.name();
        context.benchmark(name, || scenario.run_once()).unwrap();
    }

    let sink = JsonLinesSink::open(&metrics_path).unwrap();
    let mut reporter = Reporter::new(SdkMetadata::new("bench-sdk", "0.0.1"), false, Box::new(sink));
    let mut out = Vec::new();
    assert_eq!(reporter.report(&context, &mut out).unwrap(), 0);

    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    assert_eq!(std::fs::read_to_string(&metrics_path).unwrap(), "");
}
