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

//! Result reporting and CI-gated metric emission.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::harness::BenchmarkContext;

/// Environment variable naming the execution context.
pub const CI_ENV: &str = "CI";

pub const SDK_TYPE: &str = "native-host-sdk-rust";

/// Whether `value` marks a CI run. Only the exact strings `"1"` and `"true"`
/// count; `"TRUE"` or `"yes"` do not.
pub fn is_ci_context(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

/// One report line: name padded to 50 columns, p99 with four decimals.
pub fn format_result_line(name: &str, p99_ms: f64) -> String {
    format!("{name:<50} {p99_ms:.4}ms")
}

/// Descriptor of the SDK under test, written once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkMetadata {
    pub sdk_type: String,
    pub sdk_version: String,
}

impl SdkMetadata {
    pub fn new(sdk_type: impl Into<String>, sdk_version: impl Into<String>) -> Self {
        Self {
            sdk_type: sdk_type.into(),
            sdk_version: sdk_version.into(),
        }
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write metadata file {}", path.display()))
    }
}

/// A single emitted benchmark result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRecord {
    pub benchmark_name: String,
    pub sdk_type: String,
    pub sdk_version: String,
    pub p99_ms: f64,
}

/// Destination for benchmark records in CI runs.
pub trait MetricsSink {
    fn emit(&mut self, record: &BenchmarkRecord) -> anyhow::Result<()>;

    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per record to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open metrics file {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonLinesSink {
    fn emit(&mut self, record: &BenchmarkRecord) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Emits records through the log facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn emit(&mut self, record: &BenchmarkRecord) -> anyhow::Result<()> {
        log::info!("sdk_benchmark {}", serde_json::to_string(record)?);
        Ok(())
    }
}

/// Choose where records go. Outside CI nothing is emitted, so `metrics_file`
/// is left untouched; in CI it is opened (and must be writable) up front.
pub fn metrics_sink(
    ci: bool,
    metrics_file: Option<&Path>,
) -> anyhow::Result<Box<dyn MetricsSink>> {
    match metrics_file {
        Some(path) if ci => Ok(Box::new(JsonLinesSink::open(path)?)),
        _ => Ok(Box::new(LogSink)),
    }
}

/// Prints results and forwards them to a sink when running in CI.
pub struct Reporter {
    metadata: SdkMetadata,
    ci: bool,
    sink: Box<dyn MetricsSink>,
}

impl Reporter {
    pub fn new(metadata: SdkMetadata, ci: bool, sink: Box<dyn MetricsSink>) -> Self {
        Self { metadata, ci, sink }
    }

    /// Write one line per result to `out`. Returns the number of records
    /// emitted to the sink, which is zero outside CI.
    pub fn report(
        &mut self,
        context: &BenchmarkContext,
        out: &mut dyn Write,
    ) -> anyhow::Result<usize> {
        let mut emitted = 0;

        for (name, p99_ms) in context.results() {
            writeln!(out, "{}", format_result_line(name, p99_ms))?;

            if !self.ci {
                continue;
            }

            self.sink.emit(&BenchmarkRecord {
                benchmark_name: name.to_string(),
                sdk_type: self.metadata.sdk_type.clone(),
                sdk_version: self.metadata.sdk_version.clone(),
                p99_ms,
            })?;
            emitted += 1;
        }

        self.sink.flush()?;
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct CollectingSink {
        records: Arc<Mutex<Vec<BenchmarkRecord>>>,
    }

    impl MetricsSink for CollectingSink {
        fn emit(&mut self, record: &BenchmarkRecord) -> anyhow::Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn context() -> BenchmarkContext {
        let mut context = BenchmarkContext::new(10);
        context.benchmark("noop", || Ok::<(), ()>(())).unwrap();
        context
    }

    #[test]
    fn test_ci_context_is_exact() {
        assert!(is_ci_context(Some("1")));
        assert!(is_ci_context(Some("true")));

        for value in ["TRUE", "True", "yes", "", "0", "false", " 1"] {
            assert!(!is_ci_context(Some(value)), "{value:?} must not enable emission");
        }
        assert!(!is_ci_context(None));
    }

    #[test]
    fn test_result_line_format() {
        let line = format_result_line("check_gate", 0.012345);
        assert_eq!(line, format!("{:<50} 0.0123ms", "check_gate"));
        assert_eq!(line.len(), 50 + 1 + "0.0123ms".len());
    }

    #[test]
    fn test_report_emits_only_in_ci() {
        let metadata = SdkMetadata::new("sdk", "1.2.3");

        let sink = CollectingSink::default();
        let mut reporter = Reporter::new(metadata.clone(), false, Box::new(sink.clone()));
        let mut out = Vec::new();
        assert_eq!(reporter.report(&context(), &mut out).unwrap(), 0);
        assert!(sink.records.lock().unwrap().is_empty());
        assert!(String::from_utf8(out).unwrap().starts_with("noop "));

        let sink = CollectingSink::default();
        let mut reporter = Reporter::new(metadata, true, Box::new(sink.clone()));
        let mut out = Vec::new();
        assert_eq!(reporter.report(&context(), &mut out).unwrap(), 1);

        let records = sink.records.lock().unwrap();
        assert_eq!(records[0].benchmark_name, "noop");
        assert_eq!(records[0].sdk_type, "sdk");
        assert_eq!(records[0].sdk_version, "1.2.3");
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let record = BenchmarkRecord {
            benchmark_name: "noop".to_string(),
            sdk_type: "sdk".to_string(),
            sdk_version: "1.0.0".to_string(),
            p99_ms: 0.5,
        };

        for _ in 0..2 {
            let mut sink = JsonLinesSink::open(&path).unwrap();
            sink.emit(&record).unwrap();
            sink.flush().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["benchmarkName"], "noop");
        assert_eq!(value["p99Ms"], 0.5);
    }

    #[test]
    fn test_metrics_file_untouched_outside_ci() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let unwritable = dir.path().join("missing-dir").join("metrics.jsonl");

        assert!(metrics_sink(false, Some(&path)).is_ok());
        assert!(!path.exists());
        assert!(metrics_sink(false, Some(&unwritable)).is_ok());
        assert!(metrics_sink(false, None).is_ok());
    }

    #[test]
    fn test_metrics_file_opened_in_ci() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");

        let mut sink = metrics_sink(true, Some(&path)).unwrap();
        assert!(path.exists());
        sink.emit(&BenchmarkRecord {
            benchmark_name: "noop".to_string(),
            sdk_type: "sdk".to_string(),
            sdk_version: "1.0.0".to_string(),
            p99_ms: 0.25,
        })
        .unwrap();
        sink.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);

        let unwritable = dir.path().join("missing-dir").join("metrics.jsonl");
        assert!(metrics_sink(true, Some(&unwritable)).is_err());
        assert!(metrics_sink(true, None).is_ok());
    }

    #[test]
    fn test_metadata_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        SdkMetadata::new("sdk", "2.0.0").write_to(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"sdk_type": "sdk", "sdk_version": "2.0.0"})
        );
    }
}
