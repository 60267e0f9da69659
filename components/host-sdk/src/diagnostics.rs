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

//! Remediation messages for failed native library loads.

use std::fmt::Write;

use crate::config::ArtifactCoordinates;
use crate::error::FailureKind;
use crate::platform::{LinuxDistro, OsFamily, PlatformDescriptor};

/// Builds advisory text naming the artifacts a caller should add for the
/// detected platform.
#[derive(Debug, Clone)]
pub struct DiagnosticReporter {
    artifact: ArtifactCoordinates,
}

impl DiagnosticReporter {
    pub fn new(artifact: ArtifactCoordinates) -> Self {
        Self { artifact }
    }

    /// Describe a load failure on `descriptor`.
    ///
    /// Linux hosts get one line per distro variant, since the exact distro
    /// may be ambiguous even when detection tried to pin it down.
    pub fn describe(&self, descriptor: &PlatformDescriptor, kind: FailureKind) -> String {
        let mut message = String::new();
        let arch = descriptor.arch().as_str();

        let _ = writeln!(
            message,
            "Failed to load native library ({kind}) for Operating System: {}, Architecture: {}.",
            descriptor.raw_os(),
            descriptor.raw_arch()
        );
        message.push_str("Ensure the correct native library is available for your platform.\n");

        match descriptor.os() {
            OsFamily::MacOs => {
                let classifiers = [format!("macos-{arch}")];
                self.add_dependency(&mut message, OsFamily::MacOs, arch, &classifiers);
            }
            OsFamily::Windows => {
                // name the artifact the resolver would pick, e.g. x86_64 for arm64
                let classifier = descriptor
                    .platform_key()
                    .unwrap_or_else(|| format!("windows-{arch}"));
                self.add_dependency(&mut message, OsFamily::Windows, arch, &[classifier]);
            }
            OsFamily::Linux => {
                let classifiers: Vec<String> = LinuxDistro::ALL
                    .iter()
                    .map(|d| format!("{}-{arch}", d.key_prefix()))
                    .collect();
                self.add_dependency(&mut message, OsFamily::Linux, arch, &classifiers);
            }
            OsFamily::Unknown => {
                let _ = writeln!(
                    message,
                    "Unsupported OS: {}. Check your environment.",
                    descriptor.raw_os()
                );
            }
        }

        message.push_str("For further assistance, refer to the documentation or contact support.");
        message
    }

    fn add_dependency(
        &self,
        message: &mut String,
        os: OsFamily,
        arch: &str,
        classifiers: &[String],
    ) {
        let _ = writeln!(
            message,
            "For {} with {} architecture, add the following to your dependency configuration:",
            os.display_name(),
            arch
        );
        for classifier in classifiers {
            let _ = writeln!(message, "  {}", self.artifact.coordinate(classifier));
        }
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new(ArtifactCoordinates::default())
    }
}
