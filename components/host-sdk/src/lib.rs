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

//! Host-side SDK that provisions the bundled native core library.
//!
//! This crate provides:
//! - [`PlatformDescriptor`]: host OS, architecture and Linux distro detection
//! - [`LibraryResourceResolver`]: maps a platform to its artifact in a [`ResourceBundle`]
//! - [`LibraryExtractor`]: copies the artifact to a uniquely named temporary file
//! - [`NativeBoundary`]: the once-per-process load gate and symbol access
//! - [`DiagnosticReporter`]: remediation text for failed loads
//! - [`HandleRegistry`]: generation-checked opaque handles for foreign callers

pub mod bundle;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extractor;
pub mod handles;
pub mod loader;
pub mod platform;
pub mod resolver;

pub use bundle::{DirectoryBundle, EmbeddedBundle, ResourceBundle};
pub use config::{AddressingMode, ArtifactCoordinates, ProvisionConfig};
pub use diagnostics::DiagnosticReporter;
pub use error::{BoundaryError, FailureKind, ProvisionError};
pub use extractor::{
    cleanup_extracted_files, sweep_stale_extractions, ExtractedLibrary, LibraryExtractor,
};
pub use handles::{HandleKind, HandleRegistry};
pub use loader::{initialize_async, is_library_loaded, LibraryLoader, LoadOutcome, NativeBoundary};
pub use platform::{ArchFamily, LinuxDistro, OsFamily, PlatformDescriptor};
pub use resolver::{LibraryResource, LibraryResourceResolver};
