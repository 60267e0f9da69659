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

//! Attaches the bundled native core to the running process.
//!
//! The pipeline runs once per process:
//! 1. Detect the host platform
//! 2. Resolve the bundled artifact for it
//! 3. Extract the artifact to a temporary file
//! 4. Dynamically load the extracted file
//!
//! The first failure short-circuits the rest and is captured, together with
//! a remediation message, in the cached [`LoadOutcome`]. Nothing is thrown
//! past [`NativeBoundary`]; callers check [`is_library_loaded`] (or rely on
//! the `BoundaryError::Unavailable` returned by boundary calls).

use std::path::Path;
use std::sync::{Arc, OnceLock};

use libloading::{Library, Symbol};
use log::{error, info};

use crate::bundle::ResourceBundle;
use crate::config::ProvisionConfig;
use crate::diagnostics::DiagnosticReporter;
use crate::error::{BoundaryError, FailureKind, ProvisionError, Result};
use crate::extractor::{ExtractedLibrary, LibraryExtractor};
use crate::platform::{self, PlatformDescriptor};
use crate::resolver::LibraryResourceResolver;

static BOUNDARY: OnceLock<NativeBoundary> = OnceLock::new();

/// Result of attempting to attach the native boundary.
///
/// `is_loaded()` is false exactly when `failure_kind()` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    failure: Option<FailureKind>,
    diagnostic: Option<String>,
}

impl LoadOutcome {
    pub fn loaded() -> Self {
        Self {
            failure: None,
            diagnostic: None,
        }
    }

    pub fn failed(kind: FailureKind, diagnostic: impl Into<String>) -> Self {
        Self {
            failure: Some(kind),
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn diagnostic_message(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }
}

/// Performs the dynamic load of an extracted artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryLoader;

impl LibraryLoader {
    pub fn new() -> Self {
        Self
    }

    /// Attach the native image at `path` to the current process.
    pub fn load(&self, path: &Path) -> Result<Library> {
        // SAFETY: loading runs the library's initializers; the artifact comes
        // from the application's own bundle.
        unsafe { Library::new(path) }.map_err(|source| ProvisionError::LinkError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The attached native library, or the record of why it is not attached.
pub struct NativeBoundary {
    descriptor: PlatformDescriptor,
    outcome: LoadOutcome,
    extracted: Option<ExtractedLibrary>,
    library: Option<Library>,
}

impl std::fmt::Debug for NativeBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBoundary")
            .field("descriptor", &self.descriptor)
            .field("outcome", &self.outcome)
            .field("extracted", &self.extracted)
            .finish()
    }
}

impl NativeBoundary {
    /// Run the pipeline for `descriptor` without touching process-wide state.
    pub fn provision(
        config: &ProvisionConfig,
        descriptor: &PlatformDescriptor,
        bundle: &dyn ResourceBundle,
    ) -> Self {
        match attach(config, descriptor, bundle) {
            Ok((extracted, library)) => Self {
                descriptor: descriptor.clone(),
                outcome: LoadOutcome::loaded(),
                extracted: Some(extracted),
                library: Some(library),
            },
            Err(e) => {
                let kind = e.kind();
                let remediation = DiagnosticReporter::new(config.artifact.clone())
                    .describe(descriptor, kind);
                error!("{e}");
                error!("{remediation}");
                Self {
                    descriptor: descriptor.clone(),
                    outcome: LoadOutcome::failed(kind, format!("{e}\n{remediation}")),
                    extracted: None,
                    library: None,
                }
            }
        }
    }

    /// Provision the process-wide boundary for the running host.
    ///
    /// The pipeline runs exactly once; concurrent callers block until it
    /// completes and every later call returns the cached boundary, ignoring
    /// its arguments.
    pub fn initialize(config: &ProvisionConfig, bundle: &dyn ResourceBundle) -> &'static Self {
        BOUNDARY.get_or_init(|| Self::provision(config, platform::current(), bundle))
    }

    /// The process-wide boundary, if initialization has completed.
    pub fn global() -> Option<&'static Self> {
        BOUNDARY.get()
    }

    pub fn descriptor(&self) -> &PlatformDescriptor {
        &self.descriptor
    }

    pub fn outcome(&self) -> &LoadOutcome {
        &self.outcome
    }

    pub fn is_loaded(&self) -> bool {
        self.outcome.is_loaded()
    }

    pub fn extracted_library(&self) -> Option<&ExtractedLibrary> {
        self.extracted.as_ref()
    }

    /// The loaded library, or `Unavailable` when loading failed.
    pub fn require_loaded(&self) -> std::result::Result<&Library, BoundaryError> {
        match &self.library {
            Some(library) => Ok(library),
            None => Err(BoundaryError::Unavailable {
                reason: self
                    .outcome
                    .failure_kind()
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| "not loaded".to_string()),
            }),
        }
    }

    /// Look up an exported native function.
    ///
    /// # Safety
    /// `T` must match the exported symbol's actual type.
    pub unsafe fn symbol<T>(
        &self,
        name: &str,
    ) -> std::result::Result<Symbol<'_, T>, BoundaryError> {
        let library = self.require_loaded()?;
        library
            .get::<T>(name.as_bytes())
            .map_err(|source| BoundaryError::SymbolNotFound {
                name: name.to_string(),
                source,
            })
    }

    /// Invoke a named native operation taking no arguments.
    ///
    /// # Safety
    /// The export must have the signature `extern "C" fn()`.
    pub unsafe fn invoke_nullary(&self, name: &str) -> std::result::Result<(), BoundaryError> {
        let operation = self.symbol::<unsafe extern "C" fn()>(name)?;
        operation();
        Ok(())
    }
}

/// Whether the process-wide boundary is loaded. False before initialization.
pub fn is_library_loaded() -> bool {
    NativeBoundary::global().is_some_and(NativeBoundary::is_loaded)
}

/// Initialize the process-wide boundary on the blocking pool, for async callers.
pub async fn initialize_async(
    config: ProvisionConfig,
    bundle: Arc<dyn ResourceBundle>,
) -> Result<&'static NativeBoundary> {
    tokio::task::spawn_blocking(move || NativeBoundary::initialize(&config, bundle.as_ref()))
        .await
        .map_err(|e| {
            ProvisionError::Internal(anyhow::anyhow!(
                "Native library initialization panicked: {e}"
            ))
        })
}

fn attach(
    config: &ProvisionConfig,
    descriptor: &PlatformDescriptor,
    bundle: &dyn ResourceBundle,
) -> Result<(ExtractedLibrary, Library)> {
    let resource = LibraryResourceResolver::new(config, bundle).resolve(descriptor)?;
    info!(
        "Loading native library: {}",
        bundle.describe(&resource.resource_path)
    );

    let extracted = LibraryExtractor::new(config).extract(bundle, &resource)?;
    let library = LibraryLoader::new().load(&extracted.path)?;

    info!("Loaded native library: {}", extracted.path.display());
    Ok((extracted, library))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::EmbeddedBundle;
    use crate::resolver::expected_resource;

    #[test]
    fn test_outcome_invariant() {
        let ok = LoadOutcome::loaded();
        assert!(ok.is_loaded());
        assert_eq!(ok.failure_kind(), None);
        assert_eq!(ok.diagnostic_message(), None);

        let failed = LoadOutcome::failed(FailureKind::LinkError, "bad image");
        assert!(!failed.is_loaded());
        assert_eq!(failed.failure_kind(), Some(FailureKind::LinkError));
        assert_eq!(failed.diagnostic_message(), Some("bad image"));
    }

    #[test]
    fn test_unsupported_platform_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionConfig::new("core").with_temp_dir(dir.path());
        let descriptor = PlatformDescriptor::from_parts("plan9", "x86_64", None);

        let boundary = NativeBoundary::provision(&config, &descriptor, &EmbeddedBundle::new());
        assert!(!boundary.is_loaded());
        assert_eq!(
            boundary.outcome().failure_kind(),
            Some(FailureKind::PlatformUnsupported)
        );
        let message = boundary.outcome().diagnostic_message().unwrap();
        assert!(message.contains("Unsupported OS: plan9"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_not_found_short_circuits_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionConfig::new("core").with_temp_dir(dir.path());
        let descriptor = PlatformDescriptor::from_parts("Linux", "x86_64", None);

        let boundary = NativeBoundary::provision(&config, &descriptor, &EmbeddedBundle::new());
        assert_eq!(
            boundary.outcome().failure_kind(),
            Some(FailureKind::ResourceNotFound)
        );
        assert!(boundary.extracted_library().is_none());
        assert_eq!(
            std::fs::read_dir(dir.path()).unwrap().count(),
            0,
            "no temporary file may be created"
        );
    }

    #[test]
    fn test_corrupt_image_is_link_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProvisionConfig::new("core").with_temp_dir(dir.path());
        let descriptor = platform::current();

        let Ok(resource) = expected_resource(descriptor, &config) else {
            // host has no published artifact; nothing to corrupt
            return;
        };
        let bundle = EmbeddedBundle::new()
            .with_resource(resource.resource_path, &b"definitely not a shared object"[..]);

        let boundary = NativeBoundary::provision(&config, descriptor, &bundle);
        assert_eq!(boundary.outcome().failure_kind(), Some(FailureKind::LinkError));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_boundary_calls_fail_fast_when_unloaded() {
        let config = ProvisionConfig::new("core");
        let descriptor = PlatformDescriptor::from_parts("plan9", "x86_64", None);
        let boundary = NativeBoundary::provision(&config, &descriptor, &EmbeddedBundle::new());

        match boundary.require_loaded() {
            Err(BoundaryError::Unavailable { reason }) => {
                assert_eq!(reason, "PlatformUnsupported")
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        let result = unsafe { boundary.invoke_nullary("core_noop") };
        assert!(matches!(result, Err(BoundaryError::Unavailable { .. })));
    }
}
