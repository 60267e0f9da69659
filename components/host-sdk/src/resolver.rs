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

//! Resolves the bundled native artifact for a platform.

use log::debug;

use crate::bundle::ResourceBundle;
use crate::config::{AddressingMode, ProvisionConfig};
use crate::error::{ProvisionError, Result};
use crate::platform::{ArchFamily, OsFamily, PlatformDescriptor};

/// A candidate bundled artifact. Exists only as a lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryResource {
    /// Platform key the artifact was addressed by.
    pub platform_key: String,
    /// File name of the artifact (e.g. `libsdk_core_ffi.so`).
    pub file_name: String,
    /// Logical path inside the bundle.
    pub resource_path: String,
}

/// Platform-specific file name of a native library.
///
/// Returns `None` for an unknown OS family.
pub fn library_file_name(os: OsFamily, name: &str) -> Option<String> {
    match os {
        OsFamily::Windows => Some(format!("{name}.dll")),
        OsFamily::MacOs => Some(format!("lib{name}.dylib")),
        OsFamily::Linux => Some(format!("lib{name}.so")),
        OsFamily::Unknown => None,
    }
}

fn library_extension(os: OsFamily) -> Option<&'static str> {
    match os {
        OsFamily::Windows => Some("dll"),
        OsFamily::MacOs => Some("dylib"),
        OsFamily::Linux => Some("so"),
        OsFamily::Unknown => None,
    }
}

/// (OS, arch) pairs a flat bundle ships an artifact for.
fn flat_mode_supports(os: OsFamily, arch: &ArchFamily) -> bool {
    matches!(
        (os, arch),
        (
            OsFamily::Windows,
            ArchFamily::X86_64 | ArchFamily::I686 | ArchFamily::Arm64
        ) | (OsFamily::MacOs, ArchFamily::X86_64 | ArchFamily::Arm64)
            | (OsFamily::Linux, ArchFamily::X86_64 | ArchFamily::Arm64)
    )
}

/// Compute where the artifact for `descriptor` should live, without
/// consulting a bundle.
pub fn expected_resource(
    descriptor: &PlatformDescriptor,
    config: &ProvisionConfig,
) -> Result<LibraryResource> {
    let os = descriptor.os();
    let arch = descriptor.arch();

    if !descriptor.is_supported() {
        return Err(ProvisionError::platform_unsupported(
            descriptor.raw_os(),
            descriptor.raw_arch(),
        ));
    }

    let prefix = config.resource_prefix.trim_end_matches('/');

    match config.addressing {
        AddressingMode::Flat => {
            let platform_key = format!("{}-{}", os, arch);
            let ext = library_extension(os)
                .ok_or_else(|| ProvisionError::platform_unsupported(descriptor.raw_os(), descriptor.raw_arch()))?;
            let file_name = format!("lib{}.{}", config.library_name, ext);
            let resource_path = format!("{prefix}/{file_name}");
            if !flat_mode_supports(os, arch) {
                return Err(ProvisionError::resource_not_found(platform_key, resource_path));
            }
            Ok(LibraryResource {
                platform_key,
                file_name,
                resource_path,
            })
        }
        AddressingMode::Tree => {
            let file_name = library_file_name(os, &config.library_name)
                .ok_or_else(|| ProvisionError::platform_unsupported(descriptor.raw_os(), descriptor.raw_arch()))?;
            let Some(platform_key) = descriptor.platform_key() else {
                let key = descriptor.to_string();
                let resource_path = format!("{prefix}/{key}/{file_name}");
                return Err(ProvisionError::resource_not_found(key, resource_path));
            };
            let resource_path = format!("{prefix}/{platform_key}/{file_name}");
            Ok(LibraryResource {
                platform_key,
                file_name,
                resource_path,
            })
        }
    }
}

/// Looks up the native artifact for a platform in a resource bundle.
pub struct LibraryResourceResolver<'a> {
    config: &'a ProvisionConfig,
    bundle: &'a dyn ResourceBundle,
}

impl<'a> LibraryResourceResolver<'a> {
    pub fn new(config: &'a ProvisionConfig, bundle: &'a dyn ResourceBundle) -> Self {
        Self { config, bundle }
    }

    /// Resolve the artifact for `descriptor`.
    ///
    /// An unsupported platform or an artifact missing from the bundle is an
    /// expected outcome, returned as an error value for diagnostics.
    pub fn resolve(&self, descriptor: &PlatformDescriptor) -> Result<LibraryResource> {
        let resource = expected_resource(descriptor, self.config)?;

        if !self.bundle.contains(&resource.resource_path) {
            return Err(ProvisionError::resource_not_found(
                resource.platform_key,
                resource.resource_path,
            ));
        }

        debug!(
            "Resolved native library for {}: {}",
            resource.platform_key,
            self.bundle.describe(&resource.resource_path)
        );
        Ok(resource)
    }
}
