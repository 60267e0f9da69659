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

//! Error types for native library provisioning and boundary calls.
//!
//! Provisioning failures are never thrown past [`crate::NativeBoundary`]:
//! they are folded into a [`crate::LoadOutcome`] carrying a [`FailureKind`]
//! and a diagnostic message. [`ProvisionError`] is the structured form used
//! while the pipeline runs; [`BoundaryError`] is returned to callers that try
//! to use the boundary afterwards.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::handles::HandleKind;

/// Result type for provisioning steps.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Failure raised by one step of the provisioning pipeline.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The host OS or architecture is not recognized.
    #[error("Unsupported platform: OS '{os}', architecture '{arch}'")]
    PlatformUnsupported { os: String, arch: String },

    /// No bundled artifact exists for the resolved platform key.
    #[error("No native library resource for platform '{platform_key}' (expected at '{resource_path}')")]
    ResourceNotFound {
        platform_key: String,
        resource_path: String,
    },

    /// The resource exists but a read stream could not be opened on it.
    #[error("Unable to open stream for resource '{resource_path}': {source}")]
    StreamOpenFailure {
        resource_path: String,
        #[source]
        source: io::Error,
    },

    /// Creating or writing the extracted temporary file failed.
    #[error("I/O error while writing the library to '{}': {source}", path.display())]
    IoWriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The dynamic loader rejected the extracted artifact.
    #[error("Failed to load native library '{}': {source}", path.display())]
    LinkError {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The distro-identification file was unreadable or malformed.
    ///
    /// Detection degrades to the generic Linux family when this occurs.
    #[error("Unable to parse '{}': {message}", path.display())]
    ConfigParseFailure { path: PathBuf, message: String },

    /// Internal error, preserving the underlying error chain.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProvisionError {
    pub fn platform_unsupported(os: impl Into<String>, arch: impl Into<String>) -> Self {
        ProvisionError::PlatformUnsupported {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn resource_not_found(
        platform_key: impl Into<String>,
        resource_path: impl Into<String>,
    ) -> Self {
        ProvisionError::ResourceNotFound {
            platform_key: platform_key.into(),
            resource_path: resource_path.into(),
        }
    }

    /// The data-only category of this failure, as stored in a `LoadOutcome`.
    pub fn kind(&self) -> FailureKind {
        match self {
            ProvisionError::PlatformUnsupported { .. } => FailureKind::PlatformUnsupported,
            ProvisionError::ResourceNotFound { .. } => FailureKind::ResourceNotFound,
            ProvisionError::StreamOpenFailure { .. } => FailureKind::StreamOpenFailure,
            ProvisionError::IoWriteFailure { .. } => FailureKind::IoWriteFailure,
            ProvisionError::LinkError { .. } => FailureKind::LinkError,
            ProvisionError::ConfigParseFailure { .. } => FailureKind::ConfigParseFailure,
            ProvisionError::Internal(_) => FailureKind::Internal,
        }
    }
}

/// Category of a provisioning failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    PlatformUnsupported,
    ResourceNotFound,
    StreamOpenFailure,
    IoWriteFailure,
    LinkError,
    ConfigParseFailure,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::PlatformUnsupported => "PlatformUnsupported",
            FailureKind::ResourceNotFound => "ResourceNotFound",
            FailureKind::StreamOpenFailure => "StreamOpenFailure",
            FailureKind::IoWriteFailure => "IOWriteFailure",
            FailureKind::LinkError => "LinkError",
            FailureKind::ConfigParseFailure => "ConfigParseFailure",
            FailureKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when using the foreign call boundary.
#[derive(Error, Debug)]
pub enum BoundaryError {
    /// The native library is not loaded; no boundary call was attempted.
    #[error("Native boundary unavailable: {reason}")]
    Unavailable { reason: String },

    /// The loaded library does not export the requested symbol.
    #[error("Native symbol '{name}' not found: {source}")]
    SymbolNotFound {
        name: String,
        #[source]
        source: libloading::Error,
    },

    /// The reference string is not a handle reference at all.
    #[error("Malformed handle reference '{reference}'")]
    MalformedHandle { reference: String },

    /// The reference belongs to a different handle category.
    #[error("Handle '{reference}' is not of kind '{expected}'")]
    WrongHandleKind {
        reference: String,
        expected: HandleKind,
    },

    /// The handle was released or never created.
    #[error("Handle '{reference}' was released or never created")]
    StaleHandle { reference: String },
}
