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

//! Host platform detection.
//!
//! Raw OS and architecture names are normalized into closed enumerations once,
//! here, and every later step dispatches on those variants. On Linux the
//! distro-identification file (`/etc/os-release`) is consulted to pick out the
//! Amazon Linux variants that ship their own artifacts.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use log::{info, warn};

use crate::error::{ProvisionError, Result};

/// Well-known location of the distro-identification file.
pub const DEFAULT_OS_RELEASE_PATH: &str = "/etc/os-release";

/// Normalized operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
    Unknown,
}

impl OsFamily {
    /// Normalize a raw OS name by substring match.
    pub fn from_os_name(raw: &str) -> Self {
        let name = raw.to_lowercase();
        // "darwin" contains "win"
        if name.contains("darwin") {
            OsFamily::MacOs
        } else if name.contains("win") {
            OsFamily::Windows
        } else if name.contains("mac") {
            OsFamily::MacOs
        } else if name.contains("linux") {
            OsFamily::Linux
        } else {
            OsFamily::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::MacOs => "macos",
            OsFamily::Linux => "linux",
            OsFamily::Unknown => "unknown",
        }
    }

    /// Human-readable name used in diagnostics.
    pub fn display_name(&self) -> &'static str {
        match self {
            OsFamily::Windows => "Windows",
            OsFamily::MacOs => "macOS",
            OsFamily::Linux => "Linux",
            OsFamily::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized CPU architecture.
///
/// Unrecognized tokens are carried through as [`ArchFamily::Other`] rather
/// than rejected, so diagnostics can echo what the host reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArchFamily {
    X86_64,
    Arm64,
    I686,
    Other(String),
}

impl ArchFamily {
    /// Normalize a raw architecture name by substring match.
    pub fn from_arch_name(raw: &str) -> Self {
        let arch = raw.to_lowercase();
        if arch.contains("aarch64") || arch.contains("arm64") {
            ArchFamily::Arm64
        } else if arch.contains("x86_64") || arch.contains("amd64") {
            ArchFamily::X86_64
        } else if arch.contains("i686") {
            ArchFamily::I686
        } else {
            ArchFamily::Other(arch)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ArchFamily::X86_64 => "x86_64",
            ArchFamily::Arm64 => "arm64",
            ArchFamily::I686 => "i686",
            ArchFamily::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ArchFamily::Other(_))
    }
}

impl fmt::Display for ArchFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linux distribution family, as far as artifact selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinuxDistro {
    Generic,
    AmazonLinux2,
    AmazonLinux2023,
}

impl LinuxDistro {
    /// Every variant, in the order diagnostics list them.
    pub const ALL: [LinuxDistro; 3] = [
        LinuxDistro::Generic,
        LinuxDistro::AmazonLinux2,
        LinuxDistro::AmazonLinux2023,
    ];

    pub fn from_os_release(release: &OsRelease) -> Self {
        match (release.id.as_deref(), release.version_id.as_deref()) {
            (Some("amzn"), Some("2023")) => LinuxDistro::AmazonLinux2023,
            (Some("amzn"), Some("2")) => LinuxDistro::AmazonLinux2,
            _ => LinuxDistro::Generic,
        }
    }

    /// Prefix used in platform keys and artifact classifiers.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            LinuxDistro::Generic => "linux-gnu",
            LinuxDistro::AmazonLinux2 => "amazonlinux2",
            LinuxDistro::AmazonLinux2023 => "amazonlinux2023",
        }
    }
}

/// The `ID` / `VERSION_ID` pair read from a distro-identification file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: Option<String>,
    pub version_id: Option<String>,
}

/// Parse `KEY=value` lines, keeping `ID` and `VERSION_ID` with quotes stripped.
pub fn parse_os_release(contents: &str) -> OsRelease {
    let mut release = OsRelease::default();

    for line in contents.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.replace('"', "").replace('\'', "").trim().to_string();
        match key {
            "ID" => release.id = Some(value),
            "VERSION_ID" => release.version_id = Some(value),
            _ => {}
        }
    }

    release
}

/// Read and parse the distro-identification file at `path`.
pub fn read_os_release(path: &Path) -> Result<OsRelease> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ProvisionError::ConfigParseFailure {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(parse_os_release(&contents))
}

/// Canonical identity of the executing host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDescriptor {
    raw_os: String,
    raw_arch: String,
    os: OsFamily,
    arch: ArchFamily,
    distro: Option<LinuxDistro>,
}

impl PlatformDescriptor {
    /// Build a descriptor from raw names and, for Linux, the contents of the
    /// distro-identification file. `None` contents mean the file could not be
    /// read and select the generic Linux family.
    pub fn from_parts(raw_os: &str, raw_arch: &str, os_release: Option<&str>) -> Self {
        let os = OsFamily::from_os_name(raw_os);
        let arch = ArchFamily::from_arch_name(raw_arch);
        let distro = match os {
            OsFamily::Linux => Some(
                os_release
                    .map(|contents| LinuxDistro::from_os_release(&parse_os_release(contents)))
                    .unwrap_or(LinuxDistro::Generic),
            ),
            _ => None,
        };

        Self {
            raw_os: raw_os.to_string(),
            raw_arch: raw_arch.to_string(),
            os,
            arch,
            distro,
        }
    }

    /// Detect the running host, reading the distro file at `os_release_path`
    /// when on Linux. Read failures degrade to the generic Linux family.
    pub fn detect_host(os_release_path: &Path) -> Self {
        Self::detect(host_os_name(), &host_arch_name(), os_release_path)
    }

    /// Detect from raw names, consulting the distro file only for Linux.
    pub fn detect(raw_os: &str, raw_arch: &str, os_release_path: &Path) -> Self {
        info!("Detected OS: {raw_os} Arch: {raw_arch}");

        if OsFamily::from_os_name(raw_os) != OsFamily::Linux {
            return Self::from_parts(raw_os, raw_arch, None);
        }

        let mut descriptor = Self::from_parts(raw_os, raw_arch, None);
        match read_os_release(os_release_path) {
            Ok(release) => {
                info!(
                    "Parsed {}: ID={}, VERSION_ID={}",
                    os_release_path.display(),
                    release.id.as_deref().unwrap_or("<none>"),
                    release.version_id.as_deref().unwrap_or("<none>")
                );
                descriptor.distro = Some(LinuxDistro::from_os_release(&release));
            }
            Err(e) => {
                warn!("Error while detecting linux distro, assuming generic: {e}");
            }
        }
        descriptor
    }

    pub fn raw_os(&self) -> &str {
        &self.raw_os
    }

    pub fn raw_arch(&self) -> &str {
        &self.raw_arch
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    pub fn arch(&self) -> &ArchFamily {
        &self.arch
    }

    /// Linux distro family; `None` on every other OS.
    pub fn linux_distro(&self) -> Option<LinuxDistro> {
        self.distro
    }

    /// Whether both the OS and architecture were recognized.
    pub fn is_supported(&self) -> bool {
        self.os != OsFamily::Unknown && self.arch.is_recognized()
    }

    /// Composed `{family-or-distro}-{arch}` key addressing a per-platform
    /// artifact, or `None` when no artifact is published for this pair.
    ///
    /// Windows on arm64 selects the x86_64 artifact, which runs under
    /// emulation.
    pub fn platform_key(&self) -> Option<String> {
        let key = match (self.os, &self.arch) {
            (OsFamily::Windows, ArchFamily::X86_64 | ArchFamily::Arm64) => {
                "windows-x86_64".to_string()
            }
            (OsFamily::Windows, ArchFamily::I686) => "windows-i686".to_string(),
            (OsFamily::MacOs, ArchFamily::X86_64 | ArchFamily::Arm64) => {
                format!("macos-{}", self.arch)
            }
            (OsFamily::Linux, ArchFamily::X86_64 | ArchFamily::Arm64) => {
                let distro = self.distro.unwrap_or(LinuxDistro::Generic);
                format!("{}-{}", distro.key_prefix(), self.arch)
            }
            _ => return None,
        };
        Some(key)
    }
}

impl fmt::Display for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.platform_key() {
            Some(key) => f.write_str(&key),
            None => write!(f, "{}-{}", self.os, self.arch),
        }
    }
}

/// The running host's descriptor, detected on first use and cached for the
/// life of the process.
pub fn current() -> &'static PlatformDescriptor {
    static CURRENT: OnceLock<PlatformDescriptor> = OnceLock::new();
    CURRENT.get_or_init(|| PlatformDescriptor::detect_host(Path::new(DEFAULT_OS_RELEASE_PATH)))
}

/// Raw OS name of the compilation target.
pub fn host_os_name() -> &'static str {
    std::env::consts::OS
}

/// Raw architecture name of the compilation target, using `i686` for 32-bit x86.
pub fn host_arch_name() -> String {
    match std::env::consts::ARCH {
        "x86" => "i686".to_string(),
        other => other.to_string(),
    }
}
