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

//! Provisioning configuration.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const ENV_LIBRARY_NAME: &str = "NATIVE_LIBRARY_NAME";
pub const ENV_RESOURCE_PREFIX: &str = "NATIVE_RESOURCE_PREFIX";
pub const ENV_ADDRESSING: &str = "NATIVE_ADDRESSING";
pub const ENV_TEMP_DIR: &str = "NATIVE_TEMP_DIR";

/// How native artifacts are laid out inside a resource bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingMode {
    /// One artifact per OS directly under the prefix: `native/lib{name}.{ext}`.
    Flat,
    /// One artifact per platform key: `native/{platformKey}/{file}`.
    #[default]
    Tree,
}

impl FromStr for AddressingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(AddressingMode::Flat),
            "tree" => Ok(AddressingMode::Tree),
            _ => Err(format!("Unknown addressing mode: {}", s)),
        }
    }
}

/// Coordinates of the published per-platform artifacts, used to tell users
/// what to add to their dependency configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCoordinates {
    pub group: String,
    pub artifact: String,
}

impl Default for ArtifactCoordinates {
    fn default() -> Self {
        Self {
            group: "io.sdk-core".to_string(),
            artifact: "sdk-core-native".to_string(),
        }
    }
}

impl ArtifactCoordinates {
    /// Dependency line for one platform classifier.
    pub fn coordinate(&self, classifier: &str) -> String {
        format!("{}:{}:<version>:{}", self.group, self.artifact, classifier)
    }
}

/// Configuration for locating and loading the native library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Base library name, without platform prefix or extension.
    pub library_name: String,
    /// Bundle directory holding the native artifacts.
    pub resource_prefix: String,
    pub addressing: AddressingMode,
    /// Directory for extracted copies. Defaults to the system temp dir.
    pub temp_dir: Option<PathBuf>,
    pub artifact: ArtifactCoordinates,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            library_name: "sdk_core_ffi".to_string(),
            resource_prefix: "native".to_string(),
            addressing: AddressingMode::Tree,
            temp_dir: None,
            artifact: ArtifactCoordinates::default(),
        }
    }
}

impl ProvisionConfig {
    pub fn new(library_name: impl Into<String>) -> Self {
        Self {
            library_name: library_name.into(),
            ..Default::default()
        }
    }

    pub fn with_addressing(mut self, addressing: AddressingMode) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Invalid provisioning config")
    }

    /// Defaults overlaid with the `NATIVE_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (environment or test map).
    pub fn overlay<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_LIBRARY_NAME) {
            self.library_name = name;
        }
        if let Some(prefix) = lookup(ENV_RESOURCE_PREFIX) {
            self.resource_prefix = prefix;
        }
        if let Some(mode) = lookup(ENV_ADDRESSING) {
            self.addressing = AddressingMode::from_str(&mode.to_lowercase())
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}", ENV_ADDRESSING))?;
        }
        if let Some(dir) = lookup(ENV_TEMP_DIR) {
            self.temp_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ProvisionConfig::default();
        assert_eq!(config.library_name, "sdk_core_ffi");
        assert_eq!(config.resource_prefix, "native");
        assert_eq!(config.addressing, AddressingMode::Tree);
        assert!(config.temp_dir.is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            ProvisionConfig::from_json_str(r#"{"library_name": "core", "addressing": "flat"}"#)
                .unwrap();
        assert_eq!(config.library_name, "core");
        assert_eq!(config.addressing, AddressingMode::Flat);
        assert_eq!(config.resource_prefix, "native");
    }

    #[test]
    fn test_from_json_invalid_mode() {
        let result = ProvisionConfig::from_json_str(r#"{"addressing": "nested"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_overlay() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_LIBRARY_NAME, "other_core"),
            (ENV_ADDRESSING, "FLAT"),
            (ENV_TEMP_DIR, "/var/tmp/native"),
        ]);
        let config = ProvisionConfig::default()
            .overlay(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.library_name, "other_core");
        assert_eq!(config.addressing, AddressingMode::Flat);
        assert_eq!(config.temp_dir, Some(PathBuf::from("/var/tmp/native")));
    }

    #[test]
    fn test_overlay_rejects_unknown_mode() {
        let result = ProvisionConfig::default().overlay(|key| {
            (key == ENV_ADDRESSING).then(|| "nested".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_coordinate() {
        let coords = ArtifactCoordinates {
            group: "com.example".to_string(),
            artifact: "core".to_string(),
        };
        assert_eq!(
            coords.coordinate("linux-gnu-arm64"),
            "com.example:core:<version>:linux-gnu-arm64"
        );
    }
}
