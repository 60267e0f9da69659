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

//! Resource bundles holding the prebuilt native artifacts.
//!
//! Paths inside a bundle are logical, `/`-separated, and relative to the
//! bundle root (e.g. `native/macos-arm64/libsdk_core_ffi.dylib`).

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// A read-only collection of named resources.
pub trait ResourceBundle: Send + Sync {
    /// Whether a resource exists at `path`.
    fn contains(&self, path: &str) -> bool;

    /// Open a read stream on the resource at `path`.
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>>;

    /// Location string used in log messages.
    fn describe(&self, path: &str) -> String {
        path.to_string()
    }
}

/// Resources stored as files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

impl ResourceBundle for DirectoryBundle {
    fn contains(&self, path: &str) -> bool {
        self.file_path(path).is_file()
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        let file = std::fs::File::open(self.file_path(path))?;
        Ok(Box::new(file))
    }

    fn describe(&self, path: &str) -> String {
        format!("file://{}", self.file_path(path).display())
    }
}

/// Resources held in memory, e.g. from `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedBundle {
    resources: HashMap<String, Cow<'static, [u8]>>,
}

impl EmbeddedBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(
        mut self,
        path: impl Into<String>,
        bytes: impl Into<Cow<'static, [u8]>>,
    ) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Cow<'static, [u8]>>) {
        self.resources.insert(path.into(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceBundle for EmbeddedBundle {
    fn contains(&self, path: &str) -> bool {
        self.resources.contains_key(path)
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        match self.resources.get(path) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.as_ref()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("embedded resource not found: {path}"),
            )),
        }
    }

    fn describe(&self, path: &str) -> String {
        format!("embedded:{path}")
    }
}
