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

//! Materializes a bundled artifact as a loadable file.
//!
//! Each extraction writes to a fresh, uniquely named file in the temp
//! directory, `{name}_{pid}_{seq}_XXXX.{ext}`.
//!
//! On unix the file is deleted when the process exits normally. Other
//! platforms have no exit hook (and Windows cannot delete a loaded DLL), so
//! files stay until [`cleanup_extracted_files`] is called. Either way a crash
//! or forced kill leaves the file on disk; the next extraction sweeps
//! leftovers whose owning process is gone, see [`sweep_stale_extractions`].

use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once, OnceLock};

use log::{debug, info, warn};

use crate::bundle::ResourceBundle;
use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::resolver::LibraryResource;

const COPY_BUFFER_SIZE: usize = 8 * 1024;

static EXTRACTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A materialized copy of a [`LibraryResource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLibrary {
    pub source: LibraryResource,
    /// Absolute path of the extracted file.
    pub path: PathBuf,
    pub bytes_copied: u64,
}

/// Copies bundled artifacts into the temp directory.
#[derive(Debug, Clone)]
pub struct LibraryExtractor {
    temp_dir: PathBuf,
    library_name: String,
}

impl LibraryExtractor {
    pub fn new(config: &ProvisionConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            library_name: config.library_name.clone(),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Copy `resource` out of `bundle` into a new temporary file.
    ///
    /// A failure while copying leaves the partial file in place; it remains
    /// registered for exit-time cleanup.
    pub fn extract(
        &self,
        bundle: &dyn ResourceBundle,
        resource: &LibraryResource,
    ) -> Result<ExtractedLibrary> {
        let mut input =
            bundle
                .open(&resource.resource_path)
                .map_err(|source| ProvisionError::StreamOpenFailure {
                    resource_path: resource.resource_path.clone(),
                    source,
                })?;

        sweep_stale_extractions(&self.temp_dir, &self.library_name);

        let (mut output, path) = self.create_temp_file(resource)?;
        exit_cleanup().register(path.clone());

        let bytes_copied = copy_stream(&mut input, &mut output).map_err(|source| {
            ProvisionError::IoWriteFailure {
                path: path.clone(),
                source,
            }
        })?;

        set_loadable_permissions(&path).map_err(|source| ProvisionError::IoWriteFailure {
            path: path.clone(),
            source,
        })?;

        info!(
            "Successfully created a temporary file for the native library at: {} ({} bytes)",
            path.display(),
            bytes_copied
        );

        Ok(ExtractedLibrary {
            source: resource.clone(),
            path,
            bytes_copied,
        })
    }

    fn create_temp_file(&self, resource: &LibraryResource) -> Result<(std::fs::File, PathBuf)> {
        let sequence = EXTRACTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let prefix = format!("{}_{}_{}_", self.library_name, std::process::id(), sequence);
        // keep the extension: the Windows loader appends ".dll" to bare names
        let suffix = Path::new(&resource.file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let named = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(&self.temp_dir)
            .map_err(|source| ProvisionError::IoWriteFailure {
                path: self.temp_dir.clone(),
                source,
            })?;

        let (file, temp_path) = named.into_parts();
        let path = temp_path
            .keep()
            .map_err(|e| ProvisionError::IoWriteFailure {
                path: e.path.to_path_buf(),
                source: e.error,
            })?;

        let path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path)
        };
        debug!("Created temporary library file {}", path.display());
        Ok((file, path))
    }
}

/// Remove files left in `temp_dir` by earlier extractions of `library_name`
/// whose process is no longer running. Returns how many were removed.
pub fn sweep_stale_extractions(temp_dir: &Path, library_name: &str) -> usize {
    let entries = match std::fs::read_dir(temp_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping stale library sweep of {}: {}", temp_dir.display(), e);
            return 0;
        }
    };

    let prefix = format!("{library_name}_");
    let own_pid = std::process::id();
    let mut removed = 0;

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(pid) = file_name
            .to_str()
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(extraction_owner)
        else {
            continue;
        };
        if pid == own_pid || process_is_running(pid) {
            continue;
        }

        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed stale extracted library {}", path.display());
                removed += 1;
            }
            // a DLL still mapped by a live process cannot be deleted on Windows
            Err(e) => debug!("Leaving {}: {}", path.display(), e),
        }
    }

    removed
}

/// Owning pid parsed from the `{pid}_{seq}_` part of an extracted file name.
fn extraction_owner(rest: &str) -> Option<u32> {
    let mut parts = rest.splitn(3, '_');
    let pid = parts.next()?.parse::<u32>().ok()?;
    let seq = parts.next()?;
    if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    parts.next()?;
    Some(pid)
}

#[cfg(unix)]
fn process_is_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 only checks for existence and permission.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_is_running(_pid: u32) -> bool {
    // no liveness check here; removal of a file still in use fails instead
    false
}

/// Copy with a fixed-size buffer until end of stream.
fn copy_stream(input: &mut dyn Read, output: &mut dyn Write) -> io::Result<u64> {
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let read = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        output.write_all(&buffer[..read])?;
        total += read as u64;
    }

    output.flush()?;
    Ok(total)
}

#[cfg(unix)]
fn set_loadable_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_loadable_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Files scheduled for deletion at normal process exit.
#[derive(Debug, Default)]
pub struct ExitCleanup {
    paths: Mutex<Vec<PathBuf>>,
}

impl ExitCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: PathBuf) {
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(path);
        }
    }

    pub fn registered(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }

    /// Delete every registered file, returning how many were removed.
    pub fn run(&self) -> usize {
        let paths = match self.paths.lock() {
            Ok(mut paths) => std::mem::take(&mut *paths),
            Err(_) => return 0,
        };

        let mut removed = 0;
        for path in paths {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        removed
    }
}

/// The process-wide cleanup list used by [`LibraryExtractor`].
///
/// The first access installs an exit hook that runs the cleanup.
pub fn exit_cleanup() -> &'static ExitCleanup {
    static CLEANUP: OnceLock<ExitCleanup> = OnceLock::new();
    static HOOK: Once = Once::new();

    let cleanup = CLEANUP.get_or_init(ExitCleanup::new);
    HOOK.call_once(install_exit_hook);
    cleanup
}

/// Delete all extracted files now, instead of waiting for process exit.
pub fn cleanup_extracted_files() -> usize {
    exit_cleanup().run()
}

#[cfg(unix)]
fn install_exit_hook() {
    extern "C" fn run_exit_cleanup() {
        cleanup_extracted_files();
    }

    // SAFETY: registering a plain extern "C" fn with no captured state.
    let rc = unsafe { libc::atexit(run_exit_cleanup) };
    if rc != 0 {
        warn!("Unable to register exit-time cleanup for extracted libraries");
    }
}

#[cfg(not(unix))]
fn install_exit_hook() {
    debug!("Exit-time cleanup of extracted libraries is not available on this platform");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::EmbeddedBundle;
    use crate::error::FailureKind;

    fn resource(path: &str) -> LibraryResource {
        LibraryResource {
            platform_key: "linux-gnu-x86_64".to_string(),
            file_name: "libcore.so".to_string(),
            resource_path: path.to_string(),
        }
    }

    fn extractor(dir: &Path) -> LibraryExtractor {
        LibraryExtractor::new(&ProvisionConfig::new("core").with_temp_dir(dir))
    }

    /// Yields `limit` bytes, then fails.
    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(ErrorKind::Other, "stream reset"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(7);
            self.remaining -= n;
            Ok(n)
        }
    }

    struct FailingBundle;

    impl ResourceBundle for FailingBundle {
        fn contains(&self, _path: &str) -> bool {
            true
        }

        fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
            if path.ends_with("unopenable.so") {
                Err(io::Error::new(ErrorKind::PermissionDenied, "denied"))
            } else {
                Ok(Box::new(FailingReader { remaining: 20_000 }))
            }
        }
    }

    #[test]
    fn test_extract_round_trip_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path());

        for size in [0usize, 1, COPY_BUFFER_SIZE, COPY_BUFFER_SIZE + 1, 100_003] {
            let bytes: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let bundle = EmbeddedBundle::new().with_resource("native/libcore.so", bytes.clone());

            let extracted = extractor
                .extract(&bundle, &resource("native/libcore.so"))
                .unwrap();

            assert_eq!(extracted.bytes_copied, size as u64);
            assert_eq!(std::fs::read(&extracted.path).unwrap(), bytes, "size {size}");
            assert!(extracted.path.is_absolute());
            assert!(extracted.path.starts_with(dir.path()));
        }
    }

    #[test]
    fn test_extract_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path());
        let bundle = EmbeddedBundle::new().with_resource("native/libcore.so", &b"abc"[..]);

        let first = extractor.extract(&bundle, &resource("native/libcore.so")).unwrap();
        let second = extractor.extract(&bundle, &resource("native/libcore.so")).unwrap();

        assert_ne!(first.path, second.path);
        let name = first.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("core_{}_", std::process::id())));
        assert!(name.ends_with(".so"));
    }

    #[test]
    fn test_stream_open_failure_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path());

        let err = extractor
            .extract(&FailingBundle, &resource("native/unopenable.so"))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::StreamOpenFailure);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_copy_failure_leaves_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path());

        let err = extractor
            .extract(&FailingBundle, &resource("native/libcore.so"))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::IoWriteFailure);

        let path = match err {
            ProvisionError::IoWriteFailure { path, .. } => path,
            other => panic!("unexpected error: {other:?}"),
        };
        assert!(path.exists(), "partial file should remain until exit");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 20_000);
        assert!(exit_cleanup().registered().contains(&path));
    }

    #[test]
    fn test_temp_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(&dir.path().join("does-not-exist"));
        let bundle = EmbeddedBundle::new().with_resource("native/libcore.so", &b"abc"[..]);

        let err = extractor
            .extract(&bundle, &resource("native/libcore.so"))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::IoWriteFailure);
    }

    #[test]
    fn test_extraction_owner() {
        assert_eq!(extraction_owner("1234_0_a1b2.so"), Some(1234));
        assert_eq!(extraction_owner("1234_17_.so"), Some(1234));
        assert_eq!(extraction_owner("extra_1234_0_a1b2.so"), None);
        assert_eq!(extraction_owner("1234_x_a1b2.so"), None);
        assert_eq!(extraction_owner("1234"), None);
    }

    #[test]
    fn test_sweep_removes_leftovers_of_dead_processes() {
        let dir = tempfile::tempdir().unwrap();
        let dead_pid = i32::MAX as u32;
        let own_pid = std::process::id();

        let stale = dir.path().join(format!("core_{dead_pid}_0_abcd.so"));
        let own = dir.path().join(format!("core_{own_pid}_0_abcd.so"));
        let other_library = dir.path().join(format!("core_extra_{dead_pid}_0_abcd.so"));
        let unrelated = dir.path().join("core_notes.txt");
        for path in [&stale, &own, &other_library, &unrelated] {
            std::fs::write(path, b"x").unwrap();
        }

        assert_eq!(sweep_stale_extractions(dir.path(), "core"), 1);
        assert!(!stale.exists());
        assert!(own.exists());
        assert!(other_library.exists());
        assert!(unrelated.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_sweep_keeps_files_of_running_processes() {
        let dir = tempfile::tempdir().unwrap();
        // pid 1 is always running
        let live = dir.path().join("core_1_0_abcd.so");
        std::fs::write(&live, b"x").unwrap();

        assert_eq!(sweep_stale_extractions(dir.path(), "core"), 0);
        assert!(live.exists());
    }

    #[test]
    fn test_extract_sweeps_stale_files_first() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir
            .path()
            .join(format!("core_{}_3_wxyz.so", i32::MAX as u32));
        std::fs::write(&stale, b"old").unwrap();

        let bundle = EmbeddedBundle::new().with_resource("native/libcore.so", &b"new"[..]);
        let extracted = extractor(dir.path())
            .extract(&bundle, &resource("native/libcore.so"))
            .unwrap();

        assert!(!stale.exists());
        assert!(extracted.path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_sweep_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(sweep_stale_extractions(&dir.path().join("absent"), "core"), 0);
    }

    #[test]
    fn test_exit_cleanup_removes_registered_files() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("a.so");
        let gone = dir.path().join("b.so");
        std::fs::write(&kept, b"a").unwrap();

        let cleanup = ExitCleanup::new();
        cleanup.register(kept.clone());
        cleanup.register(gone);

        assert_eq!(cleanup.run(), 1);
        assert!(!kept.exists());
        assert!(cleanup.registered().is_empty());
        assert_eq!(cleanup.run(), 0);
    }
}
