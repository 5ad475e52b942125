//! Companion `<file>.sha256` artifacts: the canonical digest record.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DigestSink, PersistOutcome};
use crate::digest::Digest;
use crate::error::{MonitorError, Result};

pub const SIDECAR_SUFFIX: &str = ".sha256";

/// `report.csv` -> `report.csv.sha256`
pub fn sidecar_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut name = OsString::from(path.as_ref().as_os_str());
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

pub fn is_sidecar_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().ends_with(SIDECAR_SUFFIX))
        .unwrap_or(false)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarSink;

impl SidecarSink {
    pub fn new() -> Self {
        SidecarSink
    }

    /// Returns the trimmed sidecar text, or `None` when no sidecar exists.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, so garbage content
    /// surfaces as a mismatch instead of a read failure.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<Option<String>> {
        let sidecar = sidecar_path(path);
        match fs::read(&sidecar) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MonitorError::read(sidecar, e)),
        }
    }
}

impl DigestSink for SidecarSink {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn persist(&self, path: &Path, digest: &Digest) -> Result<PersistOutcome> {
        let sidecar = sidecar_path(path);
        fs::write(&sidecar, format!("{digest}\n")).map_err(|source| MonitorError::SidecarWrite {
            path: sidecar.clone(),
            source,
        })?;
        debug!(sidecar = %sidecar.display(), "sidecar written");
        Ok(PersistOutcome::Stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(sidecar_path("data/report.csv"), PathBuf::from("data/report.csv.sha256"));
        assert_eq!(sidecar_path("README"), PathBuf::from("README.sha256"));
        assert_eq!(sidecar_path("a.tar.gz"), PathBuf::from("a.tar.gz.sha256"));
    }

    #[test]
    fn test_is_sidecar_path() {
        assert!(is_sidecar_path("x/report.csv.sha256"));
        assert!(is_sidecar_path(".sha256"));
        assert!(!is_sidecar_path("report.csv"));
        assert!(!is_sidecar_path("sha256/report.csv"));
    }

    #[test]
    fn test_persist_writes_digest_and_newline() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.csv");
        fs::write(&file, b"a,b\n1,2\n").unwrap();
        let digest = Digest::of_bytes(b"a,b\n1,2\n");

        let outcome = SidecarSink::new().persist(&file, &digest).unwrap();
        assert_eq!(outcome, PersistOutcome::Stored);

        let text = fs::read_to_string(dir.path().join("report.csv.sha256")).unwrap();
        assert_eq!(text, format!("{}\n", digest));
        assert_eq!(SidecarSink::new().read(&file).unwrap(), Some(digest.to_string()));
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(sidecar_path(&file), "stale contents that are longer than a digest line\n").unwrap();

        let digest = Digest::of_bytes(b"");
        SidecarSink::new().persist(&file, &digest).unwrap();
        assert_eq!(fs::read_to_string(sidecar_path(&file)).unwrap(), format!("{digest}\n"));
    }

    #[test]
    fn test_missing_sidecar_reads_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(SidecarSink::new().read(dir.path().join("nothing.csv")).unwrap(), None);
    }

    #[test]
    fn test_binary_sidecar_reads_lossy() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.csv");
        fs::write(sidecar_path(&file), [0xc3, 0x28, b' ', b'\n']).unwrap();

        let text = SidecarSink::new().read(&file).unwrap().unwrap();
        assert_eq!(text, "\u{fffd}(");
    }

    #[test]
    fn test_unwritable_location_is_sidecar_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("no_such_dir").join("a.csv");
        let err = SidecarSink::new().persist(&file, &Digest::of_bytes(b"x")).unwrap_err();
        assert!(matches!(err, MonitorError::SidecarWrite { .. }));
    }
}
