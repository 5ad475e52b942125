//! Digest or verify an explicit list of files without watching.
//!
//! Every input is handled on its own: a failure on one file is recorded and
//! the remaining files are still processed.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::digest::Digest;
use crate::error::MonitorError;
use crate::filter::FileFilter;
use crate::pipeline::DigestPipeline;
use crate::sink::is_sidecar_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Digest and persist unconditionally, overwriting existing sidecars.
    Write,
    /// Compare current digests against the sidecars.
    Verify,
}

#[derive(Debug)]
pub enum FileStatus {
    Written(Digest),
    Verified(Digest),
    /// Sidecar artifacts given as input are not digested themselves.
    Skipped,
    Failed(MonitorError),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
}

impl FileReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, FileStatus::Failed(_))
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub mode: BatchMode,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        !self.files.iter().any(FileReport::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_failure())
    }

    pub fn processed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| !matches!(f.status, FileStatus::Skipped))
            .count()
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }

    pub fn status_of(&self, path: &Path) -> Option<&FileStatus> {
        self.files.iter().find(|f| f.path == path).map(|f| &f.status)
    }
}

pub struct BatchRunner {
    pipeline: DigestPipeline,
    filter: FileFilter,
}

impl BatchRunner {
    pub fn new(pipeline: DigestPipeline, filter: FileFilter) -> Self {
        Self { pipeline, filter }
    }

    /// Directories expand to the digestible files beneath them; everything
    /// else is kept in the given order.
    pub fn expand<P: AsRef<Path>>(&self, inputs: &[P]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for input in inputs {
            let input = input.as_ref();
            if input.is_dir() {
                files.extend(self.filter.digestible_files(input));
            } else {
                files.push(input.to_path_buf());
            }
        }
        files
    }

    pub fn run<P: AsRef<Path>>(&self, mode: BatchMode, inputs: &[P]) -> BatchReport {
        let files = self
            .expand(inputs)
            .into_iter()
            .map(|path| {
                let status = self.process(mode, &path);
                FileReport { path, status }
            })
            .collect();

        let report = BatchReport { mode, files };
        let failed = report.failures().count();
        info!(
            "{:?}: {} files processed, {} failed",
            mode,
            report.processed(),
            failed
        );
        report
    }

    pub fn write<P: AsRef<Path>>(&self, inputs: &[P]) -> BatchReport {
        self.run(BatchMode::Write, inputs)
    }

    pub fn verify<P: AsRef<Path>>(&self, inputs: &[P]) -> BatchReport {
        self.run(BatchMode::Verify, inputs)
    }

    fn process(&self, mode: BatchMode, path: &Path) -> FileStatus {
        if is_sidecar_path(path) {
            return FileStatus::Skipped;
        }

        let result = match mode {
            BatchMode::Write => self.pipeline.digest_and_persist(path).map(FileStatus::Written),
            BatchMode::Verify => self.pipeline.verify(path).map(FileStatus::Verified),
        };

        match result {
            Ok(status) => status,
            Err(err) => {
                match &err {
                    MonitorError::VerifyMismatch { path, expected, actual } => error!(
                        path = %path.display(),
                        expected = expected.as_deref().unwrap_or("missing"),
                        actual = %actual,
                        "SHA-256 digest mismatch"
                    ),
                    other => warn!(path = %path.display(), "{}", other),
                }
                FileStatus::Failed(err)
            }
        }
    }
}
