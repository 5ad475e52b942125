//! Digest a file and push the result through both sinks.

use std::path::Path;

use tracing::debug;

use crate::cli::OutputFormat;
use crate::config::MonitorConfig;
use crate::digest::{Digest, DigestEngine};
use crate::error::{MonitorError, Result};
use crate::events::DigestRecord;
use crate::session::ClosedFileHandler;
use crate::sink::{attribute_sink, DigestSink, SidecarSink};

pub struct DigestPipeline {
    engine: DigestEngine,
    attribute: Box<dyn DigestSink>,
    sidecar: SidecarSink,
    output: OutputFormat,
}

impl DigestPipeline {
    pub fn new(engine: DigestEngine, attribute: Box<dyn DigestSink>) -> Self {
        Self {
            engine,
            attribute,
            sidecar: SidecarSink::new(),
            output: OutputFormat::Text,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            DigestEngine::new(config.digest.chunk_size),
            attribute_sink(config.sinks.attributes),
        )
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Digests `path` and stores the result in both sinks.
    ///
    /// The attribute sink never fails the call; a sidecar failure does.
    pub fn digest_and_persist(&self, path: &Path) -> Result<Digest> {
        let digest = self.engine.digest_file(path)?;

        if let Err(err) = self.attribute.persist(path, &digest) {
            debug!(path = %path.display(), error = %err, "attribute sink failed");
        }
        self.sidecar.persist(path, &digest)?;

        Ok(digest)
    }

    /// Compares the current digest of `path` with its sidecar.
    ///
    /// A missing or malformed sidecar is a mismatch, not a read failure.
    pub fn verify(&self, path: &Path) -> Result<Digest> {
        let current = self.engine.identify(path)?;
        let stored = self.sidecar.read(&current.path)?;

        if stored.as_deref() == Some(current.digest.as_str()) {
            Ok(current.digest)
        } else {
            Err(MonitorError::VerifyMismatch {
                actual: current.digest.to_string(),
                path: current.path,
                expected: stored,
            })
        }
    }
}

impl ClosedFileHandler for DigestPipeline {
    fn on_closed(&mut self, root: &Path, path: &Path) -> Result<()> {
        let digest = self.digest_and_persist(path)?;
        println!("{}", DigestRecord::new(root, path, digest).render(self.output));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{sidecar_path, NoopAttributeSink, PersistOutcome};
    use std::fs;
    use tempfile::TempDir;

    struct FailingSink;

    impl DigestSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn persist(&self, path: &Path, _digest: &Digest) -> Result<PersistOutcome> {
            Err(MonitorError::AttributeUnsupported {
                path: path.to_path_buf(),
                reason: "always fails".to_string(),
            })
        }
    }

    fn pipeline() -> DigestPipeline {
        DigestPipeline::new(DigestEngine::new(16), Box::new(NoopAttributeSink))
    }

    #[test]
    fn test_attribute_failure_does_not_block_sidecar() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.csv");
        fs::write(&file, "x").unwrap();

        let pipeline = DigestPipeline::new(DigestEngine::default(), Box::new(FailingSink));
        let digest = pipeline.digest_and_persist(&file).unwrap();

        assert_eq!(fs::read_to_string(sidecar_path(&file)).unwrap(), format!("{digest}\n"));
    }

    #[test]
    fn test_verify_round_trip_and_staleness() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("prices.csv");
        fs::write(&file, "close\n101.5\n").unwrap();

        let pipeline = pipeline();
        let written = pipeline.digest_and_persist(&file).unwrap();
        assert_eq!(pipeline.verify(&file).unwrap(), written);

        fs::write(&file, "close\n99.0\n").unwrap();
        match pipeline.verify(&file) {
            Err(MonitorError::VerifyMismatch { expected, actual, .. }) => {
                assert_eq!(expected, Some(written.to_string()));
                assert_ne!(actual, written.to_string());
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_without_sidecar_is_mismatch() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fresh.csv");
        fs::write(&file, "new").unwrap();

        let err = pipeline().verify(&file).unwrap_err();
        assert!(matches!(err, MonitorError::VerifyMismatch { expected: None, .. }));
    }

    #[test]
    fn test_non_utf8_sidecar_is_mismatch() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("ticks.bin");
        fs::write(&file, b"\x00\x01").unwrap();
        fs::write(sidecar_path(&file), [0xff, 0xfe, b'\n']).unwrap();

        match pipeline().verify(&file) {
            Err(MonitorError::VerifyMismatch { expected: Some(stored), .. }) => {
                assert_eq!(stored, "\u{fffd}\u{fffd}");
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_handler_reports_read_errors() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline();
        let err = pipeline.on_closed(dir.path(), &dir.path().join("vanished.csv")).unwrap_err();
        assert!(matches!(err, MonitorError::Read { .. }));
    }
}
