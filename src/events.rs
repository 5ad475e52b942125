use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cli::OutputFormat;
use crate::digest::Digest;

/// One successful watch-mode digest, as printed on stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DigestRecord {
    /// Path relative to the watch root
    pub path: PathBuf,
    pub digest: Digest,
    pub recorded_at: DateTime<Utc>,
}

impl DigestRecord {
    pub fn new(root: &Path, path: &Path, digest: Digest) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        Self {
            path: relative,
            digest,
            recorded_at: Utc::now(),
        }
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            // Same layout as `sha256sum`, so the stream can be replayed with `sha256sum -c`.
            OutputFormat::Text => format!("{}  {}", self.digest, self.path.display()),
            OutputFormat::Json => serde_json::to_string(self).unwrap_or_else(|err| {
                tracing::warn!("Failed to serialize digest record: {}", err);
                format!("{}  {}", self.digest, self.path.display())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_path_is_relative_to_root() {
        let digest = Digest::of_bytes(b"");
        let record = DigestRecord::new(
            Path::new("/data/lake"),
            Path::new("/data/lake/raw/aapl.csv"),
            digest.clone(),
        );

        assert_eq!(record.path, PathBuf::from("raw/aapl.csv"));
        assert_eq!(
            record.render(OutputFormat::Text),
            format!("{}  raw/aapl.csv", digest)
        );
    }

    #[test]
    fn test_path_outside_root_is_kept() {
        let record = DigestRecord::new(
            Path::new("/data/lake"),
            Path::new("/elsewhere/x.csv"),
            Digest::of_bytes(b"x"),
        );
        assert_eq!(record.path, PathBuf::from("/elsewhere/x.csv"));
    }

    #[test]
    fn test_json_record() {
        let record = DigestRecord::new(Path::new("/r"), Path::new("/r/a.csv"), Digest::of_bytes(b"a"));
        let line = record.render(OutputFormat::Json);

        let parsed: DigestRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
        assert!(line.contains("\"path\":\"a.csv\""));
    }
}
