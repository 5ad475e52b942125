//! Best-effort `user.sha256` extended attribute.
//!
//! Nothing here ever fails from the caller's point of view: any platform or
//! filesystem refusal is logged at debug level and reported as
//! [`PersistOutcome::Skipped`].

use std::path::Path;

use tracing::debug;

use super::{DigestSink, PersistOutcome};
use crate::digest::Digest;
use crate::error::{MonitorError, Result};

pub const ATTRIBUTE_KEY: &str = "user.sha256";

/// Picks the attribute sink once, at startup.
pub fn attribute_sink(enabled: bool) -> Box<dyn DigestSink> {
    if enabled {
        platform_sink()
    } else {
        Box::new(NoopAttributeSink)
    }
}

#[cfg(unix)]
fn platform_sink() -> Box<dyn DigestSink> {
    if xattr::SUPPORTED_PLATFORM {
        Box::new(XattrSink)
    } else {
        debug!("extended attributes unsupported on this platform");
        Box::new(NoopAttributeSink)
    }
}

#[cfg(not(unix))]
fn platform_sink() -> Box<dyn DigestSink> {
    debug!("extended attributes unsupported on this platform");
    Box::new(NoopAttributeSink)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAttributeSink;

impl DigestSink for NoopAttributeSink {
    fn name(&self) -> &'static str {
        "attribute (disabled)"
    }

    fn persist(&self, _path: &Path, _digest: &Digest) -> Result<PersistOutcome> {
        Ok(PersistOutcome::Skipped)
    }
}

#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct XattrSink;

#[cfg(unix)]
impl XattrSink {
    /// Digest stored in the attribute, if present and well formed.
    pub fn read(&self, path: &Path) -> Option<Digest> {
        let raw = xattr::get(path, ATTRIBUTE_KEY).ok()??;
        String::from_utf8(raw).ok()?.parse().ok()
    }

    fn try_store(&self, path: &Path, digest: &Digest) -> Result<()> {
        xattr::set(path, ATTRIBUTE_KEY, digest.as_str().as_bytes()).map_err(|e| {
            MonitorError::AttributeUnsupported {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }
}

#[cfg(unix)]
impl DigestSink for XattrSink {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn persist(&self, path: &Path, digest: &Digest) -> Result<PersistOutcome> {
        match self.try_store(path, digest) {
            Ok(()) => Ok(PersistOutcome::Stored),
            Err(e) => {
                debug!(error = %e, "skipping extended attribute");
                Ok(PersistOutcome::Skipped)
            }
        }
    }
}
