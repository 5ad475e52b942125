//! Persistence channels for computed digests.
//!
//! Every digested file goes through two sinks: the best-effort attribute
//! sink and the canonical sidecar sink. They fail independently.

pub mod attribute;
pub mod sidecar;

use std::path::Path;

use crate::digest::Digest;
use crate::error::Result;

pub use attribute::{attribute_sink, NoopAttributeSink, ATTRIBUTE_KEY};
#[cfg(unix)]
pub use attribute::XattrSink;
pub use sidecar::{is_sidecar_path, sidecar_path, SidecarSink, SIDECAR_SUFFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Stored,
    /// Nothing was stored and that is acceptable for this sink.
    Skipped,
}

pub trait DigestSink: Send {
    fn name(&self) -> &'static str;

    fn persist(&self, path: &Path, digest: &Digest) -> Result<PersistOutcome>;
}

impl<S: DigestSink + ?Sized> DigestSink for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn persist(&self, path: &Path, digest: &Digest) -> Result<PersistOutcome> {
        (**self).persist(path, digest)
    }
}
