pub mod batch;
pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod events;
pub mod filter;
pub mod pipeline;
pub mod session;
pub mod sink;
pub mod watcher;

pub use batch::{BatchMode, BatchReport, BatchRunner, FileReport, FileStatus};
pub use config::MonitorConfig;
pub use digest::{digest_file, Digest, DigestEngine, FileIdentity};
pub use error::MonitorError;
pub use events::DigestRecord;
pub use filter::FileFilter;
pub use pipeline::DigestPipeline;
pub use session::{ClosedFileHandler, SessionState, SessionStats, WatchSession};
pub use sink::{DigestSink, PersistOutcome, SidecarSink};
