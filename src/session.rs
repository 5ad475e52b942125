//! Watch session lifecycle: `Stopped -> Starting -> Running -> Stopping -> Stopped`.
//!
//! One session binds one root. Running two sessions over overlapping roots is
//! unsupported: sidecar writes are not coordinated between them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;

use notify::Event;
use tracing::{debug, error, info};

use crate::config::WatcherConfig;
use crate::error::{MonitorError, Result};
use crate::filter::FileFilter;
use crate::watcher::{interpret, Completion, Notifier, SettleTracker, Signal};

/// Consumes "file finished writing" notifications for a root.
pub trait ClosedFileHandler {
    fn on_closed(&mut self, root: &Path, path: &Path) -> Result<()>;
}

impl<F> ClosedFileHandler for F
where
    F: FnMut(&Path, &Path) -> Result<()>,
{
    fn on_closed(&mut self, root: &Path, path: &Path) -> Result<()> {
        self(root, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub digested: usize,
    pub failed: usize,
    pub ignored: usize,
    /// Events still queued or pending when the session stopped.
    pub dropped: usize,
    pub last_processed: Option<PathBuf>,
}

pub struct WatchSession<H> {
    root: PathBuf,
    config: WatcherConfig,
    filter: FileFilter,
    handler: H,
    state: SessionState,
    stats: SessionStats,
    tracker: SettleTracker,
    completion: Completion,
}

impl<H: ClosedFileHandler> WatchSession<H> {
    pub fn new(root: impl Into<PathBuf>, config: WatcherConfig, filter: FileFilter, handler: H) -> Self {
        let tracker = SettleTracker::new(config.settle_duration());
        Self {
            root: root.into(),
            config,
            filter,
            handler,
            state: SessionState::Stopped,
            stats: SessionStats::default(),
            tracker,
            completion: Completion::CloseEvents,
        }
    }

    /// Sets how finished writes are recognised for events fed through
    /// [`handle_event`](Self::handle_event). `run` replaces it with the
    /// notifier's own mode.
    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Watches until `running` is cleared, then stops the notifier and
    /// returns once it is fully quiesced.
    pub fn run(&mut self, running: &AtomicBool) -> Result<SessionStats> {
        let notifier = self.start()?;

        while running.load(Ordering::SeqCst) {
            match notifier.recv_timeout(self.config.tick_duration()) {
                Ok(Ok(event)) => self.handle_event(event),
                Ok(Err(err)) => error!("File watcher error: {}", err),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!("File watcher stopped unexpectedly");
                    break;
                }
            }
            self.flush_settled();
        }

        self.stop(notifier);
        Ok(self.stats.clone())
    }

    fn start(&mut self) -> Result<Notifier> {
        self.state = SessionState::Starting;

        let root = match self.root.canonicalize() {
            Ok(root) if root.is_dir() => root,
            _ => {
                self.state = SessionState::Stopped;
                return Err(MonitorError::InvalidDirectory { path: self.root.clone() });
            }
        };
        self.root = root;

        let notifier = match Notifier::start(&self.root, &self.config) {
            Ok(notifier) => notifier,
            Err(err) => {
                self.state = SessionState::Stopped;
                return Err(err);
            }
        };
        self.completion = notifier.completion();
        self.stats = SessionStats::default();
        self.state = SessionState::Running;
        info!("Monitoring {} ({:?})", self.root.display(), notifier.kind());
        Ok(notifier)
    }

    fn stop(&mut self, notifier: Notifier) {
        self.state = SessionState::Stopping;
        let discarded = notifier.shutdown(self.config.stop_timeout());
        let pending = self.tracker.clear();
        self.stats.dropped += discarded + pending;
        if discarded + pending > 0 {
            debug!("Dropped {} queued and {} pending events on shutdown", discarded, pending);
        }
        self.state = SessionState::Stopped;
        info!(
            "Stopped monitoring {} ({} digested, {} failed)",
            self.root.display(),
            self.stats.digested,
            self.stats.failed
        );
    }

    /// Feeds one raw notification through the filter and pipeline.
    pub fn handle_event(&mut self, event: Event) {
        for (signal, path) in interpret(&event, self.completion) {
            match signal {
                Signal::Finished => {
                    self.tracker.forget(path);
                    self.process(path);
                }
                Signal::Written => {
                    if self.accept(path) {
                        self.tracker.touch(path);
                    }
                }
                Signal::Removed => self.tracker.forget(path),
            }
        }
    }

    /// Processes every pending write that has been quiet long enough.
    pub fn flush_settled(&mut self) {
        for path in self.tracker.ready() {
            self.process(&path);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.tracker.pending_count()
    }

    fn accept(&mut self, path: &Path) -> bool {
        match self.filter.check(path) {
            Ok(()) => true,
            Err(rejection) => {
                debug!(path = %path.display(), ?rejection, "ignored");
                self.stats.ignored += 1;
                false
            }
        }
    }

    fn process(&mut self, path: &Path) {
        if !self.accept(path) {
            return;
        }

        match self.handler.on_closed(&self.root, path) {
            Ok(()) => self.stats.digested += 1,
            Err(err) => {
                error!(path = %path.display(), "Could not hash file: {}", err);
                self.stats.failed += 1;
            }
        }
        self.stats.last_processed = Some(path.to_path_buf());
    }
}
