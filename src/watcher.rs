use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use notify::event::{AccessKind, AccessMode, CreateKind, MetadataKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher, WatcherKind};

pub use crate::config::Backend;
use crate::config::WatcherConfig;
use crate::error::MonitorError;

/// How the notifier tells us a file is done being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The backend reports close-after-write directly.
    CloseEvents,
    /// Writes are considered finished after a quiet period.
    Settle,
}

impl Completion {
    pub fn for_kind(kind: WatcherKind) -> Self {
        match kind {
            WatcherKind::Inotify => Completion::CloseEvents,
            _ => Completion::Settle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The write session for the path is over.
    Finished,
    /// The path is being written; wait for it to settle.
    Written,
    Removed,
}

/// Maps a raw notification to per-path signals. Anything not listed is noise.
pub fn interpret(event: &Event, completion: Completion) -> Vec<(Signal, &Path)> {
    let paths = || event.paths.iter().map(PathBuf::as_path);

    match (&event.kind, completion) {
        (EventKind::Access(AccessKind::Close(AccessMode::Write)), _) => {
            paths().map(|p| (Signal::Finished, p)).collect()
        }
        // A file renamed into place was complete before the rename. inotify
        // sends `From`, `To` and `Both` for one rename; only `To` finishes it.
        (EventKind::Modify(ModifyKind::Name(RenameMode::To)), Completion::CloseEvents) => {
            paths().map(|p| (Signal::Finished, p)).collect()
        }
        (EventKind::Modify(ModifyKind::Name(RenameMode::To)), Completion::Settle) => {
            paths().map(|p| (Signal::Written, p)).collect()
        }
        (EventKind::Modify(ModifyKind::Name(RenameMode::From)), _) => {
            paths().map(|p| (Signal::Removed, p)).collect()
        }
        (EventKind::Modify(ModifyKind::Name(RenameMode::Both)), completion) => {
            let mut signals = Vec::new();
            if let Some(from) = event.paths.first() {
                signals.push((Signal::Removed, from.as_path()));
            }
            if let (Completion::Settle, Some(to)) = (completion, event.paths.get(1)) {
                signals.push((Signal::Written, to.as_path()));
            }
            signals
        }
        (EventKind::Remove(_), _) => paths().map(|p| (Signal::Removed, p)).collect(),
        (EventKind::Create(CreateKind::Folder), _) => Vec::new(),
        (EventKind::Create(_), Completion::Settle)
        | (EventKind::Modify(ModifyKind::Data(_)), Completion::Settle)
        | (EventKind::Modify(ModifyKind::Any), Completion::Settle)
        | (EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)), Completion::Settle) => {
            paths().map(|p| (Signal::Written, p)).collect()
        }
        _ => Vec::new(),
    }
}

/// Holds written paths until they have been quiet for a while.
///
/// Paths are released in the order they first became pending.
#[derive(Debug)]
pub struct SettleTracker {
    pending: Vec<(PathBuf, Instant)>,
    quiet: Duration,
}

impl SettleTracker {
    pub fn new(quiet: Duration) -> Self {
        Self {
            pending: Vec::new(),
            quiet,
        }
    }

    pub fn touch_at(&mut self, path: &Path, now: Instant) {
        match self.pending.iter_mut().find(|(p, _)| p == path) {
            Some((_, seen)) => *seen = now,
            None => self.pending.push((path.to_path_buf(), now)),
        }
    }

    pub fn touch(&mut self, path: &Path) {
        self.touch_at(path, Instant::now());
    }

    pub fn forget(&mut self, path: &Path) {
        self.pending.retain(|(p, _)| p != path);
    }

    /// Removes and returns every path that has been quiet long enough.
    pub fn ready_at(&mut self, now: Instant) -> Vec<PathBuf> {
        let quiet = self.quiet;
        let mut ready = Vec::new();
        self.pending.retain(|(path, seen)| {
            if now.duration_since(*seen) >= quiet {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });
        ready
    }

    pub fn ready(&mut self) -> Vec<PathBuf> {
        self.ready_at(Instant::now())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}

/// A live recursive subscription to change notifications under one root.
pub struct Notifier {
    watcher: Option<Box<dyn Watcher + Send>>,
    event_rx: Receiver<notify::Result<Event>>,
    kind: WatcherKind,
}

impl Notifier {
    pub fn start(root: &Path, config: &WatcherConfig) -> Result<Self, MonitorError> {
        let (tx, event_rx) = mpsc::channel::<notify::Result<Event>>();

        let (watcher, kind) = match config.backend {
            Backend::Native => (Self::native(root, tx)?, RecommendedWatcher::kind()),
            Backend::Polling => (
                Self::polling(root, tx, config.poll_interval())?,
                WatcherKind::PollWatcher,
            ),
            Backend::Auto => match Self::native(root, tx.clone()) {
                Ok(watcher) => (watcher, RecommendedWatcher::kind()),
                Err(err) => {
                    tracing::warn!("Native file watching unavailable ({}), falling back to polling", err);
                    (
                        Self::polling(root, tx, config.poll_interval())?,
                        WatcherKind::PollWatcher,
                    )
                }
            },
        };

        tracing::debug!("Watching {} with {:?}", root.display(), kind);

        Ok(Self {
            watcher: Some(watcher),
            event_rx,
            kind,
        })
    }

    fn native(
        root: &Path,
        tx: mpsc::Sender<notify::Result<Event>>,
    ) -> notify::Result<Box<dyn Watcher + Send>> {
        let mut watcher = RecommendedWatcher::new(tx, notify::Config::default())?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(Box::new(watcher))
    }

    fn polling(
        root: &Path,
        tx: mpsc::Sender<notify::Result<Event>>,
        interval: Duration,
    ) -> notify::Result<Box<dyn Watcher + Send>> {
        let config = notify::Config::default().with_poll_interval(interval);
        let mut watcher = PollWatcher::new(tx, config)?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(Box::new(watcher))
    }

    pub fn kind(&self) -> WatcherKind {
        self.kind
    }

    pub fn completion(&self) -> Completion {
        Completion::for_kind(self.kind)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<notify::Result<Event>, RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    /// Stops the underlying watcher and waits for its thread to let go of the
    /// channel. Returns how many undelivered events were discarded.
    pub fn shutdown(mut self, timeout: Duration) -> usize {
        drop(self.watcher.take());

        let deadline = Instant::now() + timeout;
        let mut discarded = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.event_rx.recv_timeout(remaining) {
                Ok(_) => discarded += 1,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("File watcher did not stop within {:?}", timeout);
                    break;
                }
            }
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::RemoveKind;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_close_write_is_finished_everywhere() {
        let ev = event(EventKind::Access(AccessKind::Close(AccessMode::Write)), "/r/a.csv");
        for completion in [Completion::CloseEvents, Completion::Settle] {
            assert_eq!(interpret(&ev, completion), vec![(Signal::Finished, Path::new("/r/a.csv"))]);
        }
    }

    #[test]
    fn test_modify_only_counts_when_settling() {
        let ev = event(EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)), "/r/a.csv");
        assert!(interpret(&ev, Completion::CloseEvents).is_empty());
        assert_eq!(interpret(&ev, Completion::Settle), vec![(Signal::Written, Path::new("/r/a.csv"))]);

        let poll = event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)), "/r/a.csv");
        assert_eq!(interpret(&poll, Completion::Settle).len(), 1);
    }

    #[test]
    fn test_attribute_changes_are_noise() {
        let ev = event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Extended)), "/r/a.csv");
        assert!(interpret(&ev, Completion::Settle).is_empty());
        assert!(interpret(&ev, Completion::CloseEvents).is_empty());
    }

    fn rename_events() -> [Event; 3] {
        [
            event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), "/r/.~tmp123"),
            event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), "/r/report.csv"),
            Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
                .add_path(PathBuf::from("/r/.~tmp123"))
                .add_path(PathBuf::from("/r/report.csv")),
        ]
    }

    #[test]
    fn test_rename_finishes_destination_once_with_close_events() {
        let events = rename_events();
        let signals: Vec<_> = events.iter().flat_map(|ev| interpret(ev, Completion::CloseEvents)).collect();
        assert_eq!(
            signals,
            vec![
                (Signal::Removed, Path::new("/r/.~tmp123")),
                (Signal::Finished, Path::new("/r/report.csv")),
                (Signal::Removed, Path::new("/r/.~tmp123")),
            ]
        );
    }

    #[test]
    fn test_rename_settles_destination_and_retires_source() {
        let events = rename_events();
        let both = interpret(&events[2], Completion::Settle);
        assert_eq!(
            both,
            vec![
                (Signal::Removed, Path::new("/r/.~tmp123")),
                (Signal::Written, Path::new("/r/report.csv")),
            ]
        );
        assert_eq!(
            interpret(&events[1], Completion::Settle),
            vec![(Signal::Written, Path::new("/r/report.csv"))]
        );
    }

    #[test]
    fn test_remove_and_folder_creation() {
        let rm = event(EventKind::Remove(RemoveKind::File), "/r/a.csv");
        assert_eq!(interpret(&rm, Completion::Settle), vec![(Signal::Removed, Path::new("/r/a.csv"))]);

        let mkdir = event(EventKind::Create(CreateKind::Folder), "/r/sub");
        assert!(interpret(&mkdir, Completion::Settle).is_empty());
    }

    #[test]
    fn test_settle_tracker_waits_for_quiet() {
        let mut tracker = SettleTracker::new(Duration::from_millis(100));
        let t0 = Instant::now();

        tracker.touch_at(Path::new("a"), t0);
        tracker.touch_at(Path::new("b"), t0 + Duration::from_millis(10));
        tracker.touch_at(Path::new("a"), t0 + Duration::from_millis(50));

        assert!(tracker.ready_at(t0 + Duration::from_millis(100)).is_empty());
        assert_eq!(tracker.ready_at(t0 + Duration::from_millis(110)), vec![PathBuf::from("b")]);
        assert_eq!(tracker.ready_at(t0 + Duration::from_millis(150)), vec![PathBuf::from("a")]);
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_settle_tracker_keeps_first_seen_order() {
        let mut tracker = SettleTracker::new(Duration::ZERO);
        let t0 = Instant::now();
        tracker.touch_at(Path::new("first"), t0);
        tracker.touch_at(Path::new("second"), t0);
        tracker.touch_at(Path::new("first"), t0);

        assert_eq!(
            tracker.ready_at(t0),
            vec![PathBuf::from("first"), PathBuf::from("second")]
        );
    }

    #[test]
    fn test_forget_drops_pending_path() {
        let mut tracker = SettleTracker::new(Duration::ZERO);
        tracker.touch(Path::new("gone"));
        tracker.forget(Path::new("gone"));
        assert!(tracker.ready().is_empty());
    }
}
