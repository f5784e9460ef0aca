//! Change detection for a followed file.
//!
//! Two strategies share one contract: [`PollingWatcher`] re-stats the path on
//! a fixed interval, [`NotifyWatcher`] wakes up on filesystem events from the
//! notify crate. Both funnel every decision through [`stat_changes`], because
//! directory events alone cannot tell a rotation from an append.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::{self, FileIdentifier};
use crate::lifecycle;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How often the notify strategy re-stats the file even without events.
/// Covers writes through a symlink whose target directory is not watched.
const NOTIFY_RECHECK_INTERVAL: Duration = Duration::from_secs(1);

/// What happened to the followed file since the last look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    None,
    /// The file grew past the read position.
    Modified,
    /// The same file shrank below the read position.
    Truncated,
    /// The path no longer resolves to the opened file.
    Deleted,
}

/// Compares what `path` resolves to now with the file opened as `opened`,
/// read up to byte `pos`.
pub(crate) async fn stat_changes(
    path: &Path,
    opened: &FileIdentifier,
    pos: u64,
) -> Result<ChangeEvent> {
    classify(identity::stat_path(path).await, opened, pos)
}

/// Turns the outcome of a stat into a change event.
fn classify(
    stat: Result<identity::PathStat>,
    opened: &FileIdentifier,
    pos: u64,
) -> Result<ChangeEvent> {
    let stat = match stat {
        Ok(stat) => stat,
        Err(Error::Io(e)) if is_gone(&e) => return Ok(ChangeEvent::Deleted),
        Err(Error::IdentityUnavailable { source }) => {
            warn!(error = %source, "file identity unavailable, treating as deleted");
            return Ok(ChangeEvent::Deleted);
        }
        Err(e) => return Err(e),
    };

    if !identity::identical(opened, &stat.identifier) {
        return Ok(ChangeEvent::Deleted);
    }

    Ok(compare_sizes(stat.len, pos))
}

/// Whether a stat error means the file is gone.
///
/// Windows cannot delete a file while a handle is open (the tailer keeps
/// one), so during deletion it answers access denied instead of not found.
fn is_gone(error: &std::io::Error) -> bool {
    match error.kind() {
        std::io::ErrorKind::NotFound => true,
        std::io::ErrorKind::PermissionDenied => cfg!(windows),
        _ => false,
    }
}

fn compare_sizes(size: u64, pos: u64) -> ChangeEvent {
    if size > pos {
        ChangeEvent::Modified
    } else if size < pos {
        ChangeEvent::Truncated
    } else {
        ChangeEvent::None
    }
}

async fn exists(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Watches one file incarnation with the strategy chosen by the config.
#[derive(Debug)]
pub(crate) enum ChangeWatcher {
    Polling(PollingWatcher),
    Notify(NotifyWatcher),
}

impl ChangeWatcher {
    /// Builds the watcher for `path`. Falls back to polling when the notify
    /// backend cannot be set up.
    pub(crate) fn new(path: &Path, config: &Config) -> Self {
        let polling = || Self::Polling(PollingWatcher::new(path, config.poll_interval));
        if config.poll {
            return polling();
        }
        match NotifyWatcher::new(path, NOTIFY_RECHECK_INTERVAL) {
            Ok(watcher) => Self::Notify(watcher),
            Err(e) => {
                warn!(error = %e, "notify watcher unavailable, falling back to polling");
                polling()
            }
        }
    }

    /// Waits until the path exists.
    pub(crate) async fn block_until_exists(&mut self, cancel: &CancellationToken) -> Result<()> {
        match self {
            Self::Polling(w) => w.block_until_exists(cancel).await,
            Self::Notify(w) => w.block_until_exists(cancel).await,
        }
    }

    /// Waits until the file opened as `opened` and read up to `pos` changes.
    /// Never returns `ChangeEvent::None`.
    pub(crate) async fn block_until_event(
        &mut self,
        cancel: &CancellationToken,
        opened: &FileIdentifier,
        pos: u64,
    ) -> Result<ChangeEvent> {
        match self {
            Self::Polling(w) => w.block_until_event(cancel, opened, pos).await,
            Self::Notify(w) => w.block_until_event(cancel, opened, pos).await,
        }
    }
}

/// Polls the path on a fixed interval.
#[derive(Debug)]
pub(crate) struct PollingWatcher {
    path: PathBuf,
    interval: Duration,
}

impl PollingWatcher {
    pub(crate) fn new<P: AsRef<Path>>(path: P, interval: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            interval,
        }
    }

    pub(crate) async fn block_until_exists(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if lifecycle::cancellable(cancel, exists(&self.path)).await? {
                return Ok(());
            }
            lifecycle::sleep(cancel, self.interval).await?;
        }
    }

    pub(crate) async fn block_until_event(
        &self,
        cancel: &CancellationToken,
        opened: &FileIdentifier,
        pos: u64,
    ) -> Result<ChangeEvent> {
        loop {
            let change = lifecycle::cancellable(cancel, stat_changes(&self.path, opened, pos)).await?;
            if change != ChangeEvent::None {
                return Ok(change);
            }
            lifecycle::sleep(cancel, self.interval).await?;
        }
    }
}

/// Wakes up on filesystem events for the file and its directory.
pub(crate) struct NotifyWatcher {
    path: PathBuf,
    file_name: String,
    recheck: Duration,
    watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    watching_file: bool,
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher")
            .field("path", &self.path)
            .field("watching_file", &self.watching_file)
            .finish_non_exhaustive()
    }
}

impl NotifyWatcher {
    /// Creates a watcher on the directory containing `path`.
    pub(crate) fn new<P: AsRef<Path>>(path: P, recheck: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(watch_dir(&path), RecursiveMode::NonRecursive)?;

        let mut this = Self {
            path,
            file_name,
            recheck,
            watcher,
            receiver: rx,
            watching_file: false,
        };
        this.watch_file();
        Ok(this)
    }

    /// Adds a watch on the file itself. Such a watch follows a symlink to its
    /// target, which the directory watch does not.
    fn watch_file(&mut self) {
        if self.watching_file {
            return;
        }
        match self.watcher.watch(&self.path, RecursiveMode::NonRecursive) {
            Ok(()) => self.watching_file = true,
            Err(e) => debug!(error = %e, "file not watchable yet"),
        }
    }

    pub(crate) async fn block_until_exists(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if lifecycle::cancellable(cancel, exists(&self.path)).await? {
                self.watch_file();
                return Ok(());
            }
            self.next_wakeup(cancel).await?;
        }
    }

    pub(crate) async fn block_until_event(
        &mut self,
        cancel: &CancellationToken,
        opened: &FileIdentifier,
        pos: u64,
    ) -> Result<ChangeEvent> {
        loop {
            // The stat below already accounts for anything queued so far.
            self.discard_pending();
            let change = lifecycle::cancellable(cancel, stat_changes(&self.path, opened, pos)).await?;
            if change != ChangeEvent::None {
                return Ok(change);
            }
            self.next_wakeup(cancel).await?;
        }
    }

    fn discard_pending(&mut self) {
        while self.receiver.try_recv().is_ok() {}
    }

    /// Waits for an event concerning the file, or for the recheck interval.
    async fn next_wakeup(&mut self, cancel: &CancellationToken) -> Result<()> {
        let recheck = tokio::time::sleep(self.recheck);
        tokio::pin!(recheck);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                event = self.receiver.recv() => match event {
                    Some(Ok(event)) => {
                        if is_event_relevant_to_file(&event, &self.file_name) {
                            debug!(kind = ?event.kind, "file event");
                            return Ok(());
                        }
                    }
                    Some(Err(e)) => return Err(Error::Watcher(e)),
                    // The sender lives in the watcher we own.
                    None => return Ok(()),
                },
                _ = &mut recheck => return Ok(()),
            }
        }
    }
}

/// Directory to watch for `path`; a bare file name lives in the current one.
fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Check if a notify event is relevant to a specific file
pub(crate) fn is_event_relevant_to_file(event: &Event, target_file_name: &str) -> bool {
    event.paths.iter().any(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy() == target_file_name)
            .unwrap_or(false)
    })
}
