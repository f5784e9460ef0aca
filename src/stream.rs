//! The consumer side of a tailer: emitted lines and the handle that owns the
//! background task.

use crate::config::{Config, SeekInfo};
use crate::engine::TailEngine;
use crate::error::{Error, Result};
use crate::identity::FileIdentifier;
use crate::lifecycle::Lifecycle;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// One line read from the followed file.
#[derive(Debug)]
pub struct Line {
    /// Line content without its terminator. Empty for error lines.
    pub text: String,
    /// Byte offset just after this line; resuming here yields the next line.
    pub offset: u64,
    /// Identity of the file the line was read from.
    pub file_identifier: Option<FileIdentifier>,
    /// Set when the line reports a problem instead of carrying content.
    pub err: Option<Error>,
}

impl Line {
    pub(crate) fn new(text: String, offset: u64, file_identifier: Option<FileIdentifier>) -> Self {
        Self {
            text,
            offset,
            file_identifier,
            err: None,
        }
    }

    pub(crate) fn error(err: Error, offset: u64, file_identifier: Option<FileIdentifier>) -> Self {
        Self {
            text: String::new(),
            offset,
            file_identifier,
            err: Some(err),
        }
    }

    pub fn is_err(&self) -> bool {
        self.err.is_some()
    }

    /// The position to pass to a later [`Tailer::start`] to continue right
    /// after this line, provided the file has not been rotated meanwhile.
    pub fn seek_info(&self) -> SeekInfo {
        SeekInfo::resume(self.offset, self.file_identifier.clone())
    }
}

/// Follows a file and yields its lines as a [`Stream`].
///
/// The stream ends when the tailer stops: after a one-shot read, when the
/// file disappears and reopening is disabled, or after [`Tailer::stop`].
pub struct Tailer {
    path: PathBuf,
    receiver: mpsc::Receiver<Line>,
    lifecycle: Lifecycle,
}

impl Tailer {
    /// Opens `path` and starts following it in a background task.
    ///
    /// Fails without spawning anything if the config is invalid, if the file
    /// is missing and the config does not allow waiting for it, or if it
    /// cannot be opened.
    pub async fn start<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let token = CancellationToken::new();

        let engine = TailEngine::open(path.clone(), config, tx, token.clone()).await?;
        let span = tracing::info_span!("tailer", path = %path.display());
        let lifecycle = Lifecycle::spawn(token, engine.run().instrument(span));

        Ok(Self {
            path,
            receiver: rx,
            lifecycle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next line; `None` once the tailer has terminated and
    /// every buffered line was consumed.
    pub async fn next_line(&mut self) -> Option<Line> {
        self.receiver.recv().await
    }

    /// Asks the background task to stop, without waiting for it.
    ///
    /// The task drops its file handle at its next suspension point, which
    /// may be after this returns. Use [`Tailer::stop`] when the handle must
    /// be released before continuing. Lines already buffered can still be
    /// received.
    pub fn cleanup(&mut self) {
        self.lifecycle.request_stop();
        self.receiver.close();
    }

    /// Stops the background task and waits until it has closed the file.
    ///
    /// Safe to call repeatedly, after [`Tailer::cleanup`], or after the
    /// tailer ended on its own.
    pub async fn stop(&mut self) -> Result<()> {
        self.lifecycle.stop().await
    }

    /// Returns `true` once the background task has exited.
    pub fn is_stopped(&self) -> bool {
        self.lifecycle.is_finished()
    }
}

impl std::fmt::Debug for Tailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tailer")
            .field("path", &self.path)
            .field("stop_requested", &self.lifecycle.is_stop_requested())
            .finish_non_exhaustive()
    }
}

impl Stream for Tailer {
    type Item = Line;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
