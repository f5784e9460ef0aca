//! The background task that follows one file.
//!
//! The engine owns the open handle and the splitter that tracks how far the
//! file has been read. It loops over read, wait for a change, react:
//! growth is read, an in-place truncation rewinds to 0, and a deleted or
//! rotated file is drained and then replaced by whatever the path resolves to
//! next. The committed offset is the only state that outlives a handle.

use crate::config::{Config, ReadPosition};
use crate::error::{Error, Result};
use crate::identity::{self, FileIdentifier};
use crate::lifecycle;
use crate::reader::{LineSplitter, RawLine, READ_CHUNK_SIZE};
use crate::stream::Line;
use crate::watcher::{ChangeEvent, ChangeWatcher};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One open incarnation of the followed file and its watcher.
#[derive(Debug)]
pub(crate) struct FileSession {
    file: File,
    identifier: FileIdentifier,
    watcher: ChangeWatcher,
}

impl FileSession {
    /// Opens `path`, reading the identity through the new handle.
    pub(crate) async fn open(path: &Path, config: &Config) -> Result<Self> {
        let file = File::open(path).await?;
        let identifier = identity::identify(&file).await?;
        let watcher = ChangeWatcher::new(path, config);
        Ok(Self {
            file,
            identifier,
            watcher,
        })
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.file.metadata().await?.len())
    }

    async fn seek(&mut self, offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        Ok(())
    }
}

/// Hands lines to the consumer, giving up when the tailer is stopped.
#[derive(Debug)]
struct Publisher {
    tx: mpsc::Sender<Line>,
    cancel: CancellationToken,
}

impl Publisher {
    async fn send(&self, line: Line) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = self.tx.send(line) => sent.map_err(|_| Error::StreamClosed),
        }
    }
}

#[derive(Debug)]
pub(crate) struct TailEngine {
    path: PathBuf,
    config: Config,
    session: Option<FileSession>,
    splitter: LineSplitter,
    publisher: Publisher,
}

impl TailEngine {
    /// Opens the file and positions it according to `config.location`.
    ///
    /// A missing file is only acceptable when the config allows waiting for
    /// it; the task then reads it from the start once it shows up.
    pub(crate) async fn open(
        path: PathBuf,
        config: Config,
        tx: mpsc::Sender<Line>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;

        let mut splitter = LineSplitter::new(0, config.max_line_size);
        let session = match FileSession::open(&path, &config).await {
            Ok(mut session) => {
                let len = session.len().await?;
                let offset = match &config.location {
                    Some(seek) => seek.resolve(&session.identifier, len)?,
                    None => len,
                };
                session.seek(offset).await?;
                splitter.reset(offset);
                info!(
                    path = %path.display(),
                    identifier = %session.identifier,
                    offset,
                    "opened file"
                );
                Some(session)
            }
            Err(e) if e.is_not_found() && config.waits_for_file() => {
                info!(path = %path.display(), "file does not exist yet, waiting for it");
                None
            }
            Err(e) if e.is_not_found() => {
                return Err(Error::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            config,
            session,
            splitter,
            publisher: Publisher { tx, cancel },
        })
    }

    /// Identity of the currently open file, if any.
    pub(crate) fn file_identifier(&self) -> Option<&FileIdentifier> {
        self.session.as_ref().map(|s| &s.identifier)
    }

    /// Drives the follow loop until the stream ends or the tailer is stopped.
    /// Dropping `self` at the end closes the file and the output channel.
    pub(crate) async fn run(mut self) {
        match self.follow().await {
            Ok(()) => debug!("reached end of stream"),
            Err(e) if e.is_terminal() => debug!(reason = %e, "tail task stopping"),
            Err(e) => {
                debug!(error = %e, "tail task ending with error");
                let _ = self.emit_error(e).await;
            }
        }
    }

    async fn follow(&mut self) -> Result<()> {
        if self.session.is_none() {
            self.reopen(None).await?;
        }

        loop {
            if let Err(e) = self.read_available().await {
                self.absorb(e).await?;
                continue;
            }

            if !self.config.follow {
                return self.flush_partial().await;
            }

            let change = match self.wait_for_change().await {
                Ok(change) => change,
                Err(e) => {
                    self.absorb(e).await?;
                    continue;
                }
            };

            match change {
                ChangeEvent::None | ChangeEvent::Modified => {}
                ChangeEvent::Truncated => {
                    if let Err(e) = self.rewind().await {
                        self.absorb(e).await?;
                    }
                }
                ChangeEvent::Deleted => {
                    // Whatever was appended before the rotation is still
                    // readable through the old handle.
                    if let Err(e) = self.read_available().await {
                        self.absorb(e).await?;
                    }
                    self.flush_partial().await?;

                    if !self.config.reopen {
                        info!("file deleted, ending stream");
                        if self.config.fail_on_delete {
                            return Err(Error::FileNotFound {
                                path: self.path.display().to_string(),
                            });
                        }
                        return Ok(());
                    }

                    let previous = self.session.take().map(|s| s.identifier);
                    info!("file deleted or rotated, reopening");
                    self.reopen(previous).await?;
                }
            }
        }
    }

    /// Reads from the current position to EOF and emits every complete line.
    async fn read_available(&mut self) -> Result<()> {
        let Self {
            session,
            splitter,
            publisher,
            ..
        } = self;
        let Some(session) = session.as_mut() else {
            return Ok(());
        };

        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            let n = session.file.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            for raw in splitter.push(&buf[..n]) {
                publisher
                    .send(Line::new(raw.text, raw.end, Some(session.identifier.clone())))
                    .await?;
            }
        }
    }

    /// Emits the buffered partial line unless only complete lines are wanted.
    async fn flush_partial(&mut self) -> Result<()> {
        if self.config.complete_lines {
            return Ok(());
        }
        match self.splitter.finish() {
            Some(RawLine { text, end }) => {
                let line = Line::new(text, end, self.file_identifier().cloned());
                self.publisher.send(line).await
            }
            None => Ok(()),
        }
    }

    async fn wait_for_change(&mut self) -> Result<ChangeEvent> {
        let pos = self.splitter.consumed();
        let Some(session) = self.session.as_mut() else {
            return Ok(ChangeEvent::Deleted);
        };
        let change = session
            .watcher
            .block_until_event(&self.publisher.cancel, &session.identifier, pos)
            .await?;
        debug!(?change, pos, "file changed");
        Ok(change)
    }

    /// The file shrank in place: start over from its beginning.
    async fn rewind(&mut self) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            session.seek(0).await?;
        }
        info!(
            offset = self.splitter.consumed(),
            "file truncated, restarting from the beginning"
        );
        self.splitter.reset(0);
        Ok(())
    }

    /// Waits for the path to exist again and opens it.
    ///
    /// A different file is read from the start. The same file again is read
    /// from the start too, unless `resume_same_file` asks to continue at the
    /// committed offset.
    async fn reopen(&mut self, previous: Option<FileIdentifier>) -> Result<()> {
        let committed = ReadPosition {
            offset: self.splitter.committed(),
            file_identifier: previous,
        };

        loop {
            let mut waiter = ChangeWatcher::new(&self.path, &self.config);
            if let Err(e) = waiter.block_until_exists(&self.publisher.cancel).await {
                self.absorb(e).await?;
                continue;
            }

            let opened =
                lifecycle::cancellable(&self.publisher.cancel, FileSession::open(&self.path, &self.config))
                    .await;
            match opened {
                Ok(mut session) => {
                    let offset = self.reopen_offset(&committed, &session.identifier);
                    if let Err(e) = session.seek(offset).await {
                        self.absorb(e).await?;
                        continue;
                    }
                    info!(identifier = %session.identifier, offset, "reopened file");
                    self.splitter.reset(offset);
                    self.session = Some(session);
                    return Ok(());
                }
                Err(e) if e.is_not_found() => debug!("file vanished before it could be opened"),
                Err(e) => self.absorb(e).await?,
            }
        }
    }

    fn reopen_offset(&self, committed: &ReadPosition, current: &FileIdentifier) -> u64 {
        match &committed.file_identifier {
            Some(previous)
                if self.config.resume_same_file && identity::identical(previous, current) =>
            {
                committed.resolve(current)
            }
            _ => 0,
        }
    }

    /// Reports a recoverable error on the stream and backs off before the
    /// next attempt. Terminal errors are handed back to end the loop.
    async fn absorb(&mut self, error: Error) -> Result<()> {
        if error.is_terminal() {
            return Err(error);
        }
        warn!(error = %error, "error while following file");
        self.emit_error(error).await?;
        lifecycle::sleep(&self.publisher.cancel, self.config.poll_interval).await
    }

    async fn emit_error(&self, error: Error) -> Result<()> {
        let line = Line::error(
            error,
            self.splitter.committed(),
            self.file_identifier().cloned(),
        );
        self.publisher.send(line).await
    }
}
