//! Tailer configuration and seek positions.

use crate::error::{Error, Result};
use crate::identity::FileIdentifier;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between polls of the followed path.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default number of lines buffered between the tail task and the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Where a seek offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Whence {
    /// From the beginning of the file.
    #[default]
    Start,
    /// From the position of a freshly opened handle, which is the beginning.
    Current,
    /// From the end of the file.
    End,
}

impl From<Whence> for u8 {
    fn from(whence: Whence) -> Self {
        match whence {
            Whence::Start => 0,
            Whence::Current => 1,
            Whence::End => 2,
        }
    }
}

impl TryFrom<u8> for Whence {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Start),
            1 => Ok(Self::Current),
            2 => Ok(Self::End),
            other => Err(format!("invalid whence {other}, expected 0, 1 or 2")),
        }
    }
}

/// Initial position of a tailer.
///
/// Persist the `SeekInfo` of the last line you processed (see
/// [`Line::seek_info`](crate::Line::seek_info)) and pass it back on the next
/// start to continue exactly where you left off. The offset is only honoured
/// when `file_identifier` still matches the file at the path; otherwise the
/// file was rotated and reading restarts at the beginning of the new one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SeekInfo {
    pub offset: i64,
    pub whence: Whence,
    #[serde(default)]
    pub file_identifier: Option<FileIdentifier>,
}

impl SeekInfo {
    /// Start of the file.
    pub fn start() -> Self {
        Self::default()
    }

    /// Current end of the file; only new writes are read.
    pub fn end() -> Self {
        Self {
            offset: 0,
            whence: Whence::End,
            file_identifier: None,
        }
    }

    /// Absolute offset, trusted only for the given file incarnation.
    pub fn resume(offset: u64, file_identifier: Option<FileIdentifier>) -> Self {
        Self {
            offset: i64::try_from(offset).unwrap_or(i64::MAX),
            whence: Whence::Start,
            file_identifier,
        }
    }

    /// Resolves this seek against the file currently open.
    ///
    /// A stored identifier that does not match `current` means the offset
    /// belongs to an earlier incarnation of the file, so reading starts at 0.
    pub(crate) fn resolve(&self, current: &FileIdentifier, len: u64) -> Result<u64> {
        if let Some(expected) = &self.file_identifier {
            if expected != current {
                return Ok(0);
            }
        }

        let base = match self.whence {
            Whence::Start | Whence::Current => 0,
            Whence::End => i64::try_from(len).unwrap_or(i64::MAX),
        };
        let position = base.saturating_add(self.offset);
        u64::try_from(position).map_err(|_| {
            Error::invalid_config(format!(
                "seek to {position} lands before the start of the file"
            ))
        })
    }
}

/// A resumable position within one incarnation of a file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadPosition {
    pub offset: u64,
    pub file_identifier: Option<FileIdentifier>,
}

impl ReadPosition {
    /// The offset to use for the file identified by `current`.
    ///
    /// Positions recorded for a different file are discarded.
    pub fn resolve(&self, current: &FileIdentifier) -> u64 {
        match &self.file_identifier {
            Some(id) if id != current => 0,
            _ => self.offset,
        }
    }
}

/// Options recognised by [`Tailer::start`](crate::Tailer::start).
#[derive(Debug, Clone)]
pub struct Config {
    /// Keep reading after reaching the current end of the file.
    pub follow: bool,
    /// Reopen the path when the file is deleted or rotated. Requires `follow`.
    pub reopen: bool,
    /// Poll the path instead of relying on OS change notifications.
    pub poll: bool,
    /// Initial position; `None` starts at the current end of the file.
    pub location: Option<SeekInfo>,
    /// Fail `start` if the file does not exist, even when `reopen` is set.
    pub must_exist: bool,
    /// Only emit lines that end with a terminator.
    pub complete_lines: bool,
    /// Split lines longer than this many bytes into several lines.
    pub max_line_size: Option<usize>,
    /// Interval between polls, and the backoff after a failed attempt.
    pub poll_interval: Duration,
    /// Number of lines buffered ahead of the consumer.
    pub channel_capacity: usize,
    /// When the file disappears and `reopen` is off, end the stream with a
    /// `FileNotFound` error line instead of ending it quietly.
    pub fail_on_delete: bool,
    /// After a reopen that finds the very same file again, resume at the last
    /// committed offset instead of starting over.
    pub resume_same_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            follow: false,
            reopen: false,
            poll: false,
            location: None,
            must_exist: false,
            complete_lines: false,
            max_line_size: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            fail_on_delete: false,
            resume_same_file: false,
        }
    }
}

impl Config {
    /// Follow by name across rotations, like `tail -F`.
    pub fn follow_name() -> Self {
        Self {
            follow: true,
            reopen: true,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.reopen && !self.follow {
            return Err(Error::invalid_config("reopen requires follow"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_config("poll interval must be positive"));
        }
        if self.channel_capacity == 0 {
            return Err(Error::invalid_config("channel capacity must be positive"));
        }
        if self.max_line_size == Some(0) {
            return Err(Error::invalid_config("max line size must be positive"));
        }
        Ok(())
    }

    /// Whether a missing file may be waited for instead of failing `start`.
    pub(crate) fn waits_for_file(&self) -> bool {
        self.follow && self.reopen && !self.must_exist
    }
}
