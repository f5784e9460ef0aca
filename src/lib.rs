//! A library that follows a growing log file like `tail -F`.
//!
//! A [`Tailer`] reads new lines as they are appended and keeps going when the
//! file is truncated in place, rotated (renamed and recreated) or deleted and
//! recreated later. Every [`Line`] carries the byte offset right after it and
//! the identity of the file it came from, so a consumer can persist its
//! position and resume exactly there, or start over when the file it was
//! reading has since been rotated away.
//!
//! # Example
//!
//! ```rust,no_run
//! use log_tail::{tail_file, Config};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut lines = tail_file("app.log", Config::follow_name()).await?;
//!
//!     while let Some(line) = lines.next().await {
//!         match line.err {
//!             None => println!("{}: {}", line.offset, line.text),
//!             Some(e) => eprintln!("Error: {}", e),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

// Internal modules - not part of public API
mod config;
mod engine;
mod error;
mod identity;
mod lifecycle;
mod reader;
mod stream;
mod watcher;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use config::{
    Config, DEFAULT_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL, ReadPosition, SeekInfo, Whence,
};
pub use error::{Error, Result};
pub use identity::{FileIdentifier, identical, identify};
pub use stream::{Line, Tailer};
pub use watcher::ChangeEvent;

use std::path::Path;

/// Starts following `path`.
///
/// Shorthand for [`Tailer::start`].
///
/// # Example
///
/// ```rust,no_run
/// use log_tail::{tail_file, Config, SeekInfo};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config {
///         location: Some(SeekInfo::start()),
///         ..Config::follow_name()
///     };
///     let mut tailer = tail_file("app.log", config).await?;
///
///     if let Some(line) = tailer.next_line().await {
///         println!("first line: {}", line.text);
///     }
///     tailer.stop().await?;
///
///     Ok(())
/// }
/// ```
pub async fn tail_file<P: AsRef<Path>>(path: P, config: Config) -> Result<Tailer> {
    Tailer::start(path, config).await
}
