//! Platform-neutral file identity.
//!
//! A [`FileIdentifier`] names the underlying file a handle points at,
//! independent of the path used to reach it. Two identifiers compare equal
//! only when they were taken from the same file incarnation, which is how a
//! rotated (renamed and recreated) file is told apart from one that was
//! merely truncated in place.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::fs::File;

/// Opaque token identifying one incarnation of a file.
///
/// The textual form is platform specific and only meant to be persisted and
/// handed back to a later [`SeekInfo`](crate::SeekInfo); compare tokens with
/// `==` or [`identical`], never by parsing them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileIdentifier(String);

impl FileIdentifier {
    /// The token as a string, suitable for storage next to an offset.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FileIdentifier {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl FromStr for FileIdentifier {
    type Err = std::convert::Infallible;

    fn from_str(token: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(token.to_string()))
    }
}

/// Returns `true` if both tokens refer to the same underlying file.
pub fn identical(a: &FileIdentifier, b: &FileIdentifier) -> bool {
    a == b
}

/// Reads the identity of an open file through its handle.
pub async fn identify(file: &File) -> Result<FileIdentifier> {
    sys::identify(file)
        .await
        .map_err(|source| Error::IdentityUnavailable { source })
}

/// What a path currently resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathStat {
    pub(crate) identifier: FileIdentifier,
    pub(crate) len: u64,
}

/// Stats `path`, following symlinks.
///
/// Failing to reach the file yields `Error::Io` with the original kind so
/// callers can single out `NotFound`; failing to read the identity of a file
/// that was reached yields `Error::IdentityUnavailable`.
pub(crate) async fn stat_path(path: &Path) -> Result<PathStat> {
    sys::stat_path(path).await
}

#[cfg(unix)]
mod sys {
    use super::{FileIdentifier, PathStat};
    use crate::error::Result;
    use std::fs::Metadata;
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;
    use tokio::fs::File;

    pub(super) async fn identify(file: &File) -> std::io::Result<FileIdentifier> {
        let metadata = file.metadata().await?;
        Ok(from_metadata(&metadata))
    }

    pub(super) async fn stat_path(path: &Path) -> Result<PathStat> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(PathStat {
            identifier: from_metadata(&metadata),
            len: metadata.len(),
        })
    }

    fn from_metadata(metadata: &Metadata) -> FileIdentifier {
        FileIdentifier(format!("{}:{}", metadata.dev(), metadata.ino()))
    }
}

#[cfg(windows)]
mod sys {
    use super::{FileIdentifier, PathStat};
    use crate::error::{Error, Result};
    use std::os::windows::io::AsRawHandle;
    use std::path::Path;
    use tokio::fs::File;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        BY_HANDLE_FILE_INFORMATION, GetFileInformationByHandle,
    };

    pub(super) async fn identify(file: &File) -> std::io::Result<FileIdentifier> {
        by_handle(file)
    }

    // The path may be a symlink whose target changed, so the identity is
    // always read from a handle rather than from the path.
    pub(super) async fn stat_path(path: &Path) -> Result<PathStat> {
        let file = File::open(path).await?;
        let len = file.metadata().await?.len();
        let identifier =
            by_handle(&file).map_err(|source| Error::IdentityUnavailable { source })?;
        Ok(PathStat { identifier, len })
    }

    fn by_handle(file: &File) -> std::io::Result<FileIdentifier> {
        let handle = file.as_raw_handle() as HANDLE;
        // SAFETY: the struct is plain old data and the handle stays valid for
        // the duration of the call because `file` is borrowed.
        let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };
        let ok = unsafe { GetFileInformationByHandle(handle, &mut info) };
        if ok == 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(FileIdentifier(format!(
            "{}:{}:{}",
            info.dwVolumeSerialNumber, info.nFileIndexHigh, info.nFileIndexLow
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TempLogFile;

    #[tokio::test]
    async fn test_same_file_has_identical_identity() {
        let temp_file = TempLogFile::with_content("hello").unwrap();

        let first = File::open(temp_file.path()).await.unwrap();
        let second = File::open(temp_file.path()).await.unwrap();

        let a = identify(&first).await.unwrap();
        let b = identify(&second).await.unwrap();
        assert!(identical(&a, &b));
    }

    #[tokio::test]
    async fn test_handle_identity_matches_path_identity() {
        let temp_file = TempLogFile::with_content("hello").unwrap();
        let file = File::open(temp_file.path()).await.unwrap();

        let from_handle = identify(&file).await.unwrap();
        let from_path = stat_path(temp_file.path()).await.unwrap();

        assert_eq!(from_handle, from_path.identifier);
        assert_eq!(from_path.len, "hello\n".len() as u64);
    }

    #[tokio::test]
    async fn test_rotated_file_has_different_identity() {
        let temp_file = TempLogFile::with_content("old").unwrap();
        let old = File::open(temp_file.path()).await.unwrap();
        let old_id = identify(&old).await.unwrap();

        temp_file.rotate().unwrap();

        let new_id = stat_path(temp_file.path()).await.unwrap().identifier;
        assert!(!identical(&old_id, &new_id));
    }

    #[tokio::test]
    async fn test_truncation_keeps_identity() {
        let temp_file = TempLogFile::with_content("some content").unwrap();
        let before = stat_path(temp_file.path()).await.unwrap();

        temp_file.truncate().unwrap();

        let after = stat_path(temp_file.path()).await.unwrap();
        assert_eq!(before.identifier, after.identifier);
        assert_eq!(after.len, 0);
    }

    #[tokio::test]
    async fn test_stat_missing_path_is_not_found() {
        let temp_file = TempLogFile::missing().unwrap();

        let err = stat_path(temp_file.path()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_identifier_is_opaque_string() {
        let id: FileIdentifier = "2049:1234".parse().unwrap();
        assert_eq!(id.as_str(), "2049:1234");
        assert_eq!(id.to_string(), "2049:1234");

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"2049:1234\"");
        let back: FileIdentifier = serde_json::from_str(&json).unwrap();
        assert!(identical(&id, &back));
    }
}
