//! Test utilities for creating temporary log files and simulating rotation.

#[cfg(test)]
use std::fs::{self, File, OpenOptions};
#[cfg(test)]
use std::io::Write;
#[cfg(test)]
use std::path::{Path, PathBuf};

#[cfg(test)]
pub struct TempLogFile {
    pub path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

#[cfg(test)]
impl TempLogFile {
    /// Create a new, empty temporary log file for testing
    pub fn new() -> std::io::Result<Self> {
        let temp_file = Self::missing()?;
        File::create(&temp_file.path)?;
        Ok(temp_file)
    }

    /// A path inside a fresh temporary directory where no file exists yet
    pub fn missing() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("test.log");

        Ok(Self {
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Create a temporary log file with one initial line
    pub fn with_content(content: &str) -> std::io::Result<Self> {
        let temp_file = Self::new()?;
        temp_file.append_content(content)?;
        Ok(temp_file)
    }

    /// Append a line to the temporary log file
    pub fn append_content(&self, content: &str) -> std::io::Result<()> {
        self.write_raw(&format!("{}\n", content))
    }

    /// Append bytes exactly as given, without a terminator
    pub fn write_raw(&self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Truncate the file in place, keeping its identity
    pub fn truncate(&self) -> std::io::Result<()> {
        OpenOptions::new().write(true).open(&self.path)?.set_len(0)?;
        Ok(())
    }

    /// Move the file aside to `<name>.1` and create an empty one in its place
    pub fn rotate(&self) -> std::io::Result<()> {
        fs::rename(&self.path, self.rotated_path())?;
        File::create(&self.path)?;
        Ok(())
    }

    /// Delete the file
    pub fn remove(&self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }

    pub fn rotated_path(&self) -> PathBuf {
        self.path.with_extension("log.1")
    }

    /// Get the path to the temporary file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_log_file_creation() {
        let temp_file = TempLogFile::new().unwrap();
        assert!(temp_file.path().exists());

        let missing = TempLogFile::missing().unwrap();
        assert!(!missing.path().exists());
    }

    #[tokio::test]
    async fn test_temp_log_file_with_content() {
        let temp_file = TempLogFile::with_content("test line").unwrap();

        let file_content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(file_content, "test line\n");
    }

    #[tokio::test]
    async fn test_append_content() {
        let temp_file = TempLogFile::new().unwrap();
        temp_file.append_content("line 1").unwrap();
        temp_file.write_raw("line 2").unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content, "line 1\nline 2");
    }

    #[tokio::test]
    async fn test_truncate() {
        let temp_file = TempLogFile::with_content("initial content").unwrap();
        temp_file.truncate().unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_rotate() {
        let temp_file = TempLogFile::with_content("old").unwrap();
        temp_file.rotate().unwrap();

        assert_eq!(std::fs::read_to_string(temp_file.rotated_path()).unwrap(), "old\n");
        assert!(std::fs::read_to_string(temp_file.path()).unwrap().is_empty());
    }
}
