//! Splitting raw file bytes into lines with resumable offsets.

/// Size of each read from the followed file.
pub(crate) const READ_CHUNK_SIZE: usize = 64 * 1024;

/// A line cut out of the byte stream, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawLine {
    pub(crate) text: String,
    /// Offset immediately after the line's terminator.
    pub(crate) end: u64,
}

/// Incremental line splitter.
///
/// Bytes are pushed as they are read; complete lines come out with the file
/// offset just past their `\n`. A trailing partial line stays buffered until
/// its terminator shows up or [`LineSplitter::finish`] is called.
#[derive(Debug)]
pub(crate) struct LineSplitter {
    pending: Vec<u8>,
    /// File offset of `pending[0]`, which is also the end of the last line.
    committed: u64,
    max_line_size: Option<usize>,
}

impl LineSplitter {
    pub(crate) fn new(start: u64, max_line_size: Option<usize>) -> Self {
        Self {
            pending: Vec::new(),
            committed: start,
            max_line_size,
        }
    }

    /// Drops any partial line and restarts at `offset`.
    pub(crate) fn reset(&mut self, offset: u64) {
        self.pending.clear();
        self.committed = offset;
    }

    /// Offset just after the last emitted line.
    pub(crate) fn committed(&self) -> u64 {
        self.committed
    }

    /// Offset of the next byte to be read from the file.
    pub(crate) fn consumed(&self) -> u64 {
        self.committed + self.pending.len() as u64
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<RawLine> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.next_cut(start) {
            let terminated = self.pending[pos] == b'\n';
            let line = &self.pending[start..pos];
            let consumed = line.len() + usize::from(terminated);
            let text = decode_line(line, terminated);
            self.committed += consumed as u64;
            lines.push(RawLine {
                text,
                end: self.committed,
            });
            start += consumed;
        }
        self.pending.drain(..start);
        lines
    }

    /// Emits the buffered partial line, if any.
    pub(crate) fn finish(&mut self) -> Option<RawLine> {
        if self.pending.is_empty() {
            return None;
        }
        let text = decode_line(&self.pending, false);
        self.committed += self.pending.len() as u64;
        self.pending.clear();
        Some(RawLine {
            text,
            end: self.committed,
        })
    }

    /// Finds where the next line starting at `start` ends: the index of its
    /// `\n`, or the index where an over-long line is cut.
    fn next_cut(&self, start: usize) -> Option<usize> {
        let rest = &self.pending[start..];
        let newline = rest.iter().position(|&b| b == b'\n');
        match (newline, self.max_line_size) {
            (Some(n), Some(max)) if n > max => Some(start + max),
            (Some(n), _) => Some(start + n),
            (None, Some(max)) if rest.len() > max => Some(start + max),
            (None, _) => None,
        }
    }
}

/// Decodes one line, dropping the `\r` of a CRLF terminator.
fn decode_line(bytes: &[u8], terminated: bool) -> String {
    let bytes = match bytes {
        [head @ .., b'\r'] if terminated => head,
        _ => bytes,
    };
    String::from_utf8_lossy(bytes).into_owned()
}
