//! Stream source
//!
//! Opens an input file, gunzips it when the name ends in `.gz`, and yields
//! lines one at a time without holding more than one line in memory.
//!
//! A line longer than the configured limit is a framing problem, not a data
//! problem: the iterator yields [`StreamError::LineTooLong`] and then stops.
//! Any I/O error ends the iteration the same way.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::StreamError;

/// Suffix that marks a gzip-compressed input
pub const GZIP_SUFFIX: &str = ".gz";

/// Read buffer size for the file and decoder layers
const READ_BUFFER_BYTES: usize = 256 * 1024;

/// One physical line, without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based physical line number, blank lines included
    pub number: usize,
    pub text: String,
}

/// Whether `path` is read through the gzip decoder
pub fn is_gzip(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase().ends_with(GZIP_SUFFIX))
        .unwrap_or(false)
}

/// Forward-only line iterator over a (possibly compressed) file
pub struct LineSource {
    reader: Box<dyn BufRead + Send>,
    compressed: bool,
    max_line_bytes: usize,
    line_number: usize,
    buf: Vec<u8>,
    finished: bool,
}

impl LineSource {
    /// Open `path`, adding a gzip decoder for `.gz` files
    pub fn open(path: &Path, max_line_bytes: usize) -> Result<Self, StreamError> {
        let file = File::open(path).map_err(|source| StreamError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let compressed = is_gzip(path);
        let reader: Box<dyn BufRead + Send> = if compressed {
            let decoder = MultiGzDecoder::new(BufReader::with_capacity(READ_BUFFER_BYTES, file));
            Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, decoder))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, file))
        };

        Ok(Self::new(reader, compressed, max_line_bytes))
    }

    /// Wrap an already-open reader
    pub fn new(reader: Box<dyn BufRead + Send>, compressed: bool, max_line_bytes: usize) -> Self {
        Self {
            reader,
            compressed,
            max_line_bytes,
            line_number: 0,
            buf: Vec::new(),
            finished: false,
        }
    }

    fn read_error(&self, source: std::io::Error) -> StreamError {
        let line = self.line_number + 1;
        if self.compressed {
            StreamError::Decompress { line, source }
        } else {
            StreamError::Read { line, source }
        }
    }

    fn next_line(&mut self) -> Result<Option<SourceLine>, StreamError> {
        self.buf.clear();

        // Room for a full line plus its "\r\n" terminator, so one byte over
        // the limit is still seen after the terminator is stripped.
        let limit = self.max_line_bytes as u64 + 2;
        let result = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf);
        let read = result.map_err(|e| self.read_error(e))?;

        if read == 0 {
            return Ok(None);
        }

        self.line_number += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        if self.buf.len() > self.max_line_bytes {
            return Err(StreamError::LineTooLong {
                line: self.line_number,
                limit: self.max_line_bytes,
            });
        }

        Ok(Some(SourceLine {
            number: self.line_number,
            text: String::from_utf8_lossy(&self.buf).into_owned(),
        }))
    }
}

impl Iterator for LineSource {
    type Item = Result<SourceLine, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            },
        }
    }
}
