//! Buffered file I/O
//!
//! Large-buffer readers and writers used by the FASTA parser and the match
//! table sink.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

// Default buffer sizes
const DEFAULT_READ_BUFFER_SIZE: usize = 1024 * 1024; // 1MB
const DEFAULT_WRITE_BUFFER_SIZE: usize = 1024 * 1024; // 1MB

/// Buffered file reader
pub struct FastReader {
    reader: BufReader<File>,
    bytes_read: usize,
}

impl FastReader {
    /// Open `path` for reading with the given (or default) buffer size
    pub fn new<P: AsRef<Path>>(path: P, buffer_size: Option<usize>) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let buf_size = buffer_size.unwrap_or(DEFAULT_READ_BUFFER_SIZE);

        Ok(Self {
            reader: BufReader::with_capacity(buf_size, file),
            bytes_read: 0,
        })
    }

    /// Iterate over lines with trailing `\n` / `\r\n` removed
    pub fn read_lines(&mut self) -> Lines<'_> {
        Lines {
            reader: &mut self.reader,
            bytes_read: &mut self.bytes_read,
            buffer: String::new(),
        }
    }

    /// Total bytes consumed through this reader
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }
}

/// Iterator over lines in a file
pub struct Lines<'a> {
    reader: &'a mut BufReader<File>,
    bytes_read: &'a mut usize,
    buffer: String,
}

impl<'a> Iterator for Lines<'a> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_line(&mut self.buffer) {
            Ok(0) => None,
            Ok(bytes) => {
                *self.bytes_read += bytes;

                if self.buffer.ends_with('\n') {
                    self.buffer.pop();
                    if self.buffer.ends_with('\r') {
                        self.buffer.pop();
                    }
                }

                Some(Ok(self.buffer.clone()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Buffered file writer; truncates on open
pub struct FastWriter {
    writer: BufWriter<File>,
    bytes_written: usize,
}

impl FastWriter {
    /// Create (or truncate) `path` for writing
    pub fn new<P: AsRef<Path>>(path: P, buffer_size: Option<usize>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        let buf_size = buffer_size.unwrap_or(DEFAULT_WRITE_BUFFER_SIZE);

        Ok(Self {
            writer: BufWriter::with_capacity(buf_size, file),
            bytes_written: 0,
        })
    }

    /// Write a line to the file (appends a newline)
    pub fn write_line(&mut self, line: &str) -> io::Result<usize> {
        self.write_all(line.as_bytes())?;
        self.write_all(b"\n")?;
        Ok(line.len() + 1)
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}

impl Write for FastWriter {
    /// Buffers all of `buf`; a short write never happens
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write_all(buf)?;
        self.bytes_written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
