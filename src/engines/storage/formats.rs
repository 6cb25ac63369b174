//! Parsers and writers for the pipeline's file formats
//!
//! FASTA in and out, plus the CSV table the match report is rendered to.

use std::io::Write;
use std::path::Path;

use csv::ByteRecord;
use itertools::Itertools;

use crate::engines::compute::dispatch::DispatchReport;
use crate::engines::core::io::{FastReader, FastWriter};
use crate::engines::core::memory::MemoryMapped;
use crate::engines::storage::StorageMode;
use crate::engines::{EngineError, EngineResult};

/// Header row of the match table
pub const MATCH_TABLE_HEADER: [&str; 2] = ["Pattern", "Position"];

/// Trait for sequence record parsers
pub trait SequenceParser: Send + Sync {
    /// Parse a file and create sequence records
    fn parse_file<P: AsRef<Path>>(&self, path: P) -> EngineResult<Vec<SequenceRecord>>;

    /// Parse a string and create sequence records
    fn parse_string(&self, content: &str) -> EngineResult<Vec<SequenceRecord>>;

    /// Get the format name
    fn format_name(&self) -> &str;
}

/// Trait for sequence record writers
pub trait SequenceWriter: Send + Sync {
    /// Write sequence records to a file
    fn write_file<P: AsRef<Path>>(&self, records: &[SequenceRecord], path: P) -> EngineResult<()>;

    /// Write sequence records to a string
    fn write_string(&self, records: &[SequenceRecord]) -> EngineResult<String>;

    /// Get the format name
    fn format_name(&self) -> &str;
}

/// A sequence record with ID, description, and sequence data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Sequence identifier
    pub id: String,
    /// Optional sequence description
    pub description: Option<String>,
    pub sequence: Vec<u8>,
}

impl SequenceRecord {
    pub fn new(id: String, description: Option<String>, sequence: Vec<u8>) -> Self {
        Self {
            id,
            description,
            sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

fn trim_ascii_whitespace(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}

/// Line-driven FASTA record assembly shared by every input path.
///
/// Records with a header but no sequence lines are kept with an empty
/// sequence; deciding whether that is acceptable is up to the caller.
#[derive(Default)]
struct RecordAccumulator {
    records: Vec<SequenceRecord>,
    current: Option<SequenceRecord>,
    line_no: usize,
}

impl RecordAccumulator {
    fn push_line(&mut self, line: &[u8]) -> EngineResult<()> {
        self.line_no += 1;
        let line = trim_ascii_whitespace(line);

        if line.is_empty() {
            return Ok(());
        }

        if let Some(header) = line.strip_prefix(b">") {
            if let Some(record) = self.current.take() {
                self.records.push(record);
            }

            let header = String::from_utf8_lossy(header);
            let mut parts = header.trim().splitn(2, char::is_whitespace);
            let id = parts.next().unwrap_or_default().to_string();
            let description = parts
                .next()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string);

            self.current = Some(SequenceRecord::new(id, description, Vec::new()));
            return Ok(());
        }

        match self.current.as_mut() {
            Some(record) => {
                record
                    .sequence
                    .extend(line.iter().filter(|b| !b.is_ascii_whitespace()));
                Ok(())
            }
            None => Err(EngineError::InvalidSequenceData(format!(
                "Sequence data before the first header at line {}",
                self.line_no
            ))),
        }
    }

    fn finish(mut self) -> Vec<SequenceRecord> {
        if let Some(record) = self.current.take() {
            self.records.push(record);
        }
        self.records
    }
}

/// FASTA format parser
#[derive(Debug, Clone)]
pub struct FastaParser {
    /// How input files are read
    storage_mode: StorageMode,
    /// Buffer size for reading
    buffer_size: usize,
}

impl FastaParser {
    /// Create a new FASTA parser with the default storage mode
    pub fn new() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            buffer_size: 1024 * 1024, // 1MB
        }
    }

    /// Create a new FASTA parser with the specified storage mode
    pub fn with_storage_mode(storage_mode: StorageMode) -> Self {
        Self {
            storage_mode,
            ..Self::new()
        }
    }

    /// Parse FASTA records from raw bytes
    pub fn parse_bytes(&self, content: &[u8]) -> EngineResult<Vec<SequenceRecord>> {
        let mut acc = RecordAccumulator::default();
        for line in content.split(|&b| b == b'\n') {
            acc.push_line(line)?;
        }
        Ok(acc.finish())
    }
}

impl Default for FastaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceParser for FastaParser {
    fn parse_file<P: AsRef<Path>>(&self, path: P) -> EngineResult<Vec<SequenceRecord>> {
        match self.storage_mode {
            StorageMode::MemoryMapped => {
                let mapped = MemoryMapped::open(path.as_ref())?;
                self.parse_bytes(mapped.as_slice())
            }
            StorageMode::Buffered => {
                let mut reader = FastReader::new(path.as_ref(), Some(self.buffer_size))?;
                let mut acc = RecordAccumulator::default();

                for line in reader.read_lines() {
                    acc.push_line(line?.as_bytes())?;
                }

                Ok(acc.finish())
            }
        }
    }

    fn parse_string(&self, content: &str) -> EngineResult<Vec<SequenceRecord>> {
        self.parse_bytes(content.as_bytes())
    }

    fn format_name(&self) -> &str {
        "FASTA"
    }
}

/// FASTA format writer
#[derive(Debug, Clone)]
pub struct FastaWriter {
    /// Line width for sequence output
    line_width: usize,
    /// Buffer size for writing
    buffer_size: usize,
}

impl FastaWriter {
    /// Create a new FASTA writer with the default line width
    pub fn new() -> Self {
        Self {
            line_width: 60,
            buffer_size: 1024 * 1024, // 1MB
        }
    }

    /// Create a new FASTA writer with the specified line width
    pub fn with_line_width(line_width: usize) -> Self {
        Self {
            line_width: line_width.max(1),
            ..Self::new()
        }
    }

    fn header(record: &SequenceRecord) -> String {
        match &record.description {
            Some(desc) => format!(">{} {}", record.id, desc),
            None => format!(">{}", record.id),
        }
    }
}

impl Default for FastaWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceWriter for FastaWriter {
    fn write_file<P: AsRef<Path>>(&self, records: &[SequenceRecord], path: P) -> EngineResult<()> {
        let mut writer = FastWriter::new(path, Some(self.buffer_size))?;

        for record in records {
            writer.write_line(&Self::header(record))?;
            for chunk in record.sequence.chunks(self.line_width) {
                writer.write_all(chunk)?;
                writer.write_all(b"\n")?;
            }
        }

        writer.flush()?;
        Ok(())
    }

    fn write_string(&self, records: &[SequenceRecord]) -> EngineResult<String> {
        let mut output = String::new();

        for record in records {
            output.push_str(&Self::header(record));
            output.push('\n');
            for chunk in record.sequence.chunks(self.line_width) {
                output.push_str(&String::from_utf8_lossy(chunk));
                output.push('\n');
            }
        }

        Ok(output)
    }

    fn format_name(&self) -> &str {
        "FASTA"
    }
}

/// Renders a dispatch report as a `Pattern,Position` CSV table.
///
/// Rows are ordered by pattern (in submission order) and then by position, so
/// the same report always renders identically regardless of which worker
/// finished first. Positions are end indexes. Pattern bytes are written as
/// they are, quoted when they contain a delimiter, quote or line break.
#[derive(Debug, Clone)]
pub struct MatchTableWriter {
    buffer_size: usize,
}

impl MatchTableWriter {
    pub fn new() -> Self {
        Self {
            buffer_size: 1024 * 1024, // 1MB
        }
    }

    fn write_rows<W: Write>(report: &DispatchReport, writer: &mut csv::Writer<W>) -> EngineResult<usize> {
        writer.write_record(MATCH_TABLE_HEADER)?;

        let mut record = ByteRecord::new();
        let mut rows = 0;
        for m in report.matches.iter().sorted_by_key(|m| (m.pattern_index, m.end)) {
            record.clear();
            record.push_field(&m.pattern);
            record.push_field(m.end.to_string().as_bytes());
            writer.write_byte_record(&record)?;
            rows += 1;
        }

        writer.flush()?;
        Ok(rows)
    }

    /// Write the table to `path`, returning the number of data rows
    pub fn write_file<P: AsRef<Path>>(&self, report: &DispatchReport, path: P) -> EngineResult<usize> {
        let mut writer = csv::Writer::from_writer(FastWriter::new(path, Some(self.buffer_size))?);
        Self::write_rows(report, &mut writer)
    }

    /// Render the table in memory
    pub fn write_bytes(&self, report: &DispatchReport) -> EngineResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        Self::write_rows(report, &mut writer)?;
        writer.into_inner().map_err(|e| EngineError::Io(e.into_error()))
    }
}

impl Default for MatchTableWriter {
    fn default() -> Self {
        Self::new()
    }
}
