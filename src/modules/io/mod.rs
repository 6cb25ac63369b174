//! Loading search inputs and writing results
//!
//! A genome file may hold several FASTA records; they are concatenated into a
//! single text in file order. A pattern file yields one pattern per record.
//! Files without any record are an error rather than an empty input.

use std::path::Path;

use crate::engines::compute::dispatch::DispatchReport;
use crate::engines::storage::formats::{FastaParser, MatchTableWriter, SequenceParser, SequenceRecord};
use crate::engines::{EngineError, EngineResult};

fn read_records<P: AsRef<Path>>(parser: &FastaParser, path: P) -> EngineResult<Vec<SequenceRecord>> {
    let records = parser.parse_file(path.as_ref())?;
    if records.is_empty() {
        return Err(EngineError::NoSequences(path.as_ref().display().to_string()));
    }
    Ok(records)
}

/// Load a genome, concatenating every record in the file
pub fn load_genome<P: AsRef<Path>>(path: P) -> EngineResult<Vec<u8>> {
    load_genome_with(&FastaParser::new(), path)
}

/// Load a genome using a specific parser configuration
pub fn load_genome_with<P: AsRef<Path>>(parser: &FastaParser, path: P) -> EngineResult<Vec<u8>> {
    let records = read_records(parser, path.as_ref())?;
    let genome: Vec<u8> = records.iter().flat_map(|r| r.sequence.iter().copied()).collect();

    log::info!(
        "Loaded genome from {} ({} records, {} symbols)",
        path.as_ref().display(),
        records.len(),
        genome.len()
    );
    Ok(genome)
}

/// Load the patterns to search for, one per record, in file order
pub fn load_patterns<P: AsRef<Path>>(path: P) -> EngineResult<Vec<Vec<u8>>> {
    let records = read_records(&FastaParser::new(), path.as_ref())?;

    log::info!("Loaded {} patterns from {}", records.len(), path.as_ref().display());
    Ok(records.into_iter().map(|r| r.sequence).collect())
}

/// Write the match table for `report` to `path`, returning the row count
pub fn write_matches<P: AsRef<Path>>(report: &DispatchReport, path: P) -> EngineResult<usize> {
    let rows = MatchTableWriter::new().write_file(report, path.as_ref())?;

    log::info!("Results written to {} ({} rows)", path.as_ref().display(), rows);
    Ok(rows)
}
