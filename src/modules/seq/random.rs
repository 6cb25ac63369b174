//! Random sequence generation
//!
//! Produces FASTA records of uniformly random length over a small alphabet,
//! named `seq1`, `seq2`, ... in generation order.

use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::engines::storage::formats::{FastaWriter, SequenceRecord, SequenceWriter};
use crate::engines::{EngineError, EngineResult};

/// Parameters for a batch of random sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomSequenceConfig {
    pub num_sequences: usize,
    /// Inclusive lower bound on sequence length
    pub min_len: usize,
    /// Inclusive upper bound on sequence length
    pub max_len: usize,
    /// Symbols to draw from
    pub alphabet: Vec<u8>,
    /// Fixed seed for reproducible output; entropy-seeded when `None`
    pub seed: Option<u64>,
}

impl Default for RandomSequenceConfig {
    fn default() -> Self {
        Self {
            num_sequences: 100,
            min_len: 5,
            max_len: 20,
            alphabet: b"ATCG".to_vec(),
            seed: None,
        }
    }
}

impl RandomSequenceConfig {
    pub fn with_num_sequences(mut self, num_sequences: usize) -> Self {
        self.num_sequences = num_sequences;
        self
    }

    pub fn with_length_range(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> EngineResult<()> {
        if self.alphabet.is_empty() {
            return Err(EngineError::InvalidSequenceData(
                "Alphabet cannot be empty".to_string(),
            ));
        }
        if self.min_len > self.max_len {
            return Err(EngineError::InvalidSequenceData(format!(
                "Minimum length {} exceeds maximum length {}",
                self.min_len, self.max_len
            )));
        }
        Ok(())
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Draw `length` symbols uniformly from `alphabet`
pub fn random_sequence<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8], length: usize) -> Vec<u8> {
    (0..length)
        .filter_map(|_| alphabet.choose(rng).copied())
        .collect()
}

/// Generate the records described by `config`
pub fn generate_records(config: &RandomSequenceConfig) -> EngineResult<Vec<SequenceRecord>> {
    config.validate()?;
    let mut rng = config.rng();

    let records = (1..=config.num_sequences)
        .map(|i| {
            let length = rng.gen_range(config.min_len..=config.max_len);
            let sequence = random_sequence(&mut rng, &config.alphabet, length);
            SequenceRecord::new(format!("seq{}", i), None, sequence)
        })
        .collect();

    Ok(records)
}

/// Generate random records and write them to a FASTA file.
/// Returns the number of records written.
pub fn write_random_fasta<P: AsRef<Path>>(path: P, config: &RandomSequenceConfig) -> EngineResult<usize> {
    let records = generate_records(config)?;
    FastaWriter::new().write_file(&records, path.as_ref())?;

    log::info!(
        "Generated {} random sequences in {}",
        records.len(),
        path.as_ref().display()
    );
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::storage::formats::{FastaParser, SequenceParser};
    use tempfile::tempdir;

    #[test]
    fn test_generate_records_respects_bounds() {
        let config = RandomSequenceConfig::default()
            .with_num_sequences(50)
            .with_length_range(3, 7)
            .with_seed(11);
        let records = generate_records(&config).unwrap();

        assert_eq!(records.len(), 50);
        assert_eq!(records[0].id, "seq1");
        assert_eq!(records[49].id, "seq50");
        for record in &records {
            assert!((3..=7).contains(&record.len()));
            assert!(record.sequence.iter().all(|b| b"ATCG".contains(b)));
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let config = RandomSequenceConfig::default().with_seed(99);
        assert_eq!(generate_records(&config).unwrap(), generate_records(&config).unwrap());
    }

    #[test]
    fn test_invalid_config() {
        let config = RandomSequenceConfig::default().with_length_range(10, 2);
        assert!(matches!(
            generate_records(&config),
            Err(EngineError::InvalidSequenceData(_))
        ));

        let config = RandomSequenceConfig {
            alphabet: Vec::new(),
            ..RandomSequenceConfig::default()
        };
        assert!(generate_records(&config).is_err());
    }

    #[test]
    fn test_write_random_fasta() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("random.fasta");
        let config = RandomSequenceConfig::default().with_num_sequences(12).with_seed(3);

        assert_eq!(write_random_fasta(&path, &config).unwrap(), 12);

        let records = FastaParser::new().parse_file(&path).unwrap();
        assert_eq!(records, generate_records(&config).unwrap());
    }
}
