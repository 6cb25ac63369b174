use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use kmp_genome::engines::storage::formats::FastaParser;
use kmp_genome::engines::storage::StorageMode;
use kmp_genome::modules::io::{load_genome_with, load_patterns, write_matches};
use kmp_genome::modules::seq::{write_random_fasta, RandomSequenceConfig};
use kmp_genome::{Dispatcher, ParallelConfig};

#[derive(Parser)]
#[command(name = "kmp-genome")]
#[command(about = "KMP pattern matching of FASTA sequences against a genome", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find every occurrence of each pattern in the genome
    Search {
        /// Genome FASTA file (all records are concatenated)
        #[arg(value_name = "GENOME.FA")]
        genome: PathBuf,

        /// FASTA file with the sequences to search for
        #[arg(value_name = "PATTERNS.FA")]
        patterns: PathBuf,

        /// Output CSV file (Pattern,Position)
        #[arg(value_name = "OUTPUT.CSV")]
        output: PathBuf,

        /// YAML worker pool configuration (num_threads, thread_name_prefix, timeout)
        #[arg(short = 'c', long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Number of worker threads [default: number of CPUs]
        #[arg(short = 't', long, value_name = "INT")]
        threads: Option<usize>,

        /// Abandon the search after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Memory-map the genome file instead of buffered reads
        #[arg(long)]
        mmap: bool,

        /// Exit with an error if any pattern could not be processed
        #[arg(long)]
        strict: bool,
    },

    /// Write a FASTA file of random nucleotide sequences
    Generate {
        /// Output FASTA file
        #[arg(value_name = "OUTPUT.FA")]
        output: PathBuf,

        /// Number of sequences
        #[arg(short = 'n', long, default_value = "100")]
        num_sequences: usize,

        /// Minimum sequence length
        #[arg(long, default_value = "5")]
        min_len: usize,

        /// Maximum sequence length
        #[arg(long, default_value = "20")]
        max_len: usize,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Search {
            genome,
            patterns,
            output,
            config,
            threads,
            timeout,
            mmap,
            strict,
        } => {
            // Flags override the config file
            let mut config = match config {
                Some(path) => ParallelConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => ParallelConfig::default(),
            };
            if let Some(threads) = threads {
                config = config.with_num_threads(threads);
            }
            if let Some(secs) = timeout {
                config = config.with_timeout(Duration::from_secs(secs));
            }

            let storage_mode = if mmap {
                StorageMode::MemoryMapped
            } else {
                StorageMode::Buffered
            };
            let genome_text = load_genome_with(&FastaParser::with_storage_mode(storage_mode), &genome)
                .with_context(|| format!("Failed to load genome {}", genome.display()))?;
            let pattern_list = load_patterns(&patterns)
                .with_context(|| format!("Failed to load patterns {}", patterns.display()))?;

            let dispatcher = Dispatcher::new(config)?;
            let mut report = dispatcher.dispatch(&genome_text, &pattern_list);
            report.sort();

            for error in &report.errors {
                log::warn!(
                    "Pattern #{} ({}): {}",
                    error.pattern_index,
                    String::from_utf8_lossy(&error.pattern),
                    error.kind
                );
            }

            write_matches(&report, &output)
                .with_context(|| format!("Failed to write results to {}", output.display()))?;

            if strict && !report.is_complete() {
                bail!("{} of {} patterns failed", report.errors.len(), report.pattern_count());
            }
            Ok(())
        }
        Commands::Generate {
            output,
            num_sequences,
            min_len,
            max_len,
            seed,
        } => {
            let mut config = RandomSequenceConfig::default()
                .with_num_sequences(num_sequences)
                .with_length_range(min_len, max_len);
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }

            write_random_fasta(&output, &config)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            Ok(())
        }
    }
}
