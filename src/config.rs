use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// Buckets are directories under `--root`
    Local,
    /// Amazon S3 or a compatible service
    S3,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "faipart")]
#[command(about = "Partitioned, parallel FASTA offset index builder")]
pub struct Config {
    /// Storage backend
    #[arg(long, env = "FAIPART_STORAGE", value_enum, default_value = "local")]
    pub storage: StorageKind,

    /// Root directory for local storage
    #[arg(long, env = "FAIPART_ROOT", default_value = "./data")]
    pub root: PathBuf,

    /// S3 region (defaults to the AWS environment)
    #[arg(long, env = "FAIPART_S3_REGION")]
    pub s3_region: Option<String>,

    /// Custom S3 endpoint, e.g. for MinIO
    #[arg(long, env = "FAIPART_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Bucket holding the source files and indexes
    #[arg(long, env = "FAIPART_BUCKET")]
    pub bucket: String,

    /// Maximum number of partitions scanned at once
    #[arg(long, env = "FAIPART_CONCURRENCY", default_value = "8")]
    pub concurrency: usize,

    /// Retries for a failed partition read
    #[arg(long, env = "FAIPART_MAX_RETRIES", default_value = "5")]
    pub max_retries: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Build the index of a FASTA object
    Build {
        /// Key of the FASTA object
        key: String,

        /// Number of partitions
        #[arg(short = 'n', long, env = "FAIPART_WORKERS", default_value = "1")]
        workers: u32,

        /// Prefix of the index key
        #[arg(long, env = "FAIPART_INDEX_PREFIX", default_value = "faidx/")]
        index_prefix: String,

        /// Write the index even if some boundary fragments stay unresolved
        #[arg(long)]
        allow_unresolved: bool,
    },

    /// Look up a sequence by identifier
    Lookup {
        /// Key of the index object
        index: String,

        identifier: String,

        /// Match the identifier field exactly instead of by substring
        #[arg(long)]
        exact: bool,
    },

    /// List records whose body starts in [min, max)
    Range {
        /// Key of the index object
        index: String,

        min: u64,

        max: u64,
    },

    /// Delete every object under a prefix
    Clean {
        #[arg(default_value = "faidx/")]
        prefix: String,
    },
}
