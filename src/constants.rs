/// Constants describing the on-disk dataset layout.
pub mod dataset {
    /// Manifest filename stored at the root of every dataset directory.
    pub const MANIFEST_FILENAME: &str = "dataset_info.json";
    /// Shard extensions recognized during discovery (compared case-insensitively).
    pub const SHARD_EXTENSIONS: [&str; 2] = ["jsonl", "ndjson"];
    /// Filename stem prefix for shards written by the subset creator.
    pub const SHARD_PREFIX: &str = "data";
    /// Default maximum number of rows per written shard.
    pub const DEFAULT_MAX_SHARD_ROWS: usize = 1_000_000;
}

/// Constants used by subset creation.
pub mod subset {
    /// Default sampling seed.
    pub const DEFAULT_SEED: u64 = 42;
    /// Prefix for the staging directory created next to the output path.
    pub const STAGING_PREFIX: &str = ".subset-staging-";
}

/// Constants used by subset verification and its report.
pub mod verify {
    /// Default number of subset records displayed for inspection.
    pub const DEFAULT_SAMPLES: usize = 3;
    /// Number of list items shown before truncating a sample field.
    pub const PREVIEW_ITEMS: usize = 5;
    /// Maximum offending row indices quoted in a membership failure.
    pub const MAX_REPORTED_FOREIGN_ROWS: usize = 5;
    /// Width of the horizontal rules framing the printed report.
    pub const REPORT_RULE_WIDTH: usize = 70;
    /// Offset mixed into the sample seed so sample picks differ from subset picks.
    pub const SAMPLE_SEED_OFFSET: u64 = 0x5A4D_9E11;
}

/// Environment variables consulted by the command-line runners.
pub mod env {
    /// Input dataset directory for `create_subset`.
    pub const SUBSET_INPUT: &str = "SUBSET_INPUT";
    /// Output directory for `create_subset`.
    pub const SUBSET_OUTPUT: &str = "SUBSET_OUTPUT";
    /// Fraction to keep for `create_subset`.
    pub const SUBSET_PERCENTAGE: &str = "SUBSET_PERCENTAGE";
    /// Absolute record count for `create_subset`.
    pub const SUBSET_SIZE: &str = "SUBSET_SIZE";
    /// Sampling seed.
    pub const SUBSET_SEED: &str = "SUBSET_SEED";
    /// Original dataset directory for `verify_subset`.
    pub const SUBSET_ORIGINAL: &str = "SUBSET_ORIGINAL";
    /// Subset dataset directory for `verify_subset`.
    pub const SUBSET_PATH: &str = "SUBSET_PATH";
    /// Number of records to display for `verify_subset`.
    pub const SUBSET_SAMPLES: &str = "SUBSET_SAMPLES";
}
