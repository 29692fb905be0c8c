use std::path::PathBuf;

use crate::constants::dataset::DEFAULT_MAX_SHARD_ROWS;
use crate::constants::verify::DEFAULT_SAMPLES;
use crate::sampling::SamplingSpec;

/// Inputs for one subset-creation run.
#[derive(Clone, Debug)]
pub struct SubsetConfig {
    /// Source dataset directory.
    pub input: PathBuf,
    /// Destination directory for the subset.
    pub output: PathBuf,
    /// Fraction or size plus seed.
    pub sampling: SamplingSpec,
    /// Maximum rows per written shard.
    pub max_shard_rows: usize,
    /// Replace a non-empty output directory instead of failing.
    pub overwrite: bool,
}

impl SubsetConfig {
    /// Config with default shard size and no overwrite.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, sampling: SamplingSpec) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            sampling,
            max_shard_rows: DEFAULT_MAX_SHARD_ROWS,
            overwrite: false,
        }
    }
}

/// Which subset records are displayed for inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SampleOrder {
    /// The first N records.
    #[default]
    Sequential,
    /// N records drawn with a seeded RNG, shown in row order.
    Random {
        /// Seed for the sample draw.
        seed: u64,
    },
}

/// Inputs for one verification run.
#[derive(Clone, Debug)]
pub struct VerifyConfig {
    /// Source dataset directory.
    pub original: PathBuf,
    /// Subset dataset directory.
    pub subset: PathBuf,
    /// Number of subset records to display.
    pub samples: usize,
    /// How displayed records are chosen.
    pub sample_order: SampleOrder,
}

impl VerifyConfig {
    /// Config showing the default number of sequential samples.
    pub fn new(original: impl Into<PathBuf>, subset: impl Into<PathBuf>) -> Self {
        Self {
            original: original.into(),
            subset: subset.into(),
            samples: DEFAULT_SAMPLES,
            sample_order: SampleOrder::Sequential,
        }
    }
}
