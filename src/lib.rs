#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runners behind the `create_subset` and `verify_subset` binaries.
pub mod apps;
/// Run configuration types.
pub mod config;
/// Centralized constants for dataset layout, defaults, and environment variables.
pub mod constants;
/// Seeded subset creation.
pub mod creator;
/// Record, field-kind, and schema types.
pub mod data;
/// Dataset directories: opening, scanning, and writing.
pub mod dataset;
mod hash;
/// Sampling specifications and the deterministic RNG.
pub mod sampling;
/// Input transports used by datasets (filesystem today).
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Formatting helpers.
pub mod utils;
/// Subset verification checks and reports.
pub mod verifier;

mod errors;

pub use config::{SampleOrder, SubsetConfig, VerifyConfig};
pub use creator::{SubsetReport, create_subset};
pub use data::{DataRecord, FieldKind, Schema};
pub use dataset::{
    Dataset, DatasetManifest, DatasetScan, DatasetWriter, SubsetProvenance, write_dataset,
};
pub use errors::SubsetError;
pub use hash::record_content_hash;
pub use sampling::{DeterministicRng, SampleTarget, SamplingSpec};
pub use types::{ContentHash, FieldName, ReportLine, RowIndex, ShardPath};
pub use verifier::{CheckOutcome, CheckStatus, SampleView, VerificationReport, verify_subset};
