use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::errors::SubsetError;
use crate::types::RowIndex;

/// How many records a subset should keep.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleTarget {
    /// Fraction of the source in `(0, 1]`; resolves to `round(total * fraction)`.
    Fraction(f64),
    /// Absolute record count; must not exceed the source size.
    Size(usize),
}

/// Sampling target plus the seed that makes the selection reproducible.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingSpec {
    /// Fraction or absolute size.
    pub target: SampleTarget,
    /// Seed for the deterministic RNG.
    pub seed: u64,
}

impl SamplingSpec {
    /// Keep `fraction` of the source.
    pub fn fraction(fraction: f64, seed: u64) -> Result<Self, SubsetError> {
        check_fraction(fraction)?;
        Ok(Self {
            target: SampleTarget::Fraction(fraction),
            seed,
        })
    }

    /// Keep exactly `size` records.
    pub fn size(size: usize, seed: u64) -> Result<Self, SubsetError> {
        if size == 0 {
            return Err(SubsetError::InvalidSpecification(
                "size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            target: SampleTarget::Size(size),
            seed,
        })
    }

    /// Build from the mutually exclusive command-line options.
    pub fn from_options(
        percentage: Option<f64>,
        size: Option<usize>,
        seed: u64,
    ) -> Result<Self, SubsetError> {
        match (percentage, size) {
            (Some(fraction), None) => Self::fraction(fraction, seed),
            (None, Some(size)) => Self::size(size, seed),
            (None, None) => Err(SubsetError::InvalidSpecification(
                "either --size or --percentage must be provided".to_string(),
            )),
            (Some(_), Some(_)) => Err(SubsetError::InvalidSpecification(
                "provide either --size or --percentage, not both".to_string(),
            )),
        }
    }

    /// Number of records selected from a source of `total` records.
    ///
    /// Targets read back from a manifest bypass the constructors, so the
    /// fraction range is checked again here.
    pub fn resolve_count(&self, total: usize) -> Result<usize, SubsetError> {
        let count = match self.target {
            SampleTarget::Fraction(fraction) => {
                check_fraction(fraction)?;
                (total as f64 * fraction).round() as usize
            }
            SampleTarget::Size(size) => {
                if size > total {
                    return Err(SubsetError::InvalidSpecification(format!(
                        "size {size} exceeds the dataset's {total} records"
                    )));
                }
                size
            }
        };
        if count == 0 {
            return Err(SubsetError::InvalidSpecification(format!(
                "sampling {total} records with {:?} selects no records",
                self.target
            )));
        }
        Ok(count)
    }

    /// Sorted, distinct row indices selected from a source of `total` records.
    pub fn select_indices(&self, total: usize) -> Result<Vec<RowIndex>, SubsetError> {
        let count = self.resolve_count(total)?;
        let mut rng = DeterministicRng::new(self.seed);
        Ok(sample_sorted_indices(&mut rng, total, count))
    }
}

fn check_fraction(fraction: f64) -> Result<(), SubsetError> {
    if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
        return Err(SubsetError::InvalidSpecification(format!(
            "percentage must be in (0, 1], got {fraction}"
        )));
    }
    Ok(())
}

/// Draw `count` distinct indices from `0..total` and sort them ascending.
///
/// Panics if `count > total`; callers resolve counts first.
pub fn sample_sorted_indices(
    rng: &mut DeterministicRng,
    total: usize,
    count: usize,
) -> Vec<RowIndex> {
    let mut indices = index::sample(rng, total, count).into_vec();
    indices.sort_unstable();
    indices
}

#[derive(Debug, Clone)]
/// Small deterministic RNG (splitmix64) so selections never depend on platform RNG defaults.
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Seed the generator.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl rand::RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let value = self.next_u64_internal();
            let bytes = value.to_le_bytes();
            let remaining = dest.len() - offset;
            let copy_len = remaining.min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}
