//! Consistency checks between a subset and its source dataset.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{SampleOrder, VerifyConfig};
use crate::constants::verify::{
    MAX_REPORTED_FOREIGN_ROWS, REPORT_RULE_WIDTH, SAMPLE_SEED_OFFSET,
};
use crate::data::{DataRecord, Schema};
use crate::dataset::{Dataset, DatasetScan};
use crate::errors::SubsetError;
use crate::sampling::{DeterministicRng, SamplingSpec, sample_sorted_indices};
use crate::types::{ContentHash, ReportLine, RowIndex};
use crate::utils::{format_count, format_percentage, preview_field};

/// Result of a single check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckStatus {
    /// The check held.
    Pass,
    /// Suspicious but not disqualifying.
    Warn,
    /// The subset is not consistent with the original.
    Fail,
}

impl CheckStatus {
    fn tag(self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
        }
    }
}

/// One named check with its detail lines.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckOutcome {
    /// Short check name (`load`, `size`, `schema`, ...).
    pub name: &'static str,
    /// Outcome.
    pub status: CheckStatus,
    /// Human-readable details.
    pub details: Vec<ReportLine>,
}

impl CheckOutcome {
    fn new(name: &'static str, status: CheckStatus, details: Vec<ReportLine>) -> Self {
        Self {
            name,
            status,
            details,
        }
    }
}

/// A subset record prepared for display.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleView {
    /// Row index within the subset.
    pub row: RowIndex,
    /// One or more lines per field.
    pub lines: Vec<ReportLine>,
}

/// Everything the verifier found.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationReport {
    /// Original dataset directory.
    pub original: PathBuf,
    /// Subset dataset directory.
    pub subset: PathBuf,
    /// Original record count, if it loaded.
    pub original_rows: Option<usize>,
    /// Subset record count, if it loaded.
    pub subset_rows: Option<usize>,
    /// Checks in execution order.
    pub checks: Vec<CheckOutcome>,
    /// Displayed subset records.
    pub samples: Vec<SampleView>,
}

impl VerificationReport {
    fn new(config: &VerifyConfig) -> Self {
        Self {
            original: config.original.clone(),
            subset: config.subset.clone(),
            original_rows: None,
            subset_rows: None,
            checks: Vec::new(),
            samples: Vec::new(),
        }
    }

    fn push(&mut self, check: CheckOutcome) {
        match check.status {
            CheckStatus::Pass => info!(check = check.name, "check passed"),
            CheckStatus::Warn => warn!(check = check.name, details = ?check.details, "check warned"),
            CheckStatus::Fail => warn!(check = check.name, details = ?check.details, "check failed"),
        }
        self.checks.push(check);
    }

    /// True when no check failed.
    pub fn passed(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.status != CheckStatus::Fail)
    }

    /// `name: detail` for each failed check.
    pub fn failures(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|check| check.status == CheckStatus::Fail)
            .map(|check| format!("{}: {}", check.name, check.details.join(", ")))
            .collect()
    }

    /// Look up a check by name.
    pub fn check(&self, name: &str) -> Option<&CheckOutcome> {
        self.checks.iter().find(|check| check.name == name)
    }

    /// Convert a failed report into `SubsetError::VerificationMismatch`.
    pub fn ensure_passed(self) -> Result<Self, SubsetError> {
        if self.passed() {
            Ok(self)
        } else {
            Err(SubsetError::VerificationMismatch {
                failures: self.failures(),
            })
        }
    }

    /// Multi-line human-readable report.
    pub fn render(&self) -> String {
        let rule = "=".repeat(REPORT_RULE_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "DATASET SUBSET VERIFICATION");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "original: {}", self.original.display());
        let _ = writeln!(out, "subset:   {}", self.subset.display());

        for (idx, check) in self.checks.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(out, "[{}] {} ... {}", idx + 1, check.name, check.status.tag());
            for detail in &check.details {
                let _ = writeln!(out, "  {detail}");
            }
        }

        if !self.samples.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "[{}] {} sample records from subset",
                self.checks.len() + 1,
                self.samples.len()
            );
            for (idx, sample) in self.samples.iter().enumerate() {
                let _ = writeln!(out);
                let _ = writeln!(out, "  Sample {} (row {}):", idx + 1, sample.row);
                for line in &sample.lines {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "VERIFICATION SUMMARY");
        let _ = writeln!(out, "{rule}");
        if let (Some(original), Some(subset)) = (self.original_rows, self.subset_rows) {
            let _ = writeln!(
                out,
                "Dataset size: {} / {} ({})",
                format_count(subset),
                format_count(original),
                format_percentage(subset, original)
            );
        }
        if self.passed() {
            let _ = writeln!(out, "Result: PASS");
        } else {
            let _ = writeln!(out, "Result: FAIL");
            for failure in self.failures() {
                let _ = writeln!(out, "  - {failure}");
            }
        }
        let _ = write!(out, "{rule}");
        out
    }
}

/// Verify `config.subset` against `config.original`.
///
/// Missing paths are errors. Every other problem is recorded as a failed
/// check in the returned report; call [`VerificationReport::ensure_passed`]
/// to turn a failure into an error.
pub fn verify_subset(config: &VerifyConfig) -> Result<VerificationReport, SubsetError> {
    for path in [&config.original, &config.subset] {
        if !path.exists() {
            return Err(SubsetError::DatasetNotFound { path: path.clone() });
        }
    }

    let mut report = VerificationReport::new(config);
    let (original, original_scan) = match load(&config.original) {
        Ok(loaded) => loaded,
        Err(err) => {
            report.push(CheckOutcome::new(
                "load",
                CheckStatus::Fail,
                vec![format!("original dataset could not be loaded: {err}")],
            ));
            return Ok(report);
        }
    };
    let (subset, subset_scan) = match load(&config.subset) {
        Ok(loaded) => loaded,
        Err(err) => {
            report.push(CheckOutcome::new(
                "load",
                CheckStatus::Fail,
                vec![format!("subset dataset could not be loaded: {err}")],
            ));
            return Ok(report);
        }
    };
    report.original_rows = Some(original.num_rows());
    report.subset_rows = Some(subset.num_rows());
    report.push(CheckOutcome::new(
        "load",
        CheckStatus::Pass,
        vec![
            format!("original dataset loaded: {} records", format_count(original.num_rows())),
            format!("subset dataset loaded: {} records", format_count(subset.num_rows())),
        ],
    ));

    report.push(check_size(&original, &subset));
    report.push(check_schema(&original_scan.schema, &subset_scan.schema));
    report.push(check_membership(&original_scan.hashes, &subset_scan.hashes));
    if let Some(check) = check_reproducibility(&original_scan.hashes, &subset, &subset_scan.hashes) {
        report.push(check);
    }
    report.push(check_integrity(
        original_scan.first.as_ref(),
        subset_scan.first.as_ref(),
    ));

    report.samples = collect_samples(&subset, config.samples, config.sample_order)?;
    Ok(report)
}

fn load(path: &Path) -> Result<(Dataset, DatasetScan), SubsetError> {
    info!(path = %path.display(), "loading dataset");
    let dataset = Dataset::open(path)?;
    let scan = dataset.scan()?;
    Ok((dataset, scan))
}

fn check_size(original: &Dataset, subset: &Dataset) -> CheckOutcome {
    let original_rows = original.num_rows();
    let subset_rows = subset.num_rows();
    let mut details = vec![
        format!("original dataset: {} records", format_count(original_rows)),
        format!("subset dataset:   {} records", format_count(subset_rows)),
        format!("percentage:       {}", format_percentage(subset_rows, original_rows)),
    ];
    let mut status = CheckStatus::Pass;

    if subset_rows == 0 {
        status = CheckStatus::Fail;
        details.push("subset is empty".to_string());
    }
    if subset_rows > original_rows {
        status = CheckStatus::Fail;
        details.push("subset is larger than the original".to_string());
    }

    if let Some(provenance) = subset.provenance() {
        if provenance.source_rows != original_rows {
            status = CheckStatus::Fail;
            details.push(format!(
                "subset records a source of {} records but the original has {}",
                format_count(provenance.source_rows),
                format_count(original_rows)
            ));
        }
        let spec = SamplingSpec {
            target: provenance.target,
            seed: provenance.seed,
        };
        match spec.resolve_count(provenance.source_rows) {
            Ok(expected) if expected == subset_rows && provenance.rows == subset_rows => {}
            Ok(expected) => {
                status = CheckStatus::Fail;
                details.push(format!(
                    "{:?} of {} records should yield {} records, subset holds {}",
                    provenance.target,
                    format_count(provenance.source_rows),
                    format_count(expected),
                    format_count(subset_rows)
                ));
            }
            Err(err) => {
                status = CheckStatus::Fail;
                details.push(format!("recorded sampling target is invalid: {err}"));
            }
        }
    }

    CheckOutcome::new("size", status, details)
}

/// Every subset field must exist in the original with a compatible kind.
///
/// Fields are optional per record, so an original field that none of the
/// selected rows carry only warns.
fn check_schema(original: &Schema, subset: &Schema) -> CheckOutcome {
    let extra: Vec<&str> = subset
        .field_names()
        .into_iter()
        .filter(|name| original.get(name).is_none())
        .collect();
    let mismatched: Vec<String> = subset
        .iter()
        .filter_map(|(name, kind)| {
            let expected = original.get(name)?;
            (!kind.is_compatible_with(expected))
                .then(|| format!("'{name}' is {kind} in subset but {expected} in original"))
        })
        .collect();
    let absent: Vec<&str> = original
        .field_names()
        .into_iter()
        .filter(|name| subset.get(name).is_none())
        .collect();

    if extra.is_empty() && mismatched.is_empty() {
        if absent.is_empty() {
            return CheckOutcome::new(
                "schema",
                CheckStatus::Pass,
                vec![format!("features match: [{}]", original.field_names().join(", "))],
            );
        }
        return CheckOutcome::new(
            "schema",
            CheckStatus::Warn,
            vec![format!("not present in any subset record: [{}]", absent.join(", "))],
        );
    }

    let mut details = Vec::new();
    if !extra.is_empty() {
        details.push(format!("extra in subset: [{}]", extra.join(", ")));
    }
    details.extend(mismatched);
    if !absent.is_empty() {
        details.push(format!("not present in any subset record: [{}]", absent.join(", ")));
    }
    CheckOutcome::new("schema", CheckStatus::Fail, details)
}

fn check_membership(original: &[ContentHash], subset: &[ContentHash]) -> CheckOutcome {
    let mut remaining: HashMap<ContentHash, usize> = HashMap::with_capacity(original.len());
    for hash in original {
        *remaining.entry(*hash).or_insert(0) += 1;
    }

    let mut foreign: Vec<RowIndex> = Vec::new();
    for (row, hash) in subset.iter().enumerate() {
        match remaining.get_mut(hash) {
            Some(count) if *count > 0 => *count -= 1,
            _ => foreign.push(row),
        }
    }

    if foreign.is_empty() {
        return CheckOutcome::new(
            "membership",
            CheckStatus::Pass,
            vec![format!(
                "all {} subset records occur in the original",
                format_count(subset.len())
            )],
        );
    }
    let quoted: Vec<String> = foreign
        .iter()
        .take(MAX_REPORTED_FOREIGN_ROWS)
        .map(RowIndex::to_string)
        .collect();
    let more = if foreign.len() > MAX_REPORTED_FOREIGN_ROWS {
        ", ..."
    } else {
        ""
    };
    CheckOutcome::new(
        "membership",
        CheckStatus::Fail,
        vec![format!(
            "{} of {} subset records are not in the original (rows: {}{more})",
            format_count(foreign.len()),
            format_count(subset.len()),
            quoted.join(", ")
        )],
    )
}

/// Re-derive the selection from recorded provenance and compare row by row.
fn check_reproducibility(
    original: &[ContentHash],
    subset: &Dataset,
    subset_hashes: &[ContentHash],
) -> Option<CheckOutcome> {
    let provenance = subset.provenance()?;
    if provenance.source_rows != original.len() {
        return Some(CheckOutcome::new(
            "reproducibility",
            CheckStatus::Warn,
            vec!["skipped: original size differs from the recorded source size".to_string()],
        ));
    }
    let spec = SamplingSpec {
        target: provenance.target,
        seed: provenance.seed,
    };
    let indices = match spec.select_indices(original.len()) {
        Ok(indices) => indices,
        Err(err) => {
            return Some(CheckOutcome::new(
                "reproducibility",
                CheckStatus::Fail,
                vec![format!("recorded sampling cannot be replayed: {err}")],
            ));
        }
    };
    let expected: Vec<ContentHash> = indices.iter().map(|idx| original[*idx]).collect();
    if expected == subset_hashes {
        return Some(CheckOutcome::new(
            "reproducibility",
            CheckStatus::Pass,
            vec![format!(
                "replaying seed {} reproduces the subset exactly",
                provenance.seed
            )],
        ));
    }
    let differing = expected
        .iter()
        .zip(subset_hashes)
        .filter(|(left, right)| left != right)
        .count()
        + expected.len().abs_diff(subset_hashes.len());
    Some(CheckOutcome::new(
        "reproducibility",
        CheckStatus::Fail,
        vec![format!(
            "replaying seed {} differs from the subset at {} rows",
            provenance.seed,
            format_count(differing)
        )],
    ))
}

/// Spot-check the first record of each dataset for structural drift.
fn check_integrity(original: Option<&DataRecord>, subset: Option<&DataRecord>) -> CheckOutcome {
    let (Some(original), Some(subset)) = (original, subset) else {
        return CheckOutcome::new(
            "integrity",
            CheckStatus::Warn,
            vec!["no records to compare".to_string()],
        );
    };

    let mut details = Vec::new();
    for (name, expected) in original.fields() {
        let Some(actual) = subset.get(name) else {
            continue;
        };
        let emptied = matches!(
            (expected.as_array(), actual.as_array()),
            (Some(expected), Some(actual)) if actual.is_empty() && !expected.is_empty()
        );
        if emptied {
            details.push(format!("'{name}' is an empty list in the subset's first record"));
        }
    }

    if details.is_empty() {
        CheckOutcome::new(
            "integrity",
            CheckStatus::Pass,
            vec!["sample data structure is valid".to_string()],
        )
    } else {
        CheckOutcome::new("integrity", CheckStatus::Warn, details)
    }
}

fn collect_samples(
    subset: &Dataset,
    samples: usize,
    order: SampleOrder,
) -> Result<Vec<SampleView>, SubsetError> {
    let count = samples.min(subset.num_rows());
    if count == 0 {
        return Ok(Vec::new());
    }
    let indices: Vec<RowIndex> = match order {
        SampleOrder::Sequential => (0..count).collect(),
        SampleOrder::Random { seed } => {
            let mut rng = DeterministicRng::new(seed ^ SAMPLE_SEED_OFFSET);
            sample_sorted_indices(&mut rng, subset.num_rows(), count)
        }
    };
    let records = subset.read_records(&indices)?;
    Ok(indices
        .into_iter()
        .zip(records)
        .map(|(row, record)| SampleView {
            row,
            lines: record
                .fields()
                .iter()
                .flat_map(|(name, value)| preview_field(name, value))
                .collect(),
        })
        .collect())
}
