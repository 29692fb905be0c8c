//! Seeded subset creation.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::SubsetConfig;
use crate::constants::subset::STAGING_PREFIX;
use crate::data::{DataRecord, Schema};
use crate::dataset::{Dataset, DatasetWriter, SubsetProvenance};
use crate::errors::SubsetError;
use crate::sampling::SampleTarget;
use crate::utils::{format_count, format_percentage};

/// Outcome of a successful subset creation.
#[derive(Clone, Debug, PartialEq)]
pub struct SubsetReport {
    /// Source dataset directory.
    pub input: PathBuf,
    /// Written subset directory.
    pub output: PathBuf,
    /// Records in the source.
    pub source_rows: usize,
    /// Records written to the subset.
    pub rows: usize,
    /// Shard files written.
    pub shards: usize,
    /// Requested target.
    pub target: SampleTarget,
    /// Seed used.
    pub seed: u64,
}

impl SubsetReport {
    /// Written records as a percentage of the source.
    pub fn percentage(&self) -> f64 {
        if self.source_rows == 0 {
            0.0
        } else {
            self.rows as f64 / self.source_rows as f64 * 100.0
        }
    }
}

/// Create a subset of `config.input` at `config.output`.
///
/// The subset is written to a staging directory beside the output and moved
/// into place only once complete, so a failed run leaves no output behind.
pub fn create_subset(config: &SubsetConfig) -> Result<SubsetReport, SubsetError> {
    if !config.input.exists() {
        return Err(SubsetError::InputNotFound {
            path: config.input.clone(),
            reason: "path does not exist".to_string(),
        });
    }
    info!(input = %config.input.display(), "loading dataset");
    let dataset = Dataset::open(&config.input).map_err(|err| SubsetError::InputNotFound {
        path: config.input.clone(),
        reason: err.to_string(),
    })?;
    let total = dataset.num_rows();
    info!(rows = %format_count(total), "original dataset size");

    let indices = config.sampling.select_indices(total)?;
    info!(
        rows = %format_count(indices.len()),
        percentage = %format_percentage(indices.len(), total),
        seed = config.sampling.seed,
        "selected random indices"
    );

    check_paths_disjoint(&config.input, &config.output)?;
    let parent = prepare_output(&config.output, config.overwrite)?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(&parent)?;

    let mut writer = DatasetWriter::create(
        staging.path(),
        &dataset.shard_extension(),
        indices.len(),
        config.max_shard_rows,
    )?;
    let mut inferred = Schema::default();
    dataset.select_lines(&indices, |row, line| {
        let record = DataRecord::from_json_line(line).map_err(|err| {
            SubsetError::DatasetInconsistent {
                path: config.input.clone(),
                details: format!("row {row} is not a JSON object: {err}"),
            }
        })?;
        inferred.observe(&record);
        writer.write_line(line)
    })?;

    let features = dataset
        .manifest()
        .map(|manifest| manifest.features.clone())
        .filter(|features| !features.is_empty())
        .unwrap_or(inferred);
    let provenance = SubsetProvenance {
        source: config.input.display().to_string(),
        source_rows: total,
        target: config.sampling.target,
        seed: config.sampling.seed,
        rows: indices.len(),
    };
    let manifest = writer.finish(features, Some(provenance))?;

    if config.output.exists() {
        warn!(output = %config.output.display(), "replacing existing output directory");
        fs::remove_dir_all(&config.output)?;
    }
    fs::rename(staging.path(), &config.output)?;
    info!(
        output = %config.output.display(),
        rows = %format_count(manifest.num_rows),
        "subset saved"
    );

    Ok(SubsetReport {
        input: config.input.clone(),
        output: config.output.clone(),
        source_rows: total,
        rows: manifest.num_rows,
        shards: manifest.shards.len(),
        target: config.sampling.target,
        seed: config.sampling.seed,
    })
}

/// Reject outputs that would land inside the input (or swallow it on overwrite).
fn check_paths_disjoint(input: &Path, output: &Path) -> Result<(), SubsetError> {
    let input = fs::canonicalize(input)?;
    let output = resolve_lexically(output)?;
    if output.starts_with(&input) || input.starts_with(&output) {
        return Err(SubsetError::InvalidSpecification(format!(
            "output '{}' overlaps input '{}'",
            output.display(),
            input.display()
        )));
    }
    Ok(())
}

/// Canonicalize the longest existing ancestor and re-append the rest.
fn resolve_lexically(path: &Path) -> Result<PathBuf, SubsetError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    while !existing.exists() {
        let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
            return Ok(absolute);
        };
        tail.push(name.to_os_string());
        existing = parent;
    }
    let mut resolved = fs::canonicalize(existing)?;
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Validate the output location and create its parent. Returns the parent directory.
fn prepare_output(output: &Path, overwrite: bool) -> Result<PathBuf, SubsetError> {
    if output.exists() {
        // A plain file is never replaced, even with `overwrite`.
        let blocked = !output.is_dir() || (!overwrite && fs::read_dir(output)?.next().is_some());
        if blocked {
            return Err(SubsetError::OutputExists {
                path: output.to_path_buf(),
            });
        }
    }
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    Ok(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::write_dataset;
    use crate::sampling::SamplingSpec;
    use serde_json::json;
    use tempfile::tempdir;

    fn records(count: usize) -> Vec<DataRecord> {
        (0..count)
            .map(|idx| {
                DataRecord::from_json_line(
                    &json!({"id": idx, "input_ids": [idx, idx * 2], "labels": [idx]}).to_string(),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn creates_subset_with_provenance_and_features() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("full");
        let output = temp.path().join("nested/out/subset");
        write_dataset(&input, &records(40), 16).unwrap();

        let config = SubsetConfig::new(&input, &output, SamplingSpec::fraction(0.25, 42).unwrap());
        let report = create_subset(&config).unwrap();
        assert_eq!(report.source_rows, 40);
        assert_eq!(report.rows, 10);
        assert!((report.percentage() - 25.0).abs() < 1e-9);

        let subset = Dataset::open(&output).unwrap();
        assert_eq!(subset.num_rows(), 10);
        let provenance = subset.provenance().unwrap();
        assert_eq!(provenance.source_rows, 40);
        assert_eq!(provenance.seed, 42);
        assert_eq!(provenance.target, SampleTarget::Fraction(0.25));
        assert_eq!(
            subset.manifest().unwrap().features.field_names(),
            vec!["id", "input_ids", "labels"]
        );
        let leftovers: Vec<_> = fs::read_dir(output.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn missing_input_fails_without_creating_output() {
        let temp = tempdir().unwrap();
        let output = temp.path().join("out");
        let config = SubsetConfig::new(
            temp.path().join("absent"),
            &output,
            SamplingSpec::size(1, 42).unwrap(),
        );
        assert!(matches!(
            create_subset(&config),
            Err(SubsetError::InputNotFound { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn directory_without_shards_is_not_a_readable_input() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("empty");
        fs::create_dir_all(&input).unwrap();
        let config = SubsetConfig::new(&input, temp.path().join("out"), SamplingSpec::size(1, 1).unwrap());
        assert!(matches!(
            create_subset(&config),
            Err(SubsetError::InputNotFound { ref reason, .. }) if reason.contains("no .jsonl")
        ));
    }

    #[test]
    fn oversized_request_fails_without_creating_output() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("full");
        let output = temp.path().join("out");
        write_dataset(&input, &records(5), 10).unwrap();

        let config = SubsetConfig::new(&input, &output, SamplingSpec::size(6, 42).unwrap());
        assert!(matches!(
            create_subset(&config),
            Err(SubsetError::InvalidSpecification(_))
        ));
        assert!(!output.exists());
    }

    #[test]
    fn non_empty_output_requires_overwrite() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("full");
        let output = temp.path().join("out");
        write_dataset(&input, &records(10), 10).unwrap();
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("stale.txt"), "old").unwrap();

        let mut config = SubsetConfig::new(&input, &output, SamplingSpec::size(4, 42).unwrap());
        assert!(matches!(
            create_subset(&config),
            Err(SubsetError::OutputExists { .. })
        ));
        assert!(output.join("stale.txt").exists());

        config.overwrite = true;
        let report = create_subset(&config).unwrap();
        assert_eq!(report.rows, 4);
        assert!(!output.join("stale.txt").exists());
    }

    #[test]
    fn output_inside_input_is_rejected() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("full");
        write_dataset(&input, &records(10), 10).unwrap();

        let config = SubsetConfig::new(&input, input.join("subset"), SamplingSpec::size(2, 42).unwrap());
        assert!(matches!(
            create_subset(&config),
            Err(SubsetError::InvalidSpecification(ref msg)) if msg.contains("overlaps")
        ));
        assert_eq!(Dataset::open(&input).unwrap().num_rows(), 10);
    }

    #[test]
    fn input_shard_extension_is_preserved() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("full");
        fs::create_dir_all(&input).unwrap();
        let lines: String = (0..6).map(|idx| format!("{{\"id\": {idx}}}\n")).collect();
        fs::write(input.join("train.ndjson"), lines).unwrap();

        let output = temp.path().join("out");
        let mut config = SubsetConfig::new(&input, &output, SamplingSpec::size(4, 9).unwrap());
        config.max_shard_rows = 3;
        let report = create_subset(&config).unwrap();
        assert_eq!(report.shards, 2);
        assert!(output.join("data-00000-of-00002.ndjson").is_file());
        assert!(output.join("data-00001-of-00002.ndjson").is_file());
        // Lines are copied verbatim, including the source's spacing.
        let copied = fs::read_to_string(output.join("data-00000-of-00002.ndjson")).unwrap();
        assert!(copied.lines().all(|line| line.starts_with("{\"id\": ")));
    }
}
