//! On-disk datasets: a directory of JSONL shards plus an optional manifest.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::dataset::{MANIFEST_FILENAME, SHARD_PREFIX};
use crate::data::{DataRecord, Schema};
use crate::errors::SubsetError;
use crate::hash::record_content_hash;
use crate::sampling::SampleTarget;
use crate::transport::fs::{ShardLines, ShardStream, count_rows, shard_extension};
use crate::types::{ContentHash, RowIndex, ShardPath};

/// Contents of `dataset_info.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    /// Total record count across all shards.
    pub num_rows: usize,
    /// Field names and kinds.
    #[serde(default)]
    pub features: Schema,
    /// Shard paths relative to the dataset root, in record order.
    #[serde(default)]
    pub shards: Vec<ShardPath>,
    /// Present when the dataset was produced by the subset creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<SubsetProvenance>,
}

/// How a subset was derived from its source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubsetProvenance {
    /// Source dataset path as given to the creator.
    pub source: String,
    /// Source record count at creation time.
    pub source_rows: usize,
    /// Requested fraction or size.
    pub target: SampleTarget,
    /// Sampling seed.
    pub seed: u64,
    /// Records written.
    pub rows: usize,
}

/// One shard of an opened dataset.
#[derive(Clone, Debug)]
pub struct DatasetShard {
    /// Absolute or caller-relative path of the shard file.
    pub path: PathBuf,
    /// Path relative to the dataset root.
    pub relative: ShardPath,
    /// Non-blank lines in the shard.
    pub rows: usize,
    /// Global index of the shard's first row.
    pub start: RowIndex,
}

/// Content hashes and inferred schema of a whole dataset.
#[derive(Clone, Debug, Default)]
pub struct DatasetScan {
    /// One hash per row, in row order.
    pub hashes: Vec<ContentHash>,
    /// Schema inferred from every row.
    pub schema: Schema,
    /// First record, if any.
    pub first: Option<DataRecord>,
}

/// An opened dataset directory.
#[derive(Clone, Debug)]
pub struct Dataset {
    root: PathBuf,
    shards: Vec<DatasetShard>,
    num_rows: usize,
    manifest: Option<DatasetManifest>,
}

impl Dataset {
    /// Open a dataset, counting rows per shard without parsing them.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, SubsetError> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            return Err(SubsetError::DatasetNotFound { path: root });
        }
        if !root.is_dir() {
            return Err(inconsistent(&root, "dataset path is not a directory"));
        }

        let manifest = read_manifest(&root)?;
        let relative_paths = match &manifest {
            Some(manifest) if !manifest.shards.is_empty() => manifest.shards.clone(),
            _ => ShardStream::new(&root).discover()?,
        };
        if relative_paths.is_empty() {
            return Err(inconsistent(&root, "no .jsonl or .ndjson shard files found"));
        }
        for relative in &relative_paths {
            if !root.join(relative).is_file() {
                return Err(inconsistent(
                    &root,
                    format!("manifest lists missing shard '{relative}'"),
                ));
            }
        }

        let counts = relative_paths
            .par_iter()
            .map(|relative| count_rows(&root.join(relative)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut shards = Vec::with_capacity(relative_paths.len());
        let mut start = 0;
        for (relative, rows) in relative_paths.into_iter().zip(counts) {
            shards.push(DatasetShard {
                path: root.join(&relative),
                relative,
                rows,
                start,
            });
            start += rows;
        }
        let num_rows = start;

        let declared = manifest.as_ref().map(|manifest| manifest.num_rows);
        if let Some(declared) = declared.filter(|declared| *declared != num_rows) {
            return Err(inconsistent(
                &root,
                format!("manifest declares {declared} rows but shards hold {num_rows}"),
            ));
        }

        debug!(
            root = %root.display(),
            shards = shards.len(),
            rows = num_rows,
            "opened dataset"
        );
        Ok(Self {
            root,
            shards,
            num_rows,
            manifest,
        })
    }

    /// Dataset directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Total record count.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Shards in record order.
    pub fn shards(&self) -> &[DatasetShard] {
        &self.shards
    }

    /// Parsed manifest, if the dataset has one.
    pub fn manifest(&self) -> Option<&DatasetManifest> {
        self.manifest.as_ref()
    }

    /// Provenance block, if this dataset is a recorded subset.
    pub fn provenance(&self) -> Option<&SubsetProvenance> {
        self.manifest.as_ref().and_then(|manifest| manifest.subset.as_ref())
    }

    /// Extension of the first shard (`jsonl` or `ndjson`).
    pub fn shard_extension(&self) -> String {
        self.shards
            .first()
            .and_then(|shard| shard_extension(&shard.path))
            .unwrap_or_else(|| "jsonl".to_string())
    }

    /// Visit the raw lines at `indices` (sorted ascending), opening only shards that hold them.
    pub fn select_lines<F>(&self, indices: &[RowIndex], mut visit: F) -> Result<(), SubsetError>
    where
        F: FnMut(RowIndex, &str) -> Result<(), SubsetError>,
    {
        if let Some(pair) = indices.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(SubsetError::InvalidSpecification(format!(
                "row indices must be strictly ascending ({} then {})",
                pair[0], pair[1]
            )));
        }
        if let Some(last) = indices.last().filter(|last| **last >= self.num_rows) {
            return Err(SubsetError::InvalidSpecification(format!(
                "row index {last} is out of range for {} rows",
                self.num_rows
            )));
        }

        let mut pending = indices.iter().copied().peekable();
        for shard in &self.shards {
            let end = shard.start + shard.rows;
            if pending.peek().is_none_or(|next| *next >= end) {
                continue;
            }
            let lines = ShardLines::open(&shard.path)?;
            for (offset, line) in lines.enumerate() {
                let Some(&next) = pending.peek() else {
                    break;
                };
                if next >= end {
                    break;
                }
                let (_, line) = line?;
                if shard.start + offset == next {
                    visit(next, &line)?;
                    pending.next();
                }
            }
        }
        Ok(())
    }

    /// Parse the records at `indices` (sorted ascending).
    pub fn read_records(&self, indices: &[RowIndex]) -> Result<Vec<DataRecord>, SubsetError> {
        let mut records = Vec::with_capacity(indices.len());
        self.select_lines(indices, |row, line| {
            records.push(self.parse_line(row, line)?);
            Ok(())
        })?;
        Ok(records)
    }

    /// Parse every row, hashing content and inferring the schema.
    ///
    /// Shards are scanned in parallel and stitched back together in row order.
    pub fn scan(&self) -> Result<DatasetScan, SubsetError> {
        let partials = self
            .shards
            .par_iter()
            .map(|shard| self.scan_shard(shard))
            .collect::<Result<Vec<_>, _>>()?;

        let mut scan = DatasetScan {
            hashes: Vec::with_capacity(self.num_rows),
            ..DatasetScan::default()
        };
        for partial in partials {
            scan.hashes.extend(partial.hashes);
            scan.schema.absorb(partial.schema);
            if scan.first.is_none() {
                scan.first = partial.first;
            }
        }
        Ok(scan)
    }

    fn scan_shard(&self, shard: &DatasetShard) -> Result<DatasetScan, SubsetError> {
        let mut scan = DatasetScan {
            hashes: Vec::with_capacity(shard.rows),
            ..DatasetScan::default()
        };
        for (offset, line) in ShardLines::open(&shard.path)?.enumerate() {
            let (_, line) = line?;
            let record = self.parse_line(shard.start + offset, &line)?;
            scan.hashes.push(record_content_hash(&record));
            scan.schema.observe(&record);
            if scan.first.is_none() {
                scan.first = Some(record);
            }
        }
        Ok(scan)
    }

    fn parse_line(&self, row: RowIndex, line: &str) -> Result<DataRecord, SubsetError> {
        DataRecord::from_json_line(line).map_err(|err| {
            inconsistent(&self.root, format!("row {row} is not a JSON object: {err}"))
        })
    }
}

/// Streams rows into numbered shards and finishes with a manifest.
pub struct DatasetWriter {
    root: PathBuf,
    extension: String,
    max_shard_rows: usize,
    shard_count: usize,
    expected_rows: usize,
    written_rows: usize,
    shard_paths: Vec<ShardPath>,
    current: Option<BufWriter<File>>,
    current_rows: usize,
}

impl DatasetWriter {
    /// Prepare to write `expected_rows` rows under `root` (created if missing).
    pub fn create(
        root: impl Into<PathBuf>,
        extension: &str,
        expected_rows: usize,
        max_shard_rows: usize,
    ) -> Result<Self, SubsetError> {
        if max_shard_rows == 0 {
            return Err(SubsetError::InvalidSpecification(
                "max shard rows must be greater than zero".to_string(),
            ));
        }
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            extension: extension.to_string(),
            max_shard_rows,
            shard_count: expected_rows.div_ceil(max_shard_rows).max(1),
            expected_rows,
            written_rows: 0,
            shard_paths: Vec::new(),
            current: None,
            current_rows: 0,
        })
    }

    /// Append one record line (written verbatim, newline-terminated).
    pub fn write_line(&mut self, line: &str) -> Result<(), SubsetError> {
        if self.written_rows >= self.expected_rows {
            return Err(inconsistent(
                &self.root,
                format!("writer expected only {} rows", self.expected_rows),
            ));
        }
        if self.current.is_none() || self.current_rows >= self.max_shard_rows {
            self.rotate()?;
        }
        if let Some(writer) = self.current.as_mut() {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        self.current_rows += 1;
        self.written_rows += 1;
        Ok(())
    }

    /// Append one parsed record.
    pub fn write_record(&mut self, record: &DataRecord) -> Result<(), SubsetError> {
        let line = record
            .to_json_line()
            .map_err(|err| inconsistent(&self.root, format!("failed encoding record: {err}")))?;
        self.write_line(&line)
    }

    fn rotate(&mut self) -> Result<(), SubsetError> {
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
        }
        let name = format!(
            "{SHARD_PREFIX}-{:05}-of-{:05}.{}",
            self.shard_paths.len(),
            self.shard_count,
            self.extension
        );
        let file = File::create(self.root.join(&name))?;
        self.current = Some(BufWriter::new(file));
        self.current_rows = 0;
        self.shard_paths.push(name);
        Ok(())
    }

    /// Flush the last shard and write the manifest. `num_rows` and `shards` are filled in.
    pub fn finish(
        mut self,
        features: Schema,
        subset: Option<SubsetProvenance>,
    ) -> Result<DatasetManifest, SubsetError> {
        if self.written_rows != self.expected_rows {
            return Err(inconsistent(
                &self.root,
                format!(
                    "wrote {} rows but expected {}",
                    self.written_rows, self.expected_rows
                ),
            ));
        }
        if self.current.is_none() {
            self.rotate()?;
        }
        if let Some(mut writer) = self.current.take() {
            writer.flush()?;
        }
        let manifest = DatasetManifest {
            num_rows: self.written_rows,
            features,
            shards: self.shard_paths,
            subset,
        };
        write_manifest(&self.root, &manifest)?;
        info!(
            root = %self.root.display(),
            rows = manifest.num_rows,
            shards = manifest.shards.len(),
            "dataset written"
        );
        Ok(manifest)
    }
}

/// Write `records` as a fresh dataset with inferred features.
pub fn write_dataset(
    root: impl Into<PathBuf>,
    records: &[DataRecord],
    max_shard_rows: usize,
) -> Result<DatasetManifest, SubsetError> {
    let mut writer = DatasetWriter::create(root, "jsonl", records.len(), max_shard_rows)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.finish(Schema::from_records(records), None)
}

fn read_manifest(root: &Path) -> Result<Option<DatasetManifest>, SubsetError> {
    let path = root.join(MANIFEST_FILENAME);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| inconsistent(root, format!("failed decoding {MANIFEST_FILENAME}: {err}")))
}

fn write_manifest(root: &Path, manifest: &DatasetManifest) -> Result<(), SubsetError> {
    let mut raw = serde_json::to_vec_pretty(manifest)
        .map_err(|err| inconsistent(root, format!("failed encoding {MANIFEST_FILENAME}: {err}")))?;
    raw.push(b'\n');
    fs::write(root.join(MANIFEST_FILENAME), raw)?;
    Ok(())
}

fn inconsistent(root: &Path, details: impl Into<String>) -> SubsetError {
    SubsetError::DatasetInconsistent {
        path: root.to_path_buf(),
        details: details.into(),
    }
}
