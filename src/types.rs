/// Name of a record field (a column of the dataset).
/// Examples: `input_ids`, `attention_mask`, `labels`, `translation`
pub type FieldName = String;
/// Zero-based position of a record within a dataset (shard order, then line order).
pub type RowIndex = usize;
/// Stable 64-bit digest of a record's canonical content.
pub type ContentHash = u64;
/// Shard path relative to its dataset root, as stored in the manifest.
/// Example: `data-00000-of-00002.jsonl`
pub type ShardPath = String;
/// Human-readable line produced for a check or a sample field.
/// Examples: `Features match: [input_ids, labels]`, `input_ids: list of length 128`
pub type ReportLine = String;
