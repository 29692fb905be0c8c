use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::data::DataRecord;
use crate::types::ContentHash;

/// Hash with the std `DefaultHasher`. Values are only comparable within one
/// build and are never persisted.
pub fn hash_with(f: impl FnOnce(&mut DefaultHasher)) -> u64 {
    let mut hasher = DefaultHasher::new();
    f(&mut hasher);
    hasher.finish()
}

/// Hash of a record's content that ignores field order.
///
/// Used to compare datasets in memory; not written to any manifest.
pub fn record_content_hash(record: &DataRecord) -> ContentHash {
    hash_with(|hasher| {
        let mut fields: Vec<_> = record.fields().iter().collect();
        fields.sort_by(|(left, _), (right, _)| left.cmp(right));
        fields.len().hash(hasher);
        for (name, value) in fields {
            name.hash(hasher);
            hash_value(value, hasher);
        }
    })
}

fn hash_value(value: &Value, hasher: &mut DefaultHasher) {
    match value {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(flag) => {
            1u8.hash(hasher);
            flag.hash(hasher);
        }
        Value::Number(number) => {
            2u8.hash(hasher);
            // Number's Display is canonical for a given parsed value.
            number.to_string().hash(hasher);
        }
        Value::String(text) => {
            3u8.hash(hasher);
            text.hash(hasher);
        }
        Value::Array(items) => {
            4u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(map) => {
            5u8.hash(hasher);
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            entries.len().hash(hasher);
            for (key, item) in entries {
                key.hash(hasher);
                hash_value(item, hasher);
            }
        }
    }
}
