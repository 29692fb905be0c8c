//! Formatting helpers shared by the creator, verifier, and command-line runners.

use serde_json::Value;

use crate::constants::verify::PREVIEW_ITEMS;
use crate::types::ReportLine;

/// Group digits with commas (`1234567` -> `1,234,567`).
pub fn format_count(value: usize) -> String {
    let raw = value.to_string();
    let mut grouped_reversed = String::with_capacity(raw.len() + (raw.len() / 3));
    for (idx, ch) in raw.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            grouped_reversed.push(',');
        }
        grouped_reversed.push(ch);
    }
    grouped_reversed.chars().rev().collect()
}

/// `part / whole` as a percentage with four decimals; `n/a` when `whole` is zero.
pub fn format_percentage(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "n/a".to_string();
    }
    format!("{:.4}%", part as f64 / whole as f64 * 100.0)
}

/// Display lines for one record field.
///
/// String lists show their first few items, numeric lists their length and
/// first few items, other lists only their length. Scalars print as-is.
pub fn preview_field(name: &str, value: &Value) -> Vec<ReportLine> {
    let Value::Array(items) = value else {
        return vec![format!("{name}: {}", display_scalar(value))];
    };
    match items.first() {
        None => vec![format!("{name}: [] (empty list)")],
        Some(Value::String(_)) => {
            let shown = render_items(items);
            if items.len() > PREVIEW_ITEMS {
                vec![format!("{name}: [{shown}, ...]")]
            } else {
                vec![format!("{name}: [{shown}]")]
            }
        }
        Some(Value::Number(_)) => {
            let suffix = if items.len() > PREVIEW_ITEMS { ", ..." } else { "" };
            vec![
                format!("{name}: list of length {}", items.len()),
                format!("  first few: [{}{suffix}]", render_items(items)),
            ]
        }
        Some(_) => vec![format!("{name}: list of length {}", items.len())],
    }
}

fn render_items(items: &[Value]) -> String {
    items
        .iter()
        .take(PREVIEW_ITEMS)
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
