use serde_json::Value;
use std::collections::HashSet;

use crate::api::Record;
use crate::error::ExportError;

/// A record reduced to `(column, cell)` pairs, in field order
pub type FlatRow = Vec<(String, String)>;

/// Flatten one record into named cells
///
/// Nested objects expand one level into `parent.child` columns; anything
/// deeper is kept as compact JSON inside that cell. Lists become a single
/// cell joined by `list_delimiter`.
pub fn flatten_record(record: &Record, index: usize, list_delimiter: &str) -> Result<FlatRow, ExportError> {
    let mut row = FlatRow::with_capacity(record.len());
    let mut seen = HashSet::with_capacity(record.len());

    let mut push = |column: String, cell: String, row: &mut FlatRow| {
        if !seen.insert(column.clone()) {
            return Err(ExportError::DuplicateColumn { index, column });
        }
        row.push((column, cell));
        Ok(())
    };

    for (key, value) in record {
        match value {
            Value::Object(children) if !children.is_empty() => {
                for (child_key, child) in children {
                    push(format!("{}.{}", key, child_key), cell(child, list_delimiter), &mut row)?;
                }
            }
            Value::Object(_) => push(key.clone(), String::new(), &mut row)?,
            other => push(key.clone(), cell(other, list_delimiter), &mut row)?,
        }
    }

    Ok(row)
}

/// Render a value as one CSV cell
fn cell(value: &Value, list_delimiter: &str) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(list_item)
            .collect::<Vec<_>>()
            .join(list_delimiter),
        other => list_item(other),
    }
}

fn list_item(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
