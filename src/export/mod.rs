// Tabular export
//
// Turns a heterogeneous list of records into a rectangular CSV: the header is
// the first-seen union of every flattened column, missing cells are empty,
// and row order matches record order.

mod flatten;

pub use flatten::{FlatRow, flatten_record};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::api::Record;
use crate::error::ExportError;
use crate::fsutil;

/// What to do with a record that cannot be flattened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordErrorPolicy {
    /// Log it, leave it out, keep exporting
    #[default]
    Skip,
    /// Fail the whole export
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub list_delimiter: String,
    pub on_record_error: RecordErrorPolicy,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            list_delimiter: ";".to_string(),
            on_record_error: RecordErrorPolicy::Skip,
        }
    }
}

/// Outcome of writing one CSV file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub skipped: usize,
    pub sha256: String,
}

/// CSV bytes for a set of records, before they touch disk
#[derive(Debug)]
pub struct RenderedTable {
    pub bytes: Vec<u8>,
    pub rows: usize,
    pub columns: usize,
    pub skipped: usize,
}

/// Build the CSV for `records` in memory
///
/// Pass one flattens every record and grows the header in first-seen order.
/// Pass two emits one row per surviving record against that header.
pub fn render(records: &[Record], options: &ExportOptions) -> Result<RenderedTable, ExportError> {
    let mut header: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<FlatRow> = Vec::with_capacity(records.len());
    let mut skipped = 0;

    for (index, record) in records.iter().enumerate() {
        let row = match flatten_record(record, index, &options.list_delimiter) {
            Ok(row) => row,
            Err(e) => match options.on_record_error {
                RecordErrorPolicy::Skip => {
                    tracing::warn!("Skipping record: {}", e);
                    skipped += 1;
                    continue;
                }
                RecordErrorPolicy::Abort => return Err(e),
            },
        };

        for (column, _) in &row {
            if !positions.contains_key(column) {
                positions.insert(column.clone(), header.len());
                header.push(column.clone());
            }
        }
        rows.push(row);
    }

    // Records without a single field have no header to write
    if header.is_empty() {
        return Ok(RenderedTable {
            bytes: Vec::new(),
            rows: rows.len(),
            columns: 0,
            skipped,
        });
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&header)?;

    let mut line = vec![String::new(); header.len()];
    for row in &rows {
        line.iter_mut().for_each(String::clear);
        for (column, value) in row {
            line[positions[column]].push_str(value);
        }
        writer.write_record(&line)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(csv::Error::from(e.into_error())))?;

    Ok(RenderedTable {
        bytes,
        rows: rows.len(),
        columns: header.len(),
        skipped,
    })
}

/// Render `records` and write them atomically to `output_path`
pub fn export(records: &[Record], output_path: &Path, options: &ExportOptions) -> Result<ExportReport, ExportError> {
    let table = render(records, options)?;

    fsutil::atomic_write(output_path, &table.bytes).map_err(|e| ExportError::Write {
        path: output_path.to_path_buf(),
        reason: format!("{:#}", e),
    })?;

    tracing::info!(
        "Wrote {} row(s) x {} column(s) to {}",
        table.rows,
        table.columns,
        output_path.display()
    );

    Ok(ExportReport {
        path: output_path.to_path_buf(),
        rows: table.rows,
        columns: table.columns,
        skipped: table.skipped,
        sha256: compute_sha256(&table.bytes),
    })
}

/// SHA-256 of exported content, `sha256:`-prefixed hex
pub fn compute_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();

    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("sha256:{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;
    use serde_json::{Value, json};

    fn records(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                _ => panic!("test record must be an object"),
            })
            .collect()
    }

    fn render_str(records: &[Record], options: &ExportOptions) -> String {
        String::from_utf8(render(records, options).unwrap().bytes).unwrap()
    }

    #[test]
    fn test_header_is_union_in_first_seen_order() {
        let input = records(vec![json!({"a": 1, "b": 2}), json!({"a": 3, "c": 4})]);
        assert_eq!(render_str(&input, &ExportOptions::default()), "a,b,c\n1,2,\n3,,4\n");
    }

    #[test]
    fn test_column_order_follows_first_appearance_not_alphabet() {
        let input = records(vec![json!({"z": 1}), json!({"m": 2, "z": 3}), json!({"a": 4})]);
        assert_eq!(render_str(&input, &ExportOptions::default()), "z,m,a\n1,,\n3,2,\n,,4\n");
    }

    #[test]
    fn test_nested_fields_become_dotted_columns() {
        let input = records(vec![
            json!({"id": "s1", "account": {"id": "a1", "name": "Acme"}}),
            json!({"id": "s2", "account": {"id": "a2"}, "tags": ["x", "y"]}),
        ]);
        assert_eq!(
            render_str(&input, &ExportOptions::default()),
            "id,account.id,account.name,tags\ns1,a1,Acme,\ns2,a2,,x;y\n"
        );
    }

    #[test]
    fn test_special_characters_are_quoted() {
        let input = records(vec![json!({"note": "comma, \"quote\"\nnewline", "plain": "ok"})]);
        let output = render_str(&input, &ExportOptions::default());
        assert_eq!(output, "note,plain\n\"comma, \"\"quote\"\"\nnewline\",ok\n");

        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "comma, \"quote\"\nnewline");
    }

    #[test]
    fn test_render_is_deterministic() {
        let input = records(vec![
            json!({"b": 1, "nested": {"y": true, "x": null}}),
            json!({"a": [1, 2], "b": "two"}),
        ]);
        let first = render(&input, &ExportOptions::default()).unwrap().bytes;
        let second = render(&input, &ExportOptions::default()).unwrap().bytes;
        assert_eq!(first, second);
    }

    #[test]
    fn test_failing_record_is_skipped_by_default() {
        let input = records(vec![
            json!({"id": 1}),
            json!({"id": 2, "a.b": 1, "a": {"b": 2}}),
            json!({"id": 3}),
        ]);

        let table = render(&input, &ExportOptions::default()).unwrap();
        assert_eq!(table.rows, 2);
        assert_eq!(table.skipped, 1);
        assert_eq!(String::from_utf8(table.bytes).unwrap(), "id\n1\n3\n");
    }

    #[test]
    fn test_failing_record_aborts_when_configured() {
        let input = records(vec![json!({"id": 1}), json!({"a.b": 1, "a": {"b": 2}})]);
        let options = ExportOptions {
            on_record_error: RecordErrorPolicy::Abort,
            ..ExportOptions::default()
        };

        assert!(matches!(
            render(&input, &options),
            Err(ExportError::DuplicateColumn { index: 1, .. })
        ));
    }

    #[test]
    fn test_fieldless_records_render_no_header() {
        let input = records(vec![json!({}), json!({})]);
        let table = render(&input, &ExportOptions::default()).unwrap();
        assert!(table.bytes.is_empty());
        assert_eq!(table.rows, 2);
        assert_eq!(table.columns, 0);
    }

    #[test]
    fn test_no_records_renders_empty_output() {
        let table = render(&[], &ExportOptions::default()).unwrap();
        assert!(table.bytes.is_empty());
        assert_eq!(table.rows, 0);
    }

    #[test]
    fn test_export_writes_file_and_reports_rows() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.child("sites.csv");
        let input = records(vec![json!({"a": 1, "b": 2}), json!({"a": 3, "c": 4})]);

        let report = export(&input, target.path(), &ExportOptions::default()).unwrap();

        target.assert("a,b,c\n1,2,\n3,,4\n");
        assert_eq!(report.rows, 2);
        assert_eq!(report.columns, 3);
        assert_eq!(report.sha256, compute_sha256(b"a,b,c\n1,2,\n3,,4\n"));
    }

    #[test]
    fn test_export_twice_is_byte_identical() {
        let dir = assert_fs::TempDir::new().unwrap();
        let first = dir.child("first.csv");
        let second = dir.child("second.csv");
        let input = records(vec![json!({"id": 1, "os": {"type": "linux"}}), json!({"id": 2, "tags": ["a"]})]);

        let a = export(&input, first.path(), &ExportOptions::default()).unwrap();
        let b = export(&input, second.path(), &ExportOptions::default()).unwrap();

        assert_eq!(std::fs::read(first.path()).unwrap(), std::fs::read(second.path()).unwrap());
        assert_eq!(a.sha256, b.sha256);
    }

    #[test]
    fn test_export_creates_output_directory() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.child("out").child("alerts.csv");
        let input = records(vec![json!({"id": "x"})]);

        export(&input, target.path(), &ExportOptions::default()).unwrap();

        target.assert(predicate::path::exists());
        target.assert(predicate::str::starts_with("id\n"));
    }

    #[test]
    fn test_sha256_has_expected_format() {
        let hash = compute_sha256(b"");
        assert!(hash.starts_with("sha256:"));
        assert_eq!(hash.len(), 71);
    }
}
