//! Source and sink traits plus the CSV implementations
//!
//! Sources and sinks are the pipeline's only contact with storage: a
//! [`Source`] turns a declared filename into a [`Table`], a [`Sink`] takes
//! finished sheets and persists one artifact. The engines only see the
//! traits, which keeps them testable against in-memory fakes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::table::{Cell, Column, Table};

/// A finished sheet, ready to be written into an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    /// Sheet name from the output config
    pub name: String,
    /// Human-readable title from the output config
    pub title: String,
    /// Free-form kind tag from the output config
    pub kind: String,
    /// The projected rows
    pub table: Table,
}

/// Trait for reading declared input files
pub trait Source: Send + Sync {
    /// Reads one declared file into a table
    fn load(&self, filename: &str) -> Result<Table>;
}

/// Trait for persisting output artifacts
pub trait Sink: Send + Sync {
    /// Writes one artifact made of the given sheets
    fn write(&mut self, artifact: &str, sheets: &[Sheet]) -> Result<()>;
}

// ============================================================================
// CSV implementations
// ============================================================================

/// Reads input files as headered CSV from a base directory.
///
/// Cells are typed from their text: empty fields become nulls, fields that
/// parse as a number become numbers, everything else stays text. Duplicate
/// header names are disambiguated with a numeric suffix (`id`, `id.1`), so
/// every column of a loaded table can be referenced by name.
pub struct CsvSource {
    base: PathBuf,
}

impl CsvSource {
    /// Creates a source rooted at the given input directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl Source for CsvSource {
    fn load(&self, filename: &str) -> Result<Table> {
        let path = self.base.join(filename);
        if !path.is_file() {
            return Err(Error::InputFileNotFound { filename: filename.to_string() });
        }

        let read_error = |source: csv::Error| Error::SourceRead {
            filename: filename.to_string(),
            source,
        };
        let mut reader = csv::Reader::from_path(&path).map_err(read_error)?;
        let headers = reader.headers().map_err(read_error)?.clone();
        let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record.map_err(read_error)?;
            for (cells, field) in columns.iter_mut().zip(record.iter()) {
                cells.push(parse_cell(field));
            }
        }

        let table = Table::from_columns(
            dedupe_headers(&headers)
                .into_iter()
                .zip(columns)
                .map(|(name, cells)| Column::new(name, cells))
                .collect(),
        );
        debug!("read {} rows from \"{}\"", table.rows(), filename);
        Ok(table)
    }
}

/// Repeated header names get a dotted counter suffix, second occurrence
/// first: `id, id, id` becomes `id, id.1, id.2`.
fn dedupe_headers(headers: &csv::StringRecord) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    headers
        .iter()
        .map(|name| {
            let count = seen.entry(name).or_insert(0);
            let unique = if *count == 0 {
                name.to_string()
            } else {
                format!("{name}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

fn parse_cell(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::Null;
    }
    match field.parse::<f64>() {
        Ok(number) => Cell::Number(number),
        Err(_) => Cell::Text(field.to_string()),
    }
}

/// Writes each artifact as a directory of CSV files, one per sheet, under a
/// base directory. The directory is named after the artifact's filename stem
/// and replaced wholesale on every write.
pub struct CsvSink {
    base: PathBuf,
}

impl CsvSink {
    /// Creates a sink rooted at the given output directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl Sink for CsvSink {
    fn write(&mut self, artifact: &str, sheets: &[Sheet]) -> Result<()> {
        let stem = Path::new(artifact)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(artifact);
        let dir = self.base.join(stem);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        let write_error = |source: csv::Error| Error::SinkWrite {
            artifact: artifact.to_string(),
            source,
        };
        for sheet in sheets {
            let path = dir.join(format!("{}.csv", sheet.name));
            let mut writer = csv::Writer::from_path(&path).map_err(write_error)?;
            writer
                .write_record(sheet.table.column_names())
                .map_err(write_error)?;
            for row in 0..sheet.table.rows() {
                let fields: Vec<String> = sheet
                    .table
                    .columns()
                    .iter()
                    .map(|column| column.cells[row].render())
                    .collect();
                writer.write_record(&fields).map_err(write_error)?;
            }
            writer.flush()?;
        }
        debug!("wrote {} sheets of \"{}\" to {}", sheets.len(), artifact, dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("", Cell::Null)]
    #[case("42", Cell::Number(42.0))]
    #[case("-2.5", Cell::Number(-2.5))]
    #[case("1e3", Cell::Number(1000.0))]
    #[case("alice", Cell::Text("alice".to_string()))]
    #[case("2024-01-05", Cell::Text("2024-01-05".to_string()))]
    fn test_parse_cell(#[case] field: &str, #[case] expected: Cell) {
        assert_eq!(parse_cell(field), expected);
    }

    #[test]
    fn test_load_types_cells_from_text() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("people.csv"), "id,name,score\n1,alice,9.5\n2,bob,\n").unwrap();

        let table = CsvSource::new(dir.path()).load("people.csv").unwrap();
        assert_eq!(table.rows(), 2);
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["id", "name", "score"]);
        assert_eq!(table.column("id").unwrap().cells[0], Cell::Number(1.0));
        assert_eq!(table.column("name").unwrap().cells[0], Cell::Text("alice".to_string()));
        assert_eq!(table.column("score").unwrap().cells[1], Cell::Null);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = CsvSource::new(dir.path()).load("ghost.csv").unwrap_err();
        assert_eq!(err.to_string(), "input file \"ghost.csv\" cannot be found");
    }

    #[test]
    fn test_load_suffixes_duplicate_headers() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dup.csv"), "id,id,name\n1,2,alice\n").unwrap();

        let table = CsvSource::new(dir.path()).load("dup.csv").unwrap();
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["id", "id.1", "name"]);
        assert_eq!(table.column("id").unwrap().cells[0], Cell::Number(1.0));
        assert_eq!(table.column("id.1").unwrap().cells[0], Cell::Number(2.0));
    }

    #[test]
    fn test_load_ragged_rows() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.csv"), "a,b\n1,2\n3\n").unwrap();

        let err = CsvSource::new(dir.path()).load("bad.csv").unwrap_err();
        match err {
            Error::SourceRead { filename, .. } => assert_eq!(filename, "bad.csv"),
            other => panic!("expected SourceRead, got {other:?}"),
        }
    }

    #[test]
    fn test_sink_writes_one_csv_per_sheet() {
        let dir = TempDir::new().unwrap();
        let sheets = vec![
            Sheet {
                name: "people".to_string(),
                title: "People".to_string(),
                kind: "table".to_string(),
                table: Table::from_columns(vec![
                    Column::new("id", vec![Cell::Number(1.0)]),
                    Column::new("name", vec![Cell::Text("alice".to_string())]),
                ]),
            },
            Sheet {
                name: "empty".to_string(),
                title: "Empty".to_string(),
                kind: "table".to_string(),
                table: Table::from_columns(vec![Column::new("id", vec![])]),
            },
        ];

        CsvSink::new(dir.path()).write("report.xlsx", &sheets).unwrap();

        let people = fs::read_to_string(dir.path().join("report").join("people.csv")).unwrap();
        assert_eq!(people, "id,name\n1,alice\n");
        let empty = fs::read_to_string(dir.path().join("report").join("empty.csv")).unwrap();
        assert_eq!(empty, "id\n");
    }

    #[test]
    fn test_sink_replaces_stale_artifact_dir() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("report");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover.csv"), "junk\n").unwrap();

        let sheets = vec![Sheet {
            name: "fresh".to_string(),
            title: "Fresh".to_string(),
            kind: "table".to_string(),
            table: Table::from_columns(vec![Column::new("id", vec![Cell::Number(1.0)])]),
        }];
        CsvSink::new(dir.path()).write("report.xlsx", &sheets).unwrap();

        assert!(!stale.join("leftover.csv").exists());
        assert!(stale.join("fresh.csv").exists());
    }
}
