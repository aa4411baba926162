//! Input assembly engine
//!
//! Folds every declared input file into one dataset. Each file is loaded,
//! reshaped to its declared columns, and then either stacked onto the
//! dataset or held back for a join: entries without `join_on` concatenate
//! with outer column alignment, entries with `join_on` are left-joined onto
//! the combined result afterwards, in declaration order. Lookup files may
//! therefore appear anywhere in the config, not just after the files they
//! enrich.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::config::{ColumnSpec, InputConfig, InputFileSpec};
use crate::connectors::Source;
use crate::error::{Error, Result};
use crate::table::{Cell, Column, Table};

/// Builds the unified dataset described by an input config.
///
/// Files are processed in declaration order and every cell conversion
/// happens here, so downstream projection only ever sees finished values.
pub fn assemble(config: &InputConfig, source: &dyn Source) -> Result<Table> {
    let mut stacked: Vec<Table> = Vec::new();
    let mut joins: Vec<(Table, String, String)> = Vec::new();
    for spec in &config.files {
        let raw = source.load(&spec.filename)?;
        let shaped = shape_file(spec, &raw)?;
        match &spec.join_on {
            Some(key) => {
                if !shaped.has_column(key) {
                    return Err(Error::JoinColumnNotFound {
                        filename: spec.filename.clone(),
                        column: key.clone(),
                    });
                }
                joins.push((shaped, key.clone(), spec.filename.clone()));
            }
            None => stacked.push(shaped),
        }
    }

    let mut dataset = Table::concat_outer(stacked);
    for (table, key, filename) in joins {
        if !dataset.has_column(&key) {
            return Err(Error::InvalidJoinColumn { filename, column: key });
        }
        dataset = dataset.left_join(&table, &key);
    }
    debug!("assembled dataset of {} rows, {} columns", dataset.rows(), dataset.width());
    Ok(dataset)
}

/// Reshapes one raw file into its declared columns: referenced columns are
/// checked first so every absent one is reported together, then columns are
/// copied under their target names, literals are broadcast to the file's row
/// count, and declared date formats are applied.
fn shape_file(spec: &InputFileSpec, raw: &Table) -> Result<Table> {
    let missing: Vec<String> = spec
        .columns
        .iter()
        .filter_map(|column| match column {
            ColumnSpec::From { source, .. } if !raw.has_column(source) => Some(source.clone()),
            _ => None,
        })
        .collect();
    if !missing.is_empty() {
        return Err(Error::ColumnsNotFound { filename: spec.filename.clone(), columns: missing });
    }

    let rows = raw.rows();
    let mut shaped = Table::new();
    for column in &spec.columns {
        match column {
            ColumnSpec::From { source, target, .. } => {
                if let Some(found) = raw.column(source) {
                    shaped.push_column(Column::new(target.clone(), found.cells.clone()));
                }
            }
            ColumnSpec::Literal { target, value } => {
                shaped.push_column(Column::new(target.clone(), vec![value.clone(); rows]));
            }
        }
    }

    for column in &spec.columns {
        if let ColumnSpec::From { source, target, format: Some(format) } = column {
            convert_dates(&mut shaped, target, source, format, &spec.filename)?;
        }
    }
    Ok(shaped)
}

/// Parses every non-null cell of a shaped column under the declared format.
/// A format without time parts parses to midnight of the parsed day; nulls
/// pass through untouched.
fn convert_dates(
    table: &mut Table,
    target: &str,
    source: &str,
    format: &str,
    filename: &str,
) -> Result<()> {
    let Some(column) = table.column_mut(target) else {
        return Ok(());
    };
    for cell in &mut column.cells {
        if cell.is_null() {
            continue;
        }
        let text = cell.render();
        let parsed = match NaiveDateTime::parse_from_str(&text, format) {
            Ok(stamp) => stamp,
            Err(_) => match NaiveDate::parse_from_str(&text, format) {
                Ok(date) => date.and_time(NaiveTime::MIN),
                Err(parse_error) => {
                    return Err(Error::InvalidFormat {
                        filename: filename.to_string(),
                        column: source.to_string(),
                        value: text,
                        format: format.to_string(),
                        source: parse_error,
                    });
                }
            },
        };
        *cell = Cell::DateTime(parsed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeSource {
        tables: HashMap<String, Table>,
    }

    impl FakeSource {
        fn new(entries: Vec<(&str, Table)>) -> Self {
            let tables = entries
                .into_iter()
                .map(|(filename, table)| (filename.to_string(), table))
                .collect();
            Self { tables }
        }
    }

    impl Source for FakeSource {
        fn load(&self, filename: &str) -> Result<Table> {
            self.tables
                .get(filename)
                .cloned()
                .ok_or_else(|| Error::InputFileNotFound { filename: filename.to_string() })
        }
    }

    fn text(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| Cell::Text(v.to_string())).collect()
    }

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_assemble_renames_columns() {
        let source = FakeSource::new(vec![(
            "people.csv",
            Table::from_columns(vec![
                Column::new("employee_id", text(&["1", "2"])),
                Column::new("ignored", text(&["x", "y"])),
            ]),
        )]);
        let config = InputConfig::parse(
            r#"{"filename": "people.csv", "columns": [{"name": "id", "from": "employee_id"}]}"#,
            "input.json",
        )
        .unwrap();

        let dataset = assemble(&config, &source).unwrap();
        assert_eq!(dataset.column_names().collect::<Vec<_>>(), vec!["id"]);
        assert_eq!(dataset.column("id").unwrap().cells, text(&["1", "2"]));
    }

    #[test]
    fn test_assemble_concatenates_with_outer_alignment() {
        let source = FakeSource::new(vec![
            (
                "north.csv",
                Table::from_columns(vec![
                    Column::new("who", text(&["alice", "bob"])),
                    Column::new("amount", text(&["10", "20"])),
                ]),
            ),
            ("south.csv", Table::from_columns(vec![Column::new("who", text(&["carol"]))])),
        ]);
        let config = InputConfig::parse(
            r#"
            [{"filename": "north.csv",
              "columns": [{"name": "name", "from": "who"},
                          {"name": "amount", "from": "amount"}]},
             {"filename": "south.csv",
              "columns": [{"name": "name", "from": "who"},
                          {"name": "region", "value": "south"}]}]
            "#,
            "input.json",
        )
        .unwrap();

        let dataset = assemble(&config, &source).unwrap();
        assert_eq!(dataset.rows(), 3);
        assert_eq!(
            dataset.column_names().collect::<Vec<_>>(),
            vec!["name", "amount", "region"]
        );
        // rows keep file order, absent columns pad with nulls
        assert_eq!(dataset.column("name").unwrap().cells, text(&["alice", "bob", "carol"]));
        assert_eq!(dataset.column("amount").unwrap().cells[2], Cell::Null);
        assert_eq!(dataset.column("region").unwrap().cells[0], Cell::Null);
        assert_eq!(dataset.column("region").unwrap().cells[2], Cell::Text("south".to_string()));
    }

    #[test]
    fn test_assemble_joins_regardless_of_declaration_position() {
        // the lookup file comes first; it still joins onto the stacked data
        let source = FakeSource::new(vec![
            (
                "rates.csv",
                Table::from_columns(vec![
                    Column::new("grade", text(&["a", "b"])),
                    Column::new("rate", text(&["100", "200"])),
                ]),
            ),
            (
                "people.csv",
                Table::from_columns(vec![
                    Column::new("who", text(&["alice", "bob", "carol"])),
                    Column::new("grade", text(&["b", "a", "c"])),
                ]),
            ),
        ]);
        let config = InputConfig::parse(
            r#"
            [{"filename": "rates.csv",
              "columns": [{"name": "grade", "from": "grade"},
                          {"name": "rate", "from": "rate"}],
              "join_on": "grade"},
             {"filename": "people.csv",
              "columns": [{"name": "name", "from": "who"},
                          {"name": "grade", "from": "grade"}]}]
            "#,
            "input.json",
        )
        .unwrap();

        let dataset = assemble(&config, &source).unwrap();
        assert_eq!(dataset.rows(), 3);
        assert_eq!(
            dataset.column("rate").unwrap().cells,
            vec![Cell::Text("200".to_string()), Cell::Text("100".to_string()), Cell::Null]
        );
    }

    #[test]
    fn test_assemble_lists_every_missing_column() {
        let source = FakeSource::new(vec![(
            "people.csv",
            Table::from_columns(vec![Column::new("x", text(&["1"]))]),
        )]);
        let config = InputConfig::parse(
            r#"{"filename": "people.csv",
                "columns": [{"name": "a", "from": "x"},
                            {"name": "b", "from": "y"},
                            {"name": "c", "from": "z"}]}"#,
            "input.json",
        )
        .unwrap();

        let err = assemble(&config, &source).unwrap_err();
        match err {
            Error::ColumnsNotFound { filename, columns } => {
                assert_eq!(filename, "people.csv");
                assert_eq!(columns, vec!["y", "z"]);
            }
            other => panic!("expected ColumnsNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_assemble_missing_columns_message_grammar() {
        let source = FakeSource::new(vec![(
            "people.csv",
            Table::from_columns(vec![Column::new("x", text(&["1"]))]),
        )]);
        let config = InputConfig::parse(
            r#"{"filename": "people.csv", "columns": [{"name": "b", "from": "y"}]}"#,
            "input.json",
        )
        .unwrap();

        let err = assemble(&config, &source).unwrap_err();
        assert_eq!(err.to_string(), "column 'y' cannot be found in \"people.csv\"");
    }

    #[test]
    fn test_assemble_broadcasts_literals_to_file_height() {
        let source = FakeSource::new(vec![
            (
                "tall.csv",
                Table::from_columns(vec![Column::new("x", text(&["1", "2", "3", "4", "5"]))]),
            ),
            ("empty.csv", Table::from_columns(vec![Column::new("x", vec![])])),
        ]);
        let config = InputConfig::parse(
            r#"
            [{"filename": "tall.csv",
              "columns": [{"name": "x", "from": "x"}, {"name": "tag", "value": 7}]},
             {"filename": "empty.csv",
              "columns": [{"name": "x", "from": "x"}, {"name": "tag", "value": 7}]}]
            "#,
            "input.json",
        )
        .unwrap();

        let dataset = assemble(&config, &source).unwrap();
        assert_eq!(dataset.rows(), 5);
        assert_eq!(dataset.column("tag").unwrap().cells, vec![Cell::Number(7.0); 5]);
    }

    #[test]
    fn test_assemble_converts_dates() {
        let source = FakeSource::new(vec![
            (
                "hires.csv",
                Table::from_columns(vec![Column::new(
                    "hire_date",
                    vec![Cell::Text("2024-01-05".to_string()), Cell::Null],
                )]),
            ),
            (
                "stamps.csv",
                Table::from_columns(vec![Column::new(
                    "hire_date",
                    vec![Cell::Number(20240212.0)],
                )]),
            ),
        ]);
        let config = InputConfig::parse(
            r#"[{"filename": "hires.csv",
                 "columns": [{"name": "hired", "from": "hire_date", "format": "%Y-%m-%d"}]},
                {"filename": "stamps.csv",
                 "columns": [{"name": "hired", "from": "hire_date", "format": "%Y%m%d"}]}]"#,
            "input.json",
        )
        .unwrap();

        // text dates parse from their text, numeric dates from their digits,
        // nulls pass through untouched
        let dataset = assemble(&config, &source).unwrap();
        let hired = &dataset.column("hired").unwrap().cells;
        assert_eq!(hired[0], Cell::DateTime(dt(2024, 1, 5)));
        assert_eq!(hired[1], Cell::Null);
        assert_eq!(hired[2], Cell::DateTime(dt(2024, 2, 12)));
    }

    #[test]
    fn test_assemble_parses_datetimes_with_time_parts() {
        let source = FakeSource::new(vec![(
            "log.csv",
            Table::from_columns(vec![Column::new(
                "at",
                vec![Cell::Text("05.01.2024 13:45".to_string())],
            )]),
        )]);
        let config = InputConfig::parse(
            r#"{"filename": "log.csv",
                "columns": [{"name": "at", "from": "at", "format": "%d.%m.%Y %H:%M"}]}"#,
            "input.json",
        )
        .unwrap();

        let dataset = assemble(&config, &source).unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        assert_eq!(dataset.column("at").unwrap().cells[0], Cell::DateTime(expected));
    }

    #[test]
    fn test_assemble_rejects_cells_outside_declared_format() {
        let source = FakeSource::new(vec![(
            "hires.csv",
            Table::from_columns(vec![Column::new(
                "hire_date",
                vec![Cell::Text("2024/01/05".to_string())],
            )]),
        )]);
        let config = InputConfig::parse(
            r#"{"filename": "hires.csv",
                "columns": [{"name": "hired", "from": "hire_date", "format": "%Y-%m-%d"}]}"#,
            "input.json",
        )
        .unwrap();

        let err = assemble(&config, &source).unwrap_err();
        match err {
            Error::InvalidFormat { filename, column, value, format, .. } => {
                assert_eq!(filename, "hires.csv");
                assert_eq!(column, "hire_date");
                assert_eq!(value, "2024/01/05");
                assert_eq!(format, "%Y-%m-%d");
            }
            other => panic!("expected InvalidFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_assemble_join_column_must_be_declared_in_its_file() {
        let source = FakeSource::new(vec![(
            "rates.csv",
            Table::from_columns(vec![Column::new("rate", text(&["100"]))]),
        )]);
        let config = InputConfig::parse(
            r#"{"filename": "rates.csv",
                "columns": [{"name": "rate", "from": "rate"}],
                "join_on": "grade"}"#,
            "input.json",
        )
        .unwrap();

        let err = assemble(&config, &source).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'join_on' column 'grade' cannot be found in data from \"rates.csv\""
        );
    }

    #[test]
    fn test_assemble_join_column_must_exist_in_combined_data() {
        // every entry defers to a join, so there is nothing to join onto
        let source = FakeSource::new(vec![(
            "rates.csv",
            Table::from_columns(vec![
                Column::new("grade", text(&["a"])),
                Column::new("rate", text(&["100"])),
            ]),
        )]);
        let config = InputConfig::parse(
            r#"{"filename": "rates.csv",
                "columns": [{"name": "grade", "from": "grade"},
                            {"name": "rate", "from": "rate"}],
                "join_on": "grade"}"#,
            "input.json",
        )
        .unwrap();

        let err = assemble(&config, &source).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'join_on' column 'grade' from \"rates.csv\" doesn't match any existing columns"
        );
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let source = FakeSource::new(vec![
            (
                "a.csv",
                Table::from_columns(vec![
                    Column::new("k", text(&["1", "2"])),
                    Column::new("v", text(&["x", "y"])),
                ]),
            ),
            (
                "b.csv",
                Table::from_columns(vec![
                    Column::new("k", text(&["1"])),
                    Column::new("w", text(&["z"])),
                ]),
            ),
        ]);
        let config = InputConfig::parse(
            r#"
            [{"filename": "a.csv",
              "columns": [{"name": "k", "from": "k"}, {"name": "v", "from": "v"}]},
             {"filename": "b.csv",
              "columns": [{"name": "k", "from": "k"}, {"name": "w", "from": "w"}],
              "join_on": "k"}]
            "#,
            "input.json",
        )
        .unwrap();

        let once = assemble(&config, &source).unwrap();
        let twice = assemble(&config, &source).unwrap();
        assert_eq!(once, twice);
    }
}
